//! Static question graph: questions, their ordered choices, and the question
//! each choice leads to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUNDLED_GRAPH: &str = include_str!("../../assets/question_graph.json");

const DEFAULT_CUSTOM_LIMIT: usize = 100;

static BUNDLED: LazyLock<Result<QuestionGraph, GraphError>> =
	LazyLock::new(|| QuestionGraph::from_json(BUNDLED_GRAPH));

/// Errors raised while loading a question graph definition.
#[derive(Debug, Error)]
pub enum GraphError {
	/// The definition is not valid JSON for the expected shape.
	#[error("invalid question graph: {0}")]
	Parse(#[from] serde_json::Error),
	/// `startQuestionId` names a question that is not defined.
	#[error("start question `{0}` is not defined")]
	MissingStart(String),
	/// A question is stored under a key different from its own id.
	#[error("question stored under `{key}` declares id `{id}`")]
	IdMismatch {
		/// Map key.
		key: String,
		/// Declared id.
		id: String,
	},
	/// Two choices of one question share an id.
	#[error("question `{question}` has duplicate choice `{choice}`")]
	DuplicateChoice {
		/// Owning question.
		question: String,
		/// Repeated choice id.
		choice: String,
	},
}

/// Type tag deciding which answer widget renders a question.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
	/// Ordered rating points.
	Scale,
	/// Two-way choice.
	Binary,
	/// Exactly one choice.
	#[default]
	SingleSelect,
	/// Any number of choices, optionally with free text.
	MultiSelect,
	/// A tag this build does not know how to render.
	Unknown(String),
}

impl QuestionKind {
	/// Wire name of the tag.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Scale => "scale",
			Self::Binary => "binary",
			Self::SingleSelect => "single_select",
			Self::MultiSelect => "multi_select",
			Self::Unknown(tag) => tag,
		}
	}
}

impl From<String> for QuestionKind {
	fn from(tag: String) -> Self {
		match tag.as_str() {
			"scale" => Self::Scale,
			"binary" => Self::Binary,
			"single_select" => Self::SingleSelect,
			"multi_select" => Self::MultiSelect,
			_ => Self::Unknown(tag),
		}
	}
}

impl From<&str> for QuestionKind {
	fn from(tag: &str) -> Self {
		Self::from(tag.to_string())
	}
}

impl From<QuestionKind> for String {
	fn from(kind: QuestionKind) -> Self {
		kind.as_str().to_string()
	}
}

impl fmt::Display for QuestionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One selectable option of a question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceSpec {
	/// Unique within the owning question.
	pub id: String,
	/// Text shown on the choice pill.
	pub label: String,
	/// Question this choice leads to. May be absent from the graph.
	pub target_question_id: String,
}

/// A question and its ordered choices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionNodeSpec {
	/// Process-wide unique key.
	pub id: String,
	/// Prompt text.
	pub label: String,
	/// Answer widget tag.
	#[serde(default)]
	pub kind: QuestionKind,
	/// Whether multi-select offers a free-text option.
	#[serde(default)]
	pub allow_custom: bool,
	/// Character limit of the free-text option.
	#[serde(default)]
	pub custom_limit: Option<usize>,
	/// Choices in display order.
	#[serde(default)]
	pub choices: Vec<ChoiceSpec>,
}

impl QuestionNodeSpec {
	/// Free-text limit with the default applied.
	pub fn custom_limit(&self) -> usize {
		self.custom_limit.unwrap_or(DEFAULT_CUSTOM_LIMIT)
	}

	/// Position of a choice in display order.
	pub fn choice_index(&self, choice_id: &str) -> Option<usize> {
		self.choices.iter().position(|c| c.id == choice_id)
	}
}

/// Immutable question graph. Every other component reads it; none owns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGraph {
	/// Root of every respondent path.
	pub start_question_id: String,
	/// Questions keyed by id.
	pub questions: BTreeMap<String, QuestionNodeSpec>,
}

impl QuestionGraph {
	/// Parses and validates a JSON definition.
	pub fn from_json(raw: &str) -> Result<Self, GraphError> {
		let graph: Self = serde_json::from_str(raw)?;
		graph.validate()?;

		let dangling = graph.dangling_targets();
		if !dangling.is_empty() {
			warn!(
				"question graph has {} choice targets without a definition",
				dangling.len()
			);
		}
		info!("loaded question graph with {} questions", graph.questions.len());
		Ok(graph)
	}

	/// The graph shipped with the app, parsed on first access.
	pub fn bundled() -> Result<&'static QuestionGraph, &'static GraphError> {
		BUNDLED.as_ref()
	}

	fn validate(&self) -> Result<(), GraphError> {
		if !self.questions.contains_key(&self.start_question_id) {
			return Err(GraphError::MissingStart(self.start_question_id.clone()));
		}
		for (key, question) in &self.questions {
			if *key != question.id {
				return Err(GraphError::IdMismatch {
					key: key.clone(),
					id: question.id.clone(),
				});
			}
			let mut seen = BTreeSet::new();
			for choice in &question.choices {
				if !seen.insert(choice.id.as_str()) {
					return Err(GraphError::DuplicateChoice {
						question: question.id.clone(),
						choice: choice.id.clone(),
					});
				}
			}
		}
		Ok(())
	}

	/// Looks up a question.
	pub fn question(&self, id: &str) -> Option<&QuestionNodeSpec> {
		self.questions.get(id)
	}

	/// Whether a question is defined.
	pub fn contains(&self, id: &str) -> bool {
		self.questions.contains_key(id)
	}

	/// Looks up a choice by id.
	pub fn choice(&self, question_id: &str, choice_id: &str) -> Option<&ChoiceSpec> {
		self.question(question_id)?
			.choices
			.iter()
			.find(|c| c.id == choice_id)
	}

	/// Maps a recorded answer value to a choice: by id first, then by label
	/// for answers recorded against older graphs.
	pub fn resolve_answer(&self, question_id: &str, value: &str) -> Option<&ChoiceSpec> {
		let question = self.question(question_id)?;
		question
			.choices
			.iter()
			.find(|c| c.id == value)
			.or_else(|| question.choices.iter().find(|c| c.label == value))
	}

	/// Choice targets that point at undefined questions, as
	/// `(question, choice, target)` triples.
	pub fn dangling_targets(&self) -> Vec<(&str, &str, &str)> {
		self.questions
			.values()
			.flat_map(|q| q.choices.iter().map(move |c| (q, c)))
			.filter(|(_, c)| !self.contains(&c.target_question_id))
			.map(|(q, c)| (q.id.as_str(), c.id.as_str(), c.target_question_id.as_str()))
			.collect()
	}
}
