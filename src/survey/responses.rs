//! Response log: the respondent's answers per path, and the single transition
//! function that every survey mutation goes through.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::graph::{QuestionGraph, QuestionKind};
use super::storage::{LocalSurveyData, SCHEMA_VERSION};

/// Id given to the first respondent path.
pub const INITIAL_PATH_ID: &str = "path_1";

/// Survey id written into stored snapshots.
pub const SURVEY_ID: &str = "climate_anxiety_survey";

/// One answered question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
	/// Answered question.
	pub question_id: String,
	/// Prompt at the time of answering.
	pub question_text: String,
	/// Widget the answer came from.
	pub question_type: QuestionKind,
	/// Choice ids (older data: choice labels).
	pub selected_answers: Vec<String>,
	/// Free-text answers, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_answers: Option<Vec<String>>,
	/// Epoch milliseconds. Strictly increasing within a path.
	pub timestamp: u64,
	/// Distinct defined targets of the selected choices.
	#[serde(default)]
	pub next_questions: Vec<String>,
}

/// One respondent journey through the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPath {
	/// Path id, unique within a session.
	pub path_id: String,
	/// At most one entry per question.
	pub responses: BTreeMap<String, ResponseEntry>,
	/// Whether answers are currently recorded on this path.
	pub is_active: bool,
	/// Question awaiting an answer; `None` once the path is finished.
	#[serde(default)]
	pub current_question_id: Option<String>,
	/// Epoch milliseconds.
	pub created_at: u64,
}

impl UserPath {
	/// Empty active path positioned on `start`.
	pub fn new(path_id: impl Into<String>, start: impl Into<String>, created_at: u64) -> Self {
		Self {
			path_id: path_id.into(),
			responses: BTreeMap::new(),
			is_active: true,
			current_question_id: Some(start.into()),
			created_at,
		}
	}

	/// Entries in replay order: ascending timestamp, ties broken by question id.
	pub fn ordered_responses(&self) -> Vec<&ResponseEntry> {
		let mut entries: Vec<&ResponseEntry> = self.responses.values().collect();
		entries.sort_by(|a, b| {
			a.timestamp
				.cmp(&b.timestamp)
				.then_with(|| a.question_id.cmp(&b.question_id))
		});
		entries
	}

	fn latest(&self) -> Option<&ResponseEntry> {
		self.ordered_responses().last().copied()
	}
}

/// Survey progress for one session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurveyState {
	/// Session id shared with storage.
	pub session_id: String,
	/// Epoch milliseconds.
	pub started_at: u64,
	/// Respondent paths.
	pub paths: Vec<UserPath>,
	/// Question shown in the answer panel.
	pub current_question_id: Option<String>,
	/// Every path has run out of questions.
	pub is_completed: bool,
}

impl SurveyState {
	/// Path currently receiving answers.
	pub fn active_path(&self) -> Option<&UserPath> {
		self.paths.iter().find(|p| p.is_active)
	}

	fn active_path_mut(&mut self) -> Option<&mut UserPath> {
		self.paths.iter_mut().find(|p| p.is_active)
	}

	/// Whether the active path has anything to step back over.
	pub fn can_go_back(&self) -> bool {
		self.active_path().is_some_and(|p| !p.responses.is_empty())
	}

	/// Number of answered questions on the active path.
	pub fn answered_count(&self) -> usize {
		self.active_path().map_or(0, |p| p.responses.len())
	}

	/// Snapshot for the persistence adapter.
	pub fn to_snapshot(&self, now: u64) -> LocalSurveyData {
		LocalSurveyData {
			session_id: self.session_id.clone(),
			survey_id: SURVEY_ID.to_string(),
			started_at: self.started_at,
			last_updated: now,
			current_paths: self.paths.iter().filter(|p| p.is_active).cloned().collect(),
			completed_paths: self.paths.iter().filter(|p| !p.is_active).cloned().collect(),
			is_completed: self.is_completed,
			version: SCHEMA_VERSION.to_string(),
		}
	}

	fn sync_progress(&mut self) {
		self.is_completed = self.paths.iter().all(|p| p.current_question_id.is_none());
		self.current_question_id = self
			.active_path()
			.and_then(|p| p.current_question_id.clone());
	}
}

/// Every way the survey state can change.
#[derive(Clone, Debug, PartialEq)]
pub enum SurveyCommand {
	/// Fresh survey positioned on the start question. Also used to restart
	/// after stored answers are cleared.
	Start {
		/// Session id for the new survey.
		session_id: String,
		/// Epoch milliseconds.
		timestamp: u64,
	},
	/// Resume from a stored snapshot.
	Restore(LocalSurveyData),
	/// Record an answer on the active path.
	Answer {
		/// Answered question.
		question_id: String,
		/// Selected values.
		answers: Vec<String>,
		/// Free-text values.
		custom_answers: Option<Vec<String>>,
		/// Epoch milliseconds.
		timestamp: u64,
	},
	/// Point a path at another question.
	NavigateTo {
		/// Question to show.
		question_id: String,
		/// Path to move.
		path_id: String,
	},
	/// Drop the active path's most recent answer and return to its question.
	GoBack,
}

/// Applies one command. Pure: the same inputs always produce the same state.
pub fn reduce(state: &SurveyState, graph: &QuestionGraph, command: SurveyCommand) -> SurveyState {
	let mut next = state.clone();
	match command {
		SurveyCommand::Start {
			session_id,
			timestamp,
		} => {
			next = fresh(graph, session_id, timestamp);
		}
		SurveyCommand::Restore(snapshot) => {
			let mut paths = snapshot.current_paths;
			paths.extend(snapshot.completed_paths);
			if paths.is_empty() {
				next = fresh(graph, snapshot.session_id, snapshot.started_at);
			} else {
				next = SurveyState {
					session_id: snapshot.session_id,
					started_at: snapshot.started_at,
					paths,
					current_question_id: None,
					is_completed: false,
				};
				next.sync_progress();
			}
		}
		SurveyCommand::Answer {
			question_id,
			answers,
			custom_answers,
			timestamp,
		} => {
			let Some(question) = graph.question(&question_id) else {
				warn!("answer for unknown question {question_id} ignored");
				return next;
			};
			let Some(path) = next.active_path_mut() else {
				warn!("answer for {question_id} ignored: no active path");
				return next;
			};

			let mut next_questions: Vec<String> = Vec::new();
			for value in &answers {
				let Some(choice) = graph.resolve_answer(&question_id, value) else {
					continue;
				};
				let target = &choice.target_question_id;
				if graph.contains(target) && !next_questions.contains(target) {
					next_questions.push(target.clone());
				}
			}

			let floor = path.latest().map_or(0, |e| e.timestamp.saturating_add(1));
			let entry = ResponseEntry {
				question_id: question_id.clone(),
				question_text: question.label.clone(),
				question_type: question.kind.clone(),
				selected_answers: answers,
				custom_answers,
				timestamp: timestamp.max(floor),
				next_questions,
			};
			path.current_question_id = entry.next_questions.first().cloned();
			debug!(
				"answered {question_id} on {}, next {:?}",
				path.path_id, path.current_question_id
			);
			path.responses.insert(question_id, entry);
			next.sync_progress();
		}
		SurveyCommand::NavigateTo {
			question_id,
			path_id,
		} => {
			if let Some(path) = next.paths.iter_mut().find(|p| p.path_id == path_id) {
				path.current_question_id = Some(question_id);
			}
			next.sync_progress();
		}
		SurveyCommand::GoBack => {
			let Some(path) = next.active_path_mut() else {
				return next;
			};
			let Some(latest) = path.latest().map(|e| e.question_id.clone()) else {
				return next;
			};
			path.responses.remove(&latest);
			path.current_question_id = Some(latest);
			next.sync_progress();
		}
	}
	next
}

fn fresh(graph: &QuestionGraph, session_id: String, timestamp: u64) -> SurveyState {
	let mut state = SurveyState {
		session_id,
		started_at: timestamp,
		paths: vec![UserPath::new(
			INITIAL_PATH_ID,
			graph.start_question_id.clone(),
			timestamp,
		)],
		current_question_id: None,
		is_completed: false,
	};
	state.sync_progress();
	state
}
