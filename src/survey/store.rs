//! Reactive survey store, injected through Leptos context.

use std::collections::BTreeMap;
use std::sync::Arc;

use leptos::prelude::*;
use log::info;

use super::graph::QuestionGraph;
use super::responses::{ResponseEntry, SurveyCommand, SurveyState, reduce};
use super::storage::{SurveyStorage, now_ms};

/// Storage handle shared by the store.
pub type SharedStorage = Arc<dyn SurveyStorage + Send + Sync>;

/// Source of epoch-millisecond timestamps.
pub type Clock = fn() -> u64;

/// Survey state container. Every mutation goes through [`SurveyStore::dispatch`].
#[derive(Clone)]
pub struct SurveyStore {
	/// Current survey state.
	pub state: RwSignal<SurveyState>,
	graph: &'static QuestionGraph,
	storage: SharedStorage,
	clock: Clock,
}

impl SurveyStore {
	/// Resumes an unfinished stored session, or starts a new one.
	pub fn new(graph: &'static QuestionGraph, storage: SharedStorage) -> Self {
		Self::with_clock(graph, storage, now_ms)
	}

	/// Like [`SurveyStore::new`], stamping answers and snapshots with `clock`.
	pub fn with_clock(graph: &'static QuestionGraph, storage: SharedStorage, clock: Clock) -> Self {
		let command = match storage.load() {
			Some(snapshot) if !snapshot.is_completed => {
				info!("resuming session {}", snapshot.session_id);
				SurveyCommand::Restore(snapshot)
			}
			_ => SurveyCommand::Start {
				session_id: storage.session_id(),
				timestamp: clock(),
			},
		};
		let initial = reduce(&SurveyState::default(), graph, command);
		Self {
			state: RwSignal::new(initial),
			graph,
			storage,
			clock,
		}
	}

	/// Installs the store as context for descendants.
	pub fn provide(self) -> Self {
		provide_context(self.clone());
		self
	}

	/// The store provided by an ancestor.
	pub fn expect() -> Self {
		expect_context::<Self>()
	}

	/// Question graph the survey runs on.
	pub fn graph(&self) -> &'static QuestionGraph {
		self.graph
	}

	/// Response log of the active path. Notifies only when an answer is
	/// added, replaced or removed.
	pub fn active_responses(&self) -> Memo<Option<BTreeMap<String, ResponseEntry>>> {
		let state = self.state;
		Memo::new(move |_| state.with(|s| s.active_path().map(|p| p.responses.clone())))
	}

	/// Applies a command and persists the result.
	pub fn dispatch(&self, command: SurveyCommand) {
		let persist = !matches!(command, SurveyCommand::Restore(_));
		let graph = self.graph;
		self.state.update(|state| *state = reduce(state, graph, command));
		if persist {
			let snapshot = self.state.with_untracked(|state| state.to_snapshot((self.clock)()));
			self.storage.save(&snapshot);
		}
	}

	/// Records an answer to `question_id`.
	pub fn answer(&self, question_id: String, answers: Vec<String>, custom_answers: Option<Vec<String>>) {
		self.dispatch(SurveyCommand::Answer {
			question_id,
			answers,
			custom_answers,
			timestamp: (self.clock)(),
		});
	}

	/// Steps back over the most recent answer.
	pub fn go_back(&self) {
		self.dispatch(SurveyCommand::GoBack);
	}

	/// Deletes stored answers and restarts under a new session.
	pub fn clear(&self) {
		self.storage.clear();
		self.dispatch(SurveyCommand::Start {
			session_id: self.storage.session_id(),
			timestamp: (self.clock)(),
		});
	}
}

#[cfg(test)]
mod tests {
	use std::sync::LazyLock;

	use leptos::reactive::owner::Owner;

	use super::*;
	use crate::survey::responses::INITIAL_PATH_ID;
	use crate::survey::storage::{DATA_KEY, KeyValueStore, LocalSurveyData, MemoryStorage, SESSION_ID_KEY};

	static GRAPH: LazyLock<QuestionGraph> = LazyLock::new(|| {
		QuestionGraph::from_json(
			r#"{
			"startQuestionId": "q1",
			"questions": {
				"q1": {"id": "q1", "label": "One", "choices": [
					{"id": "yes", "label": "Yes", "targetQuestionId": "q2"},
					{"id": "done", "label": "Done", "targetQuestionId": "q404"}
				]},
				"q2": {"id": "q2", "label": "Two"}
			}
		}"#,
		)
		.unwrap()
	});

	fn clock() -> u64 {
		1_000
	}

	fn snapshot(session_id: &str, answer: &str) -> LocalSurveyData {
		let state = reduce(
			&SurveyState::default(),
			&GRAPH,
			SurveyCommand::Start {
				session_id: session_id.into(),
				timestamp: 10,
			},
		);
		let state = reduce(
			&state,
			&GRAPH,
			SurveyCommand::Answer {
				question_id: "q1".into(),
				answers: vec![answer.into()],
				custom_answers: None,
				timestamp: 20,
			},
		);
		state.to_snapshot(30)
	}

	fn store_over(storage: &Arc<MemoryStorage>) -> SurveyStore {
		SurveyStore::with_clock(&GRAPH, storage.clone(), clock)
	}

	#[test]
	fn startup_resumes_unfinished_session() {
		Owner::new().with(|| {
			let storage = Arc::new(MemoryStorage::new());
			storage.save(&snapshot("session_7_a", "yes"));
			let store = store_over(&storage);
			store.state.with_untracked(|s| {
				assert_eq!(s.session_id, "session_7_a");
				assert_eq!(s.answered_count(), 1);
				assert_eq!(s.current_question_id.as_deref(), Some("q2"));
			});
		});
	}

	#[test]
	fn startup_ignores_finished_session() {
		Owner::new().with(|| {
			let storage = Arc::new(MemoryStorage::new());
			let finished = snapshot("session_7_a", "done");
			assert!(finished.is_completed);
			storage.save(&finished);
			storage.set(SESSION_ID_KEY, "session_8_b").unwrap();

			let store = store_over(&storage);
			store.state.with_untracked(|s| {
				assert_eq!(s.session_id, "session_8_b");
				assert_eq!(s.started_at, 1_000);
				assert_eq!(s.answered_count(), 0);
				assert_eq!(s.current_question_id.as_deref(), Some("q1"));
			});
		});
	}

	#[test]
	fn every_command_but_restore_is_saved() {
		Owner::new().with(|| {
			let storage = Arc::new(MemoryStorage::new());
			let store = store_over(&storage);

			store.answer("q1".into(), vec!["yes".into()], None);
			let saved = storage.load().unwrap();
			assert_eq!(saved.last_updated, 1_000);
			assert!(saved.current_paths[0].responses.contains_key("q1"));

			store.go_back();
			assert!(storage.load().unwrap().current_paths[0].responses.is_empty());

			store.dispatch(SurveyCommand::NavigateTo {
				question_id: "q2".into(),
				path_id: INITIAL_PATH_ID.into(),
			});
			assert_eq!(
				storage.load().unwrap().current_paths[0].current_question_id.as_deref(),
				Some("q2")
			);

			let before = storage.get(DATA_KEY).unwrap();
			store.dispatch(SurveyCommand::Restore(snapshot("session_other", "yes")));
			assert_eq!(store.state.with_untracked(|s| s.session_id.clone()), "session_other");
			assert_eq!(storage.get(DATA_KEY).unwrap(), before);
		});
	}

	#[test]
	fn clear_wipes_storage_then_starts_over() {
		Owner::new().with(|| {
			let storage = Arc::new(MemoryStorage::new());
			storage.set(SESSION_ID_KEY, "session_1_old").unwrap();
			storage.save(&snapshot("session_1_old", "yes"));
			let store = store_over(&storage);

			store.clear();
			let session_id = store.state.with_untracked(|s| {
				assert_eq!(s.answered_count(), 0);
				assert_eq!(s.current_question_id.as_deref(), Some("q1"));
				s.session_id.clone()
			});
			assert_ne!(session_id, "session_1_old");
			assert_eq!(storage.get(SESSION_ID_KEY).unwrap(), Some(session_id.clone()));
			let saved = storage.load().unwrap();
			assert_eq!(saved.session_id, session_id);
			assert!(saved.current_paths[0].responses.is_empty());
		});
	}

	#[test]
	fn active_responses_ignore_navigation() {
		Owner::new().with(|| {
			let storage = Arc::new(MemoryStorage::new());
			let store = store_over(&storage);
			let responses = store.active_responses();
			store.answer("q1".into(), vec!["yes".into()], None);
			let answered = responses.get_untracked();
			assert!(answered.as_ref().is_some_and(|r| r.contains_key("q1")));

			store.dispatch(SurveyCommand::NavigateTo {
				question_id: "q1".into(),
				path_id: INITIAL_PATH_ID.into(),
			});
			assert_eq!(responses.get_untracked(), answered);

			store.go_back();
			assert!(responses.get_untracked().is_some_and(|r| r.is_empty()));
		});
	}
}
