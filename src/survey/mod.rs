//! Survey domain: the static question graph, the response log and its
//! persistence.

pub mod graph;
pub mod responses;
pub mod storage;
pub mod store;

pub use graph::{ChoiceSpec, GraphError, QuestionGraph, QuestionKind, QuestionNodeSpec};
pub use responses::{ResponseEntry, SurveyCommand, SurveyState, UserPath, reduce};
pub use storage::{BrowserStorage, LocalSurveyData, MemoryStorage, StorageError, SurveyStorage};
pub use store::SurveyStore;
