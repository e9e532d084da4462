//! Node-graph diagram of the respondent's path through the survey.

mod component;
pub mod layout;
mod render;
pub mod scene;
pub mod state;
pub mod types;
pub mod view;

pub use component::FlowDiagramCanvas;
pub use layout::{HeuristicMeasure, LayoutEngine, NodeMetrics, TextMeasure};
pub use scene::{EdgeStyle, Hit, Scene, SceneEdge, SceneNode};
pub use state::FlowState;
pub use types::{Point, VisualEdgeState, VisualNodeState};
pub use view::{DiagramView, ViewTransform};
