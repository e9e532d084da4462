/// Diagram-space coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn offset(self, by: Point) -> Self {
		Self::new(self.x + by.x, self.y + by.y)
	}
}

/// Derived state of one instantiated question node.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualNodeState {
	pub question_id: String,
	/// Top-left corner. Manual drags overwrite it.
	pub position: Point,
	pub is_highlighted: bool,
	/// Activated choices, in activation order.
	pub selected_choice_ids: Vec<String>,
	pub is_expanded: bool,
	/// Whether the node itself is currently drawn.
	pub children_visible: bool,
}

impl VisualNodeState {
	pub fn new(question_id: impl Into<String>, position: Point) -> Self {
		Self {
			question_id: question_id.into(),
			position,
			is_highlighted: false,
			selected_choice_ids: Vec::new(),
			is_expanded: false,
			children_visible: true,
		}
	}

	pub fn is_selected(&self, choice_id: &str) -> bool {
		self.selected_choice_ids.iter().any(|c| c == choice_id)
	}
}

/// Derived state of a choice edge.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualEdgeState {
	/// `{question}-{choice}-{target}`.
	pub id: String,
	/// Choice sub-node the edge leaves from.
	pub source: String,
	pub source_choice_id: String,
	pub source_question_id: String,
	pub target: String,
	pub is_visible: bool,
}

pub fn edge_id(question_id: &str, choice_id: &str, target: &str) -> String {
	format!("{question_id}-{choice_id}-{target}")
}

pub fn choice_node_id(question_id: &str, choice_id: &str) -> String {
	format!("choice-{question_id}-{choice_id}")
}
