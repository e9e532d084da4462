//! Incremental graph builder.
//!
//! [`FlowState`] is the derived visual graph: which question nodes have been
//! instantiated, where they sit, which choices are active and what is drawn.
//! It changes in two ways: local diagram gestures (select, deselect, toggle,
//! move) and a full rebuild from the response log, which throws away every
//! local edit.
//!
//! Nodes are never deleted. A node cut off by a deselect stays in the map,
//! hidden, so selecting the same choice again puts it back where it was.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use super::layout::{LayoutEngine, START_ORIGIN};
use super::types::{Point, VisualEdgeState, VisualNodeState, choice_node_id, edge_id};
use crate::survey::ResponseEntry;

#[derive(Clone, Debug, PartialEq)]
pub struct FlowState {
	start_question_id: String,
	nodes: BTreeMap<String, VisualNodeState>,
	/// Instantiation order; drawing follows it.
	order: Vec<String>,
	edges: Vec<VisualEdgeState>,
}

impl FlowState {
	/// A graph holding only the start node, at the fixed origin.
	pub fn new(start_question_id: impl Into<String>) -> Self {
		let start_question_id = start_question_id.into();
		let mut state = Self {
			start_question_id: start_question_id.clone(),
			nodes: BTreeMap::new(),
			order: Vec::new(),
			edges: Vec::new(),
		};
		state.insert_node(VisualNodeState::new(start_question_id, START_ORIGIN));
		state
	}

	/// Rebuilds from scratch by replaying answers in `(timestamp, question)`
	/// order. Answers to questions missing from the graph are skipped. Answers
	/// to questions not yet on the diagram wait until a later answer reaches
	/// them, and are dropped if none does.
	pub fn from_responses<'r>(
		layout: &LayoutEngine<'_>,
		responses: impl IntoIterator<Item = &'r ResponseEntry>,
	) -> Self {
		let graph = layout.graph();
		let mut state = Self::new(graph.start_question_id.clone());

		let mut entries: Vec<&ResponseEntry> = responses.into_iter().collect();
		entries.sort_by(|a, b| {
			a.timestamp
				.cmp(&b.timestamp)
				.then_with(|| a.question_id.cmp(&b.question_id))
		});

		let mut pending: Vec<&ResponseEntry> = Vec::new();
		for entry in entries {
			if !graph.contains(&entry.question_id) {
				warn!("skipping answer to unknown question {}", entry.question_id);
				continue;
			}
			pending.push(entry);
			while let Some(index) = pending
				.iter()
				.position(|e| state.nodes.contains_key(&e.question_id))
			{
				let entry = pending.remove(index);
				state.replay(layout, entry);
			}
		}
		for entry in pending {
			debug!("answer to {} is not reachable from the start", entry.question_id);
		}
		state
	}

	fn replay(&mut self, layout: &LayoutEngine<'_>, entry: &ResponseEntry) {
		for value in &entry.selected_answers {
			let Some(choice) = layout.graph().resolve_answer(&entry.question_id, value) else {
				debug!("answer {value:?} matches no choice of {}", entry.question_id);
				continue;
			};
			let choice_id = choice.id.clone();
			self.apply_selection(layout, &entry.question_id, &choice_id, false);
		}
	}

	pub fn start_question_id(&self) -> &str {
		&self.start_question_id
	}

	pub fn node(&self, question_id: &str) -> Option<&VisualNodeState> {
		self.nodes.get(question_id)
	}

	/// Instantiated nodes, hidden ones included, in instantiation order.
	pub fn nodes(&self) -> impl Iterator<Item = &VisualNodeState> {
		self.order.iter().filter_map(|id| self.nodes.get(id))
	}

	pub fn edges(&self) -> &[VisualEdgeState] {
		&self.edges
	}

	pub fn edge(&self, id: &str) -> Option<&VisualEdgeState> {
		self.edges.iter().find(|e| e.id == id)
	}

	/// Activates a choice from a diagram click.
	///
	/// Highlights and expands the node, instantiates the target on first use
	/// and reveals the edge. Returns `false` and changes nothing when the
	/// question, choice or target is unknown or the node is not on the diagram.
	pub fn select_choice(&mut self, layout: &LayoutEngine<'_>, question_id: &str, choice_id: &str) -> bool {
		self.apply_selection(layout, question_id, choice_id, true)
	}

	fn apply_selection(
		&mut self,
		layout: &LayoutEngine<'_>,
		question_id: &str,
		choice_id: &str,
		highlight: bool,
	) -> bool {
		let graph = layout.graph();
		let Some(choice) = graph.choice(question_id, choice_id) else {
			warn!("no choice {choice_id} on question {question_id}");
			return false;
		};
		let target = choice.target_question_id.as_str();
		if !graph.contains(target) {
			warn!("choice {question_id}/{choice_id} leads to undefined question {target}");
			return false;
		}
		let Some(parent) = self.nodes.get(question_id) else {
			warn!("question {question_id} is not on the diagram");
			return false;
		};

		if !self.nodes.contains_key(target) {
			let Some(position) = layout.child_position(question_id, parent.position, choice_id) else {
				return false;
			};
			self.insert_node(VisualNodeState::new(target, position));
		}

		if let Some(node) = self.nodes.get_mut(question_id) {
			if highlight {
				node.is_highlighted = true;
			}
			node.is_expanded = true;
			if !node.is_selected(choice_id) {
				node.selected_choice_ids.push(choice_id.to_string());
			}
		}

		let id = edge_id(question_id, choice_id, target);
		if self.edge(&id).is_none() {
			self.edges.push(VisualEdgeState {
				id,
				source: choice_node_id(question_id, choice_id),
				source_choice_id: choice_id.to_string(),
				source_question_id: question_id.to_string(),
				target: target.to_string(),
				is_visible: false,
			});
		}
		self.refresh_visibility();
		true
	}

	/// Deactivates a choice. The target's subtree is hidden unless another
	/// visible edge still reaches it; stored positions are kept.
	pub fn deselect_choice(&mut self, question_id: &str, choice_id: &str) -> bool {
		let Some(node) = self.nodes.get_mut(question_id) else {
			return false;
		};
		let before = node.selected_choice_ids.len();
		node.selected_choice_ids.retain(|c| c != choice_id);
		if node.selected_choice_ids.len() == before {
			return false;
		}
		self.refresh_visibility();
		true
	}

	/// Collapses or expands the branch under a node. A node with nothing
	/// selected has no branch, so the click only flips its highlight.
	pub fn toggle_branch(&mut self, question_id: &str) -> bool {
		let Some(node) = self.nodes.get_mut(question_id) else {
			return false;
		};
		if node.selected_choice_ids.is_empty() {
			node.is_highlighted = !node.is_highlighted;
			return true;
		}
		node.is_expanded = !node.is_expanded;
		self.refresh_visibility();
		true
	}

	/// Manual placement. Descendants stay where they are.
	pub fn move_node(&mut self, question_id: &str, position: Point) -> bool {
		match self.nodes.get_mut(question_id) {
			Some(node) => {
				node.position = position;
				true
			}
			None => false,
		}
	}

	/// Start node plus everything reachable through selected choices,
	/// regardless of collapsed branches.
	pub fn present_ids(&self) -> BTreeSet<String> {
		self.walk(false).0
	}

	fn insert_node(&mut self, node: VisualNodeState) {
		self.order.push(node.question_id.clone());
		self.nodes.insert(node.question_id.clone(), node);
	}

	/// Worklist traversal from the start node. Shared targets are visited once.
	/// With `respect_collapse`, collapsed nodes do not pass visibility on.
	fn walk(&self, respect_collapse: bool) -> (BTreeSet<String>, BTreeSet<String>) {
		let mut reached = BTreeSet::new();
		let mut live_edges = BTreeSet::new();
		if !self.nodes.contains_key(&self.start_question_id) {
			return (reached, live_edges);
		}
		reached.insert(self.start_question_id.clone());
		let mut stack = vec![self.start_question_id.clone()];

		while let Some(id) = stack.pop() {
			let Some(node) = self.nodes.get(&id) else {
				continue;
			};
			if respect_collapse && !node.is_expanded {
				continue;
			}
			for edge in &self.edges {
				if edge.source_question_id != id || !node.is_selected(&edge.source_choice_id) {
					continue;
				}
				if !self.nodes.contains_key(&edge.target) {
					continue;
				}
				live_edges.insert(edge.id.clone());
				if reached.insert(edge.target.clone()) {
					stack.push(edge.target.clone());
				}
			}
		}
		(reached, live_edges)
	}

	fn refresh_visibility(&mut self) {
		let (visible, live_edges) = self.walk(true);
		for (id, node) in self.nodes.iter_mut() {
			node.children_visible = visible.contains(id);
		}
		for edge in self.edges.iter_mut() {
			edge.is_visible = live_edges.contains(&edge.id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow_diagram::layout::HeuristicMeasure;
	use crate::survey::QuestionGraph;

	fn graph() -> QuestionGraph {
		QuestionGraph::from_json(
			r#"{
			"startQuestionId": "q1",
			"questions": {
				"q1": {"id": "q1", "label": "Root", "choices": [
					{"id": "a", "label": "A", "targetQuestionId": "q2"},
					{"id": "dead", "label": "Dead end", "targetQuestionId": "q404"}
				]},
				"q2": {"id": "q2", "label": "Two", "choices": [
					{"id": "b", "label": "B", "targetQuestionId": "q3"}
				]},
				"q3": {"id": "q3", "label": "Leaf"}
			}
		}"#,
		)
		.unwrap()
	}

	#[test]
	fn starts_with_start_node_at_origin() {
		let state = FlowState::new("q1");
		let start = state.node("q1").unwrap();
		assert_eq!(start.position, START_ORIGIN);
		assert!(start.children_visible);
		assert!(!start.is_expanded);
		assert!(state.edges().is_empty());
	}

	#[test]
	fn highlight_only_toggle_without_selection() {
		let mut state = FlowState::new("q1");
		assert!(state.toggle_branch("q1"));
		assert!(state.node("q1").unwrap().is_highlighted);
		assert!(!state.node("q1").unwrap().is_expanded);
		assert!(state.toggle_branch("q1"));
		assert!(!state.node("q1").unwrap().is_highlighted);
	}

	#[test]
	fn missing_target_is_skipped() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		let before = state.clone();
		assert!(!state.select_choice(&layout, "q1", "dead"));
		assert!(!state.select_choice(&layout, "q1", "nope"));
		assert!(!state.select_choice(&layout, "q2", "b"));
		assert_eq!(state, before);
	}

	#[test]
	fn move_does_not_cascade() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "a");
		let child = state.node("q2").unwrap().position;
		assert!(state.move_node("q1", Point::new(-50.0, 7.0)));
		assert_eq!(state.node("q1").unwrap().position, Point::new(-50.0, 7.0));
		assert_eq!(state.node("q2").unwrap().position, child);
		assert!(!state.move_node("q404", Point::default()));
	}

	#[test]
	fn select_uses_dragged_parent_position() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.move_node("q1", Point::new(0.0, 0.0));
		state.select_choice(&layout, "q1", "a");
		let expected = layout.child_position("q1", Point::new(0.0, 0.0), "a").unwrap();
		assert_eq!(state.node("q2").unwrap().position, expected);
	}

	#[test]
	fn deselect_unknown_choice_is_noop() {
		let mut state = FlowState::new("q1");
		assert!(!state.deselect_choice("q1", "a"));
		assert!(!state.deselect_choice("q9", "a"));
	}

	#[test]
	fn edges_leave_from_choice_node() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "a");
		let edge = state.edge("q1-a-q2").unwrap();
		assert_eq!(edge.source, "choice-q1-a");
		assert_eq!(edge.target, "q2");
		assert!(edge.is_visible);
	}
}
