//! Projection of the builder state into drawable primitives, plus hit testing.
//!
//! A [`Scene`] is rebuilt for every frame. Only visible nodes are emitted and
//! an edge is dropped unless both of its ends made it in.

use std::collections::{BTreeMap, BTreeSet};

use super::layout::{CHOICE_HEIGHT, LayoutEngine};
use super::state::FlowState;
use super::types::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl Rect {
	pub fn contains(&self, p: Point) -> bool {
		p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
	}

	pub fn center(&self) -> Point {
		Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}

	pub fn left_middle(&self) -> Point {
		Point::new(self.x, self.y + self.height / 2.0)
	}

	pub fn right_middle(&self) -> Point {
		Point::new(self.x + self.width, self.y + self.height / 2.0)
	}
}

/// Axis-aligned box around every drawn node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	pub min: Point,
	pub max: Point,
}

impl Bounds {
	pub fn width(&self) -> f64 {
		self.max.x - self.min.x
	}

	pub fn height(&self) -> f64 {
		self.max.y - self.min.y
	}

	pub fn center(&self) -> Point {
		Point::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
	}

	fn include(&mut self, r: &Rect) {
		self.min.x = self.min.x.min(r.x);
		self.min.y = self.min.y.min(r.y);
		self.max.x = self.max.x.max(r.x + r.width);
		self.max.y = self.max.y.max(r.y + r.height);
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
	Question {
		question_id: String,
		label: String,
		rect: Rect,
		is_highlighted: bool,
		is_expanded: bool,
		has_selection: bool,
	},
	Choice {
		question_id: String,
		choice_id: String,
		label: String,
		/// Offset from the parent question's top-left corner.
		offset: Point,
		rect: Rect,
		is_selected: bool,
	},
}

impl SceneNode {
	pub fn rect(&self) -> &Rect {
		match self {
			SceneNode::Question { rect, .. } | SceneNode::Choice { rect, .. } => rect,
		}
	}
}

/// All edges share one style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeStyle {
	#[default]
	Bezier,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneEdge {
	pub id: String,
	pub from: Point,
	pub to: Point,
	pub style: EdgeStyle,
	pub arrow: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hit {
	Question(String),
	Choice { question_id: String, choice_id: String },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
	/// Draw order: each question followed by its choice pills.
	pub nodes: Vec<SceneNode>,
	pub edges: Vec<SceneEdge>,
}

impl Scene {
	/// Topmost element under `p`. Pills are drawn over their card, and later
	/// nodes over earlier ones, so the scan runs back to front.
	pub fn hit_test(&self, p: Point) -> Option<Hit> {
		self.nodes.iter().rev().find(|n| n.rect().contains(p)).map(|n| match n {
			SceneNode::Question { question_id, .. } => Hit::Question(question_id.clone()),
			SceneNode::Choice {
				question_id,
				choice_id,
				..
			} => Hit::Choice {
				question_id: question_id.clone(),
				choice_id: choice_id.clone(),
			},
		})
	}

	pub fn bounds(&self) -> Option<Bounds> {
		let mut nodes = self.nodes.iter();
		let first = *nodes.next()?.rect();
		let mut bounds = Bounds {
			min: Point::new(first.x, first.y),
			max: Point::new(first.x + first.width, first.y + first.height),
		};
		for node in nodes {
			bounds.include(node.rect());
		}
		Some(bounds)
	}

	pub fn question_rect(&self, question_id: &str) -> Option<&Rect> {
		self.nodes.iter().find_map(|n| match n {
			SceneNode::Question { question_id: id, rect, .. } if id == question_id => Some(rect),
			_ => None,
		})
	}

	pub fn choice_rect(&self, question_id: &str, choice_id: &str) -> Option<&Rect> {
		self.nodes.iter().find_map(|n| match n {
			SceneNode::Choice {
				question_id: q,
				choice_id: c,
				rect,
				..
			} if q == question_id && c == choice_id => Some(rect),
			_ => None,
		})
	}
}

/// Builds the scene for `state`. `preview` draws one node at a temporary
/// position (a drag in flight) without touching the state.
pub fn project(state: &FlowState, layout: &LayoutEngine<'_>, preview: Option<(&str, Point)>) -> Scene {
	let graph = layout.graph();
	let mut scene = Scene::default();
	let mut drawn = BTreeSet::new();
	let mut pills: BTreeMap<(String, String), Rect> = BTreeMap::new();

	for node in state.nodes().filter(|n| n.children_visible) {
		let (Some(question), Some(metrics), Some(offsets)) = (
			graph.question(&node.question_id),
			layout.metrics(&node.question_id),
			layout.choice_offsets(&node.question_id),
		) else {
			continue;
		};
		let position = match preview {
			Some((id, p)) if id == node.question_id => p,
			_ => node.position,
		};
		scene.nodes.push(SceneNode::Question {
			question_id: node.question_id.clone(),
			label: question.label.clone(),
			rect: Rect {
				x: position.x,
				y: position.y,
				width: metrics.container_width,
				height: metrics.container_height,
			},
			is_highlighted: node.is_highlighted,
			is_expanded: node.is_expanded,
			has_selection: !node.selected_choice_ids.is_empty(),
		});
		drawn.insert(node.question_id.as_str());

		for ((choice, offset), width) in question.choices.iter().zip(offsets).zip(&metrics.choice_widths) {
			let origin = position.offset(offset);
			let rect = Rect {
				x: origin.x,
				y: origin.y,
				width: *width,
				height: CHOICE_HEIGHT,
			};
			pills.insert((node.question_id.clone(), choice.id.clone()), rect);
			scene.nodes.push(SceneNode::Choice {
				question_id: node.question_id.clone(),
				choice_id: choice.id.clone(),
				label: choice.label.clone(),
				offset,
				rect,
				is_selected: node.is_selected(&choice.id),
			});
		}
	}

	for edge in state.edges().iter().filter(|e| e.is_visible) {
		if !drawn.contains(edge.source_question_id.as_str()) || !drawn.contains(edge.target.as_str()) {
			continue;
		}
		let key = (edge.source_question_id.clone(), edge.source_choice_id.clone());
		let (Some(pill), Some(target)) = (pills.get(&key), scene.question_rect(&edge.target)) else {
			continue;
		};
		let (from, to) = (pill.right_middle(), target.left_middle());
		scene.edges.push(SceneEdge {
			id: edge.id.clone(),
			from,
			to,
			style: EdgeStyle::Bezier,
			arrow: true,
		});
	}
	scene
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
					{"id": "b", "label": "B", "targetQuestionId": "q3"}
				]},
				"q2": {"id": "q2", "label": "Two"},
				"q3": {"id": "q3", "label": "Three"}
			}
		}"#,
		)
		.unwrap()
	}

	#[test]
	fn start_only_scene() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let scene = project(&FlowState::new("q1"), &layout, None);
		assert_eq!(scene.nodes.len(), 3);
		assert!(scene.edges.is_empty());
		assert!(matches!(
			&scene.nodes[2],
			SceneNode::Choice { choice_id, is_selected: false, .. } if choice_id == "b"
		));
	}

	#[test]
	fn edges_join_pill_to_target() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "a");
		let scene = project(&state, &layout, None);

		assert_eq!(scene.edges.len(), 1);
		let edge = &scene.edges[0];
		assert_eq!(edge.style, EdgeStyle::Bezier);
		assert!(edge.arrow);
		assert_eq!(edge.from, scene.choice_rect("q1", "a").unwrap().right_middle());
		assert_eq!(edge.to, scene.question_rect("q2").unwrap().left_middle());
	}

	#[test]
	fn hidden_nodes_and_their_edges_are_skipped() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "a");
		state.toggle_branch("q1");
		let scene = project(&state, &layout, None);
		assert!(scene.question_rect("q2").is_none());
		assert!(scene.edges.is_empty());
	}

	#[test]
	fn pill_wins_over_card() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let scene = project(&FlowState::new("q1"), &layout, None);
		let pill = scene.choice_rect("q1", "a").unwrap();
		assert_eq!(
			scene.hit_test(pill.center()),
			Some(Hit::Choice {
				question_id: "q1".into(),
				choice_id: "a".into()
			})
		);
		let card = scene.question_rect("q1").unwrap();
		assert_eq!(
			scene.hit_test(Point::new(card.x + 5.0, card.y + 5.0)),
			Some(Hit::Question("q1".into()))
		);
		assert_eq!(scene.hit_test(Point::new(-1000.0, -1000.0)), None);
	}

	#[test]
	fn preview_moves_node_and_edges() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "a");
		let moved = project(&state, &layout, Some(("q2", Point::new(900.0, 40.0))));
		let rect = moved.question_rect("q2").unwrap();
		assert_eq!((rect.x, rect.y), (900.0, 40.0));
		assert_eq!(moved.edges[0].to, rect.left_middle());
		assert_ne!(state.node("q2").unwrap().position, Point::new(900.0, 40.0));
	}

	#[test]
	fn bounds_cover_all_nodes() {
		let graph = graph();
		let layout = LayoutEngine::new(&graph, &HeuristicMeasure);
		let mut state = FlowState::new("q1");
		state.select_choice(&layout, "q1", "b");
		let scene = project(&state, &layout, None);
		let bounds = scene.bounds().unwrap();
		for node in &scene.nodes {
			let r = node.rect();
			assert!(r.x >= bounds.min.x && r.x + r.width <= bounds.max.x);
			assert!(r.y >= bounds.min.y && r.y + r.height <= bounds.max.y);
		}
		assert!(Scene::default().bounds().is_none());
	}
}
