use log::debug;

use super::layout::{LayoutEngine, MetricsCache, TextMeasure};
use super::scene::{self, Bounds, Hit, Scene};
use super::state::FlowState;
use super::types::Point;
use crate::survey::{QuestionGraph, ResponseEntry};

pub const DEFAULT_ZOOM: f64 = 0.9;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 2.0;
pub const FIT_PADDING: f64 = 0.2;
/// Screen pixels a press may travel before it counts as a drag.
pub const DRAG_THRESHOLD: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: DEFAULT_ZOOM,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> Point {
		Point::new((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	/// Zooms by `factor` keeping the graph point under `(sx, sy)` fixed.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
		let k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = k / self.k;
		self.x = sx - (sx - self.x) * ratio;
		self.y = sy - (sy - self.y) * ratio;
		self.k = k;
	}
}

/// Transform that centres `bounds` in a `width` x `height` viewport with
/// `padding` as a fraction of the content size.
pub fn fit_transform(bounds: Bounds, width: f64, height: f64, padding: f64) -> Option<ViewTransform> {
	let (bw, bh) = (bounds.width(), bounds.height());
	if bw <= 0.0 || bh <= 0.0 || width <= 0.0 || height <= 0.0 {
		return None;
	}
	let k = (width / (bw * (1.0 + padding)))
		.min(height / (bh * (1.0 + padding)))
		.clamp(MIN_ZOOM, MAX_ZOOM);
	let center = bounds.center();
	Some(ViewTransform {
		x: width / 2.0 - center.x * k,
		y: height / 2.0 - center.y * k,
		k,
	})
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	/// What the press landed on.
	pub hit: Option<Hit>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start: Point,
	/// The pointer has travelled past the click threshold.
	pub moved: bool,
	/// Position shown while the drag is in flight.
	pub preview: Option<Point>,
}

impl DragState {
	fn past_threshold(&self, x: f64, y: f64) -> bool {
		(x - self.start_x).hypot(y - self.start_y) > DRAG_THRESHOLD
	}
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// Everything the diagram canvas owns: the derived graph, the camera and the
/// gesture in progress.
pub struct DiagramView {
	graph: &'static QuestionGraph,
	measure: Box<dyn TextMeasure>,
	metrics: MetricsCache,
	pub flow: FlowState,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	fitted: bool,
}

impl DiagramView {
	pub fn new(graph: &'static QuestionGraph, measure: Box<dyn TextMeasure>, width: f64, height: f64) -> Self {
		Self {
			graph,
			measure,
			metrics: MetricsCache::default(),
			flow: FlowState::new(graph.start_question_id.clone()),
			transform: ViewTransform::default(),
			drag: DragState::default(),
			pan: PanState::default(),
			width,
			height,
			fitted: false,
		}
	}

	pub fn layout(&self) -> LayoutEngine<'_> {
		LayoutEngine::with_cache(self.graph, self.measure.as_ref(), self.metrics.clone())
	}

	/// Replaces the diagram with one rebuilt from the response log. Local
	/// edits and any gesture in progress are dropped.
	pub fn rebuild<'r>(&mut self, responses: impl IntoIterator<Item = &'r ResponseEntry>) {
		let layout = LayoutEngine::with_cache(self.graph, self.measure.as_ref(), self.metrics.clone());
		self.flow = FlowState::from_responses(&layout, responses);
		self.drag = DragState::default();
		debug!("diagram rebuilt with {} nodes", self.flow.nodes().count());
	}

	pub fn scene(&self) -> Scene {
		let preview = match (&self.drag.hit, self.drag.preview) {
			(Some(Hit::Question(id)), Some(position)) => Some((id.as_str(), position)),
			_ => None,
		};
		scene::project(&self.flow, &self.layout(), preview)
	}

	pub fn hit_at(&self, sx: f64, sy: f64) -> Option<Hit> {
		self.scene().hit_test(self.transform.screen_to_graph(sx, sy))
	}

	pub fn reset_view(&mut self) {
		self.transform = ViewTransform::default();
	}

	/// Fits the content once, after the first frame that has something to
	/// show. Later calls do nothing.
	pub fn fit_once(&mut self, scene: &Scene) {
		if self.fitted {
			return;
		}
		let Some(bounds) = scene.bounds() else {
			return;
		};
		self.fitted = true;
		if let Some(transform) = fit_transform(bounds, self.width, self.height, FIT_PADDING) {
			self.transform = transform;
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Primary button pressed at screen `(x, y)`.
	pub fn press(&mut self, x: f64, y: f64) {
		match self.hit_at(x, y) {
			Some(hit) => {
				let node_start = match &hit {
					Hit::Question(id) => self.flow.node(id).map(|n| n.position).unwrap_or_default(),
					Hit::Choice { .. } => Point::default(),
				};
				self.drag = DragState {
					active: true,
					hit: Some(hit),
					start_x: x,
					start_y: y,
					node_start,
					moved: false,
					preview: None,
				};
			}
			None => {
				self.pan = PanState {
					active: true,
					start_x: x,
					start_y: y,
					transform_start_x: self.transform.x,
					transform_start_y: self.transform.y,
				};
			}
		}
	}

	pub fn pointer_move(&mut self, x: f64, y: f64) {
		if self.drag.active {
			self.drag.moved |= self.drag.past_threshold(x, y);
			if self.drag.moved && matches!(self.drag.hit, Some(Hit::Question(_))) {
				let k = self.transform.k;
				self.drag.preview = Some(self.drag.node_start.offset(Point::new(
					(x - self.drag.start_x) / k,
					(y - self.drag.start_y) / k,
				)));
			}
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (x - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (y - self.pan.start_y);
		}
	}

	/// Primary button released. A press that never turned into a drag is a
	/// click: select on a choice pill, toggle on a question body. A pill
	/// pressed and dragged away is left alone.
	pub fn release(&mut self) {
		let drag = std::mem::take(&mut self.drag);
		self.pan.active = false;
		if !drag.active {
			return;
		}
		match (drag.hit, drag.preview) {
			(Some(Hit::Question(id)), Some(position)) => {
				self.flow.move_node(&id, position);
			}
			(Some(Hit::Question(id)), None) => {
				self.flow.toggle_branch(&id);
			}
			(Some(Hit::Choice { question_id, choice_id }), _) if !drag.moved => {
				let layout = LayoutEngine::with_cache(self.graph, self.measure.as_ref(), self.metrics.clone());
				self.flow.select_choice(&layout, &question_id, &choice_id);
			}
			_ => {}
		}
	}

	/// Pointer left the canvas: abandon the gesture without applying it.
	pub fn cancel(&mut self) {
		self.drag = DragState::default();
		self.pan.active = false;
	}

	/// Secondary click. Returns whether a choice was deselected.
	pub fn context_click(&mut self, x: f64, y: f64) -> bool {
		match self.hit_at(x, y) {
			Some(Hit::Choice { question_id, choice_id }) => self.flow.deselect_choice(&question_id, &choice_id),
			_ => false,
		}
	}

	pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		self.transform.zoom_at(x, y, factor);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow_diagram::layout::HeuristicMeasure;
	use std::sync::LazyLock;

	static GRAPH: LazyLock<QuestionGraph> = LazyLock::new(|| {
		QuestionGraph::from_json(
			r#"{
			"startQuestionId": "q1",
			"questions": {
				"q1": {"id": "q1", "label": "Root", "choices": [
					{"id": "a", "label": "A", "targetQuestionId": "q2"}
				]},
				"q2": {"id": "q2", "label": "Leaf"}
			}
		}"#,
		)
		.unwrap()
	});

	fn view() -> DiagramView {
		let mut view = DiagramView::new(&GRAPH, Box::new(HeuristicMeasure), 1000.0, 800.0);
		view.transform = ViewTransform { x: 0.0, y: 0.0, k: 1.0 };
		view
	}

	fn pill_center(view: &DiagramView, question_id: &str, choice_id: &str) -> (f64, f64) {
		let scene = view.scene();
		let rect = scene.choice_rect(question_id, choice_id).unwrap();
		let c = rect.center();
		(c.x, c.y)
	}

	#[test]
	fn zoom_keeps_cursor_point_and_clamps() {
		let mut t = ViewTransform { x: 10.0, y: 20.0, k: 1.0 };
		let before = t.screen_to_graph(300.0, 200.0);
		t.zoom_at(300.0, 200.0, 1.1);
		let after = t.screen_to_graph(300.0, 200.0);
		assert!((before.x - after.x).abs() < 1e-9);
		assert!((before.y - after.y).abs() < 1e-9);
		for _ in 0..100 {
			t.zoom_at(0.0, 0.0, 1.1);
		}
		assert_eq!(t.k, MAX_ZOOM);
		for _ in 0..100 {
			t.zoom_at(0.0, 0.0, 0.9);
		}
		assert_eq!(t.k, MIN_ZOOM);
	}

	#[test]
	fn fit_centres_and_clamps() {
		let bounds = Bounds {
			min: Point::new(100.0, 100.0),
			max: Point::new(2500.0, 1100.0),
		};
		let t = fit_transform(bounds, 1000.0, 800.0, 0.2).unwrap();
		assert!((t.k - 1000.0 / 2880.0).abs() < 1e-9);
		let centre = t.screen_to_graph(500.0, 400.0);
		assert!((centre.x - 1300.0).abs() < 1e-9);
		assert!((centre.y - 600.0).abs() < 1e-9);

		let tiny = Bounds {
			min: Point::new(0.0, 0.0),
			max: Point::new(1.0, 1.0),
		};
		assert_eq!(fit_transform(tiny, 1000.0, 800.0, 0.2).unwrap().k, MAX_ZOOM);
		assert!(fit_transform(bounds, 0.0, 800.0, 0.2).is_none());
	}

	#[test]
	fn fit_runs_once() {
		let mut v = view();
		let scene = v.scene();
		v.fit_once(&scene);
		let fitted = v.transform;
		v.transform = ViewTransform::default();
		v.fit_once(&scene);
		assert_eq!(v.transform, ViewTransform::default());
		assert_ne!(fitted, ViewTransform::default());
	}

	#[test]
	fn click_on_pill_selects_and_context_click_deselects() {
		let mut v = view();
		let (x, y) = pill_center(&v, "q1", "a");
		v.press(x, y);
		v.release();
		assert!(v.flow.node("q1").unwrap().is_selected("a"));
		assert!(v.flow.node("q2").unwrap().children_visible);

		assert!(v.context_click(x, y));
		assert!(!v.flow.node("q1").unwrap().is_selected("a"));
		assert!(!v.flow.node("q2").unwrap().children_visible);
	}

	#[test]
	fn pill_dragged_away_is_not_selected() {
		let mut v = view();
		let (x, y) = pill_center(&v, "q1", "a");
		v.press(x, y);
		v.pointer_move(x + 40.0, y + 40.0);
		v.pointer_move(x, y);
		v.release();
		assert!(!v.flow.node("q1").unwrap().is_selected("a"));
		assert!(v.flow.node("q2").is_none());

		v.press(x, y);
		v.pointer_move(x + 1.0, y + 1.0);
		v.release();
		assert!(v.flow.node("q1").unwrap().is_selected("a"));
	}

	#[test]
	fn drag_previews_then_commits() {
		let mut v = view();
		let origin = v.flow.node("q1").unwrap().position;
		let (x, y) = (origin.x + 10.0, origin.y + 10.0);
		v.press(x, y);
		v.pointer_move(x + 50.0, y + 30.0);
		assert_eq!(v.flow.node("q1").unwrap().position, origin);
		assert_eq!(v.drag.preview, Some(Point::new(origin.x + 50.0, origin.y + 30.0)));
		v.release();
		assert_eq!(v.flow.node("q1").unwrap().position, Point::new(origin.x + 50.0, origin.y + 30.0));
		assert!(!v.flow.node("q1").unwrap().is_highlighted);
	}

	#[test]
	fn click_on_body_toggles_highlight() {
		let mut v = view();
		let origin = v.flow.node("q1").unwrap().position;
		v.press(origin.x + 10.0, origin.y + 10.0);
		v.release();
		assert!(v.flow.node("q1").unwrap().is_highlighted);
	}

	#[test]
	fn cancelled_drag_changes_nothing() {
		let mut v = view();
		let origin = v.flow.node("q1").unwrap().position;
		v.press(origin.x + 10.0, origin.y + 10.0);
		v.pointer_move(origin.x + 200.0, origin.y + 10.0);
		v.cancel();
		v.release();
		assert_eq!(v.flow.node("q1").unwrap().position, origin);
		assert!(!v.flow.node("q1").unwrap().is_highlighted);
	}

	#[test]
	fn background_drag_pans() {
		let mut v = view();
		v.press(-500.0, -500.0);
		v.pointer_move(-480.0, -490.0);
		assert_eq!((v.transform.x, v.transform.y), (20.0, 10.0));
		v.release();
		assert!(!v.pan.active);
	}

	#[test]
	fn reset_view_leaves_graph_alone() {
		let mut v = view();
		let (x, y) = pill_center(&v, "q1", "a");
		v.press(x, y);
		v.release();
		let flow = v.flow.clone();
		v.transform = ViewTransform { x: 5.0, y: 5.0, k: 1.7 };
		v.reset_view();
		assert_eq!(v.transform, ViewTransform { x: 0.0, y: 0.0, k: 0.9 });
		assert_eq!(v.flow, flow);
	}
}
