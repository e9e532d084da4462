//! Node geometry. Everything here is a pure function of the question graph
//! and the text measurer, so rebuilding the diagram from the same answers
//! always lands every node on the same spot.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use web_sys::CanvasRenderingContext2d;
use wasm_bindgen::JsCast;

use super::types::Point;
use crate::survey::QuestionGraph;

pub const MIN_CHOICE_WIDTH: f64 = 120.0;
pub const CONTAINER_PADDING: f64 = 32.0;
pub const TEXT_COLUMN_WIDTH: f64 = 80.0;
pub const MIN_CONTAINER_WIDTH: f64 = 300.0;
pub const MAX_CONTAINER_WIDTH: f64 = 800.0;
pub const HEADER_HEIGHT: f64 = 48.0;
pub const CHOICE_HEIGHT: f64 = 36.0;
pub const CHOICE_SPACING: f64 = 8.0;
pub const CHILD_SPACING: f64 = 40.0;
pub const HORIZONTAL_GAP: f64 = 200.0;
pub const PILL_PADDING: f64 = 24.0;
pub const PILL_BORDER: f64 = 4.0;
pub const CHOICE_COLUMN_PADDING: f64 = 16.0;
pub const PILL_OVERLAP: f64 = 24.0;
pub const START_ORIGIN: Point = Point { x: 100.0, y: 100.0 };
pub const MEASURE_FONT: &str = "500 12px Inter, ui-sans-serif, system-ui, -apple-system";

const FALLBACK_CHAR_WIDTH: f64 = 7.0;
const FALLBACK_MIN_TEXT_WIDTH: f64 = 40.0;

/// Text width in pixels for [`MEASURE_FONT`]. `None` when the rendering
/// surface cannot measure.
pub trait TextMeasure {
	fn text_width(&self, text: &str) -> Option<f64>;
}

/// Never measures; every width comes from the per-character estimate.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicMeasure;

impl TextMeasure for HeuristicMeasure {
	fn text_width(&self, _text: &str) -> Option<f64> {
		None
	}
}

/// Measures against an off-screen canvas.
pub struct CanvasMeasure {
	ctx: CanvasRenderingContext2d,
}

impl CanvasMeasure {
	/// `None` outside a browser or when no 2D context is available.
	pub fn new() -> Option<Self> {
		let document = web_sys::window()?.document()?;
		let canvas = document.create_element("canvas").ok()?;
		let canvas: web_sys::HtmlCanvasElement = canvas.dyn_into().ok()?;
		let ctx: CanvasRenderingContext2d = canvas.get_context("2d").ok()??.dyn_into().ok()?;
		ctx.set_font(MEASURE_FONT);
		Some(Self { ctx })
	}
}

impl TextMeasure for CanvasMeasure {
	fn text_width(&self, text: &str) -> Option<f64> {
		self.ctx.measure_text(text).ok().map(|m| m.width())
	}
}

/// Size of a question node and its choice pills.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeMetrics {
	pub choice_widths: Vec<f64>,
	pub max_choice_width: f64,
	pub container_width: f64,
	pub container_height: f64,
}

/// Metrics already computed, by question id. Only valid for one measurer.
pub type MetricsCache = Rc<RefCell<BTreeMap<String, NodeMetrics>>>;

/// Geometry service consulted for every positioning decision. Its only state
/// is the metrics cache.
pub struct LayoutEngine<'a> {
	graph: &'a QuestionGraph,
	measure: &'a dyn TextMeasure,
	cache: MetricsCache,
}

impl<'a> LayoutEngine<'a> {
	pub fn new(graph: &'a QuestionGraph, measure: &'a dyn TextMeasure) -> Self {
		Self::with_cache(graph, measure, MetricsCache::default())
	}

	/// Engine that reuses `cache`, which must have been filled with the same
	/// graph and measurer.
	pub fn with_cache(graph: &'a QuestionGraph, measure: &'a dyn TextMeasure, cache: MetricsCache) -> Self {
		Self { graph, measure, cache }
	}

	pub fn graph(&self) -> &'a QuestionGraph {
		self.graph
	}

	/// Rendered width of a choice pill.
	pub fn choice_width(&self, label: &str) -> f64 {
		let text = self.measure.text_width(label).unwrap_or_else(|| {
			(label.chars().count() as f64 * FALLBACK_CHAR_WIDTH).max(FALLBACK_MIN_TEXT_WIDTH)
		});
		(text + PILL_PADDING + PILL_BORDER).ceil()
	}

	pub fn metrics(&self, question_id: &str) -> Option<NodeMetrics> {
		if let Some(metrics) = self.cache.borrow().get(question_id) {
			return Some(metrics.clone());
		}
		let metrics = self.measure_node(question_id)?;
		self.cache
			.borrow_mut()
			.insert(question_id.to_string(), metrics.clone());
		Some(metrics)
	}

	fn measure_node(&self, question_id: &str) -> Option<NodeMetrics> {
		let question = self.graph.question(question_id)?;
		let choice_widths: Vec<f64> = question
			.choices
			.iter()
			.map(|c| self.choice_width(&c.label))
			.collect();
		let max_choice_width = choice_widths.iter().copied().fold(MIN_CHOICE_WIDTH, f64::max);
		let container_width = (max_choice_width + CONTAINER_PADDING + TEXT_COLUMN_WIDTH)
			.clamp(MIN_CONTAINER_WIDTH, MAX_CONTAINER_WIDTH);
		let container_height = HEADER_HEIGHT + choices_block_height(choice_widths.len());
		Some(NodeMetrics {
			choice_widths,
			max_choice_width,
			container_width,
			container_height,
		})
	}

	/// Top-left corner for the node reached through `choice_id`.
	///
	/// Children sit `HORIZONTAL_GAP` to the right of the parent. The slots of
	/// all the parent's choices (display order, defined targets only) form a
	/// stack centred on the parent's vertical midpoint.
	pub fn child_position(&self, parent_id: &str, parent: Point, choice_id: &str) -> Option<Point> {
		let question = self.graph.question(parent_id)?;
		let parent_metrics = self.metrics(parent_id)?;

		let mut slot_top = None;
		let mut stack_height = 0.0;
		let mut slots = 0usize;
		for choice in &question.choices {
			let Some(target) = self.metrics(&choice.target_question_id) else {
				continue;
			};
			if slots > 0 {
				stack_height += CHILD_SPACING;
			}
			if choice.id == choice_id {
				slot_top = Some(stack_height);
			}
			stack_height += target.container_height;
			slots += 1;
		}

		let offset = slot_top?;
		let stack_top = parent.y + (parent_metrics.container_height - stack_height) / 2.0;
		Some(Point {
			x: parent.x + parent_metrics.container_width + HORIZONTAL_GAP,
			y: stack_top + offset,
		})
	}

	/// Choice pill offsets relative to their question node, in display order.
	pub fn choice_offsets(&self, question_id: &str) -> Option<Vec<Point>> {
		let metrics = self.metrics(question_id)?;
		let column_left =
			(metrics.container_width - CHOICE_COLUMN_PADDING - metrics.max_choice_width).max(0.0);
		let block = choices_block_height(metrics.choice_widths.len());
		let mut cursor = ((metrics.container_height - block) / 2.0).max(0.0);
		Some(
			metrics
				.choice_widths
				.iter()
				.map(|width| {
					let offset = Point {
						x: column_left + (metrics.max_choice_width - width) + PILL_OVERLAP,
						y: cursor,
					};
					cursor += CHOICE_HEIGHT + CHOICE_SPACING;
					offset
				})
				.collect(),
		)
	}
}

fn choices_block_height(count: usize) -> f64 {
	if count == 0 {
		return 0.0;
	}
	count as f64 * CHOICE_HEIGHT + (count - 1) as f64 * CHOICE_SPACING
}
