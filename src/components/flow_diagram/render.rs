use web_sys::CanvasRenderingContext2d;

use super::layout::MEASURE_FONT;
use super::scene::{EdgeStyle, Rect, Scene, SceneEdge, SceneNode};
use super::view::DiagramView;

const BACKGROUND: &str = "#f8fafc";
const CARD_FILL: &str = "#ffffff";
const CARD_BORDER: &str = "#cbd5e1";
const CARD_HIGHLIGHT: &str = "#2563eb";
const CARD_TEXT: &str = "#0f172a";
const PILL_FILL: &str = "#f1f5f9";
const PILL_SELECTED: &str = "#2563eb";
const PILL_TEXT: &str = "#334155";
const EDGE_COLOR: &str = "#64748b";
const TITLE_FONT: &str = "600 14px Inter, ui-sans-serif, system-ui, -apple-system";

const ARROW_SIZE: f64 = 8.0;
const TEXT_INSET: f64 = 12.0;

pub fn render(view: &DiagramView, scene: &Scene, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, view.width, view.height);
	ctx.save();
	let _ = ctx.translate(view.transform.x, view.transform.y);
	let _ = ctx.scale(view.transform.k, view.transform.k);
	for edge in &scene.edges {
		draw_edge(edge, view.transform.k, ctx);
	}
	for node in &scene.nodes {
		draw_node(node, view.transform.k, ctx);
	}
	ctx.restore();
}

fn draw_edge(edge: &SceneEdge, k: f64, ctx: &CanvasRenderingContext2d) {
	let (from, to) = (edge.from, edge.to);
	let tip_x = if edge.arrow { to.x - ARROW_SIZE } else { to.x };
	ctx.set_stroke_style_str(EDGE_COLOR);
	ctx.set_line_width(1.5 / k.max(0.5));
	ctx.begin_path();
	ctx.move_to(from.x, from.y);
	match edge.style {
		EdgeStyle::Bezier => {
			let mid = (from.x + tip_x) / 2.0;
			ctx.bezier_curve_to(mid, from.y, mid, to.y, tip_x, to.y);
		}
	}
	ctx.stroke();

	if edge.arrow {
		ctx.set_fill_style_str(EDGE_COLOR);
		ctx.begin_path();
		ctx.move_to(to.x, to.y);
		ctx.line_to(tip_x, to.y - ARROW_SIZE * 0.5);
		ctx.line_to(tip_x, to.y + ARROW_SIZE * 0.5);
		ctx.close_path();
		ctx.fill();
	}
}

fn draw_node(node: &SceneNode, k: f64, ctx: &CanvasRenderingContext2d) {
	match node {
		SceneNode::Question {
			label,
			rect,
			is_highlighted,
			is_expanded,
			has_selection,
			..
		} => {
			ctx.set_fill_style_str(CARD_FILL);
			ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
			let (border, width) = if *is_highlighted {
				(CARD_HIGHLIGHT, 2.5)
			} else {
				(CARD_BORDER, 1.0)
			};
			ctx.set_stroke_style_str(border);
			ctx.set_line_width(width / k.max(0.5));
			ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);

			ctx.set_fill_style_str(CARD_TEXT);
			ctx.set_font(TITLE_FONT);
			let marker = match (has_selection, is_expanded) {
				(true, false) => "▸ ",
				_ => "",
			};
			fill_clipped(ctx, &format!("{marker}{label}"), rect, 20.0);
		}
		SceneNode::Choice {
			label,
			rect,
			is_selected,
			..
		} => {
			let (fill, text) = if *is_selected {
				(PILL_SELECTED, "#ffffff")
			} else {
				(PILL_FILL, PILL_TEXT)
			};
			ctx.set_fill_style_str(fill);
			ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
			ctx.set_stroke_style_str(if *is_selected { PILL_SELECTED } else { CARD_BORDER });
			ctx.set_line_width(1.0 / k.max(0.5));
			ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);

			ctx.set_fill_style_str(text);
			ctx.set_font(MEASURE_FONT);
			fill_clipped(ctx, label, rect, rect.height / 2.0 + 4.0);
		}
	}
}

/// Text clipped to the rect so long labels never spill over neighbours.
fn fill_clipped(ctx: &CanvasRenderingContext2d, text: &str, rect: &Rect, baseline: f64) {
	ctx.save();
	ctx.begin_path();
	ctx.rect(rect.x, rect.y, rect.width, rect.height);
	ctx.clip();
	let _ = ctx.fill_text(text, rect.x + TEXT_INSET, rect.y + baseline);
	ctx.restore();
}
