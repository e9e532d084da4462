use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::layout::{CanvasMeasure, HeuristicMeasure, TextMeasure};
use super::render;
use super::view::DiagramView;
use crate::survey::SurveyStore;

type Shared<T> = Rc<RefCell<Option<T>>>;

/// Canvas diagram of the active path. Rebuilt whenever the answers change;
/// clicks, drags and the wheel edit the picture locally until the next rebuild.
#[component]
pub fn FlowDiagramCanvas(
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let store = SurveyStore::expect();
	let (survey, graph) = (store.state, store.graph());
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let view: Shared<DiagramView> = Rc::new(RefCell::new(None));
	let animate: Shared<Closure<dyn FnMut()>> = Rc::new(RefCell::new(None));
	let resize_cb: Shared<Closure<dyn FnMut()>> = Rc::new(RefCell::new(None));
	let (view_init, animate_init, resize_cb_init) = (view.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let Some(window) = web_sys::window() else {
			return;
		};
		let (w, h) = canvas_size(&window, &canvas, fullscreen, width, height);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = context_2d(&canvas) else {
			warn!("canvas has no 2d context; diagram disabled");
			return;
		};
		let measure: Box<dyn TextMeasure> = match CanvasMeasure::new() {
			Some(measure) => Box::new(measure),
			None => {
				debug!("text measurement unavailable, using estimates");
				Box::new(HeuristicMeasure)
			}
		};
		let mut diagram = DiagramView::new(graph, measure, w, h);
		survey.with_untracked(|s| {
			if let Some(path) = s.active_path() {
				diagram.rebuild(path.responses.values());
			}
		});
		*view_init.borrow_mut() = Some(diagram);

		if fullscreen {
			let (view_resize, canvas_resize) = (view_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut v) = *view_resize.borrow_mut() {
					v.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (view_anim, animate_inner) = (view_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut v) = *view_anim.borrow_mut() {
				let scene = v.scene();
				v.fit_once(&scene);
				render::render(v, &scene, &ctx);
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// A change to the answers replaces whatever was edited on the canvas.
	let responses = store.active_responses();
	let view_rebuild = view.clone();
	Effect::new(move |_| {
		responses.with(|responses| {
			let Some(responses) = responses else {
				return;
			};
			if let Some(ref mut v) = *view_rebuild.borrow_mut() {
				v.rebuild(responses.values());
			}
		});
	});

	let view_md = view.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		let Some((x, y)) = local_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut v) = *view_md.borrow_mut() {
			v.press(x, y);
		}
	};

	let view_mm = view.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = local_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut v) = *view_mm.borrow_mut() {
			v.pointer_move(x, y);
		}
	};

	let view_mu = view.clone();
	let on_mouseup = move |ev: MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		if let Some(ref mut v) = *view_mu.borrow_mut() {
			v.release();
		}
	};

	let view_ml = view.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut v) = *view_ml.borrow_mut() {
			v.cancel();
		}
	};

	let view_wh = view.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_position(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut v) = *view_wh.borrow_mut() {
			v.wheel(x, y, ev.delta_y());
		}
	};

	let view_cm = view.clone();
	let view_reset = view.clone();

	view! {
		<div class="flow-diagram">
			<canvas
				node_ref=canvas_ref
				class="flow-diagram-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				on:contextmenu=move |ev| {
					ev.prevent_default();
					let Some((x, y)) = local_position(canvas_ref, &ev) else {
						return;
					};
					if let Some(ref mut v) = *view_cm.borrow_mut() {
						v.context_click(x, y);
					}
				}
				style="display: block; cursor: grab;"
			/>
			<button
				class="flow-diagram-reset"
				on:click=move |_| {
					if let Some(ref mut v) = *view_reset.borrow_mut() {
						v.reset_view();
					}
				}
			>
				"Reset view"
			</button>
		</div>
	}
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas.get_context("2d").ok()??.dyn_into().ok()
}

fn window_size(window: &Window) -> (f64, f64) {
	let dim = |v: Result<JsValue, JsValue>, fallback| v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback);
	(dim(window.inner_width(), 800.0), dim(window.inner_height(), 600.0))
}

fn canvas_size(
	window: &Window,
	canvas: &HtmlCanvasElement,
	fullscreen: bool,
	width: Option<f64>,
	height: Option<f64>,
) -> (f64, f64) {
	if fullscreen {
		return window_size(window);
	}
	(
		width.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_width() as f64)
				.unwrap_or(800.0)
		}),
		height.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_height() as f64)
				.unwrap_or(600.0)
		}),
	)
}

/// Event position in canvas pixels.
fn local_position(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?;
	let rect = canvas.get_bounding_client_rect();
	Some((ev.client_x() as f64 - rect.left(), ev.client_y() as f64 - rect.top()))
}
