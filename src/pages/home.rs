use std::sync::Arc;

use leptos::prelude::*;
use log::{error, warn};

use crate::components::chrome::{NavigationControls, SurveyHeader};
use crate::components::flow_diagram::FlowDiagramCanvas;
use crate::components::questions::QuestionPanel;
use crate::survey::store::SharedStorage;
use crate::survey::{BrowserStorage, QuestionGraph, SurveyStore};

/// Survey page: diagram on top, answer panel and navigation below.
#[component]
pub fn Home() -> impl IntoView {
	let graph = match QuestionGraph::bundled() {
		Ok(graph) => graph,
		Err(err) => {
			error!("question graph failed to load: {err}");
			return view! {
				<div class="load-error">
					<h1>"Uh oh! Something went wrong!"</h1>
					<p>"The survey could not be loaded."</p>
					<pre>{err.to_string()}</pre>
				</div>
			}
			.into_any();
		}
	};

	if !BrowserStorage.is_available() {
		warn!("local storage unavailable; answers will not survive a reload");
	}
	let storage: SharedStorage = Arc::new(BrowserStorage);
	SurveyStore::new(graph, storage).provide();

	view! {
		<div class="survey-page">
			<SurveyHeader />
			<main class="survey-body">
				<div class="diagram-pane">
					<FlowDiagramCanvas />
				</div>
				<QuestionPanel />
			</main>
			<NavigationControls />
		</div>
	}
	.into_any()
}
