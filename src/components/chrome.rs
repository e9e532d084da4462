//! Page furniture around the diagram: header, back/restart bar and the
//! confirmation dialog guarding destructive actions.

use leptos::prelude::*;

use crate::survey::SurveyStore;

pub const SURVEY_TITLE: &str = "Climate Anxiety Assessment Survey";
pub const SURVEY_DESCRIPTION: &str =
	"A branching survey to assess levels and types of climate-related anxiety";

#[component]
pub fn SurveyHeader() -> impl IntoView {
	let survey = SurveyStore::expect().state;
	let status = move || {
		survey.with(|s| {
			if s.is_completed {
				"Complete".to_string()
			} else {
				format!("In progress · {} answered", s.answered_count())
			}
		})
	};

	view! {
		<header class="survey-header">
			<div>
				<h1>{SURVEY_TITLE}</h1>
				<p>{SURVEY_DESCRIPTION}</p>
			</div>
			<div class="survey-status">{status}</div>
		</header>
	}
}

/// Modal yes/no prompt. Renders nothing while `open` is false.
#[component]
pub fn ConfirmationDialog(
	#[prop(into)] open: Signal<bool>,
	#[prop(into, default = "Confirm Action".into())] title: String,
	#[prop(into, default = "Are you sure you want to continue?".into())] message: String,
	#[prop(into, default = "Continue".into())] confirm_text: String,
	#[prop(into, default = "Cancel".into())] cancel_text: String,
	#[prop(default = false)] danger: bool,
	on_confirm: Callback<()>,
	on_cancel: Callback<()>,
) -> impl IntoView {
	let confirm_class = if danger {
		"dialog-confirm dialog-confirm--danger"
	} else {
		"dialog-confirm"
	};
	move || {
		open.get().then(|| {
			view! {
				<div class="dialog-backdrop">
					<div class="dialog" role="dialog">
						<h3>{title.clone()}</h3>
						<p>{message.clone()}</p>
						<div class="dialog-actions">
							<button on:click=move |_| on_cancel.run(())>{cancel_text.clone()}</button>
							<button class=confirm_class on:click=move |_| on_confirm.run(())>
								{confirm_text.clone()}
							</button>
						</div>
					</div>
				</div>
			}
		})
	}
}

#[component]
pub fn NavigationControls() -> impl IntoView {
	let store = SurveyStore::expect();
	let survey = store.state;
	let show_clear = RwSignal::new(false);

	let back = store.clone();
	let on_back = move |_| back.go_back();
	let restart = store.clone();
	let on_confirm = Callback::new(move |()| {
		restart.clear();
		show_clear.set(false);
	});
	let on_cancel = Callback::new(move |()| show_clear.set(false));

	let path_count = move || {
		survey.with(|s| {
			let active = s.paths.iter().filter(|p| p.is_active).count();
			format!("{active} active path{}", if active == 1 { "" } else { "s" })
		})
	};
	let completed = move || survey.with(|s| s.is_completed);

	view! {
		<nav class="navigation-controls">
			<button
				class="nav-back"
				disabled=move || !survey.with(|s| s.can_go_back())
				on:click=on_back
			>
				"← Back"
			</button>
			<div class="nav-status">
				{path_count}
				{move || completed().then(|| view! { <span class="nav-complete">" • Complete"</span> })}
			</div>
			{move || {
				if completed() {
					view! {
						<button class="nav-restart" on:click=move |_| show_clear.set(true)>
							"Start New Survey"
						</button>
					}
						.into_any()
				} else {
					view! {
						<button class="nav-restart nav-restart--danger" on:click=move |_| show_clear.set(true)>
							"Clear & Restart"
						</button>
					}
						.into_any()
				}
			}}
		</nav>
		<ConfirmationDialog
			open=show_clear
			title="Clear Survey Data"
			message="This will permanently delete all your responses and start the survey over. Are you sure you want to continue?"
			confirm_text="Clear Data"
			danger=true
			on_confirm=on_confirm
			on_cancel=on_cancel
		/>
	}
}
