//! Answer widgets, one per question type. They only report what was picked;
//! the panel turns that into a store command.

use leptos::prelude::*;

use crate::survey::{QuestionKind, QuestionNodeSpec, SurveyStore};

/// Value recorded next to free text in multi-select answers.
pub const CUSTOM_VALUE: &str = "custom";

/// What a widget reports back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Answer {
	/// Choice ids.
	pub values: Vec<String>,
	/// Free-text responses.
	pub custom: Option<Vec<String>>,
}

impl Answer {
	/// A single picked choice.
	pub fn single(value: impl Into<String>) -> Self {
		Self {
			values: vec![value.into()],
			custom: None,
		}
	}
}

/// `current` with `value` added (`checked`) or removed, keeping order and
/// never duplicating.
pub fn toggle_value(current: &[String], value: &str, checked: bool) -> Vec<String> {
	let mut next: Vec<String> = current.iter().filter(|v| *v != value).cloned().collect();
	if checked {
		next.push(value.to_string());
	}
	next
}

/// Answer for a free-text submission, or `None` when the input is blank.
/// Input beyond `limit` characters is cut off.
pub fn custom_answer(current: &[String], input: &str, limit: usize) -> Option<Answer> {
	let text: String = input.trim().chars().take(limit).collect();
	if text.is_empty() {
		return None;
	}
	Some(Answer {
		values: toggle_value(current, CUSTOM_VALUE, true),
		custom: Some(vec![text]),
	})
}

/// The active question with the widget its type calls for.
#[component]
pub fn QuestionPanel() -> impl IntoView {
	let store = SurveyStore::expect();
	let (survey, graph) = (store.state, store.graph());

	move || {
		let Some(question_id) = survey.with(|s| s.current_question_id.clone()) else {
			return view! {
				<section class="question-panel question-panel--done">
					<h2>"Survey complete"</h2>
					<p>"Thank you for completing the climate anxiety assessment."</p>
				</section>
			}
			.into_any();
		};
		let Some(question) = graph.question(&question_id) else {
			return view! {
				<section class="question-panel question-panel--error">
					<h2>"Question not found"</h2>
					<p>{format!("No question with id {question_id} in this survey.")}</p>
				</section>
			}
			.into_any();
		};

		let previous = survey.with(|s| {
			s.active_path()
				.and_then(|p| p.responses.get(&question_id))
				.map(|e| e.selected_answers.clone())
				.unwrap_or_default()
		});
		let store = store.clone();
		let on_answer = Callback::new(move |answer: Answer| {
			store.answer(question_id.clone(), answer.values, answer.custom);
		});

		let widget = match &question.kind {
			QuestionKind::Scale => {
				view! { <ScaleQuestion question=question previous=previous on_answer=on_answer /> }.into_any()
			}
			QuestionKind::Binary => {
				view! { <BinaryQuestion question=question previous=previous on_answer=on_answer /> }.into_any()
			}
			QuestionKind::SingleSelect => {
				view! { <SingleSelectQuestion question=question previous=previous on_answer=on_answer /> }.into_any()
			}
			QuestionKind::MultiSelect => {
				view! { <MultiSelectQuestion question=question previous=previous on_answer=on_answer /> }.into_any()
			}
			QuestionKind::Unknown(tag) => view! {
				<p class="question-unknown">{format!("Unknown question type: {tag}")}</p>
			}
			.into_any(),
		};
		view! {
			<section class="question-panel">
				<h2>{question.label.clone()}</h2>
				{widget}
			</section>
		}
		.into_any()
	}
}

fn option_class(base: &'static str, previous: &[String], id: &str) -> String {
	if previous.iter().any(|v| v == id) {
		format!("{base} {base}--selected")
	} else {
		base.to_string()
	}
}

/// Numbered rating points.
#[component]
pub fn ScaleQuestion(
	question: &'static QuestionNodeSpec,
	previous: Vec<String>,
	on_answer: Callback<Answer>,
) -> impl IntoView {
	view! {
		<div class="scale-options">
			{question
				.choices
				.iter()
				.enumerate()
				.map(|(i, choice)| {
					let id = choice.id.clone();
					view! {
						<button
							class=option_class("scale-option", &previous, &choice.id)
							on:click=move |_| on_answer.run(Answer::single(id.clone()))
						>
							<span class="scale-value">{i + 1}</span>
							<span class="scale-label">{choice.label.clone()}</span>
						</button>
					}
				})
				.collect_view()}
		</div>
	}
}

/// Two large buttons.
#[component]
pub fn BinaryQuestion(
	question: &'static QuestionNodeSpec,
	previous: Vec<String>,
	on_answer: Callback<Answer>,
) -> impl IntoView {
	view! {
		<div class="binary-options">
			{question
				.choices
				.iter()
				.map(|choice| {
					let id = choice.id.clone();
					view! {
						<button
							class=option_class("binary-option", &previous, &choice.id)
							on:click=move |_| on_answer.run(Answer::single(id.clone()))
						>
							{choice.label.clone()}
						</button>
					}
				})
				.collect_view()}
		</div>
	}
}

#[component]
pub fn SingleSelectQuestion(
	question: &'static QuestionNodeSpec,
	previous: Vec<String>,
	on_answer: Callback<Answer>,
) -> impl IntoView {
	view! {
		<ul class="select-options">
			{question
				.choices
				.iter()
				.map(|choice| {
					let id = choice.id.clone();
					view! {
						<li>
							<button
								class=option_class("select-option", &previous, &choice.id)
								on:click=move |_| on_answer.run(Answer::single(id.clone()))
							>
								{choice.label.clone()}
							</button>
						</li>
					}
				})
				.collect_view()}
		</ul>
	}
}

/// Checkbox list submitted with Continue, plus the optional "Other" field.
#[component]
pub fn MultiSelectQuestion(
	question: &'static QuestionNodeSpec,
	previous: Vec<String>,
	on_answer: Callback<Answer>,
) -> impl IntoView {
	let picked = RwSignal::new(previous);
	let custom = RwSignal::new(String::new());
	let limit = question.custom_limit();

	let submit_custom = move || {
		if let Some(answer) = picked.with(|p| custom.with(|c| custom_answer(p, c, limit))) {
			custom.set(String::new());
			on_answer.run(answer);
		}
	};

	view! {
		<div class="multi-options">
			{question
				.choices
				.iter()
				.map(|choice| {
					let id = choice.id.clone();
					let checked_id = choice.id.clone();
					view! {
						<label class="multi-option">
							<input
								type="checkbox"
								prop:checked=move || picked.with(|p| p.contains(&checked_id))
								on:change=move |ev| {
									let checked = event_target_checked(&ev);
									picked.update(|p| *p = toggle_value(p, &id, checked));
								}
							/>
							<span>{choice.label.clone()}</span>
						</label>
					}
				})
				.collect_view()}
			{question
				.allow_custom
				.then(|| {
					view! {
						<div class="multi-custom">
							<span>"Other (please specify):"</span>
							<input
								type="text"
								maxlength=limit.to_string()
								placeholder="Enter your custom response..."
								prop:value=move || custom.get()
								on:input=move |ev| custom.set(event_target_value(&ev))
								on:keydown=move |ev: web_sys::KeyboardEvent| {
									if ev.key() == "Enter" {
										ev.prevent_default();
										submit_custom();
									}
								}
							/>
							<button
								disabled=move || custom.with(|c| c.trim().is_empty())
								on:click=move |_| submit_custom()
							>
								"Add"
							</button>
							<small>{move || format!("{}/{limit} characters", custom.with(|c| c.chars().count()))}</small>
						</div>
					}
				})}
			<button
				class="multi-submit"
				disabled=move || picked.with(|p| p.is_empty())
				on:click=move |_| {
					on_answer.run(Answer {
						values: picked.get(),
						custom: None,
					})
				}
			>
				"Continue"
			</button>
		</div>
	}
}
