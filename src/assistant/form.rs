//! The five-step lead form.
//!
//! `Idle → Role → Product → Quantity → City → Phone → Idle`. Every step
//! takes free text; quick-option buttons are only suggestions. Phone is the
//! one step that validates its input. Transitions are pure so the whole
//! wizard is testable without a transport.

use crate::assistant::i18n::{self, Language, Text};
use crate::assistant::message::{Button, Keyboard, Reply};
use crate::assistant::phone::PhoneRule;

/// Wizard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormState {
    Idle,
    Role,
    Product,
    Quantity,
    City,
    Phone,
}

impl FormState {
    /// The step entered when the wizard starts.
    pub const FIRST: FormState = FormState::Role;

    /// Forward transition. `Phone` completes the form and returns to `Idle`.
    pub fn next(self) -> FormState {
        match self {
            FormState::Idle => FormState::Role,
            FormState::Role => FormState::Product,
            FormState::Product => FormState::Quantity,
            FormState::Quantity => FormState::City,
            FormState::City => FormState::Phone,
            FormState::Phone => FormState::Idle,
        }
    }

    /// Backward transition. Going back from `Role` leaves the wizard.
    pub fn prev(self) -> FormState {
        match self {
            FormState::Idle | FormState::Role => FormState::Idle,
            FormState::Product => FormState::Role,
            FormState::Quantity => FormState::Product,
            FormState::City => FormState::Quantity,
            FormState::Phone => FormState::City,
        }
    }

    /// Field captured while in this state.
    pub fn field(self) -> Option<Field> {
        match self {
            FormState::Idle => None,
            FormState::Role => Some(Field::Role),
            FormState::Product => Some(Field::Product),
            FormState::Quantity => Some(Field::Quantity),
            FormState::City => Some(Field::City),
            FormState::Phone => Some(Field::Phone),
        }
    }
}

/// A lead form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Role,
    Product,
    Quantity,
    City,
    Phone,
}

/// Answers collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub role: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<String>,
    pub city: Option<String>,
}

impl Draft {
    fn slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::Role => Some(&mut self.role),
            Field::Product => Some(&mut self.product),
            Field::Quantity => Some(&mut self.quantity),
            Field::City => Some(&mut self.city),
            Field::Phone => None,
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Role => self.role.as_deref(),
            Field::Product => self.product.as_deref(),
            Field::Quantity => self.quantity.as_deref(),
            Field::City => self.city.as_deref(),
            Field::Phone => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Draft::default()
    }
}

/// All five answers of a finished form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedForm {
    pub role: String,
    pub product: String,
    pub quantity: String,
    pub city: String,
    /// Normalized phone.
    pub phone: String,
}

/// Input as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormInput<'a> {
    Text(&'a str),
    Contact(&'a str),
    Cancel,
    Back,
    /// Anything without usable text.
    Empty,
}

/// Result of feeding one input to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved (forward or back) to a step; render its prompt.
    Prompt(FormState),
    /// Input unusable for the current step; render its prompt again.
    Reprompt(FormState),
    /// Phone failed validation; stay on the phone step.
    InvalidPhone,
    /// Wizard left, answers discarded.
    Cancelled,
    /// All fields captured, wizard left.
    Completed(CompletedForm),
}

/// Per-user wizard state. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSession {
    state: FormState,
    draft: Draft,
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FormSession {
    /// A fresh session positioned at the first step with nothing captured.
    pub fn new() -> Self {
        Self {
            state: FormState::FIRST,
            draft: Draft::default(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Feed one input. After `Cancelled` or `Completed` the session is
    /// finished and must be dropped by the caller.
    pub fn apply(&mut self, input: FormInput<'_>, rule: &PhoneRule) -> Transition {
        match input {
            FormInput::Cancel => {
                self.reset();
                Transition::Cancelled
            }
            FormInput::Back => {
                let prev = self.state.prev();
                if prev == FormState::Idle {
                    self.reset();
                    return Transition::Cancelled;
                }
                if let Some(slot) = prev.field().and_then(|f| self.draft.slot(f)) {
                    *slot = None;
                }
                self.state = prev;
                Transition::Prompt(prev)
            }
            FormInput::Empty => Transition::Reprompt(self.state),
            FormInput::Contact(phone) if self.state == FormState::Phone => self.finish(phone, rule),
            FormInput::Contact(_) => Transition::Reprompt(self.state),
            FormInput::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Transition::Reprompt(self.state);
                }
                if self.state == FormState::Phone {
                    return self.finish(text, rule);
                }
                let Some(slot) = self.state.field().and_then(|f| self.draft.slot(f)) else {
                    return Transition::Reprompt(self.state);
                };
                *slot = Some(text.to_string());
                self.state = self.state.next();
                Transition::Prompt(self.state)
            }
        }
    }

    fn finish(&mut self, raw_phone: &str, rule: &PhoneRule) -> Transition {
        let Some(phone) = rule.parse(raw_phone) else {
            return Transition::InvalidPhone;
        };
        let draft = std::mem::take(&mut self.draft);
        self.state = FormState::Idle;
        match (draft.role, draft.product, draft.quantity, draft.city) {
            (Some(role), Some(product), Some(quantity), Some(city)) => Transition::Completed(CompletedForm {
                role,
                product,
                quantity,
                city,
                phone,
            }),
            // Unreachable through `apply`: the phone step is only entered with all four set.
            _ => Transition::Cancelled,
        }
    }

    fn reset(&mut self) {
        self.state = FormState::Idle;
        self.draft = Draft::default();
    }
}

fn controls(lang: Language, with_back: bool) -> Vec<Button> {
    let mut row = Vec::with_capacity(2);
    if with_back {
        row.push(Button::Text(Text::Back.get(lang).to_string()));
    }
    row.push(Button::Text(Text::Cancel.get(lang).to_string()));
    row
}

fn option_rows(options: &[&str], lang: Language, with_back: bool) -> Vec<Vec<Button>> {
    let mut rows: Vec<Vec<Button>> = options
        .chunks(2)
        .map(|pair| pair.iter().map(|o| Button::Text((*o).to_string())).collect())
        .collect();
    rows.push(controls(lang, with_back));
    rows
}

/// Prompt for a wizard step. Pure in `(state, lang)`; `Idle` renders the main menu.
pub fn prompt(state: FormState, lang: Language) -> Reply {
    match state {
        FormState::Idle => Reply::with_keyboard(Text::MenuTitle.get(lang), i18n::main_menu(lang)),
        FormState::Role => Reply::with_keyboard(
            Text::AskRole.get(lang),
            Keyboard::rows(option_rows(&i18n::role_options(lang), lang, false)),
        ),
        FormState::Product => Reply::with_keyboard(
            Text::AskProduct.get(lang),
            Keyboard::rows(option_rows(&i18n::product_options(lang), lang, true)),
        ),
        FormState::Quantity => Reply::with_keyboard(
            Text::AskQuantity.get(lang),
            Keyboard::rows(option_rows(&i18n::quantity_options(), lang, true)),
        ),
        FormState::City => Reply::with_keyboard(
            Text::AskCity.get(lang),
            Keyboard::rows(vec![controls(lang, true)]),
        ),
        FormState::Phone => Reply::with_keyboard(Text::AskPhone.get(lang), phone_keyboard(lang)),
    }
}

fn phone_keyboard(lang: Language) -> Keyboard {
    Keyboard::rows(vec![
        vec![Button::Contact(Text::SendContact.get(lang).to_string())],
        controls(lang, true),
    ])
}

/// Reply after a rejected phone number.
pub fn invalid_phone(lang: Language) -> Reply {
    Reply::with_keyboard(Text::InvalidPhone.get(lang), phone_keyboard(lang))
}
