//! Conversation engine - routes inbound events to the form, static replies
//! and operator commands.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::assistant::commands::{Action, AdminCommand, OperatorVerb};
use crate::assistant::database::{Database, Lead, NewLead};
use crate::assistant::export;
use crate::assistant::form::{self, CompletedForm, FormInput, FormSession, FormState, Transition};
use crate::assistant::i18n::{self, Content, Language, MenuItem, Text};
use crate::assistant::message::{Inbound, Keyboard, Payload, Reply, escape_html};
use crate::assistant::notifier::{Notifier, NotifyError};
use crate::assistant::phone::PhoneRule;
use crate::assistant::transport::Transport;

const ACCESS_DENIED: &str = "⛔ Команда доступна только менеджеру / Buyruq faqat menejer uchun";

/// Runtime knobs of the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub operator_id: i64,
    pub phone_rule: PhoneRule,
    pub content: Content,
    pub timezone: Tz,
}

/// What handling one inbound event led to.
#[derive(Debug)]
pub enum Outcome {
    /// Answered without side effects beyond session/language state.
    Replied,
    /// The form was completed. `lead_id` is `None` when the store failed;
    /// `notification` resolves once the operator summary was attempted.
    LeadCaptured {
        lead_id: Option<i64>,
        notification: Option<JoinHandle<Result<(), NotifyError>>>,
    },
    /// An operator command from someone else.
    Denied,
    /// Nothing to answer.
    Ignored,
}

/// The lead-capture assistant.
pub struct Assistant {
    settings: Settings,
    database: Arc<Database>,
    transport: Arc<dyn Transport>,
    notifier: Notifier,
    sessions: Mutex<HashMap<i64, FormSession>>,
}

impl Assistant {
    pub fn new(settings: Settings, database: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        let notifier = Notifier::new(transport.clone(), settings.operator_id, settings.timezone);
        Self {
            settings,
            database,
            transport,
            notifier,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Current wizard step of a user; `Idle` when no form is open.
    pub async fn form_state(&self, user_id: i64) -> FormState {
        self.sessions
            .lock()
            .await
            .get(&user_id)
            .map(FormSession::state)
            .unwrap_or(FormState::Idle)
    }

    /// Tell the operator the bot is up.
    pub async fn announce_startup(&self) {
        let count = match self.database.lead_count() {
            Ok(n) => n.to_string(),
            Err(e) => {
                error!("Failed to count leads: {}", e);
                "?".to_string()
            }
        };
        let text = format!(
            "🟢 <b>{}</b> bot started / bot ishga tushdi\nЗаявок в базе / Bazadagi arizalar: {}",
            escape_html(&self.settings.content.brand),
            count
        );
        if let Err(e) = self.notifier.send(&text).await {
            warn!("Startup notice not delivered: {}", e);
        }
    }

    /// Handle one inbound event.
    pub async fn handle(&self, inbound: Inbound) -> Outcome {
        let (lang, first_contact) = self.resolve_language(&inbound);
        let action = inbound.text().and_then(Action::decode);

        match action {
            Some(Action::Operator { verb, args }) => return self.handle_operator(&inbound, lang, verb, &args).await,
            Some(Action::Start) => {
                self.sessions.lock().await.remove(&inbound.user_id);
                if first_contact {
                    self.send(inbound.chat_id, language_picker_reply()).await;
                } else {
                    let welcome = Reply::with_keyboard(self.settings.content.welcome(lang), i18n::main_menu(lang));
                    self.send(inbound.chat_id, welcome).await;
                }
                return Outcome::Replied;
            }
            Some(Action::ChooseLanguage) => {
                self.sessions.lock().await.remove(&inbound.user_id);
                self.send(inbound.chat_id, language_picker_reply()).await;
                return Outcome::Replied;
            }
            _ => {}
        }

        let transition = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(&inbound.user_id) {
                Some(session) => {
                    let input = match (&action, &inbound.payload) {
                        (Some(Action::Cancel), _) => FormInput::Cancel,
                        (Some(Action::Back), _) => FormInput::Back,
                        (_, Payload::Text(text)) => FormInput::Text(text),
                        (_, Payload::Contact { phone }) => FormInput::Contact(phone),
                        (_, Payload::Other) => FormInput::Empty,
                    };
                    let transition = session.apply(input, &self.settings.phone_rule);
                    if matches!(transition, Transition::Cancelled | Transition::Completed(_)) {
                        sessions.remove(&inbound.user_id);
                    }
                    Some(transition)
                }
                None => None,
            }
        };

        match transition {
            Some(transition) => self.on_transition(&inbound, lang, transition).await,
            None => self.handle_idle(&inbound, lang, action).await,
        }
    }

    /// Stored language, or the locale guess persisted on first contact.
    fn resolve_language(&self, inbound: &Inbound) -> (Language, bool) {
        match self.database.language(inbound.user_id) {
            Ok(Some(lang)) => (lang, false),
            Ok(None) => {
                let lang = Language::detect(inbound.locale.as_deref());
                info!("👋 New user {} ({}), language {}", inbound.user_id, inbound.full_name, lang.code());
                if let Err(e) = self.database.set_language(inbound.user_id, lang) {
                    error!("Failed to store language for user {}: {}", inbound.user_id, e);
                }
                (lang, true)
            }
            Err(e) => {
                error!("Failed to load language for user {}: {}", inbound.user_id, e);
                (Language::detect(inbound.locale.as_deref()), false)
            }
        }
    }

    async fn on_transition(&self, inbound: &Inbound, lang: Language, transition: Transition) -> Outcome {
        match transition {
            Transition::Prompt(state) | Transition::Reprompt(state) => {
                self.send(inbound.chat_id, form::prompt(state, lang)).await;
                Outcome::Replied
            }
            Transition::InvalidPhone => {
                self.send(inbound.chat_id, form::invalid_phone(lang)).await;
                Outcome::Replied
            }
            Transition::Cancelled => {
                info!("Form cancelled by user {}", inbound.user_id);
                let reply = Reply::with_keyboard(Text::Cancelled.get(lang), i18n::main_menu(lang));
                self.send(inbound.chat_id, reply).await;
                Outcome::Replied
            }
            Transition::Completed(form) => self.complete(inbound, lang, form).await,
        }
    }

    /// Persist the lead, hand the operator summary to a background task and
    /// confirm to the client whatever happened to the first two.
    async fn complete(&self, inbound: &Inbound, lang: Language, form: CompletedForm) -> Outcome {
        let new_lead = NewLead {
            created_at: Utc::now(),
            user_id: inbound.user_id,
            username: inbound.username.clone(),
            full_name: inbound.full_name.clone(),
            language: lang,
            role: form.role,
            product: form.product,
            quantity: form.quantity,
            city: form.city,
            phone: form.phone,
        };

        let (lead_id, notification) = match self.database.insert_lead(&new_lead) {
            Ok(id) => {
                info!("✅ Lead #{} captured from user {}", id, inbound.user_id);
                let lead: Lead = new_lead.into_lead(id);
                (Some(id), Some(self.notifier.spawn_lead_created(lead)))
            }
            Err(e) => {
                error!(
                    "Failed to store lead from user {} ({}): {} | role={} product={} qty={} city={} phone={}",
                    new_lead.user_id,
                    new_lead.username.as_deref().unwrap_or("no_username"),
                    e,
                    new_lead.role,
                    new_lead.product,
                    new_lead.quantity,
                    new_lead.city,
                    new_lead.phone
                );
                (None, None)
            }
        };

        let thanks = Reply::with_keyboard(self.settings.content.thanks(lang), i18n::main_menu(lang));
        self.send(inbound.chat_id, thanks).await;

        Outcome::LeadCaptured { lead_id, notification }
    }

    async fn handle_idle(&self, inbound: &Inbound, lang: Language, action: Option<Action>) -> Outcome {
        let content = &self.settings.content;
        let menu = || i18n::main_menu(lang);

        let reply = match action {
            Some(Action::SetLanguage(new_lang)) => {
                if let Err(e) = self.database.set_language(inbound.user_id, new_lang) {
                    error!("Failed to store language for user {}: {}", inbound.user_id, e);
                }
                info!("🌐 User {} switched to {}", inbound.user_id, new_lang.code());
                Reply::with_keyboard(
                    format!("{}\n\n{}", Text::LanguageSet.get(new_lang), content.welcome(new_lang)),
                    i18n::main_menu(new_lang),
                )
            }
            Some(Action::Menu(MenuItem::LeaveRequest) | Action::StartForm) => return self.start_form(inbound, lang).await,
            Some(Action::Menu(item)) => match item {
                MenuItem::Catalog => Reply::with_keyboard(content.catalog(lang), menu()),
                MenuItem::Terms => Reply::with_keyboard(Text::Terms.get(lang), menu()),
                MenuItem::Why => Reply::with_keyboard(Text::Why.get(lang), menu()),
                MenuItem::MinOrder => Reply::with_keyboard(Text::MinOrder.get(lang), i18n::min_order_keyboard(lang)),
                MenuItem::Manager => Reply::with_keyboard(content.manager(lang), menu()),
                MenuItem::Channel => Reply::with_keyboard(content.channel(lang), menu()),
                MenuItem::Language => language_picker_reply(),
                MenuItem::LeaveRequest => return self.start_form(inbound, lang).await,
            },
            Some(Action::Cancel | Action::Back) => Reply::with_keyboard(Text::MenuTitle.get(lang), menu()),
            // Handled before the form is consulted.
            Some(Action::Start | Action::ChooseLanguage | Action::Operator { .. }) => return Outcome::Ignored,
            None => match inbound.payload {
                Payload::Text(_) => Reply::with_keyboard(Text::MenuTitle.get(lang), menu()),
                Payload::Contact { .. } | Payload::Other => return Outcome::Ignored,
            },
        };

        self.send(inbound.chat_id, reply).await;
        Outcome::Replied
    }

    async fn start_form(&self, inbound: &Inbound, lang: Language) -> Outcome {
        let session = FormSession::new();
        let state = session.state();
        self.sessions.lock().await.insert(inbound.user_id, session);
        info!("📝 User {} opened the request form", inbound.user_id);
        self.send(inbound.chat_id, form::prompt(state, lang)).await;
        Outcome::Replied
    }

    async fn handle_operator(&self, inbound: &Inbound, lang: Language, verb: OperatorVerb, args: &str) -> Outcome {
        if inbound.user_id != self.settings.operator_id {
            warn!("⛔ User {} tried operator command {:?}", inbound.user_id, verb);
            let keyboard = self.current_keyboard(inbound.user_id, lang).await;
            let reply = Reply {
                text: ACCESS_DENIED.to_string(),
                keyboard,
            };
            self.send(inbound.chat_id, reply).await;
            return Outcome::Denied;
        }

        let command = match AdminCommand::parse(verb, args) {
            Ok(command) => command,
            Err(e) => {
                self.send(inbound.chat_id, Reply::text(escape_html(&e.to_string()))).await;
                return Outcome::Replied;
            }
        };

        info!("🔧 Operator command: {:?}", command);
        let text = match command {
            AdminCommand::SetStatus { id, status } => match self.database.set_status(id, status) {
                Ok(true) => format!("✅ Заявка / Ariza #{id}: <b>{status}</b>"),
                Ok(false) => format!("❓ Заявка #{id} не найдена / Ariza #{id} topilmadi"),
                Err(e) => {
                    error!("Failed to update lead #{}: {}", id, e);
                    format!("⚠️ Ошибка базы данных / Ma'lumotlar bazasi xatosi: {}", escape_html(&e.to_string()))
                }
            },
            AdminCommand::Recent { limit } => match self.database.list_recent(limit) {
                Ok(leads) => format_recent(&leads, self.settings.timezone),
                Err(e) => {
                    error!("Failed to list leads: {}", e);
                    format!("⚠️ Ошибка базы данных / Ma'lumotlar bazasi xatosi: {}", escape_html(&e.to_string()))
                }
            },
            AdminCommand::Export(window) => {
                match export::deliver_export(&self.database, &self.notifier, window, Utc::now()).await {
                    Ok(_) => return Outcome::Replied,
                    Err(e) => {
                        error!("Export failed: {}", e);
                        export::failure_notice(&e)
                    }
                }
            }
        };

        self.send(inbound.chat_id, Reply::text(text)).await;
        Outcome::Replied
    }

    /// Keep an open form's keyboard on screen when answering out of band.
    async fn current_keyboard(&self, user_id: i64, lang: Language) -> Option<Keyboard> {
        let state = self.form_state(user_id).await;
        form::prompt(state, lang).keyboard
    }

    async fn send(&self, chat_id: i64, reply: Reply) {
        if let Err(e) = self.transport.send_text(chat_id, &reply.text, reply.keyboard.as_ref()).await {
            warn!("Reply to chat {} not delivered: {}", chat_id, e);
        }
    }
}

fn language_picker_reply() -> Reply {
    Reply::with_keyboard(Text::ChooseLanguage.get(Language::Ru), i18n::language_picker())
}

fn format_recent(leads: &[Lead], tz: Tz) -> String {
    if leads.is_empty() {
        return "Заявок пока нет / Hozircha arizalar yo'q".to_string();
    }
    let mut lines = vec![format!("📋 <b>Последние заявки / Oxirgi arizalar ({})</b>", leads.len())];
    for lead in leads {
        lines.push(format!(
            "#{} · {} · {} · {} · {} · {} · {} · {}",
            lead.id,
            lead.status,
            lead.created_at.with_timezone(&tz).format("%m-%d %H:%M"),
            escape_html(&lead.role),
            escape_html(&lead.product),
            escape_html(&lead.quantity),
            escape_html(&lead.city),
            escape_html(&lead.phone),
        ));
    }
    lines.join("\n")
}
