//! Decoding of button labels and slash commands into semantic actions.
//!
//! Reply keyboards send their label back as plain text. Labels are decoded
//! here, once, against the tables in `i18n`; the engine only ever matches on
//! [`Action`].

use std::sync::LazyLock;

use regex::Regex;

use crate::assistant::database::{LeadStatus, UnknownStatus};
use crate::assistant::export::{ExportWindow, WindowError};
use crate::assistant::i18n::{Language, MenuItem, Text};

/// Default and maximum number of leads listed by `/leads`.
const DEFAULT_RECENT: usize = 10;
const MAX_RECENT: usize = 50;

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z_]+)(?:@[A-Za-z0-9_]+)?(?:\s+(.*))?$").expect("command regex is valid")
});

/// Operator-only commands, before argument parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorVerb {
    Status,
    Leads,
    Export,
}

/// What an inbound text means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `/start`: reset and greet.
    Start,
    /// `/lang`: open the language picker.
    ChooseLanguage,
    /// A language picker button.
    SetLanguage(Language),
    /// A main menu button.
    Menu(MenuItem),
    /// The call-to-action under the minimum-order blurb.
    StartForm,
    Cancel,
    Back,
    Operator { verb: OperatorVerb, args: String },
}

impl Action {
    /// Decode a text message. `None` means the text carries no command.
    pub fn decode(text: &str) -> Option<Action> {
        let text = text.trim();
        if text.starts_with('/') {
            return decode_command(text);
        }
        decode_label(text)
    }
}

fn decode_command(text: &str) -> Option<Action> {
    let caps = COMMAND_RE.captures(text)?;
    let name = caps.get(1)?.as_str().to_lowercase();
    let args = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    let operator = |verb| Some(Action::Operator { verb, args: args.clone() });

    match name.as_str() {
        "start" => Some(Action::Start),
        "lang" | "language" => Some(Action::ChooseLanguage),
        "cancel" => Some(Action::Cancel),
        "back" => Some(Action::Back),
        "status" => operator(OperatorVerb::Status),
        "leads" => operator(OperatorVerb::Leads),
        "export" => operator(OperatorVerb::Export),
        _ => None,
    }
}

fn decode_label(text: &str) -> Option<Action> {
    for lang in Language::ALL {
        if text == Text::Cancel.get(lang) {
            return Some(Action::Cancel);
        }
        if text == Text::Back.get(lang) {
            return Some(Action::Back);
        }
        if text == Text::MinOrderCta.get(lang) {
            return Some(Action::StartForm);
        }
        if text == lang.picker_label() {
            return Some(Action::SetLanguage(lang));
        }
        if let Some(item) = MenuItem::ALL.into_iter().find(|item| item.label(lang) == text) {
            return Some(Action::Menu(item));
        }
    }
    None
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    SetStatus { id: i64, status: LeadStatus },
    Recent { limit: usize },
    Export(ExportWindow),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminCommandError {
    #[error("Usage: /status <lead_id> <new|work|paid|shipped|closed>")]
    StatusUsage,
    #[error("{0}")]
    Status(#[from] UnknownStatus),
    #[error("Usage: /leads [count], count between 1 and 50")]
    LeadsUsage,
    #[error("Usage: /export [all|7d|24h|30] ({0})")]
    Export(#[from] WindowError),
}

impl AdminCommand {
    pub fn parse(verb: OperatorVerb, args: &str) -> Result<AdminCommand, AdminCommandError> {
        let parts: Vec<&str> = args.split_whitespace().collect();
        match verb {
            OperatorVerb::Status => {
                let [id, status] = parts.as_slice() else {
                    return Err(AdminCommandError::StatusUsage);
                };
                let id: i64 = id
                    .trim_start_matches('#')
                    .parse()
                    .map_err(|_| AdminCommandError::StatusUsage)?;
                if id <= 0 {
                    return Err(AdminCommandError::StatusUsage);
                }
                let status: LeadStatus = status.parse()?;
                Ok(AdminCommand::SetStatus { id, status })
            }
            OperatorVerb::Leads => match parts.as_slice() {
                [] => Ok(AdminCommand::Recent { limit: DEFAULT_RECENT }),
                [n] => match n.parse::<usize>() {
                    Ok(limit) if (1..=MAX_RECENT).contains(&limit) => Ok(AdminCommand::Recent { limit }),
                    _ => Err(AdminCommandError::LeadsUsage),
                },
                _ => Err(AdminCommandError::LeadsUsage),
            },
            OperatorVerb::Export => Ok(AdminCommand::Export(ExportWindow::parse(args)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_decode_labels_in_both_languages() {
        assert_eq!(Action::decode("❌ Отмена"), Some(Action::Cancel));
        assert_eq!(Action::decode("❌ Bekor qilish"), Some(Action::Cancel));
        assert_eq!(Action::decode("⬅️ Orqaga"), Some(Action::Back));
        assert_eq!(Action::decode("🤝 Ariza qoldirish"), Some(Action::Menu(MenuItem::LeaveRequest)));
        assert_eq!(Action::decode("🤝 Оставить заявку"), Some(Action::Menu(MenuItem::LeaveRequest)));
        assert_eq!(Action::decode("✅ Оставить заявку"), Some(Action::StartForm));
        assert_eq!(Action::decode("🇺🇿 O'zbekcha"), Some(Action::SetLanguage(Language::Uz)));
        assert_eq!(Action::decode("Do'kon"), None);
        assert_eq!(Action::decode("Tashkent"), None);
    }

    #[test]
    fn test_decode_commands() {
        assert_eq!(Action::decode("/start"), Some(Action::Start));
        assert_eq!(Action::decode("/start@zary_opt_bot"), Some(Action::Start));
        assert_eq!(Action::decode("/lang"), Some(Action::ChooseLanguage));
        assert_eq!(Action::decode("/cancel"), Some(Action::Cancel));
        assert_eq!(
            Action::decode("/status 12 paid"),
            Some(Action::Operator {
                verb: OperatorVerb::Status,
                args: "12 paid".to_string()
            })
        );
        assert_eq!(Action::decode("/unknown"), None);
    }

    #[test]
    fn test_parse_status_command() {
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Status, "12 paid"),
            Ok(AdminCommand::SetStatus {
                id: 12,
                status: LeadStatus::Paid
            })
        );
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Status, "#3 CLOSED"),
            Ok(AdminCommand::SetStatus {
                id: 3,
                status: LeadStatus::Closed
            })
        );
    }

    #[test]
    fn test_malformed_status_command_is_rejected() {
        for args in ["", "12", "abc paid", "0 paid", "-4 paid", "1 2 paid"] {
            assert_eq!(
                AdminCommand::parse(OperatorVerb::Status, args),
                Err(AdminCommandError::StatusUsage),
                "args: {args:?}"
            );
        }
        assert!(matches!(
            AdminCommand::parse(OperatorVerb::Status, "12 done"),
            Err(AdminCommandError::Status(_))
        ));
    }

    #[test]
    fn test_parse_leads_command() {
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Leads, ""),
            Ok(AdminCommand::Recent { limit: DEFAULT_RECENT })
        );
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Leads, "5"),
            Ok(AdminCommand::Recent { limit: 5 })
        );
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Leads, "500"),
            Err(AdminCommandError::LeadsUsage)
        );
    }

    #[test]
    fn test_parse_export_command() {
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Export, ""),
            Ok(AdminCommand::Export(ExportWindow::All))
        );
        assert_eq!(
            AdminCommand::parse(OperatorVerb::Export, "7d"),
            Ok(AdminCommand::Export(ExportWindow::Trailing(Duration::days(7))))
        );
        assert!(AdminCommand::parse(OperatorVerb::Export, "soon").is_err());
    }
}
