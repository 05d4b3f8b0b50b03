//! Lead-capture assistant - wholesale buyers fill a short form, the manager gets the lead.

pub mod commands;
pub mod database;
pub mod engine;
pub mod export;
pub mod form;
pub mod i18n;
pub mod message;
pub mod notifier;
pub mod phone;
pub mod reminders;
pub mod telegram;
pub mod transport;


pub use database::{Database, Lead, LeadStatus};
pub use engine::{Assistant, Outcome, Settings};
pub use message::{Inbound, Payload};
pub use notifier::Notifier;
pub use telegram::TelegramClient;
pub use transport::{Transport, TransportError};
