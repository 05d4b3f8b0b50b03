//! Operator notifications.
//!
//! Summaries are bilingual so the operator reads them regardless of the
//! buyer's language. Every send reports its outcome; callers decide whether
//! a failure matters. Nothing is retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::assistant::database::Lead;
use crate::assistant::message::escape_html;
use crate::assistant::transport::{Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("operator notification failed: {0}")]
    Delivery(#[from] TransportError),
}

/// Formats and delivers messages to the single operator.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    operator_id: i64,
    timezone: Tz,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, operator_id: i64, timezone: Tz) -> Self {
        Self {
            transport,
            operator_id,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Send a free-form HTML message to the operator.
    pub async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.transport.send_text(self.operator_id, text, None).await?;
        Ok(())
    }

    /// Send a file to the operator.
    pub async fn send_document(&self, file_name: &str, data: Vec<u8>, caption: &str) -> Result<(), NotifyError> {
        self.transport
            .send_document(self.operator_id, file_name, data, caption)
            .await?;
        Ok(())
    }

    /// Announce a newly captured lead.
    pub async fn lead_created(&self, lead: &Lead) -> Result<(), NotifyError> {
        let text = format_lead_summary(lead, self.timezone);
        match self.send(&text).await {
            Ok(()) => {
                info!("🛎 Operator notified about lead #{}", lead.id);
                Ok(())
            }
            Err(e) => {
                warn!("Lead #{} saved but operator was not notified: {}", lead.id, e);
                Err(e)
            }
        }
    }

    /// Announce a lead on a detached task so the caller never waits on the network.
    pub fn spawn_lead_created(&self, lead: Lead) -> JoinHandle<Result<(), NotifyError>> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.lead_created(&lead).await })
    }

    /// Nag about a lead that nobody picked up.
    pub async fn stale_lead(&self, lead: &Lead, now: DateTime<Utc>) -> Result<(), NotifyError> {
        self.send(&format_reminder(lead, self.timezone, now)).await
    }
}

fn local_time(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

fn client_line(lead: &Lead) -> String {
    let username = lead
        .username
        .as_deref()
        .map(|u| format!("@{}", escape_html(u)))
        .unwrap_or_else(|| "no_username".to_string());
    format!(
        "{} ({}, id <code>{}</code>)",
        escape_html(&lead.full_name),
        username,
        lead.user_id
    )
}

/// Canonical bilingual summary of a lead.
pub fn format_lead_summary(lead: &Lead, tz: Tz) -> String {
    format!(
        "🛎 <b>Новая оптовая заявка / Yangi ulgurji ariza #{id}</b>\n\n\
         👤 Клиент / Mijoz: {client}\n\
         🌐 Lang: {lang}\n\
         🕒 {created}\n\n\
         Тип / Turi: <b>{role}</b>\n\
         Товар / Mahsulot: <b>{product}</b>\n\
         Объём / Miqdor: <b>{qty}</b>\n\
         Город / Shahar: <b>{city}</b>\n\
         Телефон / Telefon: <b>{phone}</b>\n\n\
         /status {id} work",
        id = lead.id,
        client = client_line(lead),
        lang = lead.language.code(),
        created = local_time(lead.created_at, tz),
        role = escape_html(&lead.role),
        product = escape_html(&lead.product),
        qty = escape_html(&lead.quantity),
        city = escape_html(&lead.city),
        phone = escape_html(&lead.phone),
    )
}

/// Bilingual reminder about a stale lead.
pub fn format_reminder(lead: &Lead, tz: Tz, now: DateTime<Utc>) -> String {
    let minutes = (now - lead.created_at).num_minutes().max(0);
    format!(
        "⏰ <b>Заявка #{id} ждёт обработки / Ariza #{id} hali ko'rib chiqilmagan</b>\n\
         Создана / Yaratilgan: {created} ({minutes} мин / daqiqa)\n\
         👤 {client}\n\
         {role} · {product} · {qty} · {city}\n\
         Телефон / Telefon: <b>{phone}</b>\n\n\
         /status {id} work",
        id = lead.id,
        created = local_time(lead.created_at, tz),
        minutes = minutes,
        client = client_line(lead),
        role = escape_html(&lead.role),
        product = escape_html(&lead.product),
        qty = escape_html(&lead.quantity),
        city = escape_html(&lead.city),
        phone = escape_html(&lead.phone),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::database::LeadStatus;
    use crate::assistant::i18n::Language;
    use chrono::TimeZone;

    fn lead() -> Lead {
        Lead {
            id: 1,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 7, 30, 0).unwrap(),
            user_id: 555,
            username: None,
            full_name: "Aziz <Shop>".to_string(),
            language: Language::Uz,
            role: "Do'kon".to_string(),
            product: "Xudi".to_string(),
            quantity: "50-100".to_string(),
            city: "Tashkent".to_string(),
            phone: "+998901112233".to_string(),
            status: LeadStatus::New,
            notified: false,
        }
    }

    #[test]
    fn test_summary_is_bilingual_and_references_id() {
        let text = format_lead_summary(&lead(), chrono_tz::Asia::Tashkent);
        assert!(text.contains("#1"));
        assert!(text.contains("Новая оптовая заявка"));
        assert!(text.contains("Yangi ulgurji ariza"));
        assert!(text.contains("<b>Do'kon</b>"));
        assert!(text.contains("<b>+998901112233</b>"));
        assert!(text.contains("no_username"));
    }

    #[test]
    fn test_summary_uses_local_time_and_escapes() {
        let text = format_lead_summary(&lead(), chrono_tz::Asia::Tashkent);
        // 07:30 UTC is 12:30 in Tashkent (UTC+5)
        assert!(text.contains("2026-03-01 12:30"));
        assert!(text.contains("Aziz &lt;Shop&gt;"));
    }

    #[test]
    fn test_reminder_mentions_age() {
        let l = lead();
        let now = l.created_at + chrono::Duration::minutes(90);
        let text = format_reminder(&l, chrono_tz::UTC, now);
        assert!(text.contains("#1"));
        assert!(text.contains("90 мин"));
        assert!(text.contains("/status 1 work"));
    }
}
