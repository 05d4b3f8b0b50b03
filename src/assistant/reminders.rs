//! Background jobs: stale-lead reminders and the scheduled export.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::assistant::database::{Database, StoreError};
use crate::assistant::export::{self, ExportWindow};
use crate::assistant::notifier::Notifier;

/// When and how often to nag about untouched leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSettings {
    /// Zero disables the loop.
    pub interval: std::time::Duration,
    /// Age after which a `new` lead counts as stale.
    pub stale_after: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(5 * 60),
            stale_after: Duration::minutes(30),
        }
    }
}

/// One pass over stale leads. Each lead is flagged before its reminder goes
/// out, so a lead is reminded about at most once even if the send fails.
/// Returns how many reminders were delivered.
pub async fn run_reminder_tick(
    database: &Database,
    notifier: &Notifier,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let Some(cutoff) = now.checked_sub_signed(stale_after) else {
        return Ok(0);
    };
    let stale = database.stale_unnotified(cutoff)?;
    if stale.is_empty() {
        return Ok(0);
    }

    info!("⏰ {} stale lead(s) awaiting the operator", stale.len());

    let mut delivered = 0;
    for lead in stale {
        if !database.mark_notified(lead.id)? {
            continue;
        }
        match notifier.stale_lead(&lead, now).await {
            Ok(()) => {
                info!("Sent reminder for lead #{}", lead.id);
                delivered += 1;
            }
            Err(e) => warn!("Failed to send reminder for lead #{}: {}", lead.id, e),
        }
    }
    Ok(delivered)
}

/// Spawn the reminder loop. Returns `None` when reminders are disabled.
pub fn spawn_reminder_loop(
    database: Arc<Database>,
    notifier: Notifier,
    settings: ReminderSettings,
) -> Option<JoinHandle<()>> {
    if settings.interval.is_zero() {
        info!("Reminders disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = run_reminder_tick(&database, &notifier, settings.stale_after, Utc::now()).await {
                error!("Reminder check failed: {}", e);
            }
        }
    }))
}

/// Validate cron expression.
pub fn validate_cron(expr: &str) -> Result<(), cron::error::Error> {
    Schedule::from_str(expr).map(|_| ())
}

/// Get next trigger time from cron expression.
pub fn next_cron_trigger(expr: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Schedule::from_str(expr).ok()?.after(&after).next()
}

/// Deliver an all-time export to the operator on every cron occurrence.
pub fn spawn_scheduled_export(database: Arc<Database>, notifier: Notifier, expr: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_cron_trigger(&expr, now) else {
                warn!("Export schedule '{}' has no future occurrence, stopping", expr);
                return;
            };
            info!("📊 Next scheduled export at {}", next);
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if let Err(e) = export::deliver_export(&database, &notifier, ExportWindow::All, Utc::now()).await {
                error!("Scheduled export failed: {}", e);
                if let Err(e) = notifier.send(&export::failure_notice(&e)).await {
                    warn!("Could not report export failure: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::database::{LeadStatus, sample_lead};
    use crate::assistant::transport::testing::RecordingTransport;

    const OPERATOR: i64 = 42;

    fn setup() -> (Arc<RecordingTransport>, Notifier, Database) {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone(), OPERATOR, chrono_tz::UTC);
        (transport, notifier, Database::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_stale_lead_is_reminded_once() {
        let (transport, notifier, db) = setup();
        let now = Utc::now();
        db.insert_lead(&sample_lead(1, now - Duration::hours(2))).unwrap();

        let sent = run_reminder_tick(&db, &notifier, Duration::minutes(30), now).await.unwrap();
        assert_eq!(sent, 1);
        assert!(db.get_lead(1).unwrap().unwrap().notified);
        assert_eq!(transport.texts_to(OPERATOR).len(), 1);
        assert!(transport.texts_to(OPERATOR)[0].contains("#1"));

        let sent = run_reminder_tick(&db, &notifier, Duration::minutes(30), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(sent, 0);
        assert_eq!(transport.texts_to(OPERATOR).len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_and_handled_leads_are_skipped() {
        let (transport, notifier, db) = setup();
        let now = Utc::now();
        db.insert_lead(&sample_lead(1, now - Duration::minutes(5))).unwrap();
        let handled = db.insert_lead(&sample_lead(2, now - Duration::hours(3))).unwrap();
        db.set_status(handled, LeadStatus::Work).unwrap();

        let sent = run_reminder_tick(&db, &notifier, Duration::minutes(30), now).await.unwrap();
        assert_eq!(sent, 0);
        assert!(transport.sent().is_empty());
        assert!(!db.get_lead(1).unwrap().unwrap().notified);
    }

    #[tokio::test]
    async fn test_failed_reminder_is_not_repeated() {
        let (transport, notifier, db) = setup();
        transport.fail_chat(OPERATOR);
        let now = Utc::now();
        db.insert_lead(&sample_lead(1, now - Duration::hours(2))).unwrap();

        assert_eq!(run_reminder_tick(&db, &notifier, Duration::minutes(30), now).await.unwrap(), 0);
        assert!(db.get_lead(1).unwrap().unwrap().notified);
        assert!(db.stale_unnotified(now).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_beyond_representable_time_finds_nothing() {
        let (transport, notifier, db) = setup();
        let now = Utc::now();
        db.insert_lead(&sample_lead(1, now - Duration::hours(2))).unwrap();

        assert_eq!(run_reminder_tick(&db, &notifier, Duration::MAX, now).await.unwrap(), 0);
        assert!(transport.sent().is_empty());
        assert!(!db.get_lead(1).unwrap().unwrap().notified);
    }

    #[test]
    fn test_disabled_loop_is_not_spawned() {
        let (_, notifier, db) = setup();
        let settings = ReminderSettings {
            interval: std::time::Duration::ZERO,
            ..ReminderSettings::default()
        };
        assert!(spawn_reminder_loop(Arc::new(db), notifier, settings).is_none());
    }

    #[test]
    fn test_validate_cron() {
        // cron crate uses sec min hour day month dow [year]
        assert!(validate_cron("0 0 9 * * *").is_ok());
        assert!(validate_cron("0 0 20 * * Mon-Fri *").is_ok());
        assert!(validate_cron("every day").is_err());
    }

    #[test]
    fn test_next_cron_trigger() {
        let now = Utc::now();
        let next = next_cron_trigger("0 0 * * * * *", now).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::hours(1));
        assert!(next_cron_trigger("nonsense", now).is_none());
    }
}
