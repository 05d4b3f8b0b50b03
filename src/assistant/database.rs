//! Persistent SQLite database for leads and per-user languages.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::assistant::i18n::Language;

/// Errors from the lead store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    Poisoned,
}

/// Lead processing status. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadStatus {
    New,
    Work,
    Paid,
    Shipped,
    Closed,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Work,
        LeadStatus::Paid,
        LeadStatus::Shipped,
        LeadStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Work => "work",
            LeadStatus::Paid => "paid",
            LeadStatus::Shipped => "shipped",
            LeadStatus::Closed => "closed",
        }
    }

    /// Nobody has picked the lead up yet.
    pub fn is_unresolved(self) -> bool {
        self == LeadStatus::New
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}' (expected one of: new, work, paid, shipped, closed)")]
pub struct UnknownStatus(pub String);

impl FromStr for LeadStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown language code '{0}'")]
struct UnknownLanguage(String);

/// A lead about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub language: Language,
    pub role: String,
    pub product: String,
    pub quantity: String,
    pub city: String,
    /// Normalized phone.
    pub phone: String,
}

impl NewLead {
    /// The stored form of this lead once the store has assigned `id`.
    pub fn into_lead(self, id: i64) -> Lead {
        Lead {
            id,
            created_at: self.created_at,
            user_id: self.user_id,
            username: self.username,
            full_name: self.full_name,
            language: self.language,
            role: self.role,
            product: self.product,
            quantity: self.quantity,
            city: self.city,
            phone: self.phone,
            status: LeadStatus::New,
            notified: false,
        }
    }
}

/// A stored lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub language: Language,
    pub role: String,
    pub product: String,
    pub quantity: String,
    pub city: String,
    pub phone: String,
    pub status: LeadStatus,
    /// A stale-lead reminder has been sent for this lead.
    pub notified: bool,
}

const LEAD_COLUMNS: &str =
    "id, created_at, user_id, username, full_name, lang, role, product, qty, city, phone, status, notified";

/// Fixed-width UTC timestamps so that text comparison orders chronologically.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let created_at: String = row.get(1)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(1, e))?;
    let lang: String = row.get(5)?;
    let language = Language::from_code(&lang).ok_or_else(|| conversion_error(5, UnknownLanguage(lang)))?;
    let status: String = row.get(11)?;
    let status = status.parse::<LeadStatus>().map_err(|e| conversion_error(11, e))?;

    Ok(Lead {
        id: row.get(0)?,
        created_at,
        user_id: row.get(2)?,
        username: row.get(3)?,
        full_name: row.get(4)?,
        language,
        role: row.get(6)?,
        product: row.get(7)?,
        quantity: row.get(8)?,
        city: row.get(9)?,
        phone: row.get(10)?,
        status,
        notified: row.get(12)?,
    })
}

/// SQLite-backed store. One connection behind a mutex serializes writers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        db.init_schema()?;
        info!("Loaded database from {:?} ({} leads)", path, db.lead_count()?);
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                language TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT,
                full_name TEXT NOT NULL,
                lang TEXT NOT NULL,
                role TEXT NOT NULL,
                product TEXT NOT NULL,
                qty TEXT NOT NULL,
                city TEXT NOT NULL,
                phone TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                notified INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
            CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
        "#,
        )?;
        Ok(())
    }

    fn query_leads<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Lead>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let leads = stmt
            .query_map(params, lead_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    // ==================== USER METHODS ====================

    /// Stored language for a user, if they ever picked or were assigned one.
    pub fn language(&self, user_id: i64) -> Result<Option<Language>, StoreError> {
        let conn = self.conn()?;
        let code: Option<String> = conn
            .query_row(
                "SELECT language FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code.as_deref().and_then(Language::from_code))
    }

    pub fn set_language(&self, user_id: i64, language: Language) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (user_id, language, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET language = ?2, updated_at = ?3",
            params![user_id, language.code(), format_ts(Utc::now())],
        )?;
        debug!("Language for {} set to {}", user_id, language.code());
        Ok(())
    }

    // ==================== LEAD METHODS ====================

    /// Insert a lead and return its id. The only way leads are created.
    pub fn insert_lead(&self, lead: &NewLead) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO leads (created_at, user_id, username, full_name, lang, role, product, qty, city, phone, status, notified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
            params![
                format_ts(lead.created_at),
                lead.user_id,
                lead.username,
                lead.full_name,
                lead.language.code(),
                lead.role,
                lead.product,
                lead.quantity,
                lead.city,
                lead.phone,
                LeadStatus::New.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_lead(&self, id: i64) -> Result<Option<Lead>, StoreError> {
        let conn = self.conn()?;
        let lead = conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id],
                lead_from_row,
            )
            .optional()?;
        Ok(lead)
    }

    /// The `limit` newest leads, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(
            &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY id DESC LIMIT ?1"),
            params![limit as i64],
        )
    }

    /// Every lead, oldest first.
    pub fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(&format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY id ASC"), [])
    }

    /// Leads created at or after `cutoff`, oldest first.
    pub fn list_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(
            &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE created_at >= ?1 ORDER BY id ASC"),
            params![format_ts(cutoff)],
        )
    }

    /// Set a lead's status. Returns whether the lead exists.
    pub fn set_status(&self, id: i64, status: LeadStatus) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE leads SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Unresolved leads created at or before `cutoff` that have not been reminded about.
    pub fn stale_unnotified(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(
            &format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE status = ?1 AND notified = 0 AND created_at <= ?2
                 ORDER BY id ASC"
            ),
            params![LeadStatus::New.as_str(), format_ts(cutoff)],
        )
    }

    /// Flag a lead as reminded. Returns `false` if it was already flagged or does not exist.
    pub fn mark_notified(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE leads SET notified = 1 WHERE id = ?1 AND notified = 0",
            params![id],
        )?;
        Ok(changed > 0)
    }

    pub fn lead_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
pub(crate) fn sample_lead(user_id: i64, created_at: DateTime<Utc>) -> NewLead {
    NewLead {
        created_at,
        user_id,
        username: Some(format!("user{user_id}")),
        full_name: format!("User {user_id}"),
        language: Language::Uz,
        role: "Do'kon".to_string(),
        product: "Xudi".to_string(),
        quantity: "50–100".to_string(),
        city: "Tashkent".to_string(),
        phone: "+998901112233".to_string(),
    }
}

#[cfg(test)]
impl Database {
    /// Remove the leads table so every lead query fails.
    pub(crate) fn drop_leads_table(&self) {
        self.conn().unwrap().execute_batch("DROP TABLE leads").unwrap();
    }
}
