//! Phone normalization and validation.
//!
//! Input arrives either as free text typed by the buyer or as a contact
//! shared through the Telegram "send contact" button. Contact shares often
//! omit the leading `+`, typed numbers often carry spaces, dashes and
//! parentheses. Both are brought to one canonical shape before validation
//! and storage.

/// Minimum digit count accepted for numbers outside the home country.
const GENERAL_MIN_DIGITS: usize = 9;
/// Maximum digit count accepted for numbers outside the home country (E.164).
const GENERAL_MAX_DIGITS: usize = 15;

/// Country-specific phone rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneRule {
    /// Country calling code without the `+`, e.g. `998`.
    pub country_code: String,
    /// Total digit count of a full number including the country code.
    pub length: usize,
}

impl Default for PhoneRule {
    fn default() -> Self {
        Self {
            country_code: "998".to_string(),
            length: 12,
        }
    }
}

impl PhoneRule {
    pub fn new(country_code: impl Into<String>, length: usize) -> Self {
        Self {
            country_code: country_code.into(),
            length,
        }
    }

    /// Strip everything except digits and a single leading `+`.
    ///
    /// A bare number starting with the country code gets a `+` prepended:
    /// `998 90 123-45-67` → `+998901234567`.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let has_plus = trimmed.starts_with('+');
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

        if has_plus {
            format!("+{digits}")
        } else if !self.country_code.is_empty() && digits.starts_with(&self.country_code) {
            format!("+{digits}")
        } else {
            digits
        }
    }

    /// Check an already normalized number.
    pub fn is_valid(&self, normalized: &str) -> bool {
        let digits = normalized.strip_prefix('+').unwrap_or(normalized);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }

        let home_prefix = format!("+{}", self.country_code);
        if !self.country_code.is_empty() && normalized.starts_with(&home_prefix) {
            return digits.len() == self.length;
        }

        (GENERAL_MIN_DIGITS..=GENERAL_MAX_DIGITS).contains(&digits.len())
    }

    /// Normalize and validate in one step. Returns the canonical form.
    pub fn parse(&self, raw: &str) -> Option<String> {
        let normalized = self.normalize(raw);
        self.is_valid(&normalized).then_some(normalized)
    }
}
