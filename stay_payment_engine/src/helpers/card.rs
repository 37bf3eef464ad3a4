use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CardError {
    #[error("Invalid card number")]
    InvalidNumber,
    #[error("Invalid card expiry: {0}")]
    InvalidExpiry(String),
}

fn card_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 13 to 19 digits covers every major scheme.
    RE.get_or_init(|| Regex::new(r"^\d{13,19}$").unwrap())
}

/// Strips spaces and dashes from a PAN and validates its shape. The returned string contains digits
/// only. Checksum validation is separate, see [`luhn_checksum_is_valid`].
pub fn normalize_card_number(raw: &str) -> Result<String, CardError> {
    let digits: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !card_number_regex().is_match(&digits) {
        return Err(CardError::InvalidNumber);
    }
    Ok(digits)
}

pub fn luhn_checksum_is_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let Some(d) = c.to_digit(10) else { return false };
        let d = if double {
            let d = d * 2;
            if d > 9 {
                d - 9
            } else {
                d
            }
        } else {
            d
        };
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

/// Card details as supplied by the customer. The full PAN is forwarded to the gateway and never
/// persisted; only the last four digits survive into the audit record.
#[derive(Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvv: String,
    pub holder_name: Option<String>,
}

impl CardDetails {
    pub fn validated(mut self) -> Result<Self, CardError> {
        self.card_number = normalize_card_number(&self.card_number)?;
        if !luhn_checksum_is_valid(&self.card_number) {
            return Err(CardError::InvalidNumber);
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(CardError::InvalidExpiry(format!("month {}", self.exp_month)));
        }
        Ok(self)
    }

    pub fn last4(&self) -> String {
        let n = self.card_number.len();
        self.card_number[n.saturating_sub(4)..].to_string()
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &format!("****{}", self.last4()))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}
