//! Structural schema filter for raw log payloads
//!
//! The topic still carries legacy "order" messages. There is no version tag,
//! so a payload counts as a trade only if its JSON object has every field in
//! [`REQUIRED_FIELDS`]; anything else is rejected as a schema mismatch.
//! Unknown extra fields are ignored.

use crate::trade::{Trade, REQUIRED_FIELDS};
use serde_json::Value;

/// Why a payload was dropped. Every variant is a schema mismatch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("payload is not valid JSON: {0}")]
    NotJson(String),
    #[error("payload is JSON but not an object")]
    NotAnObject,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("required fields present but malformed: {0}")]
    Malformed(String),
}

impl Rejection {
    /// Reason label used in logs and counters
    pub fn reason(&self) -> &'static str {
        "schema_mismatch"
    }

    /// True for the old order-shaped messages that simply lack trade fields
    pub fn is_legacy_shape(&self) -> bool {
        matches!(self, Rejection::MissingFields(_))
    }
}

/// Decide whether a raw payload is a current-generation trade.
pub fn filter_message(payload: &[u8]) -> Result<Trade, Rejection> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| Rejection::NotJson(e.to_string()))?;
    filter_value(value)
}

/// Same decision for an already parsed value
pub fn filter_value(value: Value) -> Result<Trade, Rejection> {
    let object = value.as_object().ok_or(Rejection::NotAnObject)?;

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::MissingFields(missing));
    }

    let trade: Trade = serde_json::from_value(value).map_err(|e| Rejection::Malformed(e.to_string()))?;
    validate(&trade)?;
    Ok(trade)
}

fn validate(trade: &Trade) -> Result<(), Rejection> {
    if trade.trade_id.trim().is_empty() {
        return Err(Rejection::Malformed("trade_id is empty".to_string()));
    }
    if trade.ticker.trim().is_empty() {
        return Err(Rejection::Malformed("ticker is empty".to_string()));
    }
    if !trade.price.is_finite() || trade.price <= 0.0 {
        return Err(Rejection::Malformed(format!("price must be positive, got {}", trade.price)));
    }
    if trade.volume == 0 {
        return Err(Rejection::Malformed("volume must be positive".to_string()));
    }
    Ok(())
}
