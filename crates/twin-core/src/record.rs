//! Telemetry records and per-category value formatting.

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// A single telemetry datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// Identity of the feeder that produced the value.
    pub feeder: String,
    /// Production timestamp (Unix epoch milliseconds).
    pub timestamp: i64,
    /// Formatted value, shaped per category.
    pub value: RecordValue,
    /// Category the value belongs to.
    pub category: Category,
    /// Identifier assigned by the remote side; empty until then.
    #[serde(default)]
    pub id: String,
}

/// Formatted value of a record.
///
/// The shape is decided by the record's category when the record is built,
/// see [`RecordValue::format`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// Numeric reading paired with a unit string.
    Reading { value: f64, unit: String },
    /// Geographic coordinate pair.
    Position { lat: f64, lon: f64 },
    /// Bare numeric reading.
    Number(f64),
    /// Raw sequence of strings, unmodified.
    Texts(Vec<String>),
    /// Single pass-through string.
    Text(String),
}

/// Failure to build a [`RecordValue`] from client-supplied raw values.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("category '{category}' requires at least {required} value(s), got {got}")]
    MissingValue {
        category: Category,
        required: usize,
        got: usize,
    },
    #[error("category '{category}': '{raw}' is not a number")]
    BadNumber { category: Category, raw: String },
}

fn parse_number(category: &Category, raw: &str) -> Result<f64, FormatError> {
    raw.trim().parse().map_err(|_| FormatError::BadNumber {
        category: category.clone(),
        raw: raw.to_string(),
    })
}

fn require(category: &Category, raw: &[String], count: usize) -> Result<(), FormatError> {
    if raw.len() < count {
        return Err(FormatError::MissingValue {
            category: category.clone(),
            required: count,
            got: raw.len(),
        });
    }
    Ok(())
}

impl RecordValue {
    /// Build a value from raw client-supplied strings, dispatching on the
    /// category identifier.
    ///
    /// Unknown categories take the default arm: the first element is passed
    /// through unmodified.
    ///
    /// # Errors
    /// Returns [`FormatError`] when required elements are missing or not
    /// numeric.
    pub fn format(category: &Category, raw: &[String]) -> Result<Self, FormatError> {
        match category.name() {
            "body_temperature" => {
                require(category, raw, 1)?;
                Ok(Self::Reading {
                    value: parse_number(category, &raw[0])?,
                    unit: "°C".to_string(),
                })
            }
            "heart_rate" | "blood_oxygen" => {
                require(category, raw, 1)?;
                Ok(Self::Number(parse_number(category, &raw[0])?))
            }
            "position" => {
                require(category, raw, 2)?;
                Ok(Self::Position {
                    lat: parse_number(category, &raw[0])?,
                    lon: parse_number(category, &raw[1])?,
                })
            }
            "medical_record" => Ok(Self::Texts(raw.to_vec())),
            _ => {
                require(category, raw, 1)?;
                Ok(Self::Text(raw[0].clone()))
            }
        }
    }
}
