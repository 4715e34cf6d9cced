//! Telemetry categories and the opaque category registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification tag for a kind of telemetry datum.
///
/// The set is open: the well-known constructors cover the categories with
/// dedicated value formatting, but any identifier is a valid category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Create a category from its identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Body temperature reading, formatted with a unit.
    #[must_use]
    pub fn body_temperature() -> Self {
        Self::new("body_temperature")
    }

    /// Heart rate reading.
    #[must_use]
    pub fn heart_rate() -> Self {
        Self::new("heart_rate")
    }

    /// Blood oxygen saturation reading.
    #[must_use]
    pub fn blood_oxygen() -> Self {
        Self::new("blood_oxygen")
    }

    /// Geographic position.
    #[must_use]
    pub fn position() -> Self {
        Self::new("position")
    }

    /// Free-form medical record entries.
    #[must_use]
    pub fn medical_record() -> Self {
        Self::new("medical_record")
    }

    /// The category identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque category registry, loaded once at startup from static
/// configuration.
///
/// The session layer only threads it through to channel construction and
/// never inspects its contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRegistry(Value);

impl CategoryRegistry {
    /// Wrap an already-loaded registry value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// The raw registry value, for channel constructors.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
