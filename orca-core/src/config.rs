//! Runtime settings

use serde::{Deserialize, Serialize};
use std::env;

/// Knobs shared by the evaluator and the variable manager.
/// Every field has a default, so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Decimal places kept on evaluated quantities
    pub quantity_places: u32,
    /// Prefix for generated variable names (`VAR1`, `VAR2`, ...)
    pub variable_prefix: String,
    /// Deepest parenthesis/unary nesting accepted by the parser
    pub max_nesting: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quantity_places: 4,
            variable_prefix: "VAR".to_string(),
            max_nesting: 64,
        }
    }
}

impl Settings {
    pub fn with_quantity_places(mut self, places: u32) -> Self {
        self.quantity_places = places;
        self
    }

    pub fn with_variable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.variable_prefix = prefix.into();
        self
    }

    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults overridden by `ORCA_QUANTITY_PLACES`, `ORCA_VARIABLE_PREFIX`
    /// and `ORCA_MAX_NESTING`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(places) = env::var("ORCA_QUANTITY_PLACES").ok().and_then(|v| v.parse().ok()) {
            settings.quantity_places = places;
        }
        if let Ok(prefix) = env::var("ORCA_VARIABLE_PREFIX") {
            if !prefix.trim().is_empty() {
                settings.variable_prefix = prefix.trim().to_uppercase();
            }
        }
        if let Some(depth) = env::var("ORCA_MAX_NESTING").ok().and_then(|v| v.parse().ok()) {
            settings.max_nesting = depth;
        }
        settings
    }
}
