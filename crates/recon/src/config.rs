use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{ReconSchema, DEFAULT_SENTINEL};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Source whose rows and order define the output.
    pub primary: String,
    /// Enrichment sources, in output column order.
    pub secondaries: Vec<String>,
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub derived: Vec<DerivedSpec>,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One scraped table. `url` and `table` are only read by the scraper.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub url: Option<String>,
    /// CSS selector for the table element.
    #[serde(default)]
    pub table: Option<String>,
    pub symbol_column: String,
    pub columns: Vec<ColumnMapping>,
}

impl SourceConfig {
    /// Output field names in declaration order.
    pub fn fields(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field_name().to_string()).collect()
    }
}

/// Source header → output field. `field` defaults to the header text.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub header: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl ColumnMapping {
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.header)
    }
}

// ---------------------------------------------------------------------------
// Derived fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    /// `(reference - current) / reference * 100`
    DistanceFromHigh,
    /// `(current - reference) / reference * 100`
    DistanceFromLow,
}

impl std::fmt::Display for DerivedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DistanceFromHigh => write!(f, "distance_from_high"),
            Self::DistanceFromLow => write!(f, "distance_from_low"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivedSpec {
    pub name: String,
    pub kind: DerivedKind,
    pub current: String,
    pub reference: String,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.sources.contains_key(&self.primary) {
            return Err(ReconError::UnknownSource(format!(
                "primary source '{}' is not declared",
                self.primary
            )));
        }

        if self.secondaries.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one secondary source is required".into(),
            ));
        }

        let mut seen_sources = HashSet::new();
        for name in &self.secondaries {
            if name == &self.primary {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{name}' cannot be both primary and secondary"
                )));
            }
            if !self.sources.contains_key(name) {
                return Err(ReconError::UnknownSource(format!(
                    "secondary source '{name}' is not declared"
                )));
            }
            if !seen_sources.insert(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "secondary source '{name}' is listed twice"
                )));
            }
        }

        // Every output field is produced by exactly one source
        let mut owners: HashMap<String, &str> = HashMap::new();
        for name in self.source_order() {
            let source = &self.sources[name];
            if source.columns.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{name}' has no columns"
                )));
            }
            for field in source.fields() {
                if let Some(other) = owners.insert(field.clone(), name) {
                    return Err(ReconError::ConfigValidation(format!(
                        "field '{field}' is produced by both '{other}' and '{name}'"
                    )));
                }
            }
        }

        for spec in &self.derived {
            for input in [&spec.current, &spec.reference] {
                if !owners.contains_key(input) {
                    return Err(ReconError::ConfigValidation(format!(
                        "derived field '{}': unknown input field '{input}'",
                        spec.name
                    )));
                }
            }
            if owners.contains_key(&spec.name) {
                return Err(ReconError::ConfigValidation(format!(
                    "derived field '{}' collides with a source field",
                    spec.name
                )));
            }
        }

        let mut derived_names = HashSet::new();
        for spec in &self.derived {
            if !derived_names.insert(&spec.name) {
                return Err(ReconError::ConfigValidation(format!(
                    "derived field '{}' is declared twice",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// Primary first, then secondaries in declared order.
    pub fn source_order(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.secondaries.iter().map(String::as_str))
    }

    pub fn schema(&self) -> ReconSchema {
        let fields = self
            .source_order()
            .filter_map(|name| self.sources.get(name))
            .flat_map(|s| s.fields())
            .collect();
        ReconSchema {
            fields,
            derived: self.derived.iter().map(|d| d.name.clone()).collect(),
            sentinel: self.sentinel.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
