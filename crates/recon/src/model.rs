use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Marker shown wherever a value cannot be determined.
pub const DEFAULT_SENTINEL: &str = "N/A";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One scraped row: named fields to raw strings, keyed by ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub symbol: String,
    pub fields: HashMap<String, String>,
}

impl SourceRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().trim().to_string(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field insert, mostly for tests and fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Pre-loaded tables grouped by source name.
#[derive(Debug, Default)]
pub struct ReconInput {
    pub records: HashMap<String, Vec<SourceRecord>>,
}

// ---------------------------------------------------------------------------
// Merged output
// ---------------------------------------------------------------------------

/// A merged field: the raw value, or explicitly missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Value(String),
    Missing,
}

impl Cell {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn display<'a>(&'a self, sentinel: &'a str) -> &'a str {
        self.as_value().unwrap_or(sentinel)
    }
}

/// Why a derived field has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    /// One of the input cells is missing.
    MissingInput,
    /// An input cell is present but not a number.
    Unparseable,
    /// The reference value is zero.
    ZeroReference,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Derived {
    Value(f64),
    Unavailable(Unavailable),
}

impl Derived {
    /// Two-decimal rendering, `None` when unavailable.
    pub fn formatted(&self) -> Option<String> {
        match self {
            Self::Value(v) => {
                // Tiny negatives round to "-0.00"
                let text = format!("{v:.2}");
                Some(if text == "-0.00" { "0.00".to_string() } else { text })
            }
            Self::Unavailable(_) => None,
        }
    }

    pub fn display(&self, sentinel: &str) -> String {
        self.formatted().unwrap_or_else(|| sentinel.to_string())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Reconciled row for one ticker of the primary table.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// 1-based position in the primary table.
    pub rank: usize,
    pub symbol: String,
    pub fields: Vec<(String, Cell)>,
    pub derived: Vec<(String, Derived)>,
}

impl MergedRecord {
    pub fn field(&self, name: &str) -> Option<&Cell> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn derived(&self, name: &str) -> Option<&Derived> {
        self.derived.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Display string for any output column, field or derived.
    pub fn display(&self, name: &str, sentinel: &str) -> Option<String> {
        if let Some(cell) = self.field(name) {
            return Some(cell.display(sentinel).to_string());
        }
        self.derived(name).map(|d| d.display(sentinel))
    }

    pub fn unavailable_cells(&self) -> usize {
        self.fields.iter().filter(|(_, c)| c.is_missing()).count()
            + self.derived.iter().filter(|(_, d)| !d.is_available()).count()
    }

    /// Flat JSON object: `SN`, `Symbol`, then every column as a display string.
    pub fn to_json(&self, sentinel: &str) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("SN".into(), self.rank.into());
        obj.insert("Symbol".into(), self.symbol.clone().into());
        for (name, cell) in &self.fields {
            obj.insert(name.clone(), cell.display(sentinel).into());
        }
        for (name, derived) in &self.derived {
            obj.insert(name.clone(), derived.display(sentinel).into());
        }
        serde_json::Value::Object(obj)
    }
}

/// Column layout of a merged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSchema {
    /// Source-provided fields: primary first, then each secondary in order.
    pub fields: Vec<String>,
    pub derived: Vec<String>,
    pub sentinel: String,
}

impl ReconSchema {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .chain(self.derived.iter())
            .map(String::as_str)
    }

    pub fn width(&self) -> usize {
        self.fields.len() + self.derived.len()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub matched: usize,
    pub missing: usize,
    pub malformed: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedStats {
    pub available: usize,
    pub missing_input: usize,
    pub unparseable: usize,
    pub zero_reference: usize,
}

impl DerivedStats {
    pub fn unavailable(&self) -> usize {
        self.missing_input + self.unparseable + self.zero_reference
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub rows: usize,
    pub sources: BTreeMap<String, SourceStats>,
    pub derived: BTreeMap<String, DerivedStats>,
    pub unavailable_cells: usize,
    pub total_cells: usize,
}

impl ReconSummary {
    /// Share of sentinel cells in the output; `0.0` for an empty table.
    pub fn unavailable_ratio(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.unavailable_cells as f64 / self.total_cells as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub schema: ReconSchema,
    pub records: Vec<MergedRecord>,
    pub summary: ReconSummary,
}
