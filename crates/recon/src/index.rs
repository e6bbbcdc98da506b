use std::collections::HashMap;

use crate::config::SourceConfig;
use crate::model::SourceRecord;

/// Ticker → record lookup for one secondary table, built once per pass.
#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    pub name: String,
    /// Fields this source contributes to every merged row.
    pub fields: Vec<String>,
    by_symbol: HashMap<String, SourceRecord>,
    duplicates: usize,
}

impl SecondaryIndex {
    /// Index `records` by symbol. A repeated symbol replaces the earlier row.
    pub fn build(name: &str, fields: Vec<String>, records: &[SourceRecord]) -> Self {
        let mut by_symbol = HashMap::with_capacity(records.len());
        let mut duplicates = 0;

        for record in records {
            if by_symbol
                .insert(record.symbol.clone(), record.clone())
                .is_some()
            {
                duplicates += 1;
                log::warn!(
                    "source '{name}': duplicate symbol '{}', keeping the later row",
                    record.symbol
                );
            }
        }

        Self {
            name: name.to_string(),
            fields,
            by_symbol,
            duplicates,
        }
    }

    pub fn from_config(name: &str, config: &SourceConfig, records: &[SourceRecord]) -> Self {
        Self::build(name, config.fields(), records)
    }

    pub fn get(&self, symbol: &str) -> Option<&SourceRecord> {
        self.by_symbol.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
