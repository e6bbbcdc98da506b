use std::collections::BTreeMap;

use crate::config::{DerivedSpec, ReconConfig};
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::index::SecondaryIndex;
use crate::model::{
    Cell, MergedRecord, ReconInput, ReconMeta, ReconResult, SourceRecord, SourceStats,
};

/// Joins a primary table with secondary indexes and fills derived fields.
///
/// Stateless: holds only the field layout, so one instance can serve every
/// refresh pass.
#[derive(Debug, Clone)]
pub struct Reconciler {
    primary_fields: Vec<String>,
    derived: Vec<DerivedSpec>,
}

impl Reconciler {
    pub fn new(primary_fields: Vec<String>, derived: Vec<DerivedSpec>) -> Self {
        Self {
            primary_fields,
            derived,
        }
    }

    pub fn from_config(config: &ReconConfig) -> Self {
        let primary_fields = config
            .sources
            .get(&config.primary)
            .map(|s| s.fields())
            .unwrap_or_default();
        Self::new(primary_fields, config.derived.clone())
    }

    /// One merged row per primary row, in primary order.
    pub fn reconcile(
        &self,
        primary: &[SourceRecord],
        secondaries: &[SecondaryIndex],
    ) -> Vec<MergedRecord> {
        let mut stats = BTreeMap::new();
        self.reconcile_counted(primary, secondaries, &mut stats)
    }

    pub(crate) fn reconcile_counted(
        &self,
        primary: &[SourceRecord],
        secondaries: &[SecondaryIndex],
        stats: &mut BTreeMap<String, SourceStats>,
    ) -> Vec<MergedRecord> {
        for index in secondaries {
            stats.entry(index.name.clone()).or_default().duplicates = index.duplicates();
        }

        primary
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut fields: Vec<(String, Cell)> = self
                    .primary_fields
                    .iter()
                    .map(|f| (f.clone(), lookup(row, f)))
                    .collect();

                for index in secondaries {
                    let entry = stats.entry(index.name.clone()).or_default();
                    join_secondary(row, index, entry, &mut fields);
                }

                let mut merged = MergedRecord {
                    rank: i + 1,
                    symbol: row.symbol.clone(),
                    fields,
                    derived: Vec::new(),
                };
                crate::derived::apply(&mut merged, &self.derived);
                merged
            })
            .collect()
    }
}

fn lookup(record: &SourceRecord, field: &str) -> Cell {
    record
        .get(field)
        .map(|v| Cell::Value(v.to_string()))
        .unwrap_or(Cell::Missing)
}

/// Copy one secondary's fields into `fields`. A row missing any expected
/// field counts as malformed and contributes sentinels only.
fn join_secondary(
    row: &SourceRecord,
    index: &SecondaryIndex,
    stats: &mut SourceStats,
    fields: &mut Vec<(String, Cell)>,
) {
    let found = match index.get(&row.symbol) {
        Some(hit) if index.fields.iter().all(|f| hit.fields.contains_key(f)) => {
            stats.matched += 1;
            Some(hit)
        }
        Some(_) => {
            stats.malformed += 1;
            log::debug!(
                "source '{}': row for '{}' is missing expected fields",
                index.name,
                row.symbol
            );
            None
        }
        None => {
            stats.missing += 1;
            None
        }
    };

    for field in &index.fields {
        let cell = match found {
            Some(hit) => lookup(hit, field),
            None => Cell::Missing,
        };
        fields.push((field.clone(), cell));
    }
}

/// Run reconciliation per config. Returns merged rows + summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let primary = input.records.get(&config.primary).ok_or_else(|| {
        ReconError::UnknownSource(format!(
            "primary source '{}' has no input table",
            config.primary
        ))
    })?;

    let mut secondaries = Vec::with_capacity(config.secondaries.len());
    for name in &config.secondaries {
        let source = config.sources.get(name).ok_or_else(|| {
            ReconError::UnknownSource(format!("secondary source '{name}' is not declared"))
        })?;
        let rows = match input.records.get(name) {
            Some(rows) => rows.as_slice(),
            None => {
                log::warn!("source '{name}': no table in input, treating as empty");
                &[]
            }
        };
        secondaries.push(SecondaryIndex::from_config(name, source, rows));
    }

    let reconciler = Reconciler::from_config(config);
    let mut stats = BTreeMap::new();
    let records = reconciler.reconcile_counted(primary, &secondaries, &mut stats);
    let schema = config.schema();
    let summary = compute_summary(&records, &schema, stats);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        schema,
        records,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
