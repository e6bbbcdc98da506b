use std::collections::BTreeMap;

use crate::model::{
    Derived, DerivedStats, MergedRecord, ReconSchema, ReconSummary, SourceStats, Unavailable,
};

/// Compute summary statistics from merged rows plus the join counters.
pub fn compute_summary(
    records: &[MergedRecord],
    schema: &ReconSchema,
    sources: BTreeMap<String, SourceStats>,
) -> ReconSummary {
    let mut derived: BTreeMap<String, DerivedStats> = schema
        .derived
        .iter()
        .map(|name| (name.clone(), DerivedStats::default()))
        .collect();
    let mut unavailable_cells = 0;

    for record in records {
        unavailable_cells += record.unavailable_cells();

        for (name, value) in &record.derived {
            let stats = derived.entry(name.clone()).or_default();
            match value {
                Derived::Value(_) => stats.available += 1,
                Derived::Unavailable(Unavailable::MissingInput) => stats.missing_input += 1,
                Derived::Unavailable(Unavailable::Unparseable) => stats.unparseable += 1,
                Derived::Unavailable(Unavailable::ZeroReference) => stats.zero_reference += 1,
            }
        }
    }

    ReconSummary {
        rows: records.len(),
        sources,
        derived,
        unavailable_cells,
        total_cells: records.len() * schema.width(),
    }
}
