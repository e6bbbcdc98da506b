//! Flat exports of a merged table: CSV and a JSON document.

use std::io;

use serde_json::json;

use nepse_recon::{MergedRecord, ReconResult, ReconSchema};

/// Write `SN,Symbol,<fields…>,<derived…>` followed by one row per record.
/// Unavailable cells are written as `sentinel`.
pub fn write_csv<W: io::Write>(
    writer: W,
    schema: &ReconSchema,
    records: &[MergedRecord],
    sentinel: &str,
) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["SN", "Symbol"];
    header.extend(schema.columns());
    out.write_record(&header)?;

    for record in records {
        let mut row = Vec::with_capacity(schema.width() + 2);
        row.push(record.rank.to_string());
        row.push(record.symbol.clone());
        for column in schema.columns() {
            row.push(
                record
                    .display(column, sentinel)
                    .unwrap_or_else(|| sentinel.to_string()),
            );
        }
        out.write_record(&row)?;
    }

    out.flush()?;
    Ok(())
}

/// The whole result as one JSON document: meta, columns, summary, rows.
pub fn to_json(result: &ReconResult) -> serde_json::Value {
    let sentinel = &result.schema.sentinel;
    let columns: Vec<&str> = ["SN", "Symbol"]
        .into_iter()
        .chain(result.schema.columns())
        .collect();
    json!({
        "meta": result.meta,
        "columns": columns,
        "summary": result.summary,
        "records": result
            .records
            .iter()
            .map(|r| r.to_json(sentinel))
            .collect::<Vec<_>>(),
    })
}
