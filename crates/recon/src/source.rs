use crate::config::SourceConfig;
use crate::error::ReconError;
use crate::model::SourceRecord;

/// Load a headed CSV table into source records using the source's column
/// mapping. Headers not listed in the mapping are ignored; rows with a
/// blank symbol are skipped.
pub fn load_csv_records(
    source_name: &str,
    csv_data: &str,
    source_config: &SourceConfig,
) -> Result<Vec<SourceRecord>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let symbol_idx = headers
        .iter()
        .position(|h| h == &source_config.symbol_column)
        .ok_or_else(|| ReconError::MissingColumn {
            source: source_name.into(),
            column: source_config.symbol_column.clone(),
        })?;

    // Mapped columns absent from the file just leave the field unset
    let mapped: Vec<(usize, String)> = source_config
        .columns
        .iter()
        .filter_map(|col| {
            let idx = headers.iter().position(|h| h == &col.header);
            if idx.is_none() {
                log::warn!("source '{source_name}': column '{}' not found", col.header);
            }
            idx.map(|i| (i, col.field_name().to_string()))
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let symbol = record.get(symbol_idx).unwrap_or("").trim();
        if symbol.is_empty() {
            continue;
        }

        let mut row = SourceRecord::new(symbol);
        for (idx, field) in &mapped {
            if let Some(value) = record.get(*idx) {
                row.fields.insert(field.clone(), value.trim().to_string());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;

    fn config() -> SourceConfig {
        SourceConfig {
            url: None,
            table: None,
            symbol_column: "Symbol".into(),
            columns: vec![
                ColumnMapping { header: "LTP".into(), field: None },
                ColumnMapping { header: "% Change".into(), field: Some("Change%".into()) },
            ],
        }
    }

    #[test]
    fn load_mapped_columns() {
        let csv = "\
S.No,Symbol,LTP,% Change,Volume
1,NABIL,\"1,205.00\",1.2,500
2,NICA,845,-0.5,1200
";
        let rows = load_csv_records("live", csv, &config()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "NABIL");
        assert_eq!(rows[0].get("LTP"), Some("1,205.00"));
        assert_eq!(rows[0].get("Change%"), Some("1.2"));
        assert_eq!(rows[0].get("Volume"), None);
        assert_eq!(rows[1].get("Change%"), Some("-0.5"));
    }

    #[test]
    fn skips_blank_symbols() {
        let csv = "Symbol,LTP,% Change\n,10,1\nABC,11,2\n";
        let rows = load_csv_records("live", csv, &config()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "ABC");
    }

    #[test]
    fn missing_symbol_column() {
        let csv = "Ticker,LTP\nABC,10\n";
        let err = load_csv_records("live", csv, &config()).unwrap_err();
        assert!(matches!(err, ReconError::MissingColumn { .. }));
        assert!(err.to_string().contains("'Symbol'"));
    }

    #[test]
    fn absent_mapped_column_leaves_field_unset() {
        let csv = "Symbol,LTP\nABC,10\n";
        let rows = load_csv_records("live", csv, &config()).unwrap();
        assert_eq!(rows[0].get("LTP"), Some("10"));
        assert_eq!(rows[0].get("Change%"), None);
    }
}
