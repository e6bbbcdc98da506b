use std::path::PathBuf;

use nepse_recon::config::ReconConfig;
use nepse_recon::engine::run;
use nepse_recon::model::{Derived, ReconInput, ReconResult, SourceRecord, Unavailable};
use nepse_recon::source::load_csv_records;
use nepse_recon::ReconError;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("nepse.recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn load_and_run() -> ReconResult {
    let config = load_config();
    let mut input = ReconInput::default();
    for (name, file) in [("live", "live.csv"), ("today", "today.csv")] {
        let path = fixtures_dir().join(file);
        let csv = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
        let rows = load_csv_records(name, &csv, &config.sources[name]).unwrap();
        input.records.insert(name.to_string(), rows);
    }
    run(&config, &input).unwrap()
}

fn cell(result: &ReconResult, symbol: &str, column: &str) -> String {
    let record = result
        .records
        .iter()
        .find(|r| r.symbol == symbol)
        .unwrap_or_else(|| panic!("no row for {symbol}"));
    record
        .display(column, &result.schema.sentinel)
        .unwrap_or_else(|| panic!("no column {column}"))
}

// -------------------------------------------------------------------------
// Fixture pass
// -------------------------------------------------------------------------

#[test]
fn rows_follow_live_table_order() {
    let result = load_and_run();
    let symbols: Vec<_> = result.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["NABIL", "NICA", "UPPER", "NEWCO", "ZEROHI"]);
    assert_eq!(result.meta.config_name, "NEPSE live board");
}

#[test]
fn every_row_has_every_column() {
    let result = load_and_run();
    let columns: Vec<_> = result.schema.columns().collect();
    assert_eq!(columns.len(), 11);
    for record in &result.records {
        for column in &columns {
            assert!(record.display(column, "N/A").is_some(), "{} lacks {column}", record.symbol);
        }
    }
}

#[test]
fn fully_matched_row() {
    let result = load_and_run();
    assert_eq!(cell(&result, "NABIL", "LTP"), "1,205.00");
    assert_eq!(cell(&result, "NABIL", "Turnover"), "54,252,000");
    assert_eq!(cell(&result, "NABIL", "Down From High (%)"), "19.67");
    assert_eq!(cell(&result, "NABIL", "Up From Low (%)"), "20.50");
}

#[test]
fn duplicate_secondary_symbol_keeps_last_row() {
    let result = load_and_run();
    assert_eq!(cell(&result, "NICA", "52 Week High"), "1,000.00");
    assert_eq!(cell(&result, "NICA", "Down From High (%)"), "15.50");
    assert_eq!(result.summary.sources["today"].duplicates, 1);
}

#[test]
fn placeholder_price_degrades_only_derived() {
    let result = load_and_run();
    assert_eq!(cell(&result, "UPPER", "LTP"), "-");
    assert_eq!(cell(&result, "UPPER", "52 Week High"), "260.00");
    assert_eq!(cell(&result, "UPPER", "Down From High (%)"), "N/A");
    assert_eq!(cell(&result, "UPPER", "Up From Low (%)"), "N/A");
}

#[test]
fn ticker_absent_from_secondary() {
    let result = load_and_run();
    assert_eq!(cell(&result, "NEWCO", "LTP"), "310.00");
    for column in ["Turnover", "52 Week High", "52 Week Low", "Down From High (%)", "Up From Low (%)"] {
        assert_eq!(cell(&result, "NEWCO", column), "N/A", "{column}");
    }
    assert_eq!(result.summary.sources["today"].missing, 1);
    assert_eq!(result.summary.sources["today"].matched, 4);
}

#[test]
fn zero_and_placeholder_references() {
    let result = load_and_run();
    let record = result.records.iter().find(|r| r.symbol == "ZEROHI").unwrap();
    assert_eq!(
        record.derived("Down From High (%)"),
        Some(&Derived::Unavailable(Unavailable::ZeroReference))
    );
    assert_eq!(
        record.derived("Up From Low (%)"),
        Some(&Derived::Unavailable(Unavailable::Unparseable))
    );
}

#[test]
fn summary_totals() {
    let result = load_and_run();
    let summary = &result.summary;
    assert_eq!(summary.rows, 5);
    assert_eq!(summary.total_cells, 5 * 11);
    let high = &summary.derived["Down From High (%)"];
    assert_eq!(high.available, 2);
    assert_eq!(high.unparseable, 1);
    assert_eq!(high.missing_input, 1);
    assert_eq!(high.zero_reference, 1);
}

#[test]
fn run_is_idempotent() {
    let a = load_and_run();
    let b = load_and_run();
    assert_eq!(a.records, b.records);
    assert_eq!(a.summary, b.summary);
}

// -------------------------------------------------------------------------
// Structural errors
// -------------------------------------------------------------------------

#[test]
fn missing_primary_table_is_an_error() {
    let config = load_config();
    let mut input = ReconInput::default();
    input.records.insert("today".into(), Vec::new());
    let err = run(&config, &input).unwrap_err();
    assert!(matches!(err, ReconError::UnknownSource(_)));
}

#[test]
fn missing_secondary_table_is_treated_as_empty() {
    let config = load_config();
    let mut input = ReconInput::default();
    input.records.insert(
        "live".into(),
        vec![SourceRecord::new("XYZ").with("LTP", "50")],
    );
    let result = run(&config, &input).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(cell(&result, "XYZ", "LTP"), "50");
    assert_eq!(cell(&result, "XYZ", "52 Week High"), "N/A");
    assert_eq!(cell(&result, "XYZ", "Up From Low (%)"), "N/A");
}

#[test]
fn empty_primary_table_is_valid() {
    let config = load_config();
    let mut input = ReconInput::default();
    input.records.insert("live".into(), Vec::new());
    let result = run(&config, &input).unwrap();
    assert!(result.records.is_empty());
    assert_eq!(result.summary.unavailable_ratio(), 0.0);
}
