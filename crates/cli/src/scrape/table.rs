//! HTML table → source records.
//!
//! Header text comes from the first `thead` row, or from the first row of
//! the table when there is no `thead`. Every other row is data. Cell text
//! is whitespace-normalized; source sites pad cells with newlines and
//! indentation.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use nepse_recon::config::SourceConfig;
use nepse_recon::SourceRecord;

use super::ScrapeError;

/// Used when a source sets no `table` selector.
pub const DEFAULT_TABLE_SELECTOR: &str = "table";

fn selector(source: &str, text: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(text).map_err(|_| ScrapeError::BadSelector {
        source: source.to_string(),
        selector: text.to_string(),
    })
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cell_texts(row: &ElementRef<'_>, cells: &Selector) -> Vec<String> {
    row.select(cells)
        .map(|cell| normalize(&cell.text().collect::<String>()))
        .collect()
}

fn in_thead(row: &ElementRef<'_>) -> bool {
    row.ancestors()
        .any(|node| node.value().as_element().is_some_and(|e| e.name() == "thead"))
}

/// Parse `html` and read the source's table into records.
pub fn extract_table(
    source_name: &str,
    html: &str,
    source: &SourceConfig,
) -> Result<Vec<SourceRecord>, ScrapeError> {
    let table_text = source.table.as_deref().unwrap_or(DEFAULT_TABLE_SELECTOR);
    let table_sel = selector(source_name, table_text)?;
    let row_sel = selector(source_name, "tr")?;
    let cell_sel = selector(source_name, "th, td")?;
    let thead_sel = selector(source_name, "thead")?;

    let document = Html::parse_document(html);
    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| ScrapeError::TableNotFound {
            source: source_name.to_string(),
            selector: table_text.to_string(),
        })?;

    let mut rows = table.select(&row_sel).filter(|r| !in_thead(r));
    let headers = match table.select(&thead_sel).next() {
        Some(thead) => thead.select(&row_sel).next().map(|r| cell_texts(&r, &cell_sel)),
        None => rows.next().map(|r| cell_texts(&r, &cell_sel)),
    }
    .filter(|h| !h.is_empty())
    .ok_or_else(|| ScrapeError::NoHeader {
        source: source_name.to_string(),
    })?;

    let position: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let symbol_idx = *position
        .get(source.symbol_column.as_str())
        .ok_or_else(|| ScrapeError::MissingColumn {
            source: source_name.to_string(),
            column: source.symbol_column.clone(),
        })?;

    let mapped: Vec<(usize, &str)> = source
        .columns
        .iter()
        .filter_map(|col| match position.get(col.header.as_str()) {
            Some(&i) => Some((i, col.field_name())),
            None => {
                log::warn!("source '{source_name}': column '{}' not in table", col.header);
                None
            }
        })
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let cells = cell_texts(&row, &cell_sel);
        // Spacer and "no data" rows have no symbol cell
        let Some(symbol) = cells.get(symbol_idx).filter(|s| !s.is_empty()) else {
            continue;
        };
        let mut record = SourceRecord::new(symbol.as_str());
        for &(idx, field) in &mapped {
            if let Some(value) = cells.get(idx) {
                record.fields.insert(field.to_string(), value.clone());
            }
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nepse_recon::config::ColumnMapping;

    fn source(table: Option<&str>) -> SourceConfig {
        SourceConfig {
            url: None,
            table: table.map(String::from),
            symbol_column: "Symbol".into(),
            columns: vec![
                ColumnMapping { header: "LTP".into(), field: None },
                ColumnMapping { header: "% Change".into(), field: Some("Change%".into()) },
            ],
        }
    }

    const LIVE: &str = r#"
<html><body>
  <table id="other"><tr><td>ads</td></tr></table>
  <table id="headFixed">
    <thead>
      <tr><th>S.No</th><th>Symbol</th><th>LTP</th><th>
          % Change
      </th></tr>
    </thead>
    <tbody>
      <tr><td>1</td><td><a href="/company/nabil">NABIL</a></td><td>1,205.00</td><td>1.01</td></tr>
      <tr><td>2</td><td>
          NICA
      </td><td>845.00</td><td>-0.47</td></tr>
      <tr><td colspan="4">No more data</td></tr>
    </tbody>
  </table>
</body></html>"#;

    #[test]
    fn test_reads_selected_table() {
        let rows = extract_table("live", LIVE, &source(Some("table#headFixed"))).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "NABIL");
        assert_eq!(rows[0].get("LTP"), Some("1,205.00"));
        assert_eq!(rows[0].get("Change%"), Some("1.01"));
        assert_eq!(rows[1].symbol, "NICA");
        assert_eq!(rows[1].get("Change%"), Some("-0.47"));
    }

    #[test]
    fn test_first_row_is_header_without_thead() {
        let html = "<table><tr><th>Symbol</th><th>LTP</th></tr><tr><td>ABC</td><td>10</td></tr></table>";
        let rows = extract_table("live", html, &source(None)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "ABC");
        assert_eq!(rows[0].get("LTP"), Some("10"));
        assert_eq!(rows[0].get("Change%"), None);
    }

    #[test]
    fn test_missing_table() {
        let err = extract_table("live", "<p>maintenance</p>", &source(Some("table#headFixed"))).unwrap_err();
        assert!(matches!(err, ScrapeError::TableNotFound { .. }));
    }

    #[test]
    fn test_missing_symbol_column() {
        let html = "<table><tr><th>Ticker</th></tr><tr><td>ABC</td></tr></table>";
        let err = extract_table("live", html, &source(None)).unwrap_err();
        assert_eq!(
            err,
            ScrapeError::MissingColumn { source: "live".into(), column: "Symbol".into() }
        );
    }

    #[test]
    fn test_bad_selector() {
        let err = extract_table("live", LIVE, &source(Some("table[[["))).unwrap_err();
        assert!(matches!(err, ScrapeError::BadSelector { .. }));
    }

    #[test]
    fn test_cell_text_is_not_html_decoded_twice() {
        let html = "<table><tr><th>Symbol</th><th>LTP</th></tr><tr><td>A&amp;B</td><td>&lt;1&gt;</td></tr></table>";
        let rows = extract_table("live", html, &source(None)).unwrap();
        assert_eq!(rows[0].symbol, "A&B");
        assert_eq!(rows[0].get("LTP"), Some("<1>"));
    }
}
