//! Merged records → standalone HTML page.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use nepse_config::PageSettings;
use nepse_recon::{MergedRecord, ReconSchema};

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 0; padding: 0; }
h1 { text-align: center; font-size: 40px; font-weight: bold; margin-top: 20px; }
h2 { text-align: center; font-size: 14px; margin-bottom: 20px; }
.table-container { margin: 0 auto; width: 95%; overflow: auto; height: 600px; }
table { width: 100%; border-collapse: collapse; margin-top: 20px; font-size: 14px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: center; }
th { background-color: #8B4513; color: white; position: sticky; top: 0; }
.updated-time { font-size: 14px; margin: 10px; display: flex; justify-content: space-between; }
.search-container { text-align: center; margin-bottom: 10px; }
.search-container input { width: 200px; padding: 5px; font-size: 14px; }
";

// Column 1 is Symbol (column 0 is SN)
const FILTER_SCRIPT: &str = "\
function filterTable() {
  var query = document.getElementById('searchInput').value.toUpperCase();
  var rows = document.getElementById('nepseTable').tBodies[0].rows;
  for (var i = 0; i < rows.length; i++) {
    var symbol = rows[i].cells[1].textContent.toUpperCase();
    rows[i].style.display = symbol.indexOf(query) > -1 ? '' : 'none';
  }
}
";

/// Escape text for element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// "Updated on" stamp in the page's configured offset.
pub fn format_updated(generated_at: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    generated_at
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

pub fn render_page(
    page: &PageSettings,
    schema: &ReconSchema,
    records: &[MergedRecord],
    generated_at: DateTime<Utc>,
    sentinel: &str,
) -> String {
    let mut html = String::with_capacity(4096 + records.len() * 256);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&page.title)));
    html.push_str(&format!("<style>\n{STYLE}</style>\n"));
    html.push_str("</head>\n<body>\n");

    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&page.heading)));
    if !page.subheading.is_empty() {
        html.push_str(&format!("<h2>{}</h2>\n", escape_html(&page.subheading)));
    }

    html.push_str("<div class=\"updated-time\">\n");
    html.push_str(&format!(
        "<div class=\"left\">Updated on: {}</div>\n",
        escape_html(&format_updated(generated_at, page.utc_offset_minutes))
    ));
    if let Some(name) = &page.credit_name {
        let credit = match &page.credit_url {
            Some(url) => format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(name)),
            None => escape_html(name),
        };
        html.push_str(&format!("<div class=\"right\">Developed By: {credit}</div>\n"));
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"search-container\">\n");
    html.push_str(
        "<input type=\"text\" id=\"searchInput\" onkeyup=\"filterTable()\" placeholder=\"Search for symbols...\">\n",
    );
    html.push_str("</div>\n");

    html.push_str("<div class=\"table-container\">\n<table id=\"nepseTable\">\n<thead>\n<tr>");
    html.push_str("<th>SN</th><th>Symbol</th>");
    for column in schema.columns() {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for record in records {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td>",
            record.rank,
            escape_html(&record.symbol)
        ));
        for column in schema.columns() {
            let value = record
                .display(column, sentinel)
                .unwrap_or_else(|| sentinel.to_string());
            html.push_str(&format!("<td>{}</td>", escape_html(&value)));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</div>\n");
    html.push_str(&format!("<script>\n{FILTER_SCRIPT}</script>\n"));
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nepse_recon::model::{Cell, Derived, Unavailable};

    fn schema() -> ReconSchema {
        ReconSchema {
            fields: vec!["LTP".into(), "52 Week High".into()],
            derived: vec!["Down From High (%)".into()],
            sentinel: "N/A".into(),
        }
    }

    fn record(rank: usize, symbol: &str, ltp: Cell, high: Cell, derived: Derived) -> MergedRecord {
        MergedRecord {
            rank,
            symbol: symbol.into(),
            fields: vec![("LTP".into(), ltp), ("52 Week High".into(), high)],
            derived: vec![("Down From High (%)".into(), derived)],
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_updated_stamp_in_nepal_time() {
        assert_eq!(format_updated(at(), 345), "2026-10-14 11:45:00 +05:45");
        assert_eq!(format_updated(at(), 0), "2026-10-14 06:00:00 +00:00");
    }

    #[test]
    fn test_table_layout() {
        let records = vec![
            record(1, "ABC", Cell::Value("100".into()), Cell::Value("150".into()), Derived::Value(100.0 / 3.0)),
            record(2, "XYZ", Cell::Value("50".into()), Cell::Missing, Derived::Unavailable(Unavailable::MissingInput)),
        ];
        let html = render_page(&PageSettings::default(), &schema(), &records, at(), "N/A");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>NEPSE Live Data</title>"));
        assert!(html.contains("<h1>NEPSE Data Table</h1>"));
        assert!(html.contains(
            "<tr><th>SN</th><th>Symbol</th><th>LTP</th><th>52 Week High</th><th>Down From High (%)</th></tr>"
        ));
        assert!(html.contains("<tr><td>1</td><td>ABC</td><td>100</td><td>150</td><td>33.33</td></tr>"));
        assert!(html.contains("<tr><td>2</td><td>XYZ</td><td>50</td><td>N/A</td><td>N/A</td></tr>"));
        assert!(html.contains("Updated on: 2026-10-14 11:45:00 +05:45"));
        assert!(html.contains("function filterTable()"));
        assert!(!html.contains("Developed By"));
    }

    #[test]
    fn test_escapes_cell_text_and_settings() {
        let page = PageSettings {
            heading: "Board <beta>".into(),
            credit_name: Some("R&D".into()),
            credit_url: Some("https://example.com/?a=\"1\"".into()),
            ..PageSettings::default()
        };
        let records = vec![record(
            1,
            "<script>",
            Cell::Value("1 & 2".into()),
            Cell::Value("'x'".into()),
            Derived::Unavailable(Unavailable::Unparseable),
        )];
        let html = render_page(&page, &schema(), &records, at(), "N/A");

        assert!(html.contains("<h1>Board &lt;beta&gt;</h1>"));
        assert!(html.contains("<td>&lt;script&gt;</td><td>1 &amp; 2</td><td>&#39;x&#39;</td>"));
        assert!(html.contains("<a href=\"https://example.com/?a=&quot;1&quot;\">R&amp;D</a>"));
        assert_eq!(html.matches("<script>").count(), 1);
    }

    #[test]
    fn test_custom_sentinel() {
        let records = vec![record(1, "XYZ", Cell::Value("5".into()), Cell::Missing, Derived::Unavailable(Unavailable::MissingInput))];
        let html = render_page(&PageSettings::default(), &schema(), &records, at(), "--");
        assert!(html.contains("<td>5</td><td>--</td><td>--</td>"));
    }

    #[test]
    fn test_empty_table_still_renders() {
        let html = render_page(&PageSettings::default(), &schema(), &[], at(), "N/A");
        assert!(html.contains("<tbody>\n</tbody>"));
    }
}
