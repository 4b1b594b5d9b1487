//! CSV rendering for bulk operation reports and exports.
//!
//! Output follows RFC 4180 quoting. Cells that a spreadsheet would evaluate
//! as a formula (leading `=`, `+`, `-` or `@`) are prefixed with `'` and
//! always quoted.

use serde_json::Value;

use crate::types::DbId;

pub const REPORT_HEADER: [&str; 5] = ["record_index", "action", "status", "error", "processed_at"];

const FORMULA_TRIGGERS: [char; 4] = ['=', '+', '-', '@'];

/// One line of a bulk operation report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub record_index: i32,
    pub action: String,
    pub status: String,
    pub error: Option<String>,
    pub processed_at: String,
}

/// Escape a single cell.
pub fn escape_csv_field(value: &str) -> String {
    if value.starts_with(FORMULA_TRIGGERS) {
        return format!("\"'{}\"", value.replace('"', "\"\""));
    }
    if value.contains([',', '"', '\n', '\r']) {
        return format!("\"{}\"", value.replace('"', "\"\""));
    }
    value.to_string()
}

/// Render a header and rows as CSV text with CRLF line endings.
pub fn render_csv<S: AsRef<str>>(header: &[S], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    push_line(&mut out, header.iter().map(AsRef::as_ref));
    for row in rows {
        push_line(&mut out, row.iter().map(String::as_str));
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells.map(escape_csv_field).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Render the per-record report of a bulk operation.
pub fn render_report(rows: &[ReportRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.record_index.to_string(),
                r.action.clone(),
                r.status.clone(),
                r.error.clone().unwrap_or_default(),
                r.processed_at.clone(),
            ]
        })
        .collect();
    render_csv(&REPORT_HEADER, &body)
}

/// Render exported canonical records. Columns are the union of top-level
/// keys, key column first, the rest in first-seen order.
pub fn render_export(key_field: &str, records: &[Value]) -> String {
    let mut header = vec![key_field.to_string()];
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if !header.contains(key) {
                    header.push(key.clone());
                }
            }
        }
    }

    let body: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            header
                .iter()
                .map(|column| match record.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();
    render_csv(&header, &body)
}

pub fn report_file_name(operation_id: DbId) -> String {
    format!("{operation_id}-report.csv")
}

pub fn export_file_name(operation_id: DbId) -> String {
    format!("{operation_id}-export.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_values_unquoted() {
        assert_eq!(escape_csv_field("hello"), "hello");
        assert_eq!(escape_csv_field(""), "");
    }

    #[test]
    fn rfc4180_quoting() {
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn formula_injection_neutralized() {
        let escaped = escape_csv_field("=cmd|' /C calc'!A0");
        assert!(escaped.starts_with("\"'="), "{escaped}");
        assert_eq!(escaped, "\"'=cmd|' /C calc'!A0\"");
        assert_eq!(escape_csv_field("+1"), "\"'+1\"");
        assert_eq!(escape_csv_field("-2"), "\"'-2\"");
        assert_eq!(escape_csv_field("@SUM(A1)"), "\"'@SUM(A1)\"");
    }

    #[test]
    fn report_has_fixed_header_and_one_line_per_row() {
        let csv = render_report(&[
            ReportRow {
                record_index: 1,
                action: "create".into(),
                status: "success".into(),
                error: None,
                processed_at: "2024-01-01T00:00:00.000Z".into(),
            },
            ReportRow {
                record_index: 2,
                action: "update".into(),
                status: "failed".into(),
                error: Some("Row 2: column 'price' is not a number: \"x\"".into()),
                processed_at: "2024-01-01T00:00:01.000Z".into(),
            },
        ]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "record_index,action,status,error,processed_at");
        assert_eq!(lines[1], "1,create,success,,2024-01-01T00:00:00.000Z");
        assert!(lines[2].starts_with("2,update,failed,\"Row 2"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn export_uses_union_of_columns() {
        let csv = render_export(
            "sku",
            &[json!({"sku": "A", "price": 1.5}), json!({"name": "B", "sku": "B"})],
        );
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "sku,price,name");
        assert_eq!(lines[1], "A,1.5,");
        assert_eq!(lines[2], "B,,B");
    }

    #[test]
    fn report_file_name_uses_operation_id() {
        assert_eq!(report_file_name(42), "42-report.csv");
    }
}
