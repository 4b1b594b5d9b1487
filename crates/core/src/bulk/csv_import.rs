//! CSV upload validation and parsing for bulk operations.

use serde_json::Value;

use crate::entity::EntityKind;
use crate::error::{CoreError, CoreResult};
use crate::transform::build_composite_key;

/// Default ceiling on data rows per upload.
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Default ceiling on upload size (10 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

const CSV_CONTENT_TYPES: &[&str] = &["text/csv", "application/csv", "application/vnd.ms-excel"];

/// A file as received from the caller.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportLimits {
    pub max_rows: usize,
    pub max_file_bytes: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// One data row. `index` is 1-based over data rows (header excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub index: usize,
    /// Canonical store key: the `id` column for composite kinds when given,
    /// else the identity columns joined as a composite key. `None` when any
    /// part is blank.
    pub key: Option<String>,
    /// `(column, trimmed value)` in header order.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl ParsedCsv {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

fn looks_like_csv(upload: &CsvUpload) -> bool {
    let by_name = upload.file_name.to_lowercase().ends_with(".csv");
    let by_type = upload.content_type.as_deref().is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim().to_lowercase();
        CSV_CONTENT_TYPES.contains(&essence.as_str())
    });
    by_name || by_type
}

/// Header positions that make up a row's key.
enum KeyColumns {
    Id(usize),
    Parts(Vec<usize>),
}

impl KeyColumns {
    fn locate(kind: EntityKind, headers: &[String]) -> CoreResult<Self> {
        let position = |field: &str| headers.iter().position(|h| h == field);
        if kind.has_composite_id() {
            if let Some(col) = position(kind.canonical_key_field()) {
                return Ok(Self::Id(col));
            }
        }
        let fields = kind.identity_fields();
        let parts: Option<Vec<usize>> = fields.iter().map(|f| position(f)).collect();
        match parts {
            Some(parts) => Ok(Self::Parts(parts)),
            None if fields.len() == 1 => Err(CoreError::Validation(format!(
                "CSV header must include a '{}' column",
                fields[0]
            ))),
            None => Err(CoreError::Validation(format!(
                "CSV header must include an 'id' column or the '{}' columns",
                fields.join("', '")
            ))),
        }
    }

    fn key(&self, record: &csv::StringRecord) -> Option<String> {
        let cell = |col: usize| record.get(col).filter(|v| !v.is_empty());
        match self {
            Self::Id(col) => cell(*col).map(str::to_string),
            Self::Parts(cols) => {
                let parts: Option<Vec<Value>> = cols
                    .iter()
                    .map(|col| cell(*col).map(|v| Value::String(v.to_string())))
                    .collect();
                let parts = parts?;
                let refs: Vec<Option<&Value>> = parts.iter().map(Some).collect();
                Some(build_composite_key(&refs))
            }
        }
    }
}

/// Validate an upload and parse it into rows for `kind`.
///
/// Rejects empty or oversized files, non-CSV names/types, invalid UTF-8,
/// a header without the entity's identity columns, zero data rows and
/// more than `limits.max_rows` rows.
pub fn parse_upload(upload: &CsvUpload, kind: EntityKind, limits: &ImportLimits) -> CoreResult<ParsedCsv> {
    if upload.bytes.is_empty() {
        return Err(CoreError::Validation("Uploaded file is empty".to_string()));
    }
    if upload.bytes.len() > limits.max_file_bytes {
        return Err(CoreError::Validation(format!(
            "Uploaded file exceeds {} bytes",
            limits.max_file_bytes
        )));
    }
    if !looks_like_csv(upload) {
        return Err(CoreError::Validation(format!(
            "File '{}' is not a CSV file",
            upload.file_name
        )));
    }

    let data = strip_utf8_bom(&upload.bytes);
    let text = std::str::from_utf8(data)
        .map_err(|_| CoreError::Validation("File is not valid UTF-8".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::Validation(format!("Failed to read CSV header: {e}")))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let key_columns = KeyColumns::locate(kind, &headers)?;

    let mut rows = Vec::new();
    for (offset, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            CoreError::Validation(format!("Malformed CSV at row {}: {e}", offset + 1))
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if rows.len() == limits.max_rows {
            return Err(CoreError::Validation(format!(
                "CSV exceeds the maximum of {} rows",
                limits.max_rows
            )));
        }

        let values: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        let key = key_columns.key(&record);

        rows.push(CsvRow {
            index: rows.len() + 1,
            key,
            values,
        });
    }

    if rows.is_empty() {
        return Err(CoreError::Validation("CSV has no data rows".to_string()));
    }

    Ok(ParsedCsv { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn upload(name: &str, body: &[u8]) -> CsvUpload {
        CsvUpload {
            file_name: name.to_string(),
            content_type: None,
            bytes: body.to_vec(),
        }
    }

    #[test]
    fn parses_quoted_fields_and_strips_bom() {
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(b"SKU,name,price\nA-1,\"Bolt, hex\",1.5\nA-2,\"Say \"\"hi\"\"\",2\n");
        let parsed = parse_upload(&upload("items.csv", &body), EntityKind::Products, &ImportLimits::default()).unwrap();

        assert_eq!(parsed.headers, vec!["sku", "name", "price"]);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.rows[0].key.as_deref(), Some("A-1"));
        assert_eq!(parsed.rows[0].values[1], ("name".to_string(), "Bolt, hex".to_string()));
        assert_eq!(parsed.rows[1].values[1].1, "Say \"hi\"");
        assert_eq!(parsed.rows[1].index, 2);
    }

    #[test]
    fn rejects_non_csv_and_empty_files() {
        let limits = ImportLimits::default();
        assert_matches!(
            parse_upload(&upload("items.xlsx", b"sku\nA"), EntityKind::Products, &limits),
            Err(CoreError::Validation(m)) if m.contains("not a CSV")
        );
        assert_matches!(
            parse_upload(&upload("items.csv", b""), EntityKind::Products, &limits),
            Err(CoreError::Validation(m)) if m.contains("empty")
        );
        assert_matches!(
            parse_upload(&upload("items.csv", b"sku,name\n"), EntityKind::Products, &limits),
            Err(CoreError::Validation(m)) if m.contains("no data rows")
        );
    }

    #[test]
    fn content_type_admits_unnamed_upload() {
        let mut up = upload("blob", b"email\na@example.com\n");
        up.content_type = Some("text/csv; charset=utf-8".to_string());
        assert!(parse_upload(&up, EntityKind::Customers, &ImportLimits::default()).is_ok());
    }

    #[test]
    fn requires_primary_key_column() {
        let err = parse_upload(
            &upload("c.csv", b"name\nAnn\n"),
            EntityKind::Customers,
            &ImportLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'email' column"));
    }

    #[test]
    fn inventory_rows_keyed_by_sku_and_warehouse() {
        let parsed = parse_upload(
            &upload("inv.csv", b"sku,warehouse_code,quantity_on_hand
A-1,EAST,4
A-1,WEST,9
A-2,,1
"),
            EntityKind::Inventory,
            &ImportLimits::default(),
        )
        .unwrap();
        let keys: Vec<Option<&str>> = parsed.rows.iter().map(|r| r.key.as_deref()).collect();
        assert_eq!(keys, vec![Some("A-1_EAST"), Some("A-1_WEST"), None]);
    }

    #[test]
    fn composite_id_column_wins_over_parts() {
        let parsed = parse_upload(
            &upload("price.csv", b"id,sku,price
881_Base Price,A-1,4.5
"),
            EntityKind::Pricing,
            &ImportLimits::default(),
        )
        .unwrap();
        assert_eq!(parsed.rows[0].key.as_deref(), Some("881_Base Price"));

        let err = parse_upload(
            &upload("price.csv", b"sku,price
A-1,4.5
"),
            EntityKind::Pricing,
            &ImportLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'sku', 'price_tier'"), "{err}");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = parse_upload(
            &upload("c.csv", &[b's', b'k', b'u', b'\n', 0xFF, 0xFE]),
            EntityKind::Products,
            &ImportLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn enforces_row_and_size_limits() {
        let limits = ImportLimits {
            max_rows: 2,
            max_file_bytes: 1024,
        };
        let err = parse_upload(&upload("p.csv", b"sku\nA\nB\nC\n"), EntityKind::Products, &limits).unwrap_err();
        assert!(err.to_string().contains("maximum of 2 rows"));

        let big = vec![b'a'; 2048];
        assert!(parse_upload(&upload("p.csv", &big), EntityKind::Products, &limits).is_err());
    }

    #[test]
    fn blank_key_keeps_row_for_per_record_failure() {
        let parsed = parse_upload(
            &upload("p.csv", b"sku,name\n,Nameless\nB,Named\n"),
            EntityKind::Products,
            &ImportLimits::default(),
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.rows[0].key.is_none());
    }
}
