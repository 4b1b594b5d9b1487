//! Field-level helpers shared by every system transformer: numeric coercion,
//! date normalization, composite keys, dimension and location normalization,
//! status vocabularies, tenant field renames and metadata capture.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{CoreError, CoreResult};

/// Maximum length of a derived location/warehouse code.
pub const LOCATION_CODE_MAX_LEN: usize = 50;

/// Separator between composite key parts.
pub const COMPOSITE_KEY_SEPARATOR: &str = "_";

static US_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("valid regex"));

const NUM: &str = r"(\d+(?:\.\d+)?)";

static DIM_X_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*{NUM}\s*[xX×]\s*{NUM}\s*[xX×]\s*{NUM}\s*$")).expect("valid regex")
});

static DIM_BY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^\s*{NUM}\s+by\s+{NUM}\s+by\s+{NUM}\s*$")).expect("valid regex")
});

static DIM_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^\s*{NUM}\s*,\s*{NUM}\s*,\s*{NUM}\s*[A-Za-z."']*\s*$"#
    ))
    .expect("valid regex")
});

static NON_ALNUM_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Z0-9]+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Normalize an external date to `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Accepts ISO-8601 (with offset, naive date-time, or date only) and
/// `MM/DD/YYYY`. `system` is used in error messages, e.g.
/// `NetSuite date is empty or undefined`.
pub fn parse_system_date(system: &str, value: Option<&Value>) -> CoreResult<String> {
    let raw = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => Some(other.to_string()),
    };

    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => {
            return Err(CoreError::Transform(format!(
                "{system} date is empty or undefined"
            )))
        }
    };

    parse_datetime(&raw)
        .map(format_timestamp)
        .ok_or_else(|| CoreError::Transform(format!("Invalid {system} date format: \"{raw}\"")))
}

/// Like [`parse_system_date`] but an absent value is `Ok(None)`.
pub fn parse_optional_system_date(
    system: &str,
    value: Option<&Value>,
) -> CoreResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => parse_system_date(system, Some(v)).map(Some),
    }
}

/// Millisecond-precision UTC rendering used for every canonical timestamp.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    let caps = US_DATE_RE.captures(raw)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

// ---------------------------------------------------------------------------
// Numbers and strings
// ---------------------------------------------------------------------------

/// Interpret a value as a finite number, if possible.
///
/// Strings are trimmed and may carry thousands separators (`"1,250.50"`).
pub fn optional_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Coerce a quantity or money value; invalid or empty input yields `default`.
pub fn coerce_number(value: Option<&Value>, default: f64) -> f64 {
    optional_number(value).unwrap_or(default)
}

/// Render a scalar as a trimmed, non-empty string.
pub fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Interpret common truthy encodings (`true`, `"T"`, `"yes"`, `1`).
pub fn value_as_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Join key parts with `_`.
///
/// `None` renders as `undefined` and JSON null as `null`, so absent parts
/// still produce a deterministic, distinguishable key.
pub fn build_composite_key(parts: &[Option<&Value>]) -> String {
    parts
        .iter()
        .map(|part| match part {
            None => "undefined".to_string(),
            Some(Value::Null) => "null".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => render_number(n),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(COMPOSITE_KEY_SEPARATOR)
}

fn render_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Derive a location/warehouse code: upper-cased, non-alphanumeric runs
/// collapsed to `_`, truncated to [`LOCATION_CODE_MAX_LEN`] characters.
pub fn derive_location_code(name: &str) -> String {
    let upper = name.to_uppercase();
    NON_ALNUM_RUN_RE
        .replace_all(&upper, "_")
        .chars()
        .take(LOCATION_CODE_MAX_LEN)
        .collect()
}

// ---------------------------------------------------------------------------
// Free-text normalization
// ---------------------------------------------------------------------------

/// Normalize dimension strings to `"L x W x H"`.
///
/// Recognizes `"N x N x N"`, `"N by N by N"` and comma lists with a unit
/// suffix. Anything else is returned unchanged.
pub fn normalize_dimensions(raw: &str) -> String {
    for re in [&*DIM_X_RE, &*DIM_BY_RE, &*DIM_COMMA_RE] {
        if let Some(caps) = re.captures(raw) {
            return format!("{} x {} x {}", &caps[1], &caps[2], &caps[3]);
        }
    }
    raw.to_string()
}

/// Map an external status through a fixed vocabulary.
///
/// Matching is case-insensitive on the trimmed value. Unknown values pass
/// through lower-cased.
pub fn map_status(vocabulary: &[(&str, &str)], raw: &str) -> String {
    let needle = raw.trim().to_lowercase();
    vocabulary
        .iter()
        .find(|(external, _)| external.to_lowercase() == needle)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(needle)
}

// ---------------------------------------------------------------------------
// Tenant customization and metadata
// ---------------------------------------------------------------------------

/// Apply a tenant's external-field → canonical-field rename table.
///
/// Renamed values replace whatever the record had under the canonical name.
/// Non-object values are returned unchanged.
pub fn apply_field_renames(record: &Value, renames: &HashMap<String, String>) -> Value {
    let Value::Object(map) = record else {
        return record.clone();
    };
    if renames.is_empty() {
        return record.clone();
    }

    let mut out = map.clone();
    for (external, canonical) in renames {
        if let Some(value) = out.remove(external) {
            out.insert(canonical.clone(), value);
        }
    }
    Value::Object(out)
}

/// Capture every top-level field not in `known_fields` verbatim.
pub fn capture_metadata(record: &Value, known_fields: &[&str]) -> Map<String, Value> {
    match record {
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| !known_fields.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => Map::new(),
    }
}

/// Validate a canonical record against its declared contract.
///
/// Every violated field is reported in a single error, sorted by field name.
pub fn validate_record<T: Validate>(label: &str, record: &T) -> CoreResult<()> {
    let Err(errors) = record.validate() else {
        return Ok(());
    };

    let mut violations = Vec::new();
    collect_violations("", &errors, &mut violations);
    violations.sort();

    Err(CoreError::Validation(format!(
        "Invalid {label}: {}",
        violations.join("; ")
    )))
}

fn collect_violations(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let codes: Vec<String> = errs.iter().map(|e| e.code.to_string()).collect();
                out.push(format!("{path} ({})", codes.join(", ")));
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect_violations(&format!("{path}[{idx}]"), inner, out);
                }
            }
        }
    }
}

/// Identifier of a reference field that may be a scalar or an object such as
/// `{"internalId": "42", "name": "Main"}`.
pub fn reference_id(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Object(map) => map
            .get("internalId")
            .or_else(|| map.get("id"))
            .filter(|v| !v.is_null()),
        Value::Null => None,
        scalar => Some(scalar),
    }
}

/// Display name of a reference field (`{"name": ...}` or `{"refName": ...}`).
pub fn reference_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(map) => value_as_string(map.get("name").or_else(|| map.get("refName"))),
        scalar => value_as_string(Some(scalar)),
    }
}

/// Prefix a transform failure with the external identifier it concerns.
pub fn with_record_context(context: &str, err: CoreError) -> CoreError {
    match err {
        CoreError::Transform(msg) => CoreError::Transform(format!("{context}: {msg}")),
        CoreError::Validation(msg) => CoreError::Validation(format!("{context}: {msg}")),
        other => other,
    }
}

/// Require a string identifier on an external record.
pub fn require_string(record: &Value, field: &str, context: &str) -> CoreResult<String> {
    value_as_string(record.get(field))
        .ok_or_else(|| CoreError::Transform(format!("{context} is missing '{field}'")))
}
