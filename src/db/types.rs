//! MySQL field type codes and the value coercion table.
//!
//! MySQL's text protocol hands every column value over as bytes. The coercion
//! table decides, by field type code, which of those are converted into typed
//! [`Value`]s. Codes without an entry pass through unchanged.
//!
//! | Codes                                | Conversion            |
//! |--------------------------------------|-----------------------|
//! | 0, 1, 2, 3, 8, 9, 13, 247, 248       | integer               |
//! | 4, 5                                 | float                 |
//! | 7, 12                                | timestamp             |
//! | 10, 14                               | date                  |
//! | 11                                   | time of day           |
//!
//! Integers outside the `i64` range and TIME values outside a single day
//! (MySQL allows `-838:59:59` to `838:59:59`) are kept as text.

use crate::models::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

// =============================================================================
// Field Types
// =============================================================================

/// MySQL wire protocol field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0,
    Tiny = 1,
    Short = 2,
    Long = 3,
    Float = 4,
    Double = 5,
    Null = 6,
    Timestamp = 7,
    LongLong = 8,
    Int24 = 9,
    Date = 10,
    Time = 11,
    DateTime = 12,
    Year = 13,
    NewDate = 14,
    VarChar = 15,
    Bit = 16,
    Json = 245,
    NewDecimal = 246,
    Enum = 247,
    Set = 248,
    TinyBlob = 249,
    MediumBlob = 250,
    LongBlob = 251,
    Blob = 252,
    VarString = 253,
    String = 254,
    Geometry = 255,
}

impl FieldType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Map a MySQL type name, as reported in column metadata, to its field type.
    ///
    /// Modifiers such as `UNSIGNED` are ignored. Unrecognized names map to
    /// [`FieldType::String`], which has no coercion entry.
    pub fn from_type_name(name: &str) -> Self {
        let base = name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match base.as_str() {
            "NULL" => Self::Null,
            "TINYINT" | "BOOLEAN" | "BOOL" => Self::Tiny,
            "SMALLINT" => Self::Short,
            "INT" | "INTEGER" => Self::Long,
            "MEDIUMINT" => Self::Int24,
            "BIGINT" => Self::LongLong,
            "FLOAT" => Self::Float,
            "DOUBLE" | "REAL" => Self::Double,
            // Servers since 5.0 send NEWDECIMAL for every DECIMAL column
            "DECIMAL" | "NUMERIC" => Self::NewDecimal,
            "TIMESTAMP" => Self::Timestamp,
            "DATETIME" => Self::DateTime,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "YEAR" => Self::Year,
            "BIT" => Self::Bit,
            "JSON" => Self::Json,
            // ENUM and SET values travel as strings; only the name differs
            "ENUM" | "SET" => Self::String,
            "VARCHAR" | "VARBINARY" => Self::VarString,
            "TINYBLOB" | "TINYTEXT" => Self::TinyBlob,
            "MEDIUMBLOB" | "MEDIUMTEXT" => Self::MediumBlob,
            "LONGBLOB" | "LONGTEXT" => Self::LongBlob,
            "BLOB" | "TEXT" => Self::Blob,
            "GEOMETRY" => Self::Geometry,
            _ => Self::String,
        }
    }
}

// =============================================================================
// Coercion Table
// =============================================================================

/// A conversion applied to a raw textual column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Integer,
    Float,
    Timestamp,
    Date,
    Time,
}

/// Look up the conversion registered for a field type code.
pub fn conversion_for(type_code: u8) -> Option<Conversion> {
    match type_code {
        0 | 1 | 2 | 3 | 8 | 9 | 13 | 247 | 248 => Some(Conversion::Integer),
        4 | 5 => Some(Conversion::Float),
        7 | 12 => Some(Conversion::Timestamp),
        10 | 14 => Some(Conversion::Date),
        11 => Some(Conversion::Time),
        _ => None,
    }
}

/// Coerce a raw column value according to its field type code.
///
/// SQL NULL yields [`Value::Null`] for every code. Codes without a registered
/// conversion yield the raw value unchanged. A value that a registered
/// conversion cannot parse is an error, described by the returned message.
pub fn coerce(raw: Option<&[u8]>, type_code: u8) -> Result<Value, String> {
    let Some(bytes) = raw else {
        return Ok(Value::Null);
    };
    let Some(conversion) = conversion_for(type_code) else {
        return Ok(Value::from_raw(bytes));
    };

    let text = std::str::from_utf8(bytes).map_err(|_| "value is not valid UTF-8".to_string())?;
    let text = text.trim();

    match conversion {
        Conversion::Integer => parse_integer(text),
        Conversion::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("invalid float: {e}")),
        Conversion::Timestamp => parse_timestamp(text).map(Value::Timestamp),
        Conversion::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| format!("invalid date: {e}")),
        Conversion::Time => parse_time(text),
    }
}

/// Parse an integer, truncating any fractional part (legacy DECIMAL columns).
///
/// Whole numbers that do not fit an `i64`, such as large `BIGINT UNSIGNED`
/// values, are returned as text.
fn parse_integer(text: &str) -> Result<Value, String> {
    let whole = match text.split_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b.is_ascii_digit()) => match whole {
            "" | "+" => "0",
            "-" => "-0",
            w => w,
        },
        _ => text,
    };

    let digits = whole.strip_prefix(['-', '+']).unwrap_or(whole);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid integer: '{text}'"));
    }

    Ok(whole
        .parse::<i64>()
        .map_or_else(|_| Value::Text(whole.to_string()), Value::Integer))
}

/// Parse a TIME value. Values outside `00:00:00`..`23:59:59` are intervals
/// and are returned as text.
fn parse_time(text: &str) -> Result<Value, String> {
    if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
        return Ok(Value::Time(time));
    }
    if is_interval(text) {
        return Ok(Value::Text(text.to_string()));
    }
    Err(format!("invalid time: '{text}'"))
}

/// `[-]H..HHH:MM:SS[.fraction]` with at most 838 hours.
fn is_interval(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let (clock, fraction) = body.split_once('.').unwrap_or((body, ""));
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let parts: Vec<&str> = clock.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return false;
    };
    let within = |field: &str, max: u32| {
        !field.is_empty()
            && field.bytes().all(|b| b.is_ascii_digit())
            && field.parse::<u32>().is_ok_and(|v| v <= max)
    };
    within(hours, 838)
        && minutes.len() == 2
        && within(minutes, 59)
        && seconds.len() == 2
        && within(seconds, 59)
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid timestamp: {e}"))
}
