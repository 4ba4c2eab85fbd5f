//! Cell value representation for normalized workbook data

use calamine::Data;
use chrono::{DateTime, Utc};

/// A single cell value in the normalized dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Convert a workbook cell into a dataset value
    pub fn from_cell(cell: &Data) -> Self {
        match cell {
            Data::Empty => Value::Null,
            Data::String(s) if s.trim().is_empty() => Value::Null,
            Data::String(s) => Value::String(s.clone()),
            Data::Int(i) => Value::Int(*i),
            Data::Float(f) => {
                // Spreadsheets store plain integers as whole floats
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Value::Int(*f as i64)
                } else {
                    Value::Float(*f)
                }
            }
            Data::Bool(b) => Value::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => Value::DateTime(DateTime::from_naive_utc_and_offset(naive, Utc)),
                None => Value::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) => Value::String(s.clone()),
            Data::DurationIso(s) => Value::String(s.clone()),
            Data::Error(_) => Value::Null,
        }
    }

    /// Render for a text-typed staging column; `None` maps to SQL NULL
    pub fn as_sql_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::DateTime(dt) => Some(dt.to_rfc3339()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "(null)"),
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}
