use crate::{Error, Result, truncate_long};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use time::{
    Date, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};
use uuid::Uuid;

/// Dynamically typed cell of a row.
///
/// Records hold one `Value` per column, the column's [`ColumnType`](crate::ColumnType)
/// decides which variant is canonical for it. Drivers are free to return the
/// narrowest representation they have (SQLite for example returns dates as
/// `Varchar`), the record layer coerces it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Decimal(Decimal),
    Varchar(String),
    Blob(Box<[u8]>),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(..) => "BOOLEAN",
            Value::Int64(..) => "INTEGER",
            Value::Float64(..) => "FLOAT",
            Value::Decimal(..) => "DECIMAL",
            Value::Varchar(..) => "VARCHAR",
            Value::Blob(..) => "BLOB",
            Value::Date(..) => "DATE",
            Value::Time(..) => "TIME",
            Value::Timestamp(..) => "TIMESTAMP",
            Value::Uuid(..) => "UUID",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Boolean(v) => Some(*v as i64),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Varchar(v) => write!(f, "{}", truncate_long!(v)),
            Value::Blob(v) => write!(f, "x'{}'", hex::encode(v)),
            Value::Date(v) => f.write_str(&format_date(v)),
            Value::Time(v) => f.write_str(&format_time(v)),
            Value::Timestamp(v) => f.write_str(&format_timestamp(v)),
            Value::Uuid(v) => write!(f, "{v}"),
        }
    }
}

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const TIME_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const TIMESTAMP_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const TIMESTAMP_T: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const TIMESTAMP_T_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

/// `YYYY-MM-DD`
pub fn format_date(value: &Date) -> String {
    value.format(DATE).unwrap_or_else(|_| value.to_string())
}

/// `HH:MM:SS` with the fractional part only when it is not zero.
pub fn format_time(value: &Time) -> String {
    let format = if value.nanosecond() == 0 {
        TIME
    } else {
        TIME_FRACTION
    };
    value.format(format).unwrap_or_else(|_| value.to_string())
}

/// `YYYY-MM-DD HH:MM:SS` with the fractional part only when it is not zero.
pub fn format_timestamp(value: &PrimitiveDateTime) -> String {
    let format = if value.nanosecond() == 0 {
        TIMESTAMP
    } else {
        TIMESTAMP_FRACTION
    };
    value.format(format).unwrap_or_else(|_| value.to_string())
}

pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), DATE)
        .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as a date", value)))
}

pub fn parse_time(value: &str) -> Result<Time> {
    let value = value.trim();
    [TIME_FRACTION, TIME]
        .into_iter()
        .find_map(|format| Time::parse(value, format).ok())
        .ok_or_else(|| Error::msg(format!("Cannot parse `{}` as a time", value)))
}

pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime> {
    let value = value.trim();
    [
        TIMESTAMP_FRACTION,
        TIMESTAMP,
        TIMESTAMP_T_FRACTION,
        TIMESTAMP_T,
    ]
    .into_iter()
    .find_map(|format| PrimitiveDateTime::parse(value, format).ok())
    .or_else(|| {
        // A bare date is midnight of that day
        Date::parse(value, DATE).ok().map(|v| v.midnight())
    })
    .ok_or_else(|| Error::msg(format!("Cannot parse `{}` as a timestamp", value)))
}
