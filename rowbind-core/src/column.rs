use crate::{AsValue, RecordError, Result, Value, consume_while};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Write};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Logical type of a column, derived from the type declared in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Decimal,
    /// Character data with an optional maximum length.
    Varchar(Option<u32>),
    Text,
    Blob,
    /// String restricted to a fixed set of choices.
    Enum(Vec<String>),
    Date,
    Time,
    Timestamp,
    Uuid,
    /// Anything else, values are kept exactly as the driver returns them.
    Other(String),
}

impl ColumnType {
    /// Interpret a declared SQL type (`INTEGER`, `VARCHAR(32)`, `ENUM('a','b')`, ...).
    ///
    /// Unknown names follow the SQLite affinity rules before falling back to `Other`.
    pub fn from_sql_type(declared: &str) -> Self {
        let declared = declared.trim();
        let upper = declared.to_ascii_uppercase();
        let mut input = upper.as_str();
        let name = consume_while(&mut input, |c| {
            c.is_ascii_alphanumeric() || *c == '_' || *c == ' '
        })
        .trim()
        .to_string();
        let arguments = input.trim().strip_prefix('(').and_then(|v| v.strip_suffix(')'));
        match name.as_str() {
            "BOOL" | "BOOLEAN" => ColumnType::Boolean,
            "INT" | "INTEGER" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "INT2" | "INT4"
            | "INT8" | "SERIAL" | "BIGSERIAL" | "UNSIGNED BIG INT" => ColumnType::Integer,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => {
                ColumnType::Float
            }
            "DECIMAL" | "NUMERIC" => ColumnType::Decimal,
            "CHAR" | "VARCHAR" | "CHARACTER" | "VARYING CHARACTER" | "CHARACTER VARYING"
            | "NCHAR" | "NVARCHAR" | "NATIVE CHARACTER" => {
                ColumnType::Varchar(arguments.and_then(|v| v.trim().parse().ok()))
            }
            "TEXT" | "CLOB" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => ColumnType::Text,
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "TIME" => ColumnType::Time,
            "DATETIME" | "TIMESTAMP" => ColumnType::Timestamp,
            "UUID" => ColumnType::Uuid,
            "ENUM" => {
                // Choices keep their original case, parse them from the declared text
                let original = &declared[declared.find('(').unwrap_or(declared.len())..];
                ColumnType::Enum(parse_string_list(original).unwrap_or_default())
            }
            _ if name.contains("INT") => ColumnType::Integer,
            _ if name.contains("CHAR") || name.contains("CLOB") || name.contains("TEXT") => {
                ColumnType::Text
            }
            _ if name.is_empty() || name.contains("BLOB") => ColumnType::Blob,
            _ if name.contains("REAL") || name.contains("FLOA") || name.contains("DOUB") => {
                ColumnType::Float
            }
            _ => ColumnType::Other(declared.to_string()),
        }
    }

    /// Convert `value` into the canonical variant of this type.
    ///
    /// `NULL` is always accepted here, nullability is enforced by the storage.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        Ok(match self {
            ColumnType::Boolean => bool::try_from_value(value)?.as_value(),
            ColumnType::Integer => match value {
                Value::Float64(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                    Value::Int64(v as i64)
                }
                v => i64::try_from_value(v)?.as_value(),
            },
            ColumnType::Float => f64::try_from_value(value)?.as_value(),
            ColumnType::Decimal => Decimal::try_from_value(value)?.as_value(),
            ColumnType::Varchar(..) | ColumnType::Text => String::try_from_value(value)?.as_value(),
            ColumnType::Blob => Box::<[u8]>::try_from_value(value)?.as_value(),
            ColumnType::Enum(choices) => {
                let v = String::try_from_value(value)?;
                if !choices.is_empty() && !choices.contains(&v) {
                    return Err(crate::Error::msg(format!(
                        "`{}` is not one of {}",
                        v,
                        choices.join(", ")
                    )));
                }
                Value::Varchar(v)
            }
            ColumnType::Date => Date::try_from_value(value)?.as_value(),
            ColumnType::Time => Time::try_from_value(value)?.as_value(),
            ColumnType::Timestamp => PrimitiveDateTime::try_from_value(value)?.as_value(),
            ColumnType::Uuid => Uuid::try_from_value(value)?.as_value(),
            ColumnType::Other(..) => value,
        })
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => f.write_str("BOOLEAN"),
            ColumnType::Integer => f.write_str("INTEGER"),
            ColumnType::Float => f.write_str("DOUBLE"),
            ColumnType::Decimal => f.write_str("DECIMAL"),
            ColumnType::Varchar(Some(len)) => write!(f, "VARCHAR({len})"),
            ColumnType::Varchar(None) => f.write_str("VARCHAR"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::Blob => f.write_str("BLOB"),
            ColumnType::Enum(choices) => {
                f.write_str("ENUM(")?;
                for (i, choice) in choices.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "'{}'", choice.replace('\'', "''"))?;
                }
                f.write_char(')')
            }
            ColumnType::Date => f.write_str("DATE"),
            ColumnType::Time => f.write_str("TIME"),
            ColumnType::Timestamp => f.write_str("TIMESTAMP"),
            ColumnType::Uuid => f.write_str("UUID"),
            ColumnType::Other(declared) => f.write_str(declared),
        }
    }
}

/// Parse `('a', 'b''c', ...)` into its strings.
pub fn parse_string_list(input: &str) -> Option<Vec<String>> {
    let mut input = input.trim().strip_prefix('(')?.trim_start();
    let mut result = Vec::new();
    loop {
        let (value, rest) = parse_string_literal(input)?;
        result.push(value);
        input = rest.trim_start();
        if let Some(rest) = input.strip_prefix(',') {
            input = rest.trim_start();
        } else {
            return input.strip_prefix(')').map(|_| result);
        }
    }
}

/// Parse a single quoted SQL string literal at the start of `input`, returns the
/// unescaped content and the remaining input.
pub fn parse_string_literal(input: &str) -> Option<(String, &str)> {
    let mut rest = input.strip_prefix('\'')?;
    let mut value = String::new();
    loop {
        value.push_str(consume_while(&mut rest, |c| *c != '\''));
        rest = rest.strip_prefix('\'')?;
        if let Some(escaped) = rest.strip_prefix('\'') {
            value.push('\'');
            rest = escaped;
        } else {
            return Some((value, rest));
        }
    }
}

/// Column default as reported by the database metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Constant value, known without asking the database.
    Value(Value),
    /// Expression evaluated by the database (`CURRENT_TIMESTAMP`, `(random())`, ...).
    Expression(String),
}

impl DefaultValue {
    /// Interpret the SQL text of a column default.
    pub fn from_sql(sql: &str, column_type: &ColumnType) -> Self {
        let sql = sql.trim();
        let literal = if let Some((value, rest)) = parse_string_literal(sql) {
            rest.trim().is_empty().then_some(Value::Varchar(value))
        } else if sql.eq_ignore_ascii_case("NULL") {
            Some(Value::Null)
        } else if sql.eq_ignore_ascii_case("TRUE") {
            Some(Value::Boolean(true))
        } else if sql.eq_ignore_ascii_case("FALSE") {
            Some(Value::Boolean(false))
        } else if let Ok(v) = sql.parse::<i64>() {
            Some(Value::Int64(v))
        } else if let Ok(v) = sql.parse::<f64>() {
            Some(Value::Float64(v))
        } else {
            None
        };
        match literal.map(|v| column_type.coerce(v)) {
            Some(Ok(v)) => DefaultValue::Value(v),
            _ => DefaultValue::Expression(sql.to_string()),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            DefaultValue::Value(v) => Some(v),
            DefaultValue::Expression(..) => None,
        }
    }
}

/// Metadata of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<DefaultValue>,
    /// The database generates the value on insert when none is given.
    pub auto_increment: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default: None,
            auto_increment: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Coerce a value for this column, failing with [`RecordError::InvalidValue`].
    pub fn coerce(&self, table: &str, value: Value) -> Result<Value> {
        let shown = value.to_string();
        self.column_type.coerce(value).map_err(|e| {
            e.context(RecordError::InvalidValue {
                table: table.to_string(),
                column: self.name.clone(),
                column_type: self.column_type.to_string(),
                value: shown,
            })
        })
    }
}
