use crate::{ColumnSpec, Error, RecordError, Result};
use serde::{Deserialize, Serialize};

/// Structural metadata of a table: its ordered columns and its primary key.
///
/// Built once per (database, table) and shared by every record of that table,
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SerializedSchema")]
pub struct TableSchema {
    name: String,
    columns: Box<[ColumnSpec]>,
    primary_key: usize,
}

impl TableSchema {
    /// Validates the columns: names must be unique and exactly one column must
    /// be the primary key.
    pub fn new(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = ColumnSpec>,
    ) -> Result<Self> {
        let name = name.into();
        let columns: Box<[ColumnSpec]> = columns.into_iter().collect();
        let context = || RecordError::SchemaLoad {
            table: name.clone(),
        };
        if columns.is_empty() {
            return Err(Error::msg("The table has no columns").context(context()));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(
                    Error::msg(format!("Column `{}` appears more than once", column.name))
                        .context(context()),
                );
            }
        }
        let mut keys = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i);
        let primary_key = match (keys.next(), keys.next()) {
            (Some(i), None) => i,
            (None, _) => {
                return Err(Error::msg("The table has no primary key").context(context()));
            }
            (Some(..), Some(..)) => {
                return Err(
                    Error::msg("Composite primary keys are not supported").context(context()),
                );
            }
        };
        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> impl ExactSizeIterator<Item = &str> + Clone {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> &ColumnSpec {
        &self.columns[self.primary_key]
    }

    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    pub fn column(&self, column: &str) -> Option<&ColumnSpec> {
        self.position(column).map(|i| &self.columns[i])
    }

    /// Position of `column`, failing with [`RecordError::UnknownField`].
    pub fn require(&self, column: &str) -> Result<usize> {
        self.position(column).ok_or_else(|| {
            RecordError::UnknownField {
                table: self.name.clone(),
                field: column.to_string(),
            }
            .into()
        })
    }

    /// Every column except the primary key.
    pub fn data_columns(&self) -> impl Iterator<Item = (usize, &ColumnSpec)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.primary_key)
    }

    /// The sole data column of the table, when there is exactly one.
    ///
    /// Fails with [`RecordError::AmbiguousField`] otherwise.
    pub fn natural_column(&self) -> Result<usize> {
        let mut data = self.data_columns().map(|(i, _)| i);
        match (data.next(), data.next()) {
            (Some(i), None) => Ok(i),
            _ => Err(RecordError::AmbiguousField {
                table: self.name.clone(),
                candidates: self.data_columns().map(|(_, c)| c.name.clone()).collect(),
            }
            .into()),
        }
    }
}

/// Deserialization goes through the same validation as [`TableSchema::new`].
#[derive(Deserialize)]
struct SerializedSchema {
    name: String,
    columns: Vec<ColumnSpec>,
    primary_key: usize,
}

impl TryFrom<SerializedSchema> for TableSchema {
    type Error = Error;

    fn try_from(value: SerializedSchema) -> Result<Self> {
        let schema = TableSchema::new(value.name, value.columns)?;
        if schema.primary_key != value.primary_key {
            return Err(Error::msg(format!(
                "Primary key index {} does not match column `{}`",
                value.primary_key,
                schema.primary_key().name
            )));
        }
        Ok(schema)
    }
}
