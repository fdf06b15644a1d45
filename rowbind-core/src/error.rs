use thiserror::Error as ThisError;

/// Failures raised by the record layer.
///
/// They travel inside [`crate::Error`], either as the error itself or as the
/// context of a storage error. Match them with
/// `error.downcast_ref::<RecordError>()`.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RecordError {
    #[error("Cannot load the schema of table `{table}`")]
    SchemaLoad { table: String },

    #[error("Table `{table}` has no column named `{field}`")]
    UnknownField { table: String, field: String },

    #[error(
        "Table `{table}` has {} data columns ({}), specify which one to use",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousField {
        table: String,
        candidates: Vec<String>,
    },

    #[error("Value `{value}` is not valid for column `{table}`.`{column}` of type {column_type}")]
    InvalidValue {
        table: String,
        column: String,
        column_type: String,
        value: String,
    },

    #[error("Query on table `{table}` failed")]
    QueryExecution { table: String },

    #[error("Commit of a record of table `{table}` failed")]
    Commit { table: String },

    #[error("The record of table `{table}` was deleted")]
    Deleted { table: String },

    #[error("Table `{table}` is bound to database `{bound}` but the executor targets `{actual}`")]
    DatabaseMismatch {
        table: String,
        bound: String,
        actual: String,
    },
}
