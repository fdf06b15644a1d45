use crate::{
    ColumnSpec, CompiledQuery, Condition, Filter, Materialize, Order, Result, TableSchema, Value,
    format_date, format_time, format_timestamp, separated_by,
};
use std::fmt::Write;
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Dialect printer, it is the filter compiler: turns a [`Filter`] into the SQL
/// text of a query against one table, and writes the statements used by
/// records to persist themselves.
///
/// Values are rendered as escaped literals.
pub trait SqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_table_ref(&self, out: &mut String, schema: &TableSchema) {
        self.write_identifier_quoted(out, schema.name());
    }

    fn write_column_ref(&self, out: &mut String, column: &ColumnSpec) {
        self.write_identifier_quoted(out, &column.name);
    }

    /// Render a concrete value (including proper quoting / escaping).
    fn write_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => self.write_value_none(out),
            Value::Boolean(v) => self.write_value_bool(out, *v),
            Value::Int64(v) => write_integer!(out, *v),
            Value::Float64(v) => self.write_value_float(out, *v),
            Value::Decimal(v) => drop(write!(out, "{}", v)),
            Value::Varchar(v) => self.write_value_string(out, v),
            Value::Blob(v) => self.write_value_blob(out, v),
            Value::Date(v) => self.write_value_date(out, v),
            Value::Time(v) => self.write_value_time(out, v),
            Value::Timestamp(v) => self.write_value_timestamp(out, v),
            Value::Uuid(v) => self.write_value_uuid(out, v),
        }
    }

    /// Render NULL literal.
    fn write_value_none(&self, out: &mut String) {
        out.push_str("NULL");
    }

    /// Render boolean literal.
    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push_str(["FALSE", "TRUE"][value as usize]);
    }

    fn write_value_float(&self, out: &mut String, value: f64) {
        if value.is_infinite() {
            self.write_value_infinity(out, value.is_sign_negative());
        } else if value.is_nan() {
            self.write_value_nan(out);
        } else {
            let mut buffer = ryu::Buffer::new();
            out.push_str(buffer.format(value));
        }
    }

    /// Render +/- INF via CAST for dialect portability.
    fn write_value_infinity(&self, out: &mut String, negative: bool) {
        out.push_str(if negative {
            "CAST('-Infinity' AS DOUBLE PRECISION)"
        } else {
            "CAST('Infinity' AS DOUBLE PRECISION)"
        });
    }

    /// Render NaN via CAST for dialect portability.
    fn write_value_nan(&self, out: &mut String) {
        out.push_str("CAST('NaN' AS DOUBLE PRECISION)");
    }

    /// Render and escape a string literal using single quotes.
    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(out, value, '\'', "''");
        out.push('\'');
    }

    /// Render a blob literal using hex digits.
    fn write_value_blob(&self, out: &mut String, value: &[u8]) {
        out.push_str("X'");
        out.push_str(&hex::encode_upper(value));
        out.push('\'');
    }

    fn write_value_date(&self, out: &mut String, value: &Date) {
        let _ = write!(out, "DATE '{}'", format_date(value));
    }

    fn write_value_time(&self, out: &mut String, value: &Time) {
        let _ = write!(out, "TIME '{}'", format_time(value));
    }

    fn write_value_timestamp(&self, out: &mut String, value: &PrimitiveDateTime) {
        let _ = write!(out, "TIMESTAMP '{}'", format_timestamp(value));
    }

    fn write_value_uuid(&self, out: &mut String, value: &Uuid) {
        let _ = write!(out, "'{}'", value);
    }

    /// Render the predicate of one column.
    fn write_condition(&self, out: &mut String, column: &ColumnSpec, condition: &Condition) {
        let operator = |out: &mut String, operator: &str, value: &Value| {
            self.write_column_ref(out, column);
            out.push(' ');
            out.push_str(operator);
            out.push(' ');
            self.write_value(out, value);
        };
        match condition {
            Condition::Eq(Value::Null) | Condition::IsNull => {
                self.write_column_ref(out, column);
                out.push_str(" IS NULL");
            }
            Condition::Ne(Value::Null) | Condition::IsNotNull => {
                self.write_column_ref(out, column);
                out.push_str(" IS NOT NULL");
            }
            Condition::Eq(v) => operator(out, "=", v),
            Condition::Ne(v) => operator(out, "<>", v),
            Condition::Lt(v) => operator(out, "<", v),
            Condition::Le(v) => operator(out, "<=", v),
            Condition::Gt(v) => operator(out, ">", v),
            Condition::Ge(v) => operator(out, ">=", v),
            Condition::Like(v) => {
                self.write_column_ref(out, column);
                out.push_str(" LIKE ");
                self.write_value_string(out, v);
            }
            Condition::In(values) if values.is_empty() => out.push_str("1 = 0"),
            Condition::In(values) => {
                self.write_column_ref(out, column);
                out.push_str(" IN (");
                separated_by(out, values, |out, v| self.write_value(out, v), ", ");
                out.push(')');
            }
        }
    }

    /// Emit the WHERE clause of `filter`, nothing when the filter is empty.
    ///
    /// Columns must belong to `schema`, values are coerced to the column type when possible.
    fn write_where(&self, out: &mut String, schema: &TableSchema, filter: &Filter) -> Result<()> {
        if filter.conditions.is_empty() {
            return Ok(());
        }
        let conditions = filter
            .conditions
            .iter()
            .map(|(name, condition)| {
                let column = &schema.columns()[schema.require(name)?];
                let coerce = |v: &Value| {
                    column
                        .column_type
                        .coerce(v.clone())
                        .unwrap_or_else(|_| v.clone())
                };
                let condition = match condition {
                    Condition::Eq(v) => Condition::Eq(coerce(v)),
                    Condition::Ne(v) => Condition::Ne(coerce(v)),
                    Condition::Lt(v) => Condition::Lt(coerce(v)),
                    Condition::Le(v) => Condition::Le(coerce(v)),
                    Condition::Gt(v) => Condition::Gt(coerce(v)),
                    Condition::Ge(v) => Condition::Ge(coerce(v)),
                    Condition::In(values) => Condition::In(values.iter().map(coerce).collect()),
                    c => c.clone(),
                };
                Ok((column, condition))
            })
            .collect::<Result<Vec<_>>>()?;
        out.push_str("\nWHERE ");
        separated_by(
            out,
            conditions,
            |out, (column, condition)| self.write_condition(out, column, &condition),
            " AND ",
        );
        Ok(())
    }

    fn write_order_by(
        &self,
        out: &mut String,
        schema: &TableSchema,
        filter: &Filter,
    ) -> Result<()> {
        if filter.order.is_empty() {
            return Ok(());
        }
        let columns = filter
            .order
            .iter()
            .map(|(name, order)| Ok((&schema.columns()[schema.require(name)?], *order)))
            .collect::<Result<Vec<_>>>()?;
        out.push_str("\nORDER BY ");
        separated_by(
            out,
            columns,
            |out, (column, order)| {
                self.write_column_ref(out, column);
                if order == Order::Desc {
                    out.push_str(" DESC");
                }
            },
            ", ",
        );
        Ok(())
    }

    fn write_limit(&self, out: &mut String, limit: u32) {
        out.push_str("\nLIMIT ");
        write_integer!(out, limit);
    }

    /// SELECT of every column of the table, without the trailing semicolon.
    fn write_select_body(
        &self,
        out: &mut String,
        schema: &TableSchema,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<()> {
        out.push_str("SELECT ");
        separated_by(
            out,
            schema.columns(),
            |out, column| self.write_column_ref(out, column),
            ", ",
        );
        out.push_str("\nFROM ");
        self.write_table_ref(out, schema);
        self.write_where(out, schema, filter)?;
        self.write_order_by(out, schema, filter)?;
        if let Some(limit) = limit {
            self.write_limit(out, limit);
        }
        Ok(())
    }

    /// Emit SELECT statement (projection, FROM, WHERE, ORDER, LIMIT).
    fn write_select(
        &self,
        out: &mut String,
        schema: &TableSchema,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<()> {
        out.reserve(128 + schema.columns().len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        self.write_select_body(out, schema, filter, limit)?;
        out.push(';');
        Ok(())
    }

    /// Emit the count of the rows matching `filter`, honoring its limit.
    fn write_count(&self, out: &mut String, schema: &TableSchema, filter: &Filter) -> Result<()> {
        out.reserve(128);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT COUNT(*)\nFROM ");
        if let Some(limit) = filter.limit {
            out.push('(');
            self.write_select_body(out, schema, filter, Some(limit))?;
            out.push_str(") AS ");
            self.write_identifier_quoted(out, "limited");
        } else {
            self.write_table_ref(out, schema);
            self.write_where(out, schema, filter)?;
        }
        out.push(';');
        Ok(())
    }

    /// Emit INSERT of one row, `DEFAULT VALUES` when there are no columns to set.
    fn write_insert(&self, out: &mut String, schema: &TableSchema, row: &[(usize, &Value)]) {
        out.reserve(64 + row.len() * 48);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("INSERT INTO ");
        self.write_table_ref(out, schema);
        if row.is_empty() {
            out.push_str(" DEFAULT VALUES;");
            return;
        }
        out.push_str(" (");
        separated_by(
            out,
            row,
            |out, (i, _)| self.write_column_ref(out, &schema.columns()[*i]),
            ", ",
        );
        out.push_str(")\nVALUES (");
        separated_by(out, row, |out, (_, v)| self.write_value(out, v), ", ");
        out.push_str(");");
    }

    /// Emit UPDATE of the given columns of the row identified by `identity`.
    fn write_update(
        &self,
        out: &mut String,
        schema: &TableSchema,
        identity: &Value,
        changes: &[(usize, &Value)],
    ) {
        out.reserve(64 + changes.len() * 48);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("UPDATE ");
        self.write_table_ref(out, schema);
        out.push_str(" SET\n");
        separated_by(
            out,
            changes,
            |out, (i, v)| {
                self.write_column_ref(out, &schema.columns()[*i]);
                out.push_str(" = ");
                self.write_value(out, v);
            },
            ",\n",
        );
        self.write_where_identity(out, schema, identity);
        out.push(';');
    }

    /// Emit DELETE of the row identified by `identity`.
    fn write_delete(&self, out: &mut String, schema: &TableSchema, identity: &Value) {
        out.reserve(64);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DELETE FROM ");
        self.write_table_ref(out, schema);
        self.write_where_identity(out, schema, identity);
        out.push(';');
    }

    fn write_where_identity(&self, out: &mut String, schema: &TableSchema, identity: &Value) {
        out.push_str("\nWHERE ");
        self.write_condition(
            out,
            schema.primary_key(),
            &Condition::Eq(identity.clone()),
        );
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN TRANSACTION;");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }

    /// Compile `filter` against `schema` for the requested materialization.
    ///
    /// Single lookups fetch two rows at most, enough to detect ambiguity.
    fn compile(
        &self,
        schema: &TableSchema,
        filter: &Filter,
        mode: Materialize,
    ) -> Result<CompiledQuery> {
        let mut sql = String::new();
        match mode {
            Materialize::Single => self.write_select(&mut sql, schema, filter, Some(2))?,
            Materialize::Multiple | Materialize::Iterator => {
                self.write_select(&mut sql, schema, filter, filter.limit)?
            }
            Materialize::Count => self.write_count(&mut sql, schema, filter)?,
        }
        Ok(CompiledQuery { sql, mode })
    }
}

/// Fallback generic SQL writer (standard SQL literals, closest to PostgreSQL).
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub const fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
