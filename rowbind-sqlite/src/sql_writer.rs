use rowbind_core::{SqlWriter, format_date, format_time, format_timestamp};
use time::{Date, PrimitiveDateTime, Time};

/// SQLite dialect: temporal values are stored as ISO-8601 text and booleans as integers.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push(if value { '1' } else { '0' });
    }

    fn write_value_infinity(&self, out: &mut String, negative: bool) {
        if negative {
            out.push('-');
        }
        out.push_str("1.0e+10000");
    }

    fn write_value_nan(&self, out: &mut String) {
        // Not representable, SQLite stores NaN as NULL anyway
        self.write_value_none(out);
    }

    fn write_value_date(&self, out: &mut String, value: &Date) {
        self.write_value_string(out, &format_date(value));
    }

    fn write_value_time(&self, out: &mut String, value: &Time) {
        self.write_value_string(out, &format_time(value));
    }

    fn write_value_timestamp(&self, out: &mut String, value: &PrimitiveDateTime) {
        self.write_value_string(out, &format_timestamp(value));
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN;");
    }
}
