#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rowbind_core::{
        ColumnSpec, ColumnType, Driver, Filter, Materialize, SqlWriter, TableSchema, Value,
    };
    use rowbind_sqlite::SqliteDriver;
    use time::{Date, Month, PrimitiveDateTime, Time};

    #[test]
    fn literals() {
        let writer = SqliteDriver::new().sql_writer();
        let write = |value: Value| {
            let mut out = String::new();
            writer.write_value(&mut out, &value);
            out
        };
        assert_eq!(write(true.into()), "1");
        assert_eq!(write(false.into()), "0");
        assert_eq!(write(f64::INFINITY.into()), "1.0e+10000");
        assert_eq!(write(f64::NEG_INFINITY.into()), "-1.0e+10000");
        assert_eq!(write(f64::NAN.into()), "NULL");
        let date = Date::from_calendar_date(2024, Month::March, 9).expect("Valid date");
        assert_eq!(write(date.into()), "'2024-03-09'");
        assert_eq!(
            write(Time::from_hms(8, 5, 0).expect("Valid time").into()),
            "'08:05:00'"
        );
        assert_eq!(
            write(PrimitiveDateTime::new(date, Time::MIDNIGHT).into()),
            "'2024-03-09 00:00:00'"
        );
        assert_eq!(write(vec![1u8, 2].into()), "X'0102'");
        let mut out = String::new();
        writer.write_transaction_begin(&mut out);
        assert_eq!(out, "BEGIN;");
    }

    #[test]
    fn filter() {
        let writer = SqliteDriver::new().sql_writer();
        let schema = TableSchema::new(
            "event",
            [
                ColumnSpec::new("id", ColumnType::Integer).primary_key(),
                ColumnSpec::new("active", ColumnType::Boolean),
                ColumnSpec::new("day", ColumnType::Date),
            ],
        )
        .expect("Valid schema");
        let query = writer
            .compile(
                &schema,
                &Filter::new().eq("active", "true").ge("day", "2024-01-01"),
                Materialize::Multiple,
            )
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT "id", "active", "day"
                FROM "event"
                WHERE "active" = 1 AND "day" >= '2024-01-01';
            "#}
            .trim()
        );
    }
}
