#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rowbind::{
        ColumnSpec, ColumnType, Filter, GenericSqlWriter, Materialize, Order, RecordError,
        SqlWriter, TableSchema, Value,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::{Date, Month, PrimitiveDateTime, Time};
    use uuid::Uuid;

    const WRITER: GenericSqlWriter = GenericSqlWriter::new();

    fn greeting() -> TableSchema {
        TableSchema::new(
            "greeting",
            [
                ColumnSpec::new("id", ColumnType::Integer)
                    .primary_key()
                    .auto_increment(),
                ColumnSpec::new("data", ColumnType::Varchar(Some(255))),
                ColumnSpec::new(
                    "lang",
                    ColumnType::Enum(vec!["en".into(), "ja".into(), "es".into()]),
                )
                .not_null()
                .default_value("en"),
            ],
        )
        .expect("Valid schema")
    }

    #[test]
    fn select() {
        let schema = greeting();
        let query = WRITER
            .compile(&schema, &[("data", "hello")].into(), Materialize::Single)
            .expect("Failed to compile");
        assert_eq!(query.mode, Materialize::Single);
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT "id", "data", "lang"
                FROM "greeting"
                WHERE "data" = 'hello'
                LIMIT 2;
            "#}
            .trim()
        );
        let query = WRITER
            .compile(
                &schema,
                &Filter::new()
                    .ge("id", 10)
                    .is_not_null("data")
                    .order_by("id", Order::Desc)
                    .order_by("lang", Order::Asc)
                    .limit(5),
                Materialize::Multiple,
            )
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT "id", "data", "lang"
                FROM "greeting"
                WHERE "id" >= 10 AND "data" IS NOT NULL
                ORDER BY "id" DESC, "lang"
                LIMIT 5;
            "#}
            .trim()
        );
        let query = WRITER
            .compile(&schema, &Filter::new(), Materialize::Iterator)
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT "id", "data", "lang"
                FROM "greeting";
            "#}
            .trim()
        );
    }

    #[test]
    fn conditions() {
        let schema = greeting();
        let compile = |filter: Filter| {
            WRITER
                .compile(&schema, &filter, Materialize::Multiple)
                .expect("Failed to compile")
                .sql
        };
        assert!(compile([("data", Value::Null)].into()).ends_with(r#"WHERE "data" IS NULL;"#));
        assert!(
            compile(Filter::new().ne("data", Value::Null))
                .ends_with(r#"WHERE "data" IS NOT NULL;"#)
        );
        assert!(compile(Filter::new().ne("lang", "ja")).ends_with(r#"WHERE "lang" <> 'ja';"#));
        assert!(
            compile(Filter::new().like("data", "it's%"))
                .ends_with(r#"WHERE "data" LIKE 'it''s%';"#)
        );
        assert!(
            compile(Filter::new().is_in("id", [Value::from("1"), Value::from(2)]))
                .ends_with(r#"WHERE "id" IN (1, 2);"#),
            "Values are coerced to the column type"
        );
        assert!(
            compile(Filter::new().is_in("id", Vec::<i64>::new())).ends_with("WHERE 1 = 0;"),
            "An empty list matches nothing"
        );
        assert!(
            compile(Filter::new().lt("id", "not a number"))
                .ends_with(r#"WHERE "id" < 'not a number';"#),
            "Values that do not fit the column are kept"
        );
        assert!(
            compile(Filter::new().gt("id", 1).le("id", 9.0))
                .ends_with(r#"WHERE "id" > 1 AND "id" <= 9;"#)
        );
    }

    #[test]
    fn count() {
        let schema = greeting();
        let query = WRITER
            .compile(&schema, &[("lang", "en")].into(), Materialize::Count)
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT COUNT(*)
                FROM "greeting"
                WHERE "lang" = 'en';
            "#}
            .trim()
        );
        let query = WRITER
            .compile(
                &schema,
                &Filter::new().eq("lang", "en").limit(3),
                Materialize::Count,
            )
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT COUNT(*)
                FROM (SELECT "id", "data", "lang"
                FROM "greeting"
                WHERE "lang" = 'en'
                LIMIT 3) AS "limited";
            "#}
            .trim()
        );
    }

    #[test]
    fn unknown_columns() {
        let schema = greeting();
        for filter in [
            Filter::new().eq("missing", 1),
            Filter::new().order_by("missing", Order::Asc),
        ] {
            let error = WRITER
                .compile(&schema, &filter, Materialize::Multiple)
                .expect_err("Unknown columns must be rejected");
            assert!(matches!(
                error.downcast_ref::<RecordError>(),
                Some(RecordError::UnknownField { field, .. }) if field == "missing"
            ));
        }
    }

    #[test]
    fn modify() {
        let schema = greeting();
        let data = Value::from("it's");
        let lang = Value::from("en");
        {
            let mut out = String::new();
            WRITER.write_insert(&mut out, &schema, &[(1, &data), (2, &lang)]);
            assert_eq!(
                out,
                indoc! {r#"
                    INSERT INTO "greeting" ("data", "lang")
                    VALUES ('it''s', 'en');
                "#}
                .trim()
            );
        }
        {
            let mut out = String::new();
            WRITER.write_insert(&mut out, &schema, &[]);
            assert_eq!(out, r#"INSERT INTO "greeting" DEFAULT VALUES;"#);
        }
        {
            let mut out = String::new();
            WRITER.write_update(&mut out, &schema, &Value::Int64(7), &[(1, &data), (2, &lang)]);
            assert_eq!(
                out,
                indoc! {r#"
                    UPDATE "greeting" SET
                    "data" = 'it''s',
                    "lang" = 'en'
                    WHERE "id" = 7;
                "#}
                .trim()
            );
        }
        {
            let mut out = String::new();
            WRITER.write_delete(&mut out, &schema, &Value::Int64(7));
            assert_eq!(
                out,
                indoc! {r#"
                    DELETE FROM "greeting"
                    WHERE "id" = 7;
                "#}
                .trim()
            );
        }
        {
            let mut out = String::new();
            WRITER.write_transaction_begin(&mut out);
            out.push(' ');
            WRITER.write_transaction_commit(&mut out);
            out.push(' ');
            WRITER.write_transaction_rollback(&mut out);
            assert_eq!(out, "BEGIN TRANSACTION; COMMIT; ROLLBACK;");
        }
    }

    #[test]
    fn values() {
        let write = |value: Value| {
            let mut out = String::new();
            WRITER.write_value(&mut out, &value);
            out
        };
        assert_eq!(write(Value::Null), "NULL");
        assert_eq!(write(true.into()), "TRUE");
        assert_eq!(write(false.into()), "FALSE");
        assert_eq!(write((-42).into()), "-42");
        assert_eq!(write(1.5.into()), "1.5");
        assert_eq!(
            write(f64::INFINITY.into()),
            "CAST('Infinity' AS DOUBLE PRECISION)"
        );
        assert_eq!(
            write(f64::NEG_INFINITY.into()),
            "CAST('-Infinity' AS DOUBLE PRECISION)"
        );
        assert_eq!(write(f64::NAN.into()), "CAST('NaN' AS DOUBLE PRECISION)");
        assert_eq!(
            write(Decimal::from_str("12.50").expect("Valid decimal").into()),
            "12.50"
        );
        assert_eq!(write("O'Reilly".into()), "'O''Reilly'");
        assert_eq!(write(vec![0xABu8, 0x01].into()), "X'AB01'");
        let date = Date::from_calendar_date(2024, Month::March, 9).expect("Valid date");
        assert_eq!(write(date.into()), "DATE '2024-03-09'");
        let time = Time::from_hms_milli(23, 59, 1, 250).expect("Valid time");
        assert_eq!(write(time.into()), "TIME '23:59:01.25'");
        assert_eq!(
            write(PrimitiveDateTime::new(date, Time::MIDNIGHT).into()),
            "TIMESTAMP '2024-03-09 00:00:00'"
        );
        let uuid = Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").expect("Valid uuid");
        assert_eq!(
            write(uuid.into()),
            "'5e915574-bb30-4430-98cf-c5854f61fbbd'"
        );
    }

    #[test]
    fn identifiers() {
        let schema = TableSchema::new(
            r#"odd "table""#,
            [ColumnSpec::new("key column", ColumnType::Text).primary_key()],
        )
        .expect("Valid schema");
        let query = WRITER
            .compile(&schema, &Filter::new(), Materialize::Multiple)
            .expect("Failed to compile");
        assert_eq!(
            query.sql,
            indoc! {r#"
                SELECT "key column"
                FROM "odd ""table""";
            "#}
            .trim()
        );
    }
}
