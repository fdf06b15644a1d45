#[cfg(test)]
mod tests {
    use rowbind::{
        ColumnSpec, ColumnType, Record, RecordError, RecordState, RowLabeled, TableSchema, Value,
    };
    use std::sync::Arc;
    use time::{Date, Month};

    const DATABASE: &str = "sqlite:///srv/staff.sqlite";

    fn employee() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new(
                "employee",
                [
                    ColumnSpec::new("id", ColumnType::Integer)
                        .primary_key()
                        .auto_increment(),
                    ColumnSpec::new("name", ColumnType::Text).not_null(),
                    ColumnSpec::new("hired", ColumnType::Date),
                    ColumnSpec::new("active", ColumnType::Boolean).default_value(true),
                ],
            )
            .expect("Valid schema"),
        )
    }

    fn row(values: impl IntoIterator<Item = (&'static str, Value)>) -> RowLabeled {
        let (labels, values): (Vec<_>, Vec<_>) =
            values.into_iter().map(|(k, v)| (k.to_string(), v)).unzip();
        RowLabeled::new(labels.into(), values.into())
    }

    #[test]
    fn new_record() {
        let mut record = Record::new(DATABASE, employee());
        assert_eq!(record.database(), DATABASE);
        assert_eq!(record.state(), RecordState::New);
        assert!(!record.is_dirty());
        assert!(!record.is_persisted());
        assert_eq!(record.identity(), None);
        assert_eq!(
            record.column_names().collect::<Vec<_>>(),
            ["id", "name", "hired", "active"]
        );
        assert_eq!(record.get("name").expect("Failed to get name"), &Value::Null);

        record.set("name", "Ada").expect("Failed to set name");
        record.set("hired", "2020-02-29").expect("Failed to set hired");
        assert!(record.is_dirty());
        assert_eq!(record.state(), RecordState::New);
        assert_eq!(
            record.get("hired").expect("Failed to get hired"),
            &Value::Date(Date::from_calendar_date(2020, Month::February, 29).expect("Valid date"))
        );
        assert_eq!(
            record.get_as::<String>("name").expect("Failed to get name"),
            "Ada"
        );
        assert_eq!(
            record.get_as::<Option<Date>>("hired").expect("Failed to get hired"),
            Date::from_calendar_date(2020, Month::February, 29).ok()
        );
        record.discard();
        assert!(!record.is_dirty());
        assert_eq!(record.get("name").expect("Failed to get name"), &Value::Null);
    }

    #[test]
    fn rejected_values() {
        let mut record = Record::new(DATABASE, employee());
        let error = record
            .set("salary", 10)
            .expect_err("The column does not exist");
        assert!(matches!(
            error.downcast_ref::<RecordError>(),
            Some(RecordError::UnknownField { table, field })
                if table == "employee" && field == "salary"
        ));
        let error = record
            .set("hired", "last monday")
            .expect_err("Not a date");
        assert!(matches!(
            error.downcast_ref::<RecordError>(),
            Some(RecordError::InvalidValue { column, .. }) if column == "hired"
        ));
        let error = record.set("active", 7).expect_err("Not a boolean");
        assert!(matches!(
            error.downcast_ref::<RecordError>(),
            Some(RecordError::InvalidValue { column, .. }) if column == "active"
        ));
        let error = record.set_value("x").expect_err("Three data columns");
        assert!(matches!(
            error.downcast_ref::<RecordError>(),
            Some(RecordError::AmbiguousField { candidates, .. })
                if *candidates == ["name", "hired", "active"]
        ));
        let error = record
            .set_many([("name", Value::from("Grace")), ("hired", Value::from(false))])
            .expect_err("Not a date");
        assert!(error.downcast_ref::<RecordError>().is_some());
        assert!(!record.is_dirty(), "Nothing was applied");
        let error = record
            .get_as::<i64>("name")
            .expect_err("NULL is not an integer");
        assert!(format!("{:#}", error).contains("`employee`.`name`"));
    }

    #[test]
    fn stored_record() {
        let schema = employee();
        let mut record = Record::from_row(
            DATABASE,
            schema.clone(),
            row([
                ("id", Value::Int64(3)),
                ("name", Value::from("Ada")),
                ("hired", Value::from("2020-02-29")),
                ("active", Value::Int64(1)),
                ("unrelated", Value::from("ignored")),
            ]),
        )
        .expect("Failed to build the record");
        assert_eq!(record.state(), RecordState::Clean);
        assert!(record.is_persisted());
        assert_eq!(record.identity(), Some(&Value::Int64(3)));
        assert!(Arc::ptr_eq(record.schema(), &schema));
        assert_eq!(
            record.get("active").expect("Failed to get active"),
            &Value::Boolean(true),
            "Stored values are coerced to the column type"
        );
        assert!(matches!(
            record.get("hired").expect("Failed to get hired"),
            Value::Date(..)
        ));

        record.set("name", "Grace").expect("Failed to set name");
        assert_eq!(record.state(), RecordState::Dirty);
        assert_eq!(record.get("name").expect("Failed to get name"), &Value::from("Grace"));
        record.discard();
        assert_eq!(record.state(), RecordState::Clean);
        assert_eq!(record.get("name").expect("Failed to get name"), &Value::from("Ada"));

        record.delete().expect("Failed to mark the delete");
        assert_eq!(record.state(), RecordState::Dirty);
        record.discard();
        assert_eq!(record.state(), RecordState::Clean);
    }

    #[test]
    fn stored_record_without_identity() {
        let error = Record::from_row(
            DATABASE,
            employee(),
            row([("id", Value::Null), ("name", Value::from("Ada"))]),
        )
        .expect_err("A stored row always has a primary key");
        assert!(format!("{:#}", error).contains("id"));
    }

    #[test]
    fn natural_column() {
        let schema = Arc::new(
            TableSchema::new(
                "tag",
                [
                    ColumnSpec::new("id", ColumnType::Integer).primary_key(),
                    ColumnSpec::new("label", ColumnType::Varchar(Some(16))),
                ],
            )
            .expect("Valid schema"),
        );
        let mut record = Record::new(DATABASE, schema);
        record.set_value("rust").expect("Failed to set the value");
        assert_eq!(record.value().expect("Failed to get the value"), &Value::from("rust"));
        assert_eq!(record.get("label").expect("Failed to get label"), &Value::from("rust"));
        record.set_value(12).expect("Numbers become text");
        assert_eq!(record.value().expect("Failed to get the value"), &Value::from("12"));
        record.discard();
    }
}
