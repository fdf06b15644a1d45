use crate::{record_error, silent_logs};
use rowbind::{
    ColumnType, Connection, DefaultValue, Filter, RecordError, RecordState, SchemaCache,
    SchemaCacheConfig, TableBinding, Value,
};

pub async fn greeting<C: Connection>(connection: &mut C) {
    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "greeting";
            CREATE TABLE "greeting" (
                "id" INTEGER PRIMARY KEY,
                "data" VARCHAR(255),
                "lang" TEXT NOT NULL DEFAULT 'en' CHECK ("lang" IN ('en', 'ja', 'es'))
            );
            "#
            .into(),
        )
        .await
        .expect("Failed to create the greeting table");
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let greeting = TableBinding::bind(connection, &cache, "greeting")
        .await
        .expect("Failed to bind the greeting table");

    // Schema
    let schema = greeting.schema();
    assert_eq!(schema.name(), "greeting");
    assert_eq!(
        schema.column_names().collect::<Vec<_>>(),
        ["id", "data", "lang"]
    );
    assert_eq!(schema.primary_key().name, "id");
    assert!(schema.primary_key().auto_increment);
    let data = schema.column("data").expect("Missing column data");
    assert_eq!(data.column_type, ColumnType::Varchar(Some(255)));
    assert!(data.nullable);
    assert_eq!(data.default, None);
    let lang = schema.column("lang").expect("Missing column lang");
    assert_eq!(
        lang.column_type,
        ColumnType::Enum(vec!["en".into(), "ja".into(), "es".into()])
    );
    assert!(!lang.nullable);
    assert_eq!(lang.default, Some(DefaultValue::Value("en".into())));
    let shouting = TableBinding::bind(connection, &cache, "GREETING")
        .await
        .expect("Table names are case insensitive");
    assert_eq!(shouting.table(), "greeting");
    assert_eq!(*shouting.schema(), *greeting.schema());

    // Insert
    let mut record = greeting.new_record();
    assert_eq!(record.state(), RecordState::New);
    assert_eq!(record.identity(), None);
    assert_eq!(record.get("data").expect("Failed to get data"), &Value::Null);
    record
        .set_many([("data", "hello"), ("lang", "en")])
        .expect("Failed to set the values");
    assert_eq!(record.state(), RecordState::New);
    assert!(record.is_dirty());
    let id = record
        .commit(connection)
        .await
        .expect("Failed to commit the new record");
    assert!(matches!(id, Value::Int64(..)));
    assert_eq!(record.state(), RecordState::Clean);
    assert_eq!(record.identity(), Some(&id));
    assert_eq!(record.get("id").expect("Failed to get id"), &id);

    let found = greeting
        .find_one(connection, [("data", "hello")])
        .await
        .expect("Failed to find the greeting")
        .expect("The greeting should exist");
    assert_eq!(found.get("id").expect("Failed to get id"), &id);
    assert_eq!(found.get("lang").expect("Failed to get lang"), &Value::from("en"));
    assert_eq!(found.state(), RecordState::Clean);

    // Default applied by the insert
    let mut hola = greeting.new_record();
    hola.set("data", "hola").expect("Failed to set data");
    let hola_id = hola.commit(connection).await.expect("Failed to commit hola");
    assert_ne!(hola_id, id);
    assert_eq!(
        hola.get_as::<String>("lang").expect("Failed to get lang"),
        "en"
    );

    // Rejected values
    let error = record
        .set("lang", "fr")
        .expect_err("An enum column must reject values outside its choices");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::InvalidValue { column, .. }) if column == "lang"
    ));
    let error = record
        .set("language", "en")
        .expect_err("Unknown columns must be rejected");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::UnknownField { field, .. }) if field == "language"
    ));
    let error = record
        .set_value("hi")
        .expect_err("The table has two data columns");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::AmbiguousField { candidates, .. }) if candidates.len() == 2
    ));
    let error = record
        .set_many([("data", "partial"), ("lang", "xx")])
        .expect_err("The whole set must fail");
    assert!(matches!(record_error(&error), Some(RecordError::InvalidValue { .. })));
    assert!(!record.is_dirty(), "A rejected set_many changes nothing");
    assert_eq!(record.get("data").expect("Failed to get data"), &Value::from("hello"));

    // Update
    record.set("lang", "ja").expect("Failed to set lang");
    assert_eq!(record.state(), RecordState::Dirty);
    assert_eq!(record.get("lang").expect("Failed to get lang"), &Value::from("ja"));
    assert_eq!(record.commit(connection).await.expect("Failed to update"), id);
    assert_eq!(record.state(), RecordState::Clean);
    let found = greeting
        .find_by_pk(connection, id.clone())
        .await
        .expect("Failed to find by primary key")
        .expect("The greeting should still exist");
    assert_eq!(found.get("lang").expect("Failed to get lang"), &Value::from("ja"));
    assert_eq!(found.get("data").expect("Failed to get data"), &Value::from("hello"));

    // Discard
    record.set("data", "changed").expect("Failed to set data");
    record.delete().expect("Failed to mark the delete");
    assert_eq!(record.state(), RecordState::Dirty);
    record.discard();
    assert_eq!(record.state(), RecordState::Clean);
    assert_eq!(record.get("data").expect("Failed to get data"), &Value::from("hello"));
    let mut discarded = greeting.new_record();
    discarded.set("data", "never stored").expect("Failed to set data");
    discarded.discard();
    assert_eq!(discarded.state(), RecordState::New);
    assert_eq!(discarded.get("data").expect("Failed to get data"), &Value::Null);
    assert_eq!(
        greeting
            .count(connection, [("data", "never stored")])
            .await
            .expect("Failed to count"),
        0
    );

    // Delete
    record.delete().expect("Failed to mark the delete");
    assert_eq!(record.state(), RecordState::Dirty);
    assert_eq!(record.commit(connection).await.expect("Failed to delete"), id);
    assert_eq!(record.state(), RecordState::Deleted);
    let error = record.get("data").expect_err("A deleted record has no values");
    assert!(matches!(record_error(&error), Some(RecordError::Deleted { .. })));
    silent_logs! {
        let error = record.commit(connection).await.expect_err("A deleted record cannot commit");
        assert!(matches!(record_error(&error), Some(RecordError::Deleted { .. })));
    }
    assert!(
        greeting
            .find_by_pk(connection, id)
            .await
            .expect("Failed to find by primary key")
            .is_none()
    );

    // Deleting a record that was never stored does not touch the table
    let mut never = greeting.new_record();
    never.set("data", "ghost").expect("Failed to set data");
    never.delete().expect("Failed to mark the delete");
    never.commit(connection).await.expect("Failed to commit the delete");
    assert_eq!(never.state(), RecordState::Deleted);
    assert_eq!(
        greeting
            .count(connection, Filter::new())
            .await
            .expect("Failed to count"),
        1
    );
}
