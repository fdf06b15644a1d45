use crate::{record_error, silent_logs};
use rowbind::{
    Connection, Filter, RecordError, RecordState, SchemaCache, SchemaCacheConfig, TableBinding,
    Value,
};
use std::sync::Arc;
use time::{Date, Month, PrimitiveDateTime, Time};
use uuid::Uuid;

pub async fn lifecycle<C: Connection>(connection: &mut C) {
    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "lifecycle_note";
            CREATE TABLE "lifecycle_note" (
                "id" INTEGER PRIMARY KEY,
                "title" TEXT NOT NULL UNIQUE,
                "body" TEXT
            );
            "#
            .into(),
        )
        .await
        .expect("Failed to create the lifecycle_note table");
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let notes = TableBinding::bind(connection, &cache, "lifecycle_note")
        .await
        .expect("Failed to bind the lifecycle_note table");

    // Explicit identity
    let mut first = notes.new_record();
    first
        .set_many([("id", Value::from(100)), ("title", Value::from("first"))])
        .expect("Failed to set the values");
    assert_eq!(
        first.commit(connection).await.expect("Failed to insert"),
        Value::Int64(100)
    );
    assert_eq!(first.get("body").expect("Failed to get body"), &Value::Null);

    // Insert failure leaves the record untouched
    let mut duplicate = notes.new_record();
    duplicate.set("title", "first").expect("Failed to set title");
    silent_logs! {
        let error = duplicate
            .commit(connection)
            .await
            .expect_err("The title must be unique");
        assert!(matches!(record_error(&error), Some(RecordError::Commit { .. })));
    }
    assert_eq!(duplicate.state(), RecordState::New);
    assert_eq!(duplicate.get("title").expect("Failed to get title"), &Value::from("first"));
    duplicate.discard();
    assert!(!duplicate.is_dirty());
    assert_eq!(duplicate.get("title").expect("Failed to get title"), &Value::Null);
    assert_eq!(
        notes
            .count(connection, Filter::new())
            .await
            .expect("Failed to count"),
        1
    );

    // Generated identity follows the explicit one
    let mut second = notes.new_record();
    second
        .set_many([("title", "second"), ("body", "some text")])
        .expect("Failed to set the values");
    let second_id = second.commit(connection).await.expect("Failed to insert");
    assert_eq!(second_id, Value::Int64(101));

    // Update failure leaves the record dirty
    second.set("title", "first").expect("Failed to set title");
    silent_logs! {
        let error = second
            .commit(connection)
            .await
            .expect_err("The title must stay unique");
        assert!(matches!(record_error(&error), Some(RecordError::Commit { .. })));
    }
    assert_eq!(second.state(), RecordState::Dirty);
    assert_eq!(second.get("title").expect("Failed to get title"), &Value::from("first"));
    second.discard();
    assert_eq!(second.state(), RecordState::Clean);
    assert_eq!(second.get("title").expect("Failed to get title"), &Value::from("second"));

    // Same values do not issue any update
    second.set("title", "second").expect("Failed to set title");
    assert_eq!(second.state(), RecordState::Dirty);
    assert_eq!(
        second.commit(connection).await.expect("Failed to commit"),
        second_id
    );
    assert_eq!(second.state(), RecordState::Clean);

    // Changes made by somebody else
    connection
        .execute(r#"UPDATE "lifecycle_note" SET "body" = 'edited' WHERE "id" = 101;"#.into())
        .await
        .expect("Failed to edit the note");
    assert_eq!(second.get("body").expect("Failed to get body"), &Value::from("some text"));
    second.reload(connection).await.expect("Failed to reload");
    assert_eq!(second.get("body").expect("Failed to get body"), &Value::from("edited"));
    connection
        .execute(r#"DELETE FROM "lifecycle_note" WHERE "id" = 101;"#.into())
        .await
        .expect("Failed to delete the note");
    second.set("body", "too late").expect("Failed to set body");
    silent_logs! {
        let error = second
            .commit(connection)
            .await
            .expect_err("The row is gone");
        assert!(matches!(record_error(&error), Some(RecordError::Commit { .. })));
    }
    assert_eq!(second.state(), RecordState::Dirty);
    second.discard();
    let error = second
        .reload(connection)
        .await
        .expect_err("The row is gone");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::QueryExecution { .. })
    ));

    // Single data column and a primary key not generated by the database
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "lifecycle_word";
            CREATE TABLE "lifecycle_word" ("word" TEXT PRIMARY KEY, "meaning" TEXT);
            "#
            .into(),
        )
        .await
        .expect("Failed to create the lifecycle_word table");
    let words = TableBinding::bind(connection, &cache, "lifecycle_word")
        .await
        .expect("Failed to bind the lifecycle_word table");
    assert!(!words.schema().primary_key().auto_increment);
    let mut word = words.new_record();
    word.set_value("a greeting").expect("Failed to set the value");
    silent_logs! {
        let error = word
            .commit(connection)
            .await
            .expect_err("The primary key is neither given nor generated");
        assert!(matches!(record_error(&error), Some(RecordError::Commit { .. })));
    }
    word.set("word", "hello").expect("Failed to set the word");
    assert_eq!(
        word.commit(connection).await.expect("Failed to insert"),
        Value::from("hello")
    );
    let word = words
        .find_by_pk(connection, "hello")
        .await
        .expect("Failed to look up the word")
        .expect("The word should exist");
    assert_eq!(word.value().expect("Failed to get the value"), &Value::from("a greeting"));
}

pub async fn foreign_database<C: Connection>(connection: &mut C, other: &mut C) {
    // Setup
    assert_ne!(connection.database_id(), other.database_id());
    for executor in [&mut *connection, &mut *other] {
        executor
            .execute(
                r#"
                DROP TABLE IF EXISTS "shared_name";
                CREATE TABLE "shared_name" ("id" INTEGER PRIMARY KEY, "data" TEXT);
                "#
                .into(),
            )
            .await
            .expect("Failed to create the shared_name table");
    }
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let here = TableBinding::bind(connection, &cache, "shared_name")
        .await
        .expect("Failed to bind shared_name");
    let there = TableBinding::bind(other, &cache, "shared_name")
        .await
        .expect("Failed to bind shared_name on the other database");
    assert!(
        !Arc::ptr_eq(here.schema(), there.schema()),
        "Same table name, different databases"
    );

    // New record
    let mut record = here.new_record();
    assert_eq!(record.database(), connection.database_id());
    record.set("data", "local").expect("Failed to set data");
    let error = record
        .commit(other)
        .await
        .expect_err("The record belongs to the first database");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::DatabaseMismatch { table, .. }) if table == "shared_name"
    ));
    assert_eq!(record.state(), RecordState::New);
    assert_eq!(
        there
            .count(other, Filter::new())
            .await
            .expect("Failed to count on the other database"),
        0
    );
    let id = record.commit(connection).await.expect("Failed to insert");

    // Stored record
    let mut record = here
        .find_by_pk(connection, id)
        .await
        .expect("Failed to look up the record")
        .expect("The record should exist");
    assert_eq!(record.database(), connection.database_id());
    record.set("data", "changed").expect("Failed to set data");
    let error = record
        .commit(other)
        .await
        .expect_err("The record belongs to the first database");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::DatabaseMismatch { .. })
    ));
    assert_eq!(record.state(), RecordState::Dirty);
    let error = record
        .reload(other)
        .await
        .expect_err("The record belongs to the first database");
    assert!(matches!(
        record_error(&error),
        Some(RecordError::DatabaseMismatch { .. })
    ));
    record.delete().expect("Failed to mark the delete");
    assert!(
        record.commit(other).await.is_err(),
        "Deletes go through the same check"
    );
    record.discard();
    assert_eq!(
        here.count(connection, Filter::new())
            .await
            .expect("Failed to count"),
        1
    );

    // Records read from the other database belong to it
    let mut remote = there.new_record();
    remote.set("data", "remote").expect("Failed to set data");
    remote.commit(other).await.expect("Failed to insert remotely");
    let mut iterator = there
        .find_iter(other, Filter::new())
        .expect("Failed to open the iterator");
    let mut remote = iterator
        .next()
        .await
        .expect("Failed to read the remote record")
        .expect("There is a remote record");
    drop(iterator);
    assert_eq!(remote.database(), other.database_id());
    remote.set("data", "moved").expect("Failed to set data");
    assert!(remote.commit(connection).await.is_err());
    remote.discard();
}

pub async fn typed_values<C: Connection>(connection: &mut C) {
    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "typed_event";
            CREATE TABLE "typed_event" (
                "id" INTEGER PRIMARY KEY,
                "happened" DATETIME,
                "day" DATE,
                "at" TIME,
                "active" BOOLEAN NOT NULL DEFAULT 1,
                "amount" REAL DEFAULT 2.5,
                "reference" UUID,
                "payload" BLOB,
                "created" TEXT DEFAULT CURRENT_TIMESTAMP
            );
            "#
            .into(),
        )
        .await
        .expect("Failed to create the typed_event table");
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let events = TableBinding::bind(connection, &cache, "typed_event")
        .await
        .expect("Failed to bind the typed_event table");
    let happened = PrimitiveDateTime::new(
        Date::from_calendar_date(2024, Month::March, 9).expect("Invalid date"),
        Time::from_hms(10, 30, 15).expect("Invalid time"),
    );
    let day = Date::from_calendar_date(1999, Month::December, 31).expect("Invalid date");
    let at = Time::from_hms_milli(23, 59, 1, 250).expect("Invalid time");
    let reference = Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").expect("Invalid uuid");

    let mut event = events.new_record();
    event.set("happened", happened).expect("Failed to set happened");
    event.set("day", "1999-12-31").expect("Failed to set day");
    event.set("at", at).expect("Failed to set at");
    event.set("reference", reference).expect("Failed to set reference");
    event
        .set("payload", vec![0u8, 1, 2, 254, 255])
        .expect("Failed to set payload");
    let error = event
        .set("day", "yesterday")
        .expect_err("Not a date");
    assert!(matches!(record_error(&error), Some(RecordError::InvalidValue { .. })));
    let id = event.commit(connection).await.expect("Failed to insert");

    let event = events
        .find_by_pk(connection, id)
        .await
        .expect("Failed to look up the event")
        .expect("The event should exist");
    assert_eq!(
        event.get_as::<PrimitiveDateTime>("happened").expect("Failed to get happened"),
        happened
    );
    assert_eq!(event.get("day").expect("Failed to get day"), &Value::Date(day));
    assert_eq!(event.get_as::<Time>("at").expect("Failed to get at"), at);
    assert!(event.get_as::<bool>("active").expect("Failed to get active"));
    assert_eq!(event.get_as::<f64>("amount").expect("Failed to get amount"), 2.5);
    assert_eq!(
        event.get_as::<Uuid>("reference").expect("Failed to get reference"),
        reference
    );
    assert_eq!(
        event.get_as::<Vec<u8>>("payload").expect("Failed to get payload"),
        [0, 1, 2, 254, 255]
    );
    assert!(
        !event.get("created").expect("Failed to get created").is_null(),
        "Expression defaults are evaluated by the database"
    );

    // Temporal filters
    let after = PrimitiveDateTime::new(
        Date::from_calendar_date(2024, Month::January, 1).expect("Invalid date"),
        Time::MIDNIGHT,
    );
    assert_eq!(
        events
            .count(connection, Filter::new().gt("happened", after))
            .await
            .expect("Failed to count"),
        1
    );
    assert_eq!(
        events
            .count(connection, Filter::new().eq("active", false))
            .await
            .expect("Failed to count"),
        0
    );
}

#[cfg(not(feature = "disable-transactions"))]
pub async fn transactions<C: Connection>(connection: &mut C) {
    use rowbind::Transaction;

    // Setup
    connection
        .execute(
            r#"
            DROP TABLE IF EXISTS "transaction_entry";
            CREATE TABLE "transaction_entry" ("id" INTEGER PRIMARY KEY, "label" TEXT NOT NULL);
            "#
            .into(),
        )
        .await
        .expect("Failed to create the transaction_entry table");
    let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
    let entries = TableBinding::bind(connection, &cache, "transaction_entry")
        .await
        .expect("Failed to bind the transaction_entry table");

    // Rollback
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    for label in ["one", "two"] {
        let mut entry = entries.new_record();
        entry.set_value(label).expect("Failed to set the label");
        entry
            .commit(&mut transaction)
            .await
            .expect("Failed to insert in the transaction");
    }
    assert_eq!(
        entries
            .count(&mut transaction, Filter::new())
            .await
            .expect("Failed to count in the transaction"),
        2
    );
    transaction
        .rollback()
        .await
        .expect("Failed to roll back the transaction");
    assert_eq!(
        entries
            .count(connection, Filter::new())
            .await
            .expect("Failed to count"),
        0
    );

    // Commit
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    let mut entry = entries.new_record();
    entry.set_value("three").expect("Failed to set the label");
    let id = entry
        .commit(&mut transaction)
        .await
        .expect("Failed to insert in the transaction");
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    let entry = entries
        .find_by_pk(connection, id)
        .await
        .expect("Failed to look up the entry")
        .expect("The entry should exist");
    assert_eq!(entry.value().expect("Failed to get the label"), &Value::from("three"));

    // Dropped without commit
    silent_logs! {
        let mut transaction = connection
            .begin()
            .await
            .expect("Could not begin a transaction");
        let mut entry = entries.new_record();
        entry.set_value("four").expect("Failed to set the label");
        entry
            .commit(&mut transaction)
            .await
            .expect("Failed to insert in the transaction");
        drop(transaction);
    }
    assert_eq!(
        entries
            .count(connection, [("label", "four")])
            .await
            .expect("Failed to count"),
        0
    );
}
