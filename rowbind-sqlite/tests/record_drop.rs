#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, Log, Metadata, Record as LogRecord};
    use rowbind::{
        Connection, Executor, RecordState, SchemaCache, SchemaCacheConfig, TableBinding, Value,
    };
    use rowbind_sqlite::SqliteConnection;
    use std::{mem, sync::Mutex};

    struct Capture;

    static CAPTURE: Capture = Capture;
    static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Warn
        }

        fn log(&self, record: &LogRecord) {
            if self.enabled(record.metadata()) {
                WARNINGS.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    fn take_warnings() -> Vec<String> {
        mem::take(&mut *WARNINGS.lock().unwrap())
    }

    #[tokio::test]
    async fn dropped_records() {
        log::set_logger(&CAPTURE).expect("Only this test installs a logger");
        log::set_max_level(LevelFilter::Warn);
        let mut connection = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in-memory database");
        connection
            .execute(
                r#"CREATE TABLE "memo" ("id" INTEGER PRIMARY KEY, "text" TEXT NOT NULL);"#.into(),
            )
            .await
            .expect("Failed to create the memo table");
        let cache = SchemaCache::new(SchemaCacheConfig::in_memory());
        let memos = TableBinding::bind(&mut connection, &cache, "memo")
            .await
            .expect("Failed to bind the memo table");
        take_warnings();

        // New record with values
        let mut record = memos.new_record();
        record.set("text", "draft").expect("Failed to set text");
        drop(record);
        let warnings = take_warnings();
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(warnings[0].contains("New record of `memo`"), "{}", warnings[0]);
        assert!(warnings[0].contains("pending values for `text`"), "{}", warnings[0]);

        // Clean records
        drop(memos.new_record());
        let mut record = memos.new_record();
        record.set("text", "kept").expect("Failed to set text");
        let id = record
            .commit(&mut connection)
            .await
            .expect("Failed to insert the memo");
        assert_eq!(record.state(), RecordState::Clean);
        drop(record);
        let mut record = memos.new_record();
        record.set("text", "thrown away").expect("Failed to set text");
        record.discard();
        drop(record);
        assert_eq!(take_warnings(), Vec::<String>::new());

        // Stored record with values
        let mut record = memos
            .find_by_pk(&mut connection, id.clone())
            .await
            .expect("Failed to look up the memo")
            .expect("The memo should exist");
        record.set("text", "edited").expect("Failed to set text");
        assert_eq!(record.state(), RecordState::Dirty);
        drop(record);
        let warnings = take_warnings();
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(
            warnings[0].contains(&format!("Record {} of `memo`", id)),
            "{}",
            warnings[0]
        );
        assert!(warnings[0].contains("pending values for `text`"), "{}", warnings[0]);

        // Stored record with a pending delete
        let mut record = memos
            .find_by_pk(&mut connection, id.clone())
            .await
            .expect("Failed to look up the memo")
            .expect("The memo should exist");
        record.delete().expect("Failed to mark the delete");
        drop(record);
        let warnings = take_warnings();
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(warnings[0].contains("a pending delete"), "{}", warnings[0]);

        // Deleted record
        let mut record = memos
            .find_by_pk(&mut connection, id.clone())
            .await
            .expect("Failed to look up the memo")
            .expect("The memo should exist");
        record.delete().expect("Failed to mark the delete");
        record
            .commit(&mut connection)
            .await
            .expect("Failed to delete the memo");
        assert_eq!(record.state(), RecordState::Deleted);
        drop(record);
        assert_eq!(take_warnings(), Vec::<String>::new());
        assert!(
            memos
                .find_by_pk(&mut connection, id)
                .await
                .expect("Failed to look up the memo")
                .is_none()
        );
        assert_eq!(
            memos
                .count(&mut connection, [("text", Value::from("kept"))])
                .await
                .expect("Failed to count"),
            0
        );
    }
}
