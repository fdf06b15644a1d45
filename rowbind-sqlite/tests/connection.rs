#[cfg(test)]
mod tests {
    use rowbind_core::{Connection, Credentials, Executor, QueryResult, Value, stream::StreamExt};
    use rowbind_sqlite::SqliteConnection;
    use rowbind_tests::{init_logs, silent_logs};
    use std::{path::Path, sync::Mutex};
    use tokio::fs;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        let connection = SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        assert!(!connection.is_ephemeral());
        assert!(connection.database_id().starts_with("sqlite://"));
        assert!(connection.database_id().ends_with("creation.sqlite"));
        let read_only = SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH))
            .await
            .expect("Could not open the database");
        assert_eq!(
            read_only.database_id(),
            connection.database_id(),
            "Same file, same identity"
        );
        drop(read_only);
        drop(connection);
        let credentials = Credentials::file("sqlite", DB_PATH);
        SqliteConnection::connect_with(&credentials)
            .await
            .expect("Could not open the database from credentials");
        fs::remove_file(DB_PATH)
            .await
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH))
                    .await
                    .is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                SqliteConnection::connect("duckdb://some_value")
                    .await
                    .is_err()
            );
        };
    }

    #[tokio::test]
    async fn in_memory() {
        init_logs();
        let mut first = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in-memory database");
        let second = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in-memory database");
        assert!(first.is_ephemeral());
        assert!(second.is_ephemeral());
        assert_ne!(
            first.database_id(),
            second.database_id(),
            "Every in-memory database is a different one"
        );

        let affected = first
            .execute(
                r#"
                CREATE TABLE "counter" ("id" INTEGER PRIMARY KEY, "value" INTEGER NOT NULL);
                INSERT INTO "counter" ("value") VALUES (1), (2), (3);
                UPDATE "counter" SET "value" = "value" * 10 WHERE "value" > 1;
                "#
                .into(),
            )
            .await
            .expect("Failed to run the statements");
        assert_eq!(affected.rows_affected, 5);
        assert_eq!(affected.last_affected_id, Some(3));

        let results = first
            .run(r#"SELECT "value" FROM "counter" ORDER BY "id"; DELETE FROM "counter";"#.into())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(results.len(), 4);
        let values = results
            .iter()
            .filter_map(|v| match v {
                Ok(QueryResult::Row(row)) => row.get_column("value").cloned(),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(values, [Value::Int64(1), Value::Int64(20), Value::Int64(30)]);
        assert!(matches!(
            results.last(),
            Some(Ok(QueryResult::Affected(v))) if v.rows_affected == 3
        ));

        silent_logs! {
            let error = first
                .execute(r#"INSERT INTO "counter" ("value") VALUES (NULL);"#.into())
                .await
                .expect_err("The value is not nullable");
            assert!(format!("{:#}", error).contains("NOT NULL"));
        }
        let error = first
            .describe_table("nothing")
            .await
            .expect_err("The table does not exist");
        assert!(format!("{:#}", error).contains("nothing"));
        let schema = first
            .describe_table("Counter")
            .await
            .expect("Table names are case insensitive");
        assert_eq!(schema.name(), "counter");
        assert_eq!(schema.column_names().collect::<Vec<_>>(), ["id", "value"]);
    }
}
