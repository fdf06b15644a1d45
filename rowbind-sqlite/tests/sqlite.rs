#[cfg(test)]
mod tests {
    use rowbind_sqlite::SqliteConnection;
    use rowbind_tests::{execute_tests, init_logs};
    use std::{path::Path, sync::Mutex};
    use tokio::fs;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sqlite() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).await.expect(
                format!("Failed to remove existing test database file {}", DB_PATH).as_str(),
            );
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        execute_tests::<SqliteConnection>(
            &format!("sqlite://{}?mode=rwc", DB_PATH),
            "sqlite://:memory:",
        )
        .await;
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created by the connection"
        );
    }
}
