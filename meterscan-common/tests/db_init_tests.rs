//! Database initialization tests against on-disk databases

use meterscan_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("meterscan.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let result = init_database(&url).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("meterscan.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let pool1 = init_database(&url).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&url).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_missing_database_without_create_mode_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("absent.db");
    let url = format!("sqlite://{}", db_path.display());

    assert!(init_database(&url).await.is_err());
}
