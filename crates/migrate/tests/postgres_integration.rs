//! End-to-end checks against a live PostgreSQL server.
//!
//! Set `TEST_DATABASE_URL` to run them; without it every test returns early.

use rivet_migrate::{
    BatchStatus, Database, MigrateError, MigrationConfig, MigrationRollback, MigrationRunner,
    PgExecutor, PoolConfig, Query, StatementExecutor,
};
use serial_test::serial;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const TABLE: &str = "rivet_it_schema_migrations";

struct Harness {
    _dir: TempDir,
    database: Arc<Database>,
    executor: Arc<PgExecutor>,
    runner: MigrationRunner,
}

async fn harness() -> Option<Harness> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let dir = TempDir::new().unwrap();
    let database = Arc::new(Database::new(url, PoolConfig::default()));
    let executor = Arc::new(PgExecutor::new(database.clone()));
    let config = MigrationConfig {
        migrations_dir: dir.path().to_path_buf(),
        migrations_table: TABLE.to_string(),
    };
    let runner = MigrationRunner::new(&config, executor.clone()).unwrap();

    runner.setup().await.unwrap();
    executor
        .execute_batch(
            &[
                Query::raw("DROP TABLE IF EXISTS rivet_it_authors"),
                Query::raw("DROP TABLE IF EXISTS rivet_it_books"),
            ]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();

    Some(Harness {
        _dir: dir,
        database,
        executor,
        runner,
    })
}

fn write(h: &Harness, file: &str, up: &str, down: &str) {
    let content = format!("-- migrate:up\n{}\n-- migrate:down\n{}\n", up, down);
    fs::write(h.runner.catalog().migrations_dir().join(file), content).unwrap();
}

async fn table_exists(h: &Harness, table: &str) -> bool {
    let query = Query::bound(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1",
        [table],
    );
    !h.executor.fetch_column(&query).await.unwrap().is_empty()
}

async fn versions(h: &Harness) -> Vec<String> {
    h.runner
        .store()
        .applied(h.executor.as_ref())
        .await
        .unwrap()
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

#[tokio::test]
#[serial]
async fn migrate_and_rollback_round_trip() {
    let Some(h) = harness().await else {
        return;
    };
    write(
        &h,
        "20200101000000_authors.sql",
        "CREATE TABLE rivet_it_authors (id serial PRIMARY KEY, name text);",
        "DROP TABLE rivet_it_authors;",
    );
    write(
        &h,
        "20200102000000_books.sql",
        "CREATE TABLE rivet_it_books (id serial PRIMARY KEY);\n\
         INSERT INTO rivet_it_authors (name) VALUES ('semi;colon');",
        "DROP TABLE rivet_it_books;",
    );

    let result = h.runner.run(None).await.unwrap();
    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(versions(&h).await, ["20200101000000", "20200102000000"]);
    assert!(table_exists(&h, "rivet_it_books").await);

    let again = h.runner.run(None).await.unwrap();
    assert_eq!(again.status, BatchStatus::UpToDate);

    h.runner.rollback(Some(&"20200101000000".parse().unwrap())).await.unwrap();
    assert!(versions(&h).await.is_empty());
    assert!(!table_exists(&h, "rivet_it_authors").await);

    h.database.close().await;
}

#[tokio::test]
#[serial]
async fn failed_batch_leaves_no_trace() {
    let Some(h) = harness().await else {
        return;
    };
    write(
        &h,
        "20200101000000_authors.sql",
        "CREATE TABLE rivet_it_authors (id serial PRIMARY KEY);",
        "DROP TABLE rivet_it_authors;",
    );
    write(
        &h,
        "20200102000000_broken.sql",
        "SELECT * FROM rivet_it_table_that_does_not_exist;",
        "",
    );

    let err = h.runner.run(None).await.unwrap_err();

    assert!(matches!(err, MigrateError::Execution(_)));
    assert!(versions(&h).await.is_empty());
    assert!(!table_exists(&h, "rivet_it_authors").await);

    h.database.close().await;
}

#[tokio::test]
#[serial]
async fn unreachable_server_is_a_connection_error() {
    if std::env::var("TEST_DATABASE_URL").is_err() {
        return;
    }
    let mut config = PoolConfig::default();
    config.acquire_timeout = 1;
    let database = Arc::new(Database::new("postgres://rivet@127.0.0.1:1/none", config));
    let executor = PgExecutor::new(database.clone());

    let err = executor.fetch_column(&Query::raw("SELECT 1::text")).await.unwrap_err();
    assert!(matches!(err, MigrateError::Connection(_)));
    assert!(!database.is_connected());
}
