use plan_store::{DatabaseConfig, Dialect, ExecutorConfig, PoolConfig, StorageConfig};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn deserializes_pool_and_executor_settings() {
    let payload = json!({
        "database": { "backend": "mysql", "url": "mysql://plan:secret@db:3306/plan" },
        "pool": {
            "max_connections": 8,
            "min_connections": 1,
            "connect_timeout_ms": 1000,
            "acquire_timeout_ms": 500,
            "idle_timeout_ms": 60000
        },
        "executor": { "shutdown_grace_ms": 2500, "batch_chunk_rows": 512 }
    });
    let config: StorageConfig = serde_json::from_value(payload).expect("config");
    assert_eq!(config.dialect(), Dialect::Mysql);
    let pool = config.pool.clone().expect("pool");
    assert_eq!(pool.max_connections, Some(8));
    assert_eq!(pool.min_connections, Some(1));
    assert_eq!(pool.connect_timeout_ms, Some(1000));
    assert_eq!(pool.acquire_timeout_ms, Some(500));
    assert_eq!(pool.idle_timeout_ms, Some(60000));
    assert_eq!(config.shutdown_grace().as_millis(), 2500);
    assert_eq!(config.batch_chunk_rows(), 512);
    assert_eq!(
        config.target_description(std::path::Path::new(".")),
        "mysql://plan:***@db:3306/plan"
    );
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let config: StorageConfig = serde_json::from_value(json!({
        "database": { "backend": "sqlite", "path": null }
    }))
    .expect("config");
    match &config.database {
        DatabaseConfig::Sqlite { path } => assert!(path.is_none()),
        _ => panic!("expected sqlite backend"),
    }
    assert!(config.pool.is_none());
    assert_eq!(config.shutdown_grace().as_millis(), 10_000);
    assert_eq!(config.batch_chunk_rows(), 2_048);
}

#[test]
fn load_or_init_writes_then_reads_back() {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let written = plan_store::load_or_init_config(base).expect("init");
    assert!(base.join("plan-db.json").exists());
    assert_eq!(written.dialect(), Dialect::Sqlite);

    let edited = StorageConfig {
        database: DatabaseConfig::Postgres {
            url: "postgres://plan@localhost/plan".to_string(),
        },
        pool: Some(PoolConfig {
            max_connections: Some(4),
            ..PoolConfig::default()
        }),
        executor: Some(ExecutorConfig::with_defaults()),
    };
    std::fs::write(
        base.join("plan-db.json"),
        serde_json::to_string_pretty(&edited).expect("encode"),
    )
    .expect("write");
    let loaded = plan_store::load_or_init_config(base).expect("load");
    assert_eq!(loaded.database, edited.database);
    assert_eq!(loaded.pool.and_then(|pool| pool.max_connections), Some(4));
}

#[test]
fn unreadable_config_is_a_config_error() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("plan-db.json"), "{ not json").expect("write");
    let err = plan_store::load_or_init_config(dir.path()).expect_err("broken file");
    assert!(matches!(err, plan_store::PlanError::Config { .. }));
}
