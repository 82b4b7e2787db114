mod support;

use pgembed::{MigrationMode, Settings, acquire_isolated_pool};

const SCHEMA: &str = "create table users (id int)";

#[tokio::test]
async fn isolated_pools_get_their_own_gateway_and_engine() {
    let engines = support::ScriptedEngines::new();
    let migrations = support::RecordingMigrations::executing(SCHEMA);
    let settings = Settings::development().with_gateway(support::gateway_config());

    let a = acquire_isolated_pool(&settings, engines.as_ref(), migrations.as_ref())
        .await
        .unwrap();
    let b = acquire_isolated_pool(&settings, engines.as_ref(), migrations.as_ref())
        .await
        .unwrap();

    let gateway_a = a.gateway().expect("isolated pools run on a gateway");
    let gateway_b = b.gateway().expect("isolated pools run on a gateway");
    assert_ne!(gateway_a.port(), gateway_b.port());
    assert_eq!(engines.created(), 2);

    assert_eq!(
        migrations.calls(),
        vec![
            (gateway_a.connection_string().to_string(), MigrationMode::WatchOnce),
            (gateway_b.connection_string().to_string(), MigrationMode::WatchOnce),
        ]
    );

    // Each engine saw its own schema statement and nothing from the other.
    for index in 0..2 {
        assert_eq!(engines.engine(index).forwarded_queries(), vec![SCHEMA]);
    }

    let client = a.pool().acquire().await.unwrap();
    client.simple_query("select 1").await.unwrap();
    drop(client);

    assert_eq!(engines.engine(0).forwarded_queries(), vec![SCHEMA, "select 1"]);
    assert_eq!(engines.engine(1).forwarded_queries(), vec![SCHEMA]);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn isolated_pool_ignores_database_url() {
    let engines = support::ScriptedEngines::new();
    let migrations = support::RecordingMigrations::new();
    let settings = Settings::development()
        .with_gateway(support::gateway_config())
        .with_database_url("postgres://app@127.0.0.1:1/app");

    let handle = acquire_isolated_pool(&settings, engines.as_ref(), migrations.as_ref())
        .await
        .unwrap();

    assert!(handle.gateway().is_some());
    assert_eq!(engines.created(), 1);
    assert_eq!(migrations.calls().len(), 1);

    handle.stop().await;
}

#[tokio::test]
async fn failed_migration_stops_the_isolated_gateway() {
    let engines = support::ScriptedEngines::new();
    let migrations = support::RecordingMigrations::failing_first(1, Default::default());
    let settings = Settings::development().with_gateway(support::gateway_config());

    let err = acquire_isolated_pool(&settings, engines.as_ref(), migrations.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, pgembed::AcquireError::Migration(_)));

    let (connection_string, _) = migrations.calls().remove(0);
    assert!(support::connect(&connection_string).await.is_err());
}
