/// Integration tests for schema migrations
///
/// Skipped when `DATABASE_URL` is unset.

use codereason_shared::db::migrations::{
    ensure_database_exists, get_migration_status, known_versions, run_migrations,
};
use codereason_shared::db::pool::{close_pool, create_pool, DatabaseConfig};

#[tokio::test]
async fn test_run_migrations_is_idempotent() {
    let Ok(url) = std::env::var("DATABASE_URL") else { return };

    ensure_database_exists(&url).await.expect("Failed to create database");
    let pool = create_pool(DatabaseConfig::from_url(url)).await.unwrap();

    run_migrations(&pool).await.expect("First migration run failed");
    let first = get_migration_status(&pool).await.unwrap();

    run_migrations(&pool).await.expect("Second migration run failed");
    let second = get_migration_status(&pool).await.unwrap();

    assert!(first.is_up_to_date);
    assert_eq!(first, second);
    assert_eq!(first.latest_version, known_versions().last().copied());

    close_pool(pool).await;
}

#[tokio::test]
async fn test_schema_has_core_tables() {
    let Ok(url) = std::env::var("DATABASE_URL") else { return };
    let pool = create_pool(DatabaseConfig::from_url(url)).await.unwrap();
    run_migrations(&pool).await.unwrap();

    for table in [
        "users",
        "organizations",
        "organization_members",
        "workspaces",
        "workspace_members",
        "repositories",
        "analyses",
        "chat_sessions",
        "chat_messages",
        "invitations",
        "workspace_invitations",
        "referrals",
        "credits",
        "user_notifications",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} is missing", table);
    }

    close_pool(pool).await;
}
