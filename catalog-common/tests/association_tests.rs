//! Integration tests for category association management

use catalog_common::db::{
    bootstrap_schema, connect, Association, AssociationManager, QueryExecutor, SchemaRegistry,
    SqlValue,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = connect(&dir.path().join("catalog.db"), 5).await.unwrap();
    bootstrap_schema(&pool, SchemaRegistry::catalog()).await.unwrap();
    (dir, pool)
}

async fn insert_post(exec: &mut QueryExecutor, slug: &str) -> i64 {
    exec.insert(
        "posts",
        &[
            ("title", SqlValue::from("Hello")),
            ("content", SqlValue::from("Some words here")),
            ("image", SqlValue::from("https://example.com/a.png")),
            ("slug", SqlValue::from(slug)),
        ],
    )
    .await
    .unwrap()
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let mut manager = AssociationManager::new(&mut exec, Association::POST);

    let first = manager.get_or_create_category("Rust").await.unwrap();
    let second = manager.get_or_create_category("  rust ").await.unwrap();
    assert_eq!(first, second);

    let rows = exec
        .select("categories", &["name", "slug"], &[])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"].as_str(), Some("rust"));
    assert_eq!(rows[0]["slug"].as_str(), Some("rust"));
}

#[tokio::test]
async fn test_blank_category_rejected() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let mut manager = AssociationManager::new(&mut exec, Association::PRODUCT);

    assert!(matches!(
        manager.get_or_create_category("   ").await,
        Err(catalog_common::Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_link_skips_existing_pair() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let post_id = insert_post(&mut exec, "hello").await;

    let mut manager = AssociationManager::new(&mut exec, Association::POST);
    let category_id = manager.get_or_create_category("news").await.unwrap();

    assert!(manager.link(post_id, category_id).await.unwrap());
    assert!(!manager.link(post_id, category_id).await.unwrap());

    assert_eq!(exec.count("post_category", &[]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_replace_then_clear_leaves_no_links() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let post_id = insert_post(&mut exec, "hello").await;

    let mut manager = AssociationManager::new(&mut exec, Association::POST);
    let linked = manager
        .replace_categories(post_id, &names(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(linked.len(), 2);
    assert_eq!(manager.categories_of(post_id).await.unwrap(), names(&["a", "b"]));

    manager.replace_categories(post_id, &[]).await.unwrap();
    assert!(manager.categories_of(post_id).await.unwrap().is_empty());

    assert_eq!(
        exec.count("post_category", &[("post_id", SqlValue::Integer(post_id))])
            .await
            .unwrap(),
        0
    );
    // categories themselves are kept for reuse
    assert_eq!(exec.count("categories", &[]).await.unwrap(), 2);
}

#[tokio::test]
async fn test_variant_spellings_collapse_to_one_category() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let post_id = insert_post(&mut exec, "hello").await;

    exec.begin_transaction().await.unwrap();
    let mut manager = AssociationManager::new(&mut exec, Association::POST);
    let linked = manager
        .replace_categories(post_id, &names(&["Tech", "tech ", " TECH", ""]))
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    exec.commit().await.unwrap();

    let categories = exec.select("categories", &["name"], &[]).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["name"].as_str(), Some("tech"));
    assert_eq!(exec.count("post_category", &[]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unlink_all_is_scoped_to_entity() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    let first = insert_post(&mut exec, "first").await;
    let second = insert_post(&mut exec, "second").await;

    let mut manager = AssociationManager::new(&mut exec, Association::POST);
    manager.replace_categories(first, &names(&["x", "y"])).await.unwrap();
    manager.replace_categories(second, &names(&["x"])).await.unwrap();

    assert_eq!(manager.unlink_all(first).await.unwrap(), 2);
    assert!(manager.categories_of(first).await.unwrap().is_empty());
    assert_eq!(manager.categories_of(second).await.unwrap(), names(&["x"]));
}
