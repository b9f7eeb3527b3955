//! Integration tests for the query executor and schema bootstrap

use catalog_common::db::{bootstrap_schema, connect, QueryExecutor, SchemaRegistry, SqlValue};
use catalog_common::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = connect(&dir.path().join("catalog.db"), 5).await.unwrap();
    bootstrap_schema(&pool, SchemaRegistry::catalog()).await.unwrap();
    (dir, pool)
}

fn product_fields(title: &str, slug: &str) -> Vec<(&'static str, SqlValue)> {
    vec![
        ("title", SqlValue::from(title)),
        ("description", SqlValue::from("A sturdy widget")),
        ("price", SqlValue::Real(9.5)),
        ("image", SqlValue::from("https://example.com/widget.png")),
        ("slug", SqlValue::from(slug)),
    ]
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pool = connect(&dir.path().join("nested").join("catalog.db"), 2)
        .await
        .unwrap();

    let first = bootstrap_schema(&pool, SchemaRegistry::catalog()).await.unwrap();
    assert_eq!(first.len(), SchemaRegistry::catalog().tables().len());

    let second = bootstrap_schema(&pool, SchemaRegistry::catalog()).await.unwrap();
    assert!(second.is_empty());

    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
    assert!(exec.has_table("products").await.unwrap());
    assert!(!exec.has_table("users").await.unwrap());
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    assert!(matches!(exec.query("   "), Err(Error::Query(_))));
}

#[tokio::test]
async fn test_execute_without_prepare_rejected() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    assert!(matches!(exec.execute(&[]).await, Err(Error::Execution(_))));
    assert!(matches!(exec.fetch(), Err(Error::Execution(_))));
}

#[tokio::test]
async fn test_parameter_count_mismatch_rejected() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    exec.query("SELECT * FROM products WHERE id = ? AND slug = ?")
        .unwrap();
    let result = exec.execute(&[SqlValue::Integer(1)]).await;
    assert!(matches!(result, Err(Error::Execution(_))));
}

#[tokio::test]
async fn test_prepare_execute_fetch_cycle() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    exec.query("INSERT INTO categories (name, slug) VALUES (?, ?)")
        .unwrap()
        .execute(&["garden".into(), "garden".into()])
        .await
        .unwrap();
    assert_eq!(exec.rows_affected(), 1);
    let id = exec.last_insert_id().unwrap();

    exec.query("SELECT id, name FROM categories WHERE slug = ?")
        .unwrap()
        .execute(&["garden".into()])
        .await
        .unwrap();
    let row = exec.fetch().unwrap().unwrap();
    assert_eq!(row["id"].as_i64(), Some(id));
    assert_eq!(row["name"].as_str(), Some("garden"));
    assert!(exec.fetch().unwrap().is_none());
}

#[tokio::test]
async fn test_insert_and_find_by_id_or_slug() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    let id = exec
        .insert("products", &product_fields("Blue Widget", "blue-widget"))
        .await
        .unwrap();

    let by_id = exec.find("products", &id.to_string()).await.unwrap().unwrap();
    assert_eq!(by_id["slug"].as_str(), Some("blue-widget"));
    assert_eq!(by_id["price"].as_f64(), Some(9.5));
    assert_eq!(by_id["status"].as_str(), Some("active"));

    let by_slug = exec.find("products", "blue-widget").await.unwrap().unwrap();
    assert_eq!(by_slug["id"].as_i64(), Some(id));

    assert!(exec.find("products", "missing").await.unwrap().is_none());
    assert!(exec.find("products", "999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_delete_count() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    exec.insert("products", &product_fields("One", "one")).await.unwrap();
    exec.insert("products", &product_fields("Two", "two")).await.unwrap();
    assert_eq!(exec.count("products", &[]).await.unwrap(), 2);

    let changed = exec
        .update(
            "products",
            &[("status", SqlValue::from("inactive"))],
            &[("slug", SqlValue::from("one"))],
        )
        .await
        .unwrap();
    assert_eq!(changed, 1);
    assert_eq!(
        exec.count("products", &[("status", "active".into())])
            .await
            .unwrap(),
        1
    );

    let rows = exec
        .select("products", &["title"], &[("status", "inactive".into())])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"].as_str(), Some("One"));

    let removed = exec
        .delete("products", &[("slug", "two".into())])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(exec.count("products", &[]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_identifiers_restricted_to_schema() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    let unknown_table = exec.select("users", &[], &[]).await;
    assert!(matches!(unknown_table, Err(Error::Config(_))));

    let unknown_column = exec
        .select("products", &[], &[("name; DROP TABLE products", "x".into())])
        .await;
    assert!(matches!(unknown_column, Err(Error::Query(_))));

    let empty_insert = exec.insert("products", &[]).await;
    assert!(matches!(empty_insert, Err(Error::Query(_))));

    let unconditioned_delete = exec.delete("products", &[]).await;
    assert!(matches!(unconditioned_delete, Err(Error::Query(_))));
}

#[tokio::test]
async fn test_transaction_state_errors() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    assert!(matches!(exec.commit().await, Err(Error::TransactionState(_))));
    assert!(matches!(exec.roll_back().await, Err(Error::TransactionState(_))));

    exec.begin_transaction().await.unwrap();
    assert!(exec.in_transaction());
    assert!(matches!(
        exec.begin_transaction().await,
        Err(Error::TransactionState(_))
    ));

    exec.commit().await.unwrap();
    assert!(!exec.in_transaction());
}

#[tokio::test]
async fn test_rollback_after_insert_leaves_nothing_visible() {
    let (_dir, pool) = setup().await;

    {
        let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
        exec.begin_transaction().await.unwrap();

        let product_id = exec
            .insert("products", &product_fields("Ghost", "ghost"))
            .await
            .unwrap();
        let category_id = exec
            .insert("categories", &[("name", "spooky".into()), ("slug", "spooky".into())])
            .await
            .unwrap();
        exec.insert(
            "product_category",
            &[
                ("category_id", SqlValue::Integer(category_id)),
                ("product_id", SqlValue::Integer(product_id)),
            ],
        )
        .await
        .unwrap();

        exec.roll_back().await.unwrap();
    }

    let mut fresh = QueryExecutor::acquire(&pool).await.unwrap();
    assert!(fresh.find("products", "ghost").await.unwrap().is_none());
    assert_eq!(fresh.count("categories", &[]).await.unwrap(), 0);
    assert_eq!(fresh.count("product_category", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_drop_inside_transaction_discards_writes() {
    let (_dir, pool) = setup().await;

    {
        let mut exec = QueryExecutor::acquire(&pool).await.unwrap();
        exec.begin_transaction().await.unwrap();
        exec.insert("products", &product_fields("Abandoned", "abandoned"))
            .await
            .unwrap();
    }

    let mut fresh = QueryExecutor::acquire(&pool).await.unwrap();
    assert!(fresh.find("products", "abandoned").await.unwrap().is_none());
}

#[tokio::test]
async fn test_drop_table_then_recreate() {
    let (_dir, pool) = setup().await;
    let mut exec = QueryExecutor::acquire(&pool).await.unwrap();

    exec.drop_table("rate_limit_windows").await.unwrap();
    assert!(!exec.has_table("rate_limit_windows").await.unwrap());

    let definition = SchemaRegistry::catalog().table("rate_limit_windows").unwrap();
    exec.create_table(definition).await.unwrap();
    exec.create_table(definition).await.unwrap();
    assert!(exec.has_table("rate_limit_windows").await.unwrap());

    assert!(matches!(exec.drop_table("users").await, Err(Error::Config(_))));
}
