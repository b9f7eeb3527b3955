//! Catalog entities (products and posts) and their write flows
//!
//! Every write runs inside one transaction on a single executor. Any error
//! rolls the transaction back, association rows included, before it is
//! returned.

use catalog_common::db::{Association, AssociationManager, QueryExecutor, Record, SqlValue};
use catalog_common::time::{now, sql_timestamp};
use catalog_common::to_slug;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::info;

use super::validation::{self, FieldRule, FieldSpec};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageInfo, PageRequest};

/// Static description of one entity kind
#[derive(Debug)]
pub struct EntityKind {
    pub table: &'static str,
    /// URL segment under `/api/v1`
    pub route: &'static str,
    pub singular: &'static str,
    pub plural: &'static str,
    pub association: Association,
    pub fields: &'static [FieldSpec],
}

const TITLE: FieldSpec = FieldSpec {
    name: "title",
    label: "Title",
    rule: FieldRule::Text { min_len: 2 },
};

const IMAGE: FieldSpec = FieldSpec {
    name: "image",
    label: "Image",
    rule: FieldRule::Url,
};

pub static PRODUCTS: EntityKind = EntityKind {
    table: "products",
    route: "products",
    singular: "Product",
    plural: "Products",
    association: Association::PRODUCT,
    fields: &[
        TITLE,
        FieldSpec {
            name: "description",
            label: "Description",
            rule: FieldRule::Text { min_len: 5 },
        },
        FieldSpec {
            name: "price",
            label: "Price",
            rule: FieldRule::Price,
        },
        IMAGE,
    ],
};

pub static POSTS: EntityKind = EntityKind {
    table: "posts",
    route: "posts",
    singular: "Post",
    plural: "Posts",
    association: Association::POST,
    fields: &[
        TITLE,
        FieldSpec {
            name: "content",
            label: "Content",
            rule: FieldRule::Text { min_len: 5 },
        },
        IMAGE,
    ],
};

impl EntityKind {
    fn not_found(&self) -> ApiError {
        ApiError::NotFound(format!("{} not found", self.singular))
    }

    fn validate(
        &self,
        input: &Map<String, Value>,
        require_all: bool,
    ) -> ApiResult<Vec<(&'static str, SqlValue)>> {
        validation::validate(self.fields, input, require_all).map_err(|errors| {
            ApiError::Validation {
                message: format!("{} validation failed", self.singular),
                errors,
            }
        })
    }
}

fn categories_from(input: &Map<String, Value>) -> ApiResult<Option<Vec<String>>> {
    validation::parse_categories(input.get("categories")).map_err(|errors| ApiError::Validation {
        message: "Validation failed".to_string(),
        errors,
    })
}

/// Attach the linked category names to a fetched row
async fn with_categories(
    exec: &mut QueryExecutor,
    kind: &EntityKind,
    mut record: Record,
) -> ApiResult<Value> {
    let id = record.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
    let names = AssociationManager::new(exec, kind.association)
        .categories_of(id)
        .await?;
    record.insert("categories".to_string(), Value::from(names));
    Ok(Value::Object(record))
}

async fn load(exec: &mut QueryExecutor, kind: &EntityKind, id: i64) -> ApiResult<Value> {
    let record = exec
        .find(kind.table, &id.to_string())
        .await?
        .ok_or_else(|| kind.not_found())?;
    with_categories(exec, kind, record).await
}

fn entity_id(record: &Record) -> ApiResult<i64> {
    record
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| catalog_common::Error::Internal("Row without id".to_string()).into())
}

/// Commit on success, roll back on failure
async fn settle<T>(exec: &mut QueryExecutor, outcome: ApiResult<T>) -> ApiResult<T> {
    match outcome {
        Ok(value) => match exec.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                exec.roll_back_if_active().await;
                Err(e.into())
            }
        },
        Err(e) => {
            exec.roll_back_if_active().await;
            Err(e)
        }
    }
}

/// Active entities with their categories, optionally restricted to one
/// category
pub async fn list(
    pool: &SqlitePool,
    kind: &EntityKind,
    page: PageRequest,
    category_id: Option<i64>,
) -> ApiResult<(Vec<Value>, PageInfo)> {
    let mut exec = QueryExecutor::acquire(pool).await?;
    exec.schema().table(kind.table)?;

    let mut filter = String::from(" WHERE e.status = 'active'");
    let mut params: Vec<SqlValue> = Vec::new();
    if let Some(category_id) = category_id {
        filter.push_str(&format!(
            " AND e.id IN (SELECT j.\"{}\" FROM \"{}\" j WHERE j.category_id = ?)",
            kind.association.entity_column, kind.association.join_table
        ));
        params.push(SqlValue::Integer(category_id));
    }

    exec.query(format!("SELECT COUNT(*) AS total FROM \"{}\" e{}", kind.table, filter))?
        .execute(&params)
        .await?;
    let total = exec
        .fetch()?
        .and_then(|row| row.get("total").and_then(|v| v.as_i64()))
        .unwrap_or(0);

    params.push(SqlValue::Integer(page.limit));
    params.push(SqlValue::Integer(page.offset));
    exec.query(format!(
        "SELECT e.* FROM \"{}\" e{} ORDER BY e.id ASC LIMIT ? OFFSET ?",
        kind.table, filter
    ))?
    .execute(&params)
    .await?;
    let rows = exec.fetch_all()?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(with_categories(&mut exec, kind, row).await?);
    }

    Ok((items, PageInfo::new(total, page)))
}

/// One entity by numeric id or slug
pub async fn find(pool: &SqlitePool, kind: &EntityKind, identifier: &str) -> ApiResult<Value> {
    let mut exec = QueryExecutor::acquire(pool).await?;
    let record = exec
        .find(kind.table, identifier)
        .await?
        .ok_or_else(|| kind.not_found())?;
    with_categories(&mut exec, kind, record).await
}

pub async fn create(pool: &SqlitePool, kind: &EntityKind, input: &Map<String, Value>) -> ApiResult<Value> {
    let mut fields = kind.validate(input, true)?;
    let categories = categories_from(input)?;

    let title = input.get("title").and_then(|v| v.as_str()).unwrap_or_default();
    fields.push(("slug", SqlValue::from(to_slug(title))));
    fields.push(("status", SqlValue::from("active")));

    let mut exec = QueryExecutor::acquire(pool).await?;
    exec.begin_transaction().await?;
    let outcome = insert_with_categories(&mut exec, kind, &fields, categories.as_deref()).await;
    let id = settle(&mut exec, outcome).await?;

    info!("Created {} {}", kind.singular.to_lowercase(), id);
    load(&mut exec, kind, id).await
}

async fn insert_with_categories(
    exec: &mut QueryExecutor,
    kind: &EntityKind,
    fields: &[(&str, SqlValue)],
    categories: Option<&[String]>,
) -> ApiResult<i64> {
    let id = exec.insert(kind.table, fields).await?;
    if let Some(names) = categories {
        AssociationManager::new(exec, kind.association)
            .replace_categories(id, names)
            .await?;
    }
    Ok(id)
}

/// Row for `identifier`, read inside the caller's transaction
async fn locate(exec: &mut QueryExecutor, kind: &EntityKind, identifier: &str) -> ApiResult<Record> {
    exec.find(kind.table, identifier)
        .await?
        .ok_or_else(|| kind.not_found())
}

/// Full replacement: every field required, categories always replaced
pub async fn replace(
    pool: &SqlitePool,
    kind: &EntityKind,
    identifier: &str,
    input: &Map<String, Value>,
) -> ApiResult<Value> {
    let mut exec = QueryExecutor::acquire(pool).await?;
    exec.begin_transaction().await?;
    let outcome = replace_locked(&mut exec, kind, identifier, input).await;
    let id = settle(&mut exec, outcome).await?;

    load(&mut exec, kind, id).await
}

async fn replace_locked(
    exec: &mut QueryExecutor,
    kind: &EntityKind,
    identifier: &str,
    input: &Map<String, Value>,
) -> ApiResult<i64> {
    let id = entity_id(&locate(exec, kind, identifier).await?)?;

    let fields = kind.validate(input, true)?;
    let categories = categories_from(input)?.unwrap_or_default();

    update_with_categories(exec, kind, id, fields, Some(&categories)).await?;
    Ok(id)
}

/// Partial update: only supplied fields, categories only when present
pub async fn patch(
    pool: &SqlitePool,
    kind: &EntityKind,
    identifier: &str,
    input: &Map<String, Value>,
) -> ApiResult<Value> {
    let mut exec = QueryExecutor::acquire(pool).await?;
    exec.begin_transaction().await?;
    let outcome = patch_locked(&mut exec, kind, identifier, input).await;
    let id = settle(&mut exec, outcome).await?;

    load(&mut exec, kind, id).await
}

async fn patch_locked(
    exec: &mut QueryExecutor,
    kind: &EntityKind,
    identifier: &str,
    input: &Map<String, Value>,
) -> ApiResult<i64> {
    let id = entity_id(&locate(exec, kind, identifier).await?)?;

    let fields = kind.validate(input, false)?;
    let categories = categories_from(input)?;

    // Nothing to change; updated_at stays as is
    if fields.is_empty() && categories.is_none() {
        return Ok(id);
    }

    update_with_categories(exec, kind, id, fields, categories.as_deref()).await?;
    Ok(id)
}

async fn update_with_categories(
    exec: &mut QueryExecutor,
    kind: &EntityKind,
    id: i64,
    mut fields: Vec<(&'static str, SqlValue)>,
    categories: Option<&[String]>,
) -> ApiResult<()> {
    if !fields.is_empty() {
        let slug = fields
            .iter()
            .find(|(name, _)| *name == "title")
            .and_then(|(_, value)| match value {
                SqlValue::Text(title) => Some(to_slug(title)),
                _ => None,
            });
        if let Some(slug) = slug {
            fields.push(("slug", SqlValue::from(slug)));
        }
        fields.push(("updated_at", SqlValue::from(sql_timestamp(now()))));

        let updated = exec
            .update(kind.table, &fields, &[("id", SqlValue::Integer(id))])
            .await?;
        if updated == 0 {
            return Err(kind.not_found());
        }
    }

    if let Some(names) = categories {
        AssociationManager::new(exec, kind.association)
            .replace_categories(id, names)
            .await?;
    }
    Ok(())
}

/// Remove links, then the entity
pub async fn delete(pool: &SqlitePool, kind: &EntityKind, identifier: &str) -> ApiResult<()> {
    let mut exec = QueryExecutor::acquire(pool).await?;
    exec.begin_transaction().await?;
    let outcome = delete_locked(&mut exec, kind, identifier).await;
    let id = settle(&mut exec, outcome).await?;

    info!("Deleted {} {}", kind.singular.to_lowercase(), id);
    Ok(())
}

async fn delete_locked(exec: &mut QueryExecutor, kind: &EntityKind, identifier: &str) -> ApiResult<i64> {
    let id = entity_id(&locate(exec, kind, identifier).await?)?;

    AssociationManager::new(exec, kind.association)
        .unlink_all(id)
        .await?;
    exec.delete(kind.table, &[("id", SqlValue::Integer(id))]).await?;
    Ok(id)
}
