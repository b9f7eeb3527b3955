//! Many-to-many category links
//!
//! Products and posts share the `categories` table through their own join
//! table. Category names are normalised (trimmed, lowercased) and created
//! lazily the first time an entity references them.

use std::collections::HashSet;

use tracing::debug;

use crate::db::executor::QueryExecutor;
use crate::db::value::SqlValue;
use crate::slug::to_slug;
use crate::{Error, Result};

/// Join table between one entity table and `categories`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub join_table: &'static str,
    pub entity_column: &'static str,
}

impl Association {
    pub const PRODUCT: Association = Association {
        join_table: "product_category",
        entity_column: "product_id",
    };

    pub const POST: Association = Association {
        join_table: "post_category",
        entity_column: "post_id",
    };
}

/// Trim and lowercase a category name
pub fn normalize_category(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct AssociationManager<'a> {
    executor: &'a mut QueryExecutor,
    association: Association,
}

impl<'a> AssociationManager<'a> {
    pub fn new(executor: &'a mut QueryExecutor, association: Association) -> Self {
        Self {
            executor,
            association,
        }
    }

    /// Id of the category with this (normalised) name, creating it if absent.
    ///
    /// Check-then-insert. Run inside a transaction so the `BEGIN IMMEDIATE`
    /// write lock keeps concurrent callers from creating duplicates.
    pub async fn get_or_create_category(&mut self, name: &str) -> Result<i64> {
        let name = normalize_category(name);
        if name.is_empty() {
            return Err(Error::InvalidInput("Category name cannot be empty".to_string()));
        }

        let existing = self
            .executor
            .select("categories", &["id"], &[("name", SqlValue::from(name.as_str()))])
            .await?;

        if let Some(id) = existing.first().and_then(|row| row.get("id")).and_then(|v| v.as_i64()) {
            return Ok(id);
        }

        let slug = to_slug(&name);
        let id = self
            .executor
            .insert(
                "categories",
                &[("name", SqlValue::from(name.as_str())), ("slug", SqlValue::from(slug))],
            )
            .await?;

        debug!(category = %name, id, "Created category");
        Ok(id)
    }

    /// Link an entity to a category unless the pair already exists.
    /// Returns `true` when a new link row was written.
    pub async fn link(&mut self, entity_id: i64, category_id: i64) -> Result<bool> {
        let pair = [
            ("category_id", SqlValue::Integer(category_id)),
            (self.association.entity_column, SqlValue::Integer(entity_id)),
        ];

        if self.executor.count(self.association.join_table, &pair).await? > 0 {
            return Ok(false);
        }

        self.executor.insert(self.association.join_table, &pair).await?;
        Ok(true)
    }

    /// Drop every link of `entity_id`, then link it to `names`.
    ///
    /// Names are normalised; blanks and duplicates are skipped. Returns the
    /// linked category ids in first-seen order.
    pub async fn replace_categories(&mut self, entity_id: i64, names: &[String]) -> Result<Vec<i64>> {
        self.unlink_all(entity_id).await?;

        let mut seen = HashSet::new();
        let mut linked = Vec::new();
        for name in names {
            let name = normalize_category(name);
            if name.is_empty() || !seen.insert(name.clone()) {
                continue;
            }

            let category_id = self.get_or_create_category(&name).await?;
            self.link(entity_id, category_id).await?;
            linked.push(category_id);
        }

        Ok(linked)
    }

    /// Names of the categories linked to `entity_id`, ordered by name
    pub async fn categories_of(&mut self, entity_id: i64) -> Result<Vec<String>> {
        let join = self.executor.schema().table(self.association.join_table)?;
        join.require_column(self.association.entity_column)?;

        let sql = format!(
            "SELECT c.name AS name FROM categories c \
             INNER JOIN \"{}\" j ON j.category_id = c.id \
             WHERE j.\"{}\" = ? ORDER BY c.name",
            self.association.join_table, self.association.entity_column
        );

        self.executor
            .query(sql)?
            .execute(&[SqlValue::Integer(entity_id)])
            .await?;

        Ok(self
            .executor
            .fetch_all()?
            .into_iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    /// Remove all links of `entity_id`; returns the number removed
    pub async fn unlink_all(&mut self, entity_id: i64) -> Result<u64> {
        self.executor
            .delete(
                self.association.join_table,
                &[(self.association.entity_column, SqlValue::Integer(entity_id))],
            )
            .await
    }
}
