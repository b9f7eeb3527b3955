//! Table Schema Definitions
//!
//! Single source of truth for the catalog database tables. Besides driving
//! first-run bootstrap, the registry is the allow-list the query executor
//! checks every table and column identifier against before interpolating it
//! into SQL.
//!
//! # Usage
//!
//! ```rust,ignore
//! let schema = SchemaRegistry::catalog();
//! let products = schema.table("products")?;
//! executor.create_table(products).await?;
//! ```

use once_cell::sync::Lazy;

use crate::{Error, Result};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL", "TIMESTAMP")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// AUTOINCREMENT (only meaningful on an INTEGER PRIMARY KEY)
    pub autoincrement: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// DEFAULT value (raw SQL expression)
    pub default_value: Option<String>,
    /// Trailing raw constraint, e.g. a CHECK clause
    pub check: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            autoincrement: false,
            unique: false,
            default_value: None,
            check: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as PRIMARY KEY AUTOINCREMENT
    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Attach a CHECK expression
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    /// Render the type/constraint part of the column, e.g.
    /// `INTEGER PRIMARY KEY AUTOINCREMENT`
    pub fn type_and_constraints(&self) -> String {
        let mut sql = self.sql_type.clone();
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.autoincrement {
            sql.push_str(" AUTOINCREMENT");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" CHECK ({})", check));
        }
        sql
    }
}

/// One table: ordered columns plus raw table-level constraint lines
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<String>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, line: impl Into<String>) -> Self {
        self.constraints.push(line.into());
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Fail with a query error unless `name` is a column of this table
    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(Error::Query(format!(
                "Column '{}' is not defined for table '{}'",
                name, self.name
            )))
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this definition
    pub fn create_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.type_and_constraints()))
            .collect();
        lines.extend(self.constraints.iter().cloned());

        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
            self.name,
            lines.join(",\n    ")
        )
    }
}

/// Allow-listed schema description
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableDefinition>,
}

static CATALOG_SCHEMA: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::build_catalog);

impl SchemaRegistry {
    pub fn new(tables: Vec<TableDefinition>) -> Self {
        Self { tables }
    }

    /// The catalog service schema
    pub fn catalog() -> &'static SchemaRegistry {
        &CATALOG_SCHEMA
    }

    /// Look up a table; unknown tables are a configuration error
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::Config(format!("No schema entry for table '{}'", name)))
    }

    /// Tables in creation order (referenced tables first)
    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    fn build_catalog() -> SchemaRegistry {
        SchemaRegistry::new(vec![
            entity_table("products", &[("description", "TEXT"), ("price", "REAL")]),
            entity_table("posts", &[("content", "TEXT")]),
            TableDefinition::new("categories")
                .column(ColumnDefinition::new("id", "INTEGER").autoincrement())
                .column(ColumnDefinition::new("name", "TEXT").not_null())
                .column(ColumnDefinition::new("slug", "TEXT").not_null())
                .column(timestamp_column("created_at"))
                .column(timestamp_column("updated_at")),
            join_table("product_category", "product_id", "products"),
            join_table("post_category", "post_id", "posts"),
            TableDefinition::new("rate_limit_windows")
                .column(ColumnDefinition::new("key", "TEXT").primary_key())
                .column(ColumnDefinition::new("fingerprint", "TEXT").not_null())
                .column(ColumnDefinition::new("window_kind", "TEXT").not_null())
                .column(ColumnDefinition::new("timestamps", "TEXT").not_null())
                .column(ColumnDefinition::new("expires_at", "INTEGER").not_null()),
        ])
    }
}

fn timestamp_column(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, "TIMESTAMP")
        .not_null()
        .default("CURRENT_TIMESTAMP")
}

/// Entity tables share id/title/image/slug/status/timestamps; `extra`
/// columns are NOT NULL and go between title and image
fn entity_table(name: &str, extra: &[(&str, &str)]) -> TableDefinition {
    let mut table = TableDefinition::new(name)
        .column(ColumnDefinition::new("id", "INTEGER").autoincrement())
        .column(ColumnDefinition::new("title", "TEXT").not_null());

    for (column, sql_type) in extra {
        table = table.column(ColumnDefinition::new(*column, *sql_type).not_null());
    }

    table
        .column(ColumnDefinition::new("image", "TEXT").not_null())
        .column(ColumnDefinition::new("slug", "TEXT").not_null())
        .column(
            ColumnDefinition::new("status", "TEXT")
                .not_null()
                .default("'active'")
                .check("status IN ('active', 'inactive')"),
        )
        .column(timestamp_column("created_at"))
        .column(timestamp_column("updated_at"))
}

fn join_table(name: &str, entity_column: &str, entity_table: &str) -> TableDefinition {
    TableDefinition::new(name)
        .column(ColumnDefinition::new("category_id", "INTEGER").not_null())
        .column(ColumnDefinition::new(entity_column, "INTEGER").not_null())
        .constraint(format!("PRIMARY KEY (category_id, {})", entity_column))
        .constraint("FOREIGN KEY (category_id) REFERENCES categories(id)")
        .constraint(format!(
            "FOREIGN KEY ({}) REFERENCES {}(id)",
            entity_column, entity_table
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_tables_present() {
        let schema = SchemaRegistry::catalog();
        for name in [
            "products",
            "posts",
            "categories",
            "product_category",
            "post_category",
            "rate_limit_windows",
        ] {
            assert!(schema.table(name).is_ok(), "missing table {}", name);
        }
    }

    #[test]
    fn test_unknown_table_is_config_error() {
        let err = SchemaRegistry::catalog().table("users").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_column_is_query_error() {
        let products = SchemaRegistry::catalog().table("products").unwrap();
        assert!(products.require_column("price").is_ok());
        assert!(matches!(
            products.require_column("content"),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_column_rendering() {
        let id = ColumnDefinition::new("id", "INTEGER").autoincrement();
        assert_eq!(id.type_and_constraints(), "INTEGER PRIMARY KEY AUTOINCREMENT");

        let status = ColumnDefinition::new("status", "TEXT")
            .not_null()
            .default("'active'");
        assert_eq!(status.type_and_constraints(), "TEXT NOT NULL DEFAULT 'active'");
    }

    #[test]
    fn test_create_sql_includes_constraint_lines() {
        let table = SchemaRegistry::catalog().table("product_category").unwrap();
        let sql = table.create_sql();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"product_category\""));
        assert!(sql.contains("PRIMARY KEY (category_id, product_id)"));
        assert!(sql.contains("FOREIGN KEY (product_id) REFERENCES products(id)"));
    }

    #[test]
    fn test_entity_columns_in_order() {
        let products = SchemaRegistry::catalog().table("products").unwrap();
        let names: Vec<&str> = products.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "title",
                "description",
                "price",
                "image",
                "slug",
                "status",
                "created_at",
                "updated_at"
            ]
        );
    }
}
