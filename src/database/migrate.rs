//! Schema migration capability.
//!
//! Each schema type knows how to bring one table up to date on a given
//! backend. The manager applies schemas in the order they are passed.

use async_trait::async_trait;

use crate::error::DriverError;

use super::driver::Pool;

/// A schema that can be applied to pools of type `P`.
#[async_trait]
pub trait Migratable<P: Pool>: Send + Sync {
    /// Name used in logs, usually the table name.
    fn name(&self) -> &str;

    /// Create the table if missing and add any missing columns.
    async fn migrate(&self, pool: &P) -> Result<(), DriverError>;

    /// Create the table; fails if it already exists.
    async fn create_table(&self, pool: &P) -> Result<(), DriverError>;
}

/// One column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    pub primary_key: bool,
    pub unique: bool,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary_key: false,
            unique: false,
            nullable: true,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether duplicate values are rejected.
    pub fn is_unique(&self) -> bool {
        self.primary_key || self.unique
    }

    /// Column definition as used inside `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        } else {
            if self.unique {
                def.push_str(" UNIQUE");
            }
            if !self.nullable {
                def.push_str(" NOT NULL");
            }
        }
        def
    }
}

/// Declarative table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn create_statement(&self, if_not_exists: bool) -> String {
        let columns = self
            .columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&self.table),
            columns
        )
    }

    /// Statements adding each column when it is missing.
    ///
    /// Constraints are left to `CREATE TABLE`; added columns are plain.
    pub fn add_column_statements(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                format!(
                    "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
                    quote_ident(&self.table),
                    quote_ident(&c.name),
                    c.sql_type
                )
            })
            .collect()
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
