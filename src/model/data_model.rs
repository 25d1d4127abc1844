//! Physical table references.

use crate::sql::Dialect;

/// A physical table a semantic model reads from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataModel {
    pub name: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    /// Table name (defaults to the data model name).
    pub table: String,
    /// Dialect the model's SQL expressions are written in.
    /// `None` means they are already written for the target dialect.
    pub dialect: Option<Dialect>,
}

impl DataModel {
    /// Data model assumed for a semantic model that names none: a table of
    /// the same name, parsed with the generic dialect.
    pub fn implicit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            catalog: None,
            schema: None,
            table: name.to_string(),
            dialect: None,
        }
    }

    /// `catalog.schema.table`, skipping absent parts.
    pub fn qualified_table(&self) -> String {
        [self.catalog.as_deref(), self.schema.as_deref(), Some(self.table.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}
