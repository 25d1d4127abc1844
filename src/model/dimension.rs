// src/model/dimension.rs
use crate::model::group::GroupPath;
use crate::model::types::{DataType, Granularity};
use std::collections::BTreeMap;

/// A categorical or time attribute of a semantic model.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
    pub sql: DimensionSql,
    pub label: String,
    pub description: Option<String>,
    pub group: Option<GroupPath>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DimensionKind {
    Categorical {
        data_type: DataType,
    },
    Time {
        granularity: Granularity,
        /// Resolved timezone conversion flag.
        convert_tz: bool,
    },
}

/// Where a dimension's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionSql {
    /// A single SQL expression.
    Expr(String),
    /// Named alternatives (e.g. `utc` / `local`); `primary` is rendered
    /// without a suffix.
    Variants {
        variants: BTreeMap<String, String>,
        primary: String,
    },
}

/// One concrete field produced from a dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVariant<'a> {
    pub field_name: String,
    /// Variant name, `None` for the primary/only expression.
    pub variant: Option<&'a str>,
    pub expr: &'a str,
}

impl Dimension {
    pub fn is_time(&self) -> bool {
        matches!(self.kind, DimensionKind::Time { .. })
    }

    pub fn granularity(&self) -> Option<Granularity> {
        match self.kind {
            DimensionKind::Time { granularity, .. } => Some(granularity),
            DimensionKind::Categorical { .. } => None,
        }
    }

    /// Expression of the primary variant (or the only expression).
    pub fn primary_expr(&self) -> &str {
        match &self.sql {
            DimensionSql::Expr(expr) => expr,
            DimensionSql::Variants { variants, primary } => variants
                .get(primary)
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    /// Every SQL expression this dimension carries, primary first.
    pub fn expressions(&self) -> Vec<&str> {
        self.variant_fields().into_iter().map(|v| v.expr).collect()
    }

    /// Fields rendered for this dimension: the primary variant keeps the
    /// dimension name, the others are suffixed `{name}_{variant}` in
    /// variant-name order.
    pub fn variant_fields(&self) -> Vec<RenderedVariant<'_>> {
        match &self.sql {
            DimensionSql::Expr(expr) => vec![RenderedVariant {
                field_name: self.name.clone(),
                variant: None,
                expr,
            }],
            DimensionSql::Variants { variants, primary } => {
                let mut fields = Vec::with_capacity(variants.len());
                if let Some(expr) = variants.get(primary) {
                    fields.push(RenderedVariant {
                        field_name: self.name.clone(),
                        variant: Some(primary.as_str()),
                        expr,
                    });
                }
                for (variant, expr) in variants {
                    if variant != primary {
                        fields.push(RenderedVariant {
                            field_name: format!("{}_{}", self.name, variant),
                            variant: Some(variant.as_str()),
                            expr,
                        });
                    }
                }
                fields
            }
        }
    }
}
