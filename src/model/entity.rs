//! Join keys declared on semantic models.

use crate::model::types::EntityKind;

/// A named join key.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    /// Column or expression holding the key.
    pub expr: String,
    /// Every row carries a valid key (foreign entities only).
    pub complete: bool,
}

impl Entity {
    pub fn is_primary(&self) -> bool {
        self.kind == EntityKind::Primary
    }

    pub fn is_foreign(&self) -> bool {
        self.kind == EntityKind::Foreign
    }
}
