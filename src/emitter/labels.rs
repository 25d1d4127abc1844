//! Hierarchical field labels.
//!
//! A group path `A.B.C` places a field under view label `A`, inside group
//! `B > C`, where it is shown by its own label.

use crate::emitter::format::IndentWriter;
use crate::model::GroupPath;

/// LookML label properties of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLabels {
    pub label: String,
    pub view_label: Option<String>,
    pub group_label: Option<String>,
    pub group_item_label: Option<String>,
}

impl FieldLabels {
    pub fn new(label: &str, group: Option<&GroupPath>) -> Self {
        let view_label = group.map(|g| g.root().to_string());
        let group_label = group
            .filter(|g| !g.rest().is_empty())
            .map(|g| g.rest().join(" > "));
        let group_item_label = group_label.as_ref().map(|_| label.to_string());
        Self {
            label: label.to_string(),
            view_label,
            group_label,
            group_item_label,
        }
    }
}

/// Write `label`, the group labels and `description`.
pub fn emit_labels(
    w: &mut IndentWriter,
    label: &str,
    group: Option<&GroupPath>,
    description: Option<&str>,
) {
    let labels = FieldLabels::new(label, group);
    w.string_property("label", &labels.label);
    if let Some(view_label) = &labels.view_label {
        w.string_property("view_label", view_label);
    }
    if let Some(group_label) = &labels.group_label {
        w.string_property("group_label", group_label);
    }
    if let Some(item) = &labels.group_item_label {
        w.string_property("group_item_label", item);
    }
    if let Some(description) = description {
        w.string_property("description", description);
    }
}
