//! Explore files.

use crate::emitter::dimension::DIMENSIONS_ONLY_SET;
use crate::emitter::format::IndentWriter;
use crate::emitter::calendar::CalendarView;
use crate::emitter::RenderContext;
use crate::model::{ExploreConfig, ExposeLevel, InferredJoin};

/// Render `explores/{explore}.explore.lkml`.
///
/// `calendar` joins the explore's calendar view under the configured alias,
/// requiring the joins of the models its `date` dimension reads from.
pub fn render_explore(
    explore: &ExploreConfig,
    joins: &[InferredJoin],
    calendar: Option<&CalendarView>,
    ctx: &RenderContext,
) -> String {
    let mut w = IndentWriter::for_file();

    let mut models: Vec<&str> = vec![explore.fact_model.as_str()];
    models.extend(joins.iter().map(|j| j.to_model.as_str()));
    for model in &models {
        w.property("include", &format!("\"/views/{}.*view.lkml\"", model));
    }
    if calendar.is_some() {
        w.property(
            "include",
            &format!("\"/explores/{}.view.lkml\"", ctx.calendar_view_name(&explore.name)),
        );
    }
    w.blank_line();

    let name = ctx.explore_name(&explore.name);
    let fact_view = ctx.view_name(&explore.fact_model);
    w.open_block("explore", &name);
    if name != fact_view {
        w.property("view_name", &fact_view);
    }
    if let Some(label) = &explore.label {
        w.string_property("label", label);
    }
    if let Some(description) = &explore.description {
        w.string_property("description", description);
    }

    for join in joins {
        let view = ctx.view_name(&join.to_model);
        w.blank_line();
        w.open_block("join", &view);
        w.property("type", "left_outer");
        w.property("relationship", join.relationship.as_lookml());
        w.sql_property("sql_on", &join.sql_on);
        if join.expose_level == ExposeLevel::DimensionsOnly {
            w.list_property("fields", &[format!("{}.{}*", view, DIMENSIONS_ONLY_SET)]);
        }
        w.close_block();
    }

    if let Some(calendar) = calendar {
        let required: Vec<String> = joins
            .iter()
            .filter(|j| calendar.source_models.contains(&j.to_model))
            .map(|j| ctx.view_name(&j.to_model))
            .collect();
        w.blank_line();
        w.open_block("join", &ctx.options.calendar_alias);
        w.property("from", &ctx.calendar_view_name(&explore.name));
        w.property("relationship", "one_to_one");
        w.sql_property("sql", "");
        if !required.is_empty() {
            w.list_property("required_joins", &required);
        }
        w.close_block();
    }

    w.close_block();
    w.into_string()
}
