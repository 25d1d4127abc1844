//! Per-explore calendar views.
//!
//! An explore gets at most one calendar: a `date_field` parameter listing
//! every eligible time dimension of the participating models as
//! `{model}__{dimension}`, and a `date` dimension group routing to the
//! selected dimension's expression. The calendar join requires the joins of
//! every model it reads a dimension from, so the `date` expression can be
//! evaluated whichever fields a query selects.

use crate::emitter::format::IndentWriter;
use crate::emitter::pop::PopRenderer;
use crate::emitter::RenderContext;
use crate::generate::GenerationError;
use crate::model::{Granularity, ProcessedModel};

/// One selectable time dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarOption {
    pub model: String,
    /// `{model}__{dimension}`
    pub value: String,
    pub label: String,
    /// Expression qualified with the model's view name.
    pub sql: String,
    pub granularity: Granularity,
}

/// Eligible time dimensions of the participating models, in participation
/// then declaration order: date selector dimensions plus whatever the PoP
/// strategy needs.
pub fn calendar_options(
    participants: &[&ProcessedModel],
    pop: &dyn PopRenderer,
    ctx: &RenderContext,
) -> Result<Vec<CalendarOption>, GenerationError> {
    let mut options = Vec::new();
    for model in participants {
        let mut names: Vec<String> = model
            .date_selector
            .as_ref()
            .map(|s| s.dimensions.clone())
            .unwrap_or_default();
        for name in pop.calendar_dimensions(model, ctx)? {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let view = ctx.view_name(&model.name);
        for dimension in model.dimensions.iter().filter(|d| names.contains(&d.name)) {
            let Some(granularity) = dimension.granularity() else {
                continue;
            };
            let path = format!("{}.{}", model.name, dimension.name);
            options.push(CalendarOption {
                model: model.name.clone(),
                value: format!("{}__{}", model.name, dimension.name),
                label: format!("{} {}", model.label, dimension.label),
                sql: ctx.sql_for_alias(model, &path, dimension.primary_expr(), &view)?,
                granularity,
            });
        }
    }
    Ok(options)
}

/// A rendered calendar view.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView {
    pub content: String,
    /// Models the `date` dimension reads from, in participation order.
    pub source_models: Vec<String>,
}

/// Render `explores/{explore}_calendar.view.lkml`, or `None` when no
/// participating model has an eligible time dimension.
pub fn render_calendar(
    explore: &str,
    participants: &[&ProcessedModel],
    pop: &dyn PopRenderer,
    ctx: &RenderContext,
) -> Result<Option<CalendarView>, GenerationError> {
    let options = calendar_options(participants, pop, ctx)?;
    let (Some(first), Some(finest)) = (
        options.first(),
        options.iter().map(|o| o.granularity).min(),
    ) else {
        return Ok(None);
    };

    let mut w = IndentWriter::for_file();
    w.open_block("view", &ctx.calendar_view_name(explore));

    w.open_block("parameter", "date_field");
    w.string_property("label", "Date Field");
    w.property("type", "unquoted");
    for option in &options {
        w.open_anonymous_block("allowed_value");
        w.string_property("label", &option.label);
        w.string_property("value", &option.value);
        w.close_block();
    }
    w.string_property("default_value", &first.value);
    w.close_block();

    let branches = options
        .iter()
        .map(|o| format!("WHEN '{}' THEN {}", o.value, o.sql))
        .collect::<Vec<_>>()
        .join(" ");

    w.blank_line();
    w.open_block("dimension_group", "date");
    w.string_property("label", "Date");
    w.property("type", "time");
    w.list_property("timeframes", finest.timeframes());
    w.yesno_property("convert_tz", ctx.options.convert_tz);
    w.sql_property(
        "sql",
        &format!("CASE '{{% parameter date_field %}}' {} END", branches),
    );
    w.close_block();

    pop.emit_calendar_fields(&mut w, participants, ctx)?;

    w.close_block();

    let mut source_models: Vec<String> = Vec::new();
    for option in &options {
        if !source_models.contains(&option.model) {
            source_models.push(option.model.clone());
        }
    }
    Ok(Some(CalendarView {
        content: w.into_string(),
        source_models,
    }))
}
