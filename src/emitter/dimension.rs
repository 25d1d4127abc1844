//! Base views: table, entities and dimensions of one model.

use crate::emitter::format::{is_plain_identifier, IndentWriter};
use crate::emitter::labels::emit_labels;
use crate::emitter::RenderContext;
use crate::generate::GenerationError;
use crate::model::{Dimension, DimensionKind, ProcessedModel};
use crate::sql::SqlDialect;

/// Name of the set listing every dimension of a base view.
pub const DIMENSIONS_ONLY_SET: &str = "dimensions_only";

/// Render `views/{model}.view.lkml`.
pub fn render_base_view(model: &ProcessedModel, ctx: &RenderContext) -> Result<String, GenerationError> {
    let mut w = IndentWriter::for_file();
    w.open_block("view", &ctx.view_name(&model.name));
    w.sql_property("sql_table_name", &sql_table_name(model, ctx));
    w.string_property("label", &model.label);

    let mut set_fields: Vec<String> = Vec::new();

    for entity in &model.entities {
        w.blank_line();
        w.open_block("dimension", &entity.name);
        if entity.is_primary() {
            w.yesno_property("primary_key", true);
        }
        w.yesno_property("hidden", true);
        let path = format!("{}.{}", model.name, entity.name);
        w.sql_property("sql", &ctx.sql(model, &path, &entity.expr)?);
        w.close_block();
        set_fields.push(entity.name.clone());
    }

    for dimension in &model.dimensions {
        set_fields.extend(emit_dimension(&mut w, model, dimension, ctx)?);
    }

    w.blank_line();
    w.open_block("set", DIMENSIONS_ONLY_SET);
    w.list_property("fields", &set_fields);
    w.close_block();

    w.close_block();
    Ok(w.into_string())
}

/// Write every field of one dimension (one per variant) and return the
/// field names they define.
pub fn emit_dimension(
    w: &mut IndentWriter,
    model: &ProcessedModel,
    dimension: &Dimension,
    ctx: &RenderContext,
) -> Result<Vec<String>, GenerationError> {
    let mut defined = Vec::new();
    for field in dimension.variant_fields() {
        let path = format!("{}.{}", model.name, field.field_name);
        let sql = ctx.sql(model, &path, field.expr)?;
        let label = match (field.variant, field.field_name == dimension.name) {
            (Some(variant), false) => {
                format!("{} ({})", dimension.label, inflector::cases::titlecase::to_title_case(variant))
            }
            _ => dimension.label.clone(),
        };

        w.blank_line();
        match dimension.kind {
            DimensionKind::Categorical { data_type } => {
                w.open_block("dimension", &field.field_name);
                emit_labels(w, &label, dimension.group.as_ref(), dimension.description.as_deref());
                w.property("type", data_type.lookml_type());
                w.sql_property("sql", &sql);
                defined.push(field.field_name.clone());
            }
            DimensionKind::Time {
                granularity,
                convert_tz,
            } => {
                w.open_block("dimension_group", &field.field_name);
                emit_labels(w, &label, dimension.group.as_ref(), dimension.description.as_deref());
                w.property("type", "time");
                w.list_property("timeframes", granularity.timeframes());
                w.yesno_property("convert_tz", convert_tz);
                w.sql_property("sql", &sql);
                defined.extend(
                    granularity
                        .timeframes()
                        .iter()
                        .map(|tf| format!("{}_{}", field.field_name, tf)),
                );
            }
        }
        if dimension.hidden {
            w.yesno_property("hidden", true);
        }
        w.close_block();
    }
    Ok(defined)
}

/// `catalog.schema.table`, quoting parts that are not plain identifiers.
pub fn sql_table_name(model: &ProcessedModel, ctx: &RenderContext) -> String {
    let dm = &model.data_model;
    [dm.catalog.as_deref(), dm.schema.as_deref(), Some(dm.table.as_str())]
        .into_iter()
        .flatten()
        .map(|part| {
            if is_plain_identifier(part) {
                part.to_string()
            } else {
                ctx.dialect().quote_identifier(part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
