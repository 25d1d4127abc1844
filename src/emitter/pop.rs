//! Period-over-period rendering strategies.
//!
//! The strategy is chosen at generation time and never changes the domain
//! model:
//!
//! - [`StaticPop`] renders one Looker `period_over_period` field per PoP
//!   variant, with the comparison baked into the field.
//! - [`DynamicPop`] renders `_prior`, `_change` and `_pct_change` per PoP
//!   metric and lets the explore's calendar pick the comparison period at
//!   query time. Changes compare against a hidden `_current` value restricted
//!   to the calendar's date range. Inputs of derived and ratio metrics get
//!   their own hidden `{metric}__{input}` period fields, anchored on the time
//!   dimension chosen for their model. While no period is selected (`none`,
//!   the default) the prior fields stay visible and evaluate to NULL.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::emitter::format::IndentWriter;
use crate::emitter::labels::emit_labels;
use crate::emitter::measure::{
    and_conditions, complex_sql_with, emit_format, guarded, input_field, lookup_measure,
    measure_value, simple_metric_sql,
};
use crate::emitter::{FilteredInput, RenderContext};
use crate::generate::GenerationError;
use crate::model::{
    Metric, MetricKind, PopComparison, PopConfig, PopOutput, ProcessedModel, RefTarget,
    VariantKind,
};
use crate::sql::SqlDialect;

/// Value format of relative changes.
const PCT_FORMAT: &str = "percent_1";

/// Calendar parameter value meaning "no comparison".
const NO_PERIOD: &str = "none";

/// Which [`PopRenderer`] a generator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopStrategy {
    #[default]
    Static,
    Dynamic,
}

impl PopStrategy {
    pub fn renderer(&self) -> Box<dyn PopRenderer> {
        match self {
            PopStrategy::Static => Box::new(StaticPop),
            PopStrategy::Dynamic => Box::new(DynamicPop),
        }
    }
}

impl fmt::Display for PopStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopStrategy::Static => f.write_str("static"),
            PopStrategy::Dynamic => f.write_str("dynamic"),
        }
    }
}

impl FromStr for PopStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(PopStrategy::Static),
            "dynamic" => Ok(PopStrategy::Dynamic),
            other => Err(format!("unknown PoP strategy '{}'", other)),
        }
    }
}

/// Period-over-period rendering strategy.
pub trait PopRenderer: fmt::Debug + Send + Sync {
    fn strategy(&self) -> PopStrategy;

    /// Render `views/{model}.pop.view.lkml`, or `None` when the model has no
    /// comparison fields.
    fn render_view(
        &self,
        model: &ProcessedModel,
        ctx: &RenderContext,
    ) -> Result<Option<String>, GenerationError>;

    /// Time dimensions of `model` the explore calendar has to offer for this
    /// strategy to work.
    fn calendar_dimensions(
        &self,
        _model: &ProcessedModel,
        _ctx: &RenderContext,
    ) -> Result<Vec<String>, GenerationError> {
        Ok(Vec::new())
    }

    /// Extra calendar fields for an explore over `participants`.
    fn emit_calendar_fields(
        &self,
        _w: &mut IndentWriter,
        _participants: &[&ProcessedModel],
        _ctx: &RenderContext,
    ) -> Result<(), GenerationError> {
        Ok(())
    }
}

fn variant_label(metric: &Metric, comparison: &str, output: PopOutput) -> String {
    format!("{}{} ({})", metric.label, output.label(), comparison)
}

fn output_format(metric: &Metric, output: PopOutput) -> Option<&str> {
    match output {
        PopOutput::PctChange => Some(PCT_FORMAT),
        PopOutput::Previous | PopOutput::Change => metric.format.as_deref(),
    }
}

// ============================================================================
// Static
// ============================================================================

/// One `period_over_period` field per PoP variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPop;

impl PopRenderer for StaticPop {
    fn strategy(&self) -> PopStrategy {
        PopStrategy::Static
    }

    fn render_view(
        &self,
        model: &ProcessedModel,
        ctx: &RenderContext,
    ) -> Result<Option<String>, GenerationError> {
        let mut w = IndentWriter::for_file();
        w.open_block("view", &format!("+{}", ctx.view_name(&model.name)));
        let mut fields = 0;

        for metric in model.metrics.iter() {
            let Some(pop) = &metric.pop else {
                continue;
            };
            let granularity = model
                .dimension(&pop.date_dimension)
                .and_then(|d| d.granularity())
                .ok_or_else(|| GenerationError::MissingTimeDimension {
                    metric: metric.name.clone(),
                    dimension: pop.date_dimension.clone(),
                })?;
            let based_on_time = format!("{}_{}", pop.date_dimension, granularity.pop_timeframe());

            for variant in metric.pop_variants() {
                let VariantKind::Pop { comparison, output } = &variant.kind else {
                    continue;
                };
                w.blank_line();
                w.open_block("measure", &metric.variant_name(variant));
                emit_labels(
                    &mut w,
                    &variant_label(metric, comparison.label(), *output),
                    metric.group.as_ref(),
                    None,
                );
                w.property("type", "period_over_period");
                w.property("based_on", &metric.name);
                w.property("based_on_time", &based_on_time);
                w.property("period", comparison.period().as_str());
                w.property("kind", output.lookml_kind());
                emit_format(&mut w, output_format(metric, *output));
                if metric.hidden {
                    w.yesno_property("hidden", true);
                }
                w.close_block();
                fields += 1;
            }
        }

        w.close_block();
        Ok((fields > 0).then(|| w.into_string()))
    }
}

// ============================================================================
// Dynamic
// ============================================================================

/// `_prior`, `_current`, `_change` and `_pct_change` fields driven by the
/// calendar's `date_range` filter and `comparison_period` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicPop;

/// Rows a period field aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    /// Inside the calendar's date range.
    Current,
    /// One comparison period before the date range.
    Prior,
}

impl Period {
    fn suffix(&self) -> &'static str {
        match self {
            Period::Current => "_current",
            Period::Prior => "_prior",
        }
    }
}

/// Something a period field is computed for.
#[derive(Debug, Clone, PartialEq)]
enum PeriodInput {
    Metric(String),
    Measure(String),
    Filtered(FilteredInput),
}

impl PeriodInput {
    fn field(&self) -> &str {
        match self {
            PeriodInput::Metric(name) | PeriodInput::Measure(name) => name,
            PeriodInput::Filtered(input) => &input.field,
        }
    }
}

/// A period-restricted field one PoP metric needs.
#[derive(Debug, Clone, PartialEq)]
struct PeriodField {
    /// PoP metric the field is rendered for.
    root: String,
    input: PeriodInput,
    /// Time dimension of the field's model the periods are taken on.
    anchor: String,
}

impl PeriodField {
    fn is_root(&self) -> bool {
        self.input.field() == self.root
    }

    fn name(&self, period: Period) -> String {
        period_field_name(&self.root, self.input.field(), period)
    }
}

/// `{root}_prior` for the PoP metric itself and `{root}__{input}_prior` for
/// what it is computed from, so metrics anchored on different time
/// dimensions never share an input field.
fn period_field_name(root: &str, input: &str, period: Period) -> String {
    if root == input {
        format!("{}{}", root, period.suffix())
    } else {
        format!("{}__{}{}", root, input, period.suffix())
    }
}

/// Period fields needed per model, in first-use order.
#[derive(Debug, Default)]
struct PeriodPlan {
    per_model: BTreeMap<String, Vec<PeriodField>>,
}

impl PeriodPlan {
    fn build(ctx: &RenderContext) -> Result<Self, GenerationError> {
        let mut plan = PeriodPlan::default();
        for metric in ctx.models.metrics() {
            let Some(pop) = &metric.pop else {
                continue;
            };
            plan.add(
                &metric.model,
                PeriodField {
                    root: metric.name.clone(),
                    input: PeriodInput::Metric(metric.name.clone()),
                    anchor: pop.date_dimension.clone(),
                },
            );
            plan.add_inputs(ctx, &metric.name, pop, metric)?;
        }
        Ok(plan)
    }

    fn add(&mut self, model: &str, field: PeriodField) {
        let fields = self.per_model.entry(model.to_string()).or_default();
        if !fields
            .iter()
            .any(|f| f.root == field.root && f.input.field() == field.input.field())
        {
            fields.push(field);
        }
    }

    fn add_inputs(
        &mut self,
        ctx: &RenderContext,
        root: &str,
        pop: &PopConfig,
        metric: &Metric,
    ) -> Result<(), GenerationError> {
        for field in metric.kind.references() {
            let (model, name) = input_field(ctx, metric, field);
            let anchor = pop
                .anchor(&model)
                .ok_or_else(|| GenerationError::UnanchoredInput {
                    metric: root.to_string(),
                    model: model.clone(),
                })?
                .to_string();

            let input = if metric.filter.is_some() {
                let filtered = ctx
                    .usage(&model)
                    .filtered
                    .iter()
                    .find(|f| f.field == name)
                    .cloned();
                match filtered {
                    Some(input) => PeriodInput::Filtered(input),
                    None => continue,
                }
            } else {
                match field.target {
                    RefTarget::Measure if !ctx.usage(&model).exposed.contains_key(&field.name) => {
                        PeriodInput::Measure(name.clone())
                    }
                    // A measure exposed through its simple metric, or a metric.
                    RefTarget::Measure | RefTarget::Metric => PeriodInput::Metric(name.clone()),
                }
            };
            self.add(
                &model,
                PeriodField {
                    root: root.to_string(),
                    input,
                    anchor,
                },
            );

            if metric.filter.is_none() && field.target == RefTarget::Metric {
                if let Some(referenced) = ctx.models.get(&model).and_then(|m| m.metric(&name)) {
                    self.add_inputs(ctx, root, pop, referenced)?;
                }
            }
        }
        Ok(())
    }

    fn fields(&self, model: &str) -> &[PeriodField] {
        self.per_model.get(model).map(Vec::as_slice).unwrap_or_default()
    }
}

impl DynamicPop {
    /// Liquid condition selecting the rows of `period` by the field's anchor.
    /// Prior rows are those whose date, shifted one comparison period
    /// forward, falls in the date range.
    fn period_condition(
        ctx: &RenderContext,
        model: &ProcessedModel,
        field: &PeriodField,
        period: Period,
    ) -> Result<String, GenerationError> {
        let dimension = model
            .dimension(&field.anchor)
            .ok_or_else(|| GenerationError::MissingTimeDimension {
                metric: field.root.clone(),
                dimension: field.anchor.clone(),
            })?;
        let path = format!("{}.{}", model.name, field.anchor);
        let date = ctx.sql(model, &path, dimension.primary_expr())?;
        let calendar = &ctx.options.calendar_alias;

        Ok(match period {
            Period::Current => format!(
                "{{% condition {}.date_range %}} {} {{% endcondition %}}",
                calendar, date
            ),
            Period::Prior => {
                let shifted = ctx.dialect().emit_date_add(
                    &date,
                    &format!("{{% parameter {}.comparison_period %}}", calendar),
                    1,
                );
                format!(
                    "{{% if {cal}.comparison_period._parameter_value == '{none}' %}}1 = 0{{% else %}}{{% condition {cal}.date_range %}} {shifted} {{% endcondition %}}{{% endif %}}",
                    cal = calendar,
                    none = NO_PERIOD,
                    shifted = shifted,
                )
            }
        })
    }

    fn emit_period_field(
        w: &mut IndentWriter,
        ctx: &RenderContext,
        model: &ProcessedModel,
        field: &PeriodField,
        period: Period,
    ) -> Result<(), GenerationError> {
        let condition = Self::period_condition(ctx, model, field, period)?;
        let name = field.name(period);
        // Only the prior value of the PoP metric itself is shown.
        let visible = field.is_root() && period == Period::Prior;

        w.blank_line();
        w.open_block("measure", &name);
        match &field.input {
            PeriodInput::Metric(metric_name) => {
                let metric = model.metric(metric_name).ok_or_else(|| GenerationError::UnknownField {
                    context: format!("{} period fields", model.name),
                    field: metric_name.clone(),
                })?;
                if visible {
                    emit_labels(w, &format!("{} (Prior Period)", metric.label), metric.group.as_ref(), None);
                }
                match &metric.kind {
                    MetricKind::Simple { measure } => {
                        let measure = lookup_measure(model, measure, &metric.name)?;
                        let (lookml_type, sql) =
                            simple_metric_sql(ctx, model, metric, measure, Some(condition.as_str()))?;
                        w.property("type", lookml_type);
                        w.sql_property("sql", &sql);
                    }
                    MetricKind::Derived { .. } | MetricKind::Ratio { .. } => {
                        let sql = complex_sql_with(ctx, metric, |_, input| {
                            period_field_name(&field.root, input, period)
                        })?;
                        w.property("type", "number");
                        w.sql_property("sql", &sql);
                    }
                }
                emit_format(w, metric.format.as_deref());
                if !visible || metric.hidden {
                    w.yesno_property("hidden", true);
                }
            }
            PeriodInput::Measure(measure_name) => {
                let measure = lookup_measure(model, measure_name, &name)?;
                w.property("type", measure.agg.lookml_type());
                w.sql_property(
                    "sql",
                    &guarded(&measure_value(ctx, model, measure)?, Some(condition.as_str())),
                );
                w.yesno_property("hidden", true);
            }
            PeriodInput::Filtered(input) => {
                let measure = lookup_measure(model, &input.measure, &name)?;
                let path = format!("{}.{}", model.name, input.field);
                let own = ctx.condition(model, &path, &input.conditions)?;
                let combined = and_conditions(own.as_deref(), Some(condition.as_str()));
                w.property("type", measure.agg.lookml_type());
                w.sql_property(
                    "sql",
                    &guarded(&measure_value(ctx, model, measure)?, combined.as_deref()),
                );
                w.yesno_property("hidden", true);
            }
        }
        w.close_block();
        Ok(())
    }

    fn emit_changes(w: &mut IndentWriter, metric: &Metric) {
        let current = format!("${{{}}}", period_field_name(&metric.name, &metric.name, Period::Current));
        let prior = format!("${{{}}}", period_field_name(&metric.name, &metric.name, Period::Prior));
        let fields = [
            (PopOutput::Change, format!("{} - {}", current, prior)),
            (
                PopOutput::PctChange,
                format!("({} - {}) / NULLIF({}, 0)", current, prior, prior),
            ),
        ];
        for (output, sql) in fields {
            w.blank_line();
            w.open_block("measure", &format!("{}_{}", metric.name, output.token()));
            emit_labels(
                w,
                &variant_label(metric, "Prior Period", output),
                metric.group.as_ref(),
                None,
            );
            w.property("type", "number");
            w.sql_property("sql", &sql);
            emit_format(w, output_format(metric, output));
            if metric.hidden {
                w.yesno_property("hidden", true);
            }
            w.close_block();
        }
    }
}

impl PopRenderer for DynamicPop {
    fn strategy(&self) -> PopStrategy {
        PopStrategy::Dynamic
    }

    fn render_view(
        &self,
        model: &ProcessedModel,
        ctx: &RenderContext,
    ) -> Result<Option<String>, GenerationError> {
        let plan = PeriodPlan::build(ctx)?;
        let fields = plan.fields(&model.name);
        if fields.is_empty() {
            return Ok(None);
        }

        let mut w = IndentWriter::for_file();
        w.open_block("view", &format!("+{}", ctx.view_name(&model.name)));
        for field in fields {
            Self::emit_period_field(&mut w, ctx, model, field, Period::Prior)?;
            Self::emit_period_field(&mut w, ctx, model, field, Period::Current)?;
            if field.is_root() {
                if let Some(metric) = model.metric(&field.root) {
                    Self::emit_changes(&mut w, metric);
                }
            }
        }
        w.close_block();
        Ok(Some(w.into_string()))
    }

    fn calendar_dimensions(
        &self,
        model: &ProcessedModel,
        ctx: &RenderContext,
    ) -> Result<Vec<String>, GenerationError> {
        let plan = PeriodPlan::build(ctx)?;
        let mut dimensions: Vec<String> = Vec::new();
        for field in plan.fields(&model.name) {
            if !dimensions.contains(&field.anchor) {
                dimensions.push(field.anchor.clone());
            }
        }
        Ok(dimensions)
    }

    fn emit_calendar_fields(
        &self,
        w: &mut IndentWriter,
        participants: &[&ProcessedModel],
        ctx: &RenderContext,
    ) -> Result<(), GenerationError> {
        let plan = PeriodPlan::build(ctx)?;
        if participants.iter().all(|m| plan.fields(&m.name).is_empty()) {
            return Ok(());
        }

        let mut comparisons: BTreeSet<PopComparisonKey> = BTreeSet::new();
        for model in participants {
            for metric in &model.metrics {
                if let Some(pop) = &metric.pop {
                    comparisons.extend(pop.comparisons.iter().map(|c| PopComparisonKey(*c)));
                }
            }
        }

        w.blank_line();
        w.open_block("filter", "date_range");
        w.string_property("label", "Date Range");
        w.property("type", "date");
        w.close_block();

        w.blank_line();
        w.open_block("parameter", "comparison_period");
        w.string_property("label", "Comparison Period");
        w.property("type", "unquoted");
        w.open_anonymous_block("allowed_value");
        w.string_property("label", "None");
        w.string_property("value", NO_PERIOD);
        w.close_block();
        for key in &comparisons {
            w.open_anonymous_block("allowed_value");
            w.string_property("label", key.0.label());
            w.string_property("value", key.0.period().as_str());
            w.close_block();
        }
        w.string_property("default_value", NO_PERIOD);
        w.close_block();
        Ok(())
    }
}

/// Orders comparisons from the longest period to the shortest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PopComparisonKey(PopComparison);

impl Ord for PopComparisonKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.period().cmp(&self.0.period())
    }
}

impl PartialOrd for PopComparisonKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
