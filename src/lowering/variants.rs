//! Metric variant expansion.
//!
//! A metric always yields its base variant first, then one period-over-period
//! variant per `(comparison, output)` pair (comparison-major, both in
//! declared order), then one benchmark variant per group. The order is
//! observable: renderers emit fields in variant order.

use crate::model::metric::{BenchmarkConfig, MetricVariant, PopConfig, VariantKind};
use crate::model::types::{PopComparison, PopOutput};

/// Expand a metric's configuration into concrete variants.
pub fn expand(pop: Option<&PopConfig>, benchmark: Option<&BenchmarkConfig>) -> Vec<MetricVariant> {
    let pop_count = pop.map_or(0, |p| p.comparisons.len() * p.outputs.len());
    let bench_count = benchmark.map_or(0, |b| b.groups.len());
    let mut variants = Vec::with_capacity(1 + pop_count + bench_count);

    variants.push(MetricVariant {
        kind: VariantKind::Base,
        suffix: String::new(),
    });

    if let Some(pop) = pop {
        for &comparison in &pop.comparisons {
            for &output in &pop.outputs {
                variants.push(MetricVariant {
                    kind: VariantKind::Pop { comparison, output },
                    suffix: pop_suffix(comparison, output),
                });
            }
        }
    }

    if let Some(benchmark) = benchmark {
        for params in &benchmark.groups {
            variants.push(MetricVariant {
                suffix: benchmark_suffix(&params.group),
                kind: VariantKind::Benchmark {
                    params: params.clone(),
                },
            });
        }
    }

    variants
}

/// `_py` for the previous value, `_py_change` / `_py_pct_change` otherwise.
pub fn pop_suffix(comparison: PopComparison, output: PopOutput) -> String {
    match output {
        PopOutput::Previous => format!("_{}", comparison.code()),
        other => format!("_{}_{}", comparison.code(), other.token()),
    }
}

pub fn benchmark_suffix(group: &str) -> String {
    format!("_{}_benchmark", group)
}
