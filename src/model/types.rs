//! Primitive enums shared across the domain model.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Kind of join key declared on a semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Primary,
    Foreign,
    Unique,
}

impl EntityKind {
    /// Primary and unique entities identify at most one row.
    pub fn is_unique_key(&self) -> bool {
        matches!(self, EntityKind::Primary | EntityKind::Unique)
    }
}

/// Aggregation applied by a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Count,
    CountDistinct,
    #[serde(alias = "avg", alias = "mean")]
    Average,
    Min,
    Max,
    Median,
}

impl Aggregation {
    /// LookML measure `type` for this aggregation.
    ///
    /// `Count` over an arbitrary expression is rendered as a sum of a
    /// non-null indicator, so it maps to `sum`.
    pub fn lookml_type(&self) -> &'static str {
        match self {
            Aggregation::Sum | Aggregation::Count => "sum",
            Aggregation::CountDistinct => "count_distinct",
            Aggregation::Average => "average",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
        }
    }
}

/// Time granularity of a time dimension. Also used as the unit of
/// date arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    /// Timeframes exposed by a dimension group of this granularity.
    pub fn timeframes(&self) -> &'static [&'static str] {
        match self {
            Granularity::Hour => &["time", "hour", "date", "week", "month", "quarter", "year"],
            Granularity::Day => &["date", "week", "month", "quarter", "year"],
            Granularity::Week => &["week", "month", "quarter", "year"],
            Granularity::Month => &["month", "quarter", "year"],
            Granularity::Quarter => &["quarter", "year"],
            Granularity::Year => &["year"],
        }
    }

    /// The timeframe used as the anchor of a period-over-period comparison.
    pub fn pop_timeframe(&self) -> &'static str {
        match self {
            Granularity::Hour | Granularity::Day => "date",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    /// Accepts singular and plural unit names in any case (`YEAR`, `days`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let unit = lower.strip_suffix('s').unwrap_or(&lower);
        match unit {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "quarter" => Ok(Granularity::Quarter),
            "year" => Ok(Granularity::Year),
            _ => Err(format!("unknown date part '{}'", s)),
        }
    }
}

/// Value type of a categorical dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    String,
    Number,
    #[serde(alias = "boolean", alias = "bool")]
    YesNo,
}

impl DataType {
    pub fn lookml_type(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::YesNo => "yesno",
        }
    }
}

/// Cardinality of an inferred join, seen from the explore's fact model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    ManyToOne,
    OneToMany,
    OneToOne,
}

impl Relationship {
    pub fn as_lookml(&self) -> &'static str {
        match self {
            Relationship::ManyToOne => "many_to_one",
            Relationship::OneToMany => "one_to_many",
            Relationship::OneToOne => "one_to_one",
        }
    }

    /// Joins that can repeat fact rows.
    pub fn fans_out(&self) -> bool {
        matches!(self, Relationship::OneToMany)
    }
}

/// Which fields a joined model contributes to an explore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposeLevel {
    All,
    DimensionsOnly,
}

/// Period a metric is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum PopComparison {
    #[serde(rename = "py", alias = "prior_year")]
    PriorYear,
    #[serde(rename = "pq", alias = "prior_quarter")]
    PriorQuarter,
    #[serde(rename = "pm", alias = "prior_month")]
    PriorMonth,
    #[serde(rename = "pw", alias = "prior_week")]
    PriorWeek,
}

impl PopComparison {
    /// Short code used in variant suffixes.
    pub fn code(&self) -> &'static str {
        match self {
            PopComparison::PriorYear => "py",
            PopComparison::PriorQuarter => "pq",
            PopComparison::PriorMonth => "pm",
            PopComparison::PriorWeek => "pw",
        }
    }

    /// Length of the offset window.
    pub fn period(&self) -> Granularity {
        match self {
            PopComparison::PriorYear => Granularity::Year,
            PopComparison::PriorQuarter => Granularity::Quarter,
            PopComparison::PriorMonth => Granularity::Month,
            PopComparison::PriorWeek => Granularity::Week,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PopComparison::PriorYear => "Prior Year",
            PopComparison::PriorQuarter => "Prior Quarter",
            PopComparison::PriorMonth => "Prior Month",
            PopComparison::PriorWeek => "Prior Week",
        }
    }
}

/// What a period-over-period variant reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopOutput {
    Previous,
    Change,
    PctChange,
}

impl PopOutput {
    pub fn token(&self) -> &'static str {
        match self {
            PopOutput::Previous => "previous",
            PopOutput::Change => "change",
            PopOutput::PctChange => "pct_change",
        }
    }

    /// Looker `kind` of a `period_over_period` measure.
    pub fn lookml_kind(&self) -> &'static str {
        match self {
            PopOutput::Previous => "previous",
            PopOutput::Change => "difference",
            PopOutput::PctChange => "relative_change",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PopOutput::Previous => "",
            PopOutput::Change => " Change",
            PopOutput::PctChange => " % Change",
        }
    }
}

/// Window aggregate used by a benchmark variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkAgg {
    #[default]
    #[serde(alias = "average")]
    Avg,
    Median,
    Min,
    Max,
}

impl BenchmarkAgg {
    pub fn sql_function(&self) -> &'static str {
        match self {
            BenchmarkAgg::Avg => "AVG",
            BenchmarkAgg::Median => "MEDIAN",
            BenchmarkAgg::Min => "MIN",
            BenchmarkAgg::Max => "MAX",
        }
    }
}
