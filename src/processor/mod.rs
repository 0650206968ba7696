use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::str::FromStr;
use thiserror::Error;

pub mod aggregation;
pub mod normalize;
pub mod query_builder;
pub mod raw;
pub mod record;
pub mod sales_table;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "spreadsheet")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unsupported source '{0}': expected .csv (or a spreadsheet with the `spreadsheet` feature)")]
    UnsupportedSource(String),

    #[error("Cannot convert {column} value '{value}' at row {row}: {reason}")]
    TypeConversion {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid column '{0}': not a numeric column")]
    InvalidColumn(String),

    #[error("Cannot aggregate an empty table")]
    EmptyTable,

    #[error("Integer overflow: {0}")]
    Overflow(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Value helper for raw cells and predicates (owned for simplicity)
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer cell
    Int(i64),
    /// Float cell
    Float(f64),
    /// String cell
    Str(String),
}

impl Value {
    /// Orders two values of compatible kinds; ints and floats compare numerically.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Filter predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterPredicate {
    Equals(Value),
    GreaterThan(Value),
    LessThan(Value),
    /// Inclusive on both ends
    Between(Value, Value),
}

impl FilterPredicate {
    pub fn matches(&self, v: &Value) -> bool {
        match self {
            FilterPredicate::Equals(t) => v.compare(t) == Some(Ordering::Equal),
            FilterPredicate::GreaterThan(t) => v.compare(t) == Some(Ordering::Greater),
            FilterPredicate::LessThan(t) => v.compare(t) == Some(Ordering::Less),
            FilterPredicate::Between(lo, hi) => {
                matches!(v.compare(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(v.compare(hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }

    fn operands(&self) -> Vec<&Value> {
        match self {
            FilterPredicate::Equals(v)
            | FilterPredicate::GreaterThan(v)
            | FilterPredicate::LessThan(v) => vec![v],
            FilterPredicate::Between(lo, hi) => vec![lo, hi],
        }
    }

    /// True when every operand is numeric.
    pub fn is_numeric(&self) -> bool {
        self.operands().iter().all(|v| v.is_numeric())
    }
}

/// Aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// Sum of all numeric values
    Sum,
    /// Count of all rows
    Count,
    /// Mean of numeric values
    Avg,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl FromStr for AggregateOp {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregateOp::Sum),
            "count" => Ok(AggregateOp::Count),
            "avg" | "mean" => Ok(AggregateOp::Avg),
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            other => Err(ProcessorError::InvalidQuery(format!(
                "unknown aggregate '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Count => "count",
            AggregateOp::Avg => "mean",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        };
        f.write_str(s)
    }
}

/// Result of an aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateResult {
    Int(i64),
    Float(f64),
}

impl AggregateResult {
    pub fn as_f64(&self) -> f64 {
        match self {
            AggregateResult::Int(v) => *v as f64,
            AggregateResult::Float(v) => *v,
        }
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateResult::Int(v) => write!(f, "{v}"),
            AggregateResult::Float(v) => write!(f, "{v:.2}"),
        }
    }
}

/// Ranking direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Every column of an enriched sales table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    StoreId,
    City,
    Date,
    UnitPrice,
    Quantity,
    Revenue,
    Quarter,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::StoreId,
        Column::City,
        Column::Date,
        Column::UnitPrice,
        Column::Quantity,
        Column::Revenue,
        Column::Quarter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::StoreId => "store_id",
            Column::City => "city",
            Column::Date => "date",
            Column::UnitPrice => "unit_price",
            Column::Quantity => "quantity",
            Column::Revenue => "revenue",
            Column::Quarter => "quarter",
        }
    }

    /// The numeric measure behind this column, if any
    pub fn measure(self) -> Result<Measure> {
        match self {
            Column::UnitPrice => Ok(Measure::UnitPrice),
            Column::Quantity => Ok(Measure::Quantity),
            Column::Revenue => Ok(Measure::Revenue),
            other => Err(ProcessorError::InvalidColumn(other.name().to_string())),
        }
    }
}

impl FromStr for Column {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        Column::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProcessorError::InvalidColumn(s.to_string()))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric columns that can be ranked or reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    UnitPrice,
    Quantity,
    Revenue,
}

impl Measure {
    pub fn name(self) -> &'static str {
        match self {
            Measure::UnitPrice => "unit_price",
            Measure::Quantity => "quantity",
            Measure::Revenue => "revenue",
        }
    }

    /// Integer measures reduce to [`AggregateResult::Int`]
    pub fn is_integer(self) -> bool {
        matches!(self, Measure::Quantity)
    }
}

impl FromStr for Measure {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Column>()?.measure()
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Grouping keys derived from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    City,
    StoreId,
    Year,
    Month,
    Quarter,
    /// Day of month
    Day,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::City,
        Dimension::StoreId,
        Dimension::Year,
        Dimension::Month,
        Dimension::Quarter,
        Dimension::Day,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::City => "city",
            Dimension::StoreId => "store_id",
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::Quarter => "quarter",
            Dimension::Day => "day",
        }
    }
}

impl FromStr for Dimension {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProcessorError::InvalidQuery(format!("unknown dimension '{s}'")))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a [`RecordFilter`] looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterTarget {
    Dimension(Dimension),
    Measure(Measure),
}

/// Row filter over an enriched table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordFilter {
    pub target: FilterTarget,
    pub predicate: FilterPredicate,
}

impl RecordFilter {
    pub fn new(target: FilterTarget, predicate: FilterPredicate) -> Self {
        Self { target, predicate }
    }

    /// Shorthand for `year == year`
    pub fn year(year: i32) -> Self {
        Self::new(
            FilterTarget::Dimension(Dimension::Year),
            FilterPredicate::Equals(Value::Int(year as i64)),
        )
    }
}
