use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::processor::{
    AggregateOp, AggregateResult, Dimension, Measure, ProcessorError, Result, SortOrder,
    record::{EnrichedRecord, KeyPart},
};
use crate::render::Series;

/// Composite group key, one part per grouping dimension
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn label(s: impl Into<String>) -> Self {
        GroupKey(vec![KeyPart::Label(s.into())])
    }

    pub fn number(n: i64) -> Self {
        GroupKey(vec![KeyPart::Number(n)])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Grouped reduction output.
///
/// Entries are ordered by key unless the result has been [`ranked`].
///
/// [`ranked`]: AggregationResult::ranked
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub dimensions: Vec<Dimension>,
    pub measure: Option<Measure>,
    pub op: AggregateOp,
    pub entries: Vec<(GroupKey, AggregateResult)>,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&AggregateResult> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Re-orders by value; ties keep their current (key) order
    pub fn ranked(mut self, order: SortOrder) -> Self {
        self.entries.sort_by(|(_, a), (_, b)| match order {
            SortOrder::Ascending => a.as_f64().total_cmp(&b.as_f64()),
            SortOrder::Descending => b.as_f64().total_cmp(&a.as_f64()),
        });
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    /// Column heading such as `sum(revenue) by city`
    pub fn describe(&self) -> String {
        let dims = self
            .dimensions
            .iter()
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(", ");
        match self.measure {
            Some(m) => format!("{}({}) by {}", self.op, m, dims),
            None => format!("{} by {}", self.op, dims),
        }
    }

    pub fn to_series(&self, name: impl Into<String>) -> Series {
        Series::new(
            name,
            self.entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_f64()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Accumulator {
    Int {
        sum: i128,
        count: usize,
        min: i64,
        max: i64,
    },
    Float {
        sum: f64,
        count: usize,
        min: f64,
        max: f64,
    },
}

impl Accumulator {
    fn start(measure: Option<Measure>) -> Self {
        match measure {
            Some(m) if !m.is_integer() => Accumulator::Float {
                sum: 0.0,
                count: 0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            _ => Accumulator::Int {
                sum: 0,
                count: 0,
                min: i64::MAX,
                max: i64::MIN,
            },
        }
    }

    fn push(&mut self, measure: Option<Measure>, record: &EnrichedRecord) -> Result<()> {
        match self {
            Accumulator::Int {
                sum,
                count,
                min,
                max,
            } => {
                *count += 1;
                if let Some(m) = measure {
                    let v = record.checked_i64(m)?;
                    // at most usize::MAX values below 2^63 each: cannot overflow i128
                    *sum += v as i128;
                    *min = (*min).min(v);
                    *max = (*max).max(v);
                }
            }
            Accumulator::Float {
                sum,
                count,
                min,
                max,
            } => {
                *count += 1;
                if let Some(m) = measure {
                    let v = record.measure(m);
                    *sum += v;
                    *min = min.min(v);
                    *max = max.max(v);
                }
            }
        }
        Ok(())
    }

    /// `None` when an integer sum does not fit `i64`
    fn finish(self, op: AggregateOp) -> Option<AggregateResult> {
        Some(match self {
            Accumulator::Int {
                sum,
                count,
                min,
                max,
            } => match op {
                AggregateOp::Sum => AggregateResult::Int(i64::try_from(sum).ok()?),
                AggregateOp::Count => AggregateResult::Int(i64::try_from(count).ok()?),
                AggregateOp::Avg => AggregateResult::Float(sum as f64 / count as f64),
                AggregateOp::Min => AggregateResult::Int(min),
                AggregateOp::Max => AggregateResult::Int(max),
            },
            Accumulator::Float {
                sum,
                count,
                min,
                max,
            } => match op {
                AggregateOp::Sum => AggregateResult::Float(sum),
                AggregateOp::Count => AggregateResult::Int(i64::try_from(count).ok()?),
                AggregateOp::Avg => AggregateResult::Float(sum / count as f64),
                AggregateOp::Min => AggregateResult::Float(min),
                AggregateOp::Max => AggregateResult::Float(max),
            },
        })
    }
}

/// Partitions `records` by `dimensions` and reduces each partition.
///
/// `measure` may only be `None` for [`AggregateOp::Count`].
pub(crate) fn group_records<'a, I>(
    records: I,
    dimensions: &[Dimension],
    measure: Option<Measure>,
    op: AggregateOp,
) -> Result<AggregationResult>
where
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    if dimensions.is_empty() {
        return Err(ProcessorError::InvalidQuery(
            "group-by needs at least one dimension".into(),
        ));
    }
    if measure.is_none() && op != AggregateOp::Count {
        return Err(ProcessorError::InvalidQuery(format!(
            "{op} needs a numeric column"
        )));
    }

    // sequential, in record order, so float sums are reproducible
    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
    for record in records {
        let key = GroupKey(dimensions.iter().map(|d| record.key_part(*d)).collect());
        groups
            .entry(key)
            .or_insert_with(|| Accumulator::start(measure))
            .push(measure, record)?;
    }

    if groups.is_empty() {
        return Err(ProcessorError::EmptyTable);
    }

    Ok(AggregationResult {
        dimensions: dimensions.to_vec(),
        measure,
        op,
        entries: groups
            .into_iter()
            .map(|(k, acc)| match acc.finish(op) {
                Some(v) => Ok((k, v)),
                None => Err(ProcessorError::Overflow(format!(
                    "{op} of {} for group {k} exceeds {}",
                    measure.map_or("rows", Measure::name),
                    i64::MAX
                ))),
            })
            .collect::<Result<_>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(entries: Vec<(&str, i64)>) -> AggregationResult {
        AggregationResult {
            dimensions: vec![Dimension::StoreId],
            measure: None,
            op: AggregateOp::Count,
            entries: entries
                .into_iter()
                .map(|(k, v)| (GroupKey::label(k), AggregateResult::Int(v)))
                .collect(),
        }
    }

    #[test]
    fn test_ranked_is_stable_on_ties() {
        let r = result(vec![("a", 2), ("b", 5), ("c", 2), ("d", 5)]).ranked(SortOrder::Descending);
        let keys: Vec<String> = r.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "d", "a", "c"]);

        let r = result(vec![("a", 2), ("b", 5), ("c", 2)])
            .ranked(SortOrder::Ascending)
            .top(2);
        let keys: Vec<String> = r.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn test_composite_key_display() {
        let key = GroupKey(vec![KeyPart::Number(2019), KeyPart::Number(3)]);
        assert_eq!(key.to_string(), "2019 / 3");
    }
}
