use crate::processor::Value;

/// A row as handed over by a loader, before any type normalization.
///
/// `None` marks an empty cell. `store_id` and `date` keep whatever type the
/// source stored them as.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub store_id: Option<Value>,
    pub city: Option<String>,
    pub date: Option<Value>,
    pub unit_price: Option<f64>,
    pub quantity: Option<u64>,
}

/// Row-wise union of every loaded source
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub records: Vec<RawRecord>,
    pub sources: Vec<SourceSummary>,
}

/// Per-source load bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    pub rows: usize,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `records` as one more source
    pub fn append(&mut self, name: impl Into<String>, records: Vec<RawRecord>) {
        self.sources.push(SourceSummary {
            name: name.into(),
            rows: records.len(),
        });
        self.records.extend(records);
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RawRecord> for RawTable {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        let mut table = RawTable::new();
        table.append("<memory>", iter.into_iter().collect());
        table
    }
}
