use serde::Serialize;
use serde_json::{Map, Value};

/// One table row: flattened column name → JSON scalar.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Side-channel metadata
// ---------------------------------------------------------------------------

/// Values shared by every row of a snapshot, kept out of the column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotMeta {
    /// All expiries the exchange lists for the symbol, nearest first.
    pub expiry_dates: Option<Vec<String>>,
    /// Spot price of the underlying at fetch time.
    pub underlying: Option<f64>,
    /// Exchange-side timestamp string, e.g. `17-Oct-2025 15:30:00`.
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// MarketSnapshot
// ---------------------------------------------------------------------------

/// Rectangular, read-only table of instrument legs.
///
/// Columns are the union of keys over all rows; a row without a column reads as
/// null. Rows cannot be modified after construction; transforms return a new
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    rows: Vec<Row>,
    meta: SnapshotMeta,
}

impl MarketSnapshot {
    pub fn new(rows: Vec<Row>, meta: SnapshotMeta) -> Self {
        Self { rows, meta }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order of first appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !cols.contains(&key.as_str()) {
                    cols.push(key);
                }
            }
        }
        cols
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|r| r.contains_key(column))
    }

    /// Cell value; `None` when the row is out of range or lacks the column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Numeric view of one column, one entry per row (`None` for null/non-numeric).
    pub fn column_f64<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<f64>> + 'a {
        self.rows
            .iter()
            .map(move |r| r.get(column).and_then(value_as_f64))
    }

    /// Rows matching `keep`, with the metadata carried over.
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Row) -> bool,
    {
        Self {
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
            meta: self.meta.clone(),
        }
    }

    pub fn into_parts(self) -> (Vec<Row>, SnapshotMeta) {
        (self.rows, self.meta)
    }
}

/// Numbers pass through; strings are parsed after stripping thousands separators
/// (the exchange sends some quantities as `"1,23,450"`). NaN reads as missing.
pub fn value_as_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    if n.is_nan() {
        None
    } else {
        Some(n)
    }
}
