//! Rebuilds futures-like rows (expiry, last price, volume, vwap) from derivative
//! records through one declarative schema instead of per-endpoint field picking.

use chrono::NaiveDate;
use serde_json::Value;

use crate::normalize::{records_at, OPTION_RECORDS_PATH};
use crate::snapshot::{MarketSnapshot, Row, SnapshotMeta};

/// Exchange date format, e.g. `28-Oct-2025`.
pub const EXPIRY_FORMAT: &str = "%d-%b-%Y";

/// Lowercased `metadata.instrumentType` prefix of index futures records.
pub const INDEX_FUTURES_PREFIX: &str = "index futures";

/// ISO date column added next to the raw expiry.
pub const EXPIRY_DT_COLUMN: &str = "expiry_dt";

/// One output column and the paths it may be read from, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub column: &'static str,
    pub sources: &'static [&'static [&'static str]],
}

pub const FUTURES_SCHEMA: &[FieldMapping] = &[
    FieldMapping {
        column: "expiry",
        sources: &[&["metadata", "expiryDate"]],
    },
    FieldMapping {
        column: "lastPrice",
        sources: &[
            &["metadata", "lastPrice"],
            &["marketDeptOrderBook", "otherInfo", "lastPrice"],
            &["marketDeptOrderBook", "otherInfo", "ltp"],
        ],
    },
    FieldMapping {
        column: "volume",
        sources: &[
            &["marketDeptOrderBook", "tradeInfo", "tradedVolume"],
            &["marketDeptOrderBook", "tradeInfo", "totalTradedVolume"],
            &["marketDeptOrderBook", "otherInfo", "totalTradedVolume"],
        ],
    },
    FieldMapping {
        column: "vwap",
        sources: &[
            &["marketDeptOrderBook", "tradeInfo", "vmap"],
            &["marketDeptOrderBook", "tradeInfo", "vwap"],
        ],
    },
];

pub fn lookup<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(record, |cur, key| cur.get(key))
}

/// null, false, 0 and "" (and empty containers) are skipped when picking a source.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Apply `schema` to one record. Columns with no truthy source are null.
pub fn apply_schema(record: &Value, schema: &[FieldMapping]) -> Row {
    schema
        .iter()
        .map(|field| {
            let value = field
                .sources
                .iter()
                .filter_map(|path| lookup(record, path))
                .find(|v| is_truthy(v))
                .cloned()
                .unwrap_or(Value::Null);
            (field.column.to_string(), value)
        })
        .collect()
}

pub fn is_index_future(record: &Value) -> bool {
    lookup(record, &["metadata", "instrumentType"])
        .and_then(Value::as_str)
        .is_some_and(|t| t.to_lowercase().starts_with(INDEX_FUTURES_PREFIX))
}

pub fn parse_expiry(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), EXPIRY_FORMAT).ok()
}

/// Index futures contracts from a derivatives payload, nearest expiry first.
/// Unparseable expiries sort last with a null `expiry_dt`.
pub fn index_futures(payload: &Value) -> MarketSnapshot {
    let mut dated: Vec<(Option<NaiveDate>, Row)> = records_at(payload, OPTION_RECORDS_PATH)
        .iter()
        .filter(|r| is_index_future(r))
        .map(|r| {
            let row = apply_schema(r, FUTURES_SCHEMA);
            let date = row.get("expiry").and_then(Value::as_str).and_then(parse_expiry);
            (date, row)
        })
        .collect();

    dated.sort_by_key(|(date, _)| (date.is_none(), *date));

    let rows = dated
        .into_iter()
        .map(|(date, mut row)| {
            let iso = date
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
            row.insert(EXPIRY_DT_COLUMN.to_string(), iso);
            row
        })
        .collect();

    MarketSnapshot::new(rows, SnapshotMeta::default())
}
