use serde_json::{Map, Value};

use crate::snapshot::{value_as_f64, MarketSnapshot, Row, SnapshotMeta};

/// Separator between a nested object's key and its fields (`CE` + `openInterest`).
pub const SEP: &str = "_";

/// Call and put leg keys in an option-chain record.
pub const SIDES: [&str; 2] = ["CE", "PE"];

pub const OPTION_RECORDS_PATH: &[&str] = &["records", "data"];
pub const INDEX_RECORDS_PATH: &[&str] = &["data"];

/// Column the underlying price is broadcast into on option-chain rows.
pub const UNDERLYING_COLUMN: &str = "_underlying";

/// Column holding `CE` or `PE` in split mode.
pub const SIDE_COLUMN: &str = "side";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideMode {
    /// One row per record; legs flattened side by side under `CE_`/`PE_` prefixes.
    Joined,
    /// One row per present leg, merged with the record's shared fields and `metadata`.
    Split,
}

/// Walk `path` through nested objects. Anything not an array at the end is empty.
pub fn records_at<'a>(payload: &'a Value, path: &[&str]) -> &'a [Value] {
    let mut cur = payload;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return &[],
        }
    }
    cur.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Flatten nested objects into `parent_child` keys. Arrays and scalars are kept as-is.
pub fn flatten_record(record: &Map<String, Value>) -> Row {
    let mut out = Row::new();
    flatten_into(None, record, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, obj: &Map<String, Value>, out: &mut Row) {
    for (key, value) in obj {
        let name = match prefix {
            Some(p) => format!("{p}{SEP}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(Some(&name), inner, out),
            _ => {
                out.insert(name, value.clone());
            }
        }
    }
}

/// Turn the record list at `records_path` into a snapshot with no metadata.
/// Non-object entries are skipped; a missing or empty list gives zero rows.
pub fn normalize(payload: &Value, records_path: &[&str], mode: SideMode) -> MarketSnapshot {
    let records = records_at(payload, records_path);
    let objects = records.iter().filter_map(Value::as_object);

    let rows: Vec<Row> = match mode {
        SideMode::Joined => objects.map(flatten_record).collect(),
        SideMode::Split => objects.flat_map(split_legs).collect(),
    };

    MarketSnapshot::new(rows, SnapshotMeta::default())
}

/// Rows for each leg present in `record`. Later sources win on key clashes:
/// shared top-level scalars, then the leg itself, then `metadata`.
fn split_legs(record: &Map<String, Value>) -> Vec<Row> {
    let shared: Row = record
        .iter()
        .filter(|(k, v)| !v.is_object() && !SIDES.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let metadata = record.get("metadata").and_then(Value::as_object);

    SIDES
        .iter()
        .filter_map(|side| {
            let leg = record.get(*side)?.as_object()?;
            let mut row = shared.clone();
            row.extend(flatten_record(leg));
            if let Some(md) = metadata {
                row.extend(flatten_record(md));
            }
            row.insert(SIDE_COLUMN.to_string(), Value::String(side.to_string()));
            Some(row)
        })
        .collect()
}

/// Option-chain payload (`records.data`, joined legs) with the underlying price
/// broadcast to every row and the expiry list kept once in the metadata. Without
/// an `underlyingValue` the `_underlying` column is left out entirely.
pub fn normalize_option_chain(payload: &Value) -> MarketSnapshot {
    let (mut rows, _) = normalize(payload, OPTION_RECORDS_PATH, SideMode::Joined).into_parts();

    let records = payload.get("records");
    let underlying_raw = records
        .and_then(|r| r.get("underlyingValue"))
        .filter(|v| !v.is_null());

    if let Some(underlying) = underlying_raw {
        for row in &mut rows {
            row.insert(UNDERLYING_COLUMN.to_string(), underlying.clone());
        }
    }

    let meta = SnapshotMeta {
        expiry_dates: records
            .and_then(|r| r.get("expiryDates"))
            .and_then(Value::as_array)
            .map(|dates| {
                dates
                    .iter()
                    .filter_map(|d| d.as_str().map(str::to_string))
                    .collect()
            }),
        underlying: underlying_raw.and_then(value_as_f64),
        timestamp: records
            .and_then(|r| r.get("timestamp"))
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    MarketSnapshot::new(rows, meta)
}

/// All-indices payload: one row per index from the top-level `data` list.
pub fn normalize_index(payload: &Value) -> MarketSnapshot {
    normalize(payload, INDEX_RECORDS_PATH, SideMode::Joined)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chain_payload() -> Value {
        json!({
            "records": {
                "timestamp": "17-Oct-2025 15:30:00",
                "underlyingValue": 25150.35,
                "expiryDates": ["21-Oct-2025", "28-Oct-2025"],
                "data": [
                    {
                        "strikePrice": 25000,
                        "expiryDate": "21-Oct-2025",
                        "CE": {"strikePrice": 25000, "openInterest": 120, "changeinOpenInterest": 10},
                        "PE": {"strikePrice": 25000, "openInterest": 80, "changeinOpenInterest": -4}
                    },
                    {
                        "strikePrice": 25100,
                        "expiryDate": "21-Oct-2025",
                        "CE": {"openInterest": 0, "changeinOpenInterest": 0},
                        "PE": {"openInterest": 0, "changeinOpenInterest": 0}
                    },
                    {
                        "strikePrice": 25000,
                        "expiryDate": "28-Oct-2025",
                        "CE": {"openInterest": 0, "changeinOpenInterest": 0},
                        "PE": {"openInterest": 0, "changeinOpenInterest": 0}
                    }
                ]
            }
        })
    }

    #[test]
    fn joined_mode_gives_one_row_per_record_with_both_sides() {
        let snap = normalize_option_chain(&chain_payload());
        assert_eq!(snap.len(), 3);
        for col in [
            "CE_openInterest",
            "PE_openInterest",
            "CE_changeinOpenInterest",
            "PE_changeinOpenInterest",
        ] {
            assert!(
                snap.column_f64(col).all(|v| v.is_some()),
                "{col} should be populated on every row"
            );
        }
        assert_eq!(snap.get(0, "strikePrice"), Some(&json!(25000)));
        assert_eq!(snap.get(0, "CE_openInterest"), Some(&json!(120)));
    }

    #[test]
    fn option_chain_metadata_is_attached_once() {
        let snap = normalize_option_chain(&chain_payload());
        let meta = snap.meta();
        assert_eq!(
            meta.expiry_dates.as_deref(),
            Some(&["21-Oct-2025".to_string(), "28-Oct-2025".to_string()][..])
        );
        assert_eq!(meta.underlying, Some(25150.35));
        assert_eq!(meta.timestamp.as_deref(), Some("17-Oct-2025 15:30:00"));
        assert!(!snap.has_column("expiryDates"));
        assert!(snap
            .rows()
            .iter()
            .all(|r| r.get(UNDERLYING_COLUMN) == Some(&json!(25150.35))));
    }

    #[test]
    fn missing_underlying_value_adds_no_column() {
        let mut payload = chain_payload();
        payload["records"]
            .as_object_mut()
            .unwrap()
            .remove("underlyingValue");
        let snap = normalize_option_chain(&payload);
        assert_eq!(snap.len(), 3);
        assert!(!snap.has_column(UNDERLYING_COLUMN));
        assert_eq!(snap.meta().underlying, None);

        payload["records"]["underlyingValue"] = Value::Null;
        let snap = normalize_option_chain(&payload);
        assert!(!snap.has_column(UNDERLYING_COLUMN));
    }

    #[test]
    fn missing_or_empty_records_give_empty_snapshot() {
        assert!(normalize_option_chain(&json!({})).is_empty());
        assert!(normalize_option_chain(&json!({"records": {"data": []}})).is_empty());
        assert!(normalize(&json!({"records": {"data": "oops"}}), OPTION_RECORDS_PATH, SideMode::Joined).is_empty());
        assert!(normalize_index(&json!({"name": "x"})).is_empty());
    }

    #[test]
    fn n_records_give_n_rows() {
        let data: Vec<Value> = (0..25)
            .map(|i| {
                json!({
                    "strikePrice": 20000 + i * 50,
                    "CE": {"openInterest": i},
                    "PE": {"openInterest": i * 2}
                })
            })
            .collect();
        let snap = normalize_option_chain(&json!({"records": {"data": data}}));
        assert_eq!(snap.len(), 25);
        assert_eq!(snap.column_f64("PE_openInterest").flatten().count(), 25);
        assert_eq!(snap.meta().expiry_dates, None);
    }

    #[test]
    fn split_mode_emits_one_row_per_leg_with_metadata() {
        let payload = json!({
            "records": {
                "data": [
                    {
                        "strikePrice": 1500,
                        "expiryDate": "28-Oct-2025",
                        "CE": {"openInterest": 10, "lastPrice": 12.5},
                        "metadata": {"instrumentType": "Stock Options", "lastPrice": 13.0}
                    },
                    {
                        "strikePrice": 1520,
                        "expiryDate": "28-Oct-2025",
                        "CE": {"openInterest": 4},
                        "PE": {"openInterest": 9}
                    }
                ]
            }
        });
        let snap = normalize(&payload, OPTION_RECORDS_PATH, SideMode::Split);
        assert_eq!(snap.len(), 3);

        assert_eq!(snap.get(0, SIDE_COLUMN), Some(&json!("CE")));
        assert_eq!(snap.get(0, "strikePrice"), Some(&json!(1500)));
        assert_eq!(snap.get(0, "instrumentType"), Some(&json!("Stock Options")));
        // metadata wins over the leg on clashing keys
        assert_eq!(snap.get(0, "lastPrice"), Some(&json!(13.0)));

        assert_eq!(snap.get(1, SIDE_COLUMN), Some(&json!("CE")));
        assert_eq!(snap.get(2, SIDE_COLUMN), Some(&json!("PE")));
        assert_eq!(snap.get(2, "openInterest"), Some(&json!(9)));
        assert_eq!(snap.get(2, "expiryDate"), Some(&json!("28-Oct-2025")));
    }

    #[test]
    fn flatten_nests_deeper_objects_and_keeps_arrays() {
        let rec = json!({
            "a": {"b": {"c": 1}},
            "list": [1, 2],
            "empty": {}
        });
        let flat = flatten_record(rec.as_object().unwrap());
        assert_eq!(flat.get("a_b_c"), Some(&json!(1)));
        assert_eq!(flat.get("list"), Some(&json!([1, 2])));
        assert_eq!(flat.get("empty"), Some(&json!({})));
    }

    #[test]
    fn index_payload_rows() {
        let payload = json!({
            "data": [
                {"index": "NIFTY 50", "last": 25150.35, "percentChange": 0.42},
                {"index": "NIFTY BANK", "last": 56000.1, "percentChange": -0.1}
            ]
        });
        let snap = normalize_index(&payload);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(1, "index"), Some(&json!("NIFTY BANK")));
    }
}
