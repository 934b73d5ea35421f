use serde::Serialize;
use serde_json::Value;

use crate::snapshot::{value_as_f64, MarketSnapshot};

pub const CALL_OI: &str = "CE_openInterest";
pub const PUT_OI: &str = "PE_openInterest";
pub const CALL_OI_CHANGE: &str = "CE_changeinOpenInterest";
pub const PUT_OI_CHANGE: &str = "PE_changeinOpenInterest";
pub const STRIKE: &str = "strikePrice";
pub const EXPIRY: &str = "expiryDate";

// ---------------------------------------------------------------------------
// Put-call ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PutCallRatio {
    /// Σ put OI / Σ call OI, 2 decimals.
    pub ratio: f64,
    /// Σ put OI − Σ call OI.
    pub oi_diff: f64,
}

impl PutCallRatio {
    pub const ZERO: PutCallRatio = PutCallRatio { ratio: 0.0, oi_diff: 0.0 };

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.ratio, self.oi_diff)
    }
}

impl std::fmt::Display for PutCallRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PCR {:.2} (OI diff {:+.0})", self.ratio, self.oi_diff)
    }
}

/// Aggregate put/call open-interest ratio.
///
/// Returns [`PutCallRatio::ZERO`] when either OI column is absent or the call
/// side sums to zero, instead of dividing by zero.
pub fn put_call_ratio(snapshot: &MarketSnapshot) -> PutCallRatio {
    if snapshot.is_empty() || !snapshot.has_column(CALL_OI) || !snapshot.has_column(PUT_OI) {
        return PutCallRatio::ZERO;
    }

    let call: f64 = snapshot.column_f64(CALL_OI).flatten().sum();
    let put: f64 = snapshot.column_f64(PUT_OI).flatten().sum();
    if call == 0.0 {
        return PutCallRatio::ZERO;
    }

    PutCallRatio {
        ratio: round2(put / call),
        oi_diff: put - call,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Max open-interest strikes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MaxOiStrikes {
    pub call: Option<f64>,
    pub put: Option<f64>,
    pub call_change: Option<f64>,
    pub put_change: Option<f64>,
}

impl MaxOiStrikes {
    pub fn as_tuple(&self) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
        (self.call, self.put, self.call_change, self.put_change)
    }
}

/// Strike at the row holding the maximum of each OI column. Ties go to the first
/// row; a column that is absent or never numeric gives `None`.
pub fn max_open_interest_strikes(snapshot: &MarketSnapshot) -> MaxOiStrikes {
    if snapshot.is_empty() {
        return MaxOiStrikes::default();
    }
    MaxOiStrikes {
        call: strike_at_max(snapshot, CALL_OI),
        put: strike_at_max(snapshot, PUT_OI),
        call_change: strike_at_max(snapshot, CALL_OI_CHANGE),
        put_change: strike_at_max(snapshot, PUT_OI_CHANGE),
    }
}

fn strike_at_max(snapshot: &MarketSnapshot, column: &str) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in snapshot.column_f64(column).enumerate() {
        let Some(v) = value else { continue };
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((idx, v));
        }
    }
    let (idx, _) = best?;
    snapshot.get(idx, STRIKE).and_then(value_as_f64)
}

// ---------------------------------------------------------------------------
// Nearest expiry
// ---------------------------------------------------------------------------

/// Rows for the first expiry in the snapshot's expiry list. Without a list (or
/// with an empty snapshot) the input comes back unchanged. Slicing twice is a no-op.
pub fn nearest_expiry_slice(snapshot: &MarketSnapshot) -> MarketSnapshot {
    let nearest = snapshot
        .meta()
        .expiry_dates
        .as_ref()
        .and_then(|dates| dates.first());

    match nearest {
        Some(expiry) if !snapshot.is_empty() => snapshot
            .filter_rows(|row| row.get(EXPIRY).and_then(Value::as_str) == Some(expiry.as_str())),
        _ => snapshot.clone(),
    }
}
