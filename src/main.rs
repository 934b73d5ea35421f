use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nse_derivs::{
    max_open_interest_strikes, nearest_expiry_slice, put_call_ratio, Config, MarketSnapshot,
    NseClient, Result,
};

/// Indices listed in the summary, in this order when present.
const HEADLINE_INDICES: &[&str] = &["NIFTY 50", "NIFTY BANK", "NIFTY FINANCIAL SERVICES", "INDIA VIX"];

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let symbol = cfg.symbol.clone();
    let client = NseClient::new(cfg)?;

    // --- Option chain + sentiment ---
    let chain = client.fetch_option_chain(&symbol).await?;
    report_chain(&symbol, "all expiries", &chain);

    let near = nearest_expiry_slice(&chain);
    let nearest = chain
        .meta()
        .expiry_dates
        .as_ref()
        .and_then(|d| d.first())
        .map(String::as_str)
        .unwrap_or("n/a");
    report_chain(&symbol, nearest, &near);

    // --- Index snapshot ---
    match client.fetch_index_snapshot().await {
        Ok(indices) => report_indices(&indices),
        Err(e) => warn!("Index snapshot unavailable: {e}"),
    }

    // --- Index futures ---
    match client.fetch_index_futures(&symbol).await {
        Ok(futures) if futures.is_empty() => {
            warn!("[FUT] no index futures records for {symbol} in the derivatives payload");
        }
        Ok(futures) => {
            for row in futures.rows() {
                info!(
                    "[FUT] {} | last: {} | volume: {} | vwap: {}",
                    cell(row.get("expiry")),
                    cell(row.get("lastPrice")),
                    cell(row.get("volume")),
                    cell(row.get("vwap")),
                );
            }
        }
        Err(e) => warn!("Index futures unavailable: {e}"),
    }

    Ok(())
}

fn report_chain(symbol: &str, scope: &str, snap: &MarketSnapshot) {
    let pcr = put_call_ratio(snap);
    let strikes = max_open_interest_strikes(snap);
    info!(
        symbol,
        scope,
        rows = snap.len(),
        pcr = pcr.ratio,
        oi_diff = pcr.oi_diff,
        "[OC] {symbol} ({scope}) | {pcr} | underlying: {} | rows: {}",
        snap.meta()
            .underlying
            .map(|u| format!("{u:.2}"))
            .unwrap_or_else(|| "n/a".to_string()),
        snap.len(),
    );
    info!(
        "[OC] {symbol} ({scope}) | max OI strikes | call: {} | put: {} | call chg: {} | put chg: {}",
        strike(strikes.call),
        strike(strikes.put),
        strike(strikes.call_change),
        strike(strikes.put_change),
    );
}

fn report_indices(indices: &MarketSnapshot) {
    info!("[IDX] {} indices", indices.len());
    for name in HEADLINE_INDICES {
        let Some(row) = indices
            .rows()
            .iter()
            .find(|r| r.get("index").and_then(Value::as_str) == Some(*name))
        else {
            continue;
        };
        info!(
            "[IDX] {name:<26} last: {:>10} | chg%: {:>6}",
            cell(row.get("last")),
            cell(row.get("percentChange")),
        );
    }
}

fn strike(s: Option<f64>) -> String {
    s.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".to_string())
}

fn cell(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}
