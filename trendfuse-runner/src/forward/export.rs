//! CSV export of forward-test trades.

use std::io::Write;
use thiserror::Error;
use trendfuse_core::domain::Trade;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub const CSV_HEADER: [&str; 13] = [
    "id",
    "created_at",
    "symbol",
    "direction",
    "entry_price",
    "stop_loss",
    "take_profit",
    "exit_price",
    "exit_reason",
    "r_multiple",
    "profit_loss",
    "candle_time",
    "run_id",
];

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Write `trades` (already in creation order) with a header row.
pub fn write_trades_csv<W: Write>(trades: &[Trade], out: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for t in trades {
        wtr.write_record([
            t.id.to_string(),
            t.created_at.to_rfc3339(),
            t.symbol.clone(),
            t.direction.to_string(),
            t.entry_price.to_string(),
            t.stop_loss.to_string(),
            t.take_profit.to_string(),
            opt(t.exit_price),
            opt(t.exit_reason),
            opt(t.r_multiple),
            opt(t.profit_loss),
            t.candle_time.to_rfc3339(),
            t.run_id.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_trades_csv(trades, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
