use crate::connection::{TerminalError, TradingTerminal};
use crate::security_types::InstrumentMap;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// An open position as reported by the trading terminal.
///
/// Take-profit and stop-loss levels of zero or absent mean "not set";
/// use [`Position::take_profit`] and [`Position::stop_loss`] rather than
/// the raw fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub price_open: f64,
    #[serde(default)]
    pub tp: Option<f64>,
    #[serde(default)]
    pub sl: Option<f64>,
    #[serde(default)]
    pub profit: f64,
}

impl Position {
    pub fn take_profit(&self) -> Option<f64> {
        self.tp.filter(|price| *price > 0.0)
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.sl.filter(|price| *price > 0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub trade_allowed: bool,
}

/// Positions and balance read in one display tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub positions: Vec<Position>,
    pub balance: f64,
}

/// Read open positions and the account balance.
///
/// No open positions and a missing account are both valid states: they
/// produce an empty position list and a zero balance. Only an unreachable
/// terminal is an error.
pub fn fetch_snapshot(terminal: &mut dyn TradingTerminal) -> Result<Snapshot, TerminalError> {
    let positions = terminal.list_open_positions()?;
    let balance = terminal
        .account()?
        .map(|account| account.balance)
        .unwrap_or(0.0);

    debug!(
        "Snapshot: {} open position(s), balance ${:.2}",
        positions.len(),
        balance
    );

    Ok(Snapshot { positions, balance })
}

/// Resolve instrument metadata for every distinct symbol held.
///
/// Symbols the terminal cannot describe are left out of the map.
pub fn fetch_instruments(
    terminal: &mut dyn TradingTerminal,
    positions: &[Position],
) -> Result<InstrumentMap, TerminalError> {
    let mut instruments = InstrumentMap::new();
    for position in positions {
        if instruments.contains_key(&position.symbol) {
            continue;
        }
        match terminal.instrument(&position.symbol)? {
            Some(info) if info.is_usable() => {
                instruments.insert(position.symbol.clone(), info);
            }
            _ => debug!("No instrument info for {}", position.symbol),
        }
    }
    Ok(instruments)
}
