use crate::portfolio::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code reported by the trading terminal for a submitted request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RetCode(pub u32);

impl RetCode {
    pub const REJECT: RetCode = RetCode(10006);
    pub const DONE: RetCode = RetCode(10009);
    pub const NO_CHANGES: RetCode = RetCode(10025);
    /// Auto-trading switched off in the client terminal
    pub const CLIENT_DISABLES_AT: RetCode = RetCode(10027);
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeAction {
    /// Modify stop-loss and take-profit of an open position
    Sltp,
}

/// Requested stop-loss/take-profit levels for one open position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModificationRequest {
    pub action: TradeAction,
    pub position: u64,
    pub symbol: String,
    pub tp: Option<f64>,
    pub sl: Option<f64>,
    pub magic: u64,
    pub comment: String,
}

impl ModificationRequest {
    /// Build a request for `position`; a skipped level keeps the position's current value.
    pub fn for_position(
        position: &Position,
        tp: Option<f64>,
        sl: Option<f64>,
        magic: u64,
        comment: &str,
    ) -> Self {
        Self {
            action: TradeAction::Sltp,
            position: position.ticket,
            symbol: position.symbol.clone(),
            tp: tp.or(position.take_profit()),
            sl: sl.or(position.stop_loss()),
            magic,
            comment: comment.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResult {
    pub retcode: RetCode,
    pub message: String,
}

impl SubmitResult {
    pub fn new(retcode: RetCode, message: impl Into<String>) -> Self {
        Self {
            retcode,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Side;

    fn position() -> Position {
        Position {
            ticket: 42,
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            volume: 1.0,
            price_open: 1.1000,
            tp: Some(1.1100),
            sl: Some(0.0),
            profit: 0.0,
        }
    }

    #[test]
    fn test_skipped_level_keeps_existing_value() {
        let request = ModificationRequest::for_position(&position(), None, Some(1.0950), 234000, "Bulk TP/SL Setter");
        assert_eq!(request.position, 42);
        assert_eq!(request.tp, Some(1.1100));
        assert_eq!(request.sl, Some(1.0950));
        assert_eq!(request.action, TradeAction::Sltp);
    }

    #[test]
    fn test_unset_level_stays_absent() {
        let request = ModificationRequest::for_position(&position(), Some(1.1200), None, 234000, "x");
        assert_eq!(request.tp, Some(1.1200));
        assert_eq!(request.sl, None);
    }
}
