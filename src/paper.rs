//! In-memory trading terminal seeded from configuration.
//!
//! Applies SL/TP modifications to its own book and answers with the same
//! result codes a live terminal uses, so the dashboard can be driven end to
//! end without a broker session.

use crate::connection::{TerminalError, TradingTerminal};
use crate::orders::{ModificationRequest, RetCode, SubmitResult};
use crate::portfolio::{AccountSnapshot, Position, Side};
use crate::security_types::InstrumentInfo;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_balance")]
    pub balance: f64,
    #[serde(default = "default_trade_allowed")]
    pub trade_allowed: bool,
    #[serde(default)]
    pub instruments: HashMap<String, InstrumentInfo>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

fn default_balance() -> f64 {
    10000.0
}

fn default_trade_allowed() -> bool {
    true
}

impl Default for PaperConfig {
    fn default() -> Self {
        let mut instruments = HashMap::new();
        instruments.insert("EURUSD".to_string(), InstrumentInfo::new(0.00001, 1.0));
        instruments.insert("XAUUSD".to_string(), InstrumentInfo::new(0.01, 1.0));

        Self {
            balance: default_balance(),
            trade_allowed: default_trade_allowed(),
            instruments,
            positions: vec![
                Position {
                    ticket: 1001,
                    symbol: "EURUSD".to_string(),
                    side: Side::Buy,
                    volume: 0.10,
                    price_open: 1.08500,
                    tp: None,
                    sl: None,
                    profit: 12.40,
                },
                Position {
                    ticket: 1002,
                    symbol: "XAUUSD".to_string(),
                    side: Side::Sell,
                    volume: 0.05,
                    price_open: 2345.50,
                    tp: None,
                    sl: None,
                    profit: -8.15,
                },
            ],
        }
    }
}

pub struct PaperTerminal {
    book: PaperConfig,
    connected: bool,
    reachable: bool,
    refused_connects: usize,
    auto_trading_off_for: usize,
    rejected: HashMap<u64, RetCode>,
    submissions: Vec<ModificationRequest>,
}

impl PaperTerminal {
    pub fn new(book: PaperConfig) -> Self {
        Self {
            book,
            connected: false,
            reachable: true,
            refused_connects: 0,
            auto_trading_off_for: 0,
            rejected: HashMap::new(),
            submissions: Vec::new(),
        }
    }

    /// Refuse the next `attempts` connection attempts.
    pub fn refuse_connects(&mut self, attempts: usize) {
        self.refused_connects = attempts;
    }

    /// Answer the next `submissions` requests with [`RetCode::CLIENT_DISABLES_AT`].
    pub fn disable_auto_trading_for(&mut self, submissions: usize) {
        self.auto_trading_off_for = submissions;
    }

    pub fn reject_ticket(&mut self, ticket: u64, retcode: RetCode) {
        self.rejected.insert(ticket, retcode);
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn positions(&self) -> &[Position] {
        &self.book.positions
    }

    /// Every request received, accepted or not.
    pub fn submissions(&self) -> &[ModificationRequest] {
        &self.submissions
    }

    fn ensure_reachable(&self) -> Result<(), TerminalError> {
        if self.reachable {
            Ok(())
        } else {
            Err(TerminalError::Unreachable("paper terminal offline".to_string()))
        }
    }
}

impl TradingTerminal for PaperTerminal {
    fn connect(&mut self) -> Result<bool, TerminalError> {
        self.ensure_reachable()?;
        if self.refused_connects > 0 {
            self.refused_connects -= 1;
            return Ok(false);
        }
        self.connected = true;
        info!(
            "Paper terminal connected with {} position(s)",
            self.book.positions.len()
        );
        Ok(true)
    }

    fn list_open_positions(&mut self) -> Result<Vec<Position>, TerminalError> {
        self.ensure_reachable()?;
        Ok(self.book.positions.clone())
    }

    fn account(&mut self) -> Result<Option<AccountSnapshot>, TerminalError> {
        self.ensure_reachable()?;
        Ok(Some(AccountSnapshot {
            balance: self.book.balance,
            trade_allowed: self.book.trade_allowed,
        }))
    }

    fn instrument(&mut self, symbol: &str) -> Result<Option<InstrumentInfo>, TerminalError> {
        self.ensure_reachable()?;
        Ok(self.book.instruments.get(symbol).copied())
    }

    fn submit_modification(
        &mut self,
        request: &ModificationRequest,
    ) -> Result<SubmitResult, TerminalError> {
        self.ensure_reachable()?;
        self.submissions.push(request.clone());

        if self.auto_trading_off_for > 0 {
            self.auto_trading_off_for -= 1;
            return Ok(SubmitResult::new(
                RetCode::CLIENT_DISABLES_AT,
                "AutoTrading disabled by client",
            ));
        }
        if let Some(retcode) = self.rejected.get(&request.position) {
            return Ok(SubmitResult::new(*retcode, "Request rejected"));
        }

        let Some(position) = self
            .book
            .positions
            .iter_mut()
            .find(|p| p.ticket == request.position)
        else {
            return Ok(SubmitResult::new(RetCode::REJECT, "Position not found"));
        };

        if position.take_profit() == request.tp && position.stop_loss() == request.sl {
            return Ok(SubmitResult::new(RetCode::NO_CHANGES, "No changes"));
        }

        position.tp = request.tp;
        position.sl = request.sl;
        debug!(
            "Paper #{} {} now TP {:?} SL {:?}",
            position.ticket, position.symbol, position.tp, position.sl
        );
        Ok(SubmitResult::new(RetCode::DONE, "Request executed"))
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}
