//! Bulk take-profit/stop-loss setter.
//!
//! Collects one TP and one SL price from the operator and applies them to
//! every open position, one modification request per position.

use crate::config::SetterConfig;
use crate::connection::TradingTerminal;
use crate::console::Operator;
use crate::display::render_setter_screen;
use crate::orders::{ModificationRequest, RetCode};
use crate::portfolio::Position;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::style::{Color, Stylize};
use log::{error, info, warn};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PriceInputError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("price must be zero or positive, got {0}")]
    Negative(f64),
}

/// Parse an operator price; `0` means "leave unchanged" and yields `None`.
pub fn parse_price(input: &str) -> Result<Option<f64>, PriceInputError> {
    let trimmed = input.trim();
    let price: f64 = trimmed
        .parse()
        .map_err(|_| PriceInputError::NotANumber(trimmed.to_string()))?;
    if !price.is_finite() {
        return Err(PriceInputError::NotANumber(trimmed.to_string()));
    }
    if price < 0.0 {
        return Err(PriceInputError::Negative(price));
    }
    Ok(if price == 0.0 { None } else { Some(price) })
}

/// Requested levels; `None` skips that level on every position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Targets {
    pub tp: Option<f64>,
    pub sl: Option<f64>,
}

/// Whether `existing` already satisfies `target` (a skipped target always does).
pub fn level_matches(existing: Option<f64>, target: Option<f64>, tolerance: f64) -> bool {
    match target {
        None => true,
        Some(price) => existing.is_some_and(|current| (current - price).abs() < tolerance),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    AlreadySet,
    Updated,
    Failed(RetCode),
    AutoTradingDisabled,
}

impl ModifyOutcome {
    /// Interpret a terminal result code for a position that was submitted.
    ///
    /// `NO_CHANGES` only counts as already set when both levels were already
    /// at target before submission.
    pub fn from_retcode(retcode: RetCode, already_tp: bool, already_sl: bool) -> Self {
        match retcode {
            RetCode::DONE => ModifyOutcome::Updated,
            RetCode::CLIENT_DISABLES_AT => ModifyOutcome::AutoTradingDisabled,
            RetCode::NO_CHANGES if already_tp && already_sl => ModifyOutcome::AlreadySet,
            other => ModifyOutcome::Failed(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOutcome {
    pub ticket: u64,
    pub symbol: String,
    pub outcome: ModifyOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub targets: Targets,
    pub outcomes: Vec<PositionOutcome>,
    /// Requests sent to the terminal in the final pass
    pub submitted: usize,
    /// Passes restarted after auto-trading was switched back on
    pub restarts: usize,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn count(&self, outcome: ModifyOutcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, ModifyOutcome::Failed(_)))
            .count()
    }
}

enum SetterState {
    AwaitInput,
    Applying(Targets),
    RetryAwaitInput(Targets),
    Done(BatchReport),
}

enum Pass {
    Completed {
        outcomes: Vec<PositionOutcome>,
        submitted: usize,
    },
    AutoTradingDisabled,
}

pub struct TpSlSetter<'a> {
    terminal: &'a mut dyn TradingTerminal,
    operator: &'a mut dyn Operator,
    config: &'a SetterConfig,
}

impl<'a> TpSlSetter<'a> {
    pub fn new(
        terminal: &'a mut dyn TradingTerminal,
        operator: &'a mut dyn Operator,
        config: &'a SetterConfig,
    ) -> Self {
        Self {
            terminal,
            operator,
            config,
        }
    }

    /// Run the setter to completion for `positions` and wait for the
    /// operator to acknowledge the result.
    pub fn run(&mut self, positions: &[Position]) -> Result<BatchReport> {
        info!("TP/SL setter opened for {} position(s)", positions.len());
        let mut current = positions.to_vec();
        let mut restarts = 0;
        let mut state = SetterState::AwaitInput;

        loop {
            state = match state {
                SetterState::AwaitInput => {
                    self.operator.clear()?;
                    self.operator.show(&render_setter_screen(&current))?;
                    match self.read_targets()? {
                        Ok(targets) => SetterState::Applying(targets),
                        Err(e) => {
                            warn!("Rejected operator input: {}", e);
                            self.operator.show(&format!(
                                "{}\n",
                                "Invalid input. Please enter valid numbers.".with(Color::Red)
                            ))?;
                            self.operator
                                .pause(Duration::from_millis(self.config.invalid_input_pause_ms));
                            SetterState::AwaitInput
                        }
                    }
                }
                SetterState::Applying(targets) => match self.apply(&current, targets)? {
                    Pass::Completed {
                        outcomes,
                        submitted,
                    } => SetterState::Done(BatchReport {
                        targets,
                        outcomes,
                        submitted,
                        restarts,
                        finished_at: Utc::now(),
                    }),
                    Pass::AutoTradingDisabled => {
                        error!("AutoTrading disabled in terminal, waiting for operator");
                        self.operator.show(&format!(
                            "{}\n",
                            "AutoTrading is disabled in the trading terminal.".with(Color::Red)
                        ))?;
                        self.operator.prompt("Enable AutoTrading and press Enter to retry...")?;
                        restarts += 1;
                        SetterState::RetryAwaitInput(targets)
                    }
                },
                SetterState::RetryAwaitInput(targets) => {
                    current = self.refresh(positions)?;
                    self.operator.clear()?;
                    self.operator.show(&render_setter_screen(&current))?;
                    SetterState::Applying(targets)
                }
                SetterState::Done(report) => {
                    info!(
                        "TP/SL update complete at {}: {} updated, {} already set, {} failed",
                        report.finished_at.format("%H:%M:%S"),
                        report.count(ModifyOutcome::Updated),
                        report.count(ModifyOutcome::AlreadySet),
                        report.failures()
                    );
                    self.operator
                        .show(&format!("\n{}\n", "UPDATE COMPLETE".with(Color::Green)))?;
                    self.operator.prompt("Press Enter to return to summary...")?;
                    return Ok(report);
                }
            };
        }
    }

    /// Re-read the original tickets from the terminal, keeping their order,
    /// so levels applied before an interruption count as already set.
    fn refresh(&mut self, original: &[Position]) -> Result<Vec<Position>> {
        let mut open = self.terminal.list_open_positions()?;
        let refreshed: Vec<Position> = original
            .iter()
            .filter_map(|position| {
                let index = open.iter().position(|p| p.ticket == position.ticket)?;
                Some(open.swap_remove(index))
            })
            .collect();
        if refreshed.len() < original.len() {
            warn!(
                "{} position(s) closed while AutoTrading was disabled",
                original.len() - refreshed.len()
            );
        }
        Ok(refreshed)
    }

    /// Prompt for both prices; the outer error is an I/O failure, the inner
    /// one a price the operator has to re-enter.
    fn read_targets(&mut self) -> Result<Result<Targets, PriceInputError>> {
        let tp = match parse_price(&self.operator.prompt("TP Price: ")?) {
            Ok(tp) => tp,
            Err(e) => return Ok(Err(e)),
        };
        let sl = match parse_price(&self.operator.prompt("SL Price: ")?) {
            Ok(sl) => sl,
            Err(e) => return Ok(Err(e)),
        };
        Ok(Ok(Targets { tp, sl }))
    }

    fn apply(&mut self, positions: &[Position], targets: Targets) -> Result<Pass> {
        self.operator.show("\nApplying TP/SL to all positions...\n\n")?;
        self.operator
            .pause(Duration::from_millis(self.config.apply_pause_ms));

        let tolerance = self.config.price_tolerance;
        let mut outcomes = Vec::with_capacity(positions.len());
        let mut submitted = 0;

        for position in positions {
            let already_tp = level_matches(position.take_profit(), targets.tp, tolerance);
            let already_sl = level_matches(position.stop_loss(), targets.sl, tolerance);

            if already_tp && already_sl {
                info!("{} #{} already at target", position.symbol, position.ticket);
                self.operator
                    .show(&format!("{} → Already Set.\n", position.symbol))?;
                outcomes.push(PositionOutcome {
                    ticket: position.ticket,
                    symbol: position.symbol.clone(),
                    outcome: ModifyOutcome::AlreadySet,
                });
                continue;
            }

            let request = ModificationRequest::for_position(
                position,
                targets.tp,
                targets.sl,
                self.config.magic,
                &self.config.comment,
            );
            let result = self.terminal.submit_modification(&request)?;
            submitted += 1;
            info!(
                "Submitted SL/TP for {} #{}: TP {:?} SL {:?} -> {} {}",
                position.symbol, position.ticket, request.tp, request.sl, result.retcode, result.message
            );

            let outcome = ModifyOutcome::from_retcode(result.retcode, already_tp, already_sl);
            match outcome {
                ModifyOutcome::Updated => {
                    self.operator.show(&format!(
                        "{}\n",
                        format!("{} → Updated.", position.symbol).with(Color::Green)
                    ))?;
                }
                ModifyOutcome::AlreadySet => {
                    self.operator
                        .show(&format!("{} → Already Set.\n", position.symbol))?;
                }
                ModifyOutcome::Failed(retcode) => {
                    warn!(
                        "SL/TP modification failed for {} #{}: {}",
                        position.symbol, position.ticket, retcode
                    );
                    self.operator.show(&format!(
                        "{}\n",
                        format!("✗ {} FAILED | RetCode: {}", position.symbol, retcode)
                            .with(Color::Red)
                    ))?;
                }
                ModifyOutcome::AutoTradingDisabled => return Ok(Pass::AutoTradingDisabled),
            }
            outcomes.push(PositionOutcome {
                ticket: position.ticket,
                symbol: position.symbol.clone(),
                outcome,
            });

            // Space out requests to the terminal
            self.operator
                .pause(Duration::from_millis(self.config.submit_delay_ms));
        }

        Ok(Pass::Completed {
            outcomes,
            submitted,
        })
    }
}
