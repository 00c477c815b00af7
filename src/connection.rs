use crate::config::{DashboardConfig, TerminalBackend};
use crate::console::Operator;
use crate::display::progress_cell;
use crate::orders::{ModificationRequest, SubmitResult};
use crate::paper::PaperTerminal;
use crate::portfolio::{AccountSnapshot, Position};
use crate::security_types::InstrumentInfo;
use anyhow::Result;
use crossterm::style::{Color, Stylize};
use log::{error, info, warn};
use mockall::automock;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("trading terminal unreachable: {0}")]
    Unreachable(String),
    #[error("terminal rejected request: {0}")]
    Rejected(String),
    #[error("backend '{0}' is not compiled into this build")]
    BackendUnavailable(String),
}

/// The already-running trading terminal this dashboard talks to.
///
/// Every call is synchronous and blocks the caller for its duration.
#[automock]
pub trait TradingTerminal {
    /// Attach to the terminal; `Ok(false)` means it is not running yet.
    fn connect(&mut self) -> Result<bool, TerminalError>;
    fn list_open_positions(&mut self) -> Result<Vec<Position>, TerminalError>;
    fn account(&mut self) -> Result<Option<AccountSnapshot>, TerminalError>;
    fn instrument(&mut self, symbol: &str) -> Result<Option<InstrumentInfo>, TerminalError>;
    fn submit_modification(
        &mut self,
        request: &ModificationRequest,
    ) -> Result<SubmitResult, TerminalError>;
    fn disconnect(&mut self);
}

/// Owns the terminal connection and releases it exactly once, on whichever
/// path the dashboard leaves by.
pub struct TerminalSession {
    terminal: Box<dyn TradingTerminal>,
    released: bool,
}

impl TerminalSession {
    pub fn new(terminal: Box<dyn TradingTerminal>) -> Self {
        Self {
            terminal,
            released: false,
        }
    }

    pub fn terminal(&mut self) -> &mut dyn TradingTerminal {
        self.terminal.as_mut()
    }

    /// Disconnect now; later calls and the drop are no-ops.
    pub fn release(&mut self) {
        if !self.released {
            self.terminal.disconnect();
            self.released = true;
            info!("Disconnected from trading terminal");
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Build the terminal backend named in the configuration.
pub fn open_terminal(config: &DashboardConfig) -> Result<Box<dyn TradingTerminal>, TerminalError> {
    match config.terminal.backend {
        TerminalBackend::Paper => {
            info!("Using paper terminal");
            Ok(Box::new(PaperTerminal::new(config.paper.clone())))
        }
        #[cfg(feature = "tws")]
        TerminalBackend::Tws => {
            info!(
                "Using TWS terminal at {}:{}",
                config.terminal.host, config.terminal.port
            );
            Ok(Box::new(crate::tws::TwsTerminal::new(config.terminal.clone())))
        }
        #[cfg(not(feature = "tws"))]
        TerminalBackend::Tws => Err(TerminalError::BackendUnavailable("tws".to_string())),
    }
}

fn loading_bar(operator: &mut dyn Operator, message: &str, delay: Duration) -> Result<()> {
    const STEPS: usize = 24;
    if !message.is_empty() {
        operator.show(&format!("{}\n", message.with(Color::White)))?;
    }
    operator.show("[")?;
    for i in 0..STEPS {
        operator.show(&progress_cell(i, STEPS))?;
        operator.pause(delay);
    }
    operator.show(&format!("] {}\n\n", "Done!".with(Color::White)))?;
    Ok(())
}

/// Connect and verify auto-trading before the dashboard starts.
///
/// A terminal that is not running, or one with auto-trading switched off,
/// is reported to the operator and the whole check restarts after they
/// press Enter. Only an unreachable terminal ends the check with an error.
pub fn startup_check(session: &mut TerminalSession, operator: &mut dyn Operator) -> Result<()> {
    let delay = Duration::from_millis(20);

    loop {
        operator.clear()?;
        loading_bar(operator, "Checking required components...", delay)?;

        operator.show(&format!("{}\n", "Checking trading terminal connection...".with(Color::White)))?;
        if !session.terminal().connect()? {
            warn!("Trading terminal not running or refused the connection");
            operator.show(&format!(
                "{}\n",
                "❌ Trading terminal not running or failed to connect.".with(Color::Red)
            ))?;
            operator.prompt("Please open the trading terminal and press Enter to retry...")?;
            continue;
        }
        loading_bar(operator, "", delay)?;

        operator.show(&format!("{}\n", "Checking AutoTrading status...".with(Color::White)))?;
        let trade_allowed = session
            .terminal()
            .account()?
            .is_some_and(|account| account.trade_allowed);
        if !trade_allowed {
            error!("AutoTrading is disabled in the trading terminal");
            operator.show(&format!("{}\n", "❌ AutoTrading is disabled.".with(Color::Red)))?;
            operator.prompt("Please enable AutoTrading and press Enter to retry...")?;
            continue;
        }
        loading_bar(operator, "", delay)?;

        info!("Startup check passed");
        operator.show(&format!("{}\n", "✅ All systems are GO!".with(Color::Green)))?;
        operator.pause(Duration::from_millis(1200));
        operator.clear()?;
        return Ok(());
    }
}
