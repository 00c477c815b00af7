use crate::config::DashboardConfig;
use crate::connection::TerminalSession;
use crate::console::{ControlKey, KeySource, Operator};
use crate::display::{render_details, render_summary};
use crate::portfolio::{Position, fetch_instruments, fetch_snapshot};
use crate::risk::aggregate;
use crate::tpsl_setter::TpSlSetter;
use anyhow::Result;
use log::{debug, info};

/// What the dashboard shows next. Owned by the dispatcher loop and moved
/// from one iteration to the next.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Summary,
    Details,
    /// Batch setter running against the positions seen on the last summary
    Setter(Vec<Position>),
    Exit,
}

pub struct Dashboard<'a> {
    session: &'a mut TerminalSession,
    config: &'a DashboardConfig,
}

impl<'a> Dashboard<'a> {
    pub fn new(session: &'a mut TerminalSession, config: &'a DashboardConfig) -> Self {
        Self { session, config }
    }

    /// Drive the dashboard until the operator cancels.
    ///
    /// The terminal connection is released before returning on cancel;
    /// on error the owning session releases it when dropped.
    pub fn run<C: KeySource + Operator>(&mut self, console: &mut C) -> Result<()> {
        let mut view = ViewState::Summary;
        info!("Dashboard started");

        loop {
            view = match view {
                ViewState::Summary => self.summary_tick(console)?,
                ViewState::Details => self.details_tick(console)?,
                ViewState::Setter(positions) => {
                    let mut setter =
                        TpSlSetter::new(self.session.terminal(), console, &self.config.setter);
                    setter.run(&positions)?;
                    ViewState::Summary
                }
                ViewState::Exit => {
                    info!("Exit requested by operator");
                    self.session.release();
                    return Ok(());
                }
            };
        }
    }

    /// Fetch, aggregate and render the summary, then poll keys for about
    /// one refresh budget.
    pub fn summary_tick<C: KeySource + Operator>(&mut self, console: &mut C) -> Result<ViewState> {
        let terminal = self.session.terminal();
        let snapshot = fetch_snapshot(terminal)?;
        let instruments = fetch_instruments(terminal, &snapshot.positions)?;
        let totals = aggregate(&snapshot.positions, &instruments, snapshot.balance);

        console.clear()?;
        console.show(&render_summary(&totals, snapshot.balance))?;

        let refresh = &self.config.refresh;
        for _ in 0..refresh.summary_ticks() {
            match console.poll_key(refresh.summary_tick())? {
                Some(ControlKey::Toggle) => {
                    debug!("Switching to details view");
                    return Ok(ViewState::Details);
                }
                Some(ControlKey::Confirm) => {
                    info!("Opening TP/SL setter");
                    return Ok(ViewState::Setter(snapshot.positions));
                }
                Some(ControlKey::Cancel) => return Ok(ViewState::Exit),
                None => {}
            }
        }
        Ok(ViewState::Summary)
    }

    /// Render the details view once and wait for Tab or Esc.
    pub fn details_tick<C: KeySource + Operator>(&mut self, console: &mut C) -> Result<ViewState> {
        let terminal = self.session.terminal();
        let snapshot = fetch_snapshot(terminal)?;
        let instruments = fetch_instruments(terminal, &snapshot.positions)?;

        console.clear()?;
        console.show(&render_details(&snapshot.positions, &instruments))?;

        let tick = self.config.refresh.details_tick();
        loop {
            match console.poll_key(tick)? {
                Some(ControlKey::Toggle) => {
                    debug!("Switching to summary view");
                    return Ok(ViewState::Summary);
                }
                Some(ControlKey::Cancel) => return Ok(ViewState::Exit),
                Some(ControlKey::Confirm) | None => {}
            }
        }
    }
}
