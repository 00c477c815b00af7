//! Operator-facing terminal: screen output, line prompts and control keys.

use anyhow::{Result, bail};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, SetSize};
use log::warn;
use std::io::{self, BufRead, Stdout, Write};
use std::thread;
use std::time::Duration;

/// The three keys the dashboard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// Tab: switch between summary and details
    Toggle,
    /// Enter: open the TP/SL setter
    Confirm,
    /// Esc or Ctrl-C: leave the dashboard
    Cancel,
}

impl ControlKey {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        match key.code {
            KeyCode::Tab => Some(ControlKey::Toggle),
            KeyCode::Enter => Some(ControlKey::Confirm),
            KeyCode::Esc => Some(ControlKey::Cancel),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(ControlKey::Cancel)
            }
            _ => None,
        }
    }
}

/// Screen and line-mode input used by the startup check, dashboard and setter.
pub trait Operator {
    fn clear(&mut self) -> Result<()>;
    fn show(&mut self, text: &str) -> Result<()>;
    /// Print `label` and block until the operator enters a line.
    fn prompt(&mut self, label: &str) -> Result<String>;
    fn pause(&mut self, duration: Duration);
}

/// Non-blocking source of control keys.
pub trait KeySource {
    /// Wait at most `timeout` for a key; unrecognised keys yield `None`.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<ControlKey>>;
}

/// Read one operator line, trimmed. End of input is an error so callers
/// never spin on an empty answer.
pub fn read_operator_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("operator input closed");
    }
    Ok(line.trim().to_string())
}

/// Crossterm-backed console on stdin/stdout.
///
/// Raw mode is switched on lazily for key polling and back off before any
/// output or line prompt, so printed newlines and typed prices behave normally.
pub struct Console {
    out: Stdout,
    raw: bool,
}

impl Console {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            raw: false,
        }
    }

    /// Best-effort resize to the dashboard's 100x30 layout.
    pub fn resize(&mut self) {
        if let Err(e) = execute!(self.out, SetSize(100, 30)) {
            warn!("Could not resize terminal: {}", e);
        }
    }

    fn cooked(&mut self) -> Result<()> {
        if self.raw {
            terminal::disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if self.raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}

impl Operator for Console {
    fn clear(&mut self) -> Result<()> {
        self.cooked()?;
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(())
    }

    fn show(&mut self, text: &str) -> Result<()> {
        self.cooked()?;
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> Result<String> {
        self.show(label)?;
        read_operator_line(&mut io::stdin().lock())
    }

    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl KeySource for Console {
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<ControlKey>> {
        if !self.raw {
            terminal::enable_raw_mode()?;
            self.raw = true;
        }
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(ControlKey::from_key(&key));
                }
            }
        }
        Ok(None)
    }
}
