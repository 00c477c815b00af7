#![allow(dead_code)]

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::time::Duration;
use tpsl_dashboard::console::{ControlKey, KeySource, Operator};
use tpsl_dashboard::paper::PaperConfig;
use tpsl_dashboard::portfolio::{Position, Side};
use tpsl_dashboard::security_types::InstrumentInfo;

/// Console double: replays typed lines and keys, records everything shown.
#[derive(Default)]
pub struct ScriptedConsole {
    lines: VecDeque<String>,
    keys: VecDeque<Option<ControlKey>>,
    pub screen: String,
    pub prompts: Vec<String>,
    pub clears: usize,
    pub pauses: Vec<Duration>,
    pub polls: usize,
}

impl ScriptedConsole {
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn keys(mut self, keys: &[Option<ControlKey>]) -> Self {
        self.keys = keys.iter().copied().collect();
        self
    }

    /// Screen text with ANSI colour sequences removed.
    pub fn plain_screen(&self) -> String {
        strip_ansi(&self.screen)
    }
}

impl Operator for ScriptedConsole {
    fn clear(&mut self) -> Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn show(&mut self, text: &str) -> Result<()> {
        self.screen.push_str(text);
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> Result<String> {
        self.prompts.push(label.to_string());
        self.screen.push_str(label);
        match self.lines.pop_front() {
            Some(line) => Ok(line),
            None => bail!("script ran out of input at prompt '{}'", label),
        }
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

impl KeySource for ScriptedConsole {
    /// An exhausted script presses Esc.
    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<ControlKey>> {
        self.polls += 1;
        Ok(self.keys.pop_front().unwrap_or(Some(ControlKey::Cancel)))
    }
}

pub fn strip_ansi(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            plain.push(c);
        }
    }
    plain
}

pub fn position(ticket: u64, symbol: &str, side: Side, open: f64, tp: Option<f64>, sl: Option<f64>) -> Position {
    Position {
        ticket,
        symbol: symbol.to_string(),
        side,
        volume: 1.0,
        price_open: open,
        tp,
        sl,
        profit: 0.0,
    }
}

pub fn paper_book(positions: Vec<Position>, balance: f64) -> PaperConfig {
    let mut config = PaperConfig {
        balance,
        trade_allowed: true,
        instruments: Default::default(),
        positions,
    };
    config
        .instruments
        .insert("EURUSD".to_string(), InstrumentInfo::new(0.0001, 1.0));
    config
        .instruments
        .insert("GBPUSD".to_string(), InstrumentInfo::new(0.0001, 1.0));
    config
}
