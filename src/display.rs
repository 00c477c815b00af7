//! Text screens for the dashboard. Every function here is pure: it only
//! builds the text, the caller decides where it goes.

use crate::portfolio::Position;
use crate::risk::{Aggregate, reward_risk_ratio};
use crate::security_types::InstrumentMap;
use crossterm::style::{Color, Stylize};
use std::fmt::Write;

pub const SUMMARY_HINT: &str = "TAB = Toggle Summary/Details | ENTER = Set TP/SL | ESC = Exit";
pub const DETAILS_HINT: &str = "TAB = Toggle Summary/Details | ESC = Exit";

/// Green for gains, red for losses, white when flat.
pub fn tone(value: f64) -> Color {
    if value > 0.0 {
        Color::Green
    } else if value < 0.0 {
        Color::Red
    } else {
        Color::White
    }
}

fn heading(title: &str) -> String {
    format!("\n{}\n\n", format!("========= {} =========", title).with(Color::White))
}

pub fn render_summary(aggregate: &Aggregate, balance: f64) -> String {
    let mut text = heading("SUMMARY");
    let pnl = format!("${:.2}", aggregate.current_pnl);

    let _ = writeln!(
        text,
        "Trades Summary     : BUY = {}   | SELL = {}",
        aggregate.buy_count, aggregate.sell_count
    );
    let _ = writeln!(text, "Total Current P&L  : {}", pnl.with(tone(aggregate.current_pnl)));
    let _ = writeln!(
        text,
        "{}",
        format!("TP Target          : ${:.2}", aggregate.tp_target).with(Color::Green)
    );
    let _ = writeln!(
        text,
        "{}",
        format!("SL Risk            : ${:.2}", aggregate.sl_risk).with(Color::Red)
    );
    let _ = writeln!(text, "Risk on Account    : {:.2}%", aggregate.risk_pct);
    let _ = writeln!(text, "Account Balance    : ${:.2}", balance);
    let _ = writeln!(text, "\n{}", SUMMARY_HINT.with(Color::Yellow));
    text
}

pub fn render_details(positions: &[Position], instruments: &InstrumentMap) -> String {
    let mut text = heading("DETAILS");
    if positions.is_empty() {
        text.push_str("No open trades.\n");
        return text;
    }

    for position in positions {
        if !instruments.contains_key(&position.symbol) {
            continue;
        }
        let _ = writeln!(
            text,
            "{} | {} | Volume: {:.2}",
            position.symbol,
            position.side.label(),
            position.volume
        );
        match position.take_profit() {
            Some(tp) => {
                let _ = writeln!(text, "TP Price          : {:.2}", tp);
            }
            None => text.push_str("TP Price          : Not Set\n"),
        }
        match position.stop_loss() {
            Some(sl) => {
                let _ = writeln!(text, "SL Price          : {:.2}", sl);
            }
            None => text.push_str("SL Price          : Not Set\n"),
        }
        if let Some(ratio) = reward_risk_ratio(position) {
            let _ = writeln!(text, "R/R Ratio         : {:.2}", ratio);
        }
        text.push('\n');
    }

    let _ = writeln!(text, "\n{}", DETAILS_HINT.with(Color::Yellow));
    text
}

/// Position list shown when the TP/SL setter opens.
pub fn render_setter_screen(positions: &[Position]) -> String {
    let mut text = format!(
        "{}\n\n",
        "========= TP/SL CONFIGURATION =========".with(Color::White)
    );
    let _ = writeln!(text, "Found {} open trade(s):\n", positions.len());

    for (i, position) in positions.iter().enumerate() {
        let _ = writeln!(
            text,
            " {}. {} | {:<4} | Volume: {:.2} | Open: {:.5} | TP: {:.5} | SL: {:.5}",
            i + 1,
            position.symbol,
            position.side.label(),
            position.volume,
            position.price_open,
            position.take_profit().unwrap_or(0.0),
            position.stop_loss().unwrap_or(0.0)
        );
    }

    let _ = writeln!(text, "\n{}", "Enter TP/SL values (0 to skip)".with(Color::Yellow));
    text
}

/// One cell of the startup progress bar, fading from grey to white.
pub fn progress_cell(index: usize, steps: usize) -> String {
    let color = if index < steps / 3 {
        Color::DarkGrey
    } else if index < (2 * steps) / 3 {
        Color::Grey
    } else {
        Color::White
    };
    format!("{}", "█".with(color))
}
