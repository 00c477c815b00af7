use crate::portfolio::{Position, Side};
use crate::security_types::{InstrumentInfo, InstrumentMap};
use log::debug;

/// Totals shown on the summary screen, recomputed every display tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub buy_count: usize,
    pub sell_count: usize,
    pub current_pnl: f64,
    pub tp_target: f64,
    pub sl_risk: f64,
    pub risk_pct: f64,
}

/// Money value of reaching the take-profit level.
///
/// Negative when the level sits on the losing side of the open price.
pub fn tp_value(position: &Position, info: &InstrumentInfo) -> Option<f64> {
    let tp = position.take_profit()?;
    let value = info.distance_value(position.price_open, tp, position.volume);
    let losing_side = match position.side {
        Side::Buy => tp < position.price_open,
        Side::Sell => tp > position.price_open,
    };
    Some(if losing_side { -value } else { value })
}

/// Money value of reaching the stop-loss level, always recorded as a cost.
pub fn sl_value(position: &Position, info: &InstrumentInfo) -> Option<f64> {
    let sl = position.stop_loss()?;
    Some(-info.distance_value(position.price_open, sl, position.volume))
}

/// Distance to take-profit over distance to stop-loss, both from the open price.
pub fn reward_risk_ratio(position: &Position) -> Option<f64> {
    let tp = position.take_profit()?;
    let sl = position.stop_loss()?;
    let risk = (sl - position.price_open).abs();
    if risk == 0.0 {
        return None;
    }
    Some((tp - position.price_open).abs() / risk)
}

/// Share of the balance put at risk by the stop-losses, in percent.
pub fn risk_percentage(sl_total: f64, balance: f64) -> f64 {
    if balance == 0.0 {
        0.0
    } else {
        (sl_total / balance).abs() * 100.0
    }
}

/// Fold open positions into summary totals.
///
/// Positions whose symbol has no instrument metadata contribute nothing.
/// No rounding happens here.
pub fn aggregate(positions: &[Position], instruments: &InstrumentMap, balance: f64) -> Aggregate {
    let mut totals = Aggregate::default();

    for position in positions {
        let Some(info) = instruments.get(&position.symbol) else {
            debug!("Skipping {} #{}: instrument unresolved", position.symbol, position.ticket);
            continue;
        };

        match position.side {
            Side::Buy => totals.buy_count += 1,
            Side::Sell => totals.sell_count += 1,
        }
        totals.current_pnl += position.profit;

        if let Some(value) = tp_value(position, info) {
            totals.tp_target += value;
        }
        if let Some(value) = sl_value(position, info) {
            totals.sl_risk += value;
        }
    }

    totals.risk_pct = risk_percentage(totals.sl_risk, balance);
    totals
}
