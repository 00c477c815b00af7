use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Instrument metadata keyed by symbol, resolved once per render.
pub type InstrumentMap = HashMap<String, InstrumentInfo>;

/// Price granularity and money value of one tick for a traded symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InstrumentInfo {
    /// Smallest price increment ("point")
    pub point: f64,
    /// Money value of one point for one unit of volume
    pub tick_value: f64,
}

impl InstrumentInfo {
    pub fn new(point: f64, tick_value: f64) -> Self {
        Self { point, tick_value }
    }

    /// A zero or negative point cannot convert distances and is treated as unresolved.
    pub fn is_usable(&self) -> bool {
        self.point > 0.0 && self.point.is_finite()
    }

    /// Number of points between two prices, always non-negative.
    pub fn ticks_between(&self, from: f64, to: f64) -> f64 {
        (to - from).abs() / self.point
    }

    /// Money value of moving `volume` units across the distance between two prices.
    pub fn distance_value(&self, from: f64, to: f64, volume: f64) -> f64 {
        self.ticks_between(from, to) * self.tick_value * volume
    }
}
