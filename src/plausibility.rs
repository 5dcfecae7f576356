// src/plausibility.rs
//! Range checks for extracted prices.

use serde::{Deserialize, Serialize};

use crate::model::Commodity;

/// Closed interval `[min, max]` of realistic retail prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        v.is_finite() && v >= self.min && v <= self.max
    }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityFilter {
    pub petrol: PlausibleRange,
    pub diesel: PlausibleRange,
}

impl Default for PlausibilityFilter {
    fn default() -> Self {
        Self {
            petrol: PlausibleRange::new(85.0, 105.0),
            diesel: PlausibleRange::new(75.0, 100.0),
        }
    }
}

impl PlausibilityFilter {
    pub fn range(&self, commodity: Commodity) -> PlausibleRange {
        match commodity {
            Commodity::Petrol => self.petrol,
            Commodity::Diesel => self.diesel,
        }
    }

    /// Accept `candidate` if it lies inside the commodity's configured range.
    pub fn validate(&self, commodity: Commodity, candidate: f64) -> bool {
        let range = self.range(commodity);
        let ok = range.contains(candidate);
        if !ok {
            tracing::warn!(
                target: "fetch",
                %commodity,
                candidate,
                min = range.min,
                max = range.max,
                "price outside plausible range, rejected"
            );
        }
        ok
    }

    /// Identical petrol and diesel figures almost always mean both were read
    /// from the same piece of text.
    pub fn is_collision(&self, petrol: f64, diesel: f64) -> bool {
        (petrol - diesel).abs() < 1e-9
    }
}
