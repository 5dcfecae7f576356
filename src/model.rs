// src/model.rs
//! Core data types shared by the fetch pipeline, the store and the trend analyzer.

use anyhow::{anyhow, Error};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fuel kinds tracked per city. The string form is what gets persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Commodity {
    Petrol,
    Diesel,
}

impl Commodity {
    pub const ALL: [Commodity; 2] = [Commodity::Petrol, Commodity::Diesel];

    pub fn as_str(self) -> &'static str {
        match self {
            Commodity::Petrol => "Petrol",
            Commodity::Diesel => "Diesel",
        }
    }

    pub fn other(self) -> Commodity {
        match self {
            Commodity::Petrol => Commodity::Diesel,
            Commodity::Diesel => Commodity::Petrol,
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commodity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "petrol" => Ok(Commodity::Petrol),
            "diesel" => Ok(Commodity::Diesel),
            other => Err(anyhow!("unknown fuel type: {other:?}")),
        }
    }
}

/// One persisted (date, city, commodity, price) fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub city: String,
    pub commodity: Commodity,
    pub price: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, city: impl Into<String>, commodity: Commodity, price: f64) -> Self {
        Self {
            date,
            city: city.into(),
            commodity,
            price,
        }
    }
}

/// What one source produced for one commodity. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub commodity: Commodity,
    pub price: Option<f64>,
    pub source_id: String,
}

/// A price accepted by the coordinator together with the source that supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    pub price: f64,
    pub source_id: String,
}

/// Result of one coordinator run. `None` means unresolved, never a guessed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub petrol: Option<ResolvedPrice>,
    pub diesel: Option<ResolvedPrice>,
    pub cancelled: bool,
}

impl FetchOutcome {
    pub fn get(&self, commodity: Commodity) -> Option<&ResolvedPrice> {
        match commodity {
            Commodity::Petrol => self.petrol.as_ref(),
            Commodity::Diesel => self.diesel.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, commodity: Commodity) -> &mut Option<ResolvedPrice> {
        match commodity {
            Commodity::Petrol => &mut self.petrol,
            Commodity::Diesel => &mut self.diesel,
        }
    }

    pub fn price(&self, commodity: Commodity) -> Option<f64> {
        self.get(commodity).map(|r| r.price)
    }

    pub fn missing(&self) -> Vec<Commodity> {
        Commodity::ALL
            .into_iter()
            .filter(|c| self.get(*c).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.petrol.is_some() && self.diesel.is_some()
    }

    pub fn resolved_count(&self) -> usize {
        Commodity::ALL.len() - self.missing().len()
    }
}
