// src/extract/labeled_text.rs
//! Label-anchored extraction over flattened page text.
//!
//! A price is the first decimal number that follows a commodity label within
//! `max_gap` bytes, cut short at the next label of a different commodity so a
//! diesel figure is never read as petrol. With `require_city`, only label
//! occurrences that have the city name within `city_span` bytes qualify.

use anyhow::{Context, Result};
use regex::Regex;

use super::{decimal_numbers, floor_boundary, normalize_text, PriceExtractor};
use crate::model::Commodity;

pub const DEFAULT_MAX_GAP: usize = 80;
pub const DEFAULT_CITY_SPAN: usize = 160;

#[derive(Debug, Clone)]
pub struct LabeledTextExtractor {
    petrol: Regex,
    diesel: Regex,
    max_gap: usize,
    require_city: bool,
    city_span: usize,
}

impl LabeledTextExtractor {
    pub fn new(petrol_label: &str, diesel_label: &str, max_gap: usize, require_city: bool) -> Result<Self> {
        Ok(Self {
            petrol: label_regex(petrol_label)?,
            diesel: label_regex(diesel_label)?,
            max_gap,
            require_city,
            city_span: DEFAULT_CITY_SPAN,
        })
    }

    pub fn with_city_span(mut self, span: usize) -> Self {
        self.city_span = span;
        self
    }

    fn label(&self, commodity: Commodity) -> &Regex {
        match commodity {
            Commodity::Petrol => &self.petrol,
            Commodity::Diesel => &self.diesel,
        }
    }

    fn other_label(&self, commodity: Commodity) -> &Regex {
        match commodity {
            Commodity::Petrol => &self.diesel,
            Commodity::Diesel => &self.petrol,
        }
    }

    fn near_city(&self, text: &str, city_re: &Regex, at: usize) -> bool {
        let lo = floor_boundary(text, at.saturating_sub(self.city_span));
        let hi = floor_boundary(text, at.saturating_add(self.city_span));
        city_re.is_match(&text[lo..hi])
    }
}

fn label_regex(label: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(label.trim())))
        .with_context(|| format!("compiling label pattern for {label:?}"))
}

impl PriceExtractor for LabeledTextExtractor {
    fn extract(&self, page: &str, commodity: Commodity, city: &str) -> Option<f64> {
        let text = normalize_text(page);
        let city_re = if self.require_city {
            Some(label_regex(city).ok()?)
        } else {
            None
        };

        for m in self.label(commodity).find_iter(&text) {
            if let Some(re) = &city_re {
                if !self.near_city(&text, re, m.start()) {
                    continue;
                }
            }

            let start = m.end();
            let mut end = floor_boundary(&text, start.saturating_add(self.max_gap));
            if let Some(next) = self.other_label(commodity).find(&text[start..end]) {
                end = start + next.start();
            }

            if let Some((_, v)) = decimal_numbers(&text[start..end]).first() {
                return Some(*v);
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "labeled_text"
    }
}
