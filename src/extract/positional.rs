// src/extract/positional.rs
//! Last-resort heuristic: the first two decimal numbers after the city name
//! are petrol then diesel. Only registered behind label-aware strategies.

use super::{decimal_numbers, normalize_text, PriceExtractor};
use crate::model::Commodity;
use regex::Regex;

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalExtractor;

impl PriceExtractor for PositionalExtractor {
    /// A page that never names `city` is about some other city: absent.
    fn extract(&self, page: &str, commodity: Commodity, city: &str) -> Option<f64> {
        let text = normalize_text(page);
        let city_re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(city.trim()))).ok()?;
        let start = city_re.find(&text)?.end();

        let nums = decimal_numbers(&text[start..]);
        let idx = match commodity {
            Commodity::Petrol => 0,
            Commodity::Diesel => 1,
        };
        nums.get(idx).map(|(_, v)| *v)
    }

    fn name(&self) -> &'static str {
        "positional"
    }
}
