// src/extract/mod.rs
//! Site-specific price extraction strategies.
//!
//! Every strategy is a pure function of page content: it either finds a price
//! for the requested commodity and city or returns `None`. Structural mismatches
//! never surface as errors; the sources are expected to change under us.

pub mod labeled_text;
pub mod positional;
pub mod table_row;

pub use labeled_text::LabeledTextExtractor;
pub use positional::PositionalExtractor;
pub use table_row::TableRowExtractor;

use crate::model::Commodity;
use once_cell::sync::OnceCell;
use regex::Regex;

/// A pluggable extraction strategy.
pub trait PriceExtractor: Send + Sync {
    fn extract(&self, page: &str, commodity: Commodity, city: &str) -> Option<f64>;
    fn name(&self) -> &'static str;
}

/// Flatten an HTML fragment into plain text: strip tags, decode entities,
/// collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_DROP: OnceCell<Regex> = OnceCell::new();
    let re_drop = RE_DROP.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap()
    });
    let out = re_drop.replace_all(s, " ");

    // Tags become spaces so adjacent cells do not glue their numbers together.
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&out, " ");

    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Lowercased, whitespace-collapsed label used for city/row comparisons.
pub fn normalize_label(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn number_regex() -> &'static Regex {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    RE_NUM.get_or_init(|| Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").unwrap())
}

/// Parse the first number in a price-ish string such as `₹ 94.72`, `Rs. 1,004.50`
/// or `94.72 (+0.10)`.
pub fn parse_price(s: &str) -> Option<f64> {
    let m = number_regex().find(s)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

/// All numbers with a fractional part, in document order, with their byte offsets.
pub(crate) fn decimal_numbers(text: &str) -> Vec<(usize, f64)> {
    number_regex()
        .find_iter(text)
        .filter(|m| m.as_str().contains('.'))
        .filter_map(|m| {
            m.as_str()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .map(|v| (m.start(), v))
        })
        .collect()
}

/// Clamp a byte index down to the nearest char boundary of `s`.
pub(crate) fn floor_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
