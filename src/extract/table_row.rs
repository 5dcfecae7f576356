// src/extract/table_row.rs
//! City-wise price tables: find the `<tr>` whose label cell equals the city and
//! read the configured column for the commodity.

use scraper::{ElementRef, Html, Selector};

use super::{normalize_label, normalize_text, parse_price, PriceExtractor};
use crate::model::Commodity;

#[derive(Debug, Clone)]
pub struct TableRowExtractor {
    /// Column holding the city label (usually 0).
    pub label_column: usize,
    pub petrol_column: Option<usize>,
    pub diesel_column: Option<usize>,
}

impl Default for TableRowExtractor {
    /// City | Petrol | Change | Diesel | Change
    fn default() -> Self {
        Self {
            label_column: 0,
            petrol_column: Some(1),
            diesel_column: Some(3),
        }
    }
}

impl TableRowExtractor {
    pub fn new(label_column: usize, petrol_column: Option<usize>, diesel_column: Option<usize>) -> Self {
        Self {
            label_column,
            petrol_column,
            diesel_column,
        }
    }

    fn column_for(&self, commodity: Commodity) -> Option<usize> {
        match commodity {
            Commodity::Petrol => self.petrol_column,
            Commodity::Diesel => self.diesel_column,
        }
    }

    /// Cells of the first row whose label cell matches `city`. Only the row's
    /// own `<td>`/`<th>` children count, so nested tables and omitted end tags
    /// do not shift the columns.
    fn city_row(&self, page: &str, city: &str) -> Option<Vec<String>> {
        let doc = Html::parse_document(page);
        let rows = Selector::parse("tr").ok()?;

        let want = normalize_label(city);
        doc.select(&rows).find_map(|row| {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| matches!(el.value().name(), "td" | "th"))
                .map(|cell| normalize_text(&cell.inner_html()))
                .collect();
            let label = cells.get(self.label_column)?;
            (normalize_label(label) == want).then_some(cells)
        })
    }
}

impl PriceExtractor for TableRowExtractor {
    fn extract(&self, page: &str, commodity: Commodity, city: &str) -> Option<f64> {
        let col = self.column_for(commodity)?;
        let cells = self.city_row(page, city)?;
        let price = cells.get(col).and_then(|c| parse_price(c));
        if price.is_none() {
            tracing::debug!(
                target: "fetch",
                extractor = self.name(),
                %commodity,
                column = col,
                cells = cells.len(),
                "city row found but price cell missing or unparseable"
            );
        }
        price
    }

    fn name(&self) -> &'static str {
        "table_row"
    }
}
