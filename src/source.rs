// src/source.rs
//! Source registry: which pages to hit, in which order, with which extractor.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::extract::{
    labeled_text::DEFAULT_MAX_GAP, LabeledTextExtractor, PositionalExtractor, PriceExtractor,
    TableRowExtractor,
};

/// Extraction strategy for a configured source (`kind = "..."` in TOML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    TableRow {
        #[serde(default)]
        label_column: usize,
        #[serde(default)]
        petrol_column: Option<usize>,
        #[serde(default)]
        diesel_column: Option<usize>,
    },
    LabeledText {
        #[serde(default = "default_petrol_label")]
        petrol_label: String,
        #[serde(default = "default_diesel_label")]
        diesel_label: String,
        #[serde(default = "default_max_gap")]
        max_gap: usize,
        #[serde(default)]
        require_city: bool,
    },
    /// Anchored on the configured city; no extra settings.
    Positional,
}

fn default_petrol_label() -> String {
    "Petrol".into()
}
fn default_diesel_label() -> String {
    "Diesel".into()
}
fn default_max_gap() -> usize {
    DEFAULT_MAX_GAP
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub url: String,
    #[serde(flatten)]
    pub kind: SourceKind,
}

pub struct Source {
    pub id: String,
    pub url: String,
    pub extractor: Box<dyn PriceExtractor>,
}

impl Source {
    pub fn new(id: impl Into<String>, url: impl Into<String>, extractor: Box<dyn PriceExtractor>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            extractor,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        if cfg.id.trim().is_empty() || cfg.url.trim().is_empty() {
            bail!("source entries need a non-empty id and url");
        }
        let extractor: Box<dyn PriceExtractor> = match &cfg.kind {
            SourceKind::TableRow {
                label_column,
                petrol_column,
                diesel_column,
            } => Box::new(TableRowExtractor::new(*label_column, *petrol_column, *diesel_column)),
            SourceKind::LabeledText {
                petrol_label,
                diesel_label,
                max_gap,
                require_city,
            } => Box::new(LabeledTextExtractor::new(
                petrol_label,
                diesel_label,
                *max_gap,
                *require_city,
            )?),
            SourceKind::Positional => Box::new(PositionalExtractor),
        };
        Ok(Self::new(cfg.id.clone(), cfg.url.clone(), extractor))
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("extractor", &self.extractor.name())
            .finish()
    }
}

/// Build sources in the configured (priority) order.
pub fn build_sources(cfgs: &[SourceConfig]) -> Result<Vec<Source>> {
    cfgs.iter().map(Source::from_config).collect()
}

/// Built-in registry for New Delhi. Label-aware strategies first, the
/// positional heuristic last.
pub fn default_source_configs() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "goodreturns-petrol-table".into(),
            url: "https://www.goodreturns.in/petrol-price.html".into(),
            kind: SourceKind::TableRow {
                label_column: 0,
                petrol_column: Some(1),
                diesel_column: None,
            },
        },
        SourceConfig {
            id: "goodreturns-diesel-table".into(),
            url: "https://www.goodreturns.in/diesel-price.html".into(),
            kind: SourceKind::TableRow {
                label_column: 0,
                petrol_column: None,
                diesel_column: Some(1),
            },
        },
        SourceConfig {
            id: "goodreturns-city-labels".into(),
            url: "https://www.goodreturns.in/petrol-price-in-new-delhi.html".into(),
            kind: SourceKind::LabeledText {
                petrol_label: default_petrol_label(),
                diesel_label: default_diesel_label(),
                max_gap: DEFAULT_MAX_GAP,
                require_city: true,
            },
        },
        SourceConfig {
            id: "goodreturns-city-positional".into(),
            url: "https://www.goodreturns.in/petrol-price-in-new-delhi.html".into(),
            kind: SourceKind::Positional,
        },
    ]
}
