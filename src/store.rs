// src/store.rs
//! CSV-backed time series of daily fuel prices.
//!
//! File layout: `Date,City,FuelType,Price`, one row per (date, city, fuel).
//! Every write reloads the whole file, applies the change in memory and
//! replaces the file through a temp file + rename, so readers never see a half
//! written state and a failed write leaves the previous file untouched.
//!
//! Single writer assumed: two processes upserting at once can lose an update.
//! Concurrent deployments need a file lock around `upsert_many`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::ensure_metrics_described;
use crate::model::{Commodity, Observation};

type Key = (NaiveDate, String, Commodity);

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "FuelType")]
    fuel_type: String,
    #[serde(rename = "Price")]
    price: String,
}

impl CsvRow {
    fn parse(self) -> Result<Observation> {
        // Accept "2025-07-10" as well as "2025-07-10 00:00:00".
        let date_part = self.date.trim().get(..10).unwrap_or(self.date.trim());
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .with_context(|| format!("bad date {:?}", self.date))?;
        let city = self.city.trim();
        if city.is_empty() {
            bail!("empty city");
        }
        let commodity: Commodity = self.fuel_type.parse()?;
        let price: f64 = self
            .price
            .trim()
            .parse()
            .with_context(|| format!("bad price {:?}", self.price))?;
        if !(price.is_finite() && price > 0.0) {
            bail!("non-positive price {price}");
        }
        Ok(Observation::new(date, city, commodity, price))
    }

    fn from_observation(o: &Observation) -> Self {
        Self {
            date: o.date.format("%Y-%m-%d").to_string(),
            city: o.city.clone(),
            fuel_type: o.commodity.as_str().to_string(),
            price: o.price.to_string(),
        }
    }
}

/// How one batch changed the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl UpsertSummary {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

struct Loaded {
    rows: BTreeMap<Key, f64>,
    /// The file exists but could not be read at all.
    unreadable: bool,
}

/// Handle to one time-series file. Cheap to construct; holds no data between calls.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    path: PathBuf,
}

impl TimeSeriesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace a single observation.
    pub fn upsert(&self, date: NaiveDate, city: &str, commodity: Commodity, price: f64) -> Result<UpsertSummary> {
        self.upsert_many(&[Observation::new(date, city, commodity, price)])
    }

    /// Insert or replace a batch in one rewrite: either every observation lands
    /// or none does. Re-applying an identical batch does not touch the file.
    pub fn upsert_many(&self, observations: &[Observation]) -> Result<UpsertSummary> {
        for o in observations {
            if o.city.trim().is_empty() {
                bail!("observation without city");
            }
            if !(o.price.is_finite() && o.price > 0.0) {
                bail!("refusing to store non-positive price {} for {}", o.price, o.commodity);
            }
        }

        let Loaded { mut rows, unreadable } = self.load();
        let mut summary = UpsertSummary::default();
        for o in observations {
            let key = (o.date, o.city.trim().to_string(), o.commodity);
            match rows.insert(key, o.price) {
                None => summary.inserted += 1,
                Some(prev) if prev == o.price => summary.unchanged += 1,
                Some(_) => summary.replaced += 1,
            }
        }

        if !summary.changed() {
            return Ok(summary);
        }
        if unreadable {
            self.preserve_unreadable();
        }
        self.write_all(&rows)?;
        counter!("store_writes_total").increment(1);
        info!(
            target: "store",
            path = %self.path.display(),
            inserted = summary.inserted,
            replaced = summary.replaced,
            "time series updated"
        );
        Ok(summary)
    }

    /// Observations for one city and fuel, ascending by date.
    pub fn read(&self, city: &str, commodity: Commodity) -> Vec<Observation> {
        self.read_all()
            .into_iter()
            .filter(|o| o.city == city.trim() && o.commodity == commodity)
            .collect()
    }

    /// Most recent observation for one city and fuel.
    pub fn latest(&self, city: &str, commodity: Commodity) -> Option<Observation> {
        self.read(city, commodity).pop()
    }

    /// Every valid observation, ordered by (date, city, fuel).
    pub fn read_all(&self) -> Vec<Observation> {
        self.load()
            .rows
            .into_iter()
            .map(|((date, city, commodity), price)| Observation::new(date, city, commodity, price))
            .collect()
    }

    pub fn cities(&self) -> Vec<String> {
        let mut out: Vec<String> = self.load().rows.into_keys().map(|(_, city, _)| city).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Missing, empty or unreadable files all load as an empty series.
    /// Rows that fail to parse are skipped; duplicate keys keep the last row.
    fn load(&self) -> Loaded {
        ensure_metrics_described();
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Loaded {
                    rows: BTreeMap::new(),
                    unreadable: false,
                }
            }
            Err(e) => {
                warn!(
                    target: "store",
                    path = %self.path.display(),
                    error = ?e,
                    "time series unreadable, treating as empty"
                );
                return Loaded {
                    rows: BTreeMap::new(),
                    unreadable: true,
                };
            }
        };

        let mut rows = BTreeMap::new();
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());
        for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
            // +2: header line and 1-based numbering
            let line = i + 2;
            match rec.map_err(anyhow::Error::from).and_then(CsvRow::parse) {
                Ok(o) => {
                    rows.insert((o.date, o.city, o.commodity), o.price);
                }
                Err(e) => {
                    warn!(target: "store", line, error = %e, "dropping malformed row");
                    counter!("store_rows_dropped_total").increment(1);
                }
            }
        }
        Loaded {
            rows,
            unreadable: false,
        }
    }

    fn write_all(&self, rows: &BTreeMap<Key, f64>) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        if rows.is_empty() {
            wtr.write_record(["Date", "City", "FuelType", "Price"])?;
        }
        for ((date, city, commodity), price) in rows {
            let o = Observation::new(*date, city.clone(), *commodity, *price);
            wtr.serialize(CsvRow::from_observation(&o))?;
        }
        let data = wtr
            .into_inner()
            .map_err(|e| anyhow!("flushing csv buffer: {e}"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let tmp = self.sibling(".tmp");
        let res = (|| -> Result<()> {
            let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(&data)?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
                .with_context(|| format!("replacing {}", self.path.display()))?;
            Ok(())
        })();
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res
    }

    /// Move an unreadable file aside before it gets replaced.
    fn preserve_unreadable(&self) {
        let aside = self.sibling(".unreadable");
        match fs::rename(&self.path, &aside) {
            Ok(()) => warn!(
                target: "store",
                path = %aside.display(),
                "unreadable time series moved aside"
            ),
            Err(e) => warn!(
                target: "store",
                path = %self.path.display(),
                error = ?e,
                "could not move unreadable time series aside"
            ),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}
