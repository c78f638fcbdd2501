//! # Survey output
//!
//! The synthetic catalog produced by a survey run, with absolute magnitudes attached for every
//! requested photometric system. An [`Output`] is immutable: [`Output::fsample`] returns a new
//! view over the same underlying table instead of modifying it.
//!
//! ## Columns
//!
//! Engine columns (`age`, `feh`, `smass`, `dmod`, …) are kept as produced. Magnitude columns
//! are named `<SYSTEM>_<filter>` and hold absolute magnitudes; apparent magnitudes are derived
//! on demand with [`Output::apparent_magnitudes`].
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    ananke_errors::AnankeError,
    constants::STAR_DMOD,
    exchange::{ColumnData, ExchangeTable},
};

/// Bookkeeping of a survey run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyReport {
    /// Stars produced by the engine
    pub n_generated: usize,
    /// Stars dropped because they fell outside the isochrone grids
    pub n_dropped: usize,
    /// Isochrone files that failed to load while attaching photometry, with the reason
    pub failed_isochrones: Vec<String>,
}

/// Synthetic star catalog, or a sub-sample of one.
#[derive(Debug, Clone)]
pub struct Output {
    table: Arc<ExchangeTable>,
    rows: Option<Arc<[usize]>>,
    report: Arc<SurveyReport>,
    source: Option<Utf8PathBuf>,
}

impl Output {
    pub fn new(table: ExchangeTable, report: SurveyReport) -> Self {
        Output {
            table: Arc::new(table),
            rows: None,
            report: Arc::new(report),
            source: None,
        }
    }

    pub(crate) fn with_source(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Exchange file the catalog was read from, if any.
    pub fn source_path(&self) -> Option<&Utf8Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        match &self.rows {
            Some(rows) => rows.len(),
            None => self.table.n_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.table.column_names().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.table.column(name).is_some()
    }

    /// Values of a column for the stars of this view.
    pub fn column(&self, name: &str) -> Option<ColumnData> {
        let data = self.table.column(name)?;
        Some(match &self.rows {
            Some(rows) => data.select(rows),
            None => data.clone(),
        })
    }

    /// Scalar column as `f64` for the stars of this view.
    pub fn float_column(&self, name: &str) -> Option<Vec<f64>> {
        let values = self.table.float_column(name)?;
        Some(match &self.rows {
            Some(rows) => rows.iter().map(|&i| values[i]).collect(),
            None => values.into_owned(),
        })
    }

    /// Absolute magnitudes of `filter` in `system`.
    pub fn magnitudes(&self, system: &str, filter: &str) -> Option<Vec<f64>> {
        self.float_column(&format!("{system}_{filter}"))
    }

    /// Apparent magnitudes, absolute magnitude plus the `dmod` distance modulus.
    ///
    /// `None` if the magnitude column or the `dmod` column is absent.
    pub fn apparent_magnitudes(&self, system: &str, filter: &str) -> Option<Vec<f64>> {
        let absolute = self.magnitudes(system, filter)?;
        let dmod = self.float_column(STAR_DMOD)?;
        Some(absolute.iter().zip(&dmod).map(|(m, d)| m + d).collect())
    }

    /// Stars dropped while attaching photometry.
    pub fn dropped(&self) -> usize {
        self.report.n_dropped
    }

    pub fn report(&self) -> &SurveyReport {
        &self.report
    }

    /// Underlying catalog, ignoring any sub-sampling.
    pub fn table(&self) -> &ExchangeTable {
        &self.table
    }

    /// Keep each star independently with probability `fraction`.
    ///
    /// The draw is reproducible for a given `seed`, and the returned view shares the
    /// catalog with `self`.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidParameter)` unless `0 <= fraction <= 1`.
    pub fn fsample(&self, fraction: f64, seed: u64) -> Result<Output, AnankeError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(AnankeError::InvalidParameter(format!(
                "sampling fraction {fraction} outside [0, 1]"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let current: Vec<usize> = match &self.rows {
            Some(rows) => rows.to_vec(),
            None => (0..self.table.n_rows()).collect(),
        };
        let kept: Vec<usize> = current
            .into_iter()
            .filter(|_| rng.random::<f64>() < fraction)
            .collect();
        info!(
            "Sub-sampled {} of {} stars (fraction {fraction}, seed {seed})",
            kept.len(),
            self.len()
        );
        Ok(Output {
            table: Arc::clone(&self.table),
            rows: Some(kept.into()),
            report: Arc::clone(&self.report),
            source: self.source.clone(),
        })
    }

    /// Export the stars of this view as CSV.
    ///
    /// 3-vector columns are split into `<name>_x`, `<name>_y` and `<name>_z`.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), AnankeError> {
        let mut writer = csv::Writer::from_path(path)?;
        let columns: Vec<(&str, ColumnData)> = self
            .table
            .column_names()
            .filter_map(|name| self.column(name).map(|data| (name, data)))
            .collect();

        let mut header = Vec::new();
        for (name, data) in &columns {
            match data {
                ColumnData::Vector3(_) => {
                    for axis in ["x", "y", "z"] {
                        header.push(format!("{name}_{axis}"));
                    }
                }
                _ => header.push(name.to_string()),
            }
        }
        writer.write_record(&header)?;

        for row in 0..self.len() {
            let mut record = Vec::with_capacity(header.len());
            for (_, data) in &columns {
                match data {
                    ColumnData::Float(v) => record.push(v[row].to_string()),
                    ColumnData::Integer(v) => record.push(v[row].to_string()),
                    ColumnData::Vector3(v) => record.extend(v[row].iter().map(f64::to_string)),
                }
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}
