//! # Exchange files: the binary boundary with the survey engine
//!
//! Particles, kernel density estimates and the synthetic catalog produced by the engine all
//! travel through one self-describing little-endian container. This module holds the in-memory
//! side of that container ([`ExchangeTable`], [`ColumnData`]) and the naming conventions that
//! let the engine find the files of a given name tag.
//!
//! Modules
//! -----------------
//! * [`format`](crate::exchange::format) – Header layout, nom decoder and encoder.
//! * [`writer`](crate::exchange::writer) – [`ExchangeFileWriter`](crate::exchange::writer::ExchangeFileWriter),
//!   serializes a [`ParticleDataset`](crate::input::particle_dataset::ParticleDataset) into the two input files.
//! * [`reader`](crate::exchange::reader) – [`ExchangeFileReader`](crate::exchange::reader::ExchangeFileReader),
//!   decodes any exchange file back into an [`ExchangeTable`].
//!
//! File naming
//! -----------------
//! For a name tag `sim` and `ngb = 64` the engine expects, in one directory:
//!
//! ```text
//! sim.ankx              particle records (pos3, vel3, mass, age, feh, extras…)
//! sim_d6n64_den.ankx    density side-table (rho_pos, rho_vel) + attributes ngb, knorm
//! ```
use std::borrow::Cow;

use camino::{Utf8Path, Utf8PathBuf};
use nalgebra::Vector3;

use crate::{
    ananke_errors::AnankeError,
    constants::{EXCHANGE_EXTENSION, HDIM},
};

pub mod format;
pub mod reader;
pub mod writer;

/// On-disk element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    /// One `f64` per row
    Float = 0,
    /// One `i64` per row
    Integer = 1,
    /// Three `f64` per row, stored row-interleaved
    Vector3 = 2,
}

impl TryFrom<u8> for ColumnType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ColumnType::Float),
            1 => Ok(ColumnType::Integer),
            2 => Ok(ColumnType::Vector3),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Float => write!(f, "f64"),
            ColumnType::Integer => write!(f, "i64"),
            ColumnType::Vector3 => write!(f, "f64x3"),
        }
    }
}

/// Values of one column, already validated and converted to an on-disk type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Integer(Vec<i64>),
    Vector3(Vec<Vector3<f64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Integer(v) => v.len(),
            ColumnData::Vector3(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Integer(_) => ColumnType::Integer,
            ColumnData::Vector3(_) => ColumnType::Vector3,
        }
    }

    /// Scalar view of the column as `f64`.
    ///
    /// Float columns are borrowed, integer columns are converted; 3-vector columns have no
    /// scalar view and return `None`.
    pub fn as_float(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            ColumnData::Float(v) => Some(Cow::Borrowed(v.as_slice())),
            ColumnData::Integer(v) => Some(Cow::Owned(v.iter().map(|&i| i as f64).collect())),
            ColumnData::Vector3(_) => None,
        }
    }

    /// Copy the given rows, in the given order.
    pub(crate) fn select(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Integer(v) => ColumnData::Integer(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Vector3(v) => ColumnData::Vector3(rows.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// An ordered set of equal-length named columns plus scalar attributes.
///
/// This is the decoded form of every exchange file. Column order is significant: it is the
/// order in which the columns are written, which the engine relies on for particle files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExchangeTable {
    n_rows: usize,
    attributes: Vec<(String, f64)>,
    columns: Vec<(String, ColumnData)>,
}

impl ExchangeTable {
    /// Create an empty table whose columns will all hold `n_rows` values.
    pub fn new(n_rows: usize) -> Self {
        ExchangeTable {
            n_rows,
            attributes: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn attributes(&self) -> &[(String, f64)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Set a scalar attribute, replacing any previous value with the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append a column at the end of the table.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::Schema)` if the name is already used or the length differs from
    ///   [`n_rows`](Self::n_rows).
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        data: ColumnData,
    ) -> Result<(), AnankeError> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(AnankeError::Schema(format!("duplicate column '{name}'")));
        }
        self.check_length(&name, &data)?;
        self.columns.push((name, data));
        Ok(())
    }

    /// Replace the column with the same name, or append it if absent.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        data: ColumnData,
    ) -> Result<(), AnankeError> {
        let name = name.into();
        self.check_length(&name, &data)?;
        match self.columns.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = data,
            None => self.columns.push((name, data)),
        }
        Ok(())
    }

    fn check_length(&self, name: &str, data: &ColumnData) -> Result<(), AnankeError> {
        if data.len() != self.n_rows {
            return Err(AnankeError::Schema(format!(
                "column '{name}' has length {}, expected {}",
                data.len(),
                self.n_rows
            )));
        }
        Ok(())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.columns.iter().map(|(name, data)| (name.as_str(), data))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, data)| data)
    }

    /// Scalar `f64` view of a column, see [`ColumnData::as_float`].
    pub fn float_column(&self, name: &str) -> Option<Cow<'_, [f64]>> {
        self.column(name).and_then(ColumnData::as_float)
    }

    /// Build a new table holding only the given rows (attributes are kept).
    pub fn select_rows(&self, rows: &[usize]) -> ExchangeTable {
        ExchangeTable {
            n_rows: rows.len(),
            attributes: self.attributes.clone(),
            columns: self
                .columns
                .iter()
                .map(|(name, data)| (name.clone(), data.select(rows)))
                .collect(),
        }
    }
}

/// Locations of the particle file and its companion density file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeFiles {
    pub particles: Utf8PathBuf,
    pub densities: Utf8PathBuf,
}

impl ExchangeFiles {
    /// Paths the engine looks up for `name` and `ngb` inside `directory`.
    pub fn conventional(directory: &Utf8Path, name: &str, ngb: u32) -> Self {
        ExchangeFiles {
            particles: directory.join(particle_file_name(name)),
            densities: directory.join(density_file_name(name, ngb)),
        }
    }
}

/// `<name>.ankx`
pub fn particle_file_name(name: &str) -> String {
    format!("{name}.{EXCHANGE_EXTENSION}")
}

/// `<name>_d6n<ngb>_den.ankx`
pub fn density_file_name(name: &str, ngb: u32) -> String {
    format!("{name}_d{HDIM}n{ngb}_den.{EXCHANGE_EXTENSION}")
}
