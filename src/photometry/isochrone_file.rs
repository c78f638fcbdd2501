//! # Isochrone files
//!
//! One file of a Padova-style isochrone grid: a block of `#` comment lines whose last line names
//! the columns, followed by whitespace-separated numeric rows. The metallicity of the grid node
//! is encoded in the file name, `output_<metallicity>.dat`.
//!
//! ## Lazy loading
//!
//! An [`IsochroneFile`] starts [`Unloaded`](IsochroneState::Unloaded). The first call to
//! [`column_names`](IsochroneFile::column_names) reads the header only; the first call to
//! [`data`](IsochroneFile::data) reads the whole table. Both results are cached in
//! [`OnceCell`]s for the lifetime of the object and never recomputed, so a file can be shared
//! across threads behind an `Arc` once discovered.
//!
//! ```text
//! # Padova isochrones, PS1 photometry
//! # Age   M_ini   logL   logT   logg   gP1    rP1 ...
//! 8.00    0.10    -2.9   3.49   5.1    15.2   13.9 ...
//! ```
use std::{
    fmt,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

use super::isochrone_table::IsochroneTable;
use crate::{
    ananke_errors::AnankeError,
    constants::{Metallicity, ISOCHRONE_COMMENT, ISOCHRONE_PREFIX, ISOCHRONE_SUFFIX},
};

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "^{}(.+){}$",
        regex::escape(ISOCHRONE_PREFIX),
        regex::escape(ISOCHRONE_SUFFIX)
    ))
    .expect("isochrone file name pattern is a valid regex")
});

/// How much of an isochrone file has been read so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsochroneState {
    Unloaded,
    HeaderParsed,
    DataLoaded,
}

#[derive(Debug)]
pub struct IsochroneFile {
    path: Utf8PathBuf,
    metallicity: OnceCell<Metallicity>,
    column_names: OnceCell<Vec<String>>,
    data: OnceCell<IsochroneTable>,
}

impl IsochroneFile {
    /// Refer to an existing file; nothing is read until first access.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        IsochroneFile {
            path: path.into(),
            metallicity: OnceCell::new(),
            column_names: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    /// Write `table` as an isochrone file and open it.
    ///
    /// The header is a single comment line with the column names and the rows are written in
    /// (`Age`, `M_ini`) order. Parent directories are created if needed.
    pub fn create(path: impl Into<Utf8PathBuf>, table: &IsochroneTable) -> Result<Self, AnankeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        writeln!(out, "{ISOCHRONE_COMMENT} {}", table.columns().join(" "))?;
        for row in table.rows() {
            let line = row.iter().map(f64::to_string).collect::<Vec<_>>().join(" ");
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(IsochroneFile::new(path))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    pub fn state(&self) -> IsochroneState {
        if self.data.get().is_some() {
            IsochroneState::DataLoaded
        } else if self.column_names.get().is_some() {
            IsochroneState::HeaderParsed
        } else {
            IsochroneState::Unloaded
        }
    }

    /// Metallicity parsed from the file name.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidIsochroneFilename)` if the name does not follow
    ///   `output_<number>.dat`.
    pub fn metallicity(&self) -> Result<Metallicity, AnankeError> {
        self.metallicity
            .get_or_try_init(|| parse_metallicity(self.file_name()))
            .copied()
    }

    /// Column names from the last line of the leading comment block.
    pub fn column_names(&self) -> Result<&[String], AnankeError> {
        self.column_names
            .get_or_try_init(|| self.read_header())
            .map(Vec::as_slice)
    }

    /// Full numeric content, sorted by (`Age`, `M_ini`).
    pub fn data(&self) -> Result<&IsochroneTable, AnankeError> {
        self.data.get_or_try_init(|| self.read_data())
    }

    fn header_error(&self, reason: impl Into<String>) -> AnankeError {
        AnankeError::HeaderFormat {
            path: self.path.to_string(),
            reason: reason.into(),
        }
    }

    fn data_error(&self, reason: impl Into<String>) -> AnankeError {
        AnankeError::DataFormat {
            path: self.path.to_string(),
            reason: reason.into(),
        }
    }

    fn read_header(&self) -> Result<Vec<String>, AnankeError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut header = None;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.strip_prefix(ISOCHRONE_COMMENT) {
                Some(comment) => header = Some(comment.to_string()),
                None => break,
            }
        }

        let header = header
            .ok_or_else(|| self.header_error("no commented header line before the first data line"))?;
        let names: Vec<String> = header
            .trim_start_matches(ISOCHRONE_COMMENT)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(self.header_error("the last header line names no column"));
        }
        Ok(names)
    }

    fn read_data(&self) -> Result<IsochroneTable, AnankeError> {
        let names = self.column_names()?;
        let reader = BufReader::new(File::open(&self.path)?);

        let mut rows = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(ISOCHRONE_COMMENT) {
                continue;
            }
            let line_no = index + 1;
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != names.len() {
                return Err(self.data_error(format!(
                    "line {line_no}: expected {} fields, found {}",
                    names.len(),
                    fields.len()
                )));
            }
            let row = fields
                .iter()
                .zip(names)
                .map(|(field, name)| {
                    field.parse::<f64>().map_err(|_| {
                        self.data_error(format!(
                            "line {line_no}: invalid number '{field}' in column '{name}'"
                        ))
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }

        IsochroneTable::from_rows(names.to_vec(), rows).map_err(|reason| self.data_error(reason))
    }
}

impl fmt::Display for IsochroneFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IsochroneFile({})", self.file_name())
    }
}

fn parse_metallicity(file_name: &str) -> Result<Metallicity, AnankeError> {
    FILENAME_PATTERN
        .captures(file_name)
        .and_then(|captures| captures[1].parse::<f64>().ok())
        .filter(|z| z.is_finite())
        .ok_or_else(|| AnankeError::InvalidIsochroneFilename(file_name.to_string()))
}
