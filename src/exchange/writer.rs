use std::{
    fs::{self, File},
    io::{BufWriter, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

use super::{
    format::{write_body, ExchangeHeader},
    ExchangeFiles, ExchangeTable,
};
use crate::{ananke_errors::AnankeError, input::particle_dataset::ParticleDataset};

/// Serializes validated particle datasets into the engine's input files.
#[derive(Debug, Clone)]
pub struct ExchangeFileWriter {
    directory: Utf8PathBuf,
}

impl ExchangeFileWriter {
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        ExchangeFileWriter {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Write the particle file and the density file of `dataset`.
    ///
    /// The files are named after the dataset's name tag and `ngb`
    /// (see [`ExchangeFiles::conventional`]). The target directory is created if needed, and
    /// existing files with the same names are replaced.
    ///
    /// Arguments
    /// -----------------
    /// * `dataset`: particles already validated against the particle schema.
    ///
    /// Return
    /// ----------
    /// * The paths of the two files written.
    pub fn write(&self, dataset: &ParticleDataset) -> Result<ExchangeFiles, AnankeError> {
        fs::create_dir_all(&self.directory)?;
        let files = ExchangeFiles::conventional(&self.directory, dataset.name(), dataset.ngb());

        Self::write_table(&files.particles, dataset.particles())?;
        Self::write_table(&files.densities, &dataset.density_table()?)?;

        info!(
            "Wrote {} particles with {} fields to {}",
            dataset.len(),
            dataset.particles().n_columns(),
            files.particles
        );
        Ok(files)
    }

    /// Write any table as an exchange file.
    pub fn write_table(path: &Utf8Path, table: &ExchangeTable) -> Result<(), AnankeError> {
        let mut out = BufWriter::new(File::create(path)?);
        ExchangeHeader::for_table(table).write_to(&mut out)?;
        write_body(&mut out, table)?;
        out.flush()?;
        debug!(
            "Exchange file {path}: {} rows, {} columns",
            table.n_rows(),
            table.n_columns()
        );
        Ok(())
    }
}
