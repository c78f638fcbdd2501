//! # Survey inputs
//!
//! A survey starts either from particle arrays held in memory or from exchange files that were
//! written beforehand. [`Input`] makes that choice explicit: exactly one of the two forms exists,
//! and [`Input::resolve`] rejects calls that give both or neither.
//!
//! Modules
//! -----------------
//! * [`record_schema`] – declared particle fields and their validation.
//! * [`particle_dataset`] – [`ParticleDataset`](particle_dataset::ParticleDataset) and its
//!   density side-table.
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use crate::{
    ananke_errors::AnankeError,
    constants::EXCHANGE_EXTENSION,
    exchange::{reader::ExchangeFileReader, writer::ExchangeFileWriter, ExchangeFiles},
};
use particle_dataset::{validate_name_tag, ParticleDataset};

pub mod particle_dataset;
pub mod record_schema;

/// Exchange files already on disk, with the settings recorded in their headers.
#[derive(Debug, Clone, PartialEq)]
pub struct PrebuiltInput {
    files: ExchangeFiles,
    name: String,
    ngb: u32,
    knorm: f64,
    n_particles: u64,
}

impl PrebuiltInput {
    /// Inspect a particle file and its density file.
    ///
    /// The name tag is the particle file stem. `ngb` and `knorm` are read from the density
    /// file header, and the density file must sit next to the particle file under the name
    /// the engine derives from them.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidInput)` if a file is missing or misnamed.
    /// * `Err(AnankeError::ExchangeFormat)` if a header is malformed or lacks `ngb` / `knorm`.
    /// * `Err(AnankeError::Schema)` if the two files disagree on the particle count.
    pub fn open(particles: &Utf8Path, densities: &Utf8Path) -> Result<Self, AnankeError> {
        for path in [particles, densities] {
            if !path.is_file() {
                return Err(AnankeError::InvalidInput(format!(
                    "exchange file {path} does not exist"
                )));
            }
        }
        if particles.extension() != Some(EXCHANGE_EXTENSION) {
            return Err(AnankeError::InvalidInput(format!(
                "particle file {particles} must have the .{EXCHANGE_EXTENSION} extension"
            )));
        }
        let name = particles
            .file_stem()
            .ok_or_else(|| AnankeError::InvalidInput(format!("no file stem in {particles}")))?
            .to_string();
        validate_name_tag(&name)?;

        let particle_header = ExchangeFileReader::read_header(particles)?;
        let density_header = ExchangeFileReader::read_header(densities)?;
        let attribute = |key: &str| {
            density_header
                .attribute(key)
                .ok_or_else(|| AnankeError::ExchangeFormat {
                    path: densities.to_string(),
                    reason: format!("missing attribute '{key}'"),
                })
        };
        let ngb_value = attribute("ngb")?;
        let knorm = attribute("knorm")?;
        if !(ngb_value >= 1.0 && ngb_value.fract() == 0.0 && ngb_value <= f64::from(u32::MAX)) {
            return Err(AnankeError::ExchangeFormat {
                path: densities.to_string(),
                reason: format!("ngb attribute {ngb_value} is not a positive integer"),
            });
        }
        let ngb = ngb_value as u32;

        if density_header.n_rows != particle_header.n_rows {
            return Err(AnankeError::Schema(format!(
                "density file holds {} rows, particle file holds {}",
                density_header.n_rows, particle_header.n_rows
            )));
        }

        let directory = particles.parent().unwrap_or(Utf8Path::new(""));
        let files = ExchangeFiles::conventional(directory, &name, ngb);
        if files.densities.file_name() != densities.file_name()
            || densities.parent().unwrap_or(Utf8Path::new("")) != directory
        {
            return Err(AnankeError::InvalidInput(format!(
                "density file must be {} for name '{name}' and ngb {ngb}, got {densities}",
                files.densities
            )));
        }

        debug!(
            "Prebuilt input '{name}': {} particles, ngb = {ngb}",
            particle_header.n_rows
        );
        Ok(PrebuiltInput {
            files,
            name,
            ngb,
            knorm,
            n_particles: particle_header.n_rows,
        })
    }

    pub fn files(&self) -> &ExchangeFiles {
        &self.files
    }

    pub fn n_particles(&self) -> u64 {
        self.n_particles
    }
}

/// The two ways of feeding particles to a survey.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Arrays validated in memory, written to the working directory at run time
    RawArrays(ParticleDataset),
    /// Exchange files already on disk, used in place
    PrebuiltFiles(PrebuiltInput),
}

impl From<ParticleDataset> for Input {
    fn from(dataset: ParticleDataset) -> Self {
        Input::RawArrays(dataset)
    }
}

impl Input {
    /// Exchange files at `particles` and `densities`, see [`PrebuiltInput::open`].
    pub fn from_files(particles: &Utf8Path, densities: &Utf8Path) -> Result<Self, AnankeError> {
        PrebuiltInput::open(particles, densities).map(Input::PrebuiltFiles)
    }

    /// Pick the input form from optional arguments.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidInput)` unless exactly one of `dataset` and `files` is given.
    pub fn resolve(
        dataset: Option<ParticleDataset>,
        files: Option<(Utf8PathBuf, Utf8PathBuf)>,
    ) -> Result<Self, AnankeError> {
        match (dataset, files) {
            (Some(dataset), None) => Ok(Input::RawArrays(dataset)),
            (None, Some((particles, densities))) => Self::from_files(&particles, &densities),
            (Some(_), Some(_)) => Err(AnankeError::InvalidInput(
                "give either particle arrays or exchange files, not both".into(),
            )),
            (None, None) => Err(AnankeError::InvalidInput(
                "no particle arrays and no exchange files given".into(),
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Input::RawArrays(dataset) => dataset.name(),
            Input::PrebuiltFiles(prebuilt) => &prebuilt.name,
        }
    }

    pub fn ngb(&self) -> u32 {
        match self {
            Input::RawArrays(dataset) => dataset.ngb(),
            Input::PrebuiltFiles(prebuilt) => prebuilt.ngb,
        }
    }

    pub fn knorm(&self) -> f64 {
        match self {
            Input::RawArrays(dataset) => dataset.knorm(),
            Input::PrebuiltFiles(prebuilt) => prebuilt.knorm,
        }
    }

    /// Make sure the exchange files exist, writing them into `workdir` for in-memory arrays.
    pub(crate) fn materialize(&self, workdir: &Utf8Path) -> Result<ExchangeFiles, AnankeError> {
        match self {
            Input::RawArrays(dataset) => ExchangeFileWriter::new(workdir).write(dataset),
            Input::PrebuiltFiles(prebuilt) => Ok(prebuilt.files.clone()),
        }
    }
}

#[cfg(test)]
mod test_input {
    use super::*;
    use crate::input::particle_dataset::{ArrayLike, DatasetOptions};

    fn dataset(name: &str, ngb: u32) -> ParticleDataset {
        let n = 3;
        let fields: Vec<(&str, ArrayLike)> = vec![
            ("pos3", vec![[0.0, 0.0, 0.0]; n].into()),
            ("vel3", vec![[0.0, 0.0, 0.0]; n].into()),
            ("mass", vec![1.0_f64; n].into()),
            ("age", vec![9.0_f64; n].into()),
            ("feh", vec![0.0_f64; n].into()),
        ];
        let options = DatasetOptions {
            name: name.into(),
            ngb,
            knorm: 0.5,
        };
        ParticleDataset::new(fields, vec![1.0_f64; n], vec![1.0_f64; n], options).unwrap()
    }

    fn tmp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_resolve_requires_exactly_one_form() {
        assert!(matches!(
            Input::resolve(None, None),
            Err(AnankeError::InvalidInput(_))
        ));
        let files = Some(("a.ankx".into(), "a_d6n64_den.ankx".into()));
        assert!(matches!(
            Input::resolve(Some(dataset("sim", 64)), files),
            Err(AnankeError::InvalidInput(_))
        ));
        let input = Input::resolve(Some(dataset("sim", 64)), None).unwrap();
        assert_eq!(input.name(), "sim");
    }

    #[test]
    fn test_prebuilt_files_read_settings_from_headers() {
        let (_guard, dir) = tmp_dir();
        let written = Input::from(dataset("halo", 32)).materialize(&dir).unwrap();

        let input = Input::from_files(&written.particles, &written.densities).unwrap();
        assert_eq!(input.name(), "halo");
        assert_eq!(input.ngb(), 32);
        assert_eq!(input.knorm(), 0.5);
        assert_eq!(input.materialize(&dir).unwrap(), written);
    }

    #[test]
    fn test_prebuilt_density_file_must_follow_naming() {
        let (_guard, dir) = tmp_dir();
        let written = Input::from(dataset("halo", 32)).materialize(&dir).unwrap();
        let renamed = dir.join("halo_density.ankx");
        std::fs::rename(&written.densities, &renamed).unwrap();

        assert!(matches!(
            Input::from_files(&written.particles, &renamed),
            Err(AnankeError::InvalidInput(_))
        ));
        assert!(matches!(
            Input::from_files(&written.particles, &written.densities),
            Err(AnankeError::InvalidInput(_))
        ));
    }
}
