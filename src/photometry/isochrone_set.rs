//! # Isochrone sets
//!
//! All isochrone files of one photometric system, ordered by metallicity. A set is discovered
//! once (file names and headers are checked up front), then shared read-only between surveys.
//! Table bodies are only read when a star actually needs them.
//!
//! ## Discovery
//!
//! [`IsochroneSet::for_system`] lists `output_*.dat` in the system directory. A candidate whose
//! name does not encode a metallicity, whose header cannot be parsed, or whose metallicity is
//! already covered by another file is set aside in [`IsochroneSet::rejected`] and logged; the
//! remaining files form the set. If no candidate survives, the whole system is unavailable.
//!
//! ## Lookup
//!
//! [`IsochroneSet::nearest`] never extrapolates: a metallicity outside the covered range is an
//! error, one that hits a grid node returns that file, anything else returns the two files
//! around it.
use std::fmt;

use camino::Utf8PathBuf;
use itertools::Itertools;
use log::{debug, warn};

use super::{
    interpolation::{bracket, lerp, Bracket, MetallicityInterpolation},
    isochrone_file::IsochroneFile,
    registry::{PhotometricRegistry, PhotometricSystem},
};
use crate::{
    ananke_errors::AnankeError,
    constants::{LogAge, Magnitude, Metallicity, SolarMass, ISOCHRONE_PREFIX, ISOCHRONE_SUFFIX},
};

/// Result of a metallicity lookup.
#[derive(Debug, Clone, Copy)]
pub enum Nearest<'a> {
    Exact(&'a IsochroneFile),
    Bracket {
        lower: &'a IsochroneFile,
        upper: &'a IsochroneFile,
    },
}

#[derive(Debug)]
pub struct IsochroneSet {
    system: PhotometricSystem,
    files: Vec<IsochroneFile>,
    metallicities: Vec<Metallicity>,
    rejected: Vec<(Utf8PathBuf, AnankeError)>,
}

impl IsochroneSet {
    /// Discover the isochrone files of `name` under the registry root.
    ///
    /// Arguments
    /// -----------------
    /// * `registry`: registry bound to the isochrone root directory.
    /// * `name`: registered photometric system name, e.g. `"PS1"`.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::SystemNotFound)` if the name is not registered, the system
    ///   directory does not exist, or no usable `output_*.dat` file is found in it.
    pub fn for_system(registry: &PhotometricRegistry, name: &str) -> Result<Self, AnankeError> {
        let system = registry.get(name)?;
        let directory = system.directory();
        if !directory.is_dir() {
            return Err(AnankeError::SystemNotFound(format!(
                "{name}: isochrone directory {directory} does not exist"
            )));
        }

        let candidates: Vec<Utf8PathBuf> = directory
            .read_dir_utf8()?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    warn!("Skipping unreadable entry in {directory}: {e}");
                    None
                }
            })
            .filter(|path| {
                path.is_file()
                    && path.file_name().is_some_and(|f| {
                        f.starts_with(ISOCHRONE_PREFIX) && f.ends_with(ISOCHRONE_SUFFIX)
                    })
            })
            .sorted()
            .collect();
        if candidates.is_empty() {
            return Err(AnankeError::SystemNotFound(format!(
                "{name}: no {ISOCHRONE_PREFIX}*{ISOCHRONE_SUFFIX} file in {directory}"
            )));
        }

        let n_candidates = candidates.len();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for path in candidates {
            let file = IsochroneFile::new(path.clone());
            match file
                .metallicity()
                .and_then(|z| file.column_names().map(|_| z))
            {
                Ok(z) => accepted.push((z, file)),
                Err(e) => {
                    warn!("Skipping isochrone file {path}: {e}");
                    rejected.push((path, e));
                }
            }
        }

        accepted.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        let mut files: Vec<IsochroneFile> = Vec::with_capacity(accepted.len());
        let mut metallicities: Vec<Metallicity> = Vec::with_capacity(accepted.len());
        for (z, file) in accepted {
            if metallicities.last() == Some(&z) {
                let path = file.path().to_path_buf();
                warn!("Skipping isochrone file {path}: metallicity {z} already covered");
                rejected.push((
                    path,
                    AnankeError::InvalidIsochroneFilename(format!(
                        "{}: duplicate metallicity {z}",
                        file.file_name()
                    )),
                ));
                continue;
            }
            metallicities.push(z);
            files.push(file);
        }

        if files.is_empty() {
            return Err(AnankeError::SystemNotFound(format!(
                "{name}: all {n_candidates} isochrone files in {directory} are unusable"
            )));
        }
        debug!(
            "Isochrone set {name}: {} files, Z in [{}, {}], {} rejected",
            files.len(),
            metallicities[0],
            metallicities[metallicities.len() - 1],
            rejected.len()
        );

        Ok(IsochroneSet {
            system,
            files,
            metallicities,
            rejected,
        })
    }

    pub fn system(&self) -> &PhotometricSystem {
        &self.system
    }

    pub fn name(&self) -> &'static str {
        self.system.name()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[IsochroneFile] {
        &self.files
    }

    /// Metallicities of the usable files, ascending.
    pub fn metallicities(&self) -> &[Metallicity] {
        &self.metallicities
    }

    /// Files set aside during discovery, with the reason.
    pub fn rejected(&self) -> &[(Utf8PathBuf, AnankeError)] {
        &self.rejected
    }

    /// Grid file(s) for metallicity `z`.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::MetallicityOutOfRange)` if `z` is outside the covered range.
    pub fn nearest(&self, z: Metallicity) -> Result<Nearest<'_>, AnankeError> {
        match bracket(&self.metallicities, z) {
            Some(Bracket::Exact(i)) => Ok(Nearest::Exact(&self.files[i])),
            Some(Bracket::Between { lower, upper, .. }) => Ok(Nearest::Bracket {
                lower: &self.files[lower],
                upper: &self.files[upper],
            }),
            None => Err(AnankeError::MetallicityOutOfRange {
                metallicity: z,
                min: self.metallicities[0],
                max: self.metallicities[self.metallicities.len() - 1],
            }),
        }
    }

    /// Check that `strategy` gives a weight between every pair of neighbouring metallicities.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidParameter)` naming the first pair the strategy cannot handle.
    pub fn check_interpolation(
        &self,
        strategy: &dyn MetallicityInterpolation,
    ) -> Result<(), AnankeError> {
        for (&lower, &upper) in self.metallicities.iter().tuple_windows() {
            if strategy.weight(0.5 * (lower + upper), lower, upper).is_none() {
                return Err(AnankeError::InvalidParameter(format!(
                    "{strategy:?} is undefined between Z = {lower} and {upper} of {}",
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Absolute magnitudes of a star in `filters`.
    ///
    /// Each bracketing file is interpolated in (log age, initial mass); the two results are
    /// then combined with the weight given by `strategy`.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::Coverage)` if the star falls outside the grid in any dimension.
    /// * `Err(AnankeError::InvalidParameter)` if `strategy` gives no weight for the bracket.
    /// * File errors (`DataFormat`, `IoError`, …) of the tables involved, unchanged.
    pub fn interpolate(
        &self,
        z: Metallicity,
        log_age: LogAge,
        m_ini: SolarMass,
        filters: &[&str],
        strategy: &dyn MetallicityInterpolation,
    ) -> Result<Vec<Magnitude>, AnankeError> {
        match self.nearest(z).map_err(|e| AnankeError::Coverage(e.to_string()))? {
            Nearest::Exact(file) => evaluate(file, log_age, m_ini, filters),
            Nearest::Bracket { lower, upper } => {
                let (z_lower, z_upper) = (lower.metallicity()?, upper.metallicity()?);
                let weight = strategy.weight(z, z_lower, z_upper).ok_or_else(|| {
                    AnankeError::InvalidParameter(format!(
                        "{strategy:?} undefined for Z = {z} between {z_lower} and {z_upper}"
                    ))
                })?;
                let low = evaluate(lower, log_age, m_ini, filters)?;
                let high = evaluate(upper, log_age, m_ini, filters)?;
                Ok(low
                    .iter()
                    .zip(&high)
                    .map(|(&a, &b)| lerp(a, b, weight))
                    .collect())
            }
        }
    }
}

fn evaluate(
    file: &IsochroneFile,
    log_age: LogAge,
    m_ini: SolarMass,
    filters: &[&str],
) -> Result<Vec<Magnitude>, AnankeError> {
    let table = file.data()?;
    let columns = filters
        .iter()
        .map(|filter| {
            table
                .column_index(filter)
                .ok_or_else(|| AnankeError::DataFormat {
                    path: file.path().to_string(),
                    reason: format!("missing filter column '{filter}'"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    table.interpolate(log_age, m_ini, &columns).ok_or_else(|| {
        AnankeError::Coverage(format!(
            "log age {log_age}, initial mass {m_ini} outside {file}"
        ))
    })
}

impl fmt::Display for IsochroneSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IsochroneSet({}, {} files, Z = [{}])",
            self.name(),
            self.files.len(),
            self.metallicities.iter().join(", ")
        )
    }
}
