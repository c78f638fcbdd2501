//! # Ananke environment state
//!
//! [`AnankeEnv`] gathers the three locations a survey needs:
//!
//! ```text
//! AnankeEnv
//! ├── galaxia         engine executable
//! ├── isochrone_root  directory holding padova/<system>/output_<Z>.dat
//! └── working_dir     default directory for exchange, control and catalog files
//! ```
//!
//! ## Configuration
//!
//! | Variable            | Default                              |
//! |---------------------|--------------------------------------|
//! | `ANANKE_GALAXIA`    | `galaxia`, looked up on `PATH`       |
//! | `ANANKE_ISOCHRONES` | `<user data dir>/ananke/isochrones`  |
//! | `ANANKE_WORKDIR`    | `<user cache dir>/ananke/runs`       |
//!
//! Values can also be given explicitly with [`AnankeEnv::new`].
use std::{env, ffi::OsString, path::PathBuf, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use log::debug;

use crate::ananke_errors::AnankeError;

pub const GALAXIA_VAR: &str = "ANANKE_GALAXIA";
pub const ISOCHRONES_VAR: &str = "ANANKE_ISOCHRONES";
pub const WORKDIR_VAR: &str = "ANANKE_WORKDIR";

const DEFAULT_EXECUTABLE: &str = "galaxia";

#[derive(Debug, Clone, PartialEq)]
pub struct AnankeEnv {
    galaxia: Utf8PathBuf,
    isochrone_root: Utf8PathBuf,
    working_dir: Utf8PathBuf,
    engine_timeout: Option<Duration>,
}

impl AnankeEnv {
    pub fn new(
        galaxia: impl Into<Utf8PathBuf>,
        isochrone_root: impl Into<Utf8PathBuf>,
        working_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        AnankeEnv {
            galaxia: galaxia.into(),
            isochrone_root: isochrone_root.into(),
            working_dir: working_dir.into(),
            engine_timeout: None,
        }
    }

    /// Build the environment from the `ANANKE_*` variables, with per-user defaults.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidInput)` if a variable is not valid UTF-8, or if a default is
    ///   needed and no home directory can be found.
    pub fn from_env() -> Result<Self, AnankeError> {
        Self::from_lookup(|key| env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self, AnankeError> {
        let var = |key: &str| -> Result<Option<Utf8PathBuf>, AnankeError> {
            lookup(key)
                .map(|value| utf8_path(key, PathBuf::from(value)))
                .transpose()
        };
        let base_dir = || {
            BaseDirs::new().ok_or_else(|| {
                AnankeError::InvalidInput("cannot locate the user home directory".into())
            })
        };

        let galaxia = var(GALAXIA_VAR)?.unwrap_or_else(|| DEFAULT_EXECUTABLE.into());
        let isochrone_root = match var(ISOCHRONES_VAR)? {
            Some(path) => path,
            None => utf8_path("data directory", base_dir()?.data_dir().to_path_buf())?
                .join("ananke")
                .join("isochrones"),
        };
        let working_dir = match var(WORKDIR_VAR)? {
            Some(path) => path,
            None => utf8_path("cache directory", base_dir()?.cache_dir().to_path_buf())?
                .join("ananke")
                .join("runs"),
        };
        debug!("Environment: engine {galaxia}, isochrones {isochrone_root}, workdir {working_dir}");
        Ok(AnankeEnv::new(galaxia, isochrone_root, working_dir))
    }

    pub fn galaxia(&self) -> &Utf8Path {
        &self.galaxia
    }

    pub fn isochrone_root(&self) -> &Utf8Path {
        &self.isochrone_root
    }

    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout
    }

    pub fn with_working_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Kill engine runs that exceed `timeout`.
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = Some(timeout);
        self
    }
}

fn utf8_path(what: &str, path: PathBuf) -> Result<Utf8PathBuf, AnankeError> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| {
        AnankeError::InvalidInput(format!("{what} {} is not valid UTF-8", path.display()))
    })
}

#[cfg(test)]
mod test_env_state {
    use super::*;

    #[test]
    fn test_variables_take_precedence() {
        let env = AnankeEnv::from_lookup(|key| match key {
            GALAXIA_VAR => Some("/opt/galaxia/bin/galaxia".into()),
            ISOCHRONES_VAR => Some("/data/isochrones".into()),
            WORKDIR_VAR => Some("/scratch/ananke".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(env.galaxia().as_str(), "/opt/galaxia/bin/galaxia");
        assert_eq!(env.isochrone_root().as_str(), "/data/isochrones");
        assert_eq!(env.working_dir().as_str(), "/scratch/ananke");
        assert_eq!(env.engine_timeout(), None);
    }

    #[test]
    fn test_defaults() {
        let Some(base) = BaseDirs::new() else {
            return;
        };
        let env = AnankeEnv::from_lookup(|_| None).unwrap();
        assert_eq!(env.galaxia().as_str(), "galaxia");
        assert!(env.isochrone_root().ends_with("ananke/isochrones"));
        assert!(env.working_dir().starts_with(base.cache_dir()));
    }

    #[test]
    fn test_builders() {
        let env = AnankeEnv::new("galaxia", "/iso", "/run")
            .with_working_dir("/other")
            .with_engine_timeout(Duration::from_secs(60));
        assert_eq!(env.working_dir().as_str(), "/other");
        assert_eq!(env.engine_timeout(), Some(Duration::from_secs(60)));
    }
}
