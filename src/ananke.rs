//! # Ananke: environment, photometric systems and survey entry points
//!
//! [`Ananke`] is the façade that ties together:
//!
//! 1. **Environment state** ([`AnankeEnv`]): engine executable, isochrone root, working directory.
//! 2. **Photometric registry** ([`PhotometricRegistry`]) rooted at the isochrone directory.
//! 3. **Isochrone set cache**: one [`IsochroneSet`] per system, discovered on first use and
//!    shared across runs behind an [`Arc`]. Files inside a set load their data lazily, so a
//!    long-lived `Ananke` parses each isochrone file at most once.
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use ananke::ananke::Ananke;
//! use ananke::env_state::AnankeEnv;
//! use ananke::input::particle_dataset::{ArrayLike, DatasetOptions};
//! use ananke::survey::SurveyConfig;
//!
//! let ananke = Ananke::new(AnankeEnv::from_env().unwrap());
//! let n = 100;
//! let fields: Vec<(&str, ArrayLike)> = vec![
//!     ("pos3", vec![[8.0, 0.0, 0.0]; n].into()),
//!     ("vel3", vec![[0.0, 220.0, 0.0]; n].into()),
//!     ("mass", vec![1.0e4_f64; n].into()),
//!     ("age", vec![9.5_f64; n].into()),
//!     ("feh", vec![-0.2_f64; n].into()),
//! ];
//! let config = SurveyConfig::builder().photo_sys("PS1").build().unwrap();
//! let output = ananke
//!     .make_survey_from_particles(
//!         fields,
//!         vec![1.0; n],
//!         vec![1.0; n],
//!         DatasetOptions::default(),
//!         config,
//!     )
//!     .unwrap();
//! println!("{} stars", output.len());
//! ```
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::info;

use crate::{
    ananke_errors::AnankeError,
    env_state::AnankeEnv,
    input::{
        particle_dataset::{ArrayLike, DatasetOptions, ParticleDataset},
        Input,
    },
    output::Output,
    photometry::{isochrone_set::IsochroneSet, registry::PhotometricRegistry},
    survey::{
        engine::{ExternalEngine, SurveyEngine},
        survey_runner::SurveyRunner,
        SurveyConfig,
    },
};

#[derive(Debug)]
pub struct Ananke {
    env: AnankeEnv,
    registry: PhotometricRegistry,
    isochrones: Mutex<HashMap<&'static str, Arc<IsochroneSet>>>,
}

impl Ananke {
    pub fn new(env: AnankeEnv) -> Self {
        let registry = PhotometricRegistry::new(env.isochrone_root());
        Ananke {
            env,
            registry,
            isochrones: Mutex::new(HashMap::new()),
        }
    }

    pub fn env(&self) -> &AnankeEnv {
        &self.env
    }

    pub fn registry(&self) -> &PhotometricRegistry {
        &self.registry
    }

    /// Isochrone set of a photometric system, discovered once and then shared.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: registered system name, e.g. `"PS1"`.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::SystemNotFound)` if the system is unknown or has no usable files.
    ///
    /// See also
    /// ------------
    /// * [`IsochroneSet::for_system`] – Discovery of the files of one system.
    pub fn isochrone_set(&self, name: &str) -> Result<Arc<IsochroneSet>, AnankeError> {
        let mut cache = self
            .isochrones
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(set) = cache.get(name) {
            return Ok(Arc::clone(set));
        }
        let set = Arc::new(IsochroneSet::for_system(&self.registry, name)?);
        cache.insert(set.name(), Arc::clone(&set));
        Ok(set)
    }

    /// The engine executable configured in the environment.
    pub fn engine(&self) -> ExternalEngine {
        let engine = ExternalEngine::new(self.env.galaxia());
        match self.env.engine_timeout() {
            Some(timeout) => engine.with_timeout(timeout),
            None => engine,
        }
    }

    /// Run one survey in the environment's working directory.
    ///
    /// Isochrone sets of every requested system are resolved before anything is written, so a
    /// missing system fails the call with no files created.
    ///
    /// Arguments
    /// -----------------
    /// * `input`: particles in memory or prebuilt exchange files.
    /// * `config`: validated survey settings.
    /// * `engine`: the engine to run, usually [`Ananke::engine`].
    ///
    /// Return
    /// ----------
    /// * The star catalog with photometry attached, or the error of the failing stage.
    ///
    /// See also
    /// ------------
    /// * [`SurveyRunner`] – The staged pipeline behind this call.
    pub fn make_survey(
        &self,
        input: Input,
        config: SurveyConfig,
        engine: &dyn SurveyEngine,
    ) -> Result<Output, AnankeError> {
        let sets = config
            .photo_sys
            .iter()
            .map(|name| self.isochrone_set(name))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Survey '{}' of '{}' in {}",
            config.surveyname,
            input.name(),
            self.env.working_dir()
        );
        SurveyRunner::new(input, config, self.env.working_dir()).run_with_sets(&sets, engine)
    }

    /// Validate particle arrays and run a survey with the configured engine.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::Schema)` if the particles or densities are inconsistent; nothing is
    ///   written in that case.
    /// * Otherwise as [`Ananke::make_survey`].
    pub fn make_survey_from_particles<I, K>(
        &self,
        fields: I,
        rho_pos: Vec<f64>,
        rho_vel: Vec<f64>,
        options: DatasetOptions,
        config: SurveyConfig,
    ) -> Result<Output, AnankeError>
    where
        I: IntoIterator<Item = (K, ArrayLike)>,
        K: Into<String>,
    {
        let dataset = ParticleDataset::new(fields, rho_pos, rho_vel, options)?;
        self.make_survey(dataset.into(), config, &self.engine())
    }
}

#[cfg(test)]
mod test_ananke {
    use super::*;
    use camino::Utf8PathBuf;
    use std::time::Duration;

    fn tmp_env() -> (tempfile::TempDir, AnankeEnv) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let env = AnankeEnv::new(root.join("galaxia"), root.join("iso"), root.join("run"));
        (dir, env)
    }

    #[test]
    fn test_engine_follows_env() {
        let (_guard, env) = tmp_env();
        let ananke = Ananke::new(env.clone().with_engine_timeout(Duration::from_secs(5)));
        let engine = ananke.engine();
        assert_eq!(engine.executable(), env.galaxia());
        assert_eq!(engine.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(ananke.registry().root(), env.isochrone_root());
    }

    #[test]
    fn test_missing_system_fails_before_writing() {
        let (_guard, env) = tmp_env();
        let ananke = Ananke::new(env.clone());
        let n = 4;
        let fields: Vec<(&str, ArrayLike)> = vec![
            ("pos3", vec![[0.0, 0.0, 0.0]; n].into()),
            ("vel3", vec![[0.0, 0.0, 0.0]; n].into()),
            ("mass", vec![1.0_f64; n].into()),
            ("age", vec![9.0_f64; n].into()),
            ("feh", vec![0.0_f64; n].into()),
        ];
        let result = ananke.make_survey_from_particles(
            fields,
            vec![1.0; n],
            vec![1.0; n],
            DatasetOptions::default(),
            SurveyConfig::default(),
        );
        assert!(matches!(result, Err(AnankeError::SystemNotFound(_))));
        assert!(!env.working_dir().exists());
    }
}
