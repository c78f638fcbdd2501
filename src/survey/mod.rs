//! # Survey runs
//!
//! Configuration and orchestration of one synthetic survey: particles in, engine run, star
//! catalog with photometry out.
//!
//! ## Pipeline
//!
//! ```text
//! Configured ─► InputsWritten ─► EngineInvoked ─► OutputParsed ─► PhotometryAttached ─► Done
//! ```
//!
//! Every check that can be made without the engine (particle schema, photometric systems,
//! isochrone discovery, control parameters) happens while the run is still `Configured`, so a
//! rejected configuration never leaves files behind.
//!
//! Modules
//! -----------------
//! * [`engine`] – The [`SurveyEngine`](engine::SurveyEngine) seam and the external process
//!   implementation.
//! * [`survey_runner`] – [`SurveyRunner`](survey_runner::SurveyRunner), the staged pipeline.
//! * [`attach`] – Per-star magnitude interpolation.
use std::{fmt, sync::Arc};

use crate::{
    ananke_errors::AnankeError,
    constants::{DEFAULT_FSAMPLE, DEFAULT_PSYS, DEFAULT_SURVEYNAME},
    parameters::{
        cmd_selection::CmdSelection, parameter_file::ParameterFileBuilder, ParamValue,
        ParameterOverrides, MANAGED_KEYS,
    },
    photometry::{
        interpolation::{LinearInZ, MetallicityInterpolation, MetallicityScale},
        registry::PhotometricRegistry,
    },
};

pub mod attach;
pub mod engine;
pub mod survey_runner;

/// Progress of a survey run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SurveyStage {
    Configured,
    InputsWritten,
    EngineInvoked,
    OutputParsed,
    PhotometryAttached,
    Done,
}

impl fmt::Display for SurveyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurveyStage::Configured => "configured",
            SurveyStage::InputsWritten => "inputs written",
            SurveyStage::EngineInvoked => "engine invoked",
            SurveyStage::OutputParsed => "output parsed",
            SurveyStage::PhotometryAttached => "photometry attached",
            SurveyStage::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Settings of one survey run.
///
/// Build it with [`SurveyConfig::builder`]; every field is validated there.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Photometric systems to attach; the first one also drives the engine's CMD cuts
    pub photo_sys: Vec<String>,
    /// CMD selection; `None` uses the default of the first system
    pub cmd: Option<CmdSelection>,
    /// Name of the engine output files
    pub surveyname: String,
    /// Fraction of stars the engine keeps
    pub fsample: f64,
    /// Extra control parameters (latitude, seed, …)
    pub overrides: ParameterOverrides,
    pub metallicity_scale: MetallicityScale,
    pub interpolation: Arc<dyn MetallicityInterpolation>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        SurveyConfig {
            photo_sys: vec![DEFAULT_PSYS.to_string()],
            cmd: None,
            surveyname: DEFAULT_SURVEYNAME.to_string(),
            fsample: DEFAULT_FSAMPLE,
            overrides: ParameterOverrides::new(),
            metallicity_scale: MetallicityScale::default(),
            interpolation: Arc::new(LinearInZ),
        }
    }
}

impl SurveyConfig {
    pub fn builder() -> SurveyConfigBuilder {
        SurveyConfigBuilder::new()
    }

    /// System that drives the engine's CMD selection.
    pub fn primary_system(&self) -> &str {
        &self.photo_sys[0]
    }

    /// The explicit CMD selection, or the default one of the primary system.
    pub fn resolved_cmd(&self) -> Result<CmdSelection, AnankeError> {
        match &self.cmd {
            Some(cmd) => Ok(cmd.clone()),
            None => PhotometricRegistry::spec(self.primary_system())
                .ok_or_else(|| AnankeError::SystemNotFound(self.primary_system().to_string()))
                .and_then(|spec| CmdSelection::parse(spec.default_cmd)),
        }
    }
}

/// Builder for [`SurveyConfig`], with validation.
#[derive(Debug, Clone)]
pub struct SurveyConfigBuilder {
    config: SurveyConfig,
    photo_sys: Option<Vec<String>>,
    cmd: Option<String>,
}

impl Default for SurveyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SurveyConfig::default(),
            photo_sys: None,
            cmd: None,
        }
    }

    /// Add a photometric system; the first one added is the primary system.
    pub fn photo_sys(mut self, name: impl Into<String>) -> Self {
        self.photo_sys.get_or_insert_with(Vec::new).push(name.into());
        self
    }
    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }
    pub fn surveyname(mut self, name: impl Into<String>) -> Self {
        self.config.surveyname = name.into();
        self
    }
    pub fn fsample(mut self, v: f64) -> Self {
        self.config.fsample = v;
        self
    }
    /// Set one extra control parameter.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.config.overrides.insert(key, value);
        self
    }
    pub fn overrides(mut self, overrides: &ParameterOverrides) -> Self {
        self.config.overrides.extend(overrides);
        self
    }
    pub fn metallicity_scale(mut self, scale: MetallicityScale) -> Self {
        self.config.metallicity_scale = scale;
        self
    }
    pub fn interpolation(mut self, strategy: impl MetallicityInterpolation + 'static) -> Self {
        self.config.interpolation = Arc::new(strategy);
        self
    }

    /// Validate and build the configuration.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::SystemNotFound)` for an unregistered photometric system.
    /// * `Err(AnankeError::UnknownParameter)` for an override key outside the control template.
    /// * `Err(AnankeError::InvalidParameter)` for any other inconsistent setting, including an
    ///   override of a key the pipeline sets itself (`outputFile`, `photoSys`, `nres`, …).
    pub fn build(self) -> Result<SurveyConfig, AnankeError> {
        let mut config = self.config;
        if let Some(systems) = self.photo_sys {
            config.photo_sys = systems;
        }

        if config.photo_sys.is_empty() {
            return Err(AnankeError::InvalidParameter(
                "at least one photometric system is required".into(),
            ));
        }
        for (i, name) in config.photo_sys.iter().enumerate() {
            if PhotometricRegistry::spec(name).is_none() {
                return Err(AnankeError::SystemNotFound(format!(
                    "'{name}' is not registered"
                )));
            }
            if config.photo_sys[..i].contains(name) {
                return Err(AnankeError::InvalidParameter(format!(
                    "photometric system '{name}' requested twice"
                )));
            }
        }

        if let Some(text) = &self.cmd {
            config.cmd = Some(CmdSelection::parse(text)?);
        }
        let primary = config.primary_system().to_string();
        if let (Some(cmd), Some(spec)) = (&config.cmd, PhotometricRegistry::spec(&primary)) {
            cmd.check_filters(&primary, spec.filters)?;
        }

        if config.surveyname.is_empty()
            || config
                .surveyname
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(AnankeError::InvalidParameter(format!(
                "survey name '{}' must be non-empty without whitespace or path separators",
                config.surveyname
            )));
        }
        if !(0.0..=1.0).contains(&config.fsample) {
            return Err(AnankeError::InvalidParameter(format!(
                "fsample {} outside [0, 1]",
                config.fsample
            )));
        }
        if let MetallicityScale::MassFraction { z_solar } = config.metallicity_scale {
            if !(z_solar.is_finite() && z_solar > 0.0) {
                return Err(AnankeError::InvalidParameter(format!(
                    "solar metallicity {z_solar} must be positive"
                )));
            }
        }

        if !config.interpolation.supports(config.metallicity_scale) {
            return Err(AnankeError::InvalidParameter(format!(
                "{:?} cannot interpolate isochrones keyed by {:?}",
                config.interpolation, config.metallicity_scale
            )));
        }

        ParameterFileBuilder::new().check_keys(&config.overrides)?;
        if let Some(key) = MANAGED_KEYS
            .iter()
            .find(|key| config.overrides.contains_key(key))
        {
            return Err(AnankeError::InvalidParameter(format!(
                "'{key}' is set from the survey configuration and cannot be overridden"
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod test_survey_config {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SurveyConfig::builder().build().unwrap();
        assert_eq!(config.photo_sys, ["GAIA__DR2"]);
        assert_eq!(config.resolved_cmd().unwrap().to_string(), "G,G_BP-G_RP");
        assert_eq!(config.fsample, 1.0);
    }

    #[test]
    fn test_default_cmd_follows_primary_system() {
        let config = SurveyConfig::builder()
            .photo_sys("PS1")
            .photo_sys("2MASS")
            .build()
            .unwrap();
        assert_eq!(config.primary_system(), "PS1");
        assert_eq!(config.resolved_cmd().unwrap().to_string(), "rP1,gP1-rP1");
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            SurveyConfig::builder().photo_sys("HST").build(),
            Err(AnankeError::SystemNotFound(_))
        ));
        assert!(SurveyConfig::builder()
            .photo_sys("PS1")
            .photo_sys("PS1")
            .build()
            .is_err());
        assert!(SurveyConfig::builder()
            .photo_sys("PS1")
            .cmd("G,G_BP-G_RP")
            .build()
            .is_err());
        assert!(SurveyConfig::builder().fsample(1.2).build().is_err());
        assert!(SurveyConfig::builder().surveyname("my survey").build().is_err());
    }

    #[test]
    fn test_log_interpolation_rejects_logarithmic_keys() {
        use crate::photometry::interpolation::LinearInLogZ;

        let result = SurveyConfig::builder()
            .photo_sys("PS1")
            .metallicity_scale(MetallicityScale::Logarithmic)
            .interpolation(LinearInLogZ)
            .build();
        assert!(matches!(result, Err(AnankeError::InvalidParameter(_))));

        assert!(SurveyConfig::builder()
            .metallicity_scale(MetallicityScale::Logarithmic)
            .build()
            .is_ok());
    }

    #[test]
    fn test_overrides_are_checked() {
        assert_eq!(
            SurveyConfig::builder().set("lattitude", 10.0).build().map(|_| ()),
            Err(AnankeError::UnknownParameter("lattitude".into()))
        );
        assert_eq!(
            SurveyConfig::builder().set("nres", 32).build().map(|_| ()),
            Err(AnankeError::InvalidParameter(
                "'nres' is set from the survey configuration and cannot be overridden".into()
            ))
        );
        let config = SurveyConfig::builder()
            .set("latitude", 30)
            .set("seed", 5)
            .build()
            .unwrap();
        assert_eq!(config.overrides.len(), 2);
    }
}
