//! # Staged survey pipeline
//!
//! [`SurveyRunner`] drives one survey from a validated [`Input`] and [`SurveyConfig`] to an
//! [`Output`]. Stages are strictly sequential and observable through
//! [`SurveyRunner::stage`]; when a stage fails the runner stays at that stage and the error is
//! returned unchanged, with no attempt to salvage partial engine output.
//!
//! ## Files
//!
//! ```text
//! <workdir>/<name>.ankx                  particles        (raw arrays only)
//! <workdir>/<name>_d6n<ngb>_den.ankx     densities        (raw arrays only)
//! <workdir>/<surveyname>_parameters      control file
//! <workdir>/<surveyname>.ankx            engine catalog
//! ```
//!
//! Prebuilt exchange files are used where they are; the engine then runs in their directory.
use std::{env, fs, sync::Arc};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

use super::{
    attach::attach_photometry,
    engine::{EngineInvocation, SurveyEngine},
    SurveyConfig, SurveyStage,
};
use crate::{
    ananke_errors::AnankeError,
    constants::EXCHANGE_EXTENSION,
    exchange::reader::ExchangeFileReader,
    input::Input,
    output::Output,
    parameters::{
        parameter_file::{ParameterFileBuilder, RenderedParameters},
        ParamValue,
    },
    photometry::{isochrone_set::IsochroneSet, registry::PhotometricRegistry},
};

pub struct SurveyRunner {
    input: Input,
    config: SurveyConfig,
    workdir: Utf8PathBuf,
    stage: SurveyStage,
}

impl SurveyRunner {
    pub fn new(input: Input, config: SurveyConfig, workdir: impl Into<Utf8PathBuf>) -> Self {
        SurveyRunner {
            input,
            config,
            workdir: workdir.into(),
            stage: SurveyStage::Configured,
        }
    }

    pub fn stage(&self) -> SurveyStage {
        self.stage
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    pub fn parameter_file(&self) -> Utf8PathBuf {
        self.workdir
            .join(format!("{}_parameters", self.config.surveyname))
    }

    pub fn output_file(&self) -> Utf8PathBuf {
        self.workdir
            .join(format!("{}.{EXCHANGE_EXTENSION}", self.config.surveyname))
    }

    fn advance(&mut self, stage: SurveyStage) {
        debug!("Survey '{}': {} -> {}", self.config.surveyname, self.stage, stage);
        self.stage = stage;
    }

    /// Control parameters for this run, with the keys managed by the pipeline filled in.
    ///
    /// `outputDir` is `output_dir` rendered as text; it must not contain whitespace.
    pub fn parameters(&self, output_dir: &Utf8Path) -> Result<RenderedParameters, AnankeError> {
        let cmd = self.config.resolved_cmd()?;
        let mut overrides = self.config.overrides.clone();
        overrides.insert("outputFile", self.config.surveyname.as_str());
        overrides.insert("outputDir", format!("{output_dir}/"));
        overrides.insert("photoSys", self.config.primary_system());
        overrides.insert("magcolorNames", &cmd);
        overrides.insert("fSample", self.config.fsample);
        overrides.insert("nres", self.input.ngb());
        overrides.insert("knorm", ParamValue::Float(self.input.knorm()));
        ParameterFileBuilder::new().resolve(&overrides)
    }

    /// Discover the isochrone sets of every requested system, then [`run_with_sets`](Self::run_with_sets).
    pub fn run(
        &mut self,
        registry: &PhotometricRegistry,
        engine: &dyn SurveyEngine,
    ) -> Result<Output, AnankeError> {
        let sets = self
            .config
            .photo_sys
            .iter()
            .map(|name| IsochroneSet::for_system(registry, name).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        self.run_with_sets(&sets, engine)
    }

    /// Run every stage with already discovered isochrone sets.
    ///
    /// Arguments
    /// -----------------
    /// * `sets`: one set per system of the configuration, in the same order.
    /// * `engine`: the engine that produces the catalog.
    ///
    /// Return
    /// ----------
    /// * The catalog with photometry attached.
    /// * `Err(AnankeError::InvalidInput)` if `sets` does not match the configured systems or the
    ///   runner already ran.
    /// * `Err(AnankeError::InvalidParameter)` if the interpolation strategy cannot handle the
    ///   metallicity grid of a set. Nothing is written in that case.
    /// * Any error of the failing stage, see [`SurveyStage`].
    pub fn run_with_sets(
        &mut self,
        sets: &[Arc<IsochroneSet>],
        engine: &dyn SurveyEngine,
    ) -> Result<Output, AnankeError> {
        if self.stage != SurveyStage::Configured {
            return Err(AnankeError::InvalidInput(format!(
                "survey '{}' already reached stage '{}'",
                self.config.surveyname, self.stage
            )));
        }
        let names: Vec<&str> = sets.iter().map(|set| set.name()).collect();
        if names != self.config.photo_sys {
            return Err(AnankeError::InvalidInput(format!(
                "isochrone sets [{}] do not match the requested systems [{}]",
                names.join(", "),
                self.config.photo_sys.join(", ")
            )));
        }
        for set in sets {
            set.check_interpolation(self.config.interpolation.as_ref())?;
        }

        let workdir = absolute(&self.workdir)?;
        let parameters = self.parameters(&workdir)?;
        fs::create_dir_all(&workdir)?;
        let parameter_file = workdir.join(format!("{}_parameters", self.config.surveyname));
        let output_file = workdir.join(format!("{}.{EXCHANGE_EXTENSION}", self.config.surveyname));

        let files = self.input.materialize(&workdir)?;
        parameters.write(&parameter_file)?;
        if output_file.exists() {
            debug!("Removing stale engine output {output_file}");
            fs::remove_file(&output_file)?;
        }
        self.advance(SurveyStage::InputsWritten);

        let exchange_dir = files
            .particles
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        let invocation = EngineInvocation {
            exchange_dir,
            name: self.input.name().to_string(),
            parameter_file,
            output_file: output_file.clone(),
        };
        self.advance(SurveyStage::EngineInvoked);
        let report = engine.run(&invocation)?;
        if !output_file.is_file() {
            return Err(AnankeError::EngineExecution {
                status: "exit 0".into(),
                stderr: format!(
                    "no output catalog at {output_file}; engine stderr: {}",
                    report.stderr.trim()
                ),
            });
        }

        let catalog = ExchangeFileReader::read(&output_file)?;
        self.advance(SurveyStage::OutputParsed);

        let (table, survey_report) = attach_photometry(
            &catalog,
            &output_file,
            sets,
            self.config.interpolation.as_ref(),
            self.config.metallicity_scale,
        )?;
        self.advance(SurveyStage::PhotometryAttached);

        info!(
            "Survey '{}' done: {} stars kept of {} generated",
            self.config.surveyname,
            table.n_rows(),
            survey_report.n_generated
        );
        self.advance(SurveyStage::Done);
        Ok(Output::new(table, survey_report).with_source(output_file))
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, AnankeError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = Utf8PathBuf::from_path_buf(env::current_dir()?).map_err(|cwd| {
        AnankeError::InvalidInput(format!(
            "current directory {} is not valid UTF-8",
            cwd.display()
        ))
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod test_survey_runner {
    use super::*;
    use crate::{
        exchange::{writer::ExchangeFileWriter, ColumnData, ExchangeTable},
        input::particle_dataset::{ArrayLike, DatasetOptions, ParticleDataset},
        photometry::{isochrone_file::IsochroneFile, isochrone_table::IsochroneTable},
        survey::engine::EngineReport,
    };
    use std::sync::Mutex;

    /// Writes a catalog of `n` solar-metallicity stars, or nothing when `n` is `None`.
    struct CatalogEngine {
        n: Option<usize>,
        calls: Mutex<Vec<EngineInvocation>>,
    }

    impl CatalogEngine {
        fn new(n: Option<usize>) -> Self {
            CatalogEngine {
                n,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SurveyEngine for CatalogEngine {
        fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, AnankeError> {
            self.calls.lock().unwrap().push(invocation.clone());
            if let Some(n) = self.n {
                let mut table = ExchangeTable::new(n);
                table.push_column("age", ColumnData::Float(vec![9.0; n]))?;
                table.push_column("feh", ColumnData::Float(vec![0.0; n]))?;
                table.push_column("smass", ColumnData::Float(vec![1.0; n]))?;
                table.push_column("dmod", ColumnData::Float(vec![10.0; n]))?;
                ExchangeFileWriter::write_table(&invocation.output_file, &table)?;
            }
            Ok(EngineReport::default())
        }
    }

    fn tmp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn two_mass_set(root: &Utf8Path) -> Arc<IsochroneSet> {
        for z in ["0.010", "0.030"] {
            let mut rows = Vec::new();
            for age in [8.0, 10.0] {
                for mass in [0.1, 2.0] {
                    rows.push(vec![age, mass, 1.0, 2.0, 3.0]);
                }
            }
            let columns = ["Age", "M_ini", "J", "H", "Ks"].map(String::from).to_vec();
            let table = IsochroneTable::new(columns, rows).unwrap();
            IsochroneFile::create(root.join(format!("padova/2MASS/output_{z}.dat")), &table)
                .unwrap();
        }
        let registry = PhotometricRegistry::new(root);
        Arc::new(IsochroneSet::for_system(&registry, "2MASS").unwrap())
    }

    fn input(n: usize) -> Input {
        let fields: Vec<(&str, ArrayLike)> = vec![
            ("pos3", vec![[0.0, 8.0, 0.0]; n].into()),
            ("vel3", vec![[0.0, 0.0, 220.0]; n].into()),
            ("mass", vec![1.0e4_f64; n].into()),
            ("age", vec![9.0_f64; n].into()),
            ("feh", vec![0.0_f64; n].into()),
        ];
        let dataset =
            ParticleDataset::new(fields, vec![1.0_f64; n], vec![1.0_f64; n], DatasetOptions::default())
                .unwrap();
        dataset.into()
    }

    fn config() -> SurveyConfig {
        SurveyConfig::builder()
            .photo_sys("2MASS")
            .set("seed", 3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_to_completion() {
        let (_guard, root) = tmp_dir();
        let set = two_mass_set(&root);
        let workdir = root.join("run");
        let engine = CatalogEngine::new(Some(5));

        let mut runner = SurveyRunner::new(input(10), config(), &workdir);
        assert_eq!(runner.stage(), SurveyStage::Configured);
        let output = runner.run_with_sets(&[set], &engine).unwrap();
        assert_eq!(runner.stage(), SurveyStage::Done);

        assert_eq!(output.len(), 5);
        assert_eq!(output.magnitudes("2MASS", "H"), Some(vec![2.0; 5]));
        assert_eq!(output.apparent_magnitudes("2MASS", "Ks"), Some(vec![13.0; 5]));
        assert_eq!(output.dropped(), 0);

        assert!(workdir.join("sim.ankx").is_file());
        assert!(workdir.join("sim_d6n64_den.ankx").is_file());
        let control = std::fs::read_to_string(workdir.join("survey_parameters")).unwrap();
        let has = |key: &str, value: &str| {
            control
                .lines()
                .any(|line| line.split_whitespace().collect::<Vec<_>>() == [key, value])
        };
        assert!(has("photoSys", "2MASS"));
        assert!(has("magcolorNames", "Ks,J-Ks"));
        assert!(has("nres", "64"));
        assert!(has("seed", "3"));

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "sim");
        assert_eq!(calls[0].output_file.file_name(), Some("survey.ankx"));
    }

    #[test]
    fn test_missing_engine_output() {
        let (_guard, root) = tmp_dir();
        let set = two_mass_set(&root);
        let mut runner = SurveyRunner::new(input(3), config(), root.join("run"));
        let result = runner.run_with_sets(&[set], &CatalogEngine::new(None));
        assert!(matches!(result, Err(AnankeError::EngineExecution { .. })));
        assert_eq!(runner.stage(), SurveyStage::EngineInvoked);
    }

    #[test]
    fn test_mismatched_sets_leave_no_files() {
        let (_guard, root) = tmp_dir();
        let workdir = root.join("run");
        let config = SurveyConfig::builder().photo_sys("PS1").build().unwrap();
        let mut runner = SurveyRunner::new(input(3), config, &workdir);
        let engine = CatalogEngine::new(Some(1));
        assert!(matches!(
            runner.run_with_sets(&[two_mass_set(&root)], &engine),
            Err(AnankeError::InvalidInput(_))
        ));
        assert_eq!(runner.stage(), SurveyStage::Configured);
        assert!(!workdir.exists());
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_runner_runs_once() {
        let (_guard, root) = tmp_dir();
        let set = two_mass_set(&root);
        let engine = CatalogEngine::new(Some(1));
        let mut runner = SurveyRunner::new(input(3), config(), root.join("run"));
        runner.run_with_sets(&[Arc::clone(&set)], &engine).unwrap();
        assert!(matches!(
            runner.run_with_sets(&[set], &engine),
            Err(AnankeError::InvalidInput(_))
        ));
    }
}
