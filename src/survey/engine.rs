//! # Survey engine invocation
//!
//! The population-synthesis engine is an external executable. [`SurveyEngine`] is the seam
//! between the pipeline and that executable: [`ExternalEngine`] spawns the real program, and
//! tests substitute an in-process implementation that writes a catalog directly.
//!
//! ## Command line
//!
//! ```text
//! cd <exchange dir> && <galaxia> -r --hdim=6 --nfile=<name> <control file>
//! ```
//!
//! The engine finds `<name>.ankx` and `<name>_d6n<ngb>_den.ankx` in its working directory and
//! writes `<outputDir>/<outputFile>.ankx` as named in the control file.
use std::{
    io::Read,
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};

use crate::{ananke_errors::AnankeError, constants::HDIM};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Everything an engine needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    /// Directory holding the input exchange files
    pub exchange_dir: Utf8PathBuf,
    /// Name tag of the input exchange files
    pub name: String,
    pub parameter_file: Utf8PathBuf,
    /// Catalog the engine is expected to produce
    pub output_file: Utf8PathBuf,
}

/// Captured console output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    pub stdout: String,
    pub stderr: String,
}

/// Something that turns exchange files and a control file into a star catalog.
pub trait SurveyEngine {
    /// Run the engine to completion.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::EngineExecution)` if the engine cannot be started or fails.
    /// * `Err(AnankeError::EngineTimeout)` if the engine exceeds its time budget.
    fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, AnankeError>;
}

/// The engine as an executable on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEngine {
    executable: Utf8PathBuf,
    timeout: Option<Duration>,
}

impl ExternalEngine {
    pub fn new(executable: impl Into<Utf8PathBuf>) -> Self {
        ExternalEngine {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kill the engine and fail the run if it is still running after `timeout`.
    ///
    /// Only the engine process itself is killed. Processes it started in the background are
    /// left running, and the run returns without waiting for them.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn executable(&self) -> &Utf8Path {
        &self.executable
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Command-line arguments for `invocation`.
    pub fn arguments(&self, invocation: &EngineInvocation) -> Vec<String> {
        vec![
            "-r".to_string(),
            format!("--hdim={HDIM}"),
            format!("--nfile={}", invocation.name),
            invocation.parameter_file.to_string(),
        ]
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, AnankeError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                warn!(
                    "Engine {} exceeded {:?}, killing it",
                    self.executable, timeout
                );
                child.kill()?;
                child.wait()?;
                return Err(AnankeError::EngineTimeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

impl SurveyEngine for ExternalEngine {
    fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, AnankeError> {
        let args = self.arguments(invocation);
        info!(
            "Running {} {} in {}",
            self.executable,
            args.join(" "),
            invocation.exchange_dir
        );

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(&invocation.exchange_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnankeError::EngineExecution {
                status: "not started".into(),
                stderr: format!("cannot start {}: {e}", self.executable),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        // After a timeout the readers are detached: a process spawned by the engine may
        // still hold the pipes open.
        let status = self.wait(&mut child)?;
        let report = EngineReport {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        if !status.success() {
            return Err(AnankeError::EngineExecution {
                status: status.to_string(),
                stderr: report.stderr,
            });
        }
        debug!("Engine finished: {status}");
        Ok(report)
    }
}
