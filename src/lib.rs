//! # Ananke
//!
//! Synthetic star surveys from simulation particles. Particles and their phase-space densities
//! are written to exchange files, the Galaxia population-synthesis engine turns them into a
//! star catalog, and absolute magnitudes are attached from the isochrone grids of one or more
//! photometric systems.
//!
//! ## Overview
//!
//! ```text
//! ParticleDataset ─► ExchangeFileWriter ─► galaxia ─► ExchangeFileReader
//!                                                         │
//!                        IsochroneSet (per system) ◄──────┤
//!                                                         ▼
//!                                                       Output
//! ```
//!
//! Modules
//! -----------------
//! * [`ananke`] – Façade holding the environment and the isochrone cache.
//! * [`env_state`] – Engine, isochrone and working-directory locations.
//! * [`input`] – Particle arrays, their schema, and prebuilt exchange files.
//! * [`exchange`] – Binary exchange format shared with the engine.
//! * [`parameters`] – Engine control-file template and overrides.
//! * [`photometry`] – Photometric systems and isochrone interpolation.
//! * [`survey`] – Survey configuration, engine seam and the staged runner.
//! * [`output`] – The resulting star catalog.
pub mod ananke;
pub mod ananke_errors;
pub mod constants;
pub mod env_state;
pub mod exchange;
pub mod input;
pub mod output;
pub mod parameters;
pub mod photometry;
pub mod survey;

pub use ananke::Ananke;
pub use ananke_errors::AnankeError;
pub use env_state::AnankeEnv;
pub use input::{
    particle_dataset::{ArrayLike, DatasetOptions, ParticleDataset},
    Input,
};
pub use output::{Output, SurveyReport};
pub use survey::{
    engine::{ExternalEngine, SurveyEngine},
    survey_runner::SurveyRunner,
    SurveyConfig, SurveyStage,
};
