//! # Constants and type definitions for Ananke
//!
//! This module centralizes the **survey defaults**, **file naming conventions**, and
//! **common type aliases** used throughout the `ananke` library.
//!
//! ## Overview
//!
//! - Default survey parameters (photometric system, CMD selection, sampling, kernel settings)
//! - Naming conventions shared with the Galaxia engine (exchange files, isochrone files)
//! - Column names expected in isochrone tables and in the engine output catalog
//! - Core type aliases used across the crate

// -------------------------------------------------------------------------------------------------
// Survey defaults
// -------------------------------------------------------------------------------------------------

/// Photometric system used when none is requested
pub const DEFAULT_PSYS: &str = "GAIA__DR2";

/// CMD selection used when none is requested, format `"band1,band2-band3"`
pub const DEFAULT_CMD: &str = "G,G_BP-G_RP";

/// Default name tag of the exchange files
pub const DEFAULT_SIMNAME: &str = "sim";

/// Default name of the survey output files
pub const DEFAULT_SURVEYNAME: &str = "survey";

/// Full sample
pub const DEFAULT_FSAMPLE: f64 = 1.0;

/// Number of neighbouring particles used for the kernel density estimates
pub const DEFAULT_NGB: u32 = 64;

/// Kernel normalization constant
pub const DEFAULT_KNORM: f64 = 0.596831;

/// Solar metallicity (mass fraction) of the Padova isochrone grids
pub const Z_SOLAR: f64 = 0.019;

/// Phase-space dimensionality passed to the engine (`--hdim`)
pub const HDIM: u32 = 6;

// -------------------------------------------------------------------------------------------------
// File naming conventions
// -------------------------------------------------------------------------------------------------

/// Extension of every exchange file (inputs and engine output)
pub const EXCHANGE_EXTENSION: &str = "ankx";

/// Prefix of the isochrone file naming template `output_<metallicity>.dat`
pub const ISOCHRONE_PREFIX: &str = "output_";

/// Suffix of the isochrone file naming template `output_<metallicity>.dat`
pub const ISOCHRONE_SUFFIX: &str = ".dat";

/// Comment marker of the isochrone header lines
pub const ISOCHRONE_COMMENT: char = '#';

// -------------------------------------------------------------------------------------------------
// Column names
// -------------------------------------------------------------------------------------------------

/// Isochrone column holding log10(age / yr)
pub const ISOCHRONE_AGE: &str = "Age";

/// Isochrone column holding the initial stellar mass
pub const ISOCHRONE_M_INI: &str = "M_ini";

/// Engine output column holding log10(age / yr)
pub const STAR_AGE: &str = "age";

/// Engine output column holding [Fe/H]
pub const STAR_FEH: &str = "feh";

/// Engine output column holding the initial stellar mass
pub const STAR_SMASS: &str = "smass";

/// Engine output column holding the distance modulus
pub const STAR_DMOD: &str = "dmod";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Metallicity key of an isochrone table (Z or [M/H], depending on the grid)
pub type Metallicity = f64;

/// log10 of an age in years
pub type LogAge = f64;

/// Mass in solar masses
pub type SolarMass = f64;

/// Magnitude in a photometric band
pub type Magnitude = f64;
