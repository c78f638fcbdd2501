//! # Photometry
//!
//! Stellar isochrone grids and the interpolation that turns a star's (metallicity, age, initial
//! mass) into absolute magnitudes.
//!
//! ## Structure
//!
//! ```text
//! PhotometricRegistry ── root directory
//! └── PhotometricSystem (PS1, GAIA__DR2, …)
//!     └── IsochroneSet          one per system, shared behind an Arc
//!         └── IsochroneFile     output_<Z>.dat, lazily loaded
//!             └── IsochroneTable  sorted by (Age, M_ini)
//! ```
//!
//! Modules
//! -----------------
//! * [`registry`] – Compile-time table of photometric systems.
//! * [`isochrone_file`] – One grid file with cached header and data.
//! * [`isochrone_table`] – Numeric table and in-table bilinear interpolation.
//! * [`isochrone_set`] – Metallicity-ordered files of a system and bracketing lookup.
//! * [`interpolation`] – Bracket search, metallicity strategies and scales.
pub mod interpolation;
pub mod isochrone_file;
pub mod isochrone_set;
pub mod isochrone_table;
pub mod registry;
