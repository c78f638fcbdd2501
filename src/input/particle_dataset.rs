//! # Particle datasets
//!
//! A [`ParticleDataset`] bundles validated particle columns with their kernel density estimates
//! and the run settings that name and parameterize the exchange files (`name`, `ngb`, `knorm`).
//! Once built, a dataset is guaranteed to be writable: every check happens in
//! [`ParticleDataset::new`], before anything touches the filesystem.
//!
//! ## Example
//!
//! ```rust, no_run
//! use ananke::input::particle_dataset::{ArrayLike, DatasetOptions, ParticleDataset};
//! use nalgebra::Vector3;
//!
//! let n = 100;
//! let particles: Vec<(&str, ArrayLike)> = vec![
//!     ("pos3", vec![Vector3::new(8.0, 0.0, 0.0); n].into()),
//!     ("vel3", vec![Vector3::new(0.0, 220.0, 0.0); n].into()),
//!     ("mass", vec![1.0e4_f64; n].into()),
//!     ("age", vec![9.5_f64; n].into()),
//!     ("feh", vec![-0.1_f64; n].into()),
//! ];
//! let dataset = ParticleDataset::new(
//!     particles,
//!     vec![1.0_f64; n],
//!     vec![1.0_f64; n],
//!     DatasetOptions::default(),
//! )?;
//! assert_eq!(dataset.len(), 100);
//! # Ok::<(), ananke::ananke_errors::AnankeError>(())
//! ```
use nalgebra::Vector3;

use super::record_schema::RecordSchema;
use crate::{
    ananke_errors::AnankeError,
    constants::{DEFAULT_KNORM, DEFAULT_NGB, DEFAULT_SIMNAME},
    exchange::{ColumnData, ExchangeTable},
};

/// Loosely typed column supplied by a caller, before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayLike {
    Float64(Vec<f64>),
    Float32(Vec<f32>),
    Int64(Vec<i64>),
    Int32(Vec<i32>),
    Bool(Vec<bool>),
    Vector3(Vec<Vector3<f64>>),
    /// Complex numbers as `(re, im)`; always rejected
    Complex(Vec<(f64, f64)>),
    /// Always rejected
    Text(Vec<String>),
}

impl ArrayLike {
    pub fn len(&self) -> usize {
        match self {
            ArrayLike::Float64(v) => v.len(),
            ArrayLike::Float32(v) => v.len(),
            ArrayLike::Int64(v) => v.len(),
            ArrayLike::Int32(v) => v.len(),
            ArrayLike::Bool(v) => v.len(),
            ArrayLike::Vector3(v) => v.len(),
            ArrayLike::Complex(v) => v.len(),
            ArrayLike::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype_name(&self) -> &'static str {
        match self {
            ArrayLike::Float64(_) => "f64",
            ArrayLike::Float32(_) => "f32",
            ArrayLike::Int64(_) => "i64",
            ArrayLike::Int32(_) => "i32",
            ArrayLike::Bool(_) => "bool",
            ArrayLike::Vector3(_) => "3-vector",
            ArrayLike::Complex(_) => "complex",
            ArrayLike::Text(_) => "text",
        }
    }
}

macro_rules! array_like_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for ArrayLike {
                fn from(values: Vec<$t>) -> Self {
                    ArrayLike::$variant(values)
                }
            }
        )*
    };
}

array_like_from!(
    f64 => Float64,
    f32 => Float32,
    i64 => Int64,
    i32 => Int32,
    bool => Bool,
    Vector3<f64> => Vector3,
    String => Text,
);

impl From<&[f64]> for ArrayLike {
    fn from(values: &[f64]) -> Self {
        ArrayLike::Float64(values.to_vec())
    }
}

impl From<Vec<[f64; 3]>> for ArrayLike {
    fn from(values: Vec<[f64; 3]>) -> Self {
        ArrayLike::Vector3(values.into_iter().map(Vector3::from).collect())
    }
}

/// Name tag and kernel settings of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOptions {
    /// Name tag of the exchange files
    pub name: String,
    /// Number of neighbours used for the density estimates
    pub ngb: u32,
    /// Kernel normalization constant
    pub knorm: f64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions {
            name: DEFAULT_SIMNAME.to_string(),
            ngb: DEFAULT_NGB,
            knorm: DEFAULT_KNORM,
        }
    }
}

impl DatasetOptions {
    pub(crate) fn validate(&self) -> Result<(), AnankeError> {
        validate_name_tag(&self.name)?;
        if self.ngb < 1 {
            return Err(AnankeError::Schema("ngb must be at least 1".into()));
        }
        if !(self.knorm.is_finite() && self.knorm > 0.0) {
            return Err(AnankeError::Schema(format!(
                "knorm must be a positive finite number, got {}",
                self.knorm
            )));
        }
        Ok(())
    }
}

/// A name tag becomes part of file names and of engine arguments.
pub(crate) fn validate_name_tag(name: &str) -> Result<(), AnankeError> {
    if name.is_empty() {
        return Err(AnankeError::Schema("empty name tag".into()));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\')
    {
        return Err(AnankeError::Schema(format!(
            "name tag '{name}' contains a path separator or whitespace"
        )));
    }
    Ok(())
}

/// Kernel density estimates in position and velocity space, one value per particle.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityEstimates {
    rho_pos: Vec<f64>,
    rho_vel: Vec<f64>,
}

impl DensityEstimates {
    /// Validate two density arrays.
    ///
    /// Both must hold real numbers, have the same length, and only contain positive finite
    /// values.
    pub fn new(
        rho_pos: impl Into<ArrayLike>,
        rho_vel: impl Into<ArrayLike>,
    ) -> Result<Self, AnankeError> {
        let rho_pos = density_values("rho_pos", rho_pos.into())?;
        let rho_vel = density_values("rho_vel", rho_vel.into())?;
        if rho_pos.len() != rho_vel.len() {
            return Err(AnankeError::Schema(format!(
                "rho_vel has length {}, expected {}",
                rho_vel.len(),
                rho_pos.len()
            )));
        }
        Ok(DensityEstimates { rho_pos, rho_vel })
    }

    pub fn len(&self) -> usize {
        self.rho_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rho_pos.is_empty()
    }

    pub fn rho_pos(&self) -> &[f64] {
        &self.rho_pos
    }

    pub fn rho_vel(&self) -> &[f64] {
        &self.rho_vel
    }
}

fn density_values(name: &str, values: ArrayLike) -> Result<Vec<f64>, AnankeError> {
    let values: Vec<f64> = match values {
        ArrayLike::Float64(v) => v,
        ArrayLike::Float32(v) => v.into_iter().map(f64::from).collect(),
        ArrayLike::Int64(v) => v.into_iter().map(|i| i as f64).collect(),
        ArrayLike::Int32(v) => v.into_iter().map(f64::from).collect(),
        other => {
            return Err(AnankeError::Schema(format!(
                "{name} must hold real numbers, got {}",
                other.dtype_name()
            )))
        }
    };
    if let Some((index, value)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(AnankeError::Schema(format!(
            "{name}[{index}] = {value} is not a positive finite density"
        )));
    }
    Ok(values)
}

/// Validated particles ready to be written as exchange files.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleDataset {
    options: DatasetOptions,
    particles: ExchangeTable,
    densities: DensityEstimates,
}

impl ParticleDataset {
    /// Validate particle fields and their density estimates.
    ///
    /// Arguments
    /// -----------------
    /// * `fields`: `(name, values)` pairs; see [`RecordSchema`] for the accepted names.
    /// * `rho_pos`, `rho_vel`: kernel density estimates, one per particle.
    /// * `options`: name tag, `ngb` and `knorm` of the run.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::Schema)` on any schema violation, including a density array whose
    ///   length differs from the particle count.
    pub fn new<I, K>(
        fields: I,
        rho_pos: impl Into<ArrayLike>,
        rho_vel: impl Into<ArrayLike>,
        options: DatasetOptions,
    ) -> Result<Self, AnankeError>
    where
        I: IntoIterator<Item = (K, ArrayLike)>,
        K: Into<String>,
    {
        options.validate()?;
        let fields: Vec<(String, ArrayLike)> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let columns = RecordSchema::particles().validate(fields)?;
        let densities = DensityEstimates::new(rho_pos, rho_vel)?;

        let n = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if densities.len() != n {
            return Err(AnankeError::Schema(format!(
                "rho_pos has length {}, expected {n}",
                densities.len()
            )));
        }

        let mut particles = ExchangeTable::new(n);
        for (name, data) in columns {
            particles.push_column(name, data)?;
        }
        Ok(ParticleDataset {
            options,
            particles,
            densities,
        })
    }

    pub fn len(&self) -> usize {
        self.particles.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn ngb(&self) -> u32 {
        self.options.ngb
    }

    pub fn knorm(&self) -> f64 {
        self.options.knorm
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    /// Particle columns in canonical order.
    pub fn particles(&self) -> &ExchangeTable {
        &self.particles
    }

    pub fn field(&self, name: &str) -> Option<&ColumnData> {
        self.particles.column(name)
    }

    pub fn densities(&self) -> &DensityEstimates {
        &self.densities
    }

    /// Density side-table as written to `<name>_d6n<ngb>_den.ankx`.
    pub fn density_table(&self) -> Result<ExchangeTable, AnankeError> {
        let mut table = ExchangeTable::new(self.len());
        table.set_attribute("ngb", f64::from(self.options.ngb));
        table.set_attribute("knorm", self.options.knorm);
        table.push_column("rho_pos", ColumnData::Float(self.densities.rho_pos.clone()))?;
        table.push_column("rho_vel", ColumnData::Float(self.densities.rho_vel.clone()))?;
        Ok(table)
    }
}
