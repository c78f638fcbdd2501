//! # Particle record schema
//!
//! Declares which per-particle fields the engine understands, which of them are required, and
//! the shape and element type each one must have. [`RecordSchema::validate`] turns loosely typed
//! caller arrays ([`ArrayLike`]) into the canonical, ordered columns written to the particle
//! exchange file.
//!
//! ## Canonical order
//!
//! Declared fields come first, in declaration order (`pos3`, `vel3`, `mass`, `age`, `feh`, then
//! the optional abundances and identifiers). Any extra numeric field not declared here is passed
//! through unchanged after them, in the order the caller supplied it.
use std::collections::HashSet;

use super::particle_dataset::ArrayLike;
use crate::{ananke_errors::AnankeError, exchange::ColumnData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Vector3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Integer,
}

/// Declaration of one particle field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub shape: FieldShape,
    pub kind: FieldKind,
    pub description: &'static str,
}

const fn field(
    name: &'static str,
    required: bool,
    shape: FieldShape,
    kind: FieldKind,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        required,
        shape,
        kind,
        description,
    }
}

use FieldKind::{Float, Integer};
use FieldShape::{Scalar, Vector3};

const PARTICLE_FIELDS: [FieldSpec; 18] = [
    field("pos3", true, Vector3, Float, "position (kpc)"),
    field("vel3", true, Vector3, Float, "velocity (km/s)"),
    field("mass", true, Scalar, Float, "particle mass (solar masses)"),
    field("age", true, Scalar, Float, "log10 of the stellar age (yr)"),
    field("feh", true, Scalar, Float, "[Fe/H] (dex)"),
    field("alpha", false, Scalar, Float, "[alpha/Fe] (dex)"),
    field("helium", false, Scalar, Float, "[He/H] (dex)"),
    field("carbon", false, Scalar, Float, "[C/H] (dex)"),
    field("nitrogen", false, Scalar, Float, "[N/H] (dex)"),
    field("oxygen", false, Scalar, Float, "[O/H] (dex)"),
    field("neon", false, Scalar, Float, "[Ne/H] (dex)"),
    field("magnesium", false, Scalar, Float, "[Mg/H] (dex)"),
    field("silicon", false, Scalar, Float, "[Si/H] (dex)"),
    field("sulphur", false, Scalar, Float, "[S/H] (dex)"),
    field("calcium", false, Scalar, Float, "[Ca/H] (dex)"),
    field("dform", false, Scalar, Float, "formation distance (kpc)"),
    field("parentid", false, Scalar, Integer, "index of the parent particle"),
    field("partid", false, Scalar, Integer, "particle identifier"),
];

/// Ordered set of field declarations.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    fields: &'static [FieldSpec],
}

static PARTICLE_SCHEMA: RecordSchema = RecordSchema {
    fields: &PARTICLE_FIELDS,
};

impl RecordSchema {
    /// Schema of the particle exchange file.
    pub fn particles() -> &'static RecordSchema {
        &PARTICLE_SCHEMA
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn required(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn get(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check and convert caller-supplied fields into canonical columns.
    ///
    /// Arguments
    /// -----------------
    /// * `fields`: `(name, values)` pairs in caller order.
    ///
    /// Return
    /// ----------
    /// * The columns in canonical order, all of the same length.
    /// * `Err(AnankeError::Schema)` when a name repeats, a required field is missing, lengths
    ///   disagree, the set is empty, or a field has a disallowed shape or element type.
    pub fn validate(
        &self,
        fields: Vec<(String, ArrayLike)>,
    ) -> Result<Vec<(String, ColumnData)>, AnankeError> {
        let mut seen = HashSet::new();
        for (name, _) in &fields {
            if !seen.insert(name.as_str()) {
                return Err(AnankeError::Schema(format!("field '{name}' given twice")));
            }
        }
        if let Some(missing) = self.required().find(|spec| !seen.contains(spec.name)) {
            return Err(AnankeError::Schema(format!(
                "missing required field '{}'",
                missing.name
            )));
        }

        let expected = fields.first().map(|(_, values)| values.len()).unwrap_or(0);
        if let Some((name, values)) = fields.iter().find(|(_, v)| v.len() != expected) {
            return Err(AnankeError::Schema(format!(
                "field '{name}' has length {}, expected {expected}",
                values.len()
            )));
        }
        if expected == 0 {
            return Err(AnankeError::Schema("no particles given".into()));
        }

        let mut declared: Vec<Option<ColumnData>> = vec![None; self.fields.len()];
        let mut extras = Vec::new();
        for (name, values) in fields {
            match self.fields.iter().position(|f| f.name == name) {
                Some(index) => declared[index] = Some(coerce(&name, values, &self.fields[index])?),
                None => {
                    let data = coerce_extra(&name, values)?;
                    extras.push((name, data));
                }
            }
        }

        let mut columns: Vec<(String, ColumnData)> = self
            .fields
            .iter()
            .zip(declared)
            .filter_map(|(spec, data)| data.map(|d| (spec.name.to_string(), d)))
            .collect();
        columns.extend(extras);
        Ok(columns)
    }
}

fn disallowed(name: &str, values: &ArrayLike, expected: &str) -> AnankeError {
    AnankeError::Schema(format!(
        "field '{name}' must hold {expected}, got {}",
        values.dtype_name()
    ))
}

fn coerce(name: &str, values: ArrayLike, spec: &FieldSpec) -> Result<ColumnData, AnankeError> {
    match (spec.shape, spec.kind, values) {
        (FieldShape::Vector3, _, ArrayLike::Vector3(v)) => Ok(ColumnData::Vector3(v)),
        (FieldShape::Vector3, _, other) => Err(disallowed(name, &other, "3-vectors")),
        (FieldShape::Scalar, FieldKind::Float, values) => match values {
            ArrayLike::Float64(v) => Ok(ColumnData::Float(v)),
            ArrayLike::Float32(v) => Ok(ColumnData::Float(v.into_iter().map(f64::from).collect())),
            ArrayLike::Int64(v) => Ok(ColumnData::Float(v.into_iter().map(|i| i as f64).collect())),
            ArrayLike::Int32(v) => Ok(ColumnData::Float(v.into_iter().map(f64::from).collect())),
            other => Err(disallowed(name, &other, "real numbers")),
        },
        (FieldShape::Scalar, FieldKind::Integer, values) => match values {
            ArrayLike::Int64(v) => Ok(ColumnData::Integer(v)),
            ArrayLike::Int32(v) => Ok(ColumnData::Integer(v.into_iter().map(i64::from).collect())),
            ArrayLike::Bool(v) => Ok(ColumnData::Integer(v.into_iter().map(i64::from).collect())),
            other => Err(disallowed(name, &other, "integers")),
        },
    }
}

fn coerce_extra(name: &str, values: ArrayLike) -> Result<ColumnData, AnankeError> {
    match values {
        ArrayLike::Float64(v) => Ok(ColumnData::Float(v)),
        ArrayLike::Float32(v) => Ok(ColumnData::Float(v.into_iter().map(f64::from).collect())),
        ArrayLike::Int64(v) => Ok(ColumnData::Integer(v)),
        ArrayLike::Int32(v) => Ok(ColumnData::Integer(v.into_iter().map(i64::from).collect())),
        ArrayLike::Bool(v) => Ok(ColumnData::Integer(v.into_iter().map(i64::from).collect())),
        ArrayLike::Vector3(v) => Ok(ColumnData::Vector3(v)),
        other => Err(disallowed(name, &other, "numbers")),
    }
}
