//! # Engine control parameters
//!
//! The engine is driven by a plain-text control file of `key value` lines. This module declares
//! the fixed template of keys the engine understands ([`GALAXIA_TEMPLATE`]), the value model
//! ([`ParamValue`]) and the typed overrides a caller may apply ([`ParameterOverrides`]).
//!
//! ## Overview
//!
//! Every template key carries a [`ParamKind`] that governs coercion and range checks:
//!
//! | kind               | accepted values                                         |
//! |--------------------|---------------------------------------------------------|
//! | `Int { min, max }` | integers, integral floats, integer text                 |
//! | `Float { .. }`     | any number or numeric text, range checked               |
//! | `PositiveFloat`    | as `Float`, strictly greater than zero                  |
//! | `Text`             | any non-empty text without whitespace                   |
//! | `Choice(names)`    | one of the listed names                                 |
//! | `Cmd`              | a [`CmdSelection`](cmd_selection::CmdSelection) string  |
//!
//! Keys that are not in the template are rejected with
//! [`AnankeError::UnknownParameter`](crate::ananke_errors::AnankeError::UnknownParameter);
//! they are never silently written to the control file.
//!
//! ## See also
//! ------------
//! * [`parameter_file::ParameterFileBuilder`] – Resolution and rendering of the control file.
use std::{collections::BTreeMap, fmt, fs::File, io::Read};

use camino::Utf8Path;
use serde::Deserialize;

use crate::{
    ananke_errors::AnankeError,
    constants::{DEFAULT_CMD, DEFAULT_PSYS, DEFAULT_SURVEYNAME},
    photometry::registry::SYSTEM_NAMES,
};
use cmd_selection::CmdSelection;

pub mod cmd_selection;
pub mod parameter_file;

/// A control file value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&CmdSelection> for ParamValue {
    fn from(value: &CmdSelection) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Type and admissible range of a template key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Integer within `[min, max]`
    Int { min: i64, max: i64 },
    /// Real number within `[min, max]`
    Float { min: f64, max: f64 },
    /// Real number strictly above zero
    PositiveFloat,
    Text,
    Choice(&'static [&'static str]),
    Cmd,
}

/// One key of the control file template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    /// Default value, as it would be written in the control file
    pub default: &'static str,
}

const fn spec(key: &'static str, kind: ParamKind, default: &'static str) -> ParamSpec {
    ParamSpec { key, kind, default }
}

const ANY: ParamKind = ParamKind::Float {
    min: f64::NEG_INFINITY,
    max: f64::INFINITY,
};

const SWITCH: ParamKind = ParamKind::Int { min: 0, max: 1 };

/// Keys understood by the Galaxia engine, in the order they are written.
pub const GALAXIA_TEMPLATE: &[ParamSpec] = &[
    spec("outputFile", ParamKind::Text, DEFAULT_SURVEYNAME),
    spec("outputDir", ParamKind::Text, "./"),
    spec("photoSys", ParamKind::Choice(SYSTEM_NAMES), DEFAULT_PSYS),
    spec("magcolorNames", ParamKind::Cmd, DEFAULT_CMD),
    spec("appMagLimits[0]", ANY, "-1000"),
    spec("appMagLimits[1]", ANY, "30"),
    spec("absMagLimits[0]", ANY, "-1000"),
    spec("absMagLimits[1]", ANY, "1000"),
    spec("colorLimits[0]", ANY, "-1000"),
    spec("colorLimits[1]", ANY, "1000"),
    spec("geometryOption", SWITCH, "0"),
    spec("longitude", ParamKind::Float { min: 0.0, max: 360.0 }, "0"),
    spec("latitude", ParamKind::Float { min: -90.0, max: 90.0 }, "90"),
    spec("surveyArea", ParamKind::Float { min: 0.0, max: 41253.0 }, "1000"),
    spec("fSample", ParamKind::Float { min: 0.0, max: 1.0 }, "1"),
    spec("popID", ParamKind::Int { min: -1, max: 10 }, "10"),
    spec("warpFlareOn", SWITCH, "0"),
    spec("seed", ParamKind::Int { min: 0, max: i64::MAX }, "17"),
    spec("r_max", ParamKind::PositiveFloat, "1000"),
    spec("starType", SWITCH, "0"),
    spec("photoError", SWITCH, "0"),
    spec("rSun[0]", ANY, "0"),
    spec("rSun[1]", ANY, "0"),
    spec("rSun[2]", ANY, "0"),
    spec("vSun[0]", ANY, "0"),
    spec("vSun[1]", ANY, "0"),
    spec("vSun[2]", ANY, "0"),
    spec("nres", ParamKind::Int { min: 1, max: i64::MAX }, "64"),
    spec("knorm", ParamKind::PositiveFloat, "0.596831"),
];

/// Keys the survey pipeline sets itself from its own configuration.
pub const MANAGED_KEYS: &[&str] = &[
    "outputFile",
    "outputDir",
    "photoSys",
    "magcolorNames",
    "fSample",
    "nres",
    "knorm",
];

impl ParamSpec {
    /// Convert `value` to the kind of this key and check its range.
    ///
    /// Return
    /// ----------
    /// * The coerced value, or `Err(AnankeError::InvalidParameter)` naming the key.
    pub fn coerce(&self, value: &ParamValue) -> Result<ParamValue, AnankeError> {
        let invalid = |reason: String| {
            AnankeError::InvalidParameter(format!("{} = {value}: {reason}", self.key))
        };
        match self.kind {
            ParamKind::Int { min, max } => {
                let i = match value {
                    ParamValue::Int(i) => *i,
                    ParamValue::Float(x) if x.is_finite() && x.fract() == 0.0 => *x as i64,
                    ParamValue::Float(_) => return Err(invalid("expected an integer".into())),
                    ParamValue::Text(s) => s
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| invalid("expected an integer".into()))?,
                };
                if i < min || i > max {
                    return Err(invalid(format!("outside [{min}, {max}]")));
                }
                Ok(ParamValue::Int(i))
            }
            ParamKind::Float { .. } | ParamKind::PositiveFloat => {
                let x = match value {
                    ParamValue::Int(i) => *i as f64,
                    ParamValue::Float(x) => *x,
                    ParamValue::Text(s) => s
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| invalid("expected a number".into()))?,
                };
                if x.is_nan() {
                    return Err(invalid("expected a number".into()));
                }
                match self.kind {
                    ParamKind::Float { min, max } if x < min || x > max => {
                        Err(invalid(format!("outside [{min}, {max}]")))
                    }
                    ParamKind::PositiveFloat if !(x > 0.0 && x.is_finite()) => {
                        Err(invalid("must be positive".into()))
                    }
                    _ => Ok(ParamValue::Float(x)),
                }
            }
            ParamKind::Text => {
                let text = value.to_string();
                if text.is_empty() || text.chars().any(char::is_whitespace) {
                    return Err(invalid("text must be non-empty without whitespace".into()));
                }
                Ok(ParamValue::Text(text))
            }
            ParamKind::Choice(options) => {
                let text = value.to_string();
                if !options.contains(&text.as_str()) {
                    return Err(invalid(format!("expected one of {}", options.join(", "))));
                }
                Ok(ParamValue::Text(text))
            }
            ParamKind::Cmd => {
                let cmd = CmdSelection::parse(&value.to_string())?;
                Ok(ParamValue::Text(cmd.to_string()))
            }
        }
    }
}

/// Caller-supplied values for template keys.
///
/// Overrides are checked against the template only when the control file is resolved, so
/// they can be assembled freely and merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    values: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Deserialize)]
struct OverrideRecord {
    key: String,
    value: ParamValue,
}

impl ParameterOverrides {
    pub fn new() -> Self {
        ParameterOverrides::default()
    }

    /// Read overrides from a CSV file with a `key,value` header.
    ///
    /// Values that look like integers or floats are read as such, anything else as text. Keys
    /// are not checked here; a later key replaces an earlier one.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::IoError)` if the file cannot be opened.
    /// * `Err(AnankeError::CsvError)` if a row is malformed.
    pub fn from_csv(path: &Utf8Path) -> Result<Self, AnankeError> {
        Self::from_reader(File::open(path)?)
    }

    /// As [`from_csv`](Self::from_csv), from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AnankeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut overrides = ParameterOverrides::new();
        for record in reader.deserialize::<OverrideRecord>() {
            let record = record?;
            overrides.insert(record.key, record.value);
        }
        Ok(overrides)
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Add every entry of `other`, replacing values of keys present in both.
    pub fn extend(&mut self, other: &ParameterOverrides) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
