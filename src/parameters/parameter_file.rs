use std::{fmt, fs};

use camino::Utf8Path;
use log::debug;

use super::{ParamSpec, ParamValue, ParameterOverrides, GALAXIA_TEMPLATE};
use crate::ananke_errors::AnankeError;

const KEY_WIDTH: usize = 16;

/// Builds engine control files from the template and caller overrides.
#[derive(Debug, Clone, Copy)]
pub struct ParameterFileBuilder {
    template: &'static [ParamSpec],
}

impl Default for ParameterFileBuilder {
    fn default() -> Self {
        ParameterFileBuilder::new()
    }
}

impl ParameterFileBuilder {
    pub fn new() -> Self {
        ParameterFileBuilder {
            template: GALAXIA_TEMPLATE,
        }
    }

    pub fn template(&self) -> &'static [ParamSpec] {
        self.template
    }

    pub fn spec(&self, key: &str) -> Option<&'static ParamSpec> {
        self.template.iter().find(|spec| spec.key == key)
    }

    /// Reject any override key that is not part of the template.
    pub fn check_keys(&self, overrides: &ParameterOverrides) -> Result<(), AnankeError> {
        match overrides.iter().find(|(key, _)| self.spec(key).is_none()) {
            Some((key, _)) => Err(AnankeError::UnknownParameter(key.to_string())),
            None => Ok(()),
        }
    }

    /// Apply overrides on top of the template defaults.
    ///
    /// Arguments
    /// -----------------
    /// * `overrides`: values for template keys.
    ///
    /// Return
    /// ----------
    /// * Every template key with its coerced value, in template order.
    /// * `Err(AnankeError::UnknownParameter)` for a key outside the template,
    ///   `Err(AnankeError::InvalidParameter)` for a value of the wrong type or range.
    ///
    /// See also
    /// ------------
    /// * [`ParamSpec::coerce`] – Per-key coercion rules.
    pub fn resolve(
        &self,
        overrides: &ParameterOverrides,
    ) -> Result<RenderedParameters, AnankeError> {
        self.check_keys(overrides)?;
        let entries = self
            .template
            .iter()
            .map(|spec| {
                let value = match overrides.get(spec.key) {
                    Some(value) => value.clone(),
                    None => ParamValue::from(spec.default),
                };
                spec.coerce(&value).map(|v| (spec.key, v))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RenderedParameters { entries })
    }

    /// Text of the control file, without writing it.
    pub fn render_to_string(&self, overrides: &ParameterOverrides) -> Result<String, AnankeError> {
        Ok(self.resolve(overrides)?.to_string())
    }

    /// Write the control file at `path` and return that path.
    pub fn render<'p>(
        &self,
        overrides: &ParameterOverrides,
        path: &'p Utf8Path,
    ) -> Result<&'p Utf8Path, AnankeError> {
        self.resolve(overrides)?.write(path)?;
        Ok(path)
    }
}

/// A fully resolved control file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedParameters {
    entries: Vec<(&'static str, ParamValue)>,
}

impl RenderedParameters {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> &[(&'static str, ParamValue)] {
        &self.entries
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), AnankeError> {
        fs::write(path, self.to_string())?;
        debug!("Wrote control file {path}");
        Ok(())
    }
}

impl fmt::Display for RenderedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{key:<KEY_WIDTH$} {value}")?;
        }
        Ok(())
    }
}
