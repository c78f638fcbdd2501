//! Photometric systems with isochrone grids available to the engine.
//!
//! The registry is a compile-time table: each entry names the system, the directory of its
//! isochrone grid (relative to the isochrone root), its filters and the default CMD selection
//! used when a survey does not provide one.
use camino::{Utf8Path, Utf8PathBuf};

use crate::{ananke_errors::AnankeError, parameters::cmd_selection::CmdSelection};

/// Static description of a photometric system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSpec {
    pub name: &'static str,
    /// Grid directory relative to the isochrone root
    pub subdir: &'static str,
    pub filters: &'static [&'static str],
    pub default_cmd: &'static str,
}

/// Names of every registered system, in registry order.
pub const SYSTEM_NAMES: &[&str] = &["UBV", "SDSS", "2MASS", "PS1", "GAIA__DR2", "WFIRST"];

static SYSTEMS: [SystemSpec; 6] = [
    SystemSpec {
        name: "UBV",
        subdir: "padova/UBV",
        filters: &["U", "B", "V", "R", "I", "J", "H", "K"],
        default_cmd: "V,B-V",
    },
    SystemSpec {
        name: "SDSS",
        subdir: "padova/SDSS",
        filters: &["u", "g", "r", "i", "z"],
        default_cmd: "r,g-r",
    },
    SystemSpec {
        name: "2MASS",
        subdir: "padova/2MASS",
        filters: &["J", "H", "Ks"],
        default_cmd: "Ks,J-Ks",
    },
    SystemSpec {
        name: "PS1",
        subdir: "padova/PS1",
        filters: &["gP1", "rP1", "iP1", "zP1", "yP1", "wP1"],
        default_cmd: "rP1,gP1-rP1",
    },
    SystemSpec {
        name: "GAIA__DR2",
        subdir: "padova/GAIA__DR2",
        filters: &["G", "G_BP", "G_RP"],
        default_cmd: "G,G_BP-G_RP",
    },
    SystemSpec {
        name: "WFIRST",
        subdir: "padova/WFIRST",
        filters: &["R062", "Z087", "Y106", "J129", "H158", "F184", "W146"],
        default_cmd: "H158,J129-H158",
    },
];

/// A registered system bound to a concrete grid directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometricSystem {
    spec: &'static SystemSpec,
    directory: Utf8PathBuf,
}

impl PhotometricSystem {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    pub fn filters(&self) -> &'static [&'static str] {
        self.spec.filters
    }

    pub fn default_cmd(&self) -> Result<CmdSelection, AnankeError> {
        CmdSelection::parse(self.spec.default_cmd)
    }

    /// Name of the output column holding `filter` magnitudes, `<SYSTEM>_<filter>`.
    pub fn column_name(&self, filter: &str) -> String {
        format!("{}_{filter}", self.spec.name)
    }
}

/// Registry of photometric systems rooted at an isochrone directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotometricRegistry {
    root: Utf8PathBuf,
}

impl PhotometricRegistry {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        PhotometricRegistry { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn specs() -> &'static [SystemSpec] {
        &SYSTEMS
    }

    pub fn spec(name: &str) -> Option<&'static SystemSpec> {
        SYSTEMS.iter().find(|s| s.name == name)
    }

    /// Look up a system by name.
    ///
    /// Only the name is checked here; the grid directory is inspected when an
    /// [`IsochroneSet`](super::isochrone_set::IsochroneSet) is built from it.
    pub fn get(&self, name: &str) -> Result<PhotometricSystem, AnankeError> {
        let spec = Self::spec(name).ok_or_else(|| {
            AnankeError::SystemNotFound(format!(
                "'{name}' is not registered (known: {})",
                SYSTEM_NAMES.join(", ")
            ))
        })?;
        Ok(PhotometricSystem {
            spec,
            directory: self.root.join(spec.subdir),
        })
    }
}

#[cfg(test)]
mod test_registry {
    use super::*;

    #[test]
    fn test_names_match_table() {
        let names: Vec<_> = PhotometricRegistry::specs().iter().map(|s| s.name).collect();
        assert_eq!(names, SYSTEM_NAMES);
    }

    #[test]
    fn test_default_cmds_use_own_filters() {
        for spec in PhotometricRegistry::specs() {
            let cmd = CmdSelection::parse(spec.default_cmd).unwrap();
            cmd.check_filters(spec.name, spec.filters).unwrap();
        }
    }

    #[test]
    fn test_get() {
        let registry = PhotometricRegistry::new("/data/isochrones");
        let ps1 = registry.get("PS1").unwrap();
        assert_eq!(ps1.directory().as_str(), "/data/isochrones/padova/PS1");
        assert_eq!(ps1.column_name("gP1"), "PS1_gP1");

        assert!(matches!(
            registry.get("HST"),
            Err(AnankeError::SystemNotFound(_))
        ));
    }
}
