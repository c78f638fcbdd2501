#![allow(dead_code)]
use std::sync::Mutex;

use ananke::{
    exchange::{reader::ExchangeFileReader, writer::ExchangeFileWriter, ColumnData, ExchangeTable},
    photometry::{
        isochrone_file::IsochroneFile, isochrone_table::IsochroneTable,
        registry::PhotometricRegistry,
    },
    survey::engine::{EngineInvocation, EngineReport, SurveyEngine},
    AnankeError, ArrayLike,
};
use camino::{Utf8Path, Utf8PathBuf};

pub const PS1_METALLICITIES: [&str; 3] = ["0.0080", "0.0190", "0.0300"];
pub const PS1_FILTERS: [&str; 6] = ["gP1", "rP1", "iP1", "zP1", "yP1", "wP1"];

pub fn tmp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

/// Absolute magnitude of the synthetic PS1 grid, linear in every coordinate.
pub fn ps1_magnitude(z: f64, age: f64, m_ini: f64, filter: usize) -> f64 {
    age + m_ini + 100.0 * z + filter as f64
}

/// PS1 isochrones at Z = 0.008, 0.019, 0.030, log age 8..10, initial mass 0.1..5.
pub fn write_ps1_grid(root: &Utf8Path) -> PhotometricRegistry {
    write_ps1_grid_at(root, &PS1_METALLICITIES)
}

/// PS1 isochrones on the same age and mass nodes, one file per metallicity key.
pub fn write_ps1_grid_at(root: &Utf8Path, metallicities: &[&str]) -> PhotometricRegistry {
    let mut columns = vec!["Age".to_string(), "M_ini".to_string()];
    columns.extend(PS1_FILTERS.iter().map(|f| f.to_string()));
    for z in metallicities {
        let zf: f64 = z.parse().unwrap();
        let mut rows = Vec::new();
        for age in [8.0, 9.0, 10.0] {
            for mass in [0.1, 1.0, 2.0, 5.0] {
                let mut row = vec![age, mass];
                row.extend((0..PS1_FILTERS.len()).map(|k| ps1_magnitude(zf, age, mass, k)));
                rows.push(row);
            }
        }
        let table = IsochroneTable::new(columns.clone(), rows).unwrap();
        IsochroneFile::create(root.join(format!("padova/PS1/output_{z}.dat")), &table).unwrap();
    }
    PhotometricRegistry::new(root)
}

/// Particles spread on a ring, with ages and metallicities inside the PS1 grid.
pub fn particle_fields(n: usize) -> Vec<(&'static str, ArrayLike)> {
    let pos: Vec<[f64; 3]> = (0..n)
        .map(|i| {
            let phi = i as f64 / n as f64 * std::f64::consts::TAU;
            [8.0 * phi.cos(), 8.0 * phi.sin(), 0.0]
        })
        .collect();
    let vel: Vec<[f64; 3]> = (0..n).map(|_| [0.0, 220.0, 0.0]).collect();
    vec![
        ("pos3", pos.into()),
        ("vel3", vel.into()),
        ("mass", vec![1.0e4_f64; n].into()),
        ("age", (0..n).map(|i| 8.5 + (i % 10) as f64 * 0.1).collect::<Vec<f64>>().into()),
        ("feh", (0..n).map(|i| -0.3 + (i % 5) as f64 * 0.1).collect::<Vec<f64>>().into()),
        ("partid", (0..n as i64).collect::<Vec<i64>>().into()),
    ]
}

/// Engine stand-in: one star per particle, with the particle's age and metallicity, a
/// solar initial mass and a distance modulus of 10.
#[derive(Default)]
pub struct MockEngine {
    pub invocations: Mutex<Vec<EngineInvocation>>,
    /// Keep only every `stride`-th particle
    pub stride: Option<usize>,
    /// Initial mass given to every star
    pub smass: Option<f64>,
}

impl SurveyEngine for MockEngine {
    fn run(&self, invocation: &EngineInvocation) -> Result<EngineReport, AnankeError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let particles = ExchangeFileReader::read(
            &invocation
                .exchange_dir
                .join(format!("{}.ankx", invocation.name)),
        )?;
        let rows: Vec<usize> = (0..particles.n_rows())
            .step_by(self.stride.unwrap_or(1))
            .collect();
        let particles = particles.select_rows(&rows);
        let n = particles.n_rows();

        let mut catalog = ExchangeTable::new(n);
        for name in ["pos3", "age", "feh", "partid"] {
            if let Some(data) = particles.column(name) {
                catalog.push_column(name, data.clone())?;
            }
        }
        catalog.push_column("smass", ColumnData::Float(vec![self.smass.unwrap_or(1.0); n]))?;
        catalog.push_column("dmod", ColumnData::Float(vec![10.0; n]))?;
        ExchangeFileWriter::write_table(&invocation.output_file, &catalog)?;
        Ok(EngineReport {
            stdout: format!("{n} stars\n"),
            stderr: String::new(),
        })
    }
}

/// Engine stand-in that exits cleanly without producing a catalog.
pub struct SilentEngine;

impl SurveyEngine for SilentEngine {
    fn run(&self, _invocation: &EngineInvocation) -> Result<EngineReport, AnankeError> {
        Ok(EngineReport::default())
    }
}
