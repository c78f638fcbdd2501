use std::sync::Arc;

use camino::Utf8Path;
use log::{info, warn};

use crate::{
    ananke_errors::AnankeError,
    constants::{STAR_AGE, STAR_FEH, STAR_SMASS},
    exchange::{ColumnData, ExchangeTable},
    output::SurveyReport,
    photometry::{
        interpolation::{MetallicityInterpolation, MetallicityScale},
        isochrone_set::IsochroneSet,
    },
};

/// Attach absolute magnitudes of every filter of every set to the engine catalog.
///
/// Stars that fall outside a grid, or whose bracketing isochrone file cannot be loaded, are
/// dropped and counted; the failing files are listed in the report.
///
/// Arguments
/// -----------------
/// * `catalog`: engine output, with `age`, `feh` and `smass` columns.
/// * `source`: path of the catalog, for error messages.
/// * `sets`: one isochrone set per requested photometric system.
/// * `strategy`, `scale`: how metallicities are mapped and interpolated.
///
/// Return
/// ----------
/// * The kept stars with `<SYSTEM>_<filter>` columns appended, and the run report.
/// * `Err(AnankeError::InvalidParameter)` if `strategy` cannot combine two bracketing tables.
pub(crate) fn attach_photometry(
    catalog: &ExchangeTable,
    source: &Utf8Path,
    sets: &[Arc<IsochroneSet>],
    strategy: &dyn MetallicityInterpolation,
    scale: MetallicityScale,
) -> Result<(ExchangeTable, SurveyReport), AnankeError> {
    let star_column = |name: &str| {
        catalog
            .float_column(name)
            .ok_or_else(|| AnankeError::ExchangeFormat {
                path: source.to_string(),
                reason: format!("engine output has no scalar column '{name}'"),
            })
    };
    let ages = star_column(STAR_AGE)?;
    let fehs = star_column(STAR_FEH)?;
    let masses = star_column(STAR_SMASS)?;

    let targets: Vec<(&IsochroneSet, Vec<&str>)> = sets
        .iter()
        .map(|set| (set.as_ref(), set.system().filters().to_vec()))
        .collect();
    let mut magnitudes: Vec<Vec<f64>> = targets
        .iter()
        .flat_map(|(_, filters)| filters.iter().map(|_| Vec::new()))
        .collect();

    let mut kept = Vec::with_capacity(catalog.n_rows());
    let mut failed_isochrones: Vec<String> = Vec::new();
    let mut star = Vec::with_capacity(magnitudes.len());
    for row in 0..catalog.n_rows() {
        let z = scale.from_feh(fehs[row]);
        star.clear();
        let mut covered = true;
        for (set, filters) in &targets {
            match set.interpolate(z, ages[row], masses[row], filters, strategy) {
                Ok(values) => star.extend(values),
                Err(AnankeError::Coverage(_)) => {
                    covered = false;
                    break;
                }
                Err(e @ AnankeError::InvalidParameter(_)) => return Err(e),
                Err(e) => {
                    let reason = e.to_string();
                    if !failed_isochrones.contains(&reason) {
                        warn!("Isochrone failure while attaching {}: {reason}", set.name());
                        failed_isochrones.push(reason);
                    }
                    covered = false;
                    break;
                }
            }
        }
        if covered {
            kept.push(row);
            for (column, value) in magnitudes.iter_mut().zip(&star) {
                column.push(*value);
            }
        }
    }

    let report = SurveyReport {
        n_generated: catalog.n_rows(),
        n_dropped: catalog.n_rows() - kept.len(),
        failed_isochrones,
    };
    info!(
        "Attached photometry to {} stars, dropped {} outside isochrone coverage",
        kept.len(),
        report.n_dropped
    );

    let mut table = catalog.select_rows(&kept);
    let names = targets
        .iter()
        .flat_map(|(set, filters)| filters.iter().map(|f| set.system().column_name(f)));
    for (name, values) in names.zip(magnitudes) {
        table.set_column(name, ColumnData::Float(values))?;
    }
    Ok((table, report))
}

#[cfg(test)]
mod test_attach {
    use super::*;
    use crate::photometry::{
        interpolation::LinearInZ, isochrone_file::IsochroneFile, isochrone_table::IsochroneTable,
        registry::PhotometricRegistry,
    };
    use approx::assert_relative_eq;
    use camino::Utf8PathBuf;

    /// 2MASS grid at Z = 0.01 and 0.02 where every band equals Age + M_ini + 100 Z
    fn two_mass_set(dir: &Utf8PathBuf) -> Arc<IsochroneSet> {
        for z in ["0.010", "0.020"] {
            let zf: f64 = z.parse().unwrap();
            let mut rows = Vec::new();
            for age in [8.0, 10.0] {
                for mass in [0.1, 2.0] {
                    let m = age + mass + 100.0 * zf;
                    rows.push(vec![age, mass, m, m, m]);
                }
            }
            let columns = ["Age", "M_ini", "J", "H", "Ks"].map(String::from).to_vec();
            let table = IsochroneTable::new(columns, rows).unwrap();
            IsochroneFile::create(dir.join(format!("padova/2MASS/output_{z}.dat")), &table)
                .unwrap();
        }
        let registry = PhotometricRegistry::new(dir.clone());
        Arc::new(IsochroneSet::for_system(&registry, "2MASS").unwrap())
    }

    fn catalog(feh: Vec<f64>) -> ExchangeTable {
        let n = feh.len();
        let mut table = ExchangeTable::new(n);
        table.push_column("age", ColumnData::Float(vec![9.0; n])).unwrap();
        table.push_column("feh", ColumnData::Float(feh)).unwrap();
        table.push_column("smass", ColumnData::Float(vec![1.0; n])).unwrap();
        table
    }

    #[test]
    fn test_attach_and_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let set = two_mass_set(&root);

        // Z = 0.015 * 10^feh with feh = log10(1) -> 0.015; the last star is too metal rich
        let table = catalog(vec![0.0, 0.0, 1.0]);
        let (out, report) = attach_photometry(
            &table,
            Utf8Path::new("survey.ankx"),
            &[set],
            &LinearInZ,
            MetallicityScale::MassFraction { z_solar: 0.015 },
        )
        .unwrap();

        assert_eq!(report.n_generated, 3);
        assert_eq!(report.n_dropped, 1);
        assert_eq!(out.n_rows(), 2);
        let ks = out.float_column("2MASS_Ks").unwrap();
        assert_relative_eq!(ks[0], 9.0 + 1.0 + 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_corrupt_file_drops_only_its_stars() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let set = two_mass_set(&root);
        let corrupt = root.join("padova/2MASS/output_0.020.dat");
        let mut text = std::fs::read_to_string(&corrupt).unwrap();
        text.push_str("9.0 1.0 3.0\n");
        std::fs::write(&corrupt, text).unwrap();

        // Z = 0.010 sits on the intact file, Z = 0.015 needs both files
        let table = catalog(vec![0.0, (0.015_f64 / 0.01).log10(), 0.0]);
        let (out, report) = attach_photometry(
            &table,
            Utf8Path::new("survey.ankx"),
            &[set],
            &LinearInZ,
            MetallicityScale::MassFraction { z_solar: 0.01 },
        )
        .unwrap();

        assert_eq!(out.n_rows(), 2);
        assert_eq!(report.n_dropped, 1);
        assert_eq!(report.failed_isochrones.len(), 1);
        assert!(report.failed_isochrones[0].contains("output_0.020.dat"));
        let ks = out.float_column("2MASS_Ks").unwrap();
        assert_relative_eq!(ks[0], 9.0 + 1.0 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_undefined_strategy_aborts() {
        #[derive(Debug)]
        struct NoWeight;
        impl MetallicityInterpolation for NoWeight {
            fn weight(&self, _z: f64, _lower: f64, _upper: f64) -> Option<f64> {
                None
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let set = two_mass_set(&root);
        let table = catalog(vec![0.0]);
        assert!(matches!(
            attach_photometry(
                &table,
                Utf8Path::new("survey.ankx"),
                &[set],
                &NoWeight,
                MetallicityScale::MassFraction { z_solar: 0.015 },
            ),
            Err(AnankeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_missing_star_column() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let set = two_mass_set(&root);

        let mut table = ExchangeTable::new(1);
        table.push_column("age", ColumnData::Float(vec![9.0])).unwrap();
        assert!(matches!(
            attach_photometry(
                &table,
                Utf8Path::new("survey.ankx"),
                &[set],
                &LinearInZ,
                MetallicityScale::default()
            ),
            Err(AnankeError::ExchangeFormat { .. })
        ));
    }
}
