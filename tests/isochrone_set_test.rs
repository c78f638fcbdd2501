mod common;

use ananke::{
    photometry::{
        interpolation::{LinearInZ, MetallicityScale},
        isochrone_file::IsochroneState,
        isochrone_set::{IsochroneSet, Nearest},
    },
    AnankeError,
};
use approx::assert_relative_eq;
use common::{ps1_magnitude, tmp_dir, write_ps1_grid};

#[test]
fn test_ps1_grid_discovery() {
    let (_guard, root) = tmp_dir();
    let registry = write_ps1_grid(&root);
    let set = IsochroneSet::for_system(&registry, "PS1").unwrap();
    assert_eq!(set.name(), "PS1");
    assert_eq!(set.metallicities(), &[0.008, 0.019, 0.03]);
    assert!(set.rejected().is_empty());
    assert!(set
        .files()
        .iter()
        .all(|f| f.state() == IsochroneState::HeaderParsed));
}

#[test]
fn test_nearest_and_lazy_loading() {
    let (_guard, root) = tmp_dir();
    let registry = write_ps1_grid(&root);
    let set = IsochroneSet::for_system(&registry, "PS1").unwrap();

    match set.nearest(0.019).unwrap() {
        Nearest::Exact(file) => assert_eq!(file.file_name(), "output_0.0190.dat"),
        other => panic!("expected an exact match, got {other:?}"),
    }
    assert!(matches!(
        set.nearest(0.001),
        Err(AnankeError::MetallicityOutOfRange { .. })
    ));

    let z = MetallicityScale::default().from_feh(-0.2);
    let values = set
        .interpolate(z, 9.25, 1.5, &["gP1", "wP1"], &LinearInZ)
        .unwrap();
    assert_relative_eq!(values[0], ps1_magnitude(z, 9.25, 1.5, 0), epsilon = 1e-9);
    assert_relative_eq!(values[1], ps1_magnitude(z, 9.25, 1.5, 5), epsilon = 1e-9);

    // only the two bracketing files were read
    let loaded: Vec<_> = set
        .files()
        .iter()
        .map(|f| f.state() == IsochroneState::DataLoaded)
        .collect();
    assert_eq!(loaded, [true, true, false]);
}

#[test]
fn test_outside_the_tracks() {
    let (_guard, root) = tmp_dir();
    let registry = write_ps1_grid(&root);
    let set = IsochroneSet::for_system(&registry, "PS1").unwrap();
    assert!(matches!(
        set.interpolate(0.019, 10.5, 1.0, &["gP1"], &LinearInZ),
        Err(AnankeError::Coverage(_))
    ));
    assert!(matches!(
        set.interpolate(0.019, 9.0, 0.05, &["gP1"], &LinearInZ),
        Err(AnankeError::Coverage(_))
    ));
}
