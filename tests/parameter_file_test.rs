mod common;

use ananke::{
    parameters::{parameter_file::ParameterFileBuilder, ParamValue, ParameterOverrides},
    AnankeError,
};
use common::tmp_dir;

#[test]
fn test_render_to_file() {
    let (_guard, dir) = tmp_dir();
    let overrides = ParameterOverrides::new()
        .with("outputFile", "mw")
        .with("photoSys", "PS1")
        .with("magcolorNames", "rP1,gP1-rP1")
        .with("latitude", 30.0)
        .with("seed", 12);
    let path = dir.join("mw_parameters");
    let builder = ParameterFileBuilder::new();
    let written = builder.render(&overrides, &path).unwrap();
    assert_eq!(written, path.as_path());

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, builder.render_to_string(&overrides).unwrap());
    let keys: Vec<&str> = text
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    let template: Vec<&str> = builder.template().iter().map(|spec| spec.key).collect();
    assert_eq!(keys, template);
    assert!(text.lines().any(|l| l.split_whitespace().eq(["latitude", "30"])));
}

#[test]
fn test_invalid_overrides() {
    let builder = ParameterFileBuilder::new();
    assert_eq!(
        builder
            .render_to_string(&ParameterOverrides::new().with("colour", "red"))
            .map(|_| ()),
        Err(AnankeError::UnknownParameter("colour".into()))
    );
    assert!(matches!(
        builder.resolve(&ParameterOverrides::new().with("photoSys", "HST")),
        Err(AnankeError::InvalidParameter(_))
    ));

    let resolved = builder
        .resolve(&ParameterOverrides::new().with("seed", 4))
        .unwrap();
    assert_eq!(resolved.get("seed"), Some(&ParamValue::Int(4)));
}

#[test]
fn test_overrides_loaded_from_file_drive_the_survey() {
    let (_guard, dir) = tmp_dir();
    let path = dir.join("overrides.csv");
    std::fs::write(&path, "key,value\nlatitude,30\nseed,12\n").unwrap();

    let overrides = ParameterOverrides::from_csv(&path).unwrap();
    let config = ananke::SurveyConfig::builder()
        .photo_sys("PS1")
        .overrides(&overrides)
        .build()
        .unwrap();
    assert_eq!(config.overrides.get("seed"), Some(&ParamValue::Int(12)));
    let text = ParameterFileBuilder::new()
        .render_to_string(&config.overrides)
        .unwrap();
    assert!(text.lines().any(|l| l.split_whitespace().eq(["latitude", "30"])));

    std::fs::write(&path, "key,value\nlattitude,30\n").unwrap();
    let overrides = ParameterOverrides::from_csv(&path).unwrap();
    assert_eq!(
        ananke::SurveyConfig::builder()
            .overrides(&overrides)
            .build()
            .map(|_| ()),
        Err(AnankeError::UnknownParameter("lattitude".into()))
    );
    assert!(matches!(
        ParameterOverrides::from_csv(&dir.join("missing.csv")),
        Err(AnankeError::IoError(_))
    ));
}
