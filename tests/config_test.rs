//! Configuration loading tests

use std::io::Write;

use sbig_camera::config::CaptureConfig;
use sbig_camera::device_info::FilterSet;
use sbig_camera::exposure::ShutterAction;
use sbig_camera::readout_mode::ReadoutModeId;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
[application]
log_level = "debug"
log_format = "json"

[camera]
model = "ST-7"
filter_wheel = "CFW-8"
filter_set = "UBVRI"

[camera.filters]
5 = "Ha"

[exposure]
readout_mode = "2x2"
shutter = "close-close"
output_dir = "/data/darks"

[telescope]
url = "http://mount.local:8080"
"#,
    );

    let config = CaptureConfig::load_from(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.camera.model, "ST-7");
    assert_eq!(config.camera.filter_set, Some(FilterSet::Ubvri));
    assert_eq!(config.exposure.readout_mode, ReadoutModeId::Bin2x2);
    assert_eq!(config.exposure.shutter, ShutterAction::CloseClose);
    assert_eq!(config.telescope.url.as_deref(), Some("http://mount.local:8080"));

    let names = config.slot_names().unwrap();
    assert_eq!(names.get(&1).map(String::as_str), Some("U"));
    assert_eq!(names.get(&5).map(String::as_str), Some("Ha"));
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config("[camera]\nmodel = \"ST-402\"\n");

    let config = CaptureConfig::load_from(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.camera.model, "ST-402");
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.exposure.readout_mode, ReadoutModeId::Bin1x1);
    assert_eq!(config.exposure.shutter, ShutterAction::OpenClose);
    assert!(config.camera.filter_wheel.is_none());
}

#[test]
fn test_bad_readout_mode_fails_to_load() {
    let file = write_config("[exposure]\nreadout_mode = \"4x4\"\n");
    assert!(CaptureConfig::load_from(file.path()).is_err());
}

#[test]
fn test_unknown_camera_fails_validation() {
    let file = write_config("[camera]\nmodel = \"ST-2000XM\"\n");
    let config = CaptureConfig::load_from(file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.contains("ST-2000XM"));
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/sbig_camera.toml");
    let config = CaptureConfig::load_from(path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.camera.filter_wheel.as_deref(), Some("CFW-8"));
}
