//! Build script for sbigudrv-sys FFI bindings.
//!
//! Two modes:
//!
//! 1. With `sbig-sdk` feature: generates bindings from the vendor header and
//!    links the universal driver library.
//! 2. Without feature: writes placeholder bindings so the workspace builds on
//!    machines without the driver installed.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-env-changed=SBIG_SDK_DIR");
    println!("cargo:rerun-if-env-changed=SBIG_LIB_DIR");

    #[cfg(feature = "sbig-sdk")]
    generate_bindings();

    #[cfg(not(feature = "sbig-sdk"))]
    generate_dummy_bindings();
}

#[cfg(feature = "sbig-sdk")]
fn generate_bindings() {
    let sdk_dir = env::var("SBIG_SDK_DIR").expect(
        "SBIG_SDK_DIR environment variable must be set when `sbig-sdk` feature is enabled.",
    );
    let include_path = PathBuf::from(&sdk_dir);

    // Allow SBIG_LIB_DIR to override the default lib path
    let lib_path = env::var("SBIG_LIB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(&sdk_dir));

    if !include_path.join("sbigudrv.h").exists() {
        panic!("sbigudrv.h not found in SBIG_SDK_DIR: {:?}", include_path);
    }

    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .clang_arg(format!("-I{}", include_path.display()))
        .allowlist_function("SBIGUnivDrvCommand")
        // Parameter and result structures
        .allowlist_type(".*Params.*")
        .allowlist_type(".*Results.*")
        .allowlist_type("READOUT_INFO")
        .allowlist_type("QUERY_USB_INFO")
        .allowlist_type("MY_LOGICAL")
        // Keep enum constants at top level so they match the placeholder names
        .default_enum_style(bindgen::EnumVariation::Consts)
        .prepend_enum_name(false)
        .derive_debug(true)
        .derive_default(true)
        .derive_copy(true)
        .generate()
        .expect("Unable to generate sbigudrv bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");

    println!("cargo:rustc-link-search=native={}", lib_path.display());

    #[cfg(target_os = "windows")]
    {
        println!("cargo:rustc-link-lib=SBIGUDrv");
    }
    #[cfg(target_os = "macos")]
    {
        println!("cargo:rustc-link-lib=framework=SBIGUDrv");
    }
    #[cfg(target_os = "linux")]
    {
        println!("cargo:rustc-link-lib=sbigudrv"); // libsbigudrv.so
    }
}

/// Generate placeholder bindings when the vendor driver is not available.
#[cfg(not(feature = "sbig-sdk"))]
fn generate_dummy_bindings() {
    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    let dummy = r#"
// Placeholder bindings - sbig-sdk feature not enabled
//
// Only the structures used by the safe wrapper are declared here. Field names
// and order follow sbigudrv.h so code written against them also compiles
// against bindgen output.

use std::os::raw::{c_char, c_short, c_ulong, c_ushort, c_void};

pub type MY_LOGICAL = c_ushort;
pub type PAR_ERROR = c_ushort;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct StartExposureParams2 {
    pub ccd: c_ushort,
    pub exposureTime: c_ulong,
    pub abgState: c_ushort,
    pub openShutter: c_ushort,
    pub readoutMode: c_ushort,
    pub top: c_ushort,
    pub left: c_ushort,
    pub height: c_ushort,
    pub width: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EndExposureParams {
    pub ccd: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct StartReadoutParams {
    pub ccd: c_ushort,
    pub readoutMode: c_ushort,
    pub top: c_ushort,
    pub left: c_ushort,
    pub height: c_ushort,
    pub width: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct ReadoutLineParams {
    pub ccd: c_ushort,
    pub readoutMode: c_ushort,
    pub pixelStart: c_ushort,
    pub pixelLength: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EndReadoutParams {
    pub ccd: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct SetTemperatureRegulationParams2 {
    pub regulation: c_ushort,
    pub ccdSetpoint: f64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct QueryTemperatureStatusParams {
    pub request: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct QueryTemperatureStatusResults2 {
    pub coolingEnabled: MY_LOGICAL,
    pub fanEnabled: MY_LOGICAL,
    pub ccdSetpoint: f64,
    pub imagingCCDTemperature: f64,
    pub trackingCCDTemperature: f64,
    pub externalTrackingCCDTemperature: f64,
    pub ambientTemperature: f64,
    pub imagingCCDPower: f64,
    pub trackingCCDPower: f64,
    pub externalTrackingCCDPower: f64,
    pub heatsinkTemperature: f64,
    pub fanPower: f64,
    pub fanSpeed: f64,
    pub trackingCCDSetpoint: f64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct QueryCommandStatusParams {
    pub command: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct QueryCommandStatusResults {
    pub status: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct GetCCDInfoParams {
    pub request: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct READOUT_INFO {
    pub mode: c_ushort,
    pub width: c_ushort,
    pub height: c_ushort,
    pub gain: c_ushort,
    pub pixelWidth: c_ulong,
    pub pixelHeight: c_ulong,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GetCCDInfoResults0 {
    pub firmwareVersion: c_ushort,
    pub cameraType: c_ushort,
    pub name: [c_char; 64],
    pub readoutModes: c_ushort,
    pub readoutInfo: [READOUT_INFO; 20],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct GetCCDInfoResults4 {
    pub capabilitiesBits: c_ushort,
    pub dumpExtra: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct OpenDeviceParams {
    pub deviceType: c_ushort,
    pub lptBaseAddress: c_ushort,
    pub ipAddress: c_ulong,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct SetDriverHandleParams {
    pub handle: c_short,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct GetDriverHandleResults {
    pub handle: c_short,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EstablishLinkParams {
    pub sbigUseOnly: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EstablishLinkResults {
    pub cameraType: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct GetDriverInfoParams {
    pub request: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct GetDriverInfoResults0 {
    pub version: c_ushort,
    pub name: [c_char; 64],
    pub maxRequest: c_ushort,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct QUERY_USB_INFO {
    pub cameraFound: MY_LOGICAL,
    pub cameraType: c_ushort,
    pub name: [c_char; 64],
    pub serialNumber: [c_char; 10],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct QueryUSBResults2 {
    pub camerasFound: c_ushort,
    pub usbInfo: [QUERY_USB_INFO; 8],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct CFWParams {
    pub cfwModel: c_ushort,
    pub cfwCommand: c_ushort,
    pub cfwParam1: c_ulong,
    pub cfwParam2: c_ulong,
    pub outLength: c_ushort,
    pub outPtr: *mut u8,
    pub inLength: c_ushort,
    pub inPtr: *mut u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct CFWResults {
    pub cfwModel: c_ushort,
    pub cfwPosition: c_ushort,
    pub cfwStatus: c_ushort,
    pub cfwError: c_ushort,
    pub cfwResult1: c_ulong,
    pub cfwResult2: c_ulong,
}

const SBIG_SDK_PANIC_MSG: &str = "SBIGUnivDrvCommand called but sbig-sdk feature is not enabled. \
    Enable the sbig-sdk feature (or sbig_hardware in sbig_camera) to use the real driver.";

#[no_mangle]
pub unsafe extern "C" fn SBIGUnivDrvCommand(
    _command: c_short,
    _params: *mut c_void,
    _results: *mut c_void,
) -> c_short {
    panic!("{}", SBIG_SDK_PANIC_MSG);
}
"#;

    std::fs::write(out_path.join("bindings.rs"), dummy).expect("Couldn't write dummy bindings!");
}
