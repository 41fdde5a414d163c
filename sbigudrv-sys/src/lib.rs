//! Low-level FFI bindings for the SBIG universal camera driver.
//!
//! The vendor library exposes a single entry point,
//! `SBIGUnivDrvCommand(command, params, results)`, which multiplexes every
//! camera, cooler and filter-wheel operation through a numeric command code
//! and a pair of command-specific parameter/result structures.
//!
//! # Safety
//!
//! Everything here is a direct FFI binding. The `sbig_camera` crate wraps it
//! behind a safe `UniversalDriver` implementation.
//!
//! # Features
//!
//! - `sbig-sdk`: Generate bindings from the installed `sbigudrv.h` and link
//!   the driver. Without this feature, placeholder bindings are used and the
//!   entry point panics when called.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(missing_docs)]
#![allow(unsafe_code)]
#![allow(clippy::all)]

// Include the generated bindings
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
