//! backends: concrete matrices and vectors the block engine delegates to
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// object-safe traits every concrete operator and vector implements
pub mod backend_traits;
/// explicit operators produced by collapse, diagonal extractors
pub mod explicit_ops;
pub mod faer_backend;
pub mod nalgebra_backend;
pub mod sprs_backend;
