//! Helpers shared by the ccdcal tools: logging setup and FITS file discovery.

pub mod file_utils;
pub mod log_setup;
