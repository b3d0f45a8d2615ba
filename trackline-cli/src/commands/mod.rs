//! CLI command implementations.
//!
//! - [`dump`] - print the records of a track file
//! - [`replay`] - drive a tracker with a scripted fix sequence

pub mod dump;
pub mod replay;
