//! Streamcopy - lossless stream extraction and segmenting tool
//!
//! This library crate exposes the configuration layer for integration testing.
//! The remux engine lives in `streamcopy-av`.

pub mod config;
