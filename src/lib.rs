//! Aegis disaster-risk classification.
//!
//! A training job fits a preprocessing transform and a gradient boosted
//! classifier into one checksummed artifact; the HTTP service loads that
//! artifact once and assesses locations against it, falling back to a fixed
//! `Medium` category when no usable artifact exists.

pub mod api;
pub mod config;
pub mod error;
pub mod gis;
pub mod metrics;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
