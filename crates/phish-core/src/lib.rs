//! phish-core — shared library for URL phishing detection.
//!
//! Provides lexical feature extraction, dataset preparation, random forest
//! training, model persistence and URL scoring used by the CLI frontend.

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod label;
pub mod model;
pub mod report;
pub mod score;
pub mod train;

pub use error::{PhishError, Result};
pub use features::{FeatureSet, UrlInput};
pub use label::Label;
pub use model::PhishingModel;
