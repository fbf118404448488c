//! tabfit - model selection pipeline for tabular regression
//!
//! This crate splits a raw CSV dataset, grid-searches several regression
//! model families with k-fold cross-validation, keeps the best one as a
//! persisted preprocessing + estimator pipeline and scores it on held-out
//! data.
//!
//! # Modules
//!
//! - [`preprocessing`] - Column classification, scaling, one-hot encoding
//! - [`training`] - Estimators, model registry, grid search and selection
//! - [`stages`] - split, normalize, train and evaluate
//! - [`config`] / [`context`] - `params.toml` and the run context
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod config;
pub mod context;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Batch stages
pub mod stages;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{ErrorKind, Result, TabfitError};
