// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for posture inference.
//!
//! This module contains the command-line interface logic, including argument parsing,
//! console output and the `predict` command implementation.

/// CLI arguments.
pub mod args;

/// Console output macros.
pub mod logging;

/// Prediction logic.
pub mod predict;
