//! Threshold key custody for exam papers
//!
//! Questions are encrypted under a per-author content key whose shares are
//! held by three guardians. Shortly before an exam starts, any two guardians'
//! submitted shares are enough to rebuild the key and decode that author's
//! questions; items short of quorum stay sealed.

pub mod authoring;
pub mod cipher;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod notify;
pub mod registry;
pub mod store;
pub mod timegate;
pub mod vault;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod commands;

pub use error::{Error, Result};
