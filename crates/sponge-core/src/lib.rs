//! # Sponge Core
//!
//! Core types for the Sponge overflow buffer: the error type, record
//! framing and the [`Persistence`] contract shared by every backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
/// Self-delimiting record frames
pub mod frame;
pub mod persistence;

pub use error::{Error, Result};
pub use persistence::Persistence;
