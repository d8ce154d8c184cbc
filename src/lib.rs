//! Runtime bindings for the [Kiwi](https://github.com/bab2min/Kiwi) Korean
//! morphological analyzer with a C-ABI JSON surface.
//!
//! The Kiwi shared library is loaded at runtime with `dlopen` (or
//! `LoadLibraryA` on Windows); nothing links against it at build time. On
//! top of the loaded symbols the crate offers two surfaces:
//!
//! - a Rust API ([`KiwiLibrary`], [`Analyzer`]) returning typed results,
//! - a C ABI (`kiwi_bridge_*` in [`ffi`]) returning JSON payloads for
//!   embedding in non-Rust hosts.
//!
//! # Quick start
//!
//! ```no_run
//! use kiwi_bridge::{AnalyzeOptions, AnalyzerConfig, KiwiLibrary};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = KiwiLibrary::load_from_env_or_default()?;
//!     let analyzer = library.analyzer(&AnalyzerConfig::default().with_model_path("./models"))?;
//!     let candidates = analyzer.analyze("안녕하세요", &AnalyzeOptions::default())?;
//!     for token in &candidates[0].tokens {
//!         println!("{}/{}", token.form, token.tag);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Environment variables
//!
//! - `KIWI_BRIDGE_LIBRARY_PATH` (legacy alias `KIWI_LIBRARY_PATH`): path of
//!   the Kiwi shared library to load.
//! - `KIWI_BRIDGE_MODEL_PATH` (legacy alias `KIWI_MODEL_PATH`): model
//!   directory used when no explicit path is configured.

#![deny(missing_docs)]

mod buffer;
mod config;
mod constants;
mod discovery;
mod error;
pub mod ffi;
mod native;
mod runtime;
mod serializer;
mod types;

pub use buffer::JsonBuffer;
pub use constants::*;
pub use error::{BridgeError, Result};
pub use runtime::{Analyzer, KiwiLibrary};
pub use types::{AnalysisCandidate, AnalyzeOptions, AnalyzerConfig, Token};

#[cfg(test)]
mod test_support;
