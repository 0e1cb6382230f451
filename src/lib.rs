//! Domovoy - Russian voice assistant for a smart home
//!
//! This library provides the core functionality of the assistant:
//! - Phrase lexicon and tiered fuzzy command resolution
//! - Parameter extraction (numbers, search queries, playlist names)
//! - Per-domain command dispatch (music, light, system)
//! - LED strip effects over a serial controller
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Utterance                        │
//! │        "геля, сделай ярче на двадцать"               │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Wake word  │  Resolver  │  Extractor  │ Dispatcher │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │    Music player   │  Light controller  │  Desktop    │
//! │                   │   Serial channel   │             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod lexicon;
pub mod light;
pub mod music;
pub mod resolver;
pub mod screen;
pub mod speech;
pub mod system;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use extract::Parameters;
pub use lexicon::{CommandKey, Domain, Lexicon};
pub use resolver::{Resolution, Resolver};
