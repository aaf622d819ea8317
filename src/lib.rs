//! Grump: a context-aware emotional animation engine for a grumpy chat mascot.
//!
//! [`engine::GrumpEngine`] is the entry point. Everything else is a component
//! it owns, usable on its own for analysis or testing.

pub mod blink;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod easter_eggs;
pub mod emotion;
pub mod engine;
pub mod eye_roll;
pub mod machine;
pub mod micro;
pub mod noise;
pub mod particles;
pub mod progression;
pub mod snapshot;
pub mod status;

pub use engine::{EngineSettings, GrumpEngine, MessageOutcome, TimerEvent};
