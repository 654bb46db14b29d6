#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Update decision engine
//!
//! Takes the path list produced by the scanner, parses each filename into a
//! candidate and decides per candidate whether it is an update for the own
//! service, an update for an installed plugin, or a brand-new plugin. Every
//! evaluated candidate is paired with a typed outcome so callers and tests
//! can see why something was accepted or rejected.

mod engine;
mod registry;

pub use engine::{CandidateDecision, DecisionEngine};
pub use registry::PluginRegistry;
