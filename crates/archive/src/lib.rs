#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Archive validation, extraction and creation
//!
//! Update packages and backup archives are plain zip files, but they arrive
//! from a folder anyone on the mesh may drop files into. Extraction
//! therefore runs in two passes: a read-only validation pass that rejects
//! decompression bombs outright, and an extraction pass that confines every
//! entry to the target directory. The same crate writes backup archives,
//! staging them under a `.partial` name so an interrupted run leaves no
//! half-written file behind.

mod create;
mod extract;
mod outcome;

pub use create::create_archive;
pub use extract::SafeExtractor;
pub use outcome::{EntryFailure, ExtractOutcome, SuspicionReason};
