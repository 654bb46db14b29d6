#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::unused_async)]

//! Installer launching
//!
//! Applies accepted update archives to the node. On hosts where the node
//! process can survive the swap, the archives are extracted in place; where
//! the running binary itself is replaced, a standalone helper is spawned to
//! perform the swap after this process exits. A single launcher invocation
//! may be in flight per node; concurrent calls observe `LaunchOutcome::Busy`
//! and do nothing.

mod helper;
mod launcher;
mod outcome;
mod shutdown;

pub use helper::{materialize_helper, spawn_detached};
pub use launcher::UpdateLauncher;
pub use outcome::{LaunchOutcome, RefusalReason};
pub use shutdown::ShutdownHook;
