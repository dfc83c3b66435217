//! `papyrus-runtime` - VM-side debugging core for the Papyrus script engine.
//!
//! The VM itself and the compiled-script cache are host collaborators and
//! are consumed through the traits in [`vm`] and [`script`]. This crate owns
//! the pieces that run on VM threads: the breakpoint registry with its
//! per-instruction hit test, and the execution control state machine that
//! parks and releases VM threads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Breakpoints, execution control and stop notifications.
pub mod debug;
/// Shared debugger error type.
pub mod error;
/// Target game flavour.
pub mod game;
/// In-memory VM and script cache for tests and offline hosts.
pub mod harness;
/// Compiled script cache collaborator.
pub mod script;
/// Virtual machine collaborator interfaces.
pub mod vm;

pub use error::DebugError;
pub use game::Game;
