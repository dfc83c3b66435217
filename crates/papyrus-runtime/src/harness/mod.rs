//! In-memory VM and script cache for driving the debugger without a game.

#![allow(missing_docs)]

mod scripts;
mod vm;

pub use scripts::MemoryScriptCache;
pub use vm::{frame, TestThread, TestVm};
