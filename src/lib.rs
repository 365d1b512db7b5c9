#![deny(unsafe_op_in_unsafe_fn)]

//! graft: memory patching and inline hook management for external processes
//!
//! This library instruments a running process without its cooperation:
//!
//! - open a target by process id, executable name, or window title
//! - snapshot every loaded module's bytes into an image registry
//! - read, write, patch, and NOP memory behind temporary protection changes
//! - install inline hooks that detour execution through an injected
//!   shellcode trampoline, and reverse them byte for byte
//!
//! The core is platform independent and works through the [`TargetProcess`]
//! trait; the `win32` module provides the Windows backend. All operations are
//! synchronous and report failure as ordinary [`Result`] values.
//!
//! The target's own threads keep running while a patch or hook is applied.
//! A thread executing through a hooked site mid-install can observe a torn
//! instruction sequence; nothing here suspends the target. That window is
//! inherent to the technique.

pub mod arch;
pub mod error;
pub mod hook;
pub mod image;
pub mod session;
pub mod target;

mod patch;

#[cfg(windows)]
pub mod win32;

// re-exports for convenience
pub use error::{GraftError, Result};
pub use hook::Hook;
pub use image::{Image, ImageRegistry};
pub use session::Session;
pub use target::{ModuleEntry, TargetProcess};

#[cfg(windows)]
pub use win32::WinProcess;

/// library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
