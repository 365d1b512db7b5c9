//! Unified error types for graft

use core::fmt;

/// all errors that can occur in graft
#[derive(Debug)]
pub enum GraftError {
    // === target resolution ===
    /// no running process matched the given executable name
    ProcessNotFound { name: String },

    /// no top-level window matched the given title
    WindowNotFound { title: String },

    /// the process has no top-level window to resolve
    MainWindowNotFound { pid: u32 },

    /// opening the process handle was denied or failed
    ProcessOpenFailed { pid: u32, code: u32 },

    // === enumeration ===
    /// a process or module snapshot could not be taken
    SnapshotFailed { context: &'static str, code: u32 },

    // === memory I/O ===
    /// a read did not complete for the requested length
    ReadFailed { address: u64, size: usize },

    /// a write did not complete for the requested length
    WriteFailed { address: u64, size: usize },

    /// a page-protection change did not succeed
    ProtectionChangeFailed { address: u64, size: usize },

    /// allocation in the target failed
    AllocationFailed { size: usize, protection: u32 },

    /// freeing a region in the target failed
    FreeFailed { address: u64 },

    // === consistency ===
    /// a precondition was violated (empty input, zero address or size, oversize patch)
    InvalidArgument { context: &'static str },

    /// recorded hook data does not match what would be written back
    SizeMismatch { expected: usize, actual: usize },

    /// a hook is already installed at this address
    AlreadyHooked { address: u64 },

    // === lookup ===
    /// module name is not tracked by the image registry
    ImageNotFound { name: String },

    /// no active hook is registered at this address
    HookNotFound { address: u64 },

    // === win32 ===
    /// underlying Win32 API returned an error
    Win32Error { code: u32, context: &'static str },
}

impl fmt::Display for GraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessNotFound { name } => {
                write!(f, "process not found: {name}")
            }
            Self::WindowNotFound { title } => {
                write!(f, "window not found: {title}")
            }
            Self::MainWindowNotFound { pid } => {
                write!(f, "no top-level window owned by pid {pid}")
            }
            Self::ProcessOpenFailed { pid, code } => {
                write!(f, "failed to open pid {pid} (error {code:#x})")
            }
            Self::SnapshotFailed { context, code } => {
                write!(f, "{context} snapshot failed (error {code:#x})")
            }
            Self::ReadFailed { address, size } => {
                write!(f, "failed to read {size} bytes at {address:#x}")
            }
            Self::WriteFailed { address, size } => {
                write!(f, "failed to write {size} bytes at {address:#x}")
            }
            Self::ProtectionChangeFailed { address, size } => {
                write!(
                    f,
                    "failed to change protection for {size} bytes at {address:#x}"
                )
            }
            Self::AllocationFailed { size, protection } => {
                write!(
                    f,
                    "failed to allocate {size} bytes with protection {protection:#x}"
                )
            }
            Self::FreeFailed { address } => {
                write!(f, "failed to free allocation at {address:#x}")
            }
            Self::InvalidArgument { context } => {
                write!(f, "invalid argument in {context}")
            }
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::AlreadyHooked { address } => {
                write!(f, "a hook is already installed at {address:#x}")
            }
            Self::ImageNotFound { name } => {
                write!(f, "image not tracked: {name}")
            }
            Self::HookNotFound { address } => {
                write!(f, "no active hook at {address:#x}")
            }
            Self::Win32Error { code, context } => {
                write!(f, "Win32 error {code:#x} in {context}")
            }
        }
    }
}

impl std::error::Error for GraftError {}

/// result type alias using GraftError
pub type Result<T> = std::result::Result<T, GraftError>;
