//! Protection-aware patch operations
//!
//! Every operation here follows the same dance: raise the region to RWX
//! while capturing the prior protection, write, then put the prior value
//! back. The restore is attempted on every exit path, but a successful
//! write is not rolled back when the restore fails: the operation reports
//! failure and the bytes stay. Between the write and the restore the region
//! is observably writable and executable; that window is part of the model.

use log::trace;

use crate::arch::NOP;
use crate::error::{GraftError, Result};
use crate::session::Session;
use crate::target::{TargetProcess, PAGE_EXECUTE_READWRITE};

impl<T: TargetProcess> Session<T> {
    /// write `bytes` into `[address, address + size)`, NOP-padding the rest
    ///
    /// the whole region is filled with `0x90` first, then the first
    /// `bytes.len()` bytes are overwritten with the supplied content.
    /// rejects empty `bytes`, a zero address or size, and `bytes.len() > size`
    /// before touching the target.
    pub fn patch_bytes(&self, bytes: &[u8], address: usize, size: usize) -> Result<()> {
        if bytes.is_empty() || address == 0 || size == 0 || bytes.len() > size {
            return Err(GraftError::InvalidArgument {
                context: "patch_bytes",
            });
        }

        let old = self.target.protect(address, size, PAGE_EXECUTE_READWRITE)?;

        let wrote = self
            .target
            .write(address, &vec![NOP; size])
            .and_then(|()| self.target.write(address, bytes));

        let restored = self.target.protect(address, size, old);

        wrote?;
        restored?;
        trace!("patched {} of {size} bytes at {address:#x}", bytes.len());
        Ok(())
    }

    /// write `bytes` verbatim at `address`, no NOP fill
    ///
    /// the patched region size is the slice length.
    pub fn patch_raw(&self, bytes: &[u8], address: usize) -> Result<()> {
        if bytes.is_empty() || address == 0 {
            return Err(GraftError::InvalidArgument {
                context: "patch_raw",
            });
        }

        let old = self
            .target
            .protect(address, bytes.len(), PAGE_EXECUTE_READWRITE)?;
        let wrote = self.target.write(address, bytes);
        let restored = self.target.protect(address, bytes.len(), old);

        wrote?;
        restored?;
        Ok(())
    }

    /// fill `[address, address + size)` with the single-byte NOP opcode
    pub fn nop_bytes(&self, address: usize, size: usize) -> Result<()> {
        if address == 0 || size == 0 {
            return Err(GraftError::InvalidArgument { context: "nop_bytes" });
        }

        let old = self.target.protect(address, size, PAGE_EXECUTE_READWRITE)?;
        let wrote = self.target.write(address, &vec![NOP; size]);
        let restored = self.target.protect(address, size, old);

        wrote?;
        restored?;
        Ok(())
    }
}
