//! Inline hook lifecycle
//!
//! Installing a hook allocates an RWX scratch page in the target, writes the
//! caller's shellcode there followed by a `jmp rel32` back to the first byte
//! past the patched region, then overwrites the hooked site with a
//! `jmp rel32` into the scratch page. Everything needed to reverse the
//! mutation (the original bytes and the scratch address) is recorded on
//! the session before install reports success.
//!
//! Install and remove are not transactional: a failure mid-install leaves
//! whatever was already mutated in place (including the scratch page), and
//! a failure mid-remove keeps the hook recorded even though the site may be
//! partially restored. Callers must treat a failed remove as state unknown.

use log::debug;

use crate::arch::{self, JMP_REL32_SIZE, NOP};
use crate::error::{GraftError, Result};
use crate::session::Session;
use crate::target::{TargetProcess, PAGE_EXECUTE_READWRITE};

/// minimum scratch page allocation
const SCRATCH_MIN: usize = 4096;

/// one installed hook and everything needed to reverse it
#[derive(Debug, Clone)]
pub struct Hook {
    pub(crate) address: usize,
    pub(crate) scratch: usize,
    pub(crate) size: usize,
    pub(crate) shellcode: Vec<u8>,
    pub(crate) original: Vec<u8>,
}

impl Hook {
    /// address of the hooked site
    pub fn address(&self) -> usize {
        self.address
    }

    /// base of the scratch page hosting the trampoline
    pub fn scratch(&self) -> usize {
        self.scratch
    }

    /// patched region size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// the injected shellcode
    pub fn shellcode(&self) -> &[u8] {
        &self.shellcode
    }

    /// the bytes the patch overwrote
    pub fn original_bytes(&self) -> &[u8] {
        &self.original
    }
}

impl<T: TargetProcess> Session<T> {
    /// install an inline hook at `address`, patching `size` bytes
    ///
    /// the patched region must be at least one `jmp rel32` (5 bytes) of
    /// whole instructions; this is the caller's byte-level responsibility:
    /// no disassembly is performed and no minimum is enforced. a region
    /// larger than the jump is NOP-filled so no partial instruction
    /// survives past it.
    pub fn create_hook(&mut self, address: usize, size: usize, shellcode: &[u8]) -> Result<()> {
        if address == 0 || size == 0 || shellcode.is_empty() {
            return Err(GraftError::InvalidArgument {
                context: "create_hook",
            });
        }
        if self.hook_at(address).is_some() {
            return Err(GraftError::AlreadyHooked {
                address: address as u64,
            });
        }

        let scratch = self
            .target
            .allocate(shellcode.len().max(SCRATCH_MIN), PAGE_EXECUTE_READWRITE)?;

        self.target.write(scratch, shellcode)?;

        // trampoline tail: jump back to the first byte past the patched region
        let jump_back = arch::jmp_rel32(scratch + shellcode.len(), address + size);
        self.target.write(scratch + shellcode.len(), &jump_back)?;

        // capture the original bytes before any mutation of the site
        let mut original = vec![0u8; size];
        self.target.read(address, &mut original)?;

        let old = self.target.protect(address, size, PAGE_EXECUTE_READWRITE)?;

        // clear leftover bytes beyond the 5-byte jump
        if size > JMP_REL32_SIZE {
            self.target.write(address, &vec![NOP; size])?;
        }

        self.target.write(address, &arch::jmp_rel32(address, scratch))?;

        self.target.protect(address, size, old)?;

        debug!(
            "hook installed at {address:#x} ({size} bytes, trampoline {scratch:#x})"
        );

        self.hooks.push(Hook {
            address,
            scratch,
            size,
            shellcode: shellcode.to_vec(),
            original,
        });

        Ok(())
    }

    /// remove the hook installed at `address`
    ///
    /// restores the saved original bytes, frees the scratch page, and only
    /// then drops the record. the saved bytes must still match the recorded
    /// patch size, or nothing is written back.
    pub fn destroy_hook(&mut self, address: usize) -> Result<()> {
        let index = self
            .hooks
            .iter()
            .position(|hook| hook.address == address)
            .ok_or(GraftError::HookNotFound {
                address: address as u64,
            })?;

        {
            let hook = &self.hooks[index];

            if hook.original.len() != hook.size {
                return Err(GraftError::SizeMismatch {
                    expected: hook.size,
                    actual: hook.original.len(),
                });
            }

            let old = self
                .target
                .protect(address, hook.size, PAGE_EXECUTE_READWRITE)?;

            self.target.write(address, &hook.original)?;

            self.target.protect(address, hook.size, old)?;

            self.target.free(hook.scratch)?;
        }

        self.hooks.remove(index);

        debug!("hook removed at {address:#x}");
        Ok(())
    }

    /// look up the active hook at `address`
    pub fn hook_at(&self, address: usize) -> Option<&Hook> {
        self.hooks.iter().find(|hook| hook.address == address)
    }

    /// remove every active hook, newest first
    ///
    /// stops at the first failure, leaving that hook and any earlier ones
    /// recorded.
    pub fn remove_all_hooks(&mut self) -> Result<()> {
        while let Some(hook) = self.hooks.last() {
            let address = hook.address;
            self.destroy_hook(address)?;
        }
        Ok(())
    }
}
