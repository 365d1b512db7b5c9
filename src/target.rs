//! Target process access boundary
//!
//! [`TargetProcess`] is the seam between the core and the OS: raw memory
//! read/write, page-protection changes, allocation, and module snapshots.
//! The `win32` module implements it over the live Win32 API; unit tests
//! implement it over a plain byte buffer.

use crate::error::{GraftError, Result};

// Win32 page protection values, used as the protection vocabulary everywhere
pub const PAGE_NOACCESS: u32 = 0x01;
pub const PAGE_READONLY: u32 = 0x02;
pub const PAGE_READWRITE: u32 = 0x04;
pub const PAGE_EXECUTE: u32 = 0x10;
pub const PAGE_EXECUTE_READ: u32 = 0x20;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;

/// one loaded module as reported by a snapshot
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub name: String,
    pub base: usize,
    pub size: usize,
}

/// access to an external process's address space
///
/// read and write are exact: they either transfer the full requested length
/// or fail. protect returns the protection value that was in effect before
/// the change so it can be restored later.
pub trait TargetProcess {
    /// process identifier of the target
    fn pid(&self) -> u32;

    /// read exactly `buf.len()` bytes at `address`
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<()>;

    /// write all of `bytes` at `address`
    fn write(&self, address: usize, bytes: &[u8]) -> Result<()>;

    /// change protection of `[address, address + size)`, returning the prior value
    fn protect(&self, address: usize, size: usize, protection: u32) -> Result<u32>;

    /// allocate a committed region of at least `size` bytes, returning its base
    fn allocate(&self, size: usize, protection: u32) -> Result<usize>;

    /// release a region previously returned by `allocate`
    fn free(&self, address: usize) -> Result<()>;

    /// snapshot the target's currently loaded modules
    fn modules(&self) -> Result<Vec<ModuleEntry>>;

    /// read a single typed value at `address`
    fn read_value<V: Copy>(&self, address: usize) -> Result<V>
    where
        Self: Sized,
    {
        let mut buf = vec![0u8; core::mem::size_of::<V>()];
        self.read(address, &mut buf)?;
        // SAFETY: buf holds exactly size_of::<V>() bytes that were just read
        Ok(unsafe { (buf.as_ptr() as *const V).read_unaligned() })
    }

    /// write a single typed value at `address`
    fn write_value<V: Copy>(&self, address: usize, value: &V) -> Result<()>
    where
        Self: Sized,
    {
        // SAFETY: value is a live Copy object of exactly size_of::<V>() bytes
        let bytes = unsafe {
            core::slice::from_raw_parts(
                value as *const V as *const u8,
                core::mem::size_of::<V>(),
            )
        };
        self.write(address, bytes)
    }
}

impl<T: TargetProcess> TargetProcess for &T {
    fn pid(&self) -> u32 {
        (**self).pid()
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<()> {
        (**self).read(address, buf)
    }

    fn write(&self, address: usize, bytes: &[u8]) -> Result<()> {
        (**self).write(address, bytes)
    }

    fn protect(&self, address: usize, size: usize, protection: u32) -> Result<u32> {
        (**self).protect(address, size, protection)
    }

    fn allocate(&self, size: usize, protection: u32) -> Result<usize> {
        (**self).allocate(size, protection)
    }

    fn free(&self, address: usize) -> Result<()> {
        (**self).free(address)
    }

    fn modules(&self) -> Result<Vec<ModuleEntry>> {
        (**self).modules()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! in-memory stand-in for a target process
    //!
    //! one flat byte buffer mapped at BASE, a bump allocator for scratch
    //! pages above ALLOC_START, and per-address protection bookkeeping.
    //! individual failure switches let tests drive each error path.

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    pub(crate) const BASE: usize = 0x0040_0000;
    pub(crate) const SPACE: usize = 0x4_0000;
    const ALLOC_START: usize = BASE + 0x2_0000;
    const PAGE: usize = 0x1000;

    pub(crate) struct FakeProcess {
        memory: RefCell<Vec<u8>>,
        next_alloc: Cell<usize>,
        modules: RefCell<Vec<ModuleEntry>>,
        unreadable: RefCell<Vec<(usize, usize)>>,
        protections: RefCell<HashMap<usize, u32>>,
        /// every protect() call as (address, size, requested protection)
        pub(crate) protect_calls: RefCell<Vec<(usize, usize, u32)>>,
        pub(crate) allocations: RefCell<Vec<(usize, usize)>>,
        pub(crate) freed: RefCell<Vec<usize>>,
        pub(crate) fail_snapshot: Cell<bool>,
        pub(crate) fail_protect: Cell<bool>,
        pub(crate) fail_writes: Cell<bool>,
        pub(crate) fail_alloc: Cell<bool>,
        pub(crate) fail_free: Cell<bool>,
    }

    impl FakeProcess {
        pub(crate) fn new() -> Self {
            Self {
                memory: RefCell::new(vec![0u8; SPACE]),
                next_alloc: Cell::new(ALLOC_START),
                modules: RefCell::new(Vec::new()),
                unreadable: RefCell::new(Vec::new()),
                protections: RefCell::new(HashMap::new()),
                protect_calls: RefCell::new(Vec::new()),
                allocations: RefCell::new(Vec::new()),
                freed: RefCell::new(Vec::new()),
                fail_snapshot: Cell::new(false),
                fail_protect: Cell::new(false),
                fail_writes: Cell::new(false),
                fail_alloc: Cell::new(false),
                fail_free: Cell::new(false),
            }
        }

        pub(crate) fn add_module(&self, name: &str, base: usize, size: usize) {
            self.modules.borrow_mut().push(ModuleEntry {
                name: name.to_string(),
                base,
                size,
            });
        }

        /// make reads overlapping `[base, base + size)` fail
        pub(crate) fn mark_unreadable(&self, base: usize, size: usize) {
            self.unreadable.borrow_mut().push((base, size));
        }

        /// seed target memory directly, bypassing the trait
        pub(crate) fn poke(&self, address: usize, bytes: &[u8]) {
            let offset = address - BASE;
            self.memory.borrow_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        }

        /// inspect target memory directly, bypassing the trait
        pub(crate) fn peek(&self, address: usize, len: usize) -> Vec<u8> {
            let offset = address - BASE;
            self.memory.borrow()[offset..offset + len].to_vec()
        }

        pub(crate) fn protection_at(&self, address: usize) -> u32 {
            self.protections
                .borrow()
                .get(&address)
                .copied()
                .unwrap_or(PAGE_EXECUTE_READ)
        }

        fn offset(&self, address: usize, len: usize) -> Option<usize> {
            if address >= BASE && address + len <= BASE + SPACE {
                Some(address - BASE)
            } else {
                None
            }
        }
    }

    impl TargetProcess for FakeProcess {
        fn pid(&self) -> u32 {
            4242
        }

        fn read(&self, address: usize, buf: &mut [u8]) -> Result<()> {
            let blocked = self
                .unreadable
                .borrow()
                .iter()
                .any(|&(b, s)| address < b + s && b < address + buf.len());
            let offset = self.offset(address, buf.len());
            match (blocked, offset) {
                (false, Some(offset)) => {
                    buf.copy_from_slice(&self.memory.borrow()[offset..offset + buf.len()]);
                    Ok(())
                }
                _ => Err(GraftError::ReadFailed {
                    address: address as u64,
                    size: buf.len(),
                }),
            }
        }

        fn write(&self, address: usize, bytes: &[u8]) -> Result<()> {
            let offset = self.offset(address, bytes.len());
            match (self.fail_writes.get(), offset) {
                (false, Some(offset)) => {
                    self.memory.borrow_mut()[offset..offset + bytes.len()]
                        .copy_from_slice(bytes);
                    Ok(())
                }
                _ => Err(GraftError::WriteFailed {
                    address: address as u64,
                    size: bytes.len(),
                }),
            }
        }

        fn protect(&self, address: usize, size: usize, protection: u32) -> Result<u32> {
            if self.fail_protect.get() {
                return Err(GraftError::ProtectionChangeFailed {
                    address: address as u64,
                    size,
                });
            }
            self.protect_calls
                .borrow_mut()
                .push((address, size, protection));
            let old = self
                .protections
                .borrow_mut()
                .insert(address, protection)
                .unwrap_or(PAGE_EXECUTE_READ);
            Ok(old)
        }

        fn allocate(&self, size: usize, protection: u32) -> Result<usize> {
            if self.fail_alloc.get() {
                return Err(GraftError::AllocationFailed { size, protection });
            }
            let rounded = (size + PAGE - 1) & !(PAGE - 1);
            let base = self.next_alloc.get();
            if base + rounded > BASE + SPACE {
                return Err(GraftError::AllocationFailed { size, protection });
            }
            self.next_alloc.set(base + rounded);
            self.allocations.borrow_mut().push((base, rounded));
            self.protections.borrow_mut().insert(base, protection);
            Ok(base)
        }

        fn free(&self, address: usize) -> Result<()> {
            if self.fail_free.get() {
                return Err(GraftError::FreeFailed {
                    address: address as u64,
                });
            }
            self.freed.borrow_mut().push(address);
            Ok(())
        }

        fn modules(&self) -> Result<Vec<ModuleEntry>> {
            if self.fail_snapshot.get() {
                return Err(GraftError::SnapshotFailed {
                    context: "module",
                    code: 0,
                });
            }
            Ok(self.modules.borrow().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{FakeProcess, BASE};
    use super::*;

    #[test]
    fn test_read_value_round_trip() {
        let target = FakeProcess::new();
        target.write_value(BASE + 0x10, &0xDEAD_BEEFu32).unwrap();
        let value: u32 = target.read_value(BASE + 0x10).unwrap();
        assert_eq!(value, 0xDEAD_BEEF);
        // little-endian layout in target memory
        assert_eq!(target.peek(BASE + 0x10, 4), vec![0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_read_out_of_range_fails() {
        let target = FakeProcess::new();
        let mut buf = [0u8; 4];
        assert!(target.read(0x10, &mut buf).is_err());
    }
}
