//! Win32 backend
//!
//! Resolves a target by pid, executable name, or window title, and
//! implements [`TargetProcess`] over the live process: Toolhelp snapshots
//! for enumeration, `ReadProcessMemory`/`WriteProcessMemory` for I/O, and
//! the `VirtualEx` family for protection and allocation. Resolution is
//! first-match-wins everywhere: the first process entry whose executable
//! name matches exactly, the first top-level window owned by the pid. That
//! policy is deliberate; callers needing disambiguation must resolve the
//! pid themselves.

use core::ffi::c_void;

use log::debug;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, BOOL, FALSE, HANDLE, HWND, INVALID_HANDLE_VALUE, LPARAM, TRUE,
};
use windows_sys::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, Process32FirstW, Process32NextW,
    MODULEENTRY32W, PROCESSENTRY32W, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Memory::{
    VirtualAllocEx, VirtualFreeEx, VirtualProtectEx, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
};
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetWindowThreadProcessId,
};

use crate::error::{GraftError, Result};
use crate::target::{ModuleEntry, TargetProcess};

/// an opened external process: pid, full-access handle, main window
///
/// the handle is closed on drop. all three fields are resolved together or
/// not at all; a constructor that fails leaves nothing behind.
pub struct WinProcess {
    handle: HANDLE,
    pid: u32,
    hwnd: HWND,
}

impl WinProcess {
    /// open a process by pid and resolve its main window
    pub fn open_by_pid(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess has no pointer arguments
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, FALSE, pid) };
        if handle.is_null() {
            return Err(GraftError::ProcessOpenFailed {
                pid,
                code: last_error(),
            });
        }

        let hwnd = match find_main_window(pid) {
            Some(hwnd) => hwnd,
            None => {
                // SAFETY: handle was just opened by us
                unsafe { CloseHandle(handle) };
                return Err(GraftError::MainWindowNotFound { pid });
            }
        };

        debug!("opened pid {pid}");
        Ok(Self { handle, pid, hwnd })
    }

    /// open the first running process whose executable name matches exactly
    pub fn open_by_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(GraftError::InvalidArgument {
                context: "open_by_name",
            });
        }

        // SAFETY: snapshot of all processes, no pointers passed in
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(GraftError::SnapshotFailed {
                context: "process",
                code: last_error(),
            });
        }

        let mut pid = None;
        // SAFETY: PROCESSENTRY32W is plain data; dwSize is set before use
        let mut entry: PROCESSENTRY32W = unsafe { core::mem::zeroed() };
        entry.dwSize = core::mem::size_of::<PROCESSENTRY32W>() as u32;

        // SAFETY: snapshot is valid, entry.dwSize is initialized
        let mut more = unsafe { Process32FirstW(snapshot, &mut entry) } != 0;
        while more {
            if from_wide(&entry.szExeFile) == name {
                pid = Some(entry.th32ProcessID);
                break;
            }
            // SAFETY: same as Process32FirstW
            more = unsafe { Process32NextW(snapshot, &mut entry) } != 0;
        }

        // SAFETY: snapshot was opened above
        unsafe { CloseHandle(snapshot) };

        match pid {
            Some(pid) => Self::open_by_pid(pid),
            None => Err(GraftError::ProcessNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// open the process owning the window with the given title
    pub fn open_by_window_title(title: &str) -> Result<Self> {
        if title.is_empty() {
            return Err(GraftError::InvalidArgument {
                context: "open_by_window_title",
            });
        }

        let wide_title = to_wide(title);
        // SAFETY: wide_title is a valid nul-terminated wide string
        let hwnd = unsafe { FindWindowW(core::ptr::null(), wide_title.as_ptr()) };
        if hwnd.is_null() {
            return Err(GraftError::WindowNotFound {
                title: title.to_string(),
            });
        }

        let mut pid = 0u32;
        // SAFETY: hwnd was just found; pid is a valid out pointer
        if unsafe { GetWindowThreadProcessId(hwnd, &mut pid) } == 0 || pid == 0 {
            return Err(GraftError::WindowNotFound {
                title: title.to_string(),
            });
        }

        // SAFETY: no pointer arguments
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, FALSE, pid) };
        if handle.is_null() {
            return Err(GraftError::ProcessOpenFailed {
                pid,
                code: last_error(),
            });
        }

        debug!("opened pid {pid} via window title");
        Ok(Self { handle, pid, hwnd })
    }

    /// the raw process handle
    pub fn handle(&self) -> HANDLE {
        self.handle
    }

    /// the resolved main window
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl TargetProcess for WinProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<()> {
        // SAFETY: buf is a live mutable slice; a null bytes-read pointer makes
        // RPM fail unless the full length was transferred
        let ok = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                core::ptr::null_mut(),
            )
        };

        if ok == 0 {
            Err(GraftError::ReadFailed {
                address: address as u64,
                size: buf.len(),
            })
        } else {
            Ok(())
        }
    }

    fn write(&self, address: usize, bytes: &[u8]) -> Result<()> {
        // SAFETY: bytes is a live slice for the full length
        let ok = unsafe {
            WriteProcessMemory(
                self.handle,
                address as *const c_void,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                core::ptr::null_mut(),
            )
        };

        if ok == 0 {
            Err(GraftError::WriteFailed {
                address: address as u64,
                size: bytes.len(),
            })
        } else {
            Ok(())
        }
    }

    fn protect(&self, address: usize, size: usize, protection: u32) -> Result<u32> {
        let mut old = 0u32;
        // SAFETY: old is a valid out pointer
        let ok = unsafe {
            VirtualProtectEx(
                self.handle,
                address as *const c_void,
                size,
                protection,
                &mut old,
            )
        };

        if ok == 0 {
            Err(GraftError::ProtectionChangeFailed {
                address: address as u64,
                size,
            })
        } else {
            Ok(old)
        }
    }

    fn allocate(&self, size: usize, protection: u32) -> Result<usize> {
        // SAFETY: null base lets the OS choose the address
        let base = unsafe {
            VirtualAllocEx(
                self.handle,
                core::ptr::null(),
                size,
                MEM_COMMIT | MEM_RESERVE,
                protection,
            )
        };

        if base.is_null() {
            Err(GraftError::AllocationFailed { size, protection })
        } else {
            Ok(base as usize)
        }
    }

    fn free(&self, address: usize) -> Result<()> {
        // SAFETY: address came from VirtualAllocEx; size 0 with MEM_RELEASE
        // releases the whole allocation
        let ok = unsafe { VirtualFreeEx(self.handle, address as *mut c_void, 0, MEM_RELEASE) };

        if ok == 0 {
            Err(GraftError::FreeFailed {
                address: address as u64,
            })
        } else {
            Ok(())
        }
    }

    fn modules(&self) -> Result<Vec<ModuleEntry>> {
        // SAFETY: snapshot call has no pointer arguments
        let snapshot = unsafe {
            CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid)
        };
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(GraftError::SnapshotFailed {
                context: "module",
                code: last_error(),
            });
        }

        let mut entries = Vec::new();
        // SAFETY: MODULEENTRY32W is plain data; dwSize is set before use
        let mut entry: MODULEENTRY32W = unsafe { core::mem::zeroed() };
        entry.dwSize = core::mem::size_of::<MODULEENTRY32W>() as u32;

        // SAFETY: snapshot is valid, entry.dwSize is initialized
        let mut more = unsafe { Module32FirstW(snapshot, &mut entry) } != 0;
        while more {
            entries.push(ModuleEntry {
                name: from_wide(&entry.szModule),
                base: entry.modBaseAddr as usize,
                size: entry.modBaseSize as usize,
            });
            // SAFETY: same as Module32FirstW
            more = unsafe { Module32NextW(snapshot, &mut entry) } != 0;
        }

        // SAFETY: snapshot was opened above
        unsafe { CloseHandle(snapshot) };

        Ok(entries)
    }
}

impl Drop for WinProcess {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: we own the handle
            unsafe { CloseHandle(self.handle) };
        }
    }
}

// SAFETY: the handle refers to another process and has no thread affinity
unsafe impl Send for WinProcess {}
unsafe impl Sync for WinProcess {}

struct WindowSearch {
    pid: u32,
    hwnd: HWND,
}

/// first top-level window owned by `pid`, in enumeration order
fn find_main_window(pid: u32) -> Option<HWND> {
    let mut search = WindowSearch {
        pid,
        hwnd: core::ptr::null_mut(),
    };

    // SAFETY: the callback only runs during this call; lparam outlives it
    unsafe {
        EnumWindows(Some(enum_windows_cb), &mut search as *mut WindowSearch as LPARAM);
    }

    if search.hwnd.is_null() {
        None
    } else {
        Some(search.hwnd)
    }
}

unsafe extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let mut pid = 0u32;
    // SAFETY: hwnd is provided by EnumWindows; pid is a valid out pointer
    unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };

    // SAFETY: lparam is the WindowSearch passed to EnumWindows above
    let search = unsafe { &mut *(lparam as *mut WindowSearch) };

    if pid == search.pid {
        search.hwnd = hwnd;
        return FALSE; // stop enumeration
    }

    TRUE
}

fn last_error() -> u32 {
    // SAFETY: GetLastError is always safe to call
    unsafe { GetLastError() }
}

/// nul-terminated UTF-16 for Win32 string arguments
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(core::iter::once(0)).collect()
}

/// UTF-16 buffer to String, stopping at the first nul
fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}
