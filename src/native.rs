//! One-time resolution of the optional OS suspend primitives.
//!
//! `NtSuspendProcess`/`NtResumeProcess` (whole-process, atomic) and
//! `OpenThread` (per-thread fallback) are looked up dynamically so the
//! controller can pick a strategy once at startup and degrade when the
//! whole-process pair is absent. A system without `OpenThread` cannot be
//! supported at all.

use once_cell::sync::Lazy;
use windows::core::{s, w};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

/// `NtSuspendProcess` / `NtResumeProcess` signature; nonzero NTSTATUS means
/// the call failed and the caller should fall back to the thread walk.
pub type NtProcessFn = unsafe extern "system" fn(HANDLE) -> i32;

/// `OpenThread(desired_access, inherit_handle, thread_id)`.
pub type OpenThreadFn = unsafe extern "system" fn(u32, i32, u32) -> HANDLE;

pub struct Capabilities {
    pub suspend_process: Option<NtProcessFn>,
    pub resume_process: Option<NtProcessFn>,
    pub open_thread: Option<OpenThreadFn>,
}

pub static CAPABILITIES: Lazy<Capabilities> = Lazy::new(Capabilities::resolve);

impl Capabilities {
    fn resolve() -> Self {
        unsafe {
            let ntdll = GetModuleHandleW(w!("ntdll.dll")).ok();
            let kernel32 = GetModuleHandleW(w!("kernel32.dll")).ok();

            Self {
                suspend_process: ntdll
                    .and_then(|m| GetProcAddress(m, s!("NtSuspendProcess")))
                    .map(|f| std::mem::transmute::<_, NtProcessFn>(f)),
                resume_process: ntdll
                    .and_then(|m| GetProcAddress(m, s!("NtResumeProcess")))
                    .map(|f| std::mem::transmute::<_, NtProcessFn>(f)),
                open_thread: kernel32
                    .and_then(|m| GetProcAddress(m, s!("OpenThread")))
                    .map(|f| std::mem::transmute::<_, OpenThreadFn>(f)),
            }
        }
    }
}
