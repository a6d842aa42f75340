//! Whole-target suspend/resume.
//!
//! The strategy is fixed at startup: the whole-process ntdll pair when it
//! resolved and configuration permits it, otherwise a per-thread walk. A
//! native call that reports failure still falls back to the walk for that
//! one call. The walk is not atomic: with several runnable threads there is
//! a brief window where some are toggled and some are not, and that
//! approximation is deliberate.

use tracing::debug;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows::Win32::System::Threading::{ResumeThread, SuspendThread, THREAD_SUSPEND_RESUME};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::native::{NtProcessFn, OpenThreadFn, CAPABILITIES};
use crate::resolver::Target;

pub struct SuspendController {
    /// Whole-process (suspend, resume) pair, when chosen.
    native: Option<(NtProcessFn, NtProcessFn)>,
    open_thread: OpenThreadFn,
}

impl SuspendController {
    /// Fails with [`Error::Unsupported`] when even the per-thread fallback
    /// cannot be assembled.
    pub fn new(cfg: &Config) -> Result<Self> {
        let caps = &*CAPABILITIES;
        let open_thread = caps.open_thread.ok_or(Error::Unsupported)?;
        let native = if cfg.use_ntdll {
            caps.suspend_process.zip(caps.resume_process)
        } else {
            None
        };
        Ok(Self { native, open_thread })
    }

    /// Best effort: reports success to the caller even when no thread
    /// matched, and records the target as suspended either way.
    pub fn suspend(&self, target: &mut Target) {
        self.toggle(target, true);
        target.set_running(false);
    }

    pub fn resume(&self, target: &mut Target) {
        self.toggle(target, false);
        target.set_running(true);
    }

    fn toggle(&self, target: &Target, suspend: bool) {
        if let (Some((nt_suspend, nt_resume)), Some(handle)) = (self.native, target.handle()) {
            let status = unsafe {
                if suspend {
                    nt_suspend(handle.raw())
                } else {
                    nt_resume(handle.raw())
                }
            };
            if status == 0 {
                return;
            }
            debug!(pid = target.pid(), status, "whole-process toggle failed, walking threads");
        }
        self.walk_threads(target.pid(), suspend);
    }

    /// Enumerates the system thread list and toggles every thread owned by
    /// `pid`. Threads that cannot be opened are skipped, not retried.
    fn walk_threads(&self, pid: u32, suspend: bool) {
        unsafe {
            let Ok(raw) = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) else {
                return;
            };
            let Some(snapshot) = crate::handle::OwnedHandle::new(raw) else {
                return;
            };

            let mut entry = THREADENTRY32 {
                dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
                ..Default::default()
            };

            if Thread32First(snapshot.raw(), &mut entry).is_ok() {
                loop {
                    if entry.th32OwnerProcessID == pid {
                        let raw =
                            (self.open_thread)(THREAD_SUSPEND_RESUME.0, 0, entry.th32ThreadID);
                        if let Some(thread) = crate::handle::OwnedHandle::new(raw) {
                            if suspend {
                                SuspendThread(thread.raw());
                            } else {
                                ResumeThread(thread.raw());
                            }
                        }
                    }
                    if Thread32Next(snapshot.raw(), &mut entry).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Selector;

    #[test]
    fn test_strategy_respects_config() {
        let native = SuspendController::new(&Config::default()).unwrap();
        assert!(native.native.is_some());

        let walker = SuspendController::new(&Config {
            use_ntdll: false,
            ..Default::default()
        })
        .unwrap();
        assert!(walker.native.is_none());
    }

    #[test]
    fn test_bookkeeping_updates_without_a_handle() {
        // No open handle and no live threads: still "succeeds" best-effort.
        let controller = SuspendController::new(&Config::default()).unwrap();
        let mut target = Target::new(Selector::Pid(4_000_000_006));

        controller.suspend(&mut target);
        assert!(!target.is_running());
        controller.resume(&mut target);
        assert!(target.is_running());
    }
}
