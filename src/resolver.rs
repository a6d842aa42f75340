//! Target discovery and handle (re)acquisition.

use tracing::{debug, warn};
use windows::Win32::Foundation::WAIT_TIMEOUT;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    OpenProcess, SetPriorityClass, WaitForSingleObject, PROCESS_SET_INFORMATION,
    PROCESS_SUSPEND_RESUME, PROCESS_SYNCHRONIZE,
};

use crate::config::Config;
use crate::handle::OwnedHandle;
use crate::token::Selector;

/// The process being governed: configured selector, currently resolved pid
/// (0 when none), exclusively owned handle and last-observed run state.
#[derive(Debug)]
pub struct Target {
    selector: Selector,
    pid: u32,
    handle: Option<OwnedHandle>,
    running: bool,
}

impl Target {
    pub fn new(selector: Selector) -> Self {
        let pid = match &selector {
            Selector::Pid(id) => *id,
            Selector::Name(_) => 0,
        };
        Self {
            selector,
            pid,
            handle: None,
            running: false,
        }
    }

    /// Acquires (or reacquires) the control handle.
    ///
    /// Not finding the target is not an error: it may simply not have
    /// started yet, and the caller polls again on the next state check.
    pub fn resolve(&mut self, cfg: &Config) {
        self.handle = match &self.selector {
            Selector::Pid(id) => {
                self.pid = *id;
                open_for_control(*id)
            }
            Selector::Name(name) => match find_by_name(name) {
                Some((pid, handle)) => {
                    self.pid = pid;
                    handle
                }
                None => None,
            },
        };

        if let Some(handle) = &self.handle {
            println!("Process {} found.", self.pid);
            let class = cfg.target_priority.as_class();
            if let Err(e) = unsafe { SetPriorityClass(handle.raw(), class) } {
                warn!(pid = self.pid, error = %e, "failed to change target priority");
            } else if cfg.verbose {
                println!(
                    "Priority changed to {} for the process {}.",
                    class.0, self.pid
                );
            }
            self.running = true;
        } else {
            debug!(selector = ?self.selector, "target not found");
            self.running = false;
        }
    }

    /// Whether the target exited while we held its handle. A zero-timeout
    /// wait on a process handle only signals once the process is gone.
    pub fn has_exited(&self) -> bool {
        match &self.handle {
            Some(handle) => unsafe { WaitForSingleObject(handle.raw(), 0) != WAIT_TIMEOUT },
            None => false,
        }
    }

    /// Drops the handle after the target went away. A name-selected target
    /// forgets its discovered pid so the next resolve can find a fresh
    /// incarnation; a pid-selected target keeps polling the configured pid.
    pub fn release(&mut self) {
        self.handle = None;
        self.running = false;
        if matches!(self.selector, Selector::Name(_)) {
            self.pid = 0;
        }
    }

    #[inline]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[inline]
    pub fn handle(&self) -> Option<&OwnedHandle> {
        self.handle.as_ref()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}

/// Suspend/resume, wait-for-exit, and priority-change rights in one open.
fn open_for_control(pid: u32) -> Option<OwnedHandle> {
    unsafe {
        OpenProcess(
            PROCESS_SUSPEND_RESUME | PROCESS_SYNCHRONIZE | PROCESS_SET_INFORMATION,
            false,
            pid,
        )
        .ok()
        .and_then(OwnedHandle::new)
    }
}

/// Walks the process snapshot looking for the first process whose image
/// name's trailing path component matches `wanted`. The first match wins:
/// its pid is reported even when the open itself is refused.
fn find_by_name(wanted: &str) -> Option<(u32, Option<OwnedHandle>)> {
    unsafe {
        let raw = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).ok()?;
        let snapshot = OwnedHandle::new(raw)?;

        let mut entry = PROCESSENTRY32 {
            dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
            ..Default::default()
        };

        if Process32First(snapshot.raw(), &mut entry).is_ok() {
            loop {
                let reported = entry_image_name(&entry.szExeFile);
                if matches_image(reported, wanted) {
                    let pid = entry.th32ProcessID;
                    return Some((pid, open_for_control(pid)));
                }
                if Process32Next(snapshot.raw(), &mut entry).is_err() {
                    break;
                }
            }
        }
    }
    None
}

/// Extract the image name from the snapshot entry's fixed ANSI buffer.
fn entry_image_name(sz_exe_file: &[i8; 260]) -> &str {
    let len = sz_exe_file.iter().position(|&c| c == 0).unwrap_or(260);
    let bytes = unsafe { std::slice::from_raw_parts(sz_exe_file.as_ptr() as *const u8, len) };
    std::str::from_utf8(bytes).unwrap_or("")
}

/// Compares only the trailing path component of the reported image name,
/// under either separator convention, case-insensitively.
fn matches_image(reported: &str, wanted: &str) -> bool {
    image_base_name(reported).eq_ignore_ascii_case(wanted)
}

fn image_base_name(reported: &str) -> &str {
    reported
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(reported)
}
