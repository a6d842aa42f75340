//! One-time self setup before the control loop starts.
//!
//! Three independent, best-effort steps: trim our own working set, optionally
//! raise our own scheduling class, and enable SeDebugPrivilege so targets
//! owned by other users can be opened. None of them can fail startup.

use tracing::warn;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HANDLE, LUID};
use windows::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_DEBUG_NAME,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::System::ProcessStatus::EmptyWorkingSet;
use windows::Win32::System::Threading::{
    GetCurrentProcess, OpenProcessToken, SetPriorityClass, HIGH_PRIORITY_CLASS,
};

use crate::config::Config;
use crate::handle::OwnedHandle;

pub struct PrivilegeManager;

impl PrivilegeManager {
    pub fn setup(cfg: &Config) {
        Self::trim_own_working_set();
        if cfg.high_priority {
            Self::raise_own_priority(cfg.verbose);
        }
        Self::enable_debug_privilege();
    }

    /// Release our own unused working memory; the controller spends most of
    /// its life asleep between toggles.
    fn trim_own_working_set() {
        unsafe {
            let _ = EmptyWorkingSet(GetCurrentProcess());
        }
    }

    fn raise_own_priority(verbose: bool) {
        unsafe {
            if SetPriorityClass(GetCurrentProcess(), HIGH_PRIORITY_CLASS).is_ok() {
                if verbose {
                    println!("Priority changed to {} for cpulimit.", HIGH_PRIORITY_CLASS.0);
                }
            } else {
                eprintln!("Failed to set priority to {}", HIGH_PRIORITY_CLASS.0);
            }
        }
    }

    /// Without SeDebugPrivilege, later opens fail for processes the caller
    /// does not own; that is survivable, so every step here is logged only.
    fn enable_debug_privilege() {
        unsafe {
            let mut raw_token = HANDLE::default();
            if let Err(e) = OpenProcessToken(
                GetCurrentProcess(),
                TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                &mut raw_token,
            ) {
                warn!(error = %e, "failed to open own process token");
                return;
            }
            let Some(token) = OwnedHandle::new(raw_token) else {
                return;
            };

            let mut luid = LUID::default();
            if let Err(e) = LookupPrivilegeValueW(PCWSTR::null(), SE_DEBUG_NAME, &mut luid) {
                warn!(error = %e, "failed to look up SeDebugPrivilege");
                return;
            }

            let privileges = TOKEN_PRIVILEGES {
                PrivilegeCount: 1,
                Privileges: [LUID_AND_ATTRIBUTES {
                    Luid: luid,
                    Attributes: SE_PRIVILEGE_ENABLED,
                }],
            };
            if let Err(e) = AdjustTokenPrivileges(
                token.raw(),
                false,
                Some(&privileges as *const _),
                0,
                None,
                None,
            ) {
                warn!(error = %e, "failed to enable SeDebugPrivilege");
            }
        }
    }
}
