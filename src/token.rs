//! Named coordination mutexes ("tokens").
//!
//! A token carries no data; its existence is the whole signal. Two
//! controller invocations aimed at the same target derive the same key and
//! therefore contend on the same kernel object, while distinct targets can
//! never collide.

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::System::Threading::{CreateMutexW, OpenMutexW, MUTEX_ALL_ACCESS};

use crate::handle::OwnedHandle;

/// What a token asserts about its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// A controller is currently attached to this target.
    Activate,
    /// Someone asked the attached controller to exit.
    Deactivate,
}

/// How the target was specified by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Pid(u32),
    Name(String),
}

/// Canonical kernel-object name for a (purpose, selector) pair.
///
/// Pure and total; the key embeds which selector kind was used, so a pid
/// target and a name target can never alias each other.
pub fn token_name(purpose: TokenPurpose, selector: &Selector) -> String {
    let mode = match purpose {
        TokenPurpose::Activate => 1,
        TokenPurpose::Deactivate => 0,
    };
    match selector {
        Selector::Pid(id) => format!("cpulimit_MODE-{mode}_PROCESSID-{id}"),
        Selector::Name(name) => format!("cpulimit_MODE-{mode}_PROCESSNAME-{name}"),
    }
}

/// Owned named mutex; released when dropped (or by the kernel when the
/// owning process dies).
#[derive(Debug)]
pub struct InstanceToken {
    _handle: OwnedHandle,
}

impl InstanceToken {
    /// Creates (or reopens, which makes repeated close requests idempotent)
    /// the token for this purpose and selector, holding it until drop.
    pub fn create(purpose: TokenPurpose, selector: &Selector) -> windows::core::Result<Self> {
        let name = HSTRING::from(token_name(purpose, selector));
        let raw = unsafe { CreateMutexW(None, true, PCWSTR(name.as_ptr()))? };
        match OwnedHandle::new(raw) {
            Some(handle) => Ok(Self { _handle: handle }),
            None => Err(windows::core::Error::from_win32()),
        }
    }

    /// Whether somebody currently holds this token. The probe handle is
    /// closed immediately.
    pub fn exists(purpose: TokenPurpose, selector: &Selector) -> bool {
        let name = HSTRING::from(token_name(purpose, selector));
        unsafe {
            match OpenMutexW(MUTEX_ALL_ACCESS.0, false, PCWSTR(name.as_ptr())) {
                Ok(raw) => OwnedHandle::new(raw).is_some(),
                Err(_) => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let selector = Selector::Pid(4242);
        assert_eq!(
            token_name(TokenPurpose::Activate, &selector),
            token_name(TokenPurpose::Activate, &selector),
        );
    }

    #[test]
    fn test_purposes_never_collide() {
        let selector = Selector::Pid(4242);
        assert_ne!(
            token_name(TokenPurpose::Activate, &selector),
            token_name(TokenPurpose::Deactivate, &selector),
        );
    }

    #[test]
    fn test_distinct_targets_never_collide() {
        assert_ne!(
            token_name(TokenPurpose::Activate, &Selector::Pid(1)),
            token_name(TokenPurpose::Activate, &Selector::Pid(2)),
        );
        assert_ne!(
            token_name(TokenPurpose::Activate, &Selector::Name("a.exe".into())),
            token_name(TokenPurpose::Activate, &Selector::Name("b.exe".into())),
        );
    }

    #[test]
    fn test_pid_and_name_selectors_never_alias() {
        // A process named "7" must not collide with pid 7.
        assert_ne!(
            token_name(TokenPurpose::Activate, &Selector::Pid(7)),
            token_name(TokenPurpose::Activate, &Selector::Name("7".into())),
        );
    }

    #[test]
    fn test_expected_key_format() {
        assert_eq!(
            token_name(TokenPurpose::Activate, &Selector::Pid(4242)),
            "cpulimit_MODE-1_PROCESSID-4242",
        );
        assert_eq!(
            token_name(TokenPurpose::Deactivate, &Selector::Name("notepad.exe".into())),
            "cpulimit_MODE-0_PROCESSNAME-notepad.exe",
        );
    }

    #[test]
    fn test_created_token_is_observable() {
        let selector = Selector::Pid(987_654_301);
        assert!(!InstanceToken::exists(TokenPurpose::Activate, &selector));
        let token = InstanceToken::create(TokenPurpose::Activate, &selector).unwrap();
        assert!(InstanceToken::exists(TokenPurpose::Activate, &selector));
        drop(token);
        assert!(!InstanceToken::exists(TokenPurpose::Activate, &selector));
    }
}
