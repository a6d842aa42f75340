//! Single-instance coordination between controller invocations.
//!
//! The first invocation against a target creates and holds the ACTIVATE
//! token for its whole life. A later invocation either fails (duplicate
//! controller) or, in close mode, raises the DEACTIVATE token and exits;
//! the active controller polls for that token and winds down.

use std::thread;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::token::{token_name, InstanceToken, Selector, TokenPurpose};

/// Outcome of registering this invocation against a target.
#[derive(Debug)]
pub enum Registration {
    /// This invocation is now the active controller.
    Active(InstanceCoordinator),
    /// This invocation signalled the active controller to stop and should
    /// exit successfully without ever touching the target.
    CloseRequested(CloseGuard),
}

/// Keeps the DEACTIVATE token alive until the close-mode invocation exits,
/// so the active controller has a window to observe it.
#[derive(Debug)]
pub struct CloseGuard {
    _token: InstanceToken,
}

/// Holds the ACTIVATE token for the lifetime of the active controller.
#[derive(Debug)]
pub struct InstanceCoordinator {
    selector: Selector,
    _activate: InstanceToken,
}

impl InstanceCoordinator {
    /// Runs the per-target registration state machine.
    ///
    /// Observing the ACTIVATE token and creating it are two steps; a losing
    /// racer between them ends up with a second handle to the same named
    /// mutex, which is harmless for an existence-only protocol.
    pub fn register(selector: Selector, close: bool) -> Result<Registration> {
        let already_active = InstanceToken::exists(TokenPurpose::Activate, &selector);

        if already_active {
            if !close {
                return Err(Error::AlreadyRunning);
            }
            let token = InstanceToken::create(TokenPurpose::Deactivate, &selector)?;
            match &selector {
                Selector::Pid(id) => {
                    println!("Close the cpulimit attached by the process id: {id}.");
                }
                Selector::Name(name) => {
                    println!("Close the cpulimit attached by the process name: {name}.");
                }
            }
            // Two scheduling slots of grace for the active controller to
            // notice the token before this invocation goes away.
            thread::sleep(2 * Config::TIME_SLOT);
            return Ok(Registration::CloseRequested(CloseGuard { _token: token }));
        }

        if close {
            return Err(Error::NothingToClose(token_name(
                TokenPurpose::Activate,
                &selector,
            )));
        }

        let activate = InstanceToken::create(TokenPurpose::Activate, &selector)?;
        Ok(Registration::Active(InstanceCoordinator {
            selector,
            _activate: activate,
        }))
    }

    /// Whether someone raised the DEACTIVATE token for our target.
    pub fn close_requested(&self) -> bool {
        InstanceToken::exists(TokenPurpose::Deactivate, &self.selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own synthetic pid so parallel tests never share a
    // kernel object.

    #[test]
    fn test_first_registration_becomes_active() {
        let selector = Selector::Pid(910_000_001);
        let reg = InstanceCoordinator::register(selector, false).unwrap();
        assert!(matches!(reg, Registration::Active(_)));
    }

    #[test]
    fn test_second_registration_is_contention() {
        let selector = Selector::Pid(910_000_002);
        let _first = InstanceCoordinator::register(selector.clone(), false).unwrap();
        let second = InstanceCoordinator::register(selector, false);
        assert!(matches!(second, Err(Error::AlreadyRunning)));
    }

    #[test]
    fn test_activate_token_released_on_drop() {
        let selector = Selector::Pid(910_000_003);
        let first = InstanceCoordinator::register(selector.clone(), false).unwrap();
        drop(first);
        let again = InstanceCoordinator::register(selector, false).unwrap();
        assert!(matches!(again, Registration::Active(_)));
    }

    #[test]
    fn test_close_without_active_controller_fails_token_free() {
        let selector = Selector::Pid(910_000_004);
        let reg = InstanceCoordinator::register(selector.clone(), true);
        assert!(matches!(reg, Err(Error::NothingToClose(_))));
        assert!(!InstanceToken::exists(TokenPurpose::Activate, &selector));
        assert!(!InstanceToken::exists(TokenPurpose::Deactivate, &selector));
    }

    #[test]
    fn test_close_handshake_is_observed_and_idempotent() {
        let selector = Selector::Pid(910_000_005);
        let active = match InstanceCoordinator::register(selector.clone(), false).unwrap() {
            Registration::Active(c) => c,
            Registration::CloseRequested(_) => unreachable!(),
        };
        assert!(!active.close_requested());

        let first_close = InstanceCoordinator::register(selector.clone(), true).unwrap();
        assert!(matches!(first_close, Registration::CloseRequested(_)));
        assert!(active.close_requested());

        // Repeating the close request reopens the same token.
        let second_close = InstanceCoordinator::register(selector, true).unwrap();
        assert!(matches!(second_close, Registration::CloseRequested(_)));
        assert!(active.close_requested());

        drop(first_close);
        drop(second_close);
        assert!(!active.close_requested());
    }
}
