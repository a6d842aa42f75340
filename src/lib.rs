//! Process lifecycle controller for a Windows CPU usage limiter.
//!
//! The crate locates a target process (by pid or by executable name), toggles
//! it between running and suspended, and coordinates through named mutexes so
//! that at most one controller governs a given target at a time, with a
//! remote "close" handshake for stopping a running instance.
//!
//! The duty-cycle policy (when to suspend and for how long) lives outside
//! this crate: an external loop drives [`ProcessController::check_state`],
//! [`ProcessController::suspend`] and [`ProcessController::resume`].

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod native;
pub mod privilege;
pub mod resolver;
pub mod suspend;
pub mod token;

pub use config::{Config, PriorityClass};
pub use controller::{Launch, ProcessController};
pub use coordinator::{CloseGuard, InstanceCoordinator};
pub use error::{Error, Result};
pub use token::{token_name, Selector, TokenPurpose};
