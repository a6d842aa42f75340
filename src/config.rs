use std::time::Duration;

use serde::{Deserialize, Serialize};
use windows::Win32::System::Threading::{
    ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, HIGH_PRIORITY_CLASS,
    IDLE_PRIORITY_CLASS, NORMAL_PRIORITY_CLASS, PROCESS_CREATION_FLAGS, REALTIME_PRIORITY_CLASS,
};

use crate::token::Selector;

/// Scheduling class applied to the target process once it is found.
///
/// Defaults to `Idle`: a throttled target should not compete with anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    #[default]
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl PriorityClass {
    pub fn as_class(self) -> PROCESS_CREATION_FLAGS {
        match self {
            PriorityClass::Idle => IDLE_PRIORITY_CLASS,
            PriorityClass::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
            PriorityClass::Normal => NORMAL_PRIORITY_CLASS,
            PriorityClass::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
            PriorityClass::High => HIGH_PRIORITY_CLASS,
            PriorityClass::Realtime => REALTIME_PRIORITY_CLASS,
        }
    }
}

/// Read-only settings object the external configuration layer hands in.
///
/// Exactly one of `process_id` / `exe_name` selects the target:
/// `process_id != 0` wins, otherwise the name is matched against the trailing
/// path component of each running process's image name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target pid; 0 means "resolve by `exe_name` instead".
    #[serde(default)]
    pub process_id: u32,

    /// Target executable name, e.g. `notepad.exe`. Used only when
    /// `process_id` is 0.
    #[serde(default)]
    pub exe_name: Option<String>,

    /// Ask the controller already attached to this target to exit, instead
    /// of becoming a controller ourselves.
    #[serde(default)]
    pub close: bool,

    #[serde(default)]
    pub verbose: bool,

    /// Raise our own scheduling class to HIGH at startup.
    #[serde(default)]
    pub high_priority: bool,

    /// Scheduling class applied to the target once found.
    #[serde(default)]
    pub target_priority: PriorityClass,

    /// Permit the whole-process ntdll suspend primitive. When false the
    /// controller always walks the target's threads one by one.
    #[serde(default = "default_true")]
    pub use_ntdll: bool,

    /// Stop the control loop for good when the target exits, instead of
    /// polling for it to reappear.
    #[serde(default)]
    pub lazy: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_id: 0,
            exe_name: None,
            close: false,
            verbose: false,
            high_priority: false,
            target_priority: PriorityClass::default(),
            use_ntdll: true,
            lazy: false,
        }
    }
}

impl Config {
    /// One scheduling slot of the duty cycle; the close handshake waits two
    /// of these before exiting.
    pub const TIME_SLOT: Duration = Duration::from_millis(100);

    /// Target selector the coordination mutex keys are derived from.
    pub fn selector(&self) -> Selector {
        if self.process_id != 0 {
            Selector::Pid(self.process_id)
        } else {
            Selector::Name(self.exe_name.clone().unwrap_or_default())
        }
    }
}
