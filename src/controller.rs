//! The controller object the external duty-cycle loop drives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use windows::Win32::System::Threading::GetCurrentProcessId;

use crate::config::Config;
use crate::coordinator::{CloseGuard, InstanceCoordinator, Registration};
use crate::error::Result;
use crate::privilege::PrivilegeManager;
use crate::resolver::Target;
use crate::suspend::SuspendController;

/// What a successful [`ProcessController::launch`] produced.
#[derive(Debug)]
pub enum Launch {
    /// This invocation is the active controller for its target.
    Controller(ProcessController),
    /// This invocation only signalled a running controller to stop; the
    /// process should exit successfully once the guard is dropped.
    CloseRequested(CloseGuard),
}

pub struct ProcessController {
    config: Config,
    coordinator: InstanceCoordinator,
    suspender: SuspendController,
    target: Target,
    /// Externally owned "the application is exiting" flag, injected rather
    /// than read from a global so tests can drive it.
    exiting: Arc<AtomicBool>,
}

impl std::fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessController")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ProcessController {
    /// Registers this invocation against the target, verifies the platform
    /// can suspend at all, performs the one-time self setup and takes the
    /// initial shot at resolving the target.
    pub fn launch(config: Config, exiting: Arc<AtomicBool>) -> Result<Launch> {
        let coordinator = match InstanceCoordinator::register(config.selector(), config.close)? {
            Registration::Active(coordinator) => coordinator,
            Registration::CloseRequested(guard) => return Ok(Launch::CloseRequested(guard)),
        };

        let suspender = SuspendController::new(&config)?;
        PrivilegeManager::setup(&config);

        let mut target = Target::new(config.selector());
        target.resolve(&config);

        Ok(Launch::Controller(Self {
            config,
            coordinator,
            suspender,
            target,
            exiting,
        }))
    }

    /// One liveness poll of the control loop. Returns `false` when the loop
    /// should stop: a close was requested, the application is exiting, the
    /// target turned out to be ourselves, or (in lazy mode) the target
    /// exited.
    pub fn check_state(&mut self) -> bool {
        let mut keep_going = !self.coordinator.close_requested();

        if self.target.has_exited() {
            println!("Process {} closed.", self.target.pid());
            self.target.release();
            if self.config.lazy {
                return false;
            }
        }

        if !self.target.is_open() {
            self.target.resolve(&self.config);
        }

        let own_pid = unsafe { GetCurrentProcessId() };
        if self.target.pid() == own_pid {
            println!(
                "Target process {} is cpulimit itself!\nAborting because it makes no sense.",
                self.target.pid()
            );
            keep_going = false;
        }

        if self.exiting.load(Ordering::Relaxed) {
            keep_going = false;
        }

        keep_going
    }

    /// Always succeeds from the caller's point of view; failures stay
    /// internal to the chosen suspend strategy.
    pub fn suspend(&mut self) {
        self.suspender.suspend(&mut self.target);
    }

    pub fn resume(&mut self) {
        self.suspender.resume(&mut self.target);
    }

    #[inline]
    pub fn is_target_open(&self) -> bool {
        self.target.is_open()
    }

    #[inline]
    pub fn is_target_running(&self) -> bool {
        self.target.is_running()
    }

    #[inline]
    pub fn target_pid(&self) -> u32 {
        self.target.pid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn launch_active(config: Config) -> ProcessController {
        match ProcessController::launch(config, Arc::new(AtomicBool::new(false))).unwrap() {
            Launch::Controller(c) => c,
            Launch::CloseRequested(_) => unreachable!(),
        }
    }

    #[test]
    fn test_contention_between_launches() {
        let config = Config {
            process_id: 920_000_001,
            ..Default::default()
        };
        let _first = launch_active(config.clone());
        let second = ProcessController::launch(config, Arc::new(AtomicBool::new(false)));
        assert!(matches!(second, Err(Error::AlreadyRunning)));
    }

    #[test]
    fn test_missing_target_keeps_polling() {
        let mut controller = launch_active(Config {
            process_id: 4_000_000_010,
            ..Default::default()
        });
        assert!(!controller.is_target_open());
        assert!(!controller.is_target_running());
        assert!(controller.check_state());
    }

    #[test]
    fn test_external_exit_flag_stops_the_loop() {
        let exiting = Arc::new(AtomicBool::new(false));
        let config = Config {
            process_id: 4_000_000_014,
            ..Default::default()
        };
        let mut controller =
            match ProcessController::launch(config, Arc::clone(&exiting)).unwrap() {
                Launch::Controller(c) => c,
                Launch::CloseRequested(_) => unreachable!(),
            };

        assert!(controller.check_state());
        exiting.store(true, Ordering::Relaxed);
        assert!(!controller.check_state());
    }

    #[test]
    fn test_self_target_aborts() {
        let own_pid = unsafe { GetCurrentProcessId() };
        let mut controller = launch_active(Config {
            process_id: own_pid,
            // Leave our own scheduling class alone.
            target_priority: crate::config::PriorityClass::Normal,
            ..Default::default()
        });
        assert!(controller.is_target_open());
        assert!(!controller.check_state());
    }
}
