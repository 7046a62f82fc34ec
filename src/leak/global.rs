//! Process-wide tracker installation.

use super::{LeakTracker, LeakTrackingConfig};
use crate::config::DisposeConfig;
use crate::time::{TimerDriverHandle, TimerThread};
use crate::tracing_compat::info;
use std::sync::OnceLock;

struct GlobalTracking {
    tracker: LeakTracker,
    // Keeps the wall-clock pump alive for the life of the process.
    _pump: Option<TimerThread>,
}

static GLOBAL: OnceLock<GlobalTracking> = OnceLock::new();

/// Error returned by [`install_from_config`].
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// A global tracker was already installed.
    #[error("a global leak tracker is already installed")]
    AlreadyInstalled,
    /// The timer thread could not be started.
    #[error("failed to spawn the leak check timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Returns the installed global tracker, if any.
///
/// Disposables created without an explicit tracker register here.
#[must_use]
pub fn global() -> Option<&'static LeakTracker> {
    GLOBAL.get().map(|g| &g.tracker)
}

/// Installs `tracker` as the process-wide tracker.
///
/// The caller stays responsible for driving the tracker's timers. Can only
/// succeed once per process; on failure the tracker is handed back.
pub fn install(tracker: LeakTracker) -> Result<(), LeakTracker> {
    let mut candidate = Some(tracker);
    GLOBAL.get_or_init(|| GlobalTracking {
        tracker: candidate.take().unwrap_or_else(disabled_tracker),
        _pump: None,
    });
    match candidate {
        None => {
            info!("global leak tracker installed");
            Ok(())
        }
        Some(rejected) => Err(rejected),
    }
}

/// Installs a global tracker built from `config`, backed by a wall-clock timer
/// driver and its own [`TimerThread`].
///
/// Returns `Ok(None)` without installing anything when tracking is disabled.
pub fn install_from_config(
    config: &DisposeConfig,
) -> Result<Option<&'static LeakTracker>, InstallError> {
    if !config.leak_tracking.enabled {
        return Ok(None);
    }
    if GLOBAL.get().is_some() {
        return Err(InstallError::AlreadyInstalled);
    }

    let timers = TimerDriverHandle::with_wall_clock();
    let pump = TimerThread::spawn(timers.clone(), config.timer_tick)?;
    let tracker = LeakTracker::new(config.leak_tracking.clone(), timers);

    let mut candidate = Some((tracker, pump));
    let installed = GLOBAL.get_or_init(|| match candidate.take() {
        Some((tracker, pump)) => GlobalTracking {
            tracker,
            _pump: Some(pump),
        },
        None => GlobalTracking {
            tracker: disabled_tracker(),
            _pump: None,
        },
    });
    if candidate.is_some() {
        // Lost a race with another installer; dropping the pump stops it.
        return Err(InstallError::AlreadyInstalled);
    }
    info!(
        check_delay_ms = u64::try_from(config.leak_tracking.check_delay.as_millis()).unwrap_or(u64::MAX),
        "global leak tracker installed"
    );
    Ok(Some(&installed.tracker))
}

fn disabled_tracker() -> LeakTracker {
    LeakTracker::new(LeakTrackingConfig::default(), TimerDriverHandle::with_wall_clock())
}

impl LeakTracker {
    /// Returns the installed global tracker, if any.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        global()
    }
}
