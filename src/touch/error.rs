use std::path::PathBuf;

use thiserror::Error;

/// Why a device-backed tracker could not be started.
///
/// These never reach callers of [`super::TouchService::initialize`]; they are
/// logged and the service falls back to an inert tracker.
#[derive(Debug, Error)]
pub enum TouchError {
    #[error("touch tracking disabled by configuration")]
    Disabled,

    #[error("raw multitouch input is not supported on this platform")]
    Unsupported,

    #[error("no slotted multitouch device under {0}")]
    NoDevice(PathBuf),

    #[error("degenerate axis range on {device}: x {x_min}..{x_max}, y {y_min}..{y_max}")]
    DegenerateAxes {
        device: String,
        x_min: i32,
        x_max: i32,
        y_min: i32,
        y_max: i32,
    },

    #[error("no screen geometry to map touches onto")]
    NoScreen,

    #[error("failed to start the polling thread")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
