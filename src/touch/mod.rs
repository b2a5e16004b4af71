//! Multitouch contact tracking.
//!
//! A [`TouchService`] owns the process's single raw input session. Callers get
//! a cloneable [`TouchHandle`] and ask it for the size of the contact nearest
//! a screen point, which the board uses as a pen pressure proxy. When no
//! suitable device exists the service runs a [`NullTracker`] and every query
//! answers `0`.

pub mod error;
pub mod event;
#[cfg(all(target_os = "linux", feature = "evdev"))]
pub mod evdev;
pub mod screen;
pub mod slots;
pub mod tracker;

use std::sync::Arc;

use tracing::info;

use crate::config::TouchConfig;
pub use error::TouchError;
pub use screen::{ScreenLayout, ScreenPoint, ScreenRect};
pub use slots::{AxisRange, ContactSlot, DeviceAxes};
pub use tracker::{DeviceTracker, EventSource, PollSettings};

/// Something that can report touch contact sizes.
pub trait ContactSource: Send + Sync {
    /// Contact-major, in screen pixels, of the largest active contact within
    /// `radius` pixels of `point`. `0` when nothing qualifies.
    fn contact_size(&self, point: ScreenPoint, radius: f64) -> u32;

    /// Active contacts as `(slot, state)`, in device units.
    fn contacts(&self) -> Vec<(usize, ContactSlot)> {
        Vec::new()
    }

    /// Whether queries can ever return a non-zero size.
    fn is_available(&self) -> bool;

    /// Replace the screen geometry used to map points into device space.
    fn set_screens(&self, _screens: ScreenLayout) {}

    /// Stop any background work. Idempotent.
    fn shutdown(&self) {}
}

/// Inert tracker used when no device is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracker;

impl ContactSource for NullTracker {
    fn contact_size(&self, _point: ScreenPoint, _radius: f64) -> u32 {
        0
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Shared access to the active contact source.
#[derive(Clone)]
pub struct TouchHandle(Arc<dyn ContactSource>);

impl TouchHandle {
    pub fn contact_size(&self, point: ScreenPoint, radius: f64) -> u32 {
        self.0.contact_size(point, radius)
    }

    pub fn contacts(&self) -> Vec<(usize, ContactSlot)> {
        self.0.contacts()
    }

    pub fn is_available(&self) -> bool {
        self.0.is_available()
    }
}

impl std::fmt::Debug for TouchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TouchHandle")
            .field("available", &self.is_available())
            .finish()
    }
}

/// Process-wide owner of the touch input session.
pub struct TouchService {
    source: Arc<dyn ContactSource>,
}

impl TouchService {
    /// Open the first suitable device, or fall back to an inert tracker.
    pub fn initialize(config: &TouchConfig, screens: ScreenLayout) -> Self {
        match open_device(config, screens) {
            Ok(tracker) => Self::with_source(Arc::new(tracker)),
            Err(err) => {
                info!(reason = %err, "touch pressure unavailable");
                Self::inert()
            }
        }
    }

    pub fn inert() -> Self {
        Self::with_source(Arc::new(NullTracker))
    }

    /// Wrap an already-built source, e.g. a [`DeviceTracker`] over a custom
    /// [`EventSource`].
    pub fn with_source(source: Arc<dyn ContactSource>) -> Self {
        Self { source }
    }

    pub fn handle(&self) -> TouchHandle {
        TouchHandle(Arc::clone(&self.source))
    }

    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub fn set_screens(&self, screens: ScreenLayout) {
        self.source.set_screens(screens);
    }

    /// Stop polling and release the device. Handles keep working but report
    /// whatever state was last seen.
    pub fn shutdown(&self) {
        self.source.shutdown();
    }
}

impl Drop for TouchService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(target_os = "linux", feature = "evdev"))]
fn open_device(config: &TouchConfig, screens: ScreenLayout) -> Result<DeviceTracker, TouchError> {
    if !config.enabled {
        return Err(TouchError::Disabled);
    }
    if screens.is_empty() {
        return Err(TouchError::NoScreen);
    }
    let probed = evdev::open_first_multitouch(&config.device_dir, config.max_nodes)?;
    DeviceTracker::spawn(
        probed.name,
        probed.source,
        probed.axes,
        probed.slots,
        screens,
        config.poll_settings(),
    )
}

#[cfg(not(all(target_os = "linux", feature = "evdev")))]
fn open_device(config: &TouchConfig, _screens: ScreenLayout) -> Result<DeviceTracker, TouchError> {
    if !config.enabled {
        return Err(TouchError::Disabled);
    }
    Err(TouchError::Unsupported)
}
