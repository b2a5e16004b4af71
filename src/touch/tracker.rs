use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::ContactSource;
use super::error::TouchError;
use super::event::TouchEvent;
use super::screen::{ScreenLayout, ScreenPoint};
use super::slots::{ContactSlot, DeviceAxes, ScreenToDevice, SlotTable};

/// A stream of decoded multitouch events.
pub trait EventSource: Send + 'static {
    /// Wait at most `timeout` for the next event.
    ///
    /// `Ok(None)` means nothing arrived in time. Errors are treated as
    /// transient: the polling loop backs off and calls again.
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<TouchEvent>>;
}

/// Timing of the polling thread.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Sleep after a failed read.
    pub backoff: Duration,
    /// Longest single wait for input; bounds how late the loop sees a stop request.
    pub wake_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(10),
            wake_interval: Duration::from_millis(50),
        }
    }
}

struct Shared {
    slots: Mutex<SlotTable>,
    stop: AtomicBool,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, SlotTable> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Contact tracker fed by a device polling thread.
pub struct DeviceTracker {
    name: String,
    axes: DeviceAxes,
    screens: RwLock<ScreenLayout>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceTracker {
    /// Start polling `source` on a dedicated thread.
    pub fn spawn<S: EventSource>(
        name: impl Into<String>,
        source: S,
        axes: DeviceAxes,
        slots: SlotTable,
        screens: ScreenLayout,
        settings: PollSettings,
    ) -> Result<Self, TouchError> {
        let name = name.into();
        if !axes.is_valid() {
            return Err(TouchError::DegenerateAxes {
                device: name,
                x_min: axes.x.min,
                x_max: axes.x.max,
                y_min: axes.y.min,
                y_max: axes.y.max,
            });
        }
        if screens.is_empty() {
            return Err(TouchError::NoScreen);
        }

        let shared = Arc::new(Shared {
            slots: Mutex::new(slots),
            stop: AtomicBool::new(false),
        });
        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("inkboard-touch".into())
            .spawn(move || poll_loop(source, &loop_shared, settings))
            .map_err(TouchError::Spawn)?;

        debug!(device = %name, ?axes, "touch polling started");
        Ok(Self {
            name,
            axes,
            screens: RwLock::new(screens),
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axes(&self) -> DeviceAxes {
        self.axes
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn poll_loop<S: EventSource>(mut source: S, shared: &Shared, settings: PollSettings) {
    while !shared.stop.load(Ordering::Acquire) {
        match source.next_event(settings.wake_interval) {
            Ok(None | Some(TouchEvent::Unknown)) => {}
            Ok(Some(event)) => shared.slots().apply(event),
            Err(err) => {
                trace!(%err, "touch read failed, backing off");
                thread::sleep(settings.backoff);
            }
        }
    }
    drop(source);
    debug!("touch polling stopped");
}

impl ContactSource for DeviceTracker {
    fn contact_size(&self, point: ScreenPoint, radius: f64) -> u32 {
        let mapping = {
            let screens = self.screens.read().unwrap_or_else(PoisonError::into_inner);
            let Some(screen) = screens.screen_at(point) else {
                return 0;
            };
            match ScreenToDevice::new(&self.axes, screen) {
                Some(mapping) => mapping,
                None => return 0,
            }
        };
        self.shared
            .slots()
            .largest_major_near(&mapping, point, radius)
    }

    fn contacts(&self) -> Vec<(usize, ContactSlot)> {
        self.shared
            .slots()
            .active()
            .map(|(i, s)| (i, *s))
            .collect()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn set_screens(&self, screens: ScreenLayout) {
        *self.screens.write().unwrap_or_else(PoisonError::into_inner) = screens;
    }

    fn shutdown(&self) {
        let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        // Returns within one wake interval; the device closes with the loop
        if handle.join().is_err() {
            warn!(device = %self.name, "touch polling thread panicked");
        }
    }
}

impl Drop for DeviceTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Instant;

    use super::*;
    use crate::touch::slots::AxisRange;

    /// Replays a script, then idles like an untouched screen.
    struct ScriptedSource {
        events: VecDeque<io::Result<TouchEvent>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(events: Vec<io::Result<TouchEvent>>) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let source = Self {
                events: events.into(),
                closed: Arc::clone(&closed),
            };
            (source, closed)
        }
    }

    impl EventSource for ScriptedSource {
        fn next_event(&mut self, timeout: Duration) -> io::Result<Option<TouchEvent>> {
            match self.events.pop_front() {
                Some(event) => event.map(Some),
                None => {
                    thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    fn axes_1000() -> DeviceAxes {
        DeviceAxes::new(AxisRange::new(0, 1000), AxisRange::new(0, 1000))
    }

    fn settings() -> PollSettings {
        PollSettings {
            backoff: Duration::from_millis(1),
            wake_interval: Duration::from_millis(5),
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_polling_feeds_queries() {
        let (source, closed) = ScriptedSource::new(vec![
            Ok(TouchEvent::Slot(0)),
            Ok(TouchEvent::TrackingId(12)),
            Err(io::Error::other("transient")),
            Ok(TouchEvent::PositionX(500)),
            Ok(TouchEvent::PositionY(500)),
            Ok(TouchEvent::TouchMajor(50)),
            Ok(TouchEvent::Unknown),
        ]);
        let tracker = DeviceTracker::spawn(
            "scripted",
            source,
            axes_1000(),
            SlotTable::new(10),
            ScreenLayout::single(1000, 1000),
            settings(),
        )
        .unwrap();

        let p = ScreenPoint::new(500.0, 500.0);
        assert!(wait_for(|| tracker.contact_size(p, 50.0) == 50));
        assert_eq!(tracker.contacts().len(), 1);

        tracker.shutdown();
        assert!(!tracker.is_running());
        assert!(closed.load(Ordering::Acquire));
    }

    #[test]
    fn test_lift_removes_contact() {
        let (source, _closed) = ScriptedSource::new(vec![
            Ok(TouchEvent::Slot(2)),
            Ok(TouchEvent::TrackingId(4)),
            Ok(TouchEvent::PositionX(100)),
            Ok(TouchEvent::PositionY(100)),
            Ok(TouchEvent::TouchMajor(30)),
            Ok(TouchEvent::TrackingId(-1)),
        ]);
        let tracker = DeviceTracker::spawn(
            "scripted",
            source,
            axes_1000(),
            SlotTable::new(4),
            ScreenLayout::single(1000, 1000),
            settings(),
        )
        .unwrap();

        assert!(wait_for(|| {
            let slots = tracker.shared.slots();
            let slot = slots.slot(2).unwrap();
            slot.major == 30 && slot.tracking_id == -1
        }));
        assert_eq!(tracker.contact_size(ScreenPoint::new(100.0, 100.0), 500.0), 0);
    }

    #[test]
    fn test_degenerate_axes_refused() {
        let (source, _) = ScriptedSource::new(Vec::new());
        let axes = DeviceAxes::new(AxisRange::new(5, 5), AxisRange::new(0, 100));
        let result = DeviceTracker::spawn(
            "flat",
            source,
            axes,
            SlotTable::new(2),
            ScreenLayout::single(100, 100),
            settings(),
        );
        assert!(matches!(result, Err(TouchError::DegenerateAxes { .. })));
    }

    #[test]
    fn test_shutdown_releases_idle_device() {
        let (source, closed) = ScriptedSource::new(Vec::new());
        let tracker = DeviceTracker::spawn(
            "idle",
            source,
            axes_1000(),
            SlotTable::new(2),
            ScreenLayout::single(1000, 1000),
            PollSettings::default(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        tracker.shutdown();
        assert!(closed.load(Ordering::Acquire));
        assert!(!tracker.is_running());
        assert!(start.elapsed() < Duration::from_secs(1));
        // A second shutdown is a no-op
        tracker.shutdown();
    }

    #[test]
    fn test_drop_joins_polling_thread() {
        let (source, closed) = ScriptedSource::new(vec![Ok(TouchEvent::Slot(1))]);
        let tracker = DeviceTracker::spawn(
            "idle",
            source,
            axes_1000(),
            SlotTable::new(2),
            ScreenLayout::single(1000, 1000),
            settings(),
        )
        .unwrap();
        drop(tracker);
        assert!(closed.load(Ordering::Acquire));
    }
}
