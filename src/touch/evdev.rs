//! Raw evdev backend for the contact tracker.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev_rs::enums::{EV_ABS, EventCode};
use evdev_rs::{Device, DeviceWrapper, InputEvent, ReadFlag, ReadStatus};
use tracing::{debug, trace};

use super::error::TouchError;
use super::event::TouchEvent;
use super::slots::{AxisRange, DeviceAxes, FALLBACK_SLOT_COUNT, SlotTable};
use super::tracker::EventSource;

const REQUIRED_AXES: [EV_ABS; 4] = [
    EV_ABS::ABS_MT_SLOT,
    EV_ABS::ABS_MT_POSITION_X,
    EV_ABS::ABS_MT_POSITION_Y,
    EV_ABS::ABS_MT_TOUCH_MAJOR,
];

/// A multitouch device selected for tracking, ready to hand to the poller.
pub struct ProbedDevice {
    pub name: String,
    pub path: PathBuf,
    pub axes: DeviceAxes,
    pub slots: SlotTable,
    pub source: EvdevSource,
}

/// Non-blocking reader over one evdev node.
pub struct EvdevSource {
    device: Device,
    // Owned by `device`, valid as long as it is
    fd: RawFd,
    syncing: bool,
}

impl EventSource for EvdevSource {
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<TouchEvent>> {
        let was_syncing = self.syncing;
        let flags = if was_syncing {
            ReadFlag::SYNC
        } else {
            ReadFlag::NORMAL
        };
        let read = self
            .device
            .next_event(flags)
            .map(|(status, event)| (status, decode(&event)));
        let (result, syncing) = read_step(was_syncing, read);
        self.syncing = syncing;

        match result {
            Ok(None) if !was_syncing => {
                // Queue empty; sleep in the kernel until input or timeout
                wait_readable(self.fd, timeout)?;
                Ok(None)
            }
            other => other,
        }
    }
}

/// One read in the `SYN_DROPPED` state machine.
///
/// Takes whether the reader is replaying a resync and what the read returned,
/// and gives the event to report plus whether the next read is a resync read.
/// A `Sync` status enters resync, `WouldBlock` ends it, and any other error
/// leaves the mode as it was.
fn read_step(
    syncing: bool,
    read: io::Result<(ReadStatus, TouchEvent)>,
) -> (io::Result<Option<TouchEvent>>, bool) {
    match read {
        Ok((ReadStatus::Success, event)) => (Ok(Some(event)), syncing),
        Ok((ReadStatus::Sync, event)) => (Ok(Some(event)), true),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => (Ok(None), false),
        Err(err) => (Err(err), syncing),
    }
}

/// Block until `fd` is readable or `timeout` passes. `Ok(false)` on timeout.
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: `pollfd` is a single valid entry that outlives the call.
    let ready = unsafe { libc::poll(&mut pollfd, 1, millis) };
    match ready {
        0 => Ok(false),
        n if n > 0 => Ok(true),
        _ => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

fn decode(event: &InputEvent) -> TouchEvent {
    let (ty, code) = evdev_rs::util::event_code_to_int(&event.event_code);
    match (u16::try_from(ty), u16::try_from(code)) {
        (Ok(ty), Ok(code)) => TouchEvent::from_raw(ty, code, event.value),
        _ => TouchEvent::Unknown,
    }
}

fn abs(axis: EV_ABS) -> EventCode {
    EventCode::EV_ABS(axis)
}

/// `eventN` nodes under `dir`, in numeric order, at most `limit` of them.
fn event_nodes(dir: &Path, limit: usize) -> io::Result<Vec<PathBuf>> {
    let mut nodes: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name.to_str()?.strip_prefix("event")?.parse().ok()?;
            Some((index, entry.path()))
        })
        .collect();
    nodes.sort_by_key(|(index, _)| *index);
    Ok(nodes.into_iter().take(limit).map(|(_, path)| path).collect())
}

fn is_slotted_multitouch(device: &Device) -> bool {
    REQUIRED_AXES
        .iter()
        .all(|&axis| device.has_event_code(&abs(axis)))
}

fn slot_count(device: &Device) -> usize {
    device
        .abs_info(&abs(EV_ABS::ABS_MT_SLOT))
        .and_then(|info| usize::try_from(info.maximum).ok())
        .map(|max| max + 1)
        .unwrap_or(FALLBACK_SLOT_COUNT)
}

/// Slot table seeded with contacts already down when the device was opened.
fn seeded_slots(device: &Device) -> SlotTable {
    let mut table = SlotTable::new(slot_count(device));
    for index in 0..table.len() {
        let Ok(raw) = u32::try_from(index) else {
            break;
        };
        let value = |axis| device.slot_value(raw, &abs(axis));
        if let Some(slot) = table.slot_mut(index) {
            slot.tracking_id = value(EV_ABS::ABS_MT_TRACKING_ID).unwrap_or(-1);
            slot.x = value(EV_ABS::ABS_MT_POSITION_X).unwrap_or(0);
            slot.y = value(EV_ABS::ABS_MT_POSITION_Y).unwrap_or(0);
            slot.major = value(EV_ABS::ABS_MT_TOUCH_MAJOR).unwrap_or(0);
        }
    }
    if let Some(info) = device.abs_info(&abs(EV_ABS::ABS_MT_SLOT)) {
        table.select(info.value);
    }
    table
}

fn open_nonblocking(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

fn probe(path: &Path) -> io::Result<Option<ProbedDevice>> {
    let file = open_nonblocking(path)?;
    let fd = file.as_raw_fd();
    let device = Device::new_from_file(file)?;
    if !is_slotted_multitouch(&device) {
        return Ok(None);
    }
    let (Some(x), Some(y)) = (
        device.abs_info(&abs(EV_ABS::ABS_MT_POSITION_X)),
        device.abs_info(&abs(EV_ABS::ABS_MT_POSITION_Y)),
    ) else {
        return Ok(None);
    };

    let name = device.name().unwrap_or("unnamed").to_owned();
    let axes = DeviceAxes::new(
        AxisRange::new(x.minimum, x.maximum),
        AxisRange::new(y.minimum, y.maximum),
    );
    let slots = seeded_slots(&device);
    Ok(Some(ProbedDevice {
        name,
        path: path.to_owned(),
        axes,
        slots,
        source: EvdevSource {
            device,
            fd,
            syncing: false,
        },
    }))
}

/// Open the first slotted multitouch device under `dir`.
pub fn open_first_multitouch(dir: &Path, limit: usize) -> Result<ProbedDevice, TouchError> {
    let nodes = event_nodes(dir, limit).map_err(|err| {
        debug!(dir = %dir.display(), %err, "cannot list input nodes");
        TouchError::NoDevice(dir.to_owned())
    })?;

    for path in nodes {
        match probe(&path) {
            Ok(Some(found)) => {
                debug!(
                    path = %found.path.display(),
                    name = %found.name,
                    slots = found.slots.len(),
                    "selected multitouch device"
                );
                return Ok(found);
            }
            Ok(None) => trace!(path = %path.display(), "not a slotted multitouch device"),
            Err(err) => trace!(path = %path.display(), %err, "cannot open input node"),
        }
    }
    Err(TouchError::NoDevice(dir.to_owned()))
}
