use num_enum::FromPrimitive;

/// `EV_ABS` event type number.
pub const EV_ABS: u16 = 0x03;

/// Multitouch absolute axis codes the tracker cares about.
///
/// Values are the kernel's `ABS_MT_*` codes, so raw `(type, code, value)`
/// triples can be decoded without going through a device library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum MtCode {
    Slot = 0x2f,
    TouchMajor = 0x30,
    PositionX = 0x35,
    PositionY = 0x36,
    TrackingId = 0x39,
    #[num_enum(default)]
    Other,
}

/// One decoded multitouch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    /// Selects the slot subsequent events apply to.
    Slot(i32),
    PositionX(i32),
    PositionY(i32),
    TouchMajor(i32),
    /// `-1` lifts the contact in the current slot.
    TrackingId(i32),
    /// Sync reports, keys, and axes the tracker ignores.
    Unknown,
}

impl Default for TouchEvent {
    fn default() -> Self {
        Self::Unknown
    }
}

impl TouchEvent {
    /// Decode a raw kernel input event.
    pub fn from_raw(event_type: u16, code: u16, value: i32) -> Self {
        if event_type != EV_ABS {
            return Self::Unknown;
        }
        match MtCode::from_primitive(code) {
            MtCode::Slot => Self::Slot(value),
            MtCode::TouchMajor => Self::TouchMajor(value),
            MtCode::PositionX => Self::PositionX(value),
            MtCode::PositionY => Self::PositionY(value),
            MtCode::TrackingId => Self::TrackingId(value),
            MtCode::Other => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mt_axes() {
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x2f, 3), TouchEvent::Slot(3));
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x35, 120), TouchEvent::PositionX(120));
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x36, 80), TouchEvent::PositionY(80));
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x30, 9), TouchEvent::TouchMajor(9));
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x39, -1), TouchEvent::TrackingId(-1));
    }

    #[test]
    fn test_decode_ignores_other_events() {
        // EV_SYN / SYN_REPORT
        assert_eq!(TouchEvent::from_raw(0x00, 0x00, 0), TouchEvent::Unknown);
        // ABS_X (single-touch axis) is not part of the slotted protocol
        assert_eq!(TouchEvent::from_raw(EV_ABS, 0x00, 10), TouchEvent::Unknown);
        // EV_KEY with an ABS_MT_SLOT-looking code
        assert_eq!(TouchEvent::from_raw(0x01, 0x2f, 1), TouchEvent::Unknown);
    }
}
