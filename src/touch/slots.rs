use serde::{Deserialize, Serialize};

use super::event::TouchEvent;
use super::screen::{ScreenPoint, ScreenRect};

/// Slot count used when the device does not report `ABS_MT_SLOT` bounds.
pub const FALLBACK_SLOT_COUNT: usize = 16;

/// One multitouch contact slot, in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSlot {
    pub x: i32,
    pub y: i32,
    /// Major axis of the contact ellipse.
    pub major: i32,
    /// `>= 0` while a contact is down, `-1` when the slot is free.
    pub tracking_id: i32,
}

impl Default for ContactSlot {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            major: 0,
            tracking_id: -1,
        }
    }
}

impl ContactSlot {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.tracking_id >= 0
    }
}

/// Device-unit bounds of one absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn span(&self) -> f64 {
        f64::from(self.max) - f64::from(self.min)
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }
}

/// X and Y position ranges captured at device initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAxes {
    pub x: AxisRange,
    pub y: AxisRange,
}

impl DeviceAxes {
    pub fn new(x: AxisRange, y: AxisRange) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        !self.x.is_degenerate() && !self.y.is_degenerate()
    }
}

/// Per-axis conversion between one screen and the device.
#[derive(Debug, Clone, Copy)]
struct AxisMapping {
    origin_px: f64,
    min_units: f64,
    /// Device units per screen pixel.
    units_per_px: f64,
}

impl AxisMapping {
    fn new(origin_px: i32, pixels: u32, range: AxisRange) -> Option<Self> {
        if pixels == 0 || range.is_degenerate() {
            return None;
        }
        Some(Self {
            origin_px: f64::from(origin_px),
            min_units: f64::from(range.min),
            units_per_px: range.span() / f64::from(pixels),
        })
    }

    #[inline]
    fn to_device(self, px: f64) -> f64 {
        self.min_units + (px - self.origin_px) * self.units_per_px
    }

    #[inline]
    fn length_to_device(self, px: f64) -> f64 {
        px * self.units_per_px
    }

    #[inline]
    fn length_to_screen(self, units: f64) -> f64 {
        units / self.units_per_px
    }
}

/// Maps a screen-space point and radius into device space.
#[derive(Debug, Clone, Copy)]
pub struct ScreenToDevice {
    x: AxisMapping,
    y: AxisMapping,
}

impl ScreenToDevice {
    /// `None` if the screen has no area or the axes are degenerate.
    pub fn new(axes: &DeviceAxes, screen: &ScreenRect) -> Option<Self> {
        Some(Self {
            x: AxisMapping::new(screen.x, screen.width, axes.x)?,
            y: AxisMapping::new(screen.y, screen.height, axes.y)?,
        })
    }

    pub fn point(&self, point: ScreenPoint) -> (f64, f64) {
        (self.x.to_device(point.x), self.y.to_device(point.y))
    }

    /// Radius in device units along each axis.
    pub fn radii(&self, radius_px: f64) -> (f64, f64) {
        let r = radius_px.max(0.0);
        (self.x.length_to_device(r), self.y.length_to_device(r))
    }

    /// Device length back to screen pixels, using the X axis ratio.
    pub fn major_to_screen(&self, major: i32) -> u32 {
        let px = self.x.length_to_screen(f64::from(major.max(0))).round();
        px.min(f64::from(u32::MAX)) as u32
    }
}

fn within_ellipse(dx: f64, dy: f64, rx: f64, ry: f64) -> bool {
    if rx <= 0.0 || ry <= 0.0 {
        return dx.abs() <= f64::EPSILON && dy.abs() <= f64::EPSILON;
    }
    let nx = dx / rx;
    let ny = dy / ry;
    nx * nx + ny * ny <= 1.0
}

/// Fixed-size slot table driven by the type-B multitouch protocol.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<ContactSlot>,
    current: usize,
}

impl SlotTable {
    /// Allocate `count` free slots; a zero count falls back to
    /// [`FALLBACK_SLOT_COUNT`].
    pub fn new(count: usize) -> Self {
        let count = if count == 0 { FALLBACK_SLOT_COUNT } else { count };
        Self {
            slots: vec![ContactSlot::default(); count],
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slot(&self, index: usize) -> Option<&ContactSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ContactSlot> {
        self.slots.get_mut(index)
    }

    /// Select the slot subsequent axis events apply to.
    ///
    /// Out-of-range selectors land on slot 0.
    pub fn select(&mut self, index: i32) {
        self.current = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.slots.len())
            .unwrap_or(0);
    }

    pub fn apply(&mut self, event: TouchEvent) {
        if let TouchEvent::Slot(index) = event {
            self.select(index);
            return;
        }
        let slot = &mut self.slots[self.current];
        match event {
            TouchEvent::PositionX(v) => slot.x = v,
            TouchEvent::PositionY(v) => slot.y = v,
            TouchEvent::TouchMajor(v) => slot.major = v,
            TouchEvent::TrackingId(v) => slot.tracking_id = v,
            TouchEvent::Slot(_) | TouchEvent::Unknown => {}
        }
    }

    /// Active slots with their indices.
    pub fn active(&self) -> impl Iterator<Item = (usize, &ContactSlot)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.is_active())
    }

    /// Largest contact-major among active contacts inside the ellipse of
    /// `radius_px` around `point`, in screen pixels. `0` if none.
    ///
    /// Ties keep the lowest slot index.
    pub fn largest_major_near(
        &self,
        mapping: &ScreenToDevice,
        point: ScreenPoint,
        radius_px: f64,
    ) -> u32 {
        let (tx, ty) = mapping.point(point);
        let (rx, ry) = mapping.radii(radius_px);

        let mut best: Option<i32> = None;
        for (_, slot) in self.active() {
            let dx = f64::from(slot.x) - tx;
            let dy = f64::from(slot.y) - ty;
            if !within_ellipse(dx, dy, rx, ry) {
                continue;
            }
            if best.is_none_or(|b| slot.major > b) {
                best = Some(slot.major);
            }
        }
        best.map_or(0, |major| mapping.major_to_screen(major))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_axes(max: i32) -> DeviceAxes {
        DeviceAxes::new(AxisRange::new(0, max), AxisRange::new(0, max))
    }

    fn touch(table: &mut SlotTable, slot: i32, id: i32, x: i32, y: i32, major: i32) {
        table.apply(TouchEvent::Slot(slot));
        table.apply(TouchEvent::TrackingId(id));
        table.apply(TouchEvent::PositionX(x));
        table.apply(TouchEvent::PositionY(y));
        table.apply(TouchEvent::TouchMajor(major));
    }

    #[test]
    fn test_point_maps_to_device_units() {
        let axes = square_axes(4095);
        let screen = ScreenRect::new(0, 0, 1024, 768);
        let mapping = ScreenToDevice::new(&axes, &screen).unwrap();
        let (x, _) = mapping.point(ScreenPoint::new(512.0, 0.0));
        assert!((x - 2048.0).abs() <= 1.0, "got {x}");
    }

    #[test]
    fn test_axes_scale_independently() {
        let axes = DeviceAxes::new(AxisRange::new(0, 2000), AxisRange::new(100, 600));
        let screen = ScreenRect::new(0, 0, 1000, 1000);
        let mapping = ScreenToDevice::new(&axes, &screen).unwrap();
        let (x, y) = mapping.point(ScreenPoint::new(500.0, 500.0));
        assert_eq!(x, 1000.0);
        assert_eq!(y, 350.0);
        let (rx, ry) = mapping.radii(10.0);
        assert_eq!(rx, 20.0);
        assert_eq!(ry, 5.0);
    }

    #[test]
    fn test_mapping_uses_screen_origin() {
        let axes = square_axes(1000);
        let screen = ScreenRect::new(1920, 0, 1000, 1000);
        let mapping = ScreenToDevice::new(&axes, &screen).unwrap();
        let (x, _) = mapping.point(ScreenPoint::new(2420.0, 0.0));
        assert_eq!(x, 500.0);
    }

    #[test]
    fn test_degenerate_axes_have_no_mapping() {
        let screen = ScreenRect::new(0, 0, 100, 100);
        let flat = DeviceAxes::new(AxisRange::new(0, 0), AxisRange::new(0, 100));
        assert!(!flat.is_valid());
        assert!(ScreenToDevice::new(&flat, &screen).is_none());
        let no_area = ScreenRect::new(0, 0, 0, 100);
        assert!(ScreenToDevice::new(&square_axes(100), &no_area).is_none());
    }

    #[test]
    fn test_single_contact_scenario() {
        let mapping =
            ScreenToDevice::new(&square_axes(1000), &ScreenRect::new(0, 0, 1000, 1000)).unwrap();
        let mut table = SlotTable::new(10);
        touch(&mut table, 0, 7, 500, 500, 50);

        let size = table.largest_major_near(&mapping, ScreenPoint::new(500.0, 500.0), 50.0);
        assert_eq!(size, 50);
    }

    #[test]
    fn test_lifted_contact_is_ignored() {
        let mapping =
            ScreenToDevice::new(&square_axes(1000), &ScreenRect::new(0, 0, 1000, 1000)).unwrap();
        let mut table = SlotTable::new(4);
        touch(&mut table, 1, 3, 500, 500, 80);
        table.apply(TouchEvent::TrackingId(-1));

        assert_eq!(
            table.largest_major_near(&mapping, ScreenPoint::new(500.0, 500.0), 1000.0),
            0
        );
    }

    #[test]
    fn test_largest_major_wins() {
        let mapping =
            ScreenToDevice::new(&square_axes(1000), &ScreenRect::new(0, 0, 1000, 1000)).unwrap();
        let mut table = SlotTable::new(4);
        touch(&mut table, 0, 1, 500, 500, 20);
        touch(&mut table, 1, 2, 520, 510, 60);
        touch(&mut table, 2, 3, 900, 900, 200);

        // The 200-major contact is far outside the radius
        let size = table.largest_major_near(&mapping, ScreenPoint::new(500.0, 500.0), 40.0);
        assert_eq!(size, 60);
    }

    #[test]
    fn test_ellipse_uses_per_axis_radii() {
        // X: 2 units/px, Y: 0.5 units/px
        let axes = DeviceAxes::new(AxisRange::new(0, 2000), AxisRange::new(0, 500));
        let mapping = ScreenToDevice::new(&axes, &ScreenRect::new(0, 0, 1000, 1000)).unwrap();
        let mut table = SlotTable::new(2);
        // 10px right of the query point in screen space
        touch(&mut table, 0, 1, 1020, 250, 40);

        let p = ScreenPoint::new(500.0, 500.0);
        assert_eq!(table.largest_major_near(&mapping, p, 9.0), 0);
        // Major converts back with the X ratio: 40 units / 2 = 20px
        assert_eq!(table.largest_major_near(&mapping, p, 11.0), 20);
    }

    #[test]
    fn test_out_of_range_slot_clamps_to_zero() {
        let mut table = SlotTable::new(2);
        table.apply(TouchEvent::Slot(1));
        assert_eq!(table.current_slot(), 1);
        table.apply(TouchEvent::Slot(5));
        assert_eq!(table.current_slot(), 0);
        table.apply(TouchEvent::PositionX(42));
        assert_eq!(table.slot(0).unwrap().x, 42);
        table.apply(TouchEvent::Slot(-3));
        assert_eq!(table.current_slot(), 0);
    }

    #[test]
    fn test_zero_slot_count_uses_fallback() {
        let table = SlotTable::new(0);
        assert_eq!(table.len(), FALLBACK_SLOT_COUNT);
        assert_eq!(table.active().count(), 0);
    }
}
