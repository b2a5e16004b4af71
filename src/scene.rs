//! The board's render list, as seen by the ink core.
//!
//! The full application owns far more item kinds than the core cares about;
//! anything that is neither ink nor a tile is a [`Drawable::Foreign`] with a
//! bounding box, which is all z-ordering needs.

use tiny_skia::{BlendMode, Color, FillRule, Paint, Path, PathBuilder, PixmapMut, Rect, Transform};

use crate::tiles::TileCoord;

/// Stable identifier of a scene item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

/// Geometry that can be baked into a raster.
pub trait Rasterizable {
    /// Bounds after the item's own scene transform.
    fn scene_bounds(&self) -> Option<Rect>;

    /// Paint into `target`, where `to_target` maps scene to target pixels.
    fn rasterize(&self, target: &mut PixmapMut<'_>, to_target: Transform, anti_alias: bool);
}

/// One filled polygon of an ink stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePolygon {
    /// Vertices in item-local coordinates; the polygon closes implicitly.
    pub points: Vec<(f32, f32)>,
    pub fill: Color,
    /// Full item-to-scene transform.
    pub transform: Transform,
}

impl StrokePolygon {
    pub fn new(points: Vec<(f32, f32)>, fill: Color) -> Self {
        Self {
            points,
            fill,
            transform: Transform::identity(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn path(&self) -> Option<Path> {
        let (first, rest) = self.points.split_first()?;
        let mut pb = PathBuilder::new();
        pb.move_to(first.0, first.1);
        for &(x, y) in rest {
            pb.line_to(x, y);
        }
        pb.close();
        pb.finish()
    }
}

impl Rasterizable for StrokePolygon {
    fn scene_bounds(&self) -> Option<Rect> {
        Some(self.path()?.transform(self.transform)?.bounds())
    }

    fn rasterize(&self, target: &mut PixmapMut<'_>, to_target: Transform, anti_alias: bool) {
        let Some(path) = self.path() else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(self.fill);
        paint.anti_alias = anti_alias;
        paint.blend_mode = BlendMode::SourceOver;
        target.fill_path(
            &path,
            &paint,
            FillRule::EvenOdd,
            to_target.pre_concat(self.transform),
            None,
        );
    }
}

/// A finished ink stroke: the polygons that make it up, in paint order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeGroup {
    pub polygons: Vec<StrokePolygon>,
}

impl StrokeGroup {
    pub fn new(polygons: Vec<StrokePolygon>) -> Self {
        Self { polygons }
    }

    pub fn scene_bounds(&self) -> Option<Rect> {
        self.polygons
            .iter()
            .filter_map(Rasterizable::scene_bounds)
            .reduce(union)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    Strokes(StrokeGroup),
    /// A flattened tile; pixels live in the flattening layer's tile store.
    Tile { coord: TileCoord, rect: Rect },
    /// Anything else on the board (images, text, widgets).
    Foreign { bounds: Rect },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    pub drawable: Drawable,
    pub z: f32,
    pub visible: bool,
}

impl SceneItem {
    pub fn bounds(&self) -> Option<Rect> {
        match &self.drawable {
            Drawable::Strokes(group) => group.scene_bounds(),
            Drawable::Tile { rect, .. } => Some(*rect),
            Drawable::Foreign { bounds } => Some(*bounds),
        }
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    Rect::from_ltrb(
        a.left().min(b.left()),
        a.top().min(b.top()),
        a.right().max(b.right()),
        a.bottom().max(b.bottom()),
    )
    .unwrap_or(a)
}

/// Interiors intersect; touching edges do not count.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.left() < b.right() && b.left() < a.right() && a.top() < b.bottom() && b.top() < a.bottom()
}

/// Insertion and enumeration of drawable items.
pub trait SceneGraph {
    fn add_item(&mut self, drawable: Drawable, z: f32) -> ItemId;

    fn item(&self, id: ItemId) -> Option<&SceneItem>;

    fn item_mut(&mut self, id: ItemId) -> Option<&mut SceneItem>;

    /// All items in enumeration order.
    fn items(&self) -> Box<dyn Iterator<Item = (ItemId, &SceneItem)> + '_>;

    /// Every stroke polygon in the scene, hidden groups included.
    fn stroke_polygons(&self) -> Vec<StrokePolygon> {
        self.items()
            .filter_map(|(_, item)| match &item.drawable {
                Drawable::Strokes(group) => Some(group.polygons.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Highest z among visible items other than `exclude` overlapping `rect`.
    fn highest_z_overlapping(&self, rect: &Rect, exclude: ItemId) -> Option<f32> {
        self.items()
            .filter(|(id, item)| *id != exclude && item.visible)
            .filter(|(_, item)| item.bounds().is_some_and(|b| overlaps(&b, rect)))
            .map(|(_, item)| item.z)
            .reduce(f32::max)
    }
}

/// In-memory render list.
#[derive(Debug, Default)]
pub struct BoardScene {
    items: Vec<(ItemId, SceneItem)>,
    next_id: u64,
}

impl BoardScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stroke(&mut self, group: StrokeGroup, z: f32) -> ItemId {
        self.add_item(Drawable::Strokes(group), z)
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<SceneItem> {
        let index = self.items.iter().position(|(i, _)| *i == id)?;
        Some(self.items.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tile_items(&self) -> impl Iterator<Item = (ItemId, TileCoord)> + '_ {
        self.items.iter().filter_map(|(id, item)| match item.drawable {
            Drawable::Tile { coord, .. } => Some((*id, coord)),
            _ => None,
        })
    }
}

impl SceneGraph for BoardScene {
    fn add_item(&mut self, drawable: Drawable, z: f32) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.push((
            id,
            SceneItem {
                drawable,
                z,
                visible: true,
            },
        ));
        id
    }

    fn item(&self, id: ItemId) -> Option<&SceneItem> {
        self.items.iter().find(|(i, _)| *i == id).map(|(_, item)| item)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut SceneItem> {
        self.items
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, item)| item)
    }

    fn items(&self) -> Box<dyn Iterator<Item = (ItemId, &SceneItem)> + '_> {
        Box::new(self.items.iter().map(|(id, item)| (*id, item)))
    }
}
