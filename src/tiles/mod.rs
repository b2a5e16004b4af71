//! Sparse grid of raster tiles for flattened ink

mod layer;

use std::collections::HashMap;

use tiny_skia::{Color, Pixmap, Rect};

use crate::scene::ItemId;

pub use layer::StrokeFlatteningLayer;

/// Tile coordinates; tile `(x, y)` covers scene
/// `[x * size, (x + 1) * size) x [y * size, (y + 1) * size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Tile containing the scene point `(x, y)`.
#[inline]
pub fn tile_index_for(x: f32, y: f32, tile_size: u32) -> TileCoord {
    let size = f64::from(tile_size);
    TileCoord {
        x: (f64::from(x) / size).floor() as i32,
        y: (f64::from(y) / size).floor() as i32,
    }
}

/// Scene rect covered by a tile.
#[inline]
pub fn tile_rect(coord: TileCoord, tile_size: u32) -> Option<Rect> {
    let size = i64::from(tile_size);
    Rect::from_xywh(
        (i64::from(coord.x) * size) as f32,
        (i64::from(coord.y) * size) as f32,
        tile_size as f32,
        tile_size as f32,
    )
}

/// Inclusive block of tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min: TileCoord,
    pub max: TileCoord,
}

impl TileRange {
    /// Tiles touched by `bounds`, corners included.
    pub fn covering(bounds: &Rect, tile_size: u32) -> Self {
        Self {
            min: tile_index_for(bounds.left(), bounds.top(), tile_size),
            max: tile_index_for(bounds.right(), bounds.bottom(), tile_size),
        }
    }

    pub fn len(&self) -> usize {
        let w = i64::from(self.max.x) - i64::from(self.min.x) + 1;
        let h = i64::from(self.max.y) - i64::from(self.min.y) + 1;
        usize::try_from(w.max(0) * h.max(0)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major walk over the block.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| TileCoord { x, y }))
    }
}

/// One cached raster tile.
#[derive(Debug)]
pub struct Tile {
    pixmap: Pixmap,
    item: ItemId,
}

impl Tile {
    pub fn new(pixmap: Pixmap, item: ItemId) -> Self {
        Self { pixmap, item }
    }

    /// Fully transparent square tile; `None` if the size cannot be allocated.
    pub fn blank(tile_size: u32, item: ItemId) -> Option<Self> {
        Some(Self::new(Pixmap::new(tile_size, tile_size)?, item))
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Scene item standing in for this tile.
    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|p| p.alpha() == 0)
    }
}

/// Tiles by coordinate. Tiles are never evicted.
#[derive(Debug)]
pub struct TileStore {
    tile_size: u32,
    tiles: HashMap<TileCoord, Tile>,
}

impl TileStore {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            tiles: HashMap::new(),
        }
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn get_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.tiles.get_mut(&coord)
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.contains_key(&coord)
    }

    pub(crate) fn insert(&mut self, coord: TileCoord, tile: Tile) -> &mut Tile {
        self.tiles.entry(coord).or_insert(tile)
    }

    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.tiles.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &Tile)> {
        self.tiles.iter().map(|(c, t)| (*c, t))
    }

    /// Make every tile fully transparent.
    pub fn clear_all(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_index_floors_negative() {
        assert_eq!(tile_index_for(0.0, 0.0, 256), TileCoord::new(0, 0));
        assert_eq!(tile_index_for(255.9, 256.0, 256), TileCoord::new(0, 1));
        assert_eq!(tile_index_for(-0.5, -256.0, 256), TileCoord::new(-1, -1));
        assert_eq!(tile_index_for(-256.5, 1000.0, 256), TileCoord::new(-2, 3));
    }

    #[test]
    fn test_tile_rect_origin_and_size() {
        for &(x, y) in &[(0, 0), (3, -2), (-7, 11)] {
            let r = tile_rect(TileCoord::new(x, y), 1024).unwrap();
            assert_eq!(r.left(), (x * 1024) as f32);
            assert_eq!(r.top(), (y * 1024) as f32);
            assert_eq!(r.width(), 1024.0);
            assert_eq!(r.height(), 1024.0);
        }
    }

    #[test]
    fn test_range_spanning_origin_is_3x3() {
        let bounds = Rect::from_ltrb(-10.0, -10.0, 1030.0, 1030.0).unwrap();
        let range = TileRange::covering(&bounds, 1024);
        assert_eq!(range.min, TileCoord::new(-1, -1));
        assert_eq!(range.max, TileCoord::new(1, 1));
        assert_eq!(range.len(), 9);

        let coords: Vec<_> = range.iter().collect();
        assert_eq!(coords.len(), 9);
        assert_eq!(coords[0], TileCoord::new(-1, -1));
        assert_eq!(coords[1], TileCoord::new(0, -1));
        assert_eq!(coords[8], TileCoord::new(1, 1));
    }

    #[test]
    fn test_range_inside_one_tile() {
        let bounds = Rect::from_ltrb(10.0, 10.0, 20.0, 20.0).unwrap();
        let range = TileRange::covering(&bounds, 256);
        assert_eq!(range.iter().collect::<Vec<_>>(), [TileCoord::new(0, 0)]);
    }

    #[test]
    fn test_new_tile_is_transparent() {
        use crate::scene::{BoardScene, Drawable, SceneGraph};
        let mut scene = BoardScene::new();
        let bounds = tile_rect(TileCoord::new(0, 0), 129).unwrap();
        let item = scene.add_item(Drawable::Foreign { bounds }, 0.0);

        let tile = Tile::blank(129, item).unwrap();
        assert!(tile.is_blank());
        assert_eq!(tile.pixmap().width(), 129);
        assert_eq!(tile.item(), item);
    }
}
