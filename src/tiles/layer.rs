//! Flattening of finished ink strokes into raster tiles.
//!
//! The vector stroke groups stay in the scene as the source of truth (undo
//! and redo operate on them); tiles are a cache that [`rebuild`] can always
//! regenerate.
//!
//! [`rebuild`]: StrokeFlatteningLayer::rebuild

use tiny_skia::{BlendMode, FillRule, Paint, Path, Pixmap, Rect, Transform};
use tracing::{debug, trace, warn};

use super::{Tile, TileCoord, TileRange, TileStore, tile_rect};
use crate::config::FlattenConfig;
use crate::scene::{Drawable, ItemId, Rasterizable, SceneGraph};

/// Raster tile cache for one scene.
#[derive(Debug)]
pub struct StrokeFlatteningLayer {
    tiles: TileStore,
    enabled: bool,
    anti_alias: bool,
}

impl StrokeFlatteningLayer {
    pub fn new(config: &FlattenConfig) -> Self {
        Self {
            tiles: TileStore::new(config.effective_tile_size()),
            enabled: config.enabled,
            anti_alias: config.anti_alias,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn tile_size(&self) -> u32 {
        self.tiles.tile_size()
    }

    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(coord)
    }

    /// Bake a finished stroke group into tiles and hide the group.
    ///
    /// Ids that are missing or not stroke groups are ignored.
    pub fn flatten_stroke<S>(&mut self, scene: &mut S, group: ItemId)
    where
        S: SceneGraph + ?Sized,
    {
        if !self.enabled {
            return;
        }
        let polygons = match scene.item(group).map(|item| &item.drawable) {
            Some(Drawable::Strokes(strokes)) => strokes.polygons.clone(),
            _ => {
                trace!(?group, "not a stroke group, nothing to flatten");
                return;
            }
        };

        let mut touched = 0;
        for polygon in &polygons {
            touched += self.draw_to_tiles(scene, polygon);
        }
        if let Some(item) = scene.item_mut(group) {
            item.visible = false;
        }
        debug!(?group, polygons = polygons.len(), touched, "flattened stroke");
    }

    /// Punch `eraser` (scene coordinates) out of existing tiles.
    pub fn erase(&mut self, eraser: &Path) {
        if !self.enabled || self.tiles.is_empty() {
            return;
        }
        let size = self.tiles.tile_size();
        let range = TileRange::covering(&eraser.bounds(), size);

        // Big erasers over a sparse board: walk the tiles, not the range
        let coords: Vec<TileCoord> = if range.len() > self.tiles.len() {
            self.tiles.coords().filter(|c| in_range(&range, *c)).collect()
        } else {
            range.iter().filter(|c| self.tiles.contains(*c)).collect()
        };

        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.blend_mode = BlendMode::Clear;

        for coord in coords {
            let (Some(tile), Some(rect)) = (self.tiles.get_mut(coord), tile_rect(coord, size))
            else {
                continue;
            };
            tile.pixmap_mut().fill_path(
                eraser,
                &paint,
                FillRule::Winding,
                Transform::from_translate(-rect.left(), -rect.top()),
                None,
            );
        }
    }

    /// Clear every tile and redraw all stroke polygons in the scene.
    pub fn rebuild<S>(&mut self, scene: &mut S)
    where
        S: SceneGraph + ?Sized,
    {
        if !self.enabled {
            return;
        }
        self.tiles.clear_all();
        let polygons = scene.stroke_polygons();
        for polygon in &polygons {
            self.draw_to_tiles(scene, polygon);
        }
        debug!(
            polygons = polygons.len(),
            tiles = self.tiles.len(),
            "rebuilt stroke tiles"
        );
    }

    /// Paint `shape` into every tile its bounds touch. Returns the tile count.
    fn draw_to_tiles<S, R>(&mut self, scene: &mut S, shape: &R) -> usize
    where
        S: SceneGraph + ?Sized,
        R: Rasterizable,
    {
        let Some(bounds) = shape.scene_bounds() else {
            return 0;
        };
        let size = self.tiles.tile_size();
        let anti_alias = self.anti_alias;

        let mut touched = 0;
        for coord in TileRange::covering(&bounds, size).iter() {
            let Some(rect) = tile_rect(coord, size) else {
                continue;
            };
            let Some(tile) = ensure_tile(&mut self.tiles, scene, coord, rect) else {
                continue;
            };
            let to_tile = Transform::from_translate(-rect.left(), -rect.top());
            shape.rasterize(&mut tile.pixmap_mut().as_mut(), to_tile, anti_alias);
            let item = tile.item();
            raise_above_overlapping(scene, item, &rect);
            touched += 1;
        }
        touched
    }
}

fn in_range(range: &TileRange, coord: TileCoord) -> bool {
    (range.min.x..=range.max.x).contains(&coord.x) && (range.min.y..=range.max.y).contains(&coord.y)
}

fn ensure_tile<'a, S>(
    tiles: &'a mut TileStore,
    scene: &mut S,
    coord: TileCoord,
    rect: Rect,
) -> Option<&'a mut Tile>
where
    S: SceneGraph + ?Sized,
{
    if tiles.contains(coord) {
        return tiles.get_mut(coord);
    }
    let size = tiles.tile_size();
    let Some(pixmap) = Pixmap::new(size, size) else {
        warn!(?coord, size, "cannot allocate stroke tile");
        return None;
    };
    let item = scene.add_item(Drawable::Tile { coord, rect }, 0.0);
    debug!(?coord, ?item, "created stroke tile");
    Some(tiles.insert(coord, Tile::new(pixmap, item)))
}

/// Keep the most recently touched tile above whatever it overlaps.
fn raise_above_overlapping<S>(scene: &mut S, item: ItemId, rect: &Rect)
where
    S: SceneGraph + ?Sized,
{
    let Some(top) = scene.highest_z_overlapping(rect, item) else {
        return;
    };
    if let Some(tile) = scene.item_mut(item) {
        if tile.z <= top {
            tile.z = top + 1.0;
        }
    }
}
