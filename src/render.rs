//! Software compositor for a board scene.

use std::cmp::Ordering;

use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::scene::{Drawable, Rasterizable, SceneGraph};
use crate::tiles::{StrokeFlatteningLayer, tile_rect};

/// Draw the visible items of `scene` into `target` in ascending z.
///
/// `view` maps scene units to target pixels. Stroke groups are drawn as
/// vectors, tiles are blitted from `layer`; foreign items are left to their
/// owners.
pub fn render_scene<S>(
    scene: &S,
    layer: &StrokeFlatteningLayer,
    target: &mut Pixmap,
    view: Transform,
    anti_alias: bool,
) where
    S: SceneGraph + ?Sized,
{
    let mut items: Vec<_> = scene
        .items()
        .filter(|(_, item)| item.visible)
        .map(|(_, item)| item)
        .collect();
    // Stable: equal z keeps enumeration order
    items.sort_by(|a, b| a.z.partial_cmp(&b.z).unwrap_or(Ordering::Equal));

    let tile_size = layer.tile_size();
    for item in items {
        match &item.drawable {
            Drawable::Strokes(group) => {
                for polygon in &group.polygons {
                    polygon.rasterize(&mut target.as_mut(), view, anti_alias);
                }
            }
            Drawable::Tile { coord, .. } => {
                let (Some(tile), Some(rect)) = (layer.tile(*coord), tile_rect(*coord, tile_size))
                else {
                    continue;
                };
                target.draw_pixmap(
                    0,
                    0,
                    tile.pixmap().as_ref(),
                    &PixmapPaint::default(),
                    view.pre_translate(rect.left(), rect.top()),
                    None,
                );
            }
            Drawable::Foreign { .. } => {}
        }
    }
}
