/// Runtime configuration (TOML file plus environment overrides)
pub mod config;

/// Render list abstraction shared with the board controller
pub mod scene;

/// Raster tile cache that flattened ink strokes are baked into
pub mod tiles;

/// Multitouch contact tracking, used as a pen pressure proxy
pub mod touch;

/// Software compositor for scenes and their tiles
pub mod render;

pub use config::Config;
pub use scene::{BoardScene, Drawable, ItemId, SceneGraph, StrokeGroup, StrokePolygon};
pub use tiles::{StrokeFlatteningLayer, TileCoord};
pub use touch::{TouchHandle, TouchService};

// Two threads of interest:
// the UI thread owns the scene and the flattening layer, nothing here is shared across threads;
// the touch poller owns the input device and only shares the slot table, behind a mutex.

// Strokes are the source of truth. Tiles only cache what `rebuild` can regenerate,
// so undo/redo never has to touch tile pixels.
