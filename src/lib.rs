//! Client-side vector-map core.
//!
//! This crate bundles the pieces a map host needs between "the user moved
//! the viewport" and "pixels on screen": tile coordinates and URL
//! templating, a Mapbox Vector Tile decoder, a stylesheet model with a
//! data-driven expression evaluator, a three-tier (memory/disk/network)
//! tile loader, and a painter-generic renderer for polygons, lines, and
//! collision-avoiding labels.
//!
//! The window shell, input handling, and the raster backend stay outside;
//! hosts implement [`render::Painter`] and drive [`render::paint_tiles`]
//! with the snapshot returned by [`loader::TileLoader::request_tiles`].

pub mod color;
pub mod coord;
pub mod geometry;
pub mod loader;
pub mod render;
pub mod style;
pub mod tile;

pub use color::Color;
pub use coord::{TileCoord, TileType};
pub use loader::{LoadedTileState, LoaderConfig, RequestHandle, TileLoader};
pub use render::{Painter, calc_visible_tiles, paint_tiles};
pub use style::StyleSheet;
pub use tile::VectorTile;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    AtomicMove(#[from] tempfile::PersistError),
    #[error("{0}")]
    TileDecode(#[from] tile::DecodeError),

    #[error("invalid tile coordinate {0}")]
    InvalidCoord(TileCoord),
    #[error("invalid stylesheet: {0}")]
    BadStylesheet(String),
    #[error("missing user cache directory")]
    MissingCacheDir,
}
