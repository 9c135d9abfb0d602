//! Tile identity and addressing.

use std::fmt::{self, Display, Formatter};

use crate::Error;

/// Maximum tile zoom level.
pub const MAX_ZOOM: u8 = 16;

/// Coordinate uniquely identifying a map tile.
///
/// Valid coordinates satisfy `z <= MAX_ZOOM` and `x, y < 2^z`. Ordering is
/// lexicographic over `(z, x, y)`.
#[derive(Default, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Check that the coordinate addresses a tile within the given zoom
    /// range.
    pub fn is_valid(&self, max_zoom: u8) -> bool {
        let grid = 1u64 << self.z.min(63);
        self.z <= max_zoom && (self.x as u64) < grid && (self.y as u64) < grid
    }

    fn validate(&self, max_zoom: u8) -> Result<(), Error> {
        if self.is_valid(max_zoom) { Ok(()) } else { Err(Error::InvalidCoord(*self)) }
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "z{}x{}y{}", self.z, self.x, self.y)
    }
}

/// Tile payload kinds.
#[derive(Hash, PartialEq, Eq, Copy, Clone, Debug)]
pub enum TileType {
    Vector,
    Raster,
}

impl TileType {
    /// File extension used for this tile type in the disk cache.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Vector => "mvt",
            Self::Raster => "png",
        }
    }
}

/// Substitute a tile coordinate into a URL template.
///
/// The template uses the literal tokens `{z}`, `{x}` and `{y}`; everything
/// else, including any query string, is passed through untouched.
pub fn pbf_url(template: &str, coord: TileCoord) -> Result<String, Error> {
    coord.validate(MAX_ZOOM)?;

    let url = template
        .replace("{z}", &coord.z.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string());

    Ok(url)
}

/// Disk cache path fragment for a tile, relative to the cache root.
pub fn disk_sub_path(coord: TileCoord, tile_type: TileType) -> Result<String, Error> {
    coord.validate(MAX_ZOOM)?;

    Ok(format!("{coord}.{}", tile_type.extension()))
}
