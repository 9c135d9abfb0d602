//! Decoded vector tiles.
//!
//! [`VectorTile::decode`] turns raw Mapbox Vector Tile bytes into typed
//! source layers and features. Decoding is all-or-nothing: any malformed
//! command stream, dictionary index, or protobuf field fails the whole
//! tile and no partial data is surfaced.

use std::collections::HashMap;

use prost::Message;

use crate::geometry::{FillRule, Path, Point};
use crate::tile::protobuf::GeomType;

pub mod protobuf;

/// Coordinate extent assumed when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("{0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("duplicate source layer {0:?}")]
    DuplicateLayer(String),
    #[error("invalid geometry command id {0}")]
    InvalidCommand(u32),
    #[error("truncated geometry command stream")]
    TruncatedGeometry,
    #[error("path command before the initial MoveTo")]
    MissingStart,
    #[error("line command in point geometry")]
    PointGeometry,
    #[error("feature tag index out of range")]
    TagIndex,
    #[error("feature tag value with no payload")]
    EmptyTagValue,
}

/// Decoded vector tile, keyed by source-layer name.
#[derive(Clone, Default, Debug)]
pub struct VectorTile {
    pub layers: HashMap<String, Layer>,
}

impl VectorTile {
    /// Decode a tile from its wire-format bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw = protobuf::Tile::decode(bytes)?;

        let mut layers = HashMap::with_capacity(raw.layers.len());
        for raw_layer in raw.layers {
            let layer = Layer::decode(raw_layer)?;
            let name = layer.name.clone();
            if layers.insert(name.clone(), layer).is_some() {
                return Err(DecodeError::DuplicateLayer(name));
            }
        }

        Ok(Self { layers })
    }
}

/// Ordered features of one source layer.
#[derive(Clone, Debug)]
pub struct Layer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<Feature>,
}

impl Layer {
    fn decode(raw: protobuf::Layer) -> Result<Self, DecodeError> {
        let mut features = Vec::with_capacity(raw.features.len());

        for feature in &raw.features {
            let meta = decode_tags(&feature.tags, &raw.keys, &raw.values)?;

            let feature = match feature.r#type() {
                // Unknown geometry carries nothing we can render.
                GeomType::Unknown => continue,
                GeomType::Polygon => Feature::Polygon(PolygonFeature {
                    path: decode_path(&feature.geometry, FillRule::NonZero)?,
                    meta,
                }),
                GeomType::Linestring => Feature::Line(LineFeature {
                    path: decode_path(&feature.geometry, FillRule::NonZero)?,
                    meta,
                }),
                GeomType::Point => {
                    Feature::Point(PointFeature { points: decode_points(&feature.geometry)?, meta })
                },
            };
            features.push(feature);
        }

        Ok(Self { name: raw.name, extent: raw.extent, features })
    }
}

/// A single tile feature.
#[derive(Clone, Debug)]
pub enum Feature {
    Polygon(PolygonFeature),
    Line(LineFeature),
    Point(PointFeature),
}

impl Feature {
    /// The feature's metadata tags.
    pub fn meta(&self) -> &Metadata {
        match self {
            Self::Polygon(feature) => &feature.meta,
            Self::Line(feature) => &feature.meta,
            Self::Point(feature) => &feature.meta,
        }
    }
}

/// Filled path in tile-local coordinates, exterior ring first.
#[derive(Clone, Debug)]
pub struct PolygonFeature {
    pub path: Path,
    pub meta: Metadata,
}

/// Poly-line path in tile-local coordinates.
#[derive(Clone, Debug)]
pub struct LineFeature {
    pub path: Path,
    pub meta: Metadata,
}

/// One or more points in tile-local coordinates.
#[derive(Clone, Debug)]
pub struct PointFeature {
    pub points: Vec<Point<f32>>,
    pub meta: Metadata,
}

/// Feature metadata tags.
pub type Metadata = HashMap<String, TagValue>;

/// Scalar metadata value.
#[derive(Clone, PartialEq, Debug)]
pub enum TagValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl TryFrom<&protobuf::Value> for TagValue {
    type Error = DecodeError;

    fn try_from(value: &protobuf::Value) -> Result<Self, Self::Error> {
        let tag_value = if let Some(string) = &value.string_value {
            Self::String(string.clone())
        } else if let Some(float) = value.float_value {
            Self::Number(float as f64)
        } else if let Some(double) = value.double_value {
            Self::Number(double)
        } else if let Some(int) = value.int_value {
            Self::Number(int as f64)
        } else if let Some(uint) = value.uint_value {
            Self::Number(uint as f64)
        } else if let Some(sint) = value.sint_value {
            Self::Number(sint as f64)
        } else if let Some(bool) = value.bool_value {
            Self::Bool(bool)
        } else {
            return Err(DecodeError::EmptyTagValue);
        };

        Ok(tag_value)
    }
}

/// Intern a feature's key/value indices against the layer dictionaries.
fn decode_tags(
    tags: &[u32],
    keys: &[String],
    values: &[protobuf::Value],
) -> Result<Metadata, DecodeError> {
    if tags.len() % 2 != 0 {
        return Err(DecodeError::TagIndex);
    }

    let mut meta = Metadata::with_capacity(tags.len() / 2);
    for chunk in tags.chunks_exact(2) {
        let key = keys.get(chunk[0] as usize).ok_or(DecodeError::TagIndex)?;
        let value = values.get(chunk[1] as usize).ok_or(DecodeError::TagIndex)?;
        meta.insert(key.clone(), TagValue::try_from(value)?);
    }

    Ok(meta)
}

/// Geometry drawing command with zig-zag decoded parameters.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
enum Command {
    MoveTo(i32, i32),
    LineTo(i32, i32),
    ClosePath,
}

/// Decode a geometry command stream.
///
/// Command integers pack an id in the low three bits and a repeat count
/// above; `MoveTo`/`LineTo` consume two zig-zag parameters per repetition.
fn read_commands(geometry: &[u32]) -> Result<Vec<Command>, DecodeError> {
    let mut commands = Vec::new();
    let mut index = 0;

    while index < geometry.len() {
        let command_int = geometry[index];
        let count = command_int >> 3;
        index += 1;

        match command_int & 0x7 {
            id @ (1 | 2) => {
                for _ in 0..count {
                    let parameters =
                        geometry.get(index..index + 2).ok_or(DecodeError::TruncatedGeometry)?;
                    let x = zigzag(parameters[0]);
                    let y = zigzag(parameters[1]);
                    index += 2;

                    match id {
                        1 => commands.push(Command::MoveTo(x, y)),
                        _ => commands.push(Command::LineTo(x, y)),
                    }
                }
            },
            7 => commands.extend(std::iter::repeat_n(Command::ClosePath, count as usize)),
            id => return Err(DecodeError::InvalidCommand(id)),
        }
    }

    Ok(commands)
}

fn zigzag(parameter: u32) -> i32 {
    let parameter = parameter as i32;
    (parameter >> 1) ^ -(parameter & 1)
}

/// Build a path from relative geometry commands.
///
/// The cursor starts at `(0, 0)` and accumulates across subpaths.
fn decode_path(geometry: &[u32], fill_rule: FillRule) -> Result<Path, DecodeError> {
    let mut path = Path::new(fill_rule);
    let (mut x, mut y) = (0i32, 0i32);
    let mut has_subpath = false;

    for command in read_commands(geometry)? {
        match command {
            Command::MoveTo(dx, dy) => {
                x += dx;
                y += dy;
                path.move_to(Point::new(x as f32, y as f32));
                has_subpath = true;
            },
            Command::LineTo(dx, dy) => {
                if !has_subpath {
                    return Err(DecodeError::MissingStart);
                }
                x += dx;
                y += dy;
                path.line_to(Point::new(x as f32, y as f32));
            },
            Command::ClosePath => {
                if !has_subpath {
                    return Err(DecodeError::MissingStart);
                }
                path.close();
            },
        }
    }

    Ok(path)
}

/// Collect the points of a point feature's geometry.
fn decode_points(geometry: &[u32]) -> Result<Vec<Point<f32>>, DecodeError> {
    let commands = read_commands(geometry)?;
    let mut points = Vec::with_capacity(commands.len());
    let (mut x, mut y) = (0i32, 0i32);

    for command in commands {
        match command {
            Command::MoveTo(dx, dy) => {
                x += dx;
                y += dy;
                points.push(Point::new(x as f32, y as f32));
            },
            _ => return Err(DecodeError::PointGeometry),
        }
    }

    Ok(points)
}
