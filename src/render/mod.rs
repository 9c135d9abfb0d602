//! Style-directed tile rendering.
//!
//! [`paint_tiles`] walks the stylesheet back-to-front for every visible
//! tile, emitting draw calls through a host-provided [`Painter`]. Labels
//! are collected during the tile loop and painted in a second,
//! viewport-global pass after collision arbitration.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::color::Color;
use crate::coord::{MAX_ZOOM, TileCoord};
use crate::geometry::{Path, Point, Rect, Size, Transform};
use crate::style::expression::{self, Context, Value};
use crate::style::{Property, StyleKind, StyleSheet};
use crate::tile::{Feature, VectorTile};

mod painter;
mod text;

pub use painter::{Brush, DrawCall, FontMetrics, Painter, Pen, RecordingPainter};

/// Anchor choice for point features carrying more than one point.
///
/// Some tile sources duplicate label anchors for horizontal map
/// wrapping; picking the second point matches their intent.
#[derive(PartialEq, Eq, Copy, Clone, Default, Debug)]
pub enum AnchorPolicy {
    First,
    #[default]
    SecondIfPresent,
}

/// Rendering options.
#[derive(Default, Copy, Clone)]
pub struct PaintOptions {
    /// Draw tile boundaries and coordinates on top of every tile.
    pub debug_boundaries: bool,
    pub anchor_policy: AnchorPolicy,
}

/// Pick the integer map zoom that keeps tiles near a desired pixel size.
pub fn calc_map_zoom_for_tile_size(
    vp_width: u32,
    vp_height: u32,
    vp_zoom: f64,
    desired_tile_size: u32,
) -> u8 {
    let current_tile_size = vp_width.max(vp_height).max(1);
    let desired_scale = desired_tile_size as f64 / current_tile_size as f64;

    let map_zoom = vp_zoom - desired_scale.log2();
    map_zoom.round().clamp(0., MAX_ZOOM as f64) as u8
}

/// Viewport extent in normalized world units.
fn viewport_size_norm(vp_zoom: f64, vp_aspect: f64) -> (f64, f64) {
    let scale = 1. / 2f64.powf(vp_zoom);
    (scale * (1. / vp_aspect).min(1.), scale * vp_aspect.max(1.))
}

/// Compute the tiles whose unit square intersects the viewport.
///
/// The viewport is centered at `(vp_x, vp_y)` in normalized world
/// coordinates with aspect ratio `vp_aspect`, zoomed to `vp_zoom`.
/// Negative map zoom clamps to zero; a viewport entirely outside the
/// world yields no tiles.
pub fn calc_visible_tiles(
    vp_x: f64,
    vp_y: f64,
    vp_aspect: f64,
    vp_zoom: f64,
    map_zoom: i32,
) -> Vec<TileCoord> {
    let map_zoom = map_zoom.clamp(0, MAX_ZOOM as i32) as u8;

    let (vp_width_norm, vp_height_norm) = viewport_size_norm(vp_zoom, vp_aspect);
    let vp_min_x = vp_x - vp_width_norm / 2.;
    let vp_max_x = vp_x + vp_width_norm / 2.;
    let vp_min_y = vp_y - vp_height_norm / 2.;
    let vp_max_y = vp_y + vp_height_norm / 2.;

    // A tile intersects iff its square touches the viewport rectangle:
    // the first tile is the one whose right edge reaches the viewport,
    // the last the one whose left edge still does.
    let tile_count = 1i64 << map_zoom;
    let first = |min: f64| (min * tile_count as f64 - 1.).ceil() as i64;
    let last = |max: f64| (max * tile_count as f64).floor() as i64;

    let (min_x, max_x) = (first(vp_min_x), last(vp_max_x));
    let (min_y, max_y) = (first(vp_min_y), last(vp_max_y));
    if max_x < 0 || max_y < 0 || min_x >= tile_count || min_y >= tile_count {
        return Vec::new();
    }

    let clamp = |tile: i64| tile.clamp(0, tile_count - 1) as u32;
    let mut visible_tiles = Vec::new();
    for y in clamp(min_y)..=clamp(max_y) {
        for x in clamp(min_x)..=clamp(max_x) {
            visible_tiles.push(TileCoord::new(map_zoom, x, y));
        }
    }
    visible_tiles
}

/// Paint all visible tiles and their labels.
///
/// Layer styles paint back-to-front in stylesheet order; label draw
/// order is viewport-global and independent of tile iteration order.
#[allow(clippy::too_many_arguments)]
pub fn paint_tiles<P: Painter + ?Sized>(
    painter: &mut P,
    vp_x: f64,
    vp_y: f64,
    vp_zoom: f64,
    map_zoom: u8,
    tiles: &HashMap<TileCoord, Arc<VectorTile>>,
    sheet: &StyleSheet,
    viewport: Size,
    options: &PaintOptions,
) {
    let vp_aspect = viewport.width as f64 / viewport.height as f64;
    let visible_tiles = calc_visible_tiles(vp_x, vp_y, vp_aspect, vp_zoom, map_zoom as i32);

    let largest_dimension = viewport.width.max(viewport.height) as f64;
    let tile_norm = 2f64.powf(vp_zoom - map_zoom as f64);
    let total_tiles = (1i64 << map_zoom.min(MAX_ZOOM)) as f64;

    // Viewport center offset in normalized tile units.
    let mut center_x = vp_x * total_tiles * tile_norm - 0.5;
    let mut center_y = vp_y * total_tiles * tile_norm - 0.5;
    if viewport.height >= viewport.width {
        center_x += -0.5 * vp_aspect + 0.5;
    } else {
        center_y += -0.5 * (1. / vp_aspect) + 0.5;
    }

    let mut collision_rects = Vec::new();
    let mut labels = Vec::new();

    for coord in visible_tiles {
        let pos_x = ((coord.x as f64 * tile_norm - center_x) * largest_dimension).round();
        let pos_y = ((coord.y as f64 * tile_norm - center_y) * largest_dimension).round();
        let tile_size = (tile_norm * largest_dimension).round() as f32;
        let tile_origin = Point::new(pos_x as f32, pos_y as f32);

        painter.save();
        painter.translate(tile_origin);

        if let Some(tile) = tiles.get(&coord) {
            painter.save();
            painter.clip_rect(Rect::new(0., 0., tile_size, tile_size));
            paint_single_tile(
                painter,
                tile,
                map_zoom,
                vp_zoom,
                sheet,
                tile_size,
                tile_origin,
                options,
                &mut collision_rects,
                &mut labels,
            );
            painter.restore();
        }

        if options.debug_boundaries {
            paint_tile_debug(painter, coord, tile_size);
        }

        painter.restore();
    }

    text::paint_labels(painter, &labels);
}

/// Paint one tile's features for every applicable layer style.
#[allow(clippy::too_many_arguments)]
fn paint_single_tile<P: Painter + ?Sized>(
    painter: &mut P,
    tile: &VectorTile,
    map_zoom: u8,
    vp_zoom: f64,
    sheet: &StyleSheet,
    tile_size: f32,
    tile_origin: Point<f32>,
    options: &PaintOptions,
    collision_rects: &mut Vec<Rect>,
    labels: &mut Vec<text::PendingLabel>,
) {
    let zoom = map_zoom as f32;
    let vp_zoom = vp_zoom as f32;

    for style in &sheet.layers {
        if !style.visible_at(zoom) {
            continue;
        }

        // Background fills the whole tile and has no source layer.
        if let StyleKind::Background(background) = &style.kind {
            let ctx = Context::new(None, zoom, vp_zoom);
            if let Some(color) = background.color.resolve(&ctx).to_color() {
                let opacity = resolve_number(&background.opacity, &ctx, 1.);
                painter
                    .fill_rect(Rect::new(0., 0., tile_size, tile_size), color.scale_alpha(opacity));
            }
            continue;
        }

        let layer = style.source_layer.as_ref().and_then(|name| tile.layers.get(name));
        let Some(layer) = layer else { continue };

        let scale = tile_size / layer.extent.max(1) as f32;
        let transform = Transform::from_scale(scale, scale);

        match &style.kind {
            StyleKind::Fill(fill) => {
                for feature in &layer.features {
                    let Feature::Polygon(polygon) = feature else { continue };

                    let ctx = Context::new(Some(&polygon.meta), zoom, vp_zoom);
                    if !matches_filter(style.filter.as_ref(), &ctx) {
                        continue;
                    }
                    // An unresolvable color leaves the feature invisible.
                    let Some(color) = fill.color.resolve(&ctx).to_color() else { continue };
                    let opacity = resolve_number(&fill.opacity, &ctx, 1.);

                    painter.set_brush(Some(Brush { color: color.scale_alpha(opacity) }));
                    painter.set_pen(None);
                    painter.draw_path(&polygon.path.transformed(&transform));
                }
            },
            StyleKind::Line(line) => {
                for feature in &layer.features {
                    let Feature::Line(line_feature) = feature else { continue };

                    let ctx = Context::new(Some(&line_feature.meta), zoom, vp_zoom);
                    if !matches_filter(style.filter.as_ref(), &ctx) {
                        continue;
                    }
                    let Some(color) = line.color.resolve(&ctx).to_color() else { continue };
                    let width = resolve_number(&line.width, &ctx, 1.);
                    let opacity = resolve_number(&line.opacity, &ctx, 1.);

                    painter.set_pen(Some(Pen { color: color.scale_alpha(opacity), width }));
                    painter.set_brush(None);
                    painter.draw_path(&line_feature.path.transformed(&transform));
                }
            },
            StyleKind::Symbol(symbol) => {
                for feature in &layer.features {
                    let ctx = Context::new(Some(feature.meta()), zoom, vp_zoom);
                    if !matches_filter(style.filter.as_ref(), &ctx) {
                        continue;
                    }

                    match feature {
                        Feature::Point(point) => text::process_point_label(
                            &*painter,
                            symbol,
                            point,
                            &ctx,
                            layer.extent as f32,
                            tile_size,
                            tile_origin,
                            options.anchor_policy,
                            collision_rects,
                            labels,
                        ),
                        Feature::Line(line) => text::process_curved_label(
                            &*painter,
                            symbol,
                            line,
                            &ctx,
                            layer.extent as f32,
                            tile_size,
                            tile_origin,
                            collision_rects,
                            labels,
                        ),
                        Feature::Polygon(_) => (),
                    }
                }
            },
            // Raster imagery draws through the host's image pipeline.
            StyleKind::Raster(_) => (),
            StyleKind::Background(_) => (),
        }
    }
}

/// Check a layer's filter against one feature.
fn matches_filter(filter: Option<&Json>, ctx: &Context) -> bool {
    filter.is_none_or(|filter| expression::resolve(filter, ctx) == Value::Bool(true))
}

/// Resolve a numeric property, falling back when an expression yields a
/// non-number.
pub(crate) fn resolve_number(property: &Property, ctx: &Context, default: f32) -> f32 {
    property.resolve(ctx).as_number().map_or(default, |number| number as f32)
}

/// Tile boundary, diagonal cross, and coordinate label overlay.
fn paint_tile_debug<P: Painter + ?Sized>(painter: &mut P, coord: TileCoord, tile_size: f32) {
    let green = Color::new(0, 255, 0);
    painter.set_brush(None);
    painter.set_pen(Some(Pen { color: green, width: 1. }));

    let mut cross = Path::default();
    cross.move_to(Point::new(0.45 * tile_size, 0.45 * tile_size));
    cross.line_to(Point::new(0.55 * tile_size, 0.55 * tile_size));
    cross.move_to(Point::new(0.55 * tile_size, 0.45 * tile_size));
    cross.line_to(Point::new(0.45 * tile_size, 0.55 * tile_size));
    painter.draw_path(&cross);

    let mut border = Path::default();
    border.move_to(Point::new(0., 0.));
    border.line_to(Point::new(tile_size, 0.));
    border.line_to(Point::new(tile_size, tile_size));
    border.line_to(Point::new(0., tile_size));
    border.close();
    painter.draw_path(&border);

    let label = painter.text_path(&coord.to_string(), 18.);
    painter.set_pen(None);
    painter.set_brush(Some(Brush { color: green }));
    painter.draw_path(&label.transformed(&Transform::from_translate(10., 30.)));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::tile::{Layer, LineFeature, Metadata, PointFeature, PolygonFeature, TagValue};

    #[test]
    fn visible_tiles_cover_viewport() {
        let tiles: BTreeSet<_> = calc_visible_tiles(0.5, 0.5, 1.0, 2.0, 2).into_iter().collect();

        let expected: BTreeSet<_> = [
            TileCoord::new(2, 1, 1),
            TileCoord::new(2, 1, 2),
            TileCoord::new(2, 2, 1),
            TileCoord::new(2, 2, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(tiles, expected);
    }

    #[test]
    fn visible_tiles_clamp_to_grid() {
        // Negative zoom clamps to the single root tile.
        assert_eq!(calc_visible_tiles(0.5, 0.5, 1.0, 0.0, -3), vec![TileCoord::new(0, 0, 0)]);

        // A viewport hugging the top-left corner clamps at the grid edge.
        let tiles = calc_visible_tiles(0.01, 0.01, 1.0, 1.0, 2);
        assert!(tiles.contains(&TileCoord::new(2, 0, 0)));
        assert!(tiles.iter().all(|coord| coord.is_valid(MAX_ZOOM)));
    }

    #[test]
    fn offworld_viewport_is_empty() {
        assert!(calc_visible_tiles(3.0, 0.5, 1.0, 3.0, 2).is_empty());
        assert!(calc_visible_tiles(0.5, -2.0, 1.0, 3.0, 2).is_empty());
    }

    #[test]
    fn map_zoom_for_tile_size() {
        assert_eq!(calc_map_zoom_for_tile_size(1024, 1024, 5.0, 512), 6);
        assert_eq!(calc_map_zoom_for_tile_size(512, 256, 3.0, 512), 3);
        assert_eq!(calc_map_zoom_for_tile_size(1024, 1024, -4.0, 1024), 0);
        assert_eq!(calc_map_zoom_for_tile_size(256, 256, 30.0, 256), MAX_ZOOM);
    }

    fn square_path(origin: f32, size: f32) -> Path {
        let mut path = Path::default();
        path.move_to(Point::new(origin, origin));
        path.line_to(Point::new(origin + size, origin));
        path.line_to(Point::new(origin + size, origin + size));
        path.line_to(Point::new(origin, origin + size));
        path.close();
        path
    }

    fn line_path(points: &[(f32, f32)]) -> Path {
        let mut path = Path::default();
        path.move_to(Point::new(points[0].0, points[0].1));
        for &(x, y) in &points[1..] {
            path.line_to(Point::new(x, y));
        }
        path
    }

    fn string_meta(key: &str, value: &str) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert(key.into(), TagValue::String(value.into()));
        meta
    }

    fn tile_map(layers: Vec<Layer>) -> HashMap<TileCoord, Arc<VectorTile>> {
        let layers = layers.into_iter().map(|layer| (layer.name.clone(), layer)).collect();
        HashMap::from([(TileCoord::new(0, 0, 0), Arc::new(VectorTile { layers }))])
    }

    fn paint(
        sheet: &StyleSheet,
        tiles: &HashMap<TileCoord, Arc<VectorTile>>,
        options: &PaintOptions,
    ) -> RecordingPainter {
        let mut painter = RecordingPainter::new();
        paint_tiles(&mut painter, 0.5, 0.5, 0.0, 0, tiles, sheet, Size::new(256, 256), options);
        painter
    }

    #[test]
    fn styled_feature_dispatch() {
        let sheet = StyleSheet::from_json(&json!({
            "layers": [
                { "id": "bg", "type": "background",
                  "paint": { "background-color": "#102030" } },
                { "id": "water", "type": "fill", "source-layer": "water",
                  "paint": { "fill-color": "#0000ff" } },
                { "id": "roads", "type": "line", "source-layer": "roads",
                  "filter": ["==", ["get", "class"], "motorway"],
                  "paint": { "line-color": "#ff0000", "line-width": 2 } },
                { "id": "landuse", "type": "fill", "source-layer": "absent",
                  "paint": { "fill-color": "#00ff00" } },
            ]
        }))
        .unwrap();

        let tiles = tile_map(vec![
            Layer {
                name: "water".into(),
                extent: 4096,
                features: vec![Feature::Polygon(PolygonFeature {
                    path: square_path(0., 4096.),
                    meta: Metadata::new(),
                })],
            },
            Layer {
                name: "roads".into(),
                extent: 4096,
                features: vec![
                    Feature::Line(LineFeature {
                        path: line_path(&[(0., 2048.), (4096., 2048.)]),
                        meta: string_meta("class", "motorway"),
                    }),
                    Feature::Line(LineFeature {
                        path: line_path(&[(0., 1024.), (4096., 1024.)]),
                        meta: string_meta("class", "footway"),
                    }),
                ],
            },
        ]);

        let painter = paint(&sheet, &tiles, &PaintOptions::default());

        // Background first.
        let DrawCall::FillRect { rect, color } = &painter.calls[0] else {
            panic!("expected background fill");
        };
        assert_eq!(*color, Color::new(16, 32, 48));
        assert_eq!(*rect, Rect::new(0., 0., 256., 256.));

        // One filled polygon, scaled from tile units into the 256px tile.
        let fills = painter.filled_paths(Color::new(0, 0, 255));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].bounds().unwrap(), Rect::new(0., 0., 256., 256.));

        // Only the motorway passes the filter.
        let strokes: Vec<_> = painter
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    DrawCall::Path { pen: Some(pen), .. }
                        if pen.color == Color::new(255, 0, 0) && pen.width == 2.
                )
            })
            .collect();
        assert_eq!(strokes.len(), 1);

        // The style bound to a missing source layer draws nothing.
        assert!(painter.filled_paths(Color::new(0, 255, 0)).is_empty());
    }

    #[test]
    fn unresolvable_color_hides_feature() {
        let sheet = StyleSheet::from_json(&json!({
            "layers": [{
                "id": "water", "type": "fill", "source-layer": "water",
                "paint": { "fill-color": ["get", "missing"] }
            }]
        }))
        .unwrap();

        let tiles = tile_map(vec![Layer {
            name: "water".into(),
            extent: 4096,
            features: vec![Feature::Polygon(PolygonFeature {
                path: square_path(0., 4096.),
                meta: Metadata::new(),
            })],
        }]);

        let painter = paint(&sheet, &tiles, &PaintOptions::default());
        assert!(painter.calls.is_empty());
    }

    fn label_sheet() -> StyleSheet {
        StyleSheet::from_json(&json!({
            "layers": [{
                "id": "labels", "type": "symbol", "source-layer": "labels",
                "layout": { "text-field": "{name}", "text-size": 16 }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn colliding_labels_drop_the_later_one() {
        // Two anchors one pixel apart, a third far away.
        let tiles = tile_map(vec![Layer {
            name: "labels".into(),
            extent: 4096,
            features: vec![
                Feature::Point(PointFeature {
                    points: vec![Point::new(1600., 1600.)],
                    meta: string_meta("name", "LONGWORD"),
                }),
                Feature::Point(PointFeature {
                    points: vec![Point::new(1616., 1600.)],
                    meta: string_meta("name", "LONGWORD"),
                }),
                Feature::Point(PointFeature {
                    points: vec![Point::new(3200., 3200.)],
                    meta: string_meta("name", "LONGWORD"),
                }),
            ],
        }]);

        let painter = paint(&label_sheet(), &tiles, &PaintOptions::default());
        assert_eq!(painter.filled_paths(Color::new(0, 0, 0)).len(), 2);
    }

    #[test]
    fn anchor_policy() {
        // The duplicate-anchor point lies outside the tile under the
        // first-point policy.
        let tiles = tile_map(vec![Layer {
            name: "labels".into(),
            extent: 4096,
            features: vec![Feature::Point(PointFeature {
                points: vec![Point::new(-500., -500.), Point::new(2048., 2048.)],
                meta: string_meta("name", "CENTER"),
            })],
        }]);

        let painter = paint(&label_sheet(), &tiles, &PaintOptions::default());
        assert_eq!(painter.filled_paths(Color::new(0, 0, 0)).len(), 1);

        let options = PaintOptions { anchor_policy: AnchorPolicy::First, ..Default::default() };
        let painter = paint(&label_sheet(), &tiles, &options);
        assert!(painter.filled_paths(Color::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn wrapped_label_stacks_lines() {
        let sheet = StyleSheet::from_json(&json!({
            "layers": [{
                "id": "labels", "type": "symbol", "source-layer": "labels",
                "layout": {
                    "text-field": "{name}",
                    "text-size": 16,
                    "text-max-width": 4
                }
            }]
        }))
        .unwrap();

        let tiles = tile_map(vec![Layer {
            name: "labels".into(),
            extent: 4096,
            features: vec![Feature::Point(PointFeature {
                points: vec![Point::new(2048., 2048.)],
                meta: string_meta("name", "UPPER LOWER"),
            })],
        }]);

        let painter = paint(&sheet, &tiles, &PaintOptions::default());

        // One line path per wrapped line, stacked vertically.
        let paths = painter.filled_paths(Color::new(0, 0, 0));
        assert_eq!(paths.len(), 2);
        let first = paths[0].bounds().unwrap();
        let second = paths[1].bounds().unwrap();
        assert!(second.y > first.y);
    }

    fn street_sheet() -> StyleSheet {
        StyleSheet::from_json(&json!({
            "layers": [{
                "id": "street-labels", "type": "symbol", "source-layer": "streets",
                "layout": { "text-field": "{name}", "text-size": 16 },
                "paint": { "text-halo-width": 2, "text-opacity": 0.5 }
            }]
        }))
        .unwrap()
    }

    fn street_tile(path: Path) -> HashMap<TileCoord, Arc<VectorTile>> {
        tile_map(vec![Layer {
            name: "streets".into(),
            extent: 4096,
            features: vec![Feature::Line(LineFeature {
                path,
                meta: string_meta("name", "main"),
            })],
        }])
    }

    #[test]
    fn curved_label_places_each_character() {
        let tiles = street_tile(line_path(&[(0., 2048.), (4096., 2048.)]));
        let painter = paint(&street_sheet(), &tiles, &PaintOptions::default());

        // Upper-cased text, one glyph path per character, halo pen and
        // text opacity applied.
        let glyphs: Vec<_> = painter
            .calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Path { path, pen: Some(pen), opacity, brush: Some(_) } => {
                    Some((path, pen, opacity))
                },
                _ => None,
            })
            .collect();
        assert_eq!(glyphs.len(), 4);
        for (_, pen, opacity) in &glyphs {
            assert_eq!(pen.width, 4.);
            assert_eq!(**opacity, 0.5);
        }

        // Characters advance along the horizontal path.
        let first = glyphs[0].0.bounds().unwrap();
        let last = glyphs[3].0.bounds().unwrap();
        assert!(last.x > first.x);
    }

    #[test]
    fn reversed_path_flips_text() {
        let tiles = street_tile(line_path(&[(4096., 2048.), (0., 2048.)]));
        let painter = paint(&street_sheet(), &tiles, &PaintOptions::default());

        assert_eq!(painter.filled_paths(Color::new(0, 0, 0)).len(), 4);
    }

    #[test]
    fn sharp_bend_aborts_label() {
        // Right-angle bend 20px along a label that needs ~38px.
        let tiles = street_tile(line_path(&[(0., 0.), (320., 0.), (320., 4096.)]));
        let painter = paint(&street_sheet(), &tiles, &PaintOptions::default());

        assert!(painter.filled_paths(Color::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn short_path_aborts_label() {
        let tiles = street_tile(line_path(&[(0., 2048.), (256., 2048.)]));
        let painter = paint(&street_sheet(), &tiles, &PaintOptions::default());

        assert!(painter.filled_paths(Color::new(0, 0, 0)).is_empty());
    }

    #[test]
    fn zoom_window_skips_layers() {
        let sheet = StyleSheet::from_json(&json!({
            "layers": [{
                "id": "bg", "type": "background", "minzoom": 5,
                "paint": { "background-color": "#ffffff" }
            }]
        }))
        .unwrap();

        let painter = paint(&sheet, &tile_map(Vec::new()), &PaintOptions::default());
        assert!(painter.calls.is_empty());
    }

    #[test]
    fn debug_overlay() {
        let options = PaintOptions { debug_boundaries: true, ..Default::default() };
        let painter = paint(&StyleSheet::default(), &tile_map(Vec::new()), &options);

        let green_strokes = painter
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    DrawCall::Path { pen: Some(pen), .. } if pen.color == Color::new(0, 255, 0)
                )
            })
            .count();
        assert_eq!(green_strokes, 2);

        let labels = painter.filled_paths(Color::new(0, 255, 0));
        assert_eq!(labels.len(), 1);
    }
}
