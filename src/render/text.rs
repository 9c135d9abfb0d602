//! Label layout and collision handling.
//!
//! Symbol layers produce two label shapes: axis-aligned text anchored on
//! point features (word-wrapped and centered) and curved text following
//! line features glyph by glyph. Both negotiate a viewport-global
//! collision list before they are queued; queued labels are painted in a
//! second pass so draw order does not depend on tile iteration order.

use std::mem;

use crate::color::Color;
use crate::geometry::{Path, PathMeasure, Point, Rect, Transform};
use crate::render::painter::{Brush, Painter, Pen};
use crate::render::{AnchorPolicy, resolve_number};
use crate::style::expression::{self, Context, Value};
use crate::style::{PropertyValue, SymbolStyle};
use crate::tile::{LineFeature, PointFeature, TagValue};

/// Label queued for the viewport-global paint pass.
pub(super) struct PendingLabel {
    /// Parent tile's origin in viewport pixels.
    origin: Point<f32>,
    /// Glyph outline paths in tile-local pixels.
    paths: Vec<Path>,
    color: Color,
    opacity: f32,
    halo_color: Color,
    halo_width: f32,
}

/// Resolve a symbol layer's label text.
///
/// Expression-valued text fields evaluate against the feature; constant
/// strings are `{key}` references into the feature metadata.
fn text_content(style: &SymbolStyle, ctx: &Context) -> String {
    let Some(field) = &style.text_field else {
        return String::new();
    };

    match field.at_zoom(ctx.map_zoom) {
        PropertyValue::Expression(expression) => {
            match expression::resolve(expression, ctx) {
                Value::String(text) => text,
                Value::Number(number) => format_number(number),
                _ => String::new(),
            }
        },
        PropertyValue::Value(Value::String(reference)) => {
            let key: String =
                reference.chars().filter(|&char| char != '{' && char != '}').collect();
            match ctx.meta.and_then(|meta| meta.get(&key)) {
                Some(TagValue::String(text)) => text.clone(),
                Some(TagValue::Number(number)) => format_number(*number),
                Some(TagValue::Bool(bool)) => bool.to_string(),
                None => String::new(),
            }
        },
        PropertyValue::Value(_) => String::new(),
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0. { format!("{number:.0}") } else { number.to_string() }
}

fn overlaps(rect: &Rect, rects: &[Rect]) -> bool {
    rects.iter().any(|other| other.intersects(rect))
}

/// Greedy word wrap against `max_width` (in ems of the font size).
fn wrap_text<P: Painter + ?Sized>(
    painter: &P,
    text: &str,
    font_size: f32,
    max_width: f32,
) -> Vec<String> {
    let width_limit = font_size * max_width;
    if painter.text_advance(text, font_size) <= width_limit {
        return vec![text.into()];
    }

    let mut words = text.split(' ');
    let mut current = words.next().unwrap_or_default().to_string();
    let mut lines = Vec::new();
    for word in words {
        let candidate = format!("{current} {word}");
        if painter.text_advance(&candidate, font_size) > width_limit {
            lines.push(mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    lines.push(current);
    lines
}

/// Lay out an axis-aligned label anchored on a point feature.
///
/// The wrapped line block is centered on the anchor; the label is
/// dropped entirely when its halo-inflated bounds collide with an
/// earlier label.
#[allow(clippy::too_many_arguments)]
pub(super) fn process_point_label<P: Painter + ?Sized>(
    painter: &P,
    style: &SymbolStyle,
    feature: &PointFeature,
    ctx: &Context,
    extent: f32,
    tile_size: f32,
    tile_origin: Point<f32>,
    anchor_policy: AnchorPolicy,
    collision_rects: &mut Vec<Rect>,
    labels: &mut Vec<PendingLabel>,
) {
    let text = text_content(style, ctx);
    if text.is_empty() {
        return;
    }

    let Some(color) = style.text_color.resolve(ctx).to_color() else {
        return;
    };
    let font_size = resolve_number(&style.text_size, ctx, 16.);
    let opacity = resolve_number(&style.text_opacity, ctx, 1.);
    let max_width = resolve_number(&style.text_max_width, ctx, 10.);
    let halo_width = resolve_number(&style.text_halo_width, ctx, 0.);
    let halo_color =
        style.text_halo_color.resolve(ctx).to_color().unwrap_or(Color::with_alpha(0, 0, 0, 0));

    // Point features occasionally carry extra points; the anchor choice
    // is a policy knob.
    let anchor = match anchor_policy {
        AnchorPolicy::SecondIfPresent if feature.points.len() > 1 => feature.points[1],
        _ => match feature.points.first() {
            Some(point) => *point,
            None => return,
        },
    };
    let anchor = anchor * (tile_size / extent);
    if anchor.x < 0. || anchor.x > tile_size || anchor.y < 0. || anchor.y > tile_size {
        return;
    }

    let lines = wrap_text(painter, &text, font_size, max_width);
    let line_height = painter.font_metrics(font_size).height();
    let line_count = lines.len() as f32;

    let mut paths = Vec::with_capacity(lines.len());
    let mut total_bounds: Option<Rect> = None;
    for (i, line) in lines.iter().enumerate() {
        let path = painter.text_path(line, font_size);
        let Some(bounds) = path.bounds() else { continue };
        let bounds = bounds.inflated(halo_width);

        // Center each line on the anchor, stacking the block vertically.
        let offset = Point::new(
            anchor.x - bounds.width / 2.,
            anchor.y + bounds.height / 2. + (i as f32 - line_count / 2.) * line_height,
        );

        paths.push(path.transformed(&Transform::from_translate(offset.x, offset.y)));
        let bounds = bounds.translate(offset);
        total_bounds = Some(match total_bounds {
            Some(total) => total.united(&bounds),
            None => bounds,
        });
    }
    let Some(total_bounds) = total_bounds else { return };

    // Collision is arbitrated in world coordinates shared by all tiles.
    let global_rect = Rect::new(
        tile_origin.x + anchor.x - total_bounds.width / 2.,
        tile_origin.y + anchor.y - total_bounds.height / 2.,
        total_bounds.width,
        total_bounds.height,
    );
    if overlaps(&global_rect, collision_rects) {
        return;
    }
    collision_rects.push(global_rect);

    labels.push(PendingLabel {
        origin: tile_origin,
        paths,
        color,
        opacity,
        halo_color,
        halo_width,
    });
}

/// Text reads left-to-right, so labels starting against the path
/// direction are laid out from the last character.
fn is_flipped(angle: f32) -> bool {
    angle > 90. && angle < 270.
}

/// Total advance of a label, including letter spacing within words.
fn total_advance<P: Painter + ?Sized>(
    painter: &P,
    text: &str,
    font_size: f32,
    spacing: f32,
) -> f32 {
    let words: Vec<&str> = text.split(' ').collect();
    let space_advance = painter.text_advance(" ", font_size);

    let mut total = (words.len().saturating_sub(1)) as f32 * space_advance;
    for word in &words {
        total += painter.text_advance(word, font_size) + spacing * word.chars().count() as f32;
    }
    total
}

/// Lay out a curved label along a line feature.
///
/// Characters walk the path by cumulative advance, each rotated to the
/// local tangent. The label aborts without partial output when the path
/// is too short or bends more than the configured max angle between
/// adjacent characters.
#[allow(clippy::too_many_arguments)]
pub(super) fn process_curved_label<P: Painter + ?Sized>(
    painter: &P,
    style: &SymbolStyle,
    feature: &LineFeature,
    ctx: &Context,
    extent: f32,
    tile_size: f32,
    tile_origin: Point<f32>,
    collision_rects: &mut Vec<Rect>,
    labels: &mut Vec<PendingLabel>,
) {
    let text = text_content(style, ctx).to_uppercase();
    if text.is_empty() {
        return;
    }

    let Some(color) = style.text_color.resolve(ctx).to_color() else {
        return;
    };
    let font_size = resolve_number(&style.text_size, ctx, 16.);
    let opacity = resolve_number(&style.text_opacity, ctx, 1.);
    let max_angle = resolve_number(&style.text_max_angle, ctx, 45.);
    let spacing = resolve_number(&style.text_letter_spacing, ctx, 0.) * font_size;
    let halo_width = resolve_number(&style.text_halo_width, ctx, 0.);
    let halo_color =
        style.text_halo_color.resolve(ctx).to_color().unwrap_or(Color::with_alpha(0, 0, 0, 0));

    let scale = tile_size / extent;
    let path = feature.path.transformed(&Transform::from_scale(scale, scale));
    let measure = PathMeasure::new(&path);

    // The path must fit the label in full.
    if total_advance(painter, &text, font_size, spacing) > measure.length() {
        return;
    }

    let flipped = is_flipped(measure.angle_at(0.));
    let ordered: Vec<char> =
        if flipped { text.chars().rev().collect() } else { text.chars().collect() };

    let metrics = painter.font_metrics(font_size);
    let baseline_shift = (metrics.ascent - metrics.descent) / 2.;

    let mut length = 0.;
    let mut previous_angle = measure.angle_at(0.);
    let mut paths = Vec::with_capacity(ordered.len());
    let mut text_rect: Option<Rect> = None;
    let mut buffer = [0u8; 4];

    for char in ordered {
        let position = measure.point_at(length);
        let angle = measure.angle_at(length);

        // Sharp bends between adjacent characters abort the whole label.
        if (angle - previous_angle).abs() > max_angle {
            return;
        }
        let rotation = if flipped { -(angle + 180.) } else { -angle };

        let glyph = char.encode_utf8(&mut buffer);
        let transform = Transform::from_translate(0., baseline_shift)
            .then(&Transform::from_rotate(rotation))
            .then(&Transform::from_translate(position.x, position.y));
        paths.push(painter.text_path(glyph, font_size).transformed(&transform));

        let advance = painter.text_advance(glyph, font_size);
        let char_rect = Rect::new(
            position.x,
            position.y - metrics.height() / 2.,
            advance,
            metrics.height(),
        );
        text_rect = Some(match text_rect {
            Some(rect) => rect.united(&char_rect),
            None => char_rect,
        });

        // Letter spacing never applies across word gaps.
        let letter_spacing = if char == ' ' { 0. } else { spacing };
        length += advance + letter_spacing;
        previous_angle = angle;
    }
    let Some(text_rect) = text_rect else { return };

    let global_rect = text_rect.translate(tile_origin);
    if overlaps(&global_rect, collision_rects) {
        return;
    }
    collision_rects.push(global_rect);

    labels.push(PendingLabel {
        origin: tile_origin,
        paths,
        color,
        opacity,
        halo_color,
        halo_width,
    });
}

/// Paint the queued labels.
///
/// Halos draw as a stroke twice the halo width, so half of it surrounds
/// the filled glyph on every side.
pub(super) fn paint_labels<P: Painter + ?Sized>(painter: &mut P, labels: &[PendingLabel]) {
    for label in labels {
        painter.save();
        painter.translate(label.origin);
        painter.set_opacity(label.opacity);

        let pen = (label.halo_width > 0.)
            .then_some(Pen { color: label.halo_color, width: label.halo_width * 2. });
        painter.set_pen(pen);
        painter.set_brush(Some(Brush { color: label.color }));

        for path in &label.paths {
            painter.draw_path(path);
        }

        painter.restore();
    }
}
