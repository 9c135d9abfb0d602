//! Stylesheet parsing and zoom-dependent property resolution.
//!
//! A [`StyleSheet`] is an ordered list of layer styles, painted
//! back-to-front in array order. Parsing is strict: an unknown layer
//! type, a missing required field, or an unknown expression operator
//! fails the whole document and no partial stylesheet is ever surfaced.

use serde_json::Value as Json;

use crate::Error;
use crate::color::Color;
use crate::style::expression::{Context, Value};

pub mod expression;

/// Parsed stylesheet; paint order equals array order.
#[derive(Default, Debug)]
pub struct StyleSheet {
    pub layers: Vec<LayerStyle>,
}

impl StyleSheet {
    /// Parse a stylesheet from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let document: Json = serde_json::from_slice(bytes)?;
        Self::from_json(&document)
    }

    /// Parse a stylesheet from a JSON document.
    pub fn from_json(document: &Json) -> Result<Self, Error> {
        let layers = document
            .get("layers")
            .and_then(Json::as_array)
            .ok_or_else(|| bad("missing layers array"))?;

        let layers = layers.iter().map(LayerStyle::from_json).collect::<Result<_, _>>()?;

        Ok(Self { layers })
    }
}

fn bad(message: impl Into<String>) -> Error {
    Error::BadStylesheet(message.into())
}

/// One stylesheet layer, binding a source layer to a visual treatment.
#[derive(Debug)]
pub struct LayerStyle {
    pub id: String,
    /// Source layer this style draws from; absent for background and
    /// raster layers.
    pub source_layer: Option<String>,
    pub min_zoom: f32,
    pub max_zoom: f32,
    visible: bool,
    /// Per-feature predicate expression.
    pub filter: Option<Json>,
    pub kind: StyleKind,
}

impl LayerStyle {
    fn from_json(json: &Json) -> Result<Self, Error> {
        let object = json.as_object().ok_or_else(|| bad("layer is not an object"))?;

        let id = object
            .get("id")
            .and_then(Json::as_str)
            .ok_or_else(|| bad("layer missing id"))?
            .to_string();
        let layer_type = object
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| bad(format!("layer {id:?} missing type")))?;

        let empty = serde_json::Map::new();
        let paint = object.get("paint").and_then(Json::as_object).unwrap_or(&empty);
        let layout = object.get("layout").and_then(Json::as_object).unwrap_or(&empty);

        let kind = match layer_type {
            "background" => StyleKind::Background(BackgroundStyle {
                color: prop(paint, "background-color", Property::color(Color::new(0, 0, 0)))?,
                opacity: prop(paint, "background-opacity", Property::number(1.))?,
            }),
            "fill" => StyleKind::Fill(FillStyle {
                color: prop(paint, "fill-color", Property::color(Color::new(0, 0, 0)))?,
                opacity: prop(paint, "fill-opacity", Property::number(1.))?,
                antialias: paint.get("fill-antialias").and_then(Json::as_bool).unwrap_or(true),
            }),
            "line" => StyleKind::Line(LineStyle {
                color: prop(paint, "line-color", Property::color(Color::new(0, 0, 0)))?,
                width: prop(paint, "line-width", Property::number(1.))?,
                opacity: prop(paint, "line-opacity", Property::number(1.))?,
            }),
            "symbol" => StyleKind::Symbol(SymbolStyle {
                text_field: layout.get("text-field").map(Property::parse).transpose()?,
                text_size: prop(layout, "text-size", Property::number(16.))?,
                text_max_width: prop(layout, "text-max-width", Property::number(10.))?,
                text_max_angle: prop(layout, "text-max-angle", Property::number(45.))?,
                text_letter_spacing: prop(layout, "text-letter-spacing", Property::number(0.))?,
                text_color: prop(paint, "text-color", Property::color(Color::new(0, 0, 0)))?,
                text_opacity: prop(paint, "text-opacity", Property::number(1.))?,
                text_halo_color: prop(
                    paint,
                    "text-halo-color",
                    Property::color(Color::with_alpha(0, 0, 0, 0)),
                )?,
                text_halo_width: prop(paint, "text-halo-width", Property::number(0.))?,
            }),
            "raster" => StyleKind::Raster(RasterStyle {
                opacity: prop(paint, "raster-opacity", Property::number(1.))?,
            }),
            other => return Err(bad(format!("unknown layer type {other:?}"))),
        };

        let source_layer = object.get("source-layer").and_then(Json::as_str).map(str::to_string);
        if source_layer.is_none()
            && matches!(kind, StyleKind::Fill(_) | StyleKind::Line(_) | StyleKind::Symbol(_))
        {
            return Err(bad(format!("layer {id:?} missing source-layer")));
        }

        let filter = match object.get("filter") {
            Some(filter) => {
                expression::validate(filter).map_err(Error::BadStylesheet)?;
                Some(filter.clone())
            },
            None => None,
        };

        let visible = layout.get("visibility").and_then(Json::as_str) != Some("none");
        let min_zoom = object.get("minzoom").and_then(Json::as_f64).unwrap_or(0.) as f32;
        let max_zoom = object.get("maxzoom").and_then(Json::as_f64).unwrap_or(24.) as f32;

        Ok(Self { id, source_layer, min_zoom, max_zoom, visible, filter, kind })
    }

    /// Check the layer's zoom visibility window.
    pub fn visible_at(&self, zoom: f32) -> bool {
        self.visible && zoom >= self.min_zoom && zoom <= self.max_zoom
    }
}

/// Visual treatment variants.
#[derive(Debug)]
pub enum StyleKind {
    Background(BackgroundStyle),
    Fill(FillStyle),
    Line(LineStyle),
    Symbol(SymbolStyle),
    Raster(RasterStyle),
}

#[derive(Debug)]
pub struct BackgroundStyle {
    pub color: Property,
    pub opacity: Property,
}

#[derive(Debug)]
pub struct FillStyle {
    pub color: Property,
    pub opacity: Property,
    pub antialias: bool,
}

#[derive(Debug)]
pub struct LineStyle {
    pub color: Property,
    pub width: Property,
    pub opacity: Property,
}

#[derive(Debug)]
pub struct SymbolStyle {
    /// Label content: an expression, or a `{key}` metadata reference.
    pub text_field: Option<Property>,
    pub text_size: Property,
    pub text_max_width: Property,
    pub text_max_angle: Property,
    pub text_letter_spacing: Property,
    pub text_color: Property,
    pub text_opacity: Property,
    pub text_halo_color: Property,
    pub text_halo_width: Property,
}

#[derive(Debug)]
pub struct RasterStyle {
    pub opacity: Property,
}

fn prop(
    section: &serde_json::Map<String, Json>,
    key: &str,
    default: Property,
) -> Result<Property, Error> {
    match section.get(key) {
        Some(json) => Property::parse(json),
        None => Ok(default),
    }
}

/// A style property: a constant, a zoom-stop function, or an expression.
#[derive(Debug)]
pub enum Property {
    Constant(Value),
    Stops(Stops),
    Expression(Json),
}

/// Resolved form of a property at a fixed zoom.
#[derive(Debug)]
pub enum PropertyValue<'a> {
    Value(Value),
    /// The raw expression tree, to be resolved per feature.
    Expression(&'a Json),
}

impl Property {
    fn number(number: f64) -> Self {
        Self::Constant(Value::Number(number))
    }

    fn color(color: Color) -> Self {
        Self::Constant(Value::Color(color))
    }

    fn parse(json: &Json) -> Result<Self, Error> {
        match json {
            Json::Object(object) if object.contains_key("stops") => {
                let base = object.get("base").and_then(Json::as_f64).unwrap_or(1.);

                let stops = object
                    .get("stops")
                    .and_then(Json::as_array)
                    .ok_or_else(|| bad("malformed zoom stops"))?;
                let stops = stops
                    .iter()
                    .map(|stop| {
                        let pair = stop.as_array().filter(|pair| pair.len() == 2);
                        let pair = pair.ok_or_else(|| bad("malformed zoom stop"))?;
                        let zoom =
                            pair[0].as_f64().ok_or_else(|| bad("non-numeric stop zoom"))?;
                        Ok((zoom, Value::from_json(&pair[1])))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                if stops.is_empty() {
                    return Err(bad("empty zoom stops"));
                }

                Ok(Self::Stops(Stops { base, stops }))
            },
            Json::Array(_) => {
                expression::validate(json).map_err(Error::BadStylesheet)?;
                if expression::is_expression(json) {
                    Ok(Self::Expression(json.clone()))
                } else {
                    Ok(Self::Constant(Value::from_json(json)))
                }
            },
            literal => Ok(Self::Constant(Value::from_json(literal))),
        }
    }

    /// Resolve the property at a zoom level.
    ///
    /// Constants return themselves, stop functions interpolate, and
    /// expression-valued properties return the expression tree verbatim
    /// for the evaluator.
    pub fn at_zoom(&self, zoom: f32) -> PropertyValue<'_> {
        match self {
            Self::Constant(value) => PropertyValue::Value(value.clone()),
            Self::Stops(stops) => PropertyValue::Value(stops.at_zoom(zoom)),
            Self::Expression(json) => PropertyValue::Expression(json),
        }
    }

    /// Resolve the property fully, evaluating expressions against the
    /// context.
    pub fn resolve(&self, ctx: &Context) -> Value {
        match self.at_zoom(ctx.map_zoom) {
            PropertyValue::Value(value) => value,
            PropertyValue::Expression(json) => expression::resolve(json, ctx),
        }
    }
}

/// Zoom-indexed property stops.
#[derive(Debug)]
pub struct Stops {
    base: f64,
    stops: Vec<(f64, Value)>,
}

impl Stops {
    /// Piecewise interpolation over the stops, clamped at both ends.
    ///
    /// Numbers interpolate linearly (exponentially for `base != 1`),
    /// colors componentwise; discrete values step to the lower stop.
    fn at_zoom(&self, zoom: f32) -> Value {
        let zoom = zoom as f64;

        let first = &self.stops[0];
        let last = &self.stops[self.stops.len() - 1];
        if zoom <= first.0 {
            return first.1.clone();
        }
        if zoom >= last.0 {
            return last.1.clone();
        }

        let Some(index) = self.stops.windows(2).position(|pair| zoom <= pair[1].0) else {
            return last.1.clone();
        };
        let (start, lower) = &self.stops[index];
        let (end, upper) = &self.stops[index + 1];

        let t = if self.base == 1. {
            (zoom - start) / (end - start)
        } else {
            (self.base.powf(zoom - start) - 1.) / (self.base.powf(end - start) - 1.)
        };

        match (lower, upper) {
            (Value::Number(lower), Value::Number(upper)) => {
                Value::Number(lower + (upper - lower) * t)
            },
            _ => match (lower.to_color(), upper.to_color()) {
                (Some(lower_color), Some(upper_color)) => {
                    Value::Color(lower_color.mix(upper_color, t as f32))
                },
                // Discrete values step, holding the lower stop.
                _ => lower.clone(),
            },
        }
    }
}
