//! RGBA colors and stylesheet color parsing.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::de::Visitor;
use serde::{Deserialize, Deserializer};

/// RGBA color.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Alpha channel as a factor in `[0, 1]`.
    pub fn alpha_f(&self) -> f32 {
        self.a as f32 / 255.
    }

    /// Multiply the alpha channel by a factor in `[0, 1]`.
    pub fn scale_alpha(mut self, factor: f32) -> Self {
        self.a = (self.a as f32 * factor.clamp(0., 1.)).round() as u8;
        self
    }

    /// Componentwise sRGB interpolation towards `other` by `t ∈ [0, 1]`.
    pub fn mix(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0., 1.);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: lerp(self.r, other.r),
            g: lerp(self.g, other.g),
            b: lerp(self.b, other.b),
            a: lerp(self.a, other.a),
        }
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parse a stylesheet color.
    ///
    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `rgba(r, g, b, a)`, `hsl(h, s%, l%)`, and `hsla(h, s%, l%, a)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(digits) = s.strip_prefix('#') {
            return parse_hex(digits).ok_or_else(|| ParseColorError(s.into()));
        }

        for (prefix, hsl) in [("rgba", false), ("rgb", false), ("hsla", true), ("hsl", true)] {
            if let Some(args) = s.strip_prefix(prefix)
                && let Some(args) = args.trim().strip_prefix('(')
                && let Some(args) = args.strip_suffix(')')
            {
                let parsed = if hsl { parse_hsl(args) } else { parse_rgb(args) };
                return parsed.ok_or_else(|| ParseColorError(s.into()));
            }
        }

        Err(ParseColorError(s.into()))
    }
}

fn parse_hex(digits: &str) -> Option<Color> {
    let channel = |i: usize| u8::from_str_radix(digits.get(i * 2..i * 2 + 2)?, 16).ok();
    match digits.len() {
        // Shorthand like `#f00`, each digit doubled.
        3 => {
            let nibble = |i: usize| u8::from_str_radix(digits.get(i..i + 1)?, 16).ok();
            let (r, g, b) = (nibble(0)?, nibble(1)?, nibble(2)?);
            Some(Color::new(r * 17, g * 17, b * 17))
        },
        6 => Some(Color::new(channel(0)?, channel(1)?, channel(2)?)),
        8 => Some(Color::with_alpha(channel(0)?, channel(1)?, channel(2)?, channel(3)?)),
        _ => None,
    }
}

fn parse_rgb(args: &str) -> Option<Color> {
    let mut parts = args.split(',').map(str::trim);
    let mut channel = || parts.next()?.parse::<f32>().ok();

    let (r, g, b) = (channel()?, channel()?, channel()?);
    let a = channel().unwrap_or(1.);

    let byte = |v: f32| (v.clamp(0., 255.)).round() as u8;
    Some(Color::with_alpha(byte(r), byte(g), byte(b), byte(a * 255.)))
}

fn parse_hsl(args: &str) -> Option<Color> {
    let mut parts = args.split(',').map(str::trim);
    let h = parts.next()?.parse::<f32>().ok()?.rem_euclid(360.);
    let s = parts.next()?.strip_suffix('%')?.parse::<f32>().ok()? / 100.;
    let l = parts.next()?.strip_suffix('%')?.parse::<f32>().ok()? / 100.;
    let a = match parts.next() {
        Some(alpha) => alpha.parse::<f32>().ok()?,
        None => 1.,
    };

    let c = (1. - (2. * l - 1.).abs()) * s.clamp(0., 1.);
    let x = c * (1. - ((h / 60.).rem_euclid(2.) - 1.).abs());
    let m = l - c / 2.;
    let (r, g, b) = match h {
        h if h < 60. => (c, x, 0.),
        h if h < 120. => (x, c, 0.),
        h if h < 180. => (0., c, x),
        h if h < 240. => (0., x, c),
        h if h < 300. => (x, 0., c),
        _ => (c, 0., x),
    };

    let byte = |v: f32| ((v + m).clamp(0., 1.) * 255.).round() as u8;
    Some(Color::with_alpha(byte(r), byte(g), byte(b), (a.clamp(0., 1.) * 255.).round() as u8))
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        if self.a == 255 {
            write!(f, "#{:0>2x}{:0>2x}{:0>2x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:0>2x}{:0>2x}{:0>2x}{:0>2x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Deserialize a color from its stylesheet string form.
impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColorVisitor;

        impl Visitor<'_> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("color like #ff00ff or rgba(255, 0, 255, 1)")
            }

            fn visit_str<E>(self, value: &str) -> Result<Color, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(|err| E::custom(format!("{err}")))
            }
        }

        deserializer.deserialize_str(ColorVisitor)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("invalid color {0:?}")]
pub struct ParseColorError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("#f00".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("#11223344".parse::<Color>().unwrap(), Color::with_alpha(17, 34, 51, 68));

        assert!("#ff00".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert!("ff0000".parse::<Color>().is_err());
    }

    #[test]
    fn functional_colors() {
        assert_eq!("rgb(255, 128, 0)".parse::<Color>().unwrap(), Color::new(255, 128, 0));
        assert_eq!(
            "rgba(255, 128, 0, 0.5)".parse::<Color>().unwrap(),
            Color::with_alpha(255, 128, 0, 128)
        );
        assert_eq!("hsl(0, 100%, 50%)".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("hsl(120, 100%, 50%)".parse::<Color>().unwrap(), Color::new(0, 255, 0));
        assert_eq!(
            "hsla(240, 100%, 50%, 0.5)".parse::<Color>().unwrap(),
            Color::with_alpha(0, 0, 255, 128)
        );

        assert!("rgb(255, 128)".parse::<Color>().is_err());
        assert!("hsl(0, 1, 0.5)".parse::<Color>().is_err());
    }

    #[test]
    fn mixing() {
        let black = Color::new(0, 0, 0);
        let white = Color::new(255, 255, 255);

        assert_eq!(black.mix(white, 0.), black);
        assert_eq!(black.mix(white, 1.), white);
        assert_eq!(black.mix(white, 0.5), Color::new(128, 128, 128));
    }

    #[test]
    fn display_round_trip() {
        let color = Color::with_alpha(1, 2, 3, 4);
        assert_eq!(format!("{color}").parse::<Color>().unwrap(), color);

        let opaque = Color::new(255, 0, 255);
        assert_eq!(format!("{opaque}"), "#ff00ff");
    }
}
