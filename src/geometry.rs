//! Shared geometry types.

use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// 2D object position.
#[derive(PartialEq, Copy, Clone, Default, Debug)]
pub struct Point<T = f32> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T> From<(T, T)> for Point<T> {
    fn from((x, y): (T, T)) -> Self {
        Self { x, y }
    }
}

impl From<Point<f64>> for Point<f32> {
    fn from(point: Point<f64>) -> Self {
        Self::new(point.x as f32, point.y as f32)
    }
}

impl<T: Add<Output = T>> Add<Point<T>> for Point<T> {
    type Output = Self;

    fn add(mut self, other: Point<T>) -> Self {
        self.x = self.x + other.x;
        self.y = self.y + other.y;
        self
    }
}

impl<T: AddAssign> AddAssign<Point<T>> for Point<T> {
    fn add_assign(&mut self, other: Point<T>) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl<T: Sub<Output = T>> Sub<Point<T>> for Point<T> {
    type Output = Self;

    fn sub(mut self, other: Point<T>) -> Self {
        self.x = self.x - other.x;
        self.y = self.y - other.y;
        self
    }
}

impl<T: SubAssign> SubAssign<Point<T>> for Point<T> {
    fn sub_assign(&mut self, other: Point<T>) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Point<f32> {
    type Output = Self;

    fn mul(mut self, scale: f32) -> Self {
        self.x *= scale;
        self.y *= scale;
        self
    }
}

/// 2D object size.
#[derive(Hash, PartialEq, Eq, Copy, Clone, Default, Debug)]
pub struct Size<T = u32> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub fn new(width: T, height: T) -> Self {
        Self { width, height }
    }
}

impl<T> From<(T, T)> for Size<T> {
    fn from((width, height): (T, T)) -> Self {
        Self { width, height }
    }
}

impl From<Size> for Size<f32> {
    fn from(size: Size) -> Self {
        Self { width: size.width as f32, height: size.height as f32 }
    }
}

impl From<Size> for Size<f64> {
    fn from(size: Size) -> Self {
        Self { width: size.width as f64, height: size.height as f64 }
    }
}

/// Axis-aligned rectangle.
#[derive(PartialEq, Copy, Clone, Default, Debug)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing two corner points.
    pub fn from_points(a: Point<f32>, b: Point<f32>) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, a.x.max(b.x) - x, a.y.max(b.y) - y)
    }

    pub fn translate(mut self, offset: Point<f32>) -> Self {
        self.x += offset.x;
        self.y += offset.y;
        self
    }

    /// Check if two rectangles overlap.
    ///
    /// Touching edges count as an intersection, matching the collision
    /// semantics used for label placement.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }

    /// Smallest rectangle containing both rectangles.
    pub fn united(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn inflated(mut self, margin: f32) -> Rect {
        self.x -= margin;
        self.y -= margin;
        self.width += 2. * margin;
        self.height += 2. * margin;
        self
    }
}

/// 2D affine transform.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Transform {
    m11: f32,
    m12: f32,
    m21: f32,
    m22: f32,
    dx: f32,
    dy: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self { m11: 1., m12: 0., m21: 0., m22: 1., dx: 0., dy: 0. }
    }

    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Self { m11: sx, m22: sy, ..Self::identity() }
    }

    pub fn from_translate(dx: f32, dy: f32) -> Self {
        Self { dx, dy, ..Self::identity() }
    }

    /// Rotation by `degrees`, clockwise in the screen's y-down coordinate
    /// system.
    pub fn from_rotate(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self { m11: cos, m12: sin, m21: -sin, m22: cos, dx: 0., dy: 0. }
    }

    /// Combine transforms, applying `self` first and `next` second.
    pub fn then(&self, next: &Transform) -> Self {
        Self {
            m11: self.m11 * next.m11 + self.m12 * next.m21,
            m12: self.m11 * next.m12 + self.m12 * next.m22,
            m21: self.m21 * next.m11 + self.m22 * next.m21,
            m22: self.m21 * next.m12 + self.m22 * next.m22,
            dx: self.dx * next.m11 + self.dy * next.m21 + next.dx,
            dy: self.dx * next.m12 + self.dy * next.m22 + next.dy,
        }
    }

    pub fn map(&self, point: Point<f32>) -> Point<f32> {
        Point::new(
            point.x * self.m11 + point.y * self.m21 + self.dx,
            point.x * self.m12 + point.y * self.m22 + self.dy,
        )
    }
}

/// Polygon fill rule.
#[derive(PartialEq, Eq, Copy, Clone, Default, Debug)]
pub enum FillRule {
    /// Non-zero winding; exterior rings wind one way, holes the other.
    #[default]
    NonZero,
    EvenOdd,
}

/// Path segment.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum PathElement {
    MoveTo(Point<f32>),
    LineTo(Point<f32>),
    Close,
}

/// A sequence of line subpaths.
#[derive(PartialEq, Clone, Default, Debug)]
pub struct Path {
    pub elements: Vec<PathElement>,
    pub fill_rule: FillRule,
}

impl Path {
    pub fn new(fill_rule: FillRule) -> Self {
        Self { elements: Vec::new(), fill_rule }
    }

    pub fn move_to(&mut self, point: Point<f32>) {
        self.elements.push(PathElement::MoveTo(point));
    }

    pub fn line_to(&mut self, point: Point<f32>) {
        self.elements.push(PathElement::LineTo(point));
    }

    pub fn close(&mut self) {
        self.elements.push(PathElement::Close);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Map every point of the path through a transform.
    pub fn transformed(&self, transform: &Transform) -> Path {
        let elements = self
            .elements
            .iter()
            .map(|element| match element {
                PathElement::MoveTo(point) => PathElement::MoveTo(transform.map(*point)),
                PathElement::LineTo(point) => PathElement::LineTo(transform.map(*point)),
                PathElement::Close => PathElement::Close,
            })
            .collect();
        Path { elements, fill_rule: self.fill_rule }
    }

    /// Tight bounding rectangle of all path points.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.elements.iter().filter_map(|element| match element {
            PathElement::MoveTo(point) | PathElement::LineTo(point) => Some(*point),
            PathElement::Close => None,
        });

        let first = points.next()?;
        let mut bounds = Rect::new(first.x, first.y, 0., 0.);
        for point in points {
            bounds = bounds.united(&Rect::new(point.x, point.y, 0., 0.));
        }
        Some(bounds)
    }
}

/// Arc-length sampling over a path.
///
/// Subpaths are concatenated; `Close` contributes the segment back to the
/// subpath's starting point. Samples past either end clamp to the
/// endpoints.
pub struct PathMeasure {
    segments: Vec<Segment>,
    length: f32,
}

struct Segment {
    start: Point<f32>,
    end: Point<f32>,
    /// Cumulative length up to and including this segment.
    offset: f32,
}

impl PathMeasure {
    pub fn new(path: &Path) -> Self {
        let mut segments = Vec::new();
        let mut length = 0.;
        let mut subpath_start = None;
        let mut cursor = None;

        let mut push = |from: Point<f32>, to: Point<f32>, length: &mut f32| {
            let delta = to - from;
            let segment_length = (delta.x * delta.x + delta.y * delta.y).sqrt();
            if segment_length > 0. {
                *length += segment_length;
                segments.push(Segment { start: from, end: to, offset: *length });
            }
        };

        for element in &path.elements {
            match element {
                PathElement::MoveTo(point) => {
                    subpath_start = Some(*point);
                    cursor = Some(*point);
                },
                PathElement::LineTo(point) => {
                    if let Some(from) = cursor {
                        push(from, *point, &mut length);
                    }
                    cursor = Some(*point);
                },
                PathElement::Close => {
                    if let (Some(from), Some(start)) = (cursor, subpath_start) {
                        push(from, start, &mut length);
                        cursor = Some(start);
                    }
                },
            }
        }

        Self { segments, length }
    }

    /// Total path length.
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Point at an arc-length offset from the path start.
    pub fn point_at(&self, length: f32) -> Point<f32> {
        match self.segment_at(length) {
            Some((segment, t)) => {
                let delta = segment.end - segment.start;
                segment.start + Point::new(delta.x * t, delta.y * t)
            },
            None => Point::default(),
        }
    }

    /// Tangent angle at an arc-length offset, in degrees.
    ///
    /// Zero points right and angles grow counter-clockwise, with the
    /// result normalized to `[0, 360)`.
    pub fn angle_at(&self, length: f32) -> f32 {
        match self.segment_at(length) {
            Some((segment, _)) => {
                let delta = segment.end - segment.start;
                let degrees = (-delta.y).atan2(delta.x).to_degrees();
                degrees.rem_euclid(360.)
            },
            None => 0.,
        }
    }

    fn segment_at(&self, length: f32) -> Option<(&Segment, f32)> {
        if self.segments.is_empty() {
            return None;
        }

        let length = length.clamp(0., self.length);
        let index = self
            .segments
            .iter()
            .position(|segment| segment.offset >= length)
            .unwrap_or(self.segments.len() - 1);
        let segment = &self.segments[index];

        let start_offset = index.checked_sub(1).map_or(0., |i| self.segments[i].offset);
        let segment_length = segment.offset - start_offset;
        let t = if segment_length > 0. { (length - start_offset) / segment_length } else { 0. };

        Some((segment, t))
    }
}
