use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// A point or direction in the drawing plane.
///
/// Mutating methods return `&mut Self` so calls can be chained:
///
/// ```
/// use crabdepict::Vector2;
///
/// let mut v = Vector2::new(1.0, 0.0);
/// v.rotate(std::f64::consts::FRAC_PI_2).multiply_scalar(2.0);
/// assert!((v.y - 2.0).abs() < 1e-12);
/// ```
///
/// The value-returning forms (`rotated`, `normalized`, [`Vector2::difference`], …)
/// never touch their inputs. Arithmetic is plain `f64`; nothing here guards
/// against NaN or infinities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn set(&mut self, x: f64, y: f64) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn add(&mut self, other: Vector2) -> &mut Self {
        self.x += other.x;
        self.y += other.y;
        self
    }

    pub fn subtract(&mut self, other: Vector2) -> &mut Self {
        self.x -= other.x;
        self.y -= other.y;
        self
    }

    pub fn multiply_scalar(&mut self, s: f64) -> &mut Self {
        self.x *= s;
        self.y *= s;
        self
    }

    pub fn divide(&mut self, s: f64) -> &mut Self {
        self.x /= s;
        self.y /= s;
        self
    }

    pub fn invert(&mut self) -> &mut Self {
        self.x = -self.x;
        self.y = -self.y;
        self
    }

    /// Scales to unit length. A zero vector becomes NaN.
    pub fn normalize(&mut self) -> &mut Self {
        let len = self.length();
        self.divide(len)
    }

    pub fn length(&self) -> f64 {
        self.length_sq().sqrt()
    }

    pub fn length_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance(&self, other: Vector2) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub fn distance_sq(&self, other: Vector2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Angle of the vector against the positive x axis, in `(-π, π]`.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn rotate(&mut self, angle: f64) -> &mut Self {
        let (s, c) = angle.sin_cos();
        let x = self.x * c - self.y * s;
        let y = self.x * s + self.y * c;
        self.set(x, y)
    }

    pub fn rotate_around(&mut self, angle: f64, center: Vector2) -> &mut Self {
        self.subtract(center).rotate(angle).add(center)
    }

    /// Rotates around `center` until this point lies on the ray from `center`
    /// through `target`, then by `offset` further.
    pub fn rotate_to(&mut self, target: Vector2, center: Vector2, offset: f64) -> &mut Self {
        let a = Vector2::difference(*self, center);
        let b = Vector2::difference(target, center);
        let angle = b.angle() - a.angle();
        self.rotate_around(angle + offset, center)
    }

    /// Rotates by `angle` or `-angle` around `center`, whichever ends up
    /// farther from `away`.
    pub fn rotate_away_from(&mut self, away: Vector2, center: Vector2, angle: f64) -> &mut Self {
        let rotation = self.get_rotate_away_from_angle(away, center, angle);
        self.rotate_around(rotation, center)
    }

    /// The signed rotation (`angle` or `-angle`) around `center` that moves
    /// this point farther from `away`. Both candidates start from the current
    /// position.
    pub fn get_rotate_away_from_angle(&self, away: Vector2, center: Vector2, angle: f64) -> f64 {
        let plus = self.rotated_around(angle, center).distance_sq(away);
        let minus = self.rotated_around(-angle, center).distance_sq(away);
        if minus > plus {
            -angle
        } else {
            angle
        }
    }

    /// The signed rotation (`angle` or `-angle`) around `center` that moves
    /// this point closer to `towards`.
    pub fn get_rotate_towards_angle(&self, towards: Vector2, center: Vector2, angle: f64) -> f64 {
        let plus = self.rotated_around(angle, center).distance_sq(towards);
        let minus = self.rotated_around(-angle, center).distance_sq(towards);
        if minus < plus {
            -angle
        } else {
            angle
        }
    }

    /// Reflects the point across the infinite line through `a` and `b`.
    pub fn mirror_about_line(&mut self, a: Vector2, b: Vector2) -> &mut Self {
        let mut dir = Vector2::difference(b, a);
        dir.normalize();
        let rel = Vector2::difference(*self, a);
        let along = Vector2::dot(rel, dir);
        let foot = Vector2::new(a.x + dir.x * along, a.y + dir.y * along);
        let x = 2.0 * foot.x - self.x;
        let y = 2.0 * foot.y - self.y;
        self.set(x, y)
    }

    pub fn rotated(&self, angle: f64) -> Vector2 {
        let mut v = *self;
        v.rotate(angle);
        v
    }

    pub fn rotated_around(&self, angle: f64, center: Vector2) -> Vector2 {
        let mut v = *self;
        v.rotate_around(angle, center);
        v
    }

    pub fn normalized(&self) -> Vector2 {
        let mut v = *self;
        v.normalize();
        v
    }

    pub fn scaled(&self, s: f64) -> Vector2 {
        Vector2::new(self.x * s, self.y * s)
    }

    /// `-1` when `other` is clockwise of this vector (y up), `1` when
    /// counter-clockwise, `0` when collinear.
    pub fn clockwise(&self, other: Vector2) -> i32 {
        let a = self.y * other.x;
        let b = self.x * other.y;
        if a > b {
            -1
        } else if a == b {
            0
        } else {
            1
        }
    }

    /// Same as [`clockwise`](Self::clockwise) with both vectors taken
    /// relative to `center`.
    pub fn relative_clockwise(&self, center: Vector2, other: Vector2) -> i32 {
        Vector2::difference(*self, center).clockwise(Vector2::difference(other, center))
    }

    /// Signed area test of this point against the directed line `a → b`.
    pub fn which_side(&self, a: Vector2, b: Vector2) -> f64 {
        (self.x - a.x) * (b.y - a.y) - (self.y - a.y) * (b.x - a.x)
    }

    pub fn same_side_as(&self, a: Vector2, b: Vector2, reference: Vector2) -> bool {
        let d = self.which_side(a, b);
        let d_ref = reference.which_side(a, b);
        (d < 0.0 && d_ref < 0.0) || (d == 0.0 && d_ref == 0.0) || (d > 0.0 && d_ref > 0.0)
    }

    /// Even-odd ray casting; works for concave polygons.
    pub fn is_in_polygon(&self, polygon: &[Vector2]) -> bool {
        let mut inside = false;
        let n = polygon.len();
        if n < 3 {
            return false;
        }
        let mut j = n - 1;
        for i in 0..n {
            let pi = polygon[i];
            let pj = polygon[j];
            if (pi.y > self.y) != (pj.y > self.y)
                && self.x < (pj.x - pi.x) * (self.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn sum(a: Vector2, b: Vector2) -> Vector2 {
        Vector2::new(a.x + b.x, a.y + b.y)
    }

    /// `a - b`.
    pub fn difference(a: Vector2, b: Vector2) -> Vector2 {
        Vector2::new(a.x - b.x, a.y - b.y)
    }

    pub fn midpoint(a: Vector2, b: Vector2) -> Vector2 {
        Vector2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    pub fn dot(a: Vector2, b: Vector2) -> f64 {
        a.x * b.x + a.y * b.y
    }

    pub fn cross(a: Vector2, b: Vector2) -> f64 {
        a.x * b.y - a.y * b.x
    }

    /// Unsigned angle between two vectors, in `[0, π]`.
    pub fn angle_between(a: Vector2, b: Vector2) -> f64 {
        let cos = Vector2::dot(a, b) / (a.length() * b.length());
        cos.clamp(-1.0, 1.0).acos()
    }

    /// The two normals of the segment `a → b` (left, then right).
    pub fn normals(a: Vector2, b: Vector2) -> [Vector2; 2] {
        let delta = Vector2::difference(b, a);
        [Vector2::new(-delta.y, delta.x), Vector2::new(delta.y, -delta.x)]
    }

    pub fn units(a: Vector2, b: Vector2) -> [Vector2; 2] {
        let [l, r] = Vector2::normals(a, b);
        [l.normalized(), r.normalized()]
    }

    pub fn scalar_projection(a: Vector2, b: Vector2) -> f64 {
        Vector2::dot(a, b.normalized())
    }

    pub fn centroid(points: &[Vector2]) -> Vector2 {
        let mut c = Vector2::zero();
        for p in points {
            c.add(*p);
        }
        c.divide(points.len() as f64);
        c
    }
}

pub fn to_rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn to_deg(radians: f64) -> f64 {
    radians * 180.0 / PI
}

/// Circumradius of a regular polygon with `n` sides of length `side`.
pub fn poly_circumradius(side: f64, n: usize) -> f64 {
    side / (2.0 * (PI / n as f64).sin())
}

pub fn apothem(circumradius: f64, n: usize) -> f64 {
    circumradius * (PI / n as f64).cos()
}

pub fn central_angle(n: usize) -> f64 {
    2.0 * PI / n as f64
}

/// Interior angle of a regular `n`-gon.
pub fn inner_angle(n: usize) -> f64 {
    (n as f64 - 2.0) * PI / n as f64
}
