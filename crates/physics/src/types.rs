use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// Floating point type used throughout the engine.
///
/// Defaults to `f64`; the `f32` cargo feature switches the whole engine
/// (and the wire format of the server crate) to single precision.
#[cfg(not(feature = "f32"))]
pub type Scalar = f64;
/// Floating point type used throughout the engine (single precision build).
#[cfg(feature = "f32")]
pub type Scalar = f32;

/// Name of the active floating type, advertised to clients.
#[cfg(not(feature = "f32"))]
pub const FLOATING_TYPE_NAME: &str = "double";
#[cfg(feature = "f32")]
pub const FLOATING_TYPE_NAME: &str = "float";

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
/// Three dimensional vector used by the physics engine.
///
/// Shared by all sphere state to represent positions, velocities and
/// accelerations. It is marked as [`bytemuck::Pod`] so sphere records can be
/// reinterpreted as raw words when they cross the wire.
pub struct Vec3 {
    /// X component of the vector.
    pub x: Scalar,
    /// Y component of the vector.
    pub y: Scalar,
    /// Z component of the vector.
    pub z: Scalar,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new [`Vec3`] with the provided components.
    ///
    /// This constructor is `const` so that vectors can be used in constant
    /// expressions when building static parameters.
    #[must_use]
    pub const fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { x, y, z }
    }

    /// Dot product with another vector.
    #[must_use]
    pub fn dot(self, other: Self) -> Scalar {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared Euclidean norm.
    #[must_use]
    pub fn squared_norm(self) -> Scalar {
        self.dot(self)
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(self) -> Scalar {
        self.squared_norm().sqrt()
    }
}

impl Index<usize> for Vec3 {
    type Output = Scalar;

    fn index(&self, axis: usize) -> &Scalar {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("vector axis out of range: {axis}"),
        }
    }
}

impl IndexMut<usize> for Vec3 {
    fn index_mut(&mut self, axis: usize) -> &mut Scalar {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("vector axis out of range: {axis}"),
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<Scalar> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: Scalar) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<Scalar> for Vec3 {
    fn mul_assign(&mut self, rhs: Scalar) {
        *self = *self * rhs;
    }
}

impl Div<Scalar> for Vec3 {
    type Output = Self;
    fn div(self, rhs: Scalar) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl DivAssign<Scalar> for Vec3 {
    fn div_assign(&mut self, rhs: Scalar) {
        *self = *self / rhs;
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Reduces a displacement to its minimum image in a periodic box.
///
/// Each component ends up in `(-L/2, L/2]` for the matching box edge `L`.
/// Edges that are not positive are left untouched.
#[must_use]
pub fn minimum_image(mut d: Vec3, box_size: Vec3) -> Vec3 {
    for axis in 0..3 {
        let edge = box_size[axis];
        if edge > 0.0 {
            d[axis] -= (d[axis] / edge).round() * edge;
        }
    }
    d
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
/// Dynamic spherical rigid body.
///
/// The acceleration field holds the value computed during the last accepted
/// integration step and is reported to clients, it does not feed back into
/// the dynamics.
pub struct Sphere {
    /// Center position in world space.
    pub pos: Vec3,
    /// Linear velocity.
    pub vel: Vec3,
    /// Acceleration from the last accepted step.
    pub acc: Vec3,
    /// Mass, strictly positive for spheres that take part in a step.
    pub mass: Scalar,
    /// Radius, strictly positive for spheres that take part in a step.
    pub radius: Scalar,
}

impl Sphere {
    /// Constructs a sphere at rest with the given position, mass and radius.
    #[must_use]
    pub const fn new(pos: Vec3, mass: Scalar, radius: Scalar) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            acc: Vec3::ZERO,
            mass,
            radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_image_wraps_into_half_open_interval() {
        let box_size = Vec3::new(1.0, 1.0, 1.0);
        let d = minimum_image(Vec3::new(0.9, -0.6, 0.2), box_size);
        assert!((d.x + 0.1).abs() < 1e-12);
        assert!((d.y - 0.4).abs() < 1e-12);
        assert!((d.z - 0.2).abs() < 1e-12);
    }

    #[test]
    fn vector_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, -5.0, 6.0);
        assert!((a.dot(b) - 12.0).abs() < 1e-12);
        assert_eq!(a + b, Vec3::new(5.0, -3.0, 9.0));
        assert!(((a * 2.0).norm() - 2.0 * a.norm()).abs() < 1e-12);
    }
}
