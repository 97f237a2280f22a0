use crate::physics::math::{self, Scalar, Vector};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim};

/// Number of `u64` words needed to hold one orthant bit per axis.
#[inline]
pub fn orthant_words(dimensions: usize) -> usize {
    dimensions.div_ceil(64)
}

/// Axis-aligned box in D dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Aabb<D: Dim>
where
    DefaultAllocator: Allocator<D>,
{
    pub min: Vector<D>,
    pub max: Vector<D>,
}

impl<D: Dim> Aabb<D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn new(min: Vector<D>, max: Vector<D>) -> Self {
        Self { min, max }
    }

    /// Degenerate box at the origin.
    pub fn zeros(dim: D) -> Self {
        Self::new(math::zeros(dim), math::zeros(dim))
    }

    #[inline]
    pub fn dim(&self) -> D {
        math::dim_of(&self.min)
    }

    /// Tightest box around the given points, `None` when there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vector<D>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::new(first.clone(), first.clone());

        for point in points {
            for ((min, max), &value) in bounds
                .min
                .iter_mut()
                .zip(bounds.max.iter_mut())
                .zip(point.iter())
            {
                *min = min.min(value);
                *max = max.max(value);
            }
        }
        Some(bounds)
    }

    /// Hyper-cube anchored at `min` whose side is the largest single-axis
    /// span, so every subdivision stays a hyper-cube.
    pub fn to_cube(&self) -> Self {
        let side = self.longest_side();
        Self::new(self.min.clone(), self.min.add_scalar(side))
    }

    #[inline]
    pub fn center(&self) -> Vector<D> {
        (&self.min + &self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vector<D> {
        &self.max - &self.min
    }

    #[inline]
    pub fn longest_side(&self) -> Scalar {
        self.min
            .iter()
            .zip(self.max.iter())
            .map(|(min, max)| max - min)
            .fold(0.0, Scalar::max)
    }

    #[inline]
    pub fn contains(&self, point: &Vector<D>) -> bool {
        self.min
            .iter()
            .zip(self.max.iter())
            .zip(point.iter())
            .all(|((min, max), value)| min <= value && value <= max)
    }

    /// Writes the orthant `point` falls into as a bit mask into `key`,
    /// which must hold [`orthant_words`] words.
    ///
    /// Bit `axis` is set when the point lies in the upper half along that
    /// axis; points exactly on the midpoint go to the lower half.
    #[inline]
    pub fn orthant(&self, point: &Vector<D>, key: &mut [u64]) {
        key.fill(0);
        for axis in 0..point.len() {
            let mid = (self.min[axis] + self.max[axis]) * 0.5;
            if point[axis] > mid {
                key[axis / 64] |= 1 << (axis % 64);
            }
        }
    }

    /// Box of the orthant described by `key`.
    pub fn orthant_bounds(&self, key: &[u64]) -> Self {
        let mut min = self.min.clone();
        let mut max = self.center();

        for axis in 0..min.len() {
            if key[axis / 64] & (1 << (axis % 64)) != 0 {
                min[axis] = max[axis];
                max[axis] = self.max[axis];
            }
        }

        Self::new(min, max)
    }
}
