use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// Serialized as a bare `[f32; 4]`; the format lives in the type only.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    /// Ground-contact anchor of a vehicle box: middle of the bottom edge.
    #[inline]
    pub fn bottom_center(&self) -> na::Point2<f32> {
        na::Point2::new((self.left() + self.right()) / 2.0, self.bottom())
    }

    /// Clockwise from the left top corner.
    #[inline]
    pub fn corners(&self) -> [na::Point2<f32>; 4] {
        [
            na::Point2::new(self.left(), self.top()),
            na::Point2::new(self.right(), self.top()),
            na::Point2::new(self.right(), self.bottom()),
            na::Point2::new(self.left(), self.bottom()),
        ]
    }

    /// Edges are inclusive.
    #[inline]
    pub fn contains_point(&self, p: &na::Point2<f32>) -> bool {
        self.left() <= p.x && p.x <= self.right() && self.top() <= p.y && p.y <= self.bottom()
    }

    /// Exact containment: every corner of `other` lies inside `self`.
    #[inline]
    pub fn contains(&self, other: &BBox<Ltrb>) -> bool {
        other.corners().iter().all(|c| self.contains_point(c))
    }
}
