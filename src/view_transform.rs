use nalgebra as na;

use crate::error::Error;
use crate::Float;

/// Fixed projective mapping from the image plane onto the road's ground plane.
///
/// Solved once from four image points and the four ground-plane points they
/// correspond to. Ground units are whatever the target quadrilateral uses;
/// speed estimation treats them as meters.
#[derive(Debug, Clone)]
pub struct ViewTransform<F: Float = f32> {
    m: na::Matrix3<F>,
}

impl<F: Float> ViewTransform<F> {
    pub fn new(source: [na::Point2<F>; 4], target: [na::Point2<F>; 4]) -> Result<Self, Error> {
        let mut a = na::SMatrix::<F, 8, 8>::zeros();
        let mut b = na::SVector::<F, 8>::zeros();

        for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
            let (x, y, u, v) = (s.x, s.y, t.x, t.y);
            let r = i * 2;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = F::one();
            a[(r, 6)] = -(u * x);
            a[(r, 7)] = -(u * y);
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = F::one();
            a[(r + 1, 6)] = -(v * x);
            a[(r + 1, 7)] = -(v * y);
            b[r + 1] = v;
        }

        let lu = a.lu();
        if !lu.is_invertible() {
            return Err(Error::DegenerateCalibration);
        }

        let h = lu.solve(&b).ok_or(Error::DegenerateCalibration)?;
        if !h.iter().all(|x| x.is_finite()) {
            return Err(Error::DegenerateCalibration);
        }

        let m = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], F::one());

        Ok(Self { m })
    }

    /// Convenience for calibration read from configuration.
    pub fn from_arrays(source: [[F; 2]; 4], target: [[F; 2]; 4]) -> Result<Self, Error> {
        let pt = |p: [F; 2]| na::Point2::new(p[0], p[1]);

        Self::new(source.map(pt), target.map(pt))
    }

    #[inline]
    pub fn matrix(&self) -> &na::Matrix3<F> {
        &self.m
    }

    /// Points on the horizon line map to infinity; the non-finite result is
    /// returned as is.
    #[inline]
    pub fn transform_point(&self, p: na::Point2<F>) -> na::Point2<F> {
        let h = self.m * na::Vector3::new(p.x, p.y, F::one());

        na::Point2::new(h.x / h.z, h.y / h.z)
    }

    /// Empty input is a frame without detections and yields an empty result.
    pub fn transform(&self, points: &[na::Point2<F>]) -> Vec<na::Point2<F>> {
        points.iter().map(|p| self.transform_point(*p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: [[f32; 2]; 4] = [[576., 555.], [1054., 512.], [3080., 1155.], [1017., 1493.]];
    const TARGET: [[f32; 2]; 4] = [[0., 0.], [2., 0.], [2., 38.], [0., 38.]];

    #[test]
    fn maps_calibration_corners_onto_target() {
        let vt = ViewTransform::<f64>::from_arrays(
            SOURCE.map(|p| [p[0] as f64, p[1] as f64]),
            TARGET.map(|p| [p[0] as f64, p[1] as f64]),
        )
        .unwrap();

        for (s, t) in SOURCE.iter().zip(TARGET.iter()) {
            let p = vt.transform_point(na::Point2::new(s[0] as f64, s[1] as f64));
            assert!((p.x - t[0] as f64).abs() < 1e-6, "{:?} -> {:?}", s, p);
            assert!((p.y - t[1] as f64).abs() < 1e-6, "{:?} -> {:?}", s, p);
        }
    }

    #[test]
    fn scaling_square() {
        let vt = ViewTransform::<f32>::from_arrays(
            [[0., 0.], [1., 0.], [1., 1.], [0., 1.]],
            [[0., 0.], [2., 0.], [2., 2.], [0., 2.]],
        )
        .unwrap();

        let out = vt.transform(&[na::Point2::new(0.5, 0.25), na::Point2::new(1.0, 1.0)]);
        assert_eq!(out.len(), 2);
        assert!((out[0].x - 1.0).abs() < 1e-5);
        assert!((out[0].y - 0.5).abs() < 1e-5);
        assert!((out[1].x - 2.0).abs() < 1e-5);
        assert!((out[1].y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let vt = ViewTransform::<f32>::from_arrays(SOURCE, TARGET).unwrap();
        assert!(vt.transform(&[]).is_empty());
    }

    #[test]
    fn collapsed_source_is_rejected() {
        let res = ViewTransform::<f32>::from_arrays([[0., 0.]; 4], TARGET);
        assert!(matches!(res, Err(Error::DegenerateCalibration)));
    }
}
