use crate::models::{CurvePoint, Curves};

/// 256-entry byte lookup table.
pub type Lut = [u8; 256];

pub const IDENTITY_LUT: Lut = {
    let mut lut = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        lut[i] = i as u8;
        i += 1;
    }
    lut
};

/// Piecewise-linear LUT through the control points. Points need not be sorted;
/// inputs below the first point extrapolate along the first segment, inputs
/// above the last point along the last segment.
///
/// Callers validate that there are at least two points.
pub fn build_lut(points: &[CurvePoint]) -> Lut {
    let mut sorted: Vec<CurvePoint> = points.to_vec();
    sorted.sort_by(|a, b| a.x().total_cmp(&b.x()));

    let mut lut = [0u8; 256];
    if sorted.len() < 2 {
        return IDENTITY_LUT;
    }
    let first = (sorted[0], sorted[1]);
    let last = (sorted[sorted.len() - 2], sorted[sorted.len() - 1]);

    for (i, out) in lut.iter_mut().enumerate() {
        let x = i as f32;
        let (lo, hi) = if x < first.0.x() {
            first
        } else {
            sorted
                .windows(2)
                .find(|pair| pair[0].x() <= x && x <= pair[1].x())
                .map(|pair| (pair[0], pair[1]))
                .unwrap_or(last)
        };

        let value = if hi.x() == lo.x() {
            lo.y()
        } else {
            let t = (x - lo.x()) / (hi.x() - lo.x());
            (lo.y() + t * (hi.y() - lo.y())).round()
        };
        *out = value.clamp(0.0, 255.0) as u8;
    }
    lut
}

/// The per-channel tables of one curve stage. Missing channels stay `None`
/// on the CPU path and are uploaded as identity on the GPU path; both compose
/// to the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLuts {
    pub rgb: Option<Lut>,
    pub r: Option<Lut>,
    pub g: Option<Lut>,
    pub b: Option<Lut>,
}

impl CurveLuts {
    pub fn from_curves(curves: &Curves) -> Self {
        Self {
            rgb: curves.rgb.as_deref().map(build_lut),
            r: curves.r.as_deref().map(build_lut),
            g: curves.g.as_deref().map(build_lut),
            b: curves.b.as_deref().map(build_lut),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rgb.is_none() && self.r.is_none() && self.g.is_none() && self.b.is_none()
    }

    /// Master curve first, then the channel curve on top.
    #[inline]
    pub fn apply(&self, px: &mut [u8]) {
        if let Some(lut) = &self.rgb {
            px[0] = lut[px[0] as usize];
            px[1] = lut[px[1] as usize];
            px[2] = lut[px[2] as usize];
        }
        if let Some(lut) = &self.r {
            px[0] = lut[px[0] as usize];
        }
        if let Some(lut) = &self.g {
            px[1] = lut[px[1] as usize];
        }
        if let Some(lut) = &self.b {
            px[2] = lut[px[2] as usize];
        }
    }

    /// Four tables packed as `u32` (rgb, r, g, b), the layout the curves shader reads.
    pub fn packed(&self) -> Vec<u32> {
        [&self.rgb, &self.r, &self.g, &self.b]
            .into_iter()
            .flat_map(|lut| (*lut).unwrap_or(IDENTITY_LUT).map(u32::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f32, f32)]) -> Vec<CurvePoint> {
        raw.iter().map(|&(x, y)| CurvePoint(x, y)).collect()
    }

    #[test]
    fn diagonal_is_identity() {
        let lut = build_lut(&pts(&[(0.0, 0.0), (255.0, 255.0)]));
        assert_eq!(lut, IDENTITY_LUT);
    }

    #[test]
    fn unsorted_points_are_sorted_first() {
        let a = build_lut(&pts(&[(255.0, 200.0), (0.0, 20.0), (128.0, 150.0)]));
        let b = build_lut(&pts(&[(0.0, 20.0), (128.0, 150.0), (255.0, 200.0)]));
        assert_eq!(a, b);
        assert_eq!(a[0], 20);
        assert_eq!(a[128], 150);
        assert_eq!(a[255], 200);
    }

    #[test]
    fn interpolates_and_rounds() {
        let lut = build_lut(&pts(&[(0.0, 0.0), (100.0, 50.0), (255.0, 255.0)]));
        assert_eq!(lut[50], 25);
        assert_eq!(lut[1], 1); // 0.5 rounds away from zero
    }

    #[test]
    fn extrapolates_outside_point_span_and_clamps() {
        let lut = build_lut(&pts(&[(50.0, 100.0), (150.0, 200.0)]));
        assert_eq!(lut[0], 50);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn extremes_follow_the_outer_segments() {
        let lut = build_lut(&pts(&[(50.0, 100.0), (100.0, 100.0), (200.0, 250.0)]));
        // Flat first segment holds below x = 50.
        assert_eq!(lut[0], 100);
        assert_eq!(lut[49], 100);
        // Last segment rises 1.5 per step and clamps.
        assert_eq!(lut[200], 250);
        assert_eq!(lut[210], 255);
        assert_eq!(lut[150], 175);
    }

    #[test]
    fn vertical_segment_takes_lower_y() {
        let lut = build_lut(&pts(&[(0.0, 0.0), (128.0, 40.0), (128.0, 220.0), (255.0, 255.0)]));
        assert_eq!(lut[128], 40);
    }

    #[test]
    fn master_and_channel_curves_compose() {
        let curves = Curves {
            rgb: Some(pts(&[(0.0, 0.0), (255.0, 127.5)])),
            r: Some(pts(&[(0.0, 255.0), (255.0, 0.0)])),
            g: None,
            b: None,
        };
        let luts = CurveLuts::from_curves(&curves);
        let mut px = [200u8, 200, 200, 255];
        luts.apply(&mut px);
        assert_eq!(px[1], 100);
        assert_eq!(px[0], 255 - 100);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn packed_layout_uses_identity_for_missing_channels() {
        let luts = CurveLuts {
            rgb: None,
            r: Some([7u8; 256]),
            g: None,
            b: None,
        };
        let packed = luts.packed();
        assert_eq!(packed.len(), 1024);
        assert_eq!(packed[10], 10);
        assert_eq!(packed[256 + 10], 7);
    }
}
