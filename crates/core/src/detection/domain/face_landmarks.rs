//! 5-point face landmarks: eyes, nose tip, mouth corners.
//!
//! The weighted centroid anchors the descriptor crop. Nose counts 3x, eyes 2x
//! and mouth corners 1x, since the nose stays put best under head rotation.

const NOSE: usize = 2;

/// Landmark weights: [left_eye, right_eye, nose, left_mouth, right_mouth].
const WEIGHTS: [f64; 5] = [2.0, 2.0, 3.0, 1.0, 1.0];

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn nose(&self) -> Option<(f64, f64)> {
        let p = self.points[NOSE];
        (p.0 > 0.0).then_some(p)
    }

    pub fn visible_count(&self) -> usize {
        self.points.iter().filter(|(x, _)| *x > 0.0).count()
    }

    pub fn has_visible(&self) -> bool {
        self.visible_count() > 0
    }

    /// Weighted centroid of visible landmarks, `None` when nothing is visible.
    pub fn center(&self) -> Option<(f64, f64)> {
        let mut wx_sum = 0.0;
        let mut wy_sum = 0.0;
        let mut w_sum = 0.0;

        for (i, (x, y)) in self.points.iter().enumerate() {
            if *x > 0.0 {
                let w = WEIGHTS[i];
                wx_sum += x * w;
                wy_sum += y * w;
                w_sum += w;
            }
        }

        if w_sum == 0.0 {
            return None;
        }

        Some((wx_sum / w_sum, wy_sum / w_sum))
    }
}
