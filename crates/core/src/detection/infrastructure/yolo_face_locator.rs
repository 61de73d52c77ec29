//! Single-face YOLO locator using ONNX Runtime via `ort`.
//!
//! Letterboxes the canvas into the model input, parses pose rows and keeps
//! only the most confident face with its 5 keypoints.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_detector::FaceBox;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::canvas::CanonicalCanvas;

use super::execution_provider::{build_session, ensure_outputs};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Number of keypoints per detection (5 landmarks × 3 values each: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Row width of the face-pose head: box (4) + score (1) + keypoints.
const POSE_FEATURES: usize = 5 + NUM_KEYPOINT_VALUES;

/// Box, landmarks and score of the best face on a canvas, in canvas pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatedFace {
    pub bbox: FaceBox,
    pub landmarks: FaceLandmarks,
    pub score: f64,
}

pub struct YoloFaceLocator {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl YoloFaceLocator {
    /// Load a YOLO face-pose ONNX model.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }

    pub fn locate(
        &self,
        canvas: &CanonicalCanvas,
    ) -> Result<Option<LocatedFace>, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = letterbox(canvas, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        ensure_outputs(outputs.len(), "YOLO")?;
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        best_detection(data, tensor.shape(), self.confidence, &letterbox)
    }
}

/// Mapping between canvas pixels and model input pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Letterbox-resize a canvas to `target_size` × `target_size`, NCHW float32.
fn letterbox(canvas: &CanonicalCanvas, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let edge = canvas.size() as f64;
    let scale = target_size as f64 / edge;
    let new_edge = ((edge * scale).round() as u32).min(target_size);
    let pad = (target_size - new_edge) / 2;

    // Pad with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = canvas.as_ndarray();
    let src_edge = canvas.size() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_edge as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_edge - 1);
        for x in 0..new_edge as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_edge - 1);
            let ty = pad as usize + y;
            let tx = pad as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad as f64,
            pad_y: pad as f64,
        },
    )
}

/// Pick the most confident row at or above `confidence`.
///
/// YOLO output shape is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; rows are
/// `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn best_detection(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Option<LocatedFace>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = if shape[2] == POSE_FEATURES {
        false
    } else if shape[1] == POSE_FEATURES {
        true
    } else {
        shape[1] < shape[2]
    };
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too short for shape {shape:?}").into());
    }
    if num_feats < 5 {
        return Ok(None);
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let best = (0..num_dets)
        .filter(|&i| value(i, 4) >= confidence)
        .max_by(|&a, &b| {
            value(a, 4)
                .partial_cmp(&value(b, 4))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    let Some(i) = best else {
        return Ok(None);
    };

    let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
    let (x1, y1) = letterbox.to_canvas(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = letterbox.to_canvas(cx + w / 2.0, cy + h / 2.0);

    // Invisible keypoints stay at (0, 0)
    let mut points = [(0.0f64, 0.0f64); 5];
    if num_feats >= POSE_FEATURES {
        for (k, point) in points.iter_mut().enumerate() {
            if value(i, 5 + k * 3 + 2) >= KEYPOINT_CONF_THRESH {
                *point = letterbox.to_canvas(value(i, 5 + k * 3), value(i, 5 + k * 3 + 1));
            }
        }
    }

    Ok(Some(LocatedFace {
        bbox: FaceBox { x1, y1, x2, y2 },
        landmarks: FaceLandmarks::new(points),
        score: value(i, 4),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: Letterbox = Letterbox {
        scale: 1.0,
        pad_x: 0.0,
        pad_y: 0.0,
    };

    fn row(cx: f32, cy: f32, w: f32, h: f32, conf: f32, kp_conf: f32) -> Vec<f32> {
        let mut r = vec![cx, cy, w, h, conf];
        for k in 0..5 {
            r.extend_from_slice(&[cx - 10.0 + k as f32 * 5.0, cy, kp_conf]);
        }
        r
    }

    #[test]
    fn test_letterbox_scales_square_canvas_without_padding() {
        let canvas = CanonicalCanvas::filled(256, [255, 255, 255]);
        let (tensor, lb) = letterbox(&canvas, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 2.5);
        assert_eq!(lb.pad_x, 0.0);
        assert!((tensor[[0, 0, 639, 639]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let canvas = CanonicalCanvas::filled(256, [0, 51, 255]);
        let (tensor, _) = letterbox(&canvas, 320);
        assert!((tensor[[0, 0, 10, 10]] - 0.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 10, 10]] - 0.2).abs() < 1e-6);
        assert!((tensor[[0, 2, 10, 10]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_best_detection_picks_highest_confidence() {
        let mut data = row(50.0, 50.0, 20.0, 20.0, 0.6, 0.9);
        data.extend(row(120.0, 100.0, 40.0, 60.0, 0.9, 0.9));
        data.extend(row(200.0, 200.0, 10.0, 10.0, 0.3, 0.9));

        let face = best_detection(&data, &[1, 3, 20], 0.5, &IDENTITY)
            .unwrap()
            .unwrap();

        assert_relative_eq!(face.score, 0.9, epsilon = 1e-6);
        assert_relative_eq!(face.bbox.x1, 100.0);
        assert_relative_eq!(face.bbox.y1, 70.0);
        assert_relative_eq!(face.bbox.x2, 140.0);
        assert_relative_eq!(face.bbox.y2, 130.0);
        assert_eq!(face.landmarks.visible_count(), 5);
    }

    #[test]
    fn test_best_detection_below_threshold_is_none() {
        let data = row(50.0, 50.0, 20.0, 20.0, 0.2, 0.9);
        let result = best_detection(&data, &[1, 1, 20], 0.5, &IDENTITY).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_best_detection_reads_transposed_layout() {
        // Two detections stored feature-major: shape [1, 20, 2]
        let a = row(50.0, 50.0, 20.0, 20.0, 0.4, 0.9);
        let b = row(80.0, 90.0, 30.0, 30.0, 0.8, 0.9);
        let mut data = Vec::new();
        for f in 0..20 {
            data.push(a[f]);
            data.push(b[f]);
        }

        let face = best_detection(&data, &[1, 20, 2], 0.25, &IDENTITY)
            .unwrap()
            .unwrap();

        assert_eq!(face.bbox.center(), (80.0, 90.0));
    }

    #[test]
    fn test_low_confidence_keypoints_are_invisible() {
        let data = row(50.0, 50.0, 20.0, 20.0, 0.9, 0.1);
        let face = best_detection(&data, &[1, 1, 20], 0.5, &IDENTITY)
            .unwrap()
            .unwrap();
        assert!(!face.landmarks.has_visible());
    }

    #[test]
    fn test_coordinates_map_back_through_letterbox() {
        let lb = Letterbox {
            scale: 2.5,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let data = row(250.0, 250.0, 100.0, 100.0, 0.9, 0.9);
        let face = best_detection(&data, &[1, 1, 20], 0.5, &lb).unwrap().unwrap();
        assert_relative_eq!(face.bbox.x1, 80.0);
        assert_relative_eq!(face.bbox.x2, 120.0);
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        assert!(best_detection(&[0.0; 4], &[4], 0.5, &IDENTITY).is_err());
    }
}
