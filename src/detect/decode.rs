//! Decoding of flat detector output rows.
//!
//! ONNX detectors in the catalog emit `[.., N, 6]` tensors whose rows are
//! `(cx, cy, w, h, score, class)`, normalized to the input with a top-left
//! origin. Anything else is rejected rather than reinterpreted.
#![cfg_attr(not(feature = "backend-tract"), allow(dead_code))]

use anyhow::{anyhow, Result};

use super::result::{ClassLabel, InferenceOutput, ObjectObservation, RecognizedObservation};
use crate::geometry::NormalizedRect;

pub(crate) const ROW_LEN: usize = 6;

/// Turn an output tensor (`shape`, row-major `values`) into observations.
///
/// Rows scored below `threshold` are skipped. With no `labels` the result is
/// unlabelled; a class index outside `labels` yields an observation with no
/// label.
pub(crate) fn decode_rows(
    shape: &[usize],
    values: &[f32],
    threshold: f32,
    labels: &[String],
) -> Result<InferenceOutput> {
    if shape.len() < 2 || shape.last() != Some(&ROW_LEN) {
        return Err(anyhow!(
            "model output shape {:?} is not [.., N, {}]",
            shape,
            ROW_LEN
        ));
    }
    if shape.iter().product::<usize>() != values.len() {
        return Err(anyhow!(
            "model output shape {:?} does not match {} values",
            shape,
            values.len()
        ));
    }

    let rows = values
        .chunks_exact(ROW_LEN)
        .filter(|row| row[4] >= threshold);

    if labels.is_empty() {
        let observations = rows
            .map(|row| ObjectObservation {
                bbox: to_model_space(row),
                confidence: row[4],
            })
            .collect();
        return Ok(InferenceOutput::DetectedUnlabelled(observations));
    }

    let observations = rows
        .map(|row| {
            let labels = labels
                .get(row[5].max(0.0) as usize)
                .map(|identifier| ClassLabel {
                    identifier: identifier.clone(),
                    confidence: row[4],
                })
                .into_iter()
                .collect();
            RecognizedObservation {
                bbox: to_model_space(row),
                confidence: row[4],
                labels,
            }
        })
        .collect();
    Ok(InferenceOutput::Detected(observations))
}

/// Centre/size, top-left origin -> min corner, bottom-left origin.
fn to_model_space(row: &[f32]) -> NormalizedRect {
    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    let top = cy - h / 2.0;
    NormalizedRect::new(cx - w / 2.0, 1.0 - top - h, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_convert_to_bottom_left_origin() {
        let rect = to_model_space(&[0.5, 0.25, 0.2, 0.1, 0.9, 0.0]);
        assert!((rect.min_x - 0.4).abs() < 1e-6);
        assert!((rect.min_y - 0.7).abs() < 1e-6);
        assert!((rect.width - 0.2).abs() < 1e-6);
        assert!((rect.height - 0.1).abs() < 1e-6);
    }

    #[test]
    fn labelled_rows_are_thresholded() {
        let labels = vec!["person".to_string(), "car".to_string()];
        let values = [
            0.5, 0.5, 0.2, 0.2, 0.9, 1.0, //
            0.2, 0.2, 0.1, 0.1, 0.1, 0.0, //
            0.7, 0.7, 0.1, 0.1, 0.6, 7.0,
        ];
        let output = decode_rows(&[1, 3, 6], &values, 0.25, &labels).unwrap();
        let raw = output.into_raw_detections();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].label.as_deref(), Some("car"));
        assert_eq!(raw[1].label, None);
    }

    #[test]
    fn unlabelled_when_no_class_names() {
        let values = [0.5, 0.5, 0.2, 0.2, 0.9, 3.0];
        let output = decode_rows(&[1, 6], &values, 0.25, &[]).unwrap();
        assert!(matches!(output, InferenceOutput::DetectedUnlabelled(ref obs) if obs.len() == 1));
    }

    #[test]
    fn raw_yolo_head_is_rejected() {
        // 85 columns per row: divisible by 6 overall, still the wrong layout.
        let values = vec![0.0; 2 * 3 * 85];
        let err = decode_rows(&[1, 6, 85], &values, 0.25, &[]).unwrap_err();
        assert!(err.to_string().contains("[1, 6, 85]"), "{err}");
        assert!(values.len() % ROW_LEN == 0);

        assert!(decode_rows(&[6], &[0.0; 6], 0.25, &[]).is_err());
        assert!(decode_rows(&[2, 6], &[0.0; 6], 0.25, &[]).is_err());
    }
}
