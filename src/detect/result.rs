use crate::geometry::NormalizedRect;

/// One candidate object as reported by a model, before any conversion.
///
/// `bbox` is in normalized model space (bottom-left origin).
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: NormalizedRect,
    pub confidence: f32,
    pub label: Option<String>,
}

/// A ranked class label attached to a recognized object.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassLabel {
    pub identifier: String,
    pub confidence: f32,
}

/// Object with class labels, best label first.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizedObservation {
    pub bbox: NormalizedRect,
    pub confidence: f32,
    pub labels: Vec<ClassLabel>,
}

/// Object located by a model that does not classify.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectObservation {
    pub bbox: NormalizedRect,
    pub confidence: f32,
}

/// What a provider produced for one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InferenceOutput {
    /// Labelled detections from a classifying detector.
    Detected(Vec<RecognizedObservation>),
    /// Boxes only.
    DetectedUnlabelled(Vec<ObjectObservation>),
    /// The model does not produce object observations at all.
    #[default]
    None,
}

impl InferenceOutput {
    pub fn len(&self) -> usize {
        match self {
            InferenceOutput::Detected(obs) => obs.len(),
            InferenceOutput::DetectedUnlabelled(obs) => obs.len(),
            InferenceOutput::None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into raw detections, keeping model order.
    ///
    /// Recognized objects carry their top-ranked label.
    pub fn into_raw_detections(self) -> Vec<RawDetection> {
        match self {
            InferenceOutput::Detected(obs) => obs
                .into_iter()
                .map(|o| RawDetection {
                    bbox: o.bbox,
                    confidence: o.confidence,
                    label: o.labels.into_iter().next().map(|l| l.identifier),
                })
                .collect(),
            InferenceOutput::DetectedUnlabelled(obs) => obs
                .into_iter()
                .map(|o| RawDetection {
                    bbox: o.bbox,
                    confidence: o.confidence,
                    label: None,
                })
                .collect(),
            InferenceOutput::None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> NormalizedRect {
        NormalizedRect::new(0.1, 0.2, 0.3, 0.4)
    }

    #[test]
    fn recognized_objects_take_top_label() {
        let output = InferenceOutput::Detected(vec![
            RecognizedObservation {
                bbox: bbox(),
                confidence: 0.7,
                labels: vec![
                    ClassLabel {
                        identifier: "cat".into(),
                        confidence: 0.6,
                    },
                    ClassLabel {
                        identifier: "dog".into(),
                        confidence: 0.3,
                    },
                ],
            },
            RecognizedObservation {
                bbox: bbox(),
                confidence: 0.5,
                labels: vec![],
            },
        ]);
        assert_eq!(output.len(), 2);
        let raw = output.into_raw_detections();
        assert_eq!(raw[0].label.as_deref(), Some("cat"));
        assert_eq!(raw[0].confidence, 0.7);
        assert_eq!(raw[1].label, None);
    }

    #[test]
    fn unlabelled_and_none_outputs() {
        let output = InferenceOutput::DetectedUnlabelled(vec![ObjectObservation {
            bbox: bbox(),
            confidence: 0.2,
        }]);
        let raw = output.into_raw_detections();
        assert_eq!(raw.len(), 1);
        assert!(raw[0].label.is_none());

        assert!(InferenceOutput::None.is_empty());
        assert!(InferenceOutput::None.into_raw_detections().is_empty());
    }
}
