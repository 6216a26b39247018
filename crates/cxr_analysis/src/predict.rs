//! Thresholded multi-label prediction.

use std::fmt;

use burn::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use cxr_core::{class_index, CoreError, Result, CLASS_NAMES, NUM_CLASSES};

/// Decision threshold, guaranteed to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Threshold(f32);

impl Threshold {
    /// Threshold used when the caller supplies none.
    pub const DEFAULT: Threshold = Threshold(0.5);

    /// Create a threshold.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidThreshold`] for NaN or values outside `[0, 1]`.
    pub fn new(value: f32) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidThreshold { value })
        }
    }

    /// The raw value.
    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f32> for Threshold {
    type Error = CoreError;

    fn try_from(value: f32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f32 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-class probabilities, index-aligned with [`CLASS_NAMES`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbabilities {
    values: [f32; NUM_CLASSES],
}

impl ClassProbabilities {
    /// Build from a vector of exactly [`NUM_CLASSES`] values in `[0, 1]`.
    pub fn from_vec(values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let values: [f32; NUM_CLASSES] = values.try_into().map_err(|_| CoreError::InvalidShape {
            expected: format!("{} probabilities", NUM_CLASSES),
            got: format!("{} values", len),
        })?;

        if let Some(bad) = values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(CoreError::Other(format!("probability {} outside [0, 1]", bad)));
        }

        Ok(Self { values })
    }

    /// Read the first row of a `(batch, NUM_CLASSES)` classifier output.
    pub fn from_tensor<B: Backend>(probs: Tensor<B, 2>) -> Result<Self> {
        let [batch, n] = probs.dims();
        if batch == 0 || n != NUM_CLASSES {
            return Err(CoreError::InvalidShape {
                expected: format!("(1, {})", NUM_CLASSES),
                got: format!("({}, {})", batch, n),
            });
        }

        let row = probs
            .slice([0..1, 0..n])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| CoreError::Other(format!("{:?}", e)))?;
        Self::from_vec(row)
    }

    /// Probability of the class at `index`.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// All probabilities in class-index order.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Index of the highest probability; ties go to the lowest index.
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.values.iter().enumerate().skip(1) {
            if p > self.values[best] {
                best = i;
            }
        }
        best
    }

    /// The `k` most probable classes, highest first; ties keep index order.
    pub fn top_k(&self, k: usize) -> Vec<Prediction> {
        let mut order: Vec<usize> = (0..NUM_CLASSES).collect();
        order.sort_by(|&a, &b| self.values[b].total_cmp(&self.values[a]));
        order
            .into_iter()
            .take(k)
            .map(|i| Prediction::new(i, self.values[i]))
            .collect()
    }
}

/// One positive label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Output index of the class.
    pub class_index: usize,
    /// Class name.
    pub label: &'static str,
    /// Sigmoid probability.
    pub probability: f32,
}

impl Prediction {
    fn new(class_index: usize, probability: f32) -> Self {
        Self {
            class_index,
            label: CLASS_NAMES[class_index],
            probability,
        }
    }
}

/// Positive labels for one image, in class-index order.
///
/// Never empty: when no class reaches the threshold the single most
/// probable class is included and [`PredictionSet::is_fallback`] is set.
///
/// Serialises as a `{label: probability}` object in class-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    predictions: Vec<Prediction>,
    threshold: Threshold,
    fallback: bool,
}

impl PredictionSet {
    /// Predictions in class-index order.
    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter()
    }

    /// Number of positive labels (at least one).
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the set holds no predictions.
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Class names of the positive labels.
    pub fn labels(&self) -> Vec<&'static str> {
        self.predictions.iter().map(|p| p.label).collect()
    }

    /// Output indices of the positive labels.
    pub fn class_indices(&self) -> Vec<usize> {
        self.predictions.iter().map(|p| p.class_index).collect()
    }

    /// Probability of `label`, if it is positive.
    ///
    /// Unknown class names give `None`.
    pub fn get(&self, label: &str) -> Option<f32> {
        let index = class_index(label)?;
        self.predictions
            .iter()
            .find(|p| p.class_index == index)
            .map(|p| p.probability)
    }

    /// Whether `label` is positive.
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// The threshold the set was derived with.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Whether the set came from the argmax fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl<'a> IntoIterator for &'a PredictionSet {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.predictions.iter()
    }
}

impl Serialize for PredictionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.predictions.len()))?;
        for p in &self.predictions {
            map.serialize_entry(p.label, &p.probability)?;
        }
        map.end()
    }
}

/// Select every class with `probability >= threshold`.
///
/// If none qualifies, the class with the highest probability is returned
/// on its own (first index on ties).
pub fn predict(probs: &ClassProbabilities, threshold: Threshold) -> PredictionSet {
    let t = threshold.value();
    let predictions: Vec<Prediction> = probs
        .as_slice()
        .iter()
        .enumerate()
        .filter(|(_, p)| **p >= t)
        .map(|(i, &p)| Prediction::new(i, p))
        .collect();

    if predictions.is_empty() {
        let best = probs.argmax();
        tracing::debug!(class = CLASS_NAMES[best], threshold = t, "No class above threshold, using argmax");
        return PredictionSet {
            predictions: vec![Prediction::new(best, probs.as_slice()[best])],
            threshold,
            fallback: true,
        };
    }

    PredictionSet {
        predictions,
        threshold,
        fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;
    use proptest::prelude::*;

    fn scenario() -> ClassProbabilities {
        let mut values = vec![0.1f32; NUM_CLASSES];
        values[0] = 0.9;
        values[2] = 0.5;
        ClassProbabilities::from_vec(values).unwrap()
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(matches!(
            Threshold::new(1.5),
            Err(CoreError::InvalidThreshold { value }) if value == 1.5
        ));
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::new(f32::NAN).is_err());
        assert_eq!(Threshold::default().value(), 0.5);
    }

    #[test]
    fn test_threshold_serde() {
        let t: Threshold = serde_json::from_str("0.3").unwrap();
        assert_eq!(t.value(), 0.3);
        assert!(serde_json::from_str::<Threshold>("2.0").is_err());
    }

    #[test]
    fn test_probabilities_length() {
        assert!(ClassProbabilities::from_vec(vec![0.5; 13]).is_err());
        assert!(ClassProbabilities::from_vec(vec![0.5; 15]).is_err());
        assert!(ClassProbabilities::from_vec(vec![1.5; 14]).is_err());
    }

    #[test]
    fn test_scenario_threshold_half() {
        let set = predict(&scenario(), Threshold::new(0.5).unwrap());
        assert_eq!(set.labels(), vec!["Atelectasis", "Effusion"]);
        assert_eq!(set.get("Atelectasis"), Some(0.9));
        assert_eq!(set.get("Effusion"), Some(0.5));
        assert!(!set.is_fallback());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_get_negative_and_unknown_labels() {
        let set = predict(&scenario(), Threshold::new(0.5).unwrap());
        assert_eq!(set.get("Cardiomegaly"), None);
        assert_eq!(set.get("Pleural Effusion"), None);
        assert_eq!(set.get("effusion"), None);
        assert!(!set.contains("Hernia"));
    }

    #[test]
    fn test_all_zero_falls_back_to_first() {
        let probs = ClassProbabilities::from_vec(vec![0.0; NUM_CLASSES]).unwrap();
        let set = predict(&probs, Threshold::DEFAULT);
        assert_eq!(set.len(), 1);
        assert_eq!(set.class_indices(), vec![0]);
        assert_eq!(set.get("Atelectasis"), Some(0.0));
        assert!(set.is_fallback());
    }

    #[test]
    fn test_fallback_picks_max() {
        let mut values = vec![0.2f32; NUM_CLASSES];
        values[6] = 0.4;
        values[9] = 0.4;
        let set = predict(&ClassProbabilities::from_vec(values).unwrap(), Threshold::DEFAULT);
        assert_eq!(set.labels(), vec!["Pneumonia"]);
    }

    #[test]
    fn test_serialises_in_index_order() {
        let set = predict(&scenario(), Threshold::new(0.05).unwrap());
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.starts_with("{\"Atelectasis\":0.9,\"Cardiomegaly\":0.1,\"Effusion\":0.5"));
        assert!(json.ends_with("\"Hernia\":0.1}"));
    }

    #[test]
    fn test_top_k() {
        let top = scenario().top_k(3);
        assert_eq!(top[0].label, "Atelectasis");
        assert_eq!(top[1].label, "Effusion");
        // ties keep index order
        assert_eq!(top[2].label, "Cardiomegaly");
    }

    #[test]
    fn test_from_tensor() {
        let device = Default::default();
        let mut values = vec![0.25f32; NUM_CLASSES];
        values[13] = 0.75;
        let tensor = Tensor::<NdArray, 2>::from_data(TensorData::new(values, [1, NUM_CLASSES]), &device);

        let probs = ClassProbabilities::from_tensor(tensor).unwrap();
        assert_eq!(probs.get(13), Some(0.75));
        assert_eq!(probs.argmax(), 13);

        let wrong = Tensor::<NdArray, 2>::zeros([1, 3], &device);
        assert!(ClassProbabilities::from_tensor(wrong).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_never_empty(values in prop::collection::vec(0.0f32..=1.0, NUM_CLASSES), t in 0.0f32..=1.0) {
            let probs = ClassProbabilities::from_vec(values).unwrap();
            let set = predict(&probs, Threshold::new(t).unwrap());
            prop_assert!(!set.is_empty());
        }

        #[test]
        fn prop_monotonic(values in prop::collection::vec(0.0f32..=1.0, NUM_CLASSES), a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let probs = ClassProbabilities::from_vec(values).unwrap();
            let low = predict(&probs, Threshold::new(lo).unwrap());
            let high = predict(&probs, Threshold::new(hi).unwrap());

            if !low.is_fallback() && !high.is_fallback() {
                for label in high.labels() {
                    prop_assert!(low.contains(label));
                }
            }
        }

        #[test]
        fn prop_threshold_derived_members_clear_threshold(values in prop::collection::vec(0.0f32..=1.0, NUM_CLASSES), t in 0.0f32..=1.0) {
            let probs = ClassProbabilities::from_vec(values).unwrap();
            let set = predict(&probs, Threshold::new(t).unwrap());
            if !set.is_fallback() {
                prop_assert!(set.iter().all(|p| p.probability >= t));
            } else {
                prop_assert_eq!(set.len(), 1);
            }
        }
    }
}
