//! Plain-text probability report.
//!
//! Lists every class with its probability and whether it was selected,
//! for command-line output.

use serde::Serialize;

use crate::predict::{ClassProbabilities, PredictionSet};
use cxr_core::CLASS_NAMES;

/// One class line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    /// Class name.
    pub label: &'static str,
    /// Sigmoid probability.
    pub probability: f32,
    /// Whether the class is in the prediction set.
    pub positive: bool,
}

/// All class probabilities alongside the selected labels.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    /// One row per class, in class-index order.
    pub rows: Vec<ReportRow>,
    /// Threshold applied.
    pub threshold: f32,
    /// Whether the selection came from the argmax fallback.
    pub fallback: bool,
}

impl PredictionReport {
    /// Build a report from probabilities and the set derived from them.
    pub fn new(probs: &ClassProbabilities, predictions: &PredictionSet) -> Self {
        let positives = predictions.class_indices();
        let rows = probs
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, &probability)| ReportRow {
                label: CLASS_NAMES[i],
                probability,
                positive: positives.contains(&i),
            })
            .collect();

        Self {
            rows,
            threshold: predictions.threshold().value(),
            fallback: predictions.is_fallback(),
        }
    }

    /// Number of selected classes.
    pub fn n_positive(&self) -> usize {
        self.rows.iter().filter(|r| r.positive).count()
    }

    /// Display the report as a formatted string.
    pub fn to_string_table(&self) -> String {
        let mut output = String::new();

        output.push_str("               class  probability  prediction\n\n");

        for row in &self.rows {
            let mark = if row.positive { "positive" } else { "-" };
            output.push_str(&format!(
                "{:>20}       {:.4}  {:>10}\n",
                row.label, row.probability, mark
            ));
        }

        output.push('\n');
        output.push_str(&format!("{:>20}       {:.4}\n", "threshold", self.threshold));
        if self.fallback {
            output.push_str(&format!(
                "{:>20}  no class reached the threshold, reporting the most probable\n",
                "note"
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{predict, Threshold};
    use cxr_core::NUM_CLASSES;

    #[test]
    fn test_report_rows() {
        let mut values = vec![0.1f32; NUM_CLASSES];
        values[3] = 0.8;
        let probs = ClassProbabilities::from_vec(values).unwrap();
        let set = predict(&probs, Threshold::DEFAULT);

        let report = PredictionReport::new(&probs, &set);
        assert_eq!(report.rows.len(), NUM_CLASSES);
        assert_eq!(report.n_positive(), 1);
        assert!(report.rows[3].positive);
        assert_eq!(report.rows[3].label, "Infiltration");
    }

    #[test]
    fn test_table_lists_every_class() {
        let probs = ClassProbabilities::from_vec(vec![0.0; NUM_CLASSES]).unwrap();
        let set = predict(&probs, Threshold::DEFAULT);
        let table = PredictionReport::new(&probs, &set).to_string_table();

        for name in CLASS_NAMES {
            assert!(table.contains(name));
        }
        assert!(table.contains("no class reached the threshold"));
    }
}
