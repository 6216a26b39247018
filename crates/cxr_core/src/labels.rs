//! Disease class vocabulary.
//!
//! The order of [`CLASS_NAMES`] defines the index alignment of every
//! probability vector produced by the classifier.

/// Number of disease classes predicted by the classifier.
pub const NUM_CLASSES: usize = 14;

/// Disease class names, index-aligned with classifier outputs.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Atelectasis",
    "Cardiomegaly",
    "Effusion",
    "Infiltration",
    "Mass",
    "Nodule",
    "Pneumonia",
    "Pneumothorax",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Pleural_Thickening",
    "Hernia",
];

/// Look up the output index of a class by name (exact match).
#[must_use]
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

/// Name of the class at `index`, if in range.
#[must_use]
pub fn class_name(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied()
}
