//! Addressing of backbone layers whose output can be captured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A layer of the DenseNet feature extractor.
///
/// Names follow the familiar `features.*` layout: `pool0` (stem),
/// `denseblock{n}`, `transition{n}` (both 1-based) and `norm5`, the final
/// normalisation that feeds the classification head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetLayer {
    /// Output of `conv0 -> norm0 -> relu -> pool0`.
    Stem,
    /// Output of the n-th dense block.
    DenseBlock(usize),
    /// Output of the n-th transition layer.
    Transition(usize),
    /// Output of the final normalisation (last feature layer).
    #[default]
    FinalNorm,
}

impl fmt::Display for TargetLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLayer::Stem => write!(f, "pool0"),
            TargetLayer::DenseBlock(n) => write!(f, "denseblock{}", n),
            TargetLayer::Transition(n) => write!(f, "transition{}", n),
            TargetLayer::FinalNorm => write!(f, "norm5"),
        }
    }
}

impl FromStr for TargetLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let name = name.strip_prefix("features.").unwrap_or(&name);

        let index = |rest: &str| -> Result<usize, String> {
            match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(format!("invalid layer index in '{}'", s)),
            }
        };

        match name {
            "norm5" | "final_norm" | "last" => Ok(TargetLayer::FinalNorm),
            "pool0" | "stem" => Ok(TargetLayer::Stem),
            _ => {
                if let Some(rest) = name.strip_prefix("denseblock") {
                    Ok(TargetLayer::DenseBlock(index(rest)?))
                } else if let Some(rest) = name.strip_prefix("transition") {
                    Ok(TargetLayer::Transition(index(rest)?))
                } else {
                    Err(format!(
                        "unknown layer '{}' (expected pool0, denseblockN, transitionN or norm5)",
                        s
                    ))
                }
            }
        }
    }
}

impl TryFrom<String> for TargetLayer {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetLayer> for String {
    fn from(layer: TargetLayer) -> Self {
        layer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("norm5".parse::<TargetLayer>().unwrap(), TargetLayer::FinalNorm);
        assert_eq!(
            "features.denseblock3".parse::<TargetLayer>().unwrap(),
            TargetLayer::DenseBlock(3)
        );
        assert_eq!(
            "Transition2".parse::<TargetLayer>().unwrap(),
            TargetLayer::Transition(2)
        );
        assert_eq!("pool0".parse::<TargetLayer>().unwrap(), TargetLayer::Stem);
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!("denseblock0".parse::<TargetLayer>().is_err());
        assert!("denseblockx".parse::<TargetLayer>().is_err());
        assert!("classifier".parse::<TargetLayer>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for layer in [
            TargetLayer::Stem,
            TargetLayer::DenseBlock(4),
            TargetLayer::Transition(1),
            TargetLayer::FinalNorm,
        ] {
            assert_eq!(layer.to_string().parse::<TargetLayer>().unwrap(), layer);
        }
    }

    #[test]
    fn test_default_is_final_norm() {
        assert_eq!(TargetLayer::default(), TargetLayer::FinalNorm);
    }
}
