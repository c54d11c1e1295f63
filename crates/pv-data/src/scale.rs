//! Virtual columns computed from the row index

use std::fmt;

/// A synthetic column available on every file.
///
/// Scales are listed before the real headers and win over a header with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleName {
    Linear,
    Logarithmic,
}

impl ScaleName {
    /// All scales in declaration order
    pub const ALL: [ScaleName; 2] = [ScaleName::Linear, ScaleName::Logarithmic];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleName::Linear => "linear scale",
            ScaleName::Logarithmic => "logarithmic scale",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scale| scale.as_str() == name)
    }

    /// Value of this scale at a zero-based row index.
    ///
    /// The logarithmic scale is `-inf` at row 0.
    pub fn resolve(&self, row_index: usize) -> f64 {
        let i = row_index as f64;
        match self {
            ScaleName::Linear => i,
            ScaleName::Logarithmic => i.ln(),
        }
    }
}

impl fmt::Display for ScaleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale names in declaration order
pub fn names() -> impl Iterator<Item = &'static str> {
    ScaleName::ALL.into_iter().map(|scale| scale.as_str())
}
