use serde::{Deserialize, Serialize};
use std::fmt;

/// One token reported by a recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRegion {
    /// Position of the token inside the image that was recognized.
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub text: String,
    /// Engine confidence (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn at(mut self, left: u32, top: u32, width: u32, height: u32) -> Self {
        self.left = left;
        self.top = top;
        self.width = width;
        self.height = height;
        self
    }
}

/// Space-join token texts in engine order. No tokens gives an empty string.
pub fn join_tokens(regions: &[TextRegion]) -> String {
    regions
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Page rotation as reported by an orientation estimator, in clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Upright,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Upright),
            90 => Some(Rotation::Quarter),
            180 => Some(Rotation::Half),
            270 => Some(Rotation::ThreeQuarter),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Upright => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
