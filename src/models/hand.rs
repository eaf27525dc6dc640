// Data models for hand landmarks produced by a landmark detector

use serde::{Deserialize, Serialize};

/// Number of landmarks in a detected hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Coordinates per landmark (x, y, z)
pub const LANDMARK_DIMENSIONS: usize = 3;

// ==============================================================================
// Landmark
// ==============================================================================

/// A single 3D hand landmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32, // Normalized [0, 1] to image width
    pub y: f32, // Normalized [0, 1] to image height
    pub z: f32, // Depth relative to the wrist
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// ==============================================================================
// Hand (21 keypoints)
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn to_string(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "left" => Some(Handedness::Left),
            "right" => Some(Handedness::Right),
            _ => None,
        }
    }
}

/// MediaPipe Hand Landmark indices (21 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One detected hand in a single frame.
///
/// Hands carry no identity across frames: the detector produces a fresh set
/// every frame and the order is whatever the detector reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    pub landmarks: [Landmark; HAND_LANDMARK_COUNT],
    pub handedness: Option<Handedness>,
    pub score: f32,
}

impl Hand {
    pub fn new(landmarks: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self {
            landmarks,
            handedness: None,
            score: 1.0,
        }
    }

    /// Build a hand from a detector's landmark list, which must hold exactly 21 points
    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let landmarks: [Landmark; HAND_LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self::new(landmarks))
    }

    pub fn with_handedness(mut self, handedness: Option<Handedness>) -> Self {
        self.handedness = handedness;
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn landmark(&self, which: HandLandmark) -> &Landmark {
        &self.landmarks[which.index()]
    }

    /// Concatenate landmark coordinates in index order: x0, y0, z0, x1, y1, z1, ...
    pub fn flatten(&self) -> Vec<f32> {
        self.landmarks
            .iter()
            .flat_map(|point| [point.x, point.y, point.z])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_hand(x: f32, y: f32, z: f32) -> Hand {
        Hand::new([Landmark::new(x, y, z); HAND_LANDMARK_COUNT])
    }

    #[test]
    fn test_flatten_uniform_hand() {
        let flat = uniform_hand(0.5, 0.5, 0.0).flatten();
        assert_eq!(flat.len(), 63);
        for chunk in flat.chunks(3) {
            assert_eq!(chunk, &[0.5, 0.5, 0.0]);
        }
    }

    #[test]
    fn test_flatten_keeps_landmark_order() {
        let mut landmarks = [Landmark::default(); HAND_LANDMARK_COUNT];
        for (i, point) in landmarks.iter_mut().enumerate() {
            *point = Landmark::new(i as f32, i as f32 + 0.25, -(i as f32));
        }
        let flat = Hand::new(landmarks).flatten();

        assert_eq!(&flat[0..3], &[0.0, 0.25, 0.0]);
        assert_eq!(&flat[12..15], &[4.0, 4.25, -4.0]);
        assert_eq!(&flat[60..63], &[20.0, 20.25, -20.0]);
    }

    #[test]
    fn test_from_slice_requires_21_points() {
        let points = vec![Landmark::default(); 20];
        assert!(Hand::from_slice(&points).is_none());

        let points = vec![Landmark::default(); 21];
        assert!(Hand::from_slice(&points).is_some());
    }

    #[test]
    fn test_thumb_tip_lookup() {
        let mut landmarks = [Landmark::default(); HAND_LANDMARK_COUNT];
        landmarks[4] = Landmark::new(0.7, 0.2, 0.0);
        let hand = Hand::new(landmarks);
        assert_eq!(hand.landmark(HandLandmark::ThumbTip).x, 0.7);
    }

    #[test]
    fn test_handedness_from_string() {
        assert_eq!(Handedness::from_string("Left"), Some(Handedness::Left));
        assert_eq!(Handedness::from_string("right"), Some(Handedness::Right));
        assert_eq!(Handedness::from_string("both"), None);
    }
}
