use std::fmt;

use opencv::core::Mat;

use crate::detection::Detection;
use crate::palette::Color;
use crate::track::TrackId;

/// One decoded image from a source.
#[derive(Clone)]
pub struct Frame {
    /// BGR pixels.
    pub image: Mat,
    /// Monotonic per source.
    pub frame_count: u64,
    pub src_id: String,
}

impl Frame {
    pub fn new(image: Mat, frame_count: u64, src_id: impl Into<String>) -> Self {
        Self {
            image,
            frame_count,
            src_id: src_id.into(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Frame from {} {}>", self.src_id, self.frame_count)
    }
}

/// The detections currently assigned to one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDetectionGroup {
    /// `None` until a tracker has assigned an identity.
    pub tracker_id: Option<TrackId>,
    pub color: Color,
    pub detections: Vec<Detection>,
}

impl TrackedDetectionGroup {
    /// The detector's single group holding every raw detection.
    pub fn untracked(detections: Vec<Detection>) -> Self {
        Self {
            tracker_id: None,
            color: Color::default(),
            detections,
        }
    }

    pub fn tracked(tracker_id: TrackId, color: Color, detections: Vec<Detection>) -> Self {
        Self {
            tracker_id: Some(tracker_id),
            color,
            detections,
        }
    }

    /// Text drawn next to the group's boxes.
    pub fn label(&self) -> Option<String> {
        self.tracker_id.map(|id| format!("Tracker: {}", id))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// A frame plus what the detector and tracker found in it.
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub detections: Vec<TrackedDetectionGroup>,
    /// Unfiltered detector output, for painting auxiliary classes.
    pub all_boxes: Vec<Detection>,
}

impl AnnotatedFrame {
    pub fn new(frame: Frame, detections: Vec<TrackedDetectionGroup>, all_boxes: Vec<Detection>) -> Self {
        Self {
            frame,
            detections,
            all_boxes,
        }
    }

    pub fn src_id(&self) -> &str {
        &self.frame.src_id
    }

    pub fn frame_count(&self) -> u64 {
        self.frame.frame_count
    }

    pub fn image(&self) -> &Mat {
        &self.frame.image
    }
}

impl From<Frame> for AnnotatedFrame {
    fn from(frame: Frame) -> Self {
        Self::new(frame, Vec::new(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_with_id() {
        let group = TrackedDetectionGroup::tracked(7, Color::GREEN, Vec::new());
        assert_eq!(group.label().as_deref(), Some("Tracker: 7"));
    }

    #[test]
    fn test_no_label_without_id() {
        let group = TrackedDetectionGroup::untracked(vec![Detection::from_tlwh(0.0, 0.0, 1.0, 1.0, 0.5, 0)]);
        assert_eq!(group.label(), None);
        assert_eq!(group.color, Color::GREEN);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_frame_debug_names_source() {
        let frame = Frame::new(Mat::default(), 12, "cam0");
        assert_eq!(format!("{:?}", frame), "<Frame from cam0 12>");
    }
}
