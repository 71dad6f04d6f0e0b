use nalgebra::SVector;

use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::kalman_filter::KalmanFilter;
use crate::track::{Track, TrackId};
use crate::utils;

/// A frame-to-frame association tracker the tracker node can drive.
pub trait TrackerModel {
    /// Consume one frame's detections and return the boxes of the tracks that
    /// should be reported for this frame, each with its track id.
    fn step(&mut self, detections: &[Detection]) -> Vec<(Detection, TrackId)>;
}

/// Association parameters for [`SortTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortParams {
    /// Steps a track may go unmatched before it is retired.
    pub max_age: u32,
    /// Consecutive matches before a track is reported.
    pub min_hits: u32,
    /// Minimum IoU between prediction and detection to associate them.
    pub iou_threshold: f32,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            iou_threshold: 0.7,
        }
    }
}

impl From<&TrackerConfig> for SortParams {
    fn from(cfg: &TrackerConfig) -> Self {
        Self {
            max_age: cfg.max_age,
            min_hits: cfg.min_hits,
            iou_threshold: cfg.iou_threshold,
        }
    }
}

/// SORT-style tracker: Kalman prediction + IoU association.
pub struct SortTracker {
    params: SortParams,
    kalman: KalmanFilter,
    tracks: Vec<Track>,
    frame_count: u64,
    /// Last id handed out; ids are never reused.
    track_id_count: TrackId,
}

impl SortTracker {
    pub fn new(params: SortParams) -> Self {
        SortTracker {
            params,
            kalman: KalmanFilter::new(),
            tracks: Vec::new(),
            frame_count: 0,
            track_id_count: 0,
        }
    }

    /// Live tracks, confirmed or not.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn next_id(&mut self) -> TrackId {
        self.track_id_count += 1;
        self.track_id_count
    }

    fn should_report(&self, track: &Track) -> bool {
        track.time_since_update == 0
            && (track.is_confirmed(self.params.min_hits)
                || self.frame_count <= u64::from(self.params.min_hits))
    }
}

impl TrackerModel for SortTracker {
    fn step(&mut self, detections: &[Detection]) -> Vec<(Detection, TrackId)> {
        self.frame_count += 1;

        let predicted: Vec<SVector<f32, 4>> = self
            .tracks
            .iter_mut()
            .map(|t| t.predict(&self.kalman))
            .collect();

        let (matches, _unmatched_tracks, unmatched_dets) =
            associate(&predicted, detections, self.params.iou_threshold);

        for (track_idx, det_idx) in matches {
            self.tracks[track_idx].update(&self.kalman, &detections[det_idx]);
        }

        for det_idx in unmatched_dets {
            let id = self.next_id();
            self.tracks.push(Track::new(&self.kalman, &detections[det_idx], id));
        }

        let max_age = self.params.max_age;
        self.tracks.retain(|t| !t.is_expired(max_age));

        let results: Vec<(Detection, TrackId)> = self
            .tracks
            .iter()
            .filter(|t| self.should_report(t))
            .map(|t| (t.to_detection(), t.id))
            .collect();

        tracing::debug!(
            "frame {}: {} detections, {} live tracks, {} reported",
            self.frame_count,
            detections.len(),
            self.tracks.len(),
            results.len()
        );

        results
    }
}

/// Match predicted track boxes to detections.
///
/// Pairs are taken greedily in order of decreasing IoU; a pair below
/// `iou_threshold` is never matched. Returns `(matches, unmatched_tracks,
/// unmatched_detections)` as index lists.
pub fn associate(
    predicted: &[SVector<f32, 4>],
    detections: &[Detection],
    iou_threshold: f32,
) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
    if predicted.is_empty() || detections.is_empty() {
        return (Vec::new(), (0..predicted.len()).collect(), (0..detections.len()).collect());
    }

    let det_boxes: Vec<SVector<f32, 4>> = detections.iter().map(|d| d.tlwh).collect();
    let ious = utils::iou_matrix(predicted, &det_boxes);

    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for (i, row) in ious.iter().enumerate() {
        for (j, &iou) in row.iter().enumerate() {
            if iou >= iou_threshold {
                candidates.push((iou, i, j));
            }
        }
    }
    // stable on ties so lower indices win
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut track_used = vec![false; predicted.len()];
    let mut det_used = vec![false; detections.len()];
    let mut matches = Vec::new();
    for (_, i, j) in candidates {
        if track_used[i] || det_used[j] {
            continue;
        }
        track_used[i] = true;
        det_used[j] = true;
        matches.push((i, j));
    }

    let unmatched_tracks = (0..predicted.len()).filter(|&i| !track_used[i]).collect();
    let unmatched_dets = (0..detections.len()).filter(|&j| !det_used[j]).collect();
    (matches, unmatched_tracks, unmatched_dets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn det(x: f32, y: f32) -> Detection {
        Detection::from_tlwh(x, y, 50.0, 100.0, 0.9, 0)
    }

    fn params(max_age: u32, min_hits: u32) -> SortParams {
        SortParams {
            max_age,
            min_hits,
            iou_threshold: 0.3,
        }
    }

    #[test]
    fn test_associate_prefers_highest_iou() {
        let predicted = vec![
            SVector::<f32, 4>::new(0.0, 0.0, 50.0, 100.0),
            SVector::<f32, 4>::new(200.0, 0.0, 50.0, 100.0),
        ];
        let dets = vec![det(202.0, 0.0), det(300.0, 300.0), det(1.0, 0.0)];

        let (matches, unmatched_tracks, unmatched_dets) = associate(&predicted, &dets, 0.5);

        let matches: HashSet<_> = matches.into_iter().collect();
        assert_eq!(matches, HashSet::from([(0, 2), (1, 0)]));
        assert!(unmatched_tracks.is_empty());
        assert_eq!(unmatched_dets, vec![1]);
    }

    #[test]
    fn test_associate_rejects_low_overlap() {
        let predicted = vec![SVector::<f32, 4>::new(0.0, 0.0, 50.0, 100.0)];
        let dets = vec![det(40.0, 0.0)];
        let (matches, unmatched_tracks, unmatched_dets) = associate(&predicted, &dets, 0.7);
        assert!(matches.is_empty());
        assert_eq!(unmatched_tracks, vec![0]);
        assert_eq!(unmatched_dets, vec![0]);
    }

    #[test]
    fn test_no_detections_no_tracks() {
        let mut tracker = SortTracker::new(params(5, 2));
        for _ in 0..10 {
            assert!(tracker.step(&[]).is_empty());
        }
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_stable_id_for_steady_object() {
        let mut tracker = SortTracker::new(params(5, 3));
        let mut ids = HashSet::new();
        for frame in 0..20 {
            let out = tracker.step(&[det(100.0 + frame as f32, 50.0)]);
            // reported during warm-up, then once confirmed
            assert_eq!(out.len(), 1, "frame {}", frame);
            ids.insert(out[0].1);
        }
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_unconfirmed_track_hidden_after_warmup() {
        let mut tracker = SortTracker::new(params(5, 3));
        for _ in 0..5 {
            tracker.step(&[]);
        }
        // past warm-up: a fresh track needs min_hits consecutive matches
        assert!(tracker.step(&[det(0.0, 0.0)]).is_empty());
        assert!(tracker.step(&[det(0.0, 0.0)]).is_empty());
        let out = tracker.step(&[det(0.0, 0.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1, 1);
    }

    #[test]
    fn test_new_id_after_max_age() {
        let mut tracker = SortTracker::new(params(2, 1));
        let first = tracker.step(&[det(100.0, 100.0)]);
        assert_eq!(first[0].1, 1);

        for _ in 0..3 {
            assert!(tracker.step(&[]).is_empty());
        }
        assert!(tracker.tracks().is_empty());

        let again = tracker.step(&[det(100.0, 100.0)]);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].1, 2);
    }

    #[test]
    fn test_short_gap_keeps_id() {
        let mut tracker = SortTracker::new(params(3, 1));
        let first = tracker.step(&[det(100.0, 100.0)]);
        tracker.step(&[]);
        tracker.step(&[]);
        let again = tracker.step(&[det(100.0, 100.0)]);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].1, first[0].1);
    }

    #[test]
    fn test_two_objects_distinct_ids() {
        let mut tracker = SortTracker::new(params(5, 1));
        let mut last = Vec::new();
        for frame in 0..5 {
            let x = frame as f32 * 2.0;
            last = tracker.step(&[det(x, 0.0), det(400.0 - x, 300.0)]);
        }
        assert_eq!(last.len(), 2);
        assert_ne!(last[0].1, last[1].1);
    }

    #[test]
    fn test_reported_box_keeps_detection_metadata() {
        let mut tracker = SortTracker::new(params(5, 1));
        let out = tracker.step(&[Detection::from_tlwh(10.0, 10.0, 20.0, 20.0, 0.42, 7)]);
        assert_eq!(out[0].0.class_id, 7);
        assert_eq!(out[0].0.confidence, 0.42);
    }
}
