use nalgebra::SVector;

use crate::detection::Detection;
use crate::kalman_filter::{KalmanFilter, StateCovariance, StateMean};

pub type TrackId = u32;

/// One tracked object inside the association tracker.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    mean: StateMean,
    covariance: StateCovariance,
    /// Total number of matched detections.
    pub hits: u32,
    /// Consecutive steps with a matched detection.
    pub hit_streak: u32,
    /// Steps since creation.
    pub age: u32,
    pub time_since_update: u32,
    pub confidence: f32,
    pub class_id: i32,
}

impl Track {
    pub fn new(kf: &KalmanFilter, detection: &Detection, id: TrackId) -> Self {
        let (mean, covariance) = kf.initiate(&detection.tlwh);
        Track {
            id,
            mean,
            covariance,
            hits: 1,
            hit_streak: 1,
            age: 0,
            time_since_update: 0,
            confidence: detection.confidence,
            class_id: detection.class_id,
        }
    }

    /// Current box estimate.
    pub fn tlwh(&self) -> SVector<f32, 4> {
        let mut tlwh: SVector<f32, 4> = self.mean.fixed_rows::<4>(0).into();
        // the motion model can shrink a box through zero
        tlwh[2] = tlwh[2].max(0.0);
        tlwh[3] = tlwh[3].max(0.0);
        tlwh
    }

    /// Advance the state one step and return the predicted box.
    pub fn predict(&mut self, kf: &KalmanFilter) -> SVector<f32, 4> {
        if self.mean[2] + self.mean[6] <= 0.0 {
            self.mean[6] = 0.0;
        }
        if self.mean[3] + self.mean[7] <= 0.0 {
            self.mean[7] = 0.0;
        }
        let (mean, covariance) = kf.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;

        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;
        self.tlwh()
    }

    /// Correct the state with a matched detection.
    pub fn update(&mut self, kf: &KalmanFilter, detection: &Detection) {
        let (mean, covariance) = kf.update(&self.mean, &self.covariance, &detection.tlwh);
        self.mean = mean;
        self.covariance = covariance;

        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;
        self.confidence = detection.confidence;
        self.class_id = detection.class_id;
    }

    pub fn is_confirmed(&self, min_hits: u32) -> bool {
        self.hit_streak >= min_hits
    }

    pub fn is_expired(&self, max_age: u32) -> bool {
        self.time_since_update > max_age
    }

    /// The track's box as a detection carrying the last matched score and class.
    pub fn to_detection(&self) -> Detection {
        Detection::new(self.tlwh(), self.confidence, self.class_id)
    }
}
