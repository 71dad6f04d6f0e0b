use nalgebra::{SMatrix, SVector};

pub type StateMean = SVector<f32, 8>;
pub type StateCovariance = SMatrix<f32, 8, 8>;
pub type Measurement = SVector<f32, 4>;

/// Constant-velocity Kalman filter over a tlwh box.
///
/// State is `(t, l, w, h, vt, vl, vw, vh)`; the filter itself is stateless,
/// each track carries its own mean and covariance.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: SMatrix<f32, 8, 8>,
    update_mat: SMatrix<f32, 4, 8>,
    std_weight_position: f32,
    std_weight_velocity: f32,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let dt = 1.0;
        let mut motion_mat = SMatrix::<f32, 8, 8>::identity();
        for i in 0..4 {
            motion_mat[(i, 4 + i)] = dt;
        }
        KalmanFilter {
            motion_mat,
            update_mat: SMatrix::<f32, 4, 8>::identity(),
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state from an unassociated measurement. Velocities start at zero.
    pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCovariance) {
        let mut mean = StateMean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);

        let (w, h) = (measurement[2], measurement[3]);
        let pos = 2.0 * self.std_weight_position;
        let vel = 10.0 * self.std_weight_velocity;
        let std = StateMean::from_column_slice(&[
            pos * w,
            pos * h,
            pos * w,
            pos * h,
            vel * w,
            vel * h,
            vel * w,
            vel * h,
        ]);
        (mean, StateCovariance::from_diagonal(&std.component_mul(&std)))
    }

    /// x' = F x, P' = F P F^T + Q
    pub fn predict(&self, mean: &StateMean, covariance: &StateCovariance) -> (StateMean, StateCovariance) {
        let (w, h) = (mean[2], mean[3]);
        let pos = self.std_weight_position;
        let vel = self.std_weight_velocity;
        let std = StateMean::from_column_slice(&[
            pos * w,
            pos * h,
            pos * w,
            pos * h,
            vel * w,
            vel * h,
            vel * w,
            vel * h,
        ]);
        let q = StateCovariance::from_diagonal(&std.component_mul(&std));

        let new_mean = self.motion_mat * mean;
        let new_cov = self.motion_mat * covariance * self.motion_mat.transpose() + q;
        (new_mean, new_cov)
    }

    /// Project state to measurement space: z = Hx, S = H P H^T + R
    pub fn project(&self, mean: &StateMean, covariance: &StateCovariance) -> (Measurement, SMatrix<f32, 4, 4>) {
        let (w, h) = (mean[2], mean[3]);
        let pos = self.std_weight_position;
        let std = Measurement::new(pos * w, pos * h, pos * w, pos * h);
        let r = SMatrix::<f32, 4, 4>::from_diagonal(&std.component_mul(&std));

        let z = self.update_mat * mean;
        let s = self.update_mat * covariance * self.update_mat.transpose() + r;
        (z, s)
    }

    /// Correction step.
    pub fn update(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurement: &Measurement,
    ) -> (StateMean, StateCovariance) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let mut s = projected_cov;
        for i in 0..4 {
            s[(i, i)] += 1e-8;
        }

        // K = P H^T S^-1, solved as S K^T = H P^T
        let pht = covariance * self.update_mat.transpose();
        let gain = match s.lu().solve(&pht.transpose()) {
            Some(k_t) => k_t.transpose(),
            // S is a covariance plus positive noise, so this only fires on NaN input
            None => return (*mean, *covariance),
        };

        let innovation = measurement - projected_mean;
        let new_mean = mean + gain * innovation;
        let new_cov = covariance - gain * projected_cov * gain.transpose();
        (new_mean, new_cov)
    }
}
