use nalgebra::SVector;
use opencv::core::Mat;

use crate::error::Result;

/// A single detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Top-left x, top-left y, width, height in pixels.
    pub tlwh: SVector<f32, 4>,
    pub confidence: f32,
    pub class_id: i32,
}

impl Detection {
    pub fn new(tlwh: SVector<f32, 4>, confidence: f32, class_id: i32) -> Self {
        Self {
            tlwh,
            confidence,
            class_id,
        }
    }

    pub fn from_tlwh(t: f32, l: f32, w: f32, h: f32, confidence: f32, class_id: i32) -> Self {
        Self::new(SVector::<f32, 4>::new(t, l, w, h), confidence, class_id)
    }

    pub fn tlwh(&self) -> &SVector<f32, 4> {
        &self.tlwh
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Corner form `[x1, y1, x2, y2]`.
    pub fn tlbr(&self) -> SVector<f32, 4> {
        let mut tlbr = self.tlwh;
        tlbr[2] = self.tlwh[0] + self.tlwh[2];
        tlbr[3] = self.tlwh[1] + self.tlwh[3];
        tlbr
    }

    /// Box rounded to integer pixels, as drawn.
    pub fn pixel_rect(&self) -> opencv::core::Rect {
        opencv::core::Rect::new(
            self.tlwh[0] as i32,
            self.tlwh[1] as i32,
            self.tlwh[2] as i32,
            self.tlwh[3] as i32,
        )
    }
}

/// An object detector the detector node can drive.
///
/// Concrete bindings (TorchScript, ONNX, ...) live behind this trait so the
/// node never depends on a particular runtime.
pub trait DetectionModel {
    /// Run inference once on a BGR image and return every detection kept by
    /// the model's own thresholds.
    fn predict(&mut self, image: &Mat) -> Result<Vec<Detection>>;
}

impl<M: DetectionModel + ?Sized> DetectionModel for Box<M> {
    fn predict(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        (**self).predict(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tlbr_conversion() {
        let det = Detection::from_tlwh(10.0, 20.0, 30.0, 40.0, 0.9, 0);
        let tlbr = det.tlbr();
        assert_relative_eq!(tlbr[0], 10.0);
        assert_relative_eq!(tlbr[1], 20.0);
        assert_relative_eq!(tlbr[2], 40.0);
        assert_relative_eq!(tlbr[3], 60.0);
    }

    #[test]
    fn test_pixel_rect_truncates() {
        let det = Detection::from_tlwh(10.7, 20.2, 30.9, 40.5, 0.5, 2);
        let rect = det.pixel_rect();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 20, 30, 40));
    }
}
