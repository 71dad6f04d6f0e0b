use std::path::Path;

use opencv::core::Mat;
use tempfile::TempDir;

use crate::chunk::{DataChunk, Inputs};
use crate::config::DetectorConfig;
use crate::detection::{Detection, DetectionModel};
use crate::error::{PipelineError, Result};
use crate::frame::{AnnotatedFrame, TrackedDetectionGroup};
use crate::node::Node;
use crate::palette::Color;
use crate::utils;
use crate::visualization;

/// Builds a model from resolved local weights at setup time.
pub type ModelLoader = Box<dyn FnMut(&Path, &DetectorConfig) -> Result<Box<dyn DetectionModel>>>;

/// Runs a detection model over every incoming frame.
///
/// Each output frame carries one untracked group with all raw detections, and
/// the same list again in `all_boxes`.
pub struct DetectorNode {
    name: String,
    config: DetectorConfig,
    loader: Option<ModelLoader>,
    model: Option<Box<dyn DetectionModel>>,
    /// Holds downloaded weights until teardown.
    scratch: Option<TempDir>,
}

impl DetectorNode {
    /// A node that loads its model in `setup` from `config.weights`.
    pub fn new<F>(name: impl Into<String>, config: DetectorConfig, loader: F) -> Self
    where
        F: FnMut(&Path, &DetectorConfig) -> Result<Box<dyn DetectionModel>> + 'static,
    {
        Self {
            name: name.into(),
            config,
            loader: Some(Box::new(loader)),
            model: None,
            scratch: None,
        }
    }

    /// A node around an already loaded model; `setup` skips weight resolution.
    pub fn with_model(name: impl Into<String>, config: DetectorConfig, model: impl DetectionModel + 'static) -> Self {
        Self {
            name: name.into(),
            config,
            loader: None,
            model: Some(Box::new(model)),
            scratch: None,
        }
    }

    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        match self.model.as_mut() {
            Some(model) => model.predict(image),
            None => Err(PipelineError::Model(format!("{}: model not loaded", self.name))),
        }
    }

    fn show_debug(window: &str, image: &Mat, detections: &[Detection]) -> Result<()> {
        let mut canvas = image.clone();
        for det in detections {
            visualization::draw_box(&mut canvas, det.pixel_rect(), Color::GREEN, visualization::BOX_THICKNESS)?;
        }
        visualization::show(window, &canvas)?;
        Ok(())
    }
}

impl Node for DetectorNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }
        let Some(loader) = self.loader.as_mut() else {
            return Err(PipelineError::Model(format!("{}: no model loader", self.name)));
        };

        let scratch = tempfile::tempdir()?;
        let weights = utils::resolve_weights(&self.config.weights, scratch.path())?;
        tracing::info!("{}: loading model from {}", self.name, weights.display());
        self.model = Some(loader(&weights, &self.config)?);
        self.scratch = Some(scratch);
        Ok(())
    }

    fn step(&mut self, inputs: Inputs) -> Result<DataChunk> {
        let frames = super::collect_frames(&self.name, inputs, &self.config.frames_key);

        let mut out = Vec::with_capacity(frames.len());
        for (upstream, annotated) in frames {
            let frame = annotated.frame;
            let detections = self.detect(&frame.image)?;
            tracing::debug!(
                "{}: {} detections in {:?}",
                self.name,
                detections.len(),
                frame
            );

            if self.config.debug {
                Self::show_debug(&upstream, &frame.image, &detections)?;
            }

            out.push(AnnotatedFrame::new(
                frame,
                vec![TrackedDetectionGroup::untracked(detections.clone())],
                detections,
            ));
        }

        Ok(super::annotated_chunk(&self.config.frames_key, out))
    }

    fn teardown(&mut self) -> Result<()> {
        self.model = None;
        self.scratch = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Payload;
    use crate::frame::Frame;

    struct FixedModel {
        detections: Vec<Detection>,
    }

    impl DetectionModel for FixedModel {
        fn predict(&mut self, _image: &Mat) -> Result<Vec<Detection>> {
            Ok(self.detections.clone())
        }
    }

    struct FailingModel;

    impl DetectionModel for FailingModel {
        fn predict(&mut self, _image: &Mat) -> Result<Vec<Detection>> {
            Err(PipelineError::Model("inference failed".into()))
        }
    }

    fn frames_chunk(src: &str, counts: &[u64]) -> DataChunk {
        let mut chunk = DataChunk::new();
        chunk.add(
            "frame",
            Payload::Frames(counts.iter().map(|&c| Frame::new(Mat::default(), c, src)).collect()),
        );
        chunk
    }

    fn dets() -> Vec<Detection> {
        vec![
            Detection::from_tlwh(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            Detection::from_tlwh(20.0, 20.0, 10.0, 10.0, 0.8, 32),
        ]
    }

    #[test]
    fn test_wraps_every_frame_in_untracked_group() {
        let model = FixedModel { detections: dets() };
        let mut node = DetectorNode::with_model("det", DetectorConfig::new("unused"), model);
        node.setup().unwrap();

        let mut inputs = Inputs::new();
        inputs.insert("cam0".into(), frames_chunk("cam0", &[0, 1]));
        inputs.insert("cam1".into(), frames_chunk("cam1", &[5]));

        let mut out = node.step(inputs).unwrap();
        let frames = out.take("frame").and_then(Payload::into_annotated).unwrap();

        assert_eq!(frames.len(), 3);
        let ids: Vec<_> = frames.iter().map(|f| (f.src_id().to_string(), f.frame_count())).collect();
        assert_eq!(
            ids,
            vec![("cam0".into(), 0), ("cam0".into(), 1), ("cam1".into(), 5)]
        );
        for f in &frames {
            assert_eq!(f.detections.len(), 1);
            assert_eq!(f.detections[0].tracker_id, None);
            assert_eq!(f.detections[0].detections, dets());
            assert_eq!(f.all_boxes, dets());
        }
    }

    #[test]
    fn test_missing_key_is_skipped() {
        let model = FixedModel { detections: dets() };
        let mut node = DetectorNode::with_model("det", DetectorConfig::new("unused"), model);
        node.setup().unwrap();

        let mut inputs = Inputs::new();
        inputs.insert("other".into(), DataChunk::new());
        let mut out = node.step(inputs).unwrap();
        let frames = out.take("frame").and_then(Payload::into_annotated).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_model_failure_fails_step() {
        let mut node = DetectorNode::with_model("det", DetectorConfig::new("unused"), FailingModel);
        node.setup().unwrap();

        let mut inputs = Inputs::new();
        inputs.insert("cam0".into(), frames_chunk("cam0", &[0]));
        assert!(matches!(node.step(inputs), Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_setup_fails_on_missing_weights() {
        let mut node = DetectorNode::new("det", DetectorConfig::new("no/such/weights.pt"), |_, _| {
            Ok(Box::new(FailingModel) as Box<dyn DetectionModel>)
        });
        assert!(matches!(node.setup(), Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_loader_receives_local_weights() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("w.pt");
        std::fs::write(&weights, b"w").unwrap();

        let expected = weights.clone();
        let mut node = DetectorNode::new(
            "det",
            DetectorConfig::new(weights.to_string_lossy()),
            move |path, _cfg| {
                assert_eq!(path, expected.as_path());
                Ok(Box::new(FixedModel { detections: Vec::new() }) as Box<dyn DetectionModel>)
            },
        );
        node.setup().unwrap();

        let mut inputs = Inputs::new();
        inputs.insert("cam0".into(), frames_chunk("cam0", &[0]));
        let mut out = node.step(inputs).unwrap();
        let frames = out.take("frame").and_then(Payload::into_annotated).unwrap();
        assert!(frames[0].detections[0].is_empty());
    }

    #[test]
    fn test_step_without_setup_errors() {
        let mut node = DetectorNode::new("det", DetectorConfig::new("w.pt"), |_, _| {
            Ok(Box::new(FailingModel) as Box<dyn DetectionModel>)
        });
        let mut inputs = Inputs::new();
        inputs.insert("cam0".into(), frames_chunk("cam0", &[0]));
        assert!(node.step(inputs).is_err());
    }

    #[test]
    fn test_setup_fails_on_unreachable_weights_url() {
        let mut node = DetectorNode::new("det", DetectorConfig::new("http://127.0.0.1:1/w.pt"), |_, _| {
            Ok(Box::new(FailingModel) as Box<dyn DetectionModel>)
        });
        assert!(matches!(node.setup(), Err(PipelineError::Download { .. })));

        let mut inputs = Inputs::new();
        inputs.insert("cam0".into(), frames_chunk("cam0", &[0]));
        assert!(node.step(inputs).is_err());
    }
}
