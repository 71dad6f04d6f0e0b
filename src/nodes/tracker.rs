use crate::chunk::{DataChunk, Inputs};
use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::error::{PipelineError, Result};
use crate::frame::{AnnotatedFrame, TrackedDetectionGroup};
use crate::node::Node;
use crate::palette::Palette;
use crate::tracker::{SortParams, SortTracker, TrackerModel};

/// Builds fresh tracker state at setup time.
pub type TrackerFactory = Box<dyn Fn(&TrackerConfig) -> Box<dyn TrackerModel>>;

/// Assigns persistent identities to one source's detections.
///
/// Frames from any other source are dropped from the output.
pub struct TrackerNode {
    name: String,
    config: TrackerConfig,
    factory: TrackerFactory,
    tracker: Option<Box<dyn TrackerModel>>,
    palette: Palette,
}

impl TrackerNode {
    /// A node backed by [`SortTracker`].
    pub fn new(name: impl Into<String>, config: TrackerConfig) -> Self {
        Self::with_factory(name, config, |cfg| {
            Box::new(SortTracker::new(SortParams::from(cfg))) as Box<dyn TrackerModel>
        })
    }

    pub fn with_factory<F>(name: impl Into<String>, config: TrackerConfig, factory: F) -> Self
    where
        F: Fn(&TrackerConfig) -> Box<dyn TrackerModel> + 'static,
    {
        let palette = Palette::seeded(config.palette_size, config.palette_seed);
        Self {
            name: name.into(),
            config,
            factory: Box::new(factory),
            tracker: None,
            palette,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    fn filter_detections(&self, groups: &[TrackedDetectionGroup]) -> Vec<Detection> {
        groups
            .iter()
            .flat_map(|g| g.detections.iter())
            .filter(|d| d.class_id == self.config.target_class)
            .cloned()
            .collect()
    }

    /// Run association and group the results per track id, first-seen order.
    fn track(&mut self, detections: &[Detection]) -> Result<Vec<TrackedDetectionGroup>> {
        let tracker = self
            .tracker
            .as_mut()
            .ok_or_else(|| PipelineError::Model(format!("{}: tracker not set up", self.name)))?;

        let mut groups: Vec<TrackedDetectionGroup> = Vec::new();
        for (det, id) in tracker.step(detections) {
            match groups.iter_mut().find(|g| g.tracker_id == Some(id)) {
                Some(group) => group.detections.push(det),
                None => groups.push(TrackedDetectionGroup::tracked(id, self.palette.color_for(id), vec![det])),
            }
        }
        Ok(groups)
    }
}

impl Node for TrackerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self) -> Result<()> {
        self.tracker = Some((self.factory)(&self.config));
        Ok(())
    }

    fn step(&mut self, inputs: Inputs) -> Result<DataChunk> {
        let frames = super::collect_frames(&self.name, inputs, &self.config.frames_key);

        let mut tracked = Vec::new();
        for (_, frame) in frames {
            if frame.src_id() != self.config.source_key {
                continue;
            }
            let filtered = self.filter_detections(&frame.detections);
            let groups = self.track(&filtered)?;
            tracing::debug!(
                "{}: {} of {} detections tracked into {} groups for {:?}",
                self.name,
                filtered.len(),
                frame.all_boxes.len(),
                groups.len(),
                frame.frame
            );
            tracked.push(AnnotatedFrame::new(frame.frame, groups, frame.all_boxes));
        }

        Ok(super::annotated_chunk(&self.config.frames_key, tracked))
    }

    fn teardown(&mut self) -> Result<()> {
        self.tracker = None;
        Ok(())
    }
}
