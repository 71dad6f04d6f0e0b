use std::collections::{HashMap, VecDeque};

use opencv::highgui;

use crate::chunk::{DataChunk, Inputs};
use crate::config::PainterConfig;
use crate::error::Result;
use crate::frame::{AnnotatedFrame, TrackedDetectionGroup};
use crate::node::Node;
use crate::sink::{FrameSink, VideoFileSink};
use crate::track::TrackId;
use crate::visualization;

/// Positions kept per track for movement flagging.
const MAX_HISTORY: usize = 1000;

/// Top-left corners of one track's first box, oldest first.
#[derive(Debug, Default)]
struct TrackHistory {
    positions: VecDeque<(f32, f32)>,
    last_seen: u64,
}

/// Renders groups onto their frames, then optionally shows and records them.
pub struct PainterNode {
    name: String,
    config: PainterConfig,
    sink: Option<Box<dyn FrameSink>>,
    history: HashMap<Option<TrackId>, TrackHistory>,
    steps: u64,
}

impl PainterNode {
    pub fn new(name: impl Into<String>, config: PainterConfig) -> Self {
        Self {
            name: name.into(),
            config,
            sink: None,
            history: HashMap::new(),
            steps: 0,
        }
    }

    /// Record through `sink` instead of video files.
    pub fn with_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Record where `group` is now and report the newest box when the track
    /// has moved further than `threshold` from its oldest recorded corner.
    fn moved_box(&mut self, group: &TrackedDetectionGroup, threshold: f32) -> Option<opencv::core::Rect> {
        let det = group.detections.first()?;
        let history = self.history.entry(group.tracker_id).or_default();
        history.last_seen = self.steps;
        if history.positions.len() == MAX_HISTORY {
            history.positions.pop_front();
        }
        history.positions.push_back((det.tlwh[0], det.tlwh[1]));

        let (fx, fy) = history.positions.front().copied()?;
        let (lx, ly) = history.positions.back().copied()?;
        let distance = (fx - lx).hypot(fy - ly);
        (distance > threshold).then(|| det.pixel_rect())
    }

    /// Forget tracks that have not been painted for `history_ttl` steps.
    fn evict_stale(&mut self) {
        let (now, ttl) = (self.steps, self.config.history_ttl);
        self.history.retain(|_, h| now - h.last_seen <= ttl);
    }

    fn paint(&mut self, frame: &mut AnnotatedFrame) -> Result<()> {
        let draw_boxes = self.config.draw_boxes;
        let put_text = self.config.put_text;

        for group in &frame.detections {
            if let Some(threshold) = self.config.threshold_bbox_distance {
                if let Some(rect) = self.moved_box(group, threshold) {
                    visualization::draw_box(&mut frame.frame.image, rect, group.color, visualization::BOX_THICKNESS)?;
                }
            }
            visualization::draw_group(&mut frame.frame.image, group, draw_boxes, put_text)?;
        }

        if let Some(classes) = &self.config.paint_classes {
            visualization::fill_classes(&mut frame.frame.image, &frame.all_boxes, classes)?;
        }
        Ok(())
    }

    fn video_name(&self, src_id: &str) -> Option<String> {
        self.config
            .video_title_prefix
            .as_ref()
            .map(|prefix| format!("{}_{}", prefix, src_id))
    }
}

impl Node for PainterNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self) -> Result<()> {
        self.history.clear();
        self.steps = 0;
        if self.sink.is_none() && self.config.video_title_prefix.is_some() {
            self.sink = Some(Box::new(VideoFileSink::new(
                self.config.output_dir.clone(),
                self.config.fps,
            )));
        }
        Ok(())
    }

    fn step(&mut self, inputs: Inputs) -> Result<DataChunk> {
        let frames = super::collect_frames(&self.name, inputs, &self.config.frames_key);
        self.steps += 1;

        let mut collected = Vec::with_capacity(frames.len());
        for (_, mut frame) in frames {
            self.paint(&mut frame)?;
            collected.push(frame);
        }
        self.evict_stale();

        for frame in &collected {
            if self.config.show {
                visualization::show(frame.src_id(), frame.image())?;
            }
            if let Some(name) = self.video_name(frame.src_id()) {
                if let Some(sink) = self.sink.as_mut() {
                    sink.write(&name, frame.image())?;
                }
            }
        }

        Ok(super::annotated_chunk(&self.config.frames_key, collected))
    }

    fn teardown(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.close()?;
        }
        if self.config.show {
            highgui::destroy_all_windows()?;
        }
        Ok(())
    }
}
