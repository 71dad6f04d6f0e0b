use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_FRAMES_KEY: &str = "frame";

fn default_frames_key() -> String {
    DEFAULT_FRAMES_KEY.to_string()
}

fn default_true() -> bool {
    true
}

/// How the rows of a detector's output tensor are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Guess from the row width: 6 columns is post-NMS, anything wider is raw.
    #[default]
    Auto,
    /// `cx, cy, w, h, objectness, class scores...`
    Raw,
    /// `x1, y1, x2, y2, confidence, class`
    PostNms,
}

/// Settings for one detector node.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Local path or http(s) URL of the model weights.
    pub weights: String,
    #[serde(default = "DetectorConfig::default_img_size")]
    pub img_size: i64,
    /// "cpu" or "cuda"
    #[serde(default = "DetectorConfig::default_device")]
    pub device: String,
    #[serde(default = "DetectorConfig::default_conf_thresh")]
    pub conf_thresh: f32,
    #[serde(default = "DetectorConfig::default_iou_thresh")]
    pub iou_thresh: f32,
    /// Required for single-class raw models, whose rows are also 6 wide.
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_frames_key")]
    pub frames_key: String,
    /// Draw raw detections into a window while stepping.
    #[serde(default)]
    pub debug: bool,
}

impl DetectorConfig {
    pub fn new(weights: impl Into<String>) -> Self {
        Self {
            weights: weights.into(),
            img_size: Self::default_img_size(),
            device: Self::default_device(),
            conf_thresh: Self::default_conf_thresh(),
            iou_thresh: Self::default_iou_thresh(),
            output_format: OutputFormat::Auto,
            frames_key: default_frames_key(),
            debug: false,
        }
    }

    fn default_img_size() -> i64 {
        640
    }

    fn default_device() -> String {
        "cpu".to_string()
    }

    fn default_conf_thresh() -> f32 {
        0.4
    }

    fn default_iou_thresh() -> f32 {
        0.5
    }
}

/// Settings for one tracker node.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Only frames whose `src_id` equals this are tracked.
    pub source_key: String,
    #[serde(default = "TrackerConfig::default_max_age")]
    pub max_age: u32,
    #[serde(default = "TrackerConfig::default_min_hits")]
    pub min_hits: u32,
    #[serde(default = "TrackerConfig::default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default)]
    pub target_class: i32,
    #[serde(default = "default_frames_key")]
    pub frames_key: String,
    #[serde(default = "TrackerConfig::default_palette_size")]
    pub palette_size: usize,
    #[serde(default)]
    pub palette_seed: u64,
}

impl TrackerConfig {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            max_age: Self::default_max_age(),
            min_hits: Self::default_min_hits(),
            iou_threshold: Self::default_iou_threshold(),
            target_class: 0,
            frames_key: default_frames_key(),
            palette_size: Self::default_palette_size(),
            palette_seed: 0,
        }
    }

    fn default_max_age() -> u32 {
        30
    }

    fn default_min_hits() -> u32 {
        3
    }

    fn default_iou_threshold() -> f32 {
        0.7
    }

    fn default_palette_size() -> usize {
        200
    }
}

/// Settings for one painter node.
#[derive(Debug, Clone, Deserialize)]
pub struct PainterConfig {
    #[serde(default = "default_frames_key")]
    pub frames_key: String,
    #[serde(default = "default_true")]
    pub draw_boxes: bool,
    #[serde(default = "default_true")]
    pub put_text: bool,
    #[serde(default)]
    pub show: bool,
    /// Videos are written as `{prefix}_{src_id}` when set.
    #[serde(default)]
    pub video_title_prefix: Option<String>,
    #[serde(default = "PainterConfig::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "PainterConfig::default_fps")]
    pub fps: f64,
    /// Raw classes to flood-fill from the unfiltered detections.
    #[serde(default)]
    pub paint_classes: Option<Vec<i32>>,
    #[serde(default)]
    pub threshold_bbox_distance: Option<f32>,
    /// Steps a track may go unpainted before its movement history is dropped.
    #[serde(default = "PainterConfig::default_history_ttl")]
    pub history_ttl: u64,
}

impl PainterConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_fps() -> f64 {
        30.0
    }

    fn default_history_ttl() -> u64 {
        30
    }
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            frames_key: default_frames_key(),
            draw_boxes: true,
            put_text: true,
            show: false,
            video_title_prefix: None,
            output_dir: Self::default_output_dir(),
            fps: Self::default_fps(),
            paint_classes: None,
            threshold_bbox_distance: None,
            history_ttl: Self::default_history_ttl(),
        }
    }
}

/// Settings for the whole detector -> tracker -> painter chain.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub painter: PainterConfig,
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_json::from_str(data)?;
        Ok(cfg)
    }
}
