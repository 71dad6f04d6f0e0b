pub mod chunk;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod kalman_filter;
pub mod node;
pub mod nodes;
pub mod palette;
pub mod sink;
pub mod track;
pub mod tracker;
pub mod utils;
pub mod visualization;
pub mod yolo;

#[cfg(feature = "torch")]
pub mod torchscript;

// Re-export main types
pub use crate::chunk::{DataChunk, Inputs, Payload};
pub use crate::config::{DetectorConfig, OutputFormat, PainterConfig, PipelineConfig, TrackerConfig};
pub use crate::detection::{Detection, DetectionModel};
pub use crate::error::{PipelineError, Result};
pub use crate::frame::{AnnotatedFrame, Frame, TrackedDetectionGroup};
pub use crate::node::{Node, NodeHandle};
pub use crate::nodes::{DetectorNode, PainterNode, TrackerNode, VideoSourceNode};
pub use crate::tracker::{SortTracker, TrackerModel};
