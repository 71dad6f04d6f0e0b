//! Pipeline stages implementing [`crate::node::Node`].

pub mod detector;
pub mod painter;
pub mod tracker;
pub mod video;

pub use detector::DetectorNode;
pub use painter::PainterNode;
pub use tracker::TrackerNode;
pub use video::VideoSourceNode;

use crate::chunk::{DataChunk, Inputs, Payload};
use crate::frame::AnnotatedFrame;

/// Pull the frames stored under `key` out of every upstream chunk, in input
/// order. Chunks without the key are skipped.
pub(crate) fn collect_frames(node: &str, inputs: Inputs, key: &str) -> Vec<(String, AnnotatedFrame)> {
    let mut collected = Vec::new();
    for (upstream, mut chunk) in inputs {
        match chunk.take(key).and_then(Payload::into_annotated) {
            Some(frames) => {
                tracing::debug!("{}: got {} frames from {}", node, frames.len(), upstream);
                collected.extend(frames.into_iter().map(|f| (upstream.clone(), f)));
            }
            None => tracing::debug!("{}: no `{}` frames from {}", node, key, upstream),
        }
    }
    collected
}

pub(crate) fn annotated_chunk(key: &str, frames: Vec<AnnotatedFrame>) -> DataChunk {
    let mut chunk = DataChunk::new();
    chunk.add(key, Payload::Annotated(frames));
    chunk
}
