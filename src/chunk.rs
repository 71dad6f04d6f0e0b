use std::collections::BTreeMap;

use opencv::core::Mat;

use crate::frame::{AnnotatedFrame, Frame};

/// Semantic tag a downstream consumer may special-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Image,
}

/// A value carried in a [`DataChunk`].
#[derive(Debug, Clone)]
pub enum Payload {
    Frames(Vec<Frame>),
    Annotated(Vec<AnnotatedFrame>),
    Image(Mat),
}

impl Payload {
    /// The frames carried by a frame payload, dropping any annotations.
    pub fn into_frames(self) -> Option<Vec<Frame>> {
        match self {
            Payload::Frames(frames) => Some(frames),
            Payload::Annotated(frames) => Some(frames.into_iter().map(|f| f.frame).collect()),
            Payload::Image(_) => None,
        }
    }

    /// The annotated frames carried by a frame payload; raw frames come back
    /// without groups.
    pub fn into_annotated(self) -> Option<Vec<AnnotatedFrame>> {
        match self {
            Payload::Frames(frames) => Some(frames.into_iter().map(AnnotatedFrame::from).collect()),
            Payload::Annotated(frames) => Some(frames),
            Payload::Image(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Payload,
    pub kind: Option<Kind>,
}

/// The per-step key/value batch exchanged between nodes.
#[derive(Debug, Clone, Default)]
pub struct DataChunk {
    entries: BTreeMap<String, Entry>,
}

/// Upstream node name to the chunk it produced this step.
pub type Inputs = BTreeMap<String, DataChunk>;

impl DataChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: Payload) {
        self.entries.insert(key.into(), Entry { value, kind: None });
    }

    pub fn add_tagged(&mut self, key: impl Into<String>, value: Payload, kind: Kind) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                kind: Some(kind),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Remove and return the value under `key`.
    pub fn take(&mut self, key: &str) -> Option<Payload> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
