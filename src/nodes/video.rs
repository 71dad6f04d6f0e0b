use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::chunk::{DataChunk, Inputs, Payload};
use crate::config::DEFAULT_FRAMES_KEY;
use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::node::Node;

#[derive(Debug, Clone, PartialEq)]
enum Origin {
    File(String),
    Camera(i32),
}

/// Emits one frame per step from a video file or camera.
pub struct VideoSourceNode {
    name: String,
    origin: Origin,
    frames_key: String,
    capture: Option<VideoCapture>,
    frame_count: u64,
    finished: bool,
}

impl VideoSourceNode {
    /// `name` doubles as the `src_id` stamped on every frame.
    pub fn from_file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_origin(name.into(), Origin::File(path.into()))
    }

    pub fn from_camera(name: impl Into<String>, index: i32) -> Self {
        Self::with_origin(name.into(), Origin::Camera(index))
    }

    fn with_origin(name: String, origin: Origin) -> Self {
        Self {
            name,
            origin,
            frames_key: DEFAULT_FRAMES_KEY.to_string(),
            capture: None,
            frame_count: 0,
            finished: false,
        }
    }

    pub fn with_frames_key(mut self, key: impl Into<String>) -> Self {
        self.frames_key = key.into();
        self
    }

    /// True once the stream has run dry.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn frames_read(&self) -> u64 {
        self.frame_count
    }

    fn open(&self) -> Result<VideoCapture> {
        let capture = match &self.origin {
            Origin::File(path) => VideoCapture::from_file(path, videoio::CAP_ANY)?,
            Origin::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY)?,
        };
        if !capture.is_opened()? {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: could not open {:?}", self.name, self.origin),
            )));
        }
        Ok(capture)
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(None);
        };
        let mut image = Mat::default();
        if !capture.read(&mut image)? || image.empty() {
            return Ok(None);
        }
        Ok(Some(image))
    }
}

impl Node for VideoSourceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self) -> Result<()> {
        let capture = self.open()?;
        tracing::info!(
            "{}: opened {:?} ({} frames at {} fps)",
            self.name,
            self.origin,
            capture.get(videoio::CAP_PROP_FRAME_COUNT)?,
            capture.get(videoio::CAP_PROP_FPS)?
        );
        self.capture = Some(capture);
        self.frame_count = 0;
        self.finished = false;
        Ok(())
    }

    fn step(&mut self, _inputs: Inputs) -> Result<DataChunk> {
        let mut chunk = DataChunk::new();
        if self.finished {
            return Ok(chunk);
        }

        match self.read_frame()? {
            Some(image) => {
                let frame = Frame::new(image, self.frame_count, self.name.clone());
                self.frame_count += 1;
                chunk.add(self.frames_key.clone(), Payload::Frames(vec![frame]));
            }
            None => {
                tracing::info!("{}: end of stream after {} frames", self.name, self.frame_count);
                self.finished = true;
            }
        }
        Ok(chunk)
    }

    fn teardown(&mut self) -> Result<()> {
        if let Some(mut capture) = self.capture.take() {
            capture.release()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FrameSink, VideoFileSink};
    use opencv::core::{Scalar, CV_8UC3};

    #[test]
    fn test_missing_file_fails_setup() {
        let mut node = VideoSourceNode::from_file("cam0", "/no/such/video.mp4");
        assert!(node.setup().is_err());
    }

    #[test]
    fn test_step_without_capture_ends_stream() {
        let mut node = VideoSourceNode::from_file("cam0", "unused.mp4");
        let chunk = node.step(Inputs::new()).unwrap();
        assert!(chunk.is_empty());
        assert!(node.is_finished());
        assert_eq!(node.frames_read(), 0);
    }

    // Needs an OpenCV build with an mp4v encoder and matching decoder.
    #[test]
    #[ignore]
    fn test_reads_written_video() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoFileSink::new(dir.path(), 10.0);
        let image = Mat::new_rows_cols_with_default(64, 64, CV_8UC3, Scalar::all(128.0)).unwrap();
        for _ in 0..3 {
            sink.write("clip", &image).unwrap();
        }
        sink.close().unwrap();

        let path = sink.path_for("clip");
        let mut node = VideoSourceNode::from_file("clip", path.to_string_lossy());
        node.setup().unwrap();

        let mut counts = Vec::new();
        loop {
            let mut chunk = node.step(Inputs::new()).unwrap();
            match chunk.take("frame").and_then(Payload::into_frames) {
                Some(frames) => counts.extend(frames.iter().map(|f| f.frame_count)),
                None => break,
            }
        }
        node.teardown().unwrap();

        assert_eq!(counts, vec![0, 1, 2]);
        assert_eq!(node.frames_read(), 3);
        assert!(node.is_finished());
    }
}
