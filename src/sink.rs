use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::VideoWriter,
};

use crate::error::{PipelineError, Result};

/// Somewhere a stream of rendered frames can be appended to by name.
pub trait FrameSink {
    fn write(&mut self, name: &str, image: &Mat) -> Result<()>;

    /// Flush and close every open stream.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each named stream to `{dir}/{name}.mp4`.
pub struct VideoFileSink {
    dir: PathBuf,
    fps: f64,
    writers: HashMap<String, VideoWriter>,
}

impl VideoFileSink {
    pub fn new(dir: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            dir: dir.into(),
            fps,
            writers: HashMap::new(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.mp4", name))
    }

    fn open(&self, path: &Path, size: Size) -> Result<VideoWriter> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(&path.to_string_lossy(), fourcc, self.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(PipelineError::Io(std::io::Error::other(format!(
                "could not open video writer for {}",
                path.display()
            ))));
        }
        tracing::info!("Writing video to {}", path.display());
        Ok(writer)
    }
}

impl FrameSink for VideoFileSink {
    fn write(&mut self, name: &str, image: &Mat) -> Result<()> {
        if image.empty() {
            return Ok(());
        }
        if !self.writers.contains_key(name) {
            let path = self.path_for(name);
            let writer = self.open(&path, image.size()?)?;
            self.writers.insert(name.to_string(), writer);
        }
        if let Some(writer) = self.writers.get_mut(name) {
            writer.write(image)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        for (name, mut writer) in self.writers.drain() {
            tracing::debug!("Closing video stream {}", name);
            writer.release()?;
        }
        Ok(())
    }
}
