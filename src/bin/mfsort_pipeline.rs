use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use mfsort_pipeline::{
    torchscript::TorchScriptDetector, DetectorNode, Inputs, NodeHandle, PainterNode, PipelineConfig,
    TrackerNode, VideoSourceNode,
};

#[derive(Parser)]
#[command(
    name = "mfsort-pipeline",
    about = "Detect, track and paint objects across one or more videos",
    version = "0.1.0"
)]
struct Args {
    /// Video files to read; each becomes a source named after its file stem
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Path to pipeline configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Track this source instead of the configured one
    #[arg(long)]
    source_key: Option<String>,

    /// Write painted videos as `{prefix}_{source}.mp4`
    #[arg(short, long)]
    output_prefix: Option<String>,

    /// Show painted frames in a window per source
    #[arg(long)]
    show: bool,
}

fn source_name(path: &Path, index: usize) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("source{}", index))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = PipelineConfig::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(key) = args.source_key {
        config.tracker.source_key = key;
    }
    if args.output_prefix.is_some() {
        config.painter.video_title_prefix = args.output_prefix;
    }
    config.painter.show |= args.show;

    let mut sources: Vec<NodeHandle<VideoSourceNode>> = args
        .inputs
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let node = VideoSourceNode::from_file(source_name(path, i), path.to_string_lossy())
                .with_frames_key(config.detector.frames_key.clone());
            NodeHandle::new(node)
        })
        .collect();
    let mut detector = NodeHandle::new(DetectorNode::new(
        "detector",
        config.detector.clone(),
        TorchScriptDetector::loader,
    ));
    let mut tracker = NodeHandle::new(TrackerNode::new("tracker", config.tracker.clone()));
    let mut painter = NodeHandle::new(PainterNode::new("painter", config.painter.clone()));

    for source in sources.iter_mut() {
        source.setup().with_context(|| format!("opening {}", source.name()))?;
    }
    detector.setup().context("loading detector")?;
    tracker.setup()?;
    painter.setup()?;

    let mut ticks = 0u64;
    while sources.iter().any(|s| !s.node().is_finished()) {
        let mut frames = Inputs::new();
        for source in sources.iter_mut().filter(|s| !s.node().is_finished()) {
            let chunk = source.step(Inputs::new())?;
            if !chunk.is_empty() {
                frames.insert(source.name().to_string(), chunk);
            }
        }
        if frames.is_empty() {
            continue;
        }

        let detected = detector.step(frames)?;
        let tracked = tracker.step(Inputs::from([(detector.name().to_string(), detected)]))?;
        painter.step(Inputs::from([(tracker.name().to_string(), tracked)]))?;
        ticks += 1;
    }
    tracing::info!("Processed {} ticks", ticks);

    for source in sources.iter_mut() {
        tracing::info!("{}: read {} frames", source.name(), source.node().frames_read());
        source.teardown()?;
    }
    detector.teardown()?;
    tracker.teardown()?;
    painter.teardown()?;
    Ok(())
}
