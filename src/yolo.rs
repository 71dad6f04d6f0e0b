//! Decoding of YOLO output rows into [`Detection`]s.

use nalgebra::SVector;

use crate::config::OutputFormat;
use crate::detection::Detection;
use crate::error::{PipelineError, Result};
use crate::utils;

/// Row layout of a YOLO output tensor `[1, N, cols]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `cx, cy, w, h, objectness, class scores...` before NMS.
    Raw { classes: usize },
    /// `x1, y1, x2, y2, confidence, class` after the model's own NMS.
    PostNms,
}

impl OutputLayout {
    /// The layout of `cols`-wide rows in the given format.
    pub fn resolve(format: OutputFormat, cols: usize) -> Result<Self> {
        match (format, cols) {
            (OutputFormat::Auto, 6) | (OutputFormat::PostNms, 6) => Ok(OutputLayout::PostNms),
            (OutputFormat::Auto, c) | (OutputFormat::Raw, c) if c > 5 => Ok(OutputLayout::Raw { classes: c - 5 }),
            (format, c) => Err(PipelineError::Model(format!(
                "output width {} does not fit {:?} rows",
                c, format
            ))),
        }
    }

    pub fn columns(self) -> usize {
        match self {
            OutputLayout::Raw { classes } => 5 + classes,
            OutputLayout::PostNms => 6,
        }
    }
}

/// Decoding parameters, with boxes scaled from network input back to the
/// source image.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    pub layout: OutputLayout,
    pub scale_x: f32,
    pub scale_y: f32,
    pub conf_thresh: f32,
    pub iou_thresh: f32,
}

impl Decoder {
    /// Decode row-major output `data`, drop anything under `conf_thresh`, then
    /// run class-agnostic NMS.
    pub fn decode(&self, data: &[f32]) -> Vec<Detection> {
        let cols = self.layout.columns();
        let candidates: Vec<Detection> = data
            .chunks_exact(cols)
            .filter_map(|row| self.decode_row(row))
            .filter(|d| d.confidence() >= self.conf_thresh)
            .collect();

        let boxes: Vec<SVector<f32, 4>> = candidates.iter().map(|d| d.tlwh).collect();
        let scores: Vec<f32> = candidates.iter().map(Detection::confidence).collect();
        let keep = utils::nms(&boxes, &scores, self.iou_thresh);
        keep.into_iter().map(|i| candidates[i].clone()).collect()
    }

    fn decode_row(&self, row: &[f32]) -> Option<Detection> {
        let (x1, y1, x2, y2, confidence, class_id) = match self.layout {
            OutputLayout::Raw { .. } => {
                let (class_id, class_score) = row[5..]
                    .iter()
                    .copied()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(&b.1))?;
                let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
                (
                    cx - w / 2.0,
                    cy - h / 2.0,
                    cx + w / 2.0,
                    cy + h / 2.0,
                    row[4] * class_score,
                    class_id as i32,
                )
            }
            OutputLayout::PostNms => (row[0], row[1], row[2], row[3], row[4], row[5] as i32),
        };

        let w = (x2 - x1) * self.scale_x;
        let h = (y2 - y1) * self.scale_y;
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        Some(Detection::from_tlwh(
            x1 * self.scale_x,
            y1 * self.scale_y,
            w,
            h,
            confidence,
            class_id,
        ))
    }
}
