use std::path::Path;

use opencv::{
    core::{Mat, Size, Vec3f, CV_32F},
    imgproc,
    prelude::*,
};
use tch::{Device, Kind, Tensor};

use crate::config::{DetectorConfig, OutputFormat};
use crate::detection::{Detection, DetectionModel};
use crate::error::{PipelineError, Result};
use crate::yolo::{Decoder, OutputLayout};

/// A YOLO TorchScript module run through libtorch.
pub struct TorchScriptDetector {
    model: tch::CModule,
    device: Device,
    img_size: i64,
    output_format: OutputFormat,
    conf_thresh: f32,
    iou_thresh: f32,
}

impl TorchScriptDetector {
    pub fn load(weights: &Path, config: &DetectorConfig) -> Result<Self> {
        let device = if config.device.starts_with("cuda") && tch::Cuda::is_available() {
            Device::Cuda(0)
        } else {
            Device::Cpu
        };
        let mut model = tch::CModule::load_on_device(weights, device)?;
        model.set_eval();
        tracing::info!("Loaded {} on {:?}", weights.display(), device);

        Ok(Self {
            model,
            device,
            img_size: config.img_size,
            output_format: config.output_format,
            conf_thresh: config.conf_thresh,
            iou_thresh: config.iou_thresh,
        })
    }

    /// Boxed for use as a [`crate::nodes::detector::ModelLoader`].
    pub fn loader(weights: &Path, config: &DetectorConfig) -> Result<Box<dyn DetectionModel>> {
        Ok(Box::new(Self::load(weights, config)?))
    }

    /// Resize to the square input, BGR to RGB, scale to [0, 1], NCHW.
    fn preprocess(&self, image: &Mat) -> Result<Tensor> {
        let side = self.img_size as i32;
        let mut resized = Mat::default();
        imgproc::resize(image, &mut resized, Size::new(side, side), 0.0, 0.0, imgproc::INTER_LINEAR)?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_mat = Mat::default();
        rgb.convert_to(&mut float_mat, CV_32F, 1.0 / 255.0, 0.0)?;

        let pixels: Vec<f32> = float_mat
            .data_typed::<Vec3f>()?
            .iter()
            .flat_map(|px| px.0)
            .collect();

        Ok(Tensor::from_slice(&pixels)
            .reshape([1, self.img_size, self.img_size, 3])
            .permute([0, 3, 1, 2])
            .to_kind(Kind::Float)
            .to_device(self.device))
    }
}

impl DetectionModel for TorchScriptDetector {
    fn predict(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        if image.empty() {
            return Ok(Vec::new());
        }
        let input = self.preprocess(image)?;
        let output = tch::no_grad(|| self.model.forward_ts(&[input]))?;

        let shape = output.size();
        if shape.len() != 3 {
            return Err(PipelineError::Model(format!("unexpected output shape {:?}", shape)));
        }
        let layout = OutputLayout::resolve(self.output_format, shape[2] as usize)?;
        let data = Vec::<f32>::try_from(output.to_device(Device::Cpu).to_kind(Kind::Float).flatten(0, -1))?;

        let decoder = Decoder {
            layout,
            scale_x: image.cols() as f32 / self.img_size as f32,
            scale_y: image.rows() as f32 / self.img_size as f32,
            conf_thresh: self.conf_thresh,
            iou_thresh: self.iou_thresh,
        };
        let detections = decoder.decode(&data);
        tracing::trace!("{:?}: {} rows, {} kept", layout, shape[1], detections.len());
        Ok(detections)
    }
}
