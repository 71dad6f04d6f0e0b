use opencv::{
    core::{Mat, Point, Rect},
    highgui, imgproc,
    prelude::*,
};

use crate::detection::Detection;
use crate::frame::TrackedDetectionGroup;
use crate::palette::Color;

pub const BOX_THICKNESS: i32 = 2;
/// OpenCV thickness that fills the shape.
pub const FILLED: i32 = -1;

/// Draw a tlwh rectangle; `thickness == FILLED` floods it.
pub fn draw_box(img: &mut Mat, rect: Rect, color: Color, thickness: i32) -> opencv::Result<()> {
    imgproc::rectangle(img, rect, color.to_scalar(), thickness, imgproc::LINE_8, 0)
}

/// Draw `text` just above the box whose top-left corner is `(t, l)`.
pub fn draw_label(img: &mut Mat, text: &str, t: i32, l: i32, color: Color) -> opencv::Result<()> {
    imgproc::put_text(
        img,
        text,
        Point::new(t, l - 5),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        color.to_scalar(),
        2,
        imgproc::LINE_8,
        false,
    )
}

/// Draw every member of a group in the group's color, with its label when
/// the group carries a tracker id.
pub fn draw_group(
    img: &mut Mat,
    group: &TrackedDetectionGroup,
    draw_boxes: bool,
    put_text: bool,
) -> opencv::Result<()> {
    let label = group.label();
    for det in &group.detections {
        let rect = det.pixel_rect();
        if draw_boxes {
            draw_box(img, rect, group.color, BOX_THICKNESS)?;
        }
        if put_text {
            if let Some(text) = &label {
                draw_label(img, text, rect.x, rect.y, group.color)?;
            }
        }
    }
    Ok(())
}

/// Flood-fill the boxes of `classes` in green.
pub fn fill_classes(img: &mut Mat, boxes: &[Detection], classes: &[i32]) -> opencv::Result<()> {
    for det in boxes.iter().filter(|d| classes.contains(&d.class_id)) {
        draw_box(img, det.pixel_rect(), Color::GREEN, FILLED)?;
    }
    Ok(())
}

/// Show a frame in a named window without blocking.
pub fn show(window: &str, img: &Mat) -> opencv::Result<()> {
    if img.empty() {
        return Ok(());
    }
    highgui::imshow(window, img)?;
    highgui::wait_key(1)?;
    Ok(())
}
