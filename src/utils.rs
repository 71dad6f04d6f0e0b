use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::SVector;

use crate::error::{PipelineError, Result};

/// Perform non-max suppression on tlwh boxes & scores, return indices to keep.
pub fn nms(boxes: &[SVector<f32, 4>], scores: &[f32], iou_thresh: f32) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..boxes.len()).collect();
    idxs.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]));
    let mut keep = Vec::new();
    while let Some(&i) = idxs.first() {
        keep.push(i);
        idxs = idxs
            .into_iter()
            .skip(1)
            .filter(|&j| compute_iou(&boxes[i], &boxes[j]) < iou_thresh)
            .collect();
    }
    keep
}

/// Compute IoU between two tlwh boxes.
pub fn compute_iou(a: &SVector<f32, 4>, b: &SVector<f32, 4>) -> f32 {
    compute_iou_tlbr(
        [a[0], a[1], a[0] + a[2], a[1] + a[3]],
        [b[0], b[1], b[0] + b[2], b[1] + b[3]],
    )
}

fn compute_iou_tlbr(a: [f32; 4], b: [f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let a_area = (a[2] - a[0]) * (a[3] - a[1]);
    let b_area = (b[2] - b[0]) * (b[3] - b[1]);
    let union = a_area + b_area - inter_area;

    if union <= 0.0 {
        return 0.0;
    }

    inter_area / union
}

/// IoU of every `a` against every `b`, row-major by `a`.
pub fn iou_matrix(a: &[SVector<f32, 4>], b: &[SVector<f32, 4>]) -> Vec<Vec<f32>> {
    a.iter()
        .map(|x| b.iter().map(|y| compute_iou(x, y)).collect())
        .collect()
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Turn a weights location into a readable local file.
///
/// URLs are downloaded into `scratch_dir`; local paths must exist.
pub fn resolve_weights(location: &str, scratch_dir: &Path) -> Result<PathBuf> {
    if is_url(location) {
        let name = location
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("weights.pt");
        let dest = scratch_dir.join(name);
        download_file(location, &dest)?;
        return Ok(dest);
    }

    let path = PathBuf::from(location);
    if !path.is_file() {
        return Err(PipelineError::Model(format!(
            "weights not found at {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Download `url` to `dest` with a progress bar.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let download_err = |reason: String| PipelineError::Download {
        url: url.to_string(),
        reason,
    };

    tracing::info!("Downloading weights from {}", url);
    let response = ureq::get(url).call().map_err(|e| download_err(e.to_string()))?;
    if response.status() != 200 {
        return Err(download_err(format!("status {}", response.status())));
    }

    let total = response
        .header("content-length")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_message("Downloading weights");

    let mut reader = pb.wrap_read(response.into_reader());
    let mut file = File::create(dest)?;
    io::copy(&mut reader, &mut file)?;
    pb.finish_and_clear();

    tracing::info!("Saved weights to {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bx(t: f32, l: f32, w: f32, h: f32) -> SVector<f32, 4> {
        SVector::<f32, 4>::new(t, l, w, h)
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        assert_relative_eq!(compute_iou(&bx(0.0, 0.0, 10.0, 10.0), &bx(0.0, 0.0, 10.0, 10.0)), 1.0);
        assert_relative_eq!(compute_iou(&bx(0.0, 0.0, 10.0, 10.0), &bx(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // 50 shared of 150 total
        let iou = compute_iou(&bx(0.0, 0.0, 10.0, 10.0), &bx(5.0, 0.0, 10.0, 10.0));
        assert_relative_eq!(iou, 50.0 / 150.0, epsilon = 1e-6);
    }

    #[test]
    fn test_iou_degenerate_box() {
        assert_relative_eq!(compute_iou(&bx(0.0, 0.0, 0.0, 0.0), &bx(0.0, 0.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let boxes = vec![
            bx(0.0, 0.0, 10.0, 10.0),
            bx(1.0, 1.0, 10.0, 10.0),
            bx(50.0, 50.0, 10.0, 10.0),
        ];
        let scores = vec![0.6, 0.9, 0.5];
        let keep = nms(&boxes, &scores, 0.5);
        assert_eq!(keep, vec![1, 2]);
    }

    #[test]
    fn test_iou_matrix_shape() {
        let m = iou_matrix(&[bx(0.0, 0.0, 1.0, 1.0)], &[bx(0.0, 0.0, 1.0, 1.0), bx(5.0, 5.0, 1.0, 1.0)]);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].len(), 2);
    }

    #[test]
    fn test_resolve_missing_local_weights() {
        let dir = tempfile::tempdir().unwrap();
        let res = resolve_weights("does/not/exist.pt", dir.path());
        assert!(matches!(res, Err(PipelineError::Model(_))));
    }

    #[test]
    fn test_resolve_existing_local_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.pt");
        std::fs::write(&path, b"weights").unwrap();
        let resolved = resolve_weights(path.to_str().unwrap(), dir.path()).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_unreachable_url_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = resolve_weights("http://127.0.0.1:1/w.pt", dir.path());
        match res {
            Err(PipelineError::Download { url, .. }) => assert_eq!(url, "http://127.0.0.1:1/w.pt"),
            other => panic!("expected download error, got {:?}", other),
        }
        assert!(!dir.path().join("w.pt").exists());
    }
}
