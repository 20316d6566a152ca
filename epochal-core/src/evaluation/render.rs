//! Per-sample visualization artifacts.

use crate::data::Sample;
use crate::error::{ExperimentError, Result};
use crate::tensor::Tensor;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, Luma};

/// Turns one evaluated sample into the bytes of an artifact file.
pub trait ArtifactRenderer {
    /// File extension of produced artifacts, without the dot.
    fn extension(&self) -> &str;

    fn render(&self, sample: &Sample, prediction: &Tensor) -> Result<Vec<u8>>;
}

const BACKGROUND: Luma<u8> = Luma([64]);

/// Grayscale PNG with three tile rows: input frames, target frames, predicted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngStripRenderer {
    scale: u32,
}

impl Default for PngStripRenderer {
    fn default() -> Self {
        Self { scale: 4 }
    }
}

impl PngStripRenderer {
    pub fn new(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }
}

/// `(frames, height, width)` of a `[T, H, W]` tensor.
fn frame_dims(label: &str, tensor: &Tensor) -> Result<(usize, usize, usize)> {
    match tensor.shape() {
        [t, h, w] if *h > 0 && *w > 0 => Ok((*t, *h, *w)),
        other => Err(ExperimentError::render(format!(
            "{label} must have shape [frames, height, width], got {other:?}"
        ))),
    }
}

fn to_pixel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl ArtifactRenderer for PngStripRenderer {
    fn extension(&self) -> &str {
        "png"
    }

    fn render(&self, sample: &Sample, prediction: &Tensor) -> Result<Vec<u8>> {
        let rows = [
            ("input", &sample.input),
            ("target", &sample.target),
            ("prediction", prediction),
        ];
        let mut dims = Vec::with_capacity(rows.len());
        for (label, tensor) in rows {
            dims.push(frame_dims(label, tensor)?);
        }
        let (_, h, w) = dims[0];
        if dims.iter().any(|&(_, fh, fw)| (fh, fw) != (h, w)) {
            return Err(ExperimentError::render(format!(
                "frame sizes differ between rows: {dims:?}"
            )));
        }
        let columns = dims.iter().map(|&(t, _, _)| t).max().unwrap_or(0).max(1) as u32;

        let tile_w = w as u32 * self.scale;
        let tile_h = h as u32 * self.scale;
        let width = columns * (tile_w + 1) + 1;
        let height = rows.len() as u32 * (tile_h + 1) + 1;
        let mut img = GrayImage::from_pixel(width, height, BACKGROUND);

        for (row, (_, tensor)) in rows.iter().enumerate() {
            let oy = row as u32 * (tile_h + 1) + 1;
            for (col, frame) in tensor.data().chunks(h * w).enumerate() {
                let ox = col as u32 * (tile_w + 1) + 1;
                for py in 0..tile_h {
                    for px in 0..tile_w {
                        let src = (py / self.scale) as usize * w + (px / self.scale) as usize;
                        img.put_pixel(ox + px, oy + py, Luma([to_pixel(frame[src])]));
                    }
                }
            }
        }

        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, ColorType::L8)
            .map_err(|e| ExperimentError::render(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t_in: usize, t_out: usize, size: usize) -> Sample {
        Sample {
            input: Tensor::from_vec(vec![t_in, size, size], vec![1.0; t_in * size * size])
                .unwrap(),
            target: Tensor::zeros(vec![t_out, size, size]),
        }
    }

    #[test]
    fn test_renders_png() {
        let renderer = PngStripRenderer::new(2);
        let s = sample(3, 2, 4);
        let bytes = renderer.render(&s, &s.target).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        // 3 columns of 8px tiles plus separators, 3 rows likewise.
        assert_eq!(img.dimensions(), (3 * 9 + 1, 3 * 9 + 1));
        assert_eq!(img.get_pixel(1, 1), &Luma([255]));
        assert_eq!(img.get_pixel(1, 10), &Luma([0]));
        assert_eq!(img.get_pixel(0, 0), &BACKGROUND);
    }

    #[test]
    fn test_clamps_values() {
        assert_eq!(to_pixel(-3.0), 0);
        assert_eq!(to_pixel(7.0), 255);
        assert_eq!(to_pixel(0.5), 128);
    }

    #[test]
    fn test_rejects_mismatched_frames() {
        let renderer = PngStripRenderer::default();
        let s = sample(2, 1, 4);
        let bad = Tensor::zeros(vec![1, 5, 5]);
        assert!(renderer.render(&s, &bad).is_err());
        let flat = Tensor::zeros(vec![16]);
        assert!(renderer.render(&s, &flat).is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(PngStripRenderer::default().extension(), "png");
        assert_eq!(PngStripRenderer::new(0).scale(), 1);
    }
}
