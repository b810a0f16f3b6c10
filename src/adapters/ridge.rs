//! # 脊线（Hessian）分割
//!
//! 多尺度 Frangi 风格的脊线响应：在每个尺度上计算高斯平滑后的 Hessian 特征值，
//! 按 `exp(-Rb²/2β²)·(1 - exp(-S²/2c²))` 计算响应，取各尺度最大值，
//! 归一化后用固定阈值或 Otsu 阈值二值化。
//!
//! ## 依赖关系
//! - 被 `adapters/segment.rs` 调用

use crate::config::params::RidgeParams;
use crate::imaging::{self, filters, FloatImage, Mask};
use crate::models::StageReport;

use image::{DynamicImage, ImageBuffer, Luma};

/// 脊线分割，得到前景掩膜
pub fn segment(img: &DynamicImage, params: &RidgeParams, stages: &mut StageReport) -> Mask {
    let band = imaging::band(img, params.band);
    let response = filters::normalize(&ridge_response(&band, params));
    stages.applied("ridge filter");

    let level = params
        .level
        .unwrap_or_else(|| filters::otsu_level(&response));
    Mask::from_threshold(&response, level, false)
}

/// 各尺度最大的脊线响应
pub fn ridge_response(band: &FloatImage, params: &RidgeParams) -> FloatImage {
    let (w, h) = band.dimensions();
    let mut best = vec![0.0f32; (w * h) as usize];

    for &sigma in &params.sigmas {
        let smoothed = filters::gaussian(band, sigma);
        let eigen = hessian_eigenvalues(&smoothed, sigma);

        let c = params.c.unwrap_or_else(|| {
            let max_norm = eigen
                .iter()
                .map(|(l1, l2)| (l1 * l1 + l2 * l2).sqrt())
                .fold(0.0f32, f32::max);
            (max_norm / 2.0).max(f32::EPSILON)
        });

        for (out, (l1, l2)) in best.iter_mut().zip(&eigen) {
            let v = vesselness(*l1, *l2, params.beta, c, params.dark_ridges);
            if v > *out {
                *out = v;
            }
        }
    }

    ImageBuffer::from_vec(w, h, best).unwrap_or_else(|| ImageBuffer::new(w, h))
}

/// 单像素响应；`l1` 为绝对值较小的特征值
fn vesselness(l1: f32, l2: f32, beta: f32, c: f32, dark: bool) -> f32 {
    // 亮脊线横截面为凸（l2 < 0），暗脊线相反
    if (dark && l2 <= 0.0) || (!dark && l2 >= 0.0) {
        return 0.0;
    }
    let rb = l1 / l2;
    let s2 = l1 * l1 + l2 * l2;
    (-(rb * rb) / (2.0 * beta * beta)).exp() * (1.0 - (-s2 / (2.0 * c * c)).exp())
}

/// 尺度归一化的 Hessian 特征值，按绝对值升序
fn hessian_eigenvalues(img: &FloatImage, sigma: f32) -> Vec<(f32, f32)> {
    let (w, h) = img.dimensions();
    let at = |x: i64, y: i64| {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        img.get_pixel(cx, cy).0[0]
    };
    let scale = sigma * sigma;

    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let c = at(x, y);
            let dxx = (at(x + 1, y) - 2.0 * c + at(x - 1, y)) * scale;
            let dyy = (at(x, y + 1) - 2.0 * c + at(x, y - 1)) * scale;
            let dxy = (at(x + 1, y + 1) - at(x + 1, y - 1) - at(x - 1, y + 1) + at(x - 1, y - 1))
                / 4.0
                * scale;

            let mean = (dxx + dyy) / 2.0;
            let root = (((dxx - dyy) / 2.0).powi(2) + dxy * dxy).sqrt();
            let (a, b) = (mean + root, mean - root);
            out.push(if a.abs() <= b.abs() { (a, b) } else { (b, a) });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    /// 3 像素宽的水平亮线
    fn line_image(bright: bool) -> DynamicImage {
        let (fg, bg) = if bright { (230, 20) } else { (20, 230) };
        DynamicImage::ImageLuma8(GrayImage::from_fn(30, 30, |_, y| {
            Luma([if (14..17).contains(&y) { fg } else { bg }])
        }))
    }

    fn params(dark: bool) -> RidgeParams {
        RidgeParams {
            sigmas: vec![1.0, 2.0],
            dark_ridges: dark,
            ..Default::default()
        }
    }

    #[test]
    fn test_bright_line_is_detected() {
        let mut stages = StageReport::new();
        let mask = segment(&line_image(true), &params(false), &mut stages);

        assert!(mask.get(15, 15));
        assert!(!mask.get(15, 3));
        assert!(!mask.get(15, 27));
        assert_eq!(stages.applied_stages(), ["ridge filter"]);
    }

    #[test]
    fn test_dark_line_needs_dark_ridges() {
        let img = line_image(false);
        let band = imaging::band(&img, params(true).band);

        let bright = ridge_response(&band, &params(false));
        let dark = ridge_response(&band, &params(true));

        assert!(dark.get_pixel(15, 15).0[0] > 0.1);
        assert_eq!(bright.get_pixel(15, 15).0[0], 0.0);
    }

    #[test]
    fn test_flat_image_has_no_response() {
        let band: FloatImage = ImageBuffer::from_pixel(10, 10, Luma([0.5]));
        let fixed_c = RidgeParams {
            c: Some(0.5),
            ..params(false)
        };
        let response = ridge_response(&band, &fixed_c);
        assert!(response.as_raw().iter().all(|v| *v < 1e-6));
    }
}
