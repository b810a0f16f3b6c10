//! # 图像滤波与统计
//!
//! 高斯平滑、Prewitt 边缘、Otsu 阈值、百分位数等基础运算。
//!
//! ## 依赖关系
//! - 被 `adapters/` 使用
//! - 高斯平滑使用 `image::imageops::blur`

use super::FloatImage;

use image::imageops;

/// 高斯平滑
pub fn gaussian(img: &FloatImage, sigma: f32) -> FloatImage {
    imageops::blur(img, sigma)
}

/// 像素值线性拉伸到 0..1
pub fn normalize(img: &FloatImage) -> FloatImage {
    let (min, max) = min_max(img.as_raw());
    let range = max - min;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = if range > f32::EPSILON {
            (p.0[0] - min) / range
        } else {
            0.0
        };
    }
    out
}

fn min_max(values: &[f32]) -> (f32, f32) {
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// 水平方向 Prewitt 梯度（响应竖直边缘）
pub fn prewitt_x(img: &FloatImage) -> Vec<f32> {
    prewitt(img, true)
}

/// 竖直方向 Prewitt 梯度（响应水平边缘）
pub fn prewitt_y(img: &FloatImage) -> Vec<f32> {
    prewitt(img, false)
}

fn prewitt(img: &FloatImage, horizontal: bool) -> Vec<f32> {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let at = |x: u32, y: u32| img.get_pixel(x, y).0[0];
    let mut out = Vec::with_capacity(((w - 2) * (h - 2)) as usize);

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let g = if horizontal {
                (at(x + 1, y - 1) + at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + at(x - 1, y) + at(x - 1, y + 1))
            } else {
                (at(x - 1, y + 1) + at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + at(x, y - 1) + at(x + 1, y - 1))
            };
            out.push(g / 3.0);
        }
    }
    out
}

/// 方差
pub fn variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// 百分位数（线性插值，`p` 取 0..=100）
pub fn percentile(values: &[f32], p: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Otsu 阈值（返回与输入同一量纲的阈值）
pub fn otsu_level(img: &FloatImage) -> f32 {
    const BINS: usize = 256;

    let values = img.as_raw();
    let (min, max) = min_max(values);
    if values.is_empty() || max - min <= f32::EPSILON {
        return min;
    }

    let scale = (BINS - 1) as f32 / (max - min);
    let mut hist = [0u64; BINS];
    for v in values {
        hist[((v - min) * scale).round() as usize] += 1;
    }

    let total = values.len() as f64;
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, c)| i as f64 * *c as f64)
        .sum();

    let mut best_bin = 0;
    let mut best_var = -1.0;
    let mut weight_bg = 0.0;
    let mut sum_bg = 0.0;

    for (i, count) in hist.iter().enumerate() {
        weight_bg += *count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += i as f64 * *count as f64;

        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);

        if between > best_var {
            best_var = between;
            best_bin = i;
        }
    }

    // 阈值取在所选箱的上边缘，使 `> level` 恰好选中前景
    min + (best_bin as f32 + 0.5) / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn striped(w: u32, h: u32, vertical: bool) -> FloatImage {
        ImageBuffer::from_fn(w, h, |x, y| {
            let k = if vertical { x } else { y };
            Luma([if k % 4 < 2 { 0.0 } else { 1.0 }])
        })
    }

    #[test]
    fn test_otsu_splits_bimodal_image() {
        let img: FloatImage =
            ImageBuffer::from_fn(10, 10, |x, _| Luma([if x < 5 { 0.2 } else { 0.8 }]));
        let level = otsu_level(&img);
        assert!(level > 0.2 && level < 0.8, "level = {}", level);
    }

    #[test]
    fn test_otsu_flat_image() {
        let img: FloatImage = ImageBuffer::from_pixel(5, 5, Luma([0.5]));
        assert_eq!(otsu_level(&img), 0.5);
    }

    #[test]
    fn test_prewitt_directionality() {
        let vertical_edges = striped(16, 16, true);
        let gx = variance(&prewitt_x(&vertical_edges));
        let gy = variance(&prewitt_y(&vertical_edges));
        assert!(gx > 0.1);
        assert!(gy < 1e-9);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert!((percentile(&values, 25.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_range() {
        let img: FloatImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([2.0 + x as f32]));
        let n = normalize(&img);
        assert_eq!(n.get_pixel(0, 0).0[0], 0.0);
        assert_eq!(n.get_pixel(2, 0).0[0], 1.0);
    }
}
