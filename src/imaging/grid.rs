//! # 网格工具
//!
//! - 在图像上绘制方形网格（fishnet）
//! - 统计二值目标与网格线的交叉次数（Tennant 线交法）
//!
//! 网格线位于 `size` 的整数倍处（不含 0），与绘制位置一致。
//!
//! ## 依赖关系
//! - 被 `adapters/fishnet.rs`、`adapters/tennant.rs` 使用

use super::Mask;

use image::{DynamicImage, Rgb, RgbImage};

/// Tennant (1975) 长度系数：长度 = 11/14 × 网格尺寸 × 交叉数
pub const TENNANT_FACTOR: f64 = 11.0 / 14.0;

/// 网格线坐标
fn grid_lines(extent: u32, size: u32) -> impl Iterator<Item = u32> {
    (1..)
        .map(move |k| k * size)
        .take_while(move |pos| size > 0 && *pos < extent)
}

/// 绘制方形网格
pub fn draw_fishnet(img: &DynamicImage, size: u32, color: [u8; 3], weight: u32) -> RgbImage {
    let mut out = img.to_rgb8();
    let (w, h) = out.dimensions();
    let weight = weight.max(1);

    for x0 in grid_lines(w, size) {
        for x in x0..(x0 + weight).min(w) {
            for y in 0..h {
                out.put_pixel(x, y, Rgb(color));
            }
        }
    }
    for y0 in grid_lines(h, size) {
        for y in y0..(y0 + weight).min(h) {
            for x in 0..w {
                out.put_pixel(x, y, Rgb(color));
            }
        }
    }

    out
}

/// 统计前景沿所有网格线的连续段数
pub fn count_crossings(mask: &Mask, size: u32) -> usize {
    let (w, h) = (mask.width(), mask.height());
    let mut crossings = 0;

    for y in grid_lines(h, size) {
        crossings += count_runs((0..w).map(|x| mask.get(x, y)));
    }
    for x in grid_lines(w, size) {
        crossings += count_runs((0..h).map(|y| mask.get(x, y)));
    }

    crossings
}

fn count_runs(line: impl Iterator<Item = bool>) -> usize {
    let mut runs = 0;
    let mut inside = false;
    for v in line {
        if v && !inside {
            runs += 1;
        }
        inside = v;
    }
    runs
}

/// 由交叉数估算长度（像素）
pub fn tennant_length(crossings: usize, grid_size: u32) -> f64 {
    TENNANT_FACTOR * grid_size as f64 * crossings as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_lines_positions() {
        let lines: Vec<u32> = grid_lines(25, 10).collect();
        assert_eq!(lines, vec![10, 20]);
    }

    #[test]
    fn test_draw_fishnet_colors_lines_only() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 30));
        let out = draw_fishnet(&img, 10, [200, 0, 0], 2);

        assert_eq!(out.get_pixel(10, 5).0, [200, 0, 0]);
        assert_eq!(out.get_pixel(11, 5).0, [200, 0, 0]);
        assert_eq!(out.get_pixel(5, 20).0, [200, 0, 0]);
        assert_eq!(out.get_pixel(5, 5).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(12, 5).0, [0, 0, 0]);
    }

    #[test]
    fn test_count_crossings_diagonal_line() {
        // 对角线穿过 2 条水平线和 2 条竖直线
        let mut mask = Mask::new(30, 30);
        for i in 0..30 {
            mask.set(i, i, true);
        }
        assert_eq!(count_crossings(&mask, 10), 4);
    }

    #[test]
    fn test_count_runs() {
        let line = [false, true, true, false, true, false, false, true];
        assert_eq!(count_runs(line.into_iter()), 3);
    }

    #[test]
    fn test_tennant_length() {
        assert!((tennant_length(14, 10) - 110.0).abs() < 1e-9);
    }
}
