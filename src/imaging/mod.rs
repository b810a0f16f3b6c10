//! # 图像工具模块
//!
//! 为各算法适配器提供公共的图像读写、通道提取、滤波、二值形态学和网格工具。
//! 数值实现只求足够实用，不追求与任何特定图像库逐位一致。
//!
//! ## 依赖关系
//! - 被 `adapters/` 使用
//! - 使用 `image` crate 编解码
//! - 子模块: filters, mask, grid

pub mod filters;
pub mod grid;
pub mod mask;

pub use mask::Mask;

use crate::config::params::{Band, ColorSpace};
use crate::error::{BatchError, Result};

use image::{DynamicImage, ImageBuffer, Luma};
use std::path::Path;

/// 单通道浮点图像（取值 0..1）
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 读取图像
pub fn load(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(BatchError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(image::open(path)?)
}

/// 按扩展名编码并写出图像
pub fn save(img: &DynamicImage, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    // JPEG 不支持 alpha 通道和 16 位
    match ext.as_str() {
        "jpg" | "jpeg" => DynamicImage::ImageRgb8(img.to_rgb8()).save(path)?,
        _ => img.save(path)?,
    }
    Ok(())
}

/// 提取用于分析的单通道
pub fn band(img: &DynamicImage, band: Band) -> FloatImage {
    match band {
        Band::Gray => img.to_luma32f(),
        Band::Red => channel(img, 0),
        Band::Green => channel(img, 1),
        Band::Blue => channel(img, 2),
    }
}

/// 提取 RGB 中的第 `index` 个通道
pub fn channel(img: &DynamicImage, index: usize) -> FloatImage {
    let rgb = img.to_rgb32f();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        Luma([rgb.get_pixel(x, y).0[index.min(2)]])
    })
}

/// 颜色空间中的单个通道（取值 0..1）
///
/// `Rgb`/`Hsv` 需要彩色图像；`Gray` 只有通道 0。
pub fn color_band(img: &DynamicImage, space: ColorSpace, index: usize) -> Result<FloatImage> {
    match space {
        ColorSpace::Gray if index == 0 => Ok(img.to_luma32f()),
        ColorSpace::Gray => Err(BatchError::ImageShape(format!(
            "grayscale has a single band, got band {}",
            index
        ))),
        ColorSpace::Rgb => {
            require_color(img)?;
            Ok(channel(img, index))
        }
        ColorSpace::Hsv => {
            require_color(img)?;
            let rgb = img.to_rgb32f();
            Ok(ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
                Luma([rgb_to_hsv(rgb.get_pixel(x, y).0)[index.min(2)]])
            }))
        }
    }
}

/// RGB → HSV，色相以整圈为 1
fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    [hue, saturation, max]
}

/// 图像中心 25% 面积的区域
pub fn center_crop(img: &DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let (cw, ch) = ((w / 2).max(1), (h / 2).max(1));
    img.crop_imm((w - cw) / 2, (h - ch) / 2, cw, ch)
}

/// 检查图像至少有给定数量的颜色通道
pub fn require_color(img: &DynamicImage) -> Result<()> {
    if img.color().has_color() {
        Ok(())
    } else {
        Err(BatchError::ImageShape(format!(
            "expected a color image, got {:?}",
            img.color()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_band_extraction() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 51])));

        let red = band(&img, Band::Red);
        let green = band(&img, Band::Green);
        let blue = band(&img, Band::Blue);

        assert!((red.get_pixel(0, 0).0[0] - 1.0).abs() < 1e-6);
        assert!(green.get_pixel(3, 3).0[0].abs() < 1e-6);
        assert!((blue.get_pixel(1, 2).0[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_center_crop_is_quarter_area() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let crop = center_crop(&img);
        assert_eq!((crop.width(), crop.height()), (20, 10));
    }

    #[test]
    fn test_save_jpeg_drops_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.jpg");
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8));

        save(&img, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (8, 8));
    }

    #[test]
    fn test_hsv_band() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 128]),
        }));

        let hue = color_band(&img, ColorSpace::Hsv, 0).unwrap();
        let value = color_band(&img, ColorSpace::Hsv, 2).unwrap();

        assert!(hue.get_pixel(0, 0).0[0].abs() < 1e-6);
        assert!((hue.get_pixel(1, 0).0[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((hue.get_pixel(2, 0).0[0] - 2.0 / 3.0).abs() < 1e-6);
        assert!((value.get_pixel(2, 0).0[0] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_color_band_needs_color() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert!(color_band(&gray, ColorSpace::Hsv, 0).is_err());
        assert!(color_band(&gray, ColorSpace::Gray, 0).is_ok());
        assert!(color_band(&gray, ColorSpace::Gray, 1).is_err());
    }

    #[test]
    fn test_require_color() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert!(require_color(&gray).is_err());
    }
}
