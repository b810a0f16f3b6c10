//! # 预处理校正适配器
//!
//! 依次执行三个可选阶段，任一阶段失败时跳过该阶段继续，产物进入失败目录。
//!
//! ## 阶段
//! - 明场校正：每个输入目录中的空白参考图像经高斯模糊后作为分母，
//!   校正系数固定或自动选择（使 0.1%–5% 的像素过曝）
//! - 平滑：高斯模糊
//! - 波段配准：在 `max_shift` 范围内搜索使相关性最大的整数平移，
//!   把非模板波段对齐到模板波段
//!
//! ## 依赖关系
//! - 被 `commands/preprocess.rs` 构造
//! - 使用 `imaging/` 的图像工具

use super::{error_chain, timestamp, Processor};
use crate::config::params::{BrightfieldParams, PreprocessParams, RegistrationParams};
use crate::error::{BatchError, Result};
use crate::imaging;
use crate::models::row::STAGE_COLUMNS;
use crate::models::{AdapterOutput, ResultRow, StageReport, TableSchema, WorkItem};

use image::{imageops, DynamicImage, GenericImageView, Rgb32FImage};
use std::path::Path;

/// 自动校正系数的搜索范围与步长
const AUTO_FACTOR_MIN: f32 = 0.7;
const AUTO_FACTOR_MAX: f32 = 1.3;
const AUTO_FACTOR_STEP: f32 = 0.02;
/// 目标过曝像素比例
const SATURATION_LOW: f64 = 0.001;
const SATURATION_HIGH: f64 = 0.05;

/// 配准相关性计算窗口的最大边长
const REGISTRATION_WINDOW: u32 = 256;

/// 预处理适配器
#[derive(Debug, Clone)]
pub struct PreprocessProcessor {
    params: PreprocessParams,
}

impl PreprocessProcessor {
    pub fn new(params: PreprocessParams) -> Self {
        Self { params }
    }

    /// 对已加载的图像执行所有阶段
    pub fn apply(
        &self,
        img: &DynamicImage,
        input_dir: &Path,
        stages: &mut StageReport,
    ) -> Rgb32FImage {
        let mut out = img.to_rgb32f();

        match &self.params.brightfield {
            Some(bf) => match correct_brightfield(&out, input_dir, bf) {
                Ok(corrected) => {
                    out = corrected;
                    stages.applied("brightfield");
                }
                Err(e) => stages.failed("brightfield", error_chain(&e)),
            },
            None => stages.disabled("brightfield"),
        }

        match &self.params.smoothing {
            Some(s) => {
                out = imageops::blur(&out, s.sigma);
                stages.applied("smoothing");
            }
            None => stages.disabled("smoothing"),
        }

        match &self.params.registration {
            Some(reg) => match register_bands(&out, reg) {
                Ok(registered) => {
                    out = registered;
                    stages.applied("registration");
                }
                Err(e) => stages.failed("registration", error_chain(&e)),
            },
            None => stages.disabled("registration"),
        }

        out
    }
}

impl Processor for PreprocessProcessor {
    fn name(&self) -> &str {
        "preprocessing"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::new(&STAGE_COLUMNS)
    }

    fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
        let img = imaging::load(&item.input_path)?;
        let mut stages = StageReport::new();

        let out = self.apply(&img, item.input_dir(), &mut stages);
        let artifact = DynamicImage::ImageRgb8(DynamicImage::ImageRgb32F(out).to_rgb8());

        Ok(AdapterOutput {
            artifact: Some(artifact),
            rows: vec![stage_row(item, &stages)],
            stages,
        })
    }

    fn excluded_names(&self) -> Vec<String> {
        self.params
            .brightfield
            .iter()
            .map(|bf| bf.file_name.clone())
            .collect()
    }
}

/// 阶段记录对应的结果行
pub fn stage_row(item: &WorkItem, stages: &StageReport) -> ResultRow {
    let failed: Vec<&str> = stages
        .failed_stages()
        .iter()
        .map(|(stage, _)| stage.as_str())
        .collect();

    ResultRow::new()
        .with("Timestamp", timestamp())
        .with("ImageName", item.display_name.as_str())
        .with("Applied", stages.applied_stages().join(";"))
        .with("Disabled", stages.disabled_stages().join(";"))
        .with("Failed", failed.join(";"))
}

// ─────────────────────────────────────────────────────────────
// 明场校正
// ─────────────────────────────────────────────────────────────

fn correct_brightfield(
    img: &Rgb32FImage,
    input_dir: &Path,
    params: &BrightfieldParams,
) -> Result<Rgb32FImage> {
    let blank = imaging::load(&input_dir.join(&params.file_name))?;
    if blank.dimensions() != img.dimensions() {
        return Err(BatchError::ImageShape(format!(
            "brightfield image is {}x{}, input is {}x{}",
            blank.width(),
            blank.height(),
            img.width(),
            img.height()
        )));
    }
    let blank = imageops::blur(&blank.to_rgb32f(), params.sigma);

    let factor = params
        .correction_factor
        .unwrap_or_else(|| auto_correction_factor(img, &blank));
    Ok(divide(img, &blank, factor))
}

/// 按 `img / (blank · factor)` 校正并截断到 1
fn divide(img: &Rgb32FImage, blank: &Rgb32FImage, factor: f32) -> Rgb32FImage {
    let mut out = img.clone();
    for (o, b) in out.pixels_mut().zip(blank.pixels()) {
        for c in 0..3 {
            let denom = b.0[c] * factor;
            o.0[c] = if denom > f32::EPSILON {
                (o.0[c] / denom).min(1.0)
            } else {
                1.0
            };
        }
    }
    out
}

/// 过曝（> 1）的通道值比例
fn saturated_fraction(img: &Rgb32FImage, blank: &Rgb32FImage, factor: f32) -> f64 {
    let total = img.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let over = img
        .as_raw()
        .iter()
        .zip(blank.as_raw())
        .filter(|(v, b)| **v > **b * factor)
        .count();
    over as f64 / total as f64
}

/// 自动选择校正系数
pub fn auto_correction_factor(img: &Rgb32FImage, blank: &Rgb32FImage) -> f32 {
    let mut factor = 1.0f32;

    while saturated_fraction(img, blank, factor) > SATURATION_HIGH && factor < AUTO_FACTOR_MAX {
        factor += AUTO_FACTOR_STEP;
    }
    while saturated_fraction(img, blank, factor) < SATURATION_LOW && factor > AUTO_FACTOR_MIN {
        factor -= AUTO_FACTOR_STEP;
    }

    factor
}

// ─────────────────────────────────────────────────────────────
// 波段配准
// ─────────────────────────────────────────────────────────────

fn register_bands(img: &Rgb32FImage, params: &RegistrationParams) -> Result<Rgb32FImage> {
    let (w, h) = img.dimensions();
    let margin = params.max_shift;
    if w <= 2 * margin + 2 || h <= 2 * margin + 2 {
        return Err(BatchError::ImageShape(format!(
            "image {}x{} is too small for max_shift {}",
            w, h, margin
        )));
    }

    let template = params.template_band;
    let mut out = img.clone();

    for band in (0..3).filter(|b| *b != template) {
        let (dx, dy) = best_shift(img, template, band, margin);
        for y in 0..h {
            for x in 0..w {
                let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                out.get_pixel_mut(x, y).0[band] = img.get_pixel(sx, sy).0[band];
            }
        }
    }

    Ok(out)
}

/// 在中心窗口内搜索使 `Σ T(x,y)·B(x+dx,y+dy)` 最大的平移
fn best_shift(img: &Rgb32FImage, template: usize, band: usize, max_shift: u32) -> (i64, i64) {
    let (w, h) = img.dimensions();
    let m = max_shift as i64;

    // 窗口四周留出 max_shift 的余量
    let win_w = (w - 2 * max_shift).min(REGISTRATION_WINDOW) as i64;
    let win_h = (h - 2 * max_shift).min(REGISTRATION_WINDOW) as i64;
    let x0 = (w as i64 - win_w) / 2;
    let y0 = (h as i64 - win_h) / 2;

    let value = |x: i64, y: i64, c: usize| img.get_pixel(x as u32, y as u32).0[c];
    let mean = |c: usize, dx: i64, dy: i64| {
        let mut sum = 0.0f64;
        for y in y0..y0 + win_h {
            for x in x0..x0 + win_w {
                sum += value(x + dx, y + dy, c) as f64;
            }
        }
        sum / (win_w * win_h) as f64
    };

    let t_mean = mean(template, 0, 0);
    let mut best = (0, 0);
    let mut best_score = f64::NEG_INFINITY;

    for dy in -m..=m {
        for dx in -m..=m {
            let b_mean = mean(band, dx, dy);
            let mut cov = 0.0f64;
            let mut var = 0.0f64;
            for y in y0..y0 + win_h {
                for x in x0..x0 + win_w {
                    let t = value(x, y, template) as f64 - t_mean;
                    let b = value(x + dx, y + dy, band) as f64 - b_mean;
                    cov += t * b;
                    var += b * b;
                }
            }
            let score = if var > 0.0 { cov / var.sqrt() } else { 0.0 };
            if score > best_score {
                best_score = score;
                best = (dx, dy);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::SmoothingParams;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn pattern(x: i64, y: i64) -> u8 {
        ((x * x * 31 + y * 17 + x * y * 7 + y * y * 3).rem_euclid(251)) as u8
    }

    fn item(dir: &Path, name: &str) -> WorkItem {
        WorkItem::new(
            dir.join(name),
            PathBuf::new(),
            &dir.join("out"),
            &dir.join("fail"),
            ".png",
        )
    }

    #[test]
    fn test_nothing_configured_is_clean() {
        let dir = TempDir::new().unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        img.save(dir.path().join("a.png")).unwrap();

        let processor = PreprocessProcessor::new(PreprocessParams::default());
        let output = processor.process(&item(dir.path(), "a.png")).unwrap();

        assert!(output.stages.is_clean());
        assert_eq!(output.stages.disabled_stages().len(), 3);
        let artifact = output.artifact.unwrap().to_rgb8();
        assert_eq!(artifact.get_pixel(3, 3).0, [10, 20, 30]);
        assert!(processor.excluded_names().is_empty());
    }

    #[test]
    fn test_missing_brightfield_is_a_failed_stage() {
        let dir = TempDir::new().unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        img.save(dir.path().join("a.png")).unwrap();

        let processor = PreprocessProcessor::new(PreprocessParams {
            brightfield: Some(BrightfieldParams {
                file_name: "blank.png".into(),
                sigma: 2.0,
                correction_factor: None,
            }),
            smoothing: Some(SmoothingParams { sigma: 1.0 }),
            ..Default::default()
        });
        let output = processor.process(&item(dir.path(), "a.png")).unwrap();

        assert_eq!(output.stages.failed_stages().len(), 1);
        assert_eq!(output.stages.failed_stages()[0].0, "brightfield");
        assert_eq!(output.stages.applied_stages(), ["smoothing"]);
        assert_eq!(processor.excluded_names(), vec!["blank.png".to_string()]);

        let row = &output.rows[0];
        assert!(TableSchema::new(&STAGE_COLUMNS).accepts(row));
        assert_eq!(row.to_record()[4], "brightfield");
    }

    #[test]
    fn test_brightfield_flattens_vignetting() {
        let dir = TempDir::new().unwrap();
        // 左暗右亮的照明；目标与空白图像的照明相同
        let light = |x: u32| 100 + x as u8 * 5;
        let blank = RgbImage::from_fn(20, 20, |x, _| {
            let v = light(x);
            Rgb([v, v, v])
        });
        let scene = RgbImage::from_fn(20, 20, |x, _| {
            let v = light(x) / 2;
            Rgb([v, v, v])
        });
        blank.save(dir.path().join("blank.png")).unwrap();
        scene.save(dir.path().join("scene.png")).unwrap();

        let processor = PreprocessProcessor::new(PreprocessParams {
            brightfield: Some(BrightfieldParams {
                file_name: "blank.png".into(),
                sigma: 0.5,
                correction_factor: Some(1.0),
            }),
            ..Default::default()
        });
        let output = processor.process(&item(dir.path(), "scene.png")).unwrap();
        let out = output.artifact.unwrap().to_rgb8();

        assert!(output.stages.is_clean());
        let left = out.get_pixel(2, 10).0[0] as i32;
        let right = out.get_pixel(17, 10).0[0] as i32;
        assert!((left - right).abs() <= 6, "left {left}, right {right}");
    }

    #[test]
    fn test_auto_factor_limits_saturation() {
        // 取值均匀分布在 0.2..0.6，空白图像恒为 0.5
        let img = Rgb32FImage::from_fn(100, 100, |x, y| {
            Rgb([0.2 + 0.4 * (y * 100 + x) as f32 / 10_000.0; 3])
        });
        let blank = Rgb32FImage::from_pixel(100, 100, Rgb([0.5; 3]));

        let factor = auto_correction_factor(&img, &blank);
        let fraction = saturated_fraction(&img, &blank, factor);

        assert!(factor > 1.0 && factor <= AUTO_FACTOR_MAX + AUTO_FACTOR_STEP);
        assert!(
            (SATURATION_LOW..=SATURATION_HIGH).contains(&fraction),
            "factor {factor}, fraction {fraction}"
        );
    }

    #[test]
    fn test_registration_recovers_shift() {
        let img = Rgb32FImage::from_fn(60, 60, |x, y| {
            let (x, y) = (x as i64, y as i64);
            let p = |x, y| pattern(x, y) as f32 / 255.0;
            // 红色波段整体右移 2、下移 1
            Rgb([p(x - 2, y - 1), p(x, y), p(x, y)])
        });
        let params = RegistrationParams {
            template_band: 1,
            max_shift: 4,
        };

        assert_eq!(best_shift(&img, 1, 0, 4), (2, 1));
        assert_eq!(best_shift(&img, 1, 2, 4), (0, 0));

        let out = register_bands(&img, &params).unwrap();
        for y in 5..50 {
            for x in 5..50 {
                assert_eq!(out.get_pixel(x, y).0[0], out.get_pixel(x, y).0[1]);
            }
        }
    }

    #[test]
    fn test_registration_rejects_tiny_images() {
        let img = Rgb32FImage::new(10, 10);
        let params = RegistrationParams {
            template_band: 1,
            max_shift: 10,
        };
        assert!(register_bands(&img, &params).is_err());
    }
}
