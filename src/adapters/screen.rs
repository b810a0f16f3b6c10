//! # 质量筛选适配器
//!
//! 对原图执行可选的质量检查，不修改图像。任一检查未通过即记为失败子阶段，
//! 原图因此被写入失败目录。
//!
//! ## 检查
//! - 运动模糊：Prewitt 水平/竖直梯度方差之比须落在 `(1/ratio, ratio)` 内
//! - 色温：中心区域若干百分位色度到普朗克轨迹的平均距离须小于 `max_distance`
//! - 低对比度：σ=10 模糊后，百分位亮度差须不小于 `fraction_threshold`
//!
//! ## 依赖关系
//! - 被 `commands/screen.rs` 构造
//! - 使用 `imaging/filters.rs`

use super::preprocess::stage_row;
use super::{error_chain, Processor};
use crate::config::params::{LowContrastParams, MotionBlurParams, ScreenParams, TemperatureParams};
use crate::error::{BatchError, Result};
use crate::imaging::{self, filters};
use crate::models::row::STAGE_COLUMNS;
use crate::models::{AdapterOutput, StageReport, TableSchema, WorkItem};

use image::DynamicImage;

/// 低对比度检查前的模糊尺度
const LOW_CONTRAST_SIGMA: f32 = 10.0;

/// 普朗克轨迹采样的色温范围（K）
const LOCUS_MIN_K: f64 = 1667.0;
const LOCUS_MAX_K: f64 = 25000.0;
const LOCUS_STEP_K: f64 = 50.0;

/// 质量筛选适配器
#[derive(Debug, Clone)]
pub struct ScreenProcessor {
    params: ScreenParams,
}

impl ScreenProcessor {
    pub fn new(params: ScreenParams) -> Self {
        Self { params }
    }

    /// 执行所有已配置的检查
    pub fn screen(&self, img: &DynamicImage, stages: &mut StageReport) {
        match &self.params.motion_blur {
            Some(p) => record(stages, "motion blur", check_motion_blur(img, p)),
            None => stages.disabled("motion blur"),
        }
        match &self.params.temperature {
            Some(p) => record(stages, "temperature", check_temperature(img, p)),
            None => stages.disabled("temperature"),
        }
        match &self.params.low_contrast {
            Some(p) => record(stages, "low contrast", check_low_contrast(img, p)),
            None => stages.disabled("low contrast"),
        }
    }
}

impl Processor for ScreenProcessor {
    fn name(&self) -> &str {
        "quality screening"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::new(&STAGE_COLUMNS)
    }

    fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
        let img = imaging::load(&item.input_path)?;
        let mut stages = StageReport::new();

        self.screen(&img, &mut stages);

        Ok(AdapterOutput {
            rows: vec![stage_row(item, &stages)],
            artifact: Some(img),
            stages,
        })
    }
}

fn record(stages: &mut StageReport, stage: &str, result: Result<()>) {
    match result {
        Ok(()) => stages.applied(stage),
        Err(e) => stages.failed(stage, error_chain(&e)),
    }
}

fn rejected(stage: &str, reason: String) -> Result<()> {
    Err(BatchError::StageFailed {
        stage: stage.to_string(),
        reason,
    })
}

// ─────────────────────────────────────────────────────────────
// 运动模糊
// ─────────────────────────────────────────────────────────────

fn check_motion_blur(img: &DynamicImage, params: &MotionBlurParams) -> Result<()> {
    let region = if params.center {
        imaging::center_crop(img)
    } else {
        img.clone()
    };
    let band = if region.color().has_color() {
        imaging::channel(&region, params.band.unwrap_or(0))
    } else {
        region.to_luma32f()
    };

    let horizontal = filters::variance(&filters::prewitt_x(&band));
    let vertical = filters::variance(&filters::prewitt_y(&band));
    let ratio = horizontal / vertical;

    if ratio.is_finite() && ratio > 1.0 / params.ratio && ratio < params.ratio {
        Ok(())
    } else {
        rejected(
            "motion blur",
            format!("edge variance ratio {:.3} outside the allowed range", ratio),
        )
    }
}

// ─────────────────────────────────────────────────────────────
// 色温
// ─────────────────────────────────────────────────────────────

fn check_temperature(img: &DynamicImage, params: &TemperatureParams) -> Result<()> {
    imaging::require_color(img)?;
    let distance = temperature_distance(&imaging::center_crop(img), &params.percentiles)
        .ok_or_else(|| BatchError::ImageShape("image has no non-black pixels".to_string()))?;

    if distance < params.max_distance {
        Ok(())
    } else {
        rejected(
            "temperature",
            format!(
                "distance {:.4} from the Planckian locus exceeds {}",
                distance, params.max_distance
            ),
        )
    }
}

/// 百分位色度 (u, v) 到普朗克轨迹距离的平均值
pub fn temperature_distance(img: &DynamicImage, percentiles: &[f64]) -> Option<f64> {
    let (us, vs): (Vec<f32>, Vec<f32>) = img
        .to_rgb32f()
        .pixels()
        .filter_map(|p| chromaticity(p.0))
        .map(|(u, v)| (u as f32, v as f32))
        .unzip();
    if us.is_empty() || percentiles.is_empty() {
        return None;
    }

    let locus = planckian_locus();
    let total: f64 = percentiles
        .iter()
        .map(|p| {
            let u = filters::percentile(&us, *p) as f64;
            let v = filters::percentile(&vs, *p) as f64;
            locus
                .iter()
                .map(|(lu, lv)| ((u - lu).powi(2) + (v - lv).powi(2)).sqrt())
                .fold(f64::INFINITY, f64::min)
        })
        .sum();

    Some(total / percentiles.len() as f64)
}

/// sRGB → CIE 1960 UCS 色度；纯黑像素返回 `None`
fn chromaticity(rgb: [f32; 3]) -> Option<(f64, f64)> {
    let linear = |c: f32| {
        let c = c as f64;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let (r, g, b) = (linear(rgb[0]), linear(rgb[1]), linear(rgb[2]));

    let x = 0.4124 * r + 0.3576 * g + 0.1805 * b;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = 0.0193 * r + 0.1192 * g + 0.9505 * b;

    let denom = x + 15.0 * y + 3.0 * z;
    if denom <= f64::EPSILON {
        None
    } else {
        Some((4.0 * x / denom, 6.0 * y / denom))
    }
}

/// 普朗克轨迹在 CIE 1960 UCS 中的采样点（Kim et al. 三次样条近似）
fn planckian_locus() -> Vec<(f64, f64)> {
    let steps = ((LOCUS_MAX_K - LOCUS_MIN_K) / LOCUS_STEP_K) as usize;
    (0..=steps)
        .map(|i| {
            let (x, y) = locus_xy(LOCUS_MIN_K + i as f64 * LOCUS_STEP_K);
            let denom = -2.0 * x + 12.0 * y + 3.0;
            (4.0 * x / denom, 6.0 * y / denom)
        })
        .collect()
}

fn locus_xy(t: f64) -> (f64, f64) {
    let x = if t <= 4000.0 {
        -0.266_123_9e9 / t.powi(3) - 0.234_358_9e6 / t.powi(2) + 0.877_695_6e3 / t + 0.179_910
    } else {
        -3.025_846_9e9 / t.powi(3) + 2.107_037_9e6 / t.powi(2) + 0.222_634_7e3 / t + 0.240_390
    };
    let y = if t <= 2222.0 {
        -1.106_381_4 * x.powi(3) - 1.348_110_20 * x.powi(2) + 2.185_558_32 * x - 0.202_196_83
    } else if t <= 4000.0 {
        -0.954_947_6 * x.powi(3) - 1.374_185_93 * x.powi(2) + 2.091_370_15 * x - 0.167_488_67
    } else {
        3.081_758_0 * x.powi(3) - 5.873_386_70 * x.powi(2) + 3.751_129_97 * x - 0.370_014_83
    };
    (x, y)
}

// ─────────────────────────────────────────────────────────────
// 低对比度
// ─────────────────────────────────────────────────────────────

fn check_low_contrast(img: &DynamicImage, params: &LowContrastParams) -> Result<()> {
    let gray = filters::gaussian(&img.to_luma32f(), LOW_CONTRAST_SIGMA);
    let lo = filters::percentile(gray.as_raw(), params.lower_percentile);
    let hi = filters::percentile(gray.as_raw(), params.upper_percentile);
    let spread = (hi - lo) as f64;

    if spread >= params.fraction_threshold {
        Ok(())
    } else {
        rejected(
            "low contrast",
            format!(
                "brightness spread {:.4} below {}",
                spread, params.fraction_threshold
            ),
        )
    }
}
