//! # 全局阈值分割
//!
//! 选择通道 → 可选高斯平滑 → 固定阈值或 Otsu 阈值。
//!
//! ## 依赖关系
//! - 被 `adapters/segment.rs` 调用

use crate::config::params::ThresholdParams;
use crate::imaging::{self, filters, Mask};
use crate::models::StageReport;

use image::DynamicImage;

/// 阈值分割，得到前景掩膜
pub fn segment(img: &DynamicImage, params: &ThresholdParams, stages: &mut StageReport) -> Mask {
    let mut band = imaging::band(img, params.band);

    match params.smoothing_sigma {
        Some(sigma) => {
            band = filters::gaussian(&band, sigma);
            stages.applied("smoothing");
        }
        None => stages.disabled("smoothing"),
    }

    let level = params
        .level
        .unwrap_or_else(|| filters::otsu_level(&band));
    Mask::from_threshold(&band, level, params.dark_objects)
}
