//! # 算法参数文件
//!
//! 从 YAML 文件读取各算法族的参数。每个可选小节缺省即表示对应子阶段“未配置”，
//! 运行时静默跳过；出现未知字段或取值非法时在运行前报错。
//!
//! ```yaml
//! threshold:
//!   band: green
//!   dark_objects: false
//! post:
//!   noise_removal: { radius: 1 }
//!   color_filters:
//!     - { colorspace: hsv, band: 0, low: 0.9, high: 0.1, percent: 50, invert: true }
//!   dirt_removal: { method: gaussian, param: 5 }
//!   size_filter: { min_area: 20 }
//! diameter_bins: [0.0, 5.0, 10.0]
//! preprocessing:
//!   brightfield: { file_name: blank.jpg, sigma: 20.0 }
//!   registration: { template_band: 1, max_shift: 8 }
//! screening:
//!   motion_blur: { ratio: 2.0 }
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 加载
//! - 被 `adapters/` 使用
//! - 使用 `serde_yaml` 解析

use crate::error::{BatchError, Result};

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// 用于分析的颜色通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    #[default]
    Gray,
    Red,
    Green,
    Blue,
}

/// 全部算法参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmParams {
    pub threshold: Option<ThresholdParams>,
    pub ridge: Option<RidgeParams>,
    #[serde(default)]
    pub post: PostProcessParams,
    /// 直径分级边界（升序）
    pub diameter_bins: Option<Vec<f64>>,
    #[serde(default)]
    pub preprocessing: PreprocessParams,
    #[serde(default)]
    pub screening: ScreenParams,
}

// ─────────────────────────────────────────────────────────────
// 分割参数
// ─────────────────────────────────────────────────────────────

/// 全局阈值分割参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdParams {
    #[serde(default)]
    pub band: Band,
    /// 固定阈值（0..1），缺省使用 Otsu
    pub level: Option<f32>,
    /// 目标比背景暗
    #[serde(default)]
    pub dark_objects: bool,
    /// 阈值前的高斯平滑
    pub smoothing_sigma: Option<f32>,
}

/// 脊线（Hessian）分割参数
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RidgeParams {
    #[serde(default)]
    pub band: Band,
    #[serde(default = "default_sigmas")]
    pub sigmas: Vec<f32>,
    #[serde(default = "default_beta")]
    pub beta: f32,
    /// 结构项归一化常数，缺省取最大 Hessian 范数的一半
    pub c: Option<f32>,
    #[serde(default)]
    pub dark_ridges: bool,
    /// 响应的固定阈值（0..1），缺省使用 Otsu
    pub level: Option<f32>,
}

impl Default for RidgeParams {
    fn default() -> Self {
        RidgeParams {
            band: Band::Gray,
            sigmas: default_sigmas(),
            beta: default_beta(),
            c: None,
            dark_ridges: false,
            level: None,
        }
    }
}

fn default_sigmas() -> Vec<f32> {
    vec![1.0, 2.0, 3.0]
}

fn default_beta() -> f32 {
    0.5
}

/// 分割后处理（各阶段可选）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostProcessParams {
    pub noise_removal: Option<RadiusParams>,
    pub fill_gaps: Option<RadiusParams>,
    /// 按目标内像素的颜色筛选，依次执行
    #[serde(default)]
    pub color_filters: Vec<ColorFilterParams>,
    pub dirt_removal: Option<DirtRemovalParams>,
    pub size_filter: Option<SizeFilterParams>,
    pub shape_filter: Option<ShapeFilterParams>,
}

/// 颜色筛选使用的颜色空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Rgb,
    Hsv,
    Gray,
}

/// 颜色筛选：目标中至少 `percent`% 的像素落在 `[low, high]` 内才保留
///
/// `high < low` 表示跨越 1.0 回绕的区间（例如色相中的红色）。
/// `invert` 为 true 时反过来去除满足条件的目标。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorFilterParams {
    #[serde(default)]
    pub colorspace: ColorSpace,
    #[serde(default)]
    pub band: usize,
    pub low: f32,
    pub high: f32,
    pub percent: f64,
    #[serde(default)]
    pub invert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirtMethod {
    /// 面积大于 中位数 + param·标准差 的目标才保留
    #[default]
    Gaussian,
    /// 面积大于 param 像素的目标才保留
    Threshold,
}

/// 按面积统计去除杂质
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirtRemovalParams {
    #[serde(default)]
    pub method: DirtMethod,
    #[serde(default = "default_dirt_param")]
    pub param: f64,
}

fn default_dirt_param() -> f64 {
    5.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadiusParams {
    pub radius: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeFilterParams {
    pub min_area: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeFilterParams {
    pub min_length_width_ratio: f64,
}

// ─────────────────────────────────────────────────────────────
// 预处理参数
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessParams {
    pub brightfield: Option<BrightfieldParams>,
    pub smoothing: Option<SmoothingParams>,
    pub registration: Option<RegistrationParams>,
}

/// 明场校正：每个输入目录中的空白参考图像
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrightfieldParams {
    pub file_name: String,
    pub sigma: f32,
    /// 固定校正系数，缺省自动选择
    pub correction_factor: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingParams {
    pub sigma: f32,
}

/// 通道配准
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationParams {
    #[serde(default = "default_template_band")]
    pub template_band: usize,
    #[serde(default = "default_max_shift")]
    pub max_shift: u32,
}

fn default_template_band() -> usize {
    1
}

fn default_max_shift() -> u32 {
    10
}

// ─────────────────────────────────────────────────────────────
// 质量筛选参数
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenParams {
    pub motion_blur: Option<MotionBlurParams>,
    pub temperature: Option<TemperatureParams>,
    pub low_contrast: Option<LowContrastParams>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionBlurParams {
    #[serde(default = "default_blur_ratio")]
    pub ratio: f64,
    pub band: Option<usize>,
    /// 只分析图像中心 25%
    #[serde(default = "default_true")]
    pub center: bool,
}

fn default_blur_ratio() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperatureParams {
    pub percentiles: Vec<f64>,
    pub max_distance: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LowContrastParams {
    #[serde(default = "default_fraction_threshold")]
    pub fraction_threshold: f64,
    #[serde(default = "default_lower_percentile")]
    pub lower_percentile: f64,
    #[serde(default = "default_upper_percentile")]
    pub upper_percentile: f64,
}

fn default_fraction_threshold() -> f64 {
    0.05
}

fn default_lower_percentile() -> f64 {
    1.0
}

fn default_upper_percentile() -> f64 {
    99.0
}

// ─────────────────────────────────────────────────────────────
// 加载与校验
// ─────────────────────────────────────────────────────────────

impl AlgorithmParams {
    /// 从 YAML 文件加载并校验
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BatchError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| BatchError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let params = Self::from_yaml(&content).map_err(|e| BatchError::ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), "algorithm parameters loaded");
        Ok(params)
    }

    /// 从 YAML 文本解析并校验
    pub fn from_yaml(content: &str) -> Result<Self> {
        // 空文件等价于全部未配置
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let params: AlgorithmParams = serde_yaml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = &self.threshold {
            check_level(t.level, "threshold.level")?;
            check_positive_opt(t.smoothing_sigma, "threshold.smoothing_sigma")?;
        }

        if let Some(r) = &self.ridge {
            if r.sigmas.is_empty() || r.sigmas.iter().any(|s| *s <= 0.0) {
                return invalid("ridge.sigmas must be a non-empty list of positive values");
            }
            check_positive(r.beta, "ridge.beta")?;
            check_positive_opt(r.c, "ridge.c")?;
            check_level(r.level, "ridge.level")?;
        }

        for (name, radius) in [
            ("post.noise_removal.radius", &self.post.noise_removal),
            ("post.fill_gaps.radius", &self.post.fill_gaps),
        ] {
            if let Some(RadiusParams { radius: 0 }) = radius {
                return invalid(&format!("{} must be at least 1", name));
            }
        }

        for (i, cf) in self.post.color_filters.iter().enumerate() {
            let max_band = if cf.colorspace == ColorSpace::Gray { 0 } else { 2 };
            if cf.band > max_band {
                return invalid(&format!(
                    "post.color_filters[{}].band must be at most {} for {:?}",
                    i, max_band, cf.colorspace
                ));
            }
            if !(0.0..=1.0).contains(&cf.low) || !(0.0..=1.0).contains(&cf.high) {
                return invalid(&format!("post.color_filters[{}] low and high must lie in 0..=1", i));
            }
            if !(0.0..=100.0).contains(&cf.percent) {
                return invalid(&format!("post.color_filters[{}].percent must lie in 0..=100", i));
            }
        }

        if let Some(dirt) = &self.post.dirt_removal {
            if dirt.param.is_nan() || dirt.param < 0.0 {
                return invalid("post.dirt_removal.param must not be negative");
            }
        }

        if let Some(shape) = &self.post.shape_filter {
            if shape.min_length_width_ratio <= 0.0 {
                return invalid("post.shape_filter.min_length_width_ratio must be positive");
            }
        }

        if let Some(bins) = &self.diameter_bins {
            if bins.is_empty() {
                return invalid("diameter_bins must not be empty");
            }
            if bins.iter().any(|b| *b < 0.0) || bins.windows(2).any(|w| w[0] >= w[1]) {
                return invalid("diameter_bins must be non-negative and strictly ascending");
            }
        }

        if let Some(bf) = &self.preprocessing.brightfield {
            if bf.file_name.trim().is_empty() {
                return invalid("preprocessing.brightfield.file_name must not be empty");
            }
            check_positive(bf.sigma, "preprocessing.brightfield.sigma")?;
            check_positive_opt(bf.correction_factor, "preprocessing.brightfield.correction_factor")?;
        }
        if let Some(s) = &self.preprocessing.smoothing {
            check_positive(s.sigma, "preprocessing.smoothing.sigma")?;
        }
        if let Some(reg) = &self.preprocessing.registration {
            if reg.template_band > 2 {
                return invalid("preprocessing.registration.template_band must be 0, 1 or 2");
            }
        }

        if let Some(mb) = &self.screening.motion_blur {
            if mb.ratio <= 1.0 {
                return invalid("screening.motion_blur.ratio must be greater than 1");
            }
            if mb.band.is_some_and(|b| b > 2) {
                return invalid("screening.motion_blur.band must be 0, 1 or 2");
            }
        }
        if let Some(t) = &self.screening.temperature {
            if t.percentiles.is_empty() || t.percentiles.iter().any(|p| !(0.0..=100.0).contains(p)) {
                return invalid("screening.temperature.percentiles must lie in 0..=100");
            }
            if t.max_distance <= 0.0 {
                return invalid("screening.temperature.max_distance must be positive");
            }
        }
        if let Some(lc) = &self.screening.low_contrast {
            if !(0.0..1.0).contains(&lc.fraction_threshold) {
                return invalid("screening.low_contrast.fraction_threshold must lie in 0..1");
            }
            if !(0.0..=100.0).contains(&lc.lower_percentile)
                || !(0.0..=100.0).contains(&lc.upper_percentile)
                || lc.lower_percentile >= lc.upper_percentile
            {
                return invalid("screening.low_contrast percentiles must satisfy 0 <= lower < upper <= 100");
            }
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(BatchError::InvalidParameter(msg.to_string()))
}

fn check_positive(value: f32, name: &str) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        invalid(&format!("{} must be positive", name))
    }
}

fn check_positive_opt(value: Option<f32>, name: &str) -> Result<()> {
    value.map_or(Ok(()), |v| check_positive(v, name))
}

fn check_level(level: Option<f32>, name: &str) -> Result<()> {
    match level {
        Some(l) if !(l > 0.0 && l < 1.0) => invalid(&format!("{} must lie in (0, 1)", name)),
        _ => Ok(()),
    }
}
