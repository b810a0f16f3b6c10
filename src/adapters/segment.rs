//! # 分割适配器
//!
//! 阈值分割和脊线分割共用的流程：读取图像 → 分割 → 后处理 → 目标测量 → 结果行。
//!
//! ## 后处理（均可选，未配置即跳过）
//! - `noise_removal` - 开运算去噪
//! - `fill_gaps` - 闭运算填补缝隙
//! - `color_filters` - 按目标内像素颜色保留或去除目标（可配置多个）
//! - `dirt_removal` - 按面积统计（中位数 + k·标准差）或固定面积去除杂质
//! - `size_filter` - 去除面积过小的目标
//! - `shape_filter` - 去除长宽比过小的目标
//!
//! ## 结果行
//! - 默认：总长度、目标数、按长度加权的平均直径
//! - 设置 `diameter_bins` 时：每个直径等级一行，记录该等级的总长度
//!
//! ## 依赖关系
//! - 被 `commands/segment.rs` 构造
//! - 调用 `adapters/threshold.rs`、`adapters/ridge.rs`

use super::{error_chain, ridge, threshold, timestamp, Processor};
use crate::config::params::{
    AlgorithmParams, ColorFilterParams, DirtMethod, DirtRemovalParams, PostProcessParams,
    RidgeParams, ThresholdParams,
};
use crate::error::{BatchError, Result};
use crate::imaging::{self, filters, mask::Component, Mask};
use crate::models::row::{SEGMENT_BINNED_COLUMNS, SEGMENT_COLUMNS};
use crate::models::{AdapterOutput, ResultRow, StageReport, TableSchema, WorkItem};

use image::DynamicImage;

/// 分割方法
#[derive(Debug, Clone)]
pub enum SegmentMethod {
    Threshold(ThresholdParams),
    Ridge(RidgeParams),
}

/// 分割适配器
#[derive(Debug, Clone)]
pub struct SegmentProcessor {
    method: SegmentMethod,
    post: PostProcessParams,
    diameter_bins: Option<Vec<f64>>,
}

impl SegmentProcessor {
    pub fn new(
        method: SegmentMethod,
        post: PostProcessParams,
        diameter_bins: Option<Vec<f64>>,
    ) -> Self {
        Self {
            method,
            post,
            diameter_bins,
        }
    }

    /// 阈值分割；参数文件没有 `threshold` 小节时使用默认值
    pub fn threshold(params: &AlgorithmParams) -> Self {
        Self::new(
            SegmentMethod::Threshold(params.threshold.clone().unwrap_or_default()),
            params.post.clone(),
            params.diameter_bins.clone(),
        )
    }

    /// 脊线分割；参数文件没有 `ridge` 小节时使用默认值
    pub fn ridge(params: &AlgorithmParams) -> Self {
        Self::new(
            SegmentMethod::Ridge(params.ridge.clone().unwrap_or_default()),
            params.post.clone(),
            params.diameter_bins.clone(),
        )
    }

    /// 分割并后处理
    pub fn segment(&self, img: &DynamicImage, stages: &mut StageReport) -> Mask {
        let mask = match &self.method {
            SegmentMethod::Threshold(p) => threshold::segment(img, p, stages),
            SegmentMethod::Ridge(p) => ridge::segment(img, p, stages),
        };
        post_process(img, mask, &self.post, stages)
    }

    fn rows(&self, item: &WorkItem, objects: &[Component]) -> Vec<ResultRow> {
        let time = timestamp();

        match &self.diameter_bins {
            None => {
                let length: f64 = objects.iter().map(Component::length).sum();
                let area: usize = objects.iter().map(Component::area).sum();
                // 按长度加权：Σ(dᵢ·lᵢ)/Σlᵢ = Σaᵢ/Σlᵢ
                let mean_diameter = if length > 0.0 {
                    area as f64 / length
                } else {
                    0.0
                };
                vec![ResultRow::new()
                    .with("Timestamp", time)
                    .with("ImageName", item.display_name.as_str())
                    .with("Length", length)
                    .with("ObjectCount", objects.len())
                    .with("MeanDiameter", mean_diameter)]
            }
            Some(edges) => diameter_classes(edges, objects)
                .into_iter()
                .map(|(class, length)| {
                    ResultRow::new()
                        .with("Timestamp", time.as_str())
                        .with("ImageName", item.display_name.as_str())
                        .with("DiameterClass", class)
                        .with("Length", length)
                })
                .collect(),
        }
    }
}

impl Processor for SegmentProcessor {
    fn name(&self) -> &str {
        match self.method {
            SegmentMethod::Threshold(_) => "threshold segmentation",
            SegmentMethod::Ridge(_) => "ridge segmentation",
        }
    }

    fn schema(&self) -> TableSchema {
        if self.diameter_bins.is_some() {
            TableSchema::new(&SEGMENT_BINNED_COLUMNS)
        } else {
            TableSchema::new(&SEGMENT_COLUMNS)
        }
    }

    fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
        let img = imaging::load(&item.input_path)?;
        let mut stages = StageReport::new();

        let mask = self.segment(&img, &mut stages);
        let objects = mask.components();

        Ok(AdapterOutput {
            artifact: Some(DynamicImage::ImageLuma8(mask.to_image())),
            rows: self.rows(item, &objects),
            stages,
        })
    }
}

/// 依次执行各个可选后处理阶段
///
/// `img` 是分割所用的原图，颜色筛选从中读取像素值。
pub fn post_process(
    img: &DynamicImage,
    mut mask: Mask,
    post: &PostProcessParams,
    stages: &mut StageReport,
) -> Mask {
    match &post.noise_removal {
        Some(p) => {
            mask = mask.open(p.radius);
            stages.applied("noise removal");
        }
        None => stages.disabled("noise removal"),
    }

    match &post.fill_gaps {
        Some(p) => {
            mask = mask.close(p.radius);
            stages.applied("fill gaps");
        }
        None => stages.disabled("fill gaps"),
    }

    if post.color_filters.is_empty() {
        stages.disabled("color filter");
    }
    for (i, params) in post.color_filters.iter().enumerate() {
        let stage = format!("color filter {}", i + 1);
        match color_filter(img, &mask, params) {
            Ok(filtered) => {
                mask = filtered;
                stages.applied(&stage);
            }
            Err(e) => stages.failed(&stage, error_chain(&e)),
        }
    }

    match &post.dirt_removal {
        Some(p) => {
            mask = dirt_removal(mask, p);
            stages.applied("dirt removal");
        }
        None => stages.disabled("dirt removal"),
    }

    match &post.size_filter {
        Some(p) => {
            mask = mask.retain(|c| c.area() >= p.min_area);
            stages.applied("size filter");
        }
        None => stages.disabled("size filter"),
    }

    match &post.shape_filter {
        Some(p) => {
            mask = mask.retain(|c| c.elongation() >= p.min_length_width_ratio);
            stages.applied("shape filter");
        }
        None => stages.disabled("shape filter"),
    }

    mask
}

// ─────────────────────────────────────────────────────────────
// 目标筛选
// ─────────────────────────────────────────────────────────────

/// 保留（`invert` 时去除）落在颜色区间内的像素比例达到 `percent` 的目标
fn color_filter(img: &DynamicImage, mask: &Mask, params: &ColorFilterParams) -> Result<Mask> {
    let band = imaging::color_band(img, params.colorspace, params.band)?;
    if band.dimensions() != (mask.width(), mask.height()) {
        return Err(BatchError::ImageShape(format!(
            "mask is {}x{} but the image is {}x{}",
            mask.width(),
            mask.height(),
            band.width(),
            band.height()
        )));
    }

    let values = band.as_raw();
    let needed = params.percent / 100.0;
    Ok(mask.retain(|c| {
        let inside = c
            .pixels
            .iter()
            .filter(|i| in_range(values[**i], params.low, params.high))
            .count();
        let pass = inside as f64 / c.area() as f64 >= needed;
        pass != params.invert
    }))
}

/// `high < low` 时区间跨越 1.0 回绕：`[low, 1] ∪ [0, high]`
fn in_range(value: f32, low: f32, high: f32) -> bool {
    if low <= high {
        (low..=high).contains(&value)
    } else {
        value >= low || value <= high
    }
}

/// 只保留面积大于截断值的目标
fn dirt_removal(mask: Mask, params: &DirtRemovalParams) -> Mask {
    let cutoff = match params.method {
        DirtMethod::Threshold => params.param,
        DirtMethod::Gaussian => {
            let areas: Vec<f32> = mask.components().iter().map(|c| c.area() as f32).collect();
            if areas.is_empty() {
                return mask;
            }
            filters::percentile(&areas, 50.0) as f64 + params.param * filters::variance(&areas).sqrt()
        }
    };
    mask.retain(|c| c.area() as f64 > cutoff)
}

/// 按直径分级汇总长度
///
/// 边界 `[e0, e1, …, en]` 得到等级 `e0-e1`, …, `e(n-1)-en`, `>en`；直径小于 `e0` 的目标不计入。
pub fn diameter_classes(edges: &[f64], objects: &[Component]) -> Vec<(String, f64)> {
    let mut classes: Vec<(String, f64)> = edges
        .windows(2)
        .map(|w| (format!("{}-{}", w[0], w[1]), 0.0))
        .collect();
    if let Some(last) = edges.last() {
        classes.push((format!(">{}", last), 0.0));
    }

    for object in objects {
        let d = object.diameter();
        let index = match edges.iter().rposition(|e| d >= *e) {
            Some(i) => i,
            None => continue,
        };
        classes[index].1 += object.length();
    }

    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::{ColorSpace, RadiusParams, ShapeFilterParams, SizeFilterParams};
    use crate::models::FieldValue;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// 一条长 20、宽 1 的亮线，加一个孤立噪点
    fn scene() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(30, 10, |x, y| {
            let on = (y == 5 && (5..25).contains(&x)) || (x == 1 && y == 1);
            Luma([if on { 255 } else { 0 }])
        }))
    }

    fn item_for(dir: &Path, img: &DynamicImage) -> WorkItem {
        let input = dir.join("tube/img.png");
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();
        img.save(&input).unwrap();
        WorkItem::new(
            input,
            PathBuf::from("tube"),
            &dir.join("out"),
            &dir.join("fail"),
            ".png",
        )
    }

    fn fixed_threshold() -> AlgorithmParams {
        AlgorithmParams {
            threshold: Some(ThresholdParams {
                level: Some(0.5),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_unbinned_row() {
        let dir = TempDir::new().unwrap();
        let img = scene();
        let item = item_for(dir.path(), &img);

        let output = SegmentProcessor::threshold(&fixed_threshold())
            .process(&item)
            .unwrap();

        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert!(TableSchema::new(&SEGMENT_COLUMNS).accepts(row));
        assert_eq!(row.get("ImageName"), Some(&FieldValue::from("tube/img.png")));
        assert_eq!(row.get("ObjectCount"), Some(&FieldValue::Int(2)));
        // 线: 周长 42 → 长度 21；噪点: 周长 4 → 长度 2
        assert_eq!(row.get("Length"), Some(&FieldValue::Float(23.0)));
        assert!(output.stages.is_clean());
        assert!(output.artifact.is_some());
    }

    #[test]
    fn test_size_filter_removes_noise() {
        let mut params = fixed_threshold();
        params.post.size_filter = Some(SizeFilterParams { min_area: 2 });
        let processor = SegmentProcessor::threshold(&params);

        let mut stages = StageReport::new();
        let mask = processor.segment(&scene(), &mut stages);

        assert_eq!(mask.components().len(), 1);
        assert!(stages.applied_stages().contains(&"size filter".to_string()));
        assert!(stages.disabled_stages().contains(&"noise removal".to_string()));
    }

    #[test]
    fn test_shape_filter_keeps_elongated_objects() {
        let mut mask = Mask::new(20, 20);
        for x in 2..18 {
            mask.set(x, 2, true);
        }
        for y in 10..14 {
            for x in 10..14 {
                mask.set(x, y, true);
            }
        }
        let post = PostProcessParams {
            shape_filter: Some(ShapeFilterParams {
                min_length_width_ratio: 5.0,
            }),
            ..Default::default()
        };

        let mut stages = StageReport::new();
        let kept = post_process(&DynamicImage::new_luma8(20, 20), mask, &post, &mut stages);

        assert_eq!(kept.count(), 16);
        assert!(kept.get(5, 2));
        assert!(!kept.get(11, 11));
    }

    #[test]
    fn test_noise_removal_then_fill_gaps() {
        let post = PostProcessParams {
            noise_removal: Some(RadiusParams { radius: 1 }),
            fill_gaps: Some(RadiusParams { radius: 1 }),
            ..Default::default()
        };
        let mut mask = Mask::new(12, 12);
        mask.set(0, 0, true);
        for y in 4..9 {
            for x in 3..10 {
                mask.set(x, y, true);
            }
        }

        let mut stages = StageReport::new();
        let out = post_process(&DynamicImage::new_luma8(12, 12), mask, &post, &mut stages);

        assert!(!out.get(0, 0));
        assert!(out.get(6, 6));
        assert_eq!(stages.applied_stages().len(), 2);
        assert_eq!(
            stages.disabled_stages(),
            ["color filter", "dirt removal", "size filter", "shape filter"]
        );
    }

    /// 左侧红色方块、右侧绿色方块
    fn two_colored_squares() -> (DynamicImage, Mask) {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 8, |x, _| {
            if x < 10 {
                Rgb([220, 20, 20])
            } else {
                Rgb([20, 220, 20])
            }
        }));
        let mut mask = Mask::new(20, 8);
        for y in 2..6 {
            for x in (2..6).chain(14..18) {
                mask.set(x, y, true);
            }
        }
        (img, mask)
    }

    fn red_filter(invert: bool) -> ColorFilterParams {
        ColorFilterParams {
            colorspace: ColorSpace::Rgb,
            band: 0,
            low: 0.5,
            high: 1.0,
            percent: 50.0,
            invert,
        }
    }

    #[test]
    fn test_color_filter_keeps_or_removes_matching_objects() {
        let (img, mask) = two_colored_squares();

        let kept = color_filter(&img, &mask, &red_filter(false)).unwrap();
        assert!(kept.get(3, 3));
        assert!(!kept.get(15, 3));

        let removed = color_filter(&img, &mask, &red_filter(true)).unwrap();
        assert!(!removed.get(3, 3));
        assert!(removed.get(15, 3));
    }

    #[test]
    fn test_hue_range_wraps_around() {
        assert!(in_range(0.95, 0.9, 0.1));
        assert!(in_range(0.05, 0.9, 0.1));
        assert!(!in_range(0.5, 0.9, 0.1));
        assert!(in_range(0.5, 0.2, 0.8));
    }

    #[test]
    fn test_color_filter_on_gray_image_is_a_failed_stage() {
        let (_, mask) = two_colored_squares();
        let post = PostProcessParams {
            color_filters: vec![ColorFilterParams {
                colorspace: ColorSpace::Hsv,
                ..red_filter(false)
            }],
            ..Default::default()
        };

        let mut stages = StageReport::new();
        let out = post_process(&DynamicImage::new_luma8(20, 8), mask.clone(), &post, &mut stages);

        assert_eq!(out, mask);
        assert!(!stages.is_clean());
        assert_eq!(stages.failed_stages()[0].0, "color filter 1");
    }

    #[test]
    fn test_dirt_removal() {
        let mut mask = Mask::new(20, 12);
        for x in [0, 3, 6, 9, 12] {
            mask.set(x, 0, true);
        }
        for y in 5..10 {
            for x in 2..12 {
                mask.set(x, y, true);
            }
        }

        // 面积 [1, 1, 1, 1, 1, 50]：中位数 1，标准差约 18.3
        let gaussian = dirt_removal(
            mask.clone(),
            &DirtRemovalParams {
                method: DirtMethod::Gaussian,
                param: 1.0,
            },
        );
        assert_eq!(gaussian.count(), 50);
        assert!(!gaussian.get(0, 0));

        let threshold = dirt_removal(
            mask,
            &DirtRemovalParams {
                method: DirtMethod::Threshold,
                param: 0.5,
            },
        );
        assert_eq!(threshold.count(), 55);
    }

    #[test]
    fn test_diameter_classes() {
        let mut mask = Mask::new(40, 20);
        // 细线：直径 < 1
        for x in 0..20 {
            mask.set(x, 1, true);
        }
        // 4×20 的粗条：面积 80，周长 48 → 长度 24，直径 ≈ 3.33
        for y in 10..14 {
            for x in 10..30 {
                mask.set(x, y, true);
            }
        }
        let objects = mask.components();

        let classes = diameter_classes(&[0.0, 2.0, 10.0], &objects);

        assert_eq!(
            classes.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
            vec!["0-2", "2-10", ">10"]
        );
        assert!((classes[0].1 - 21.0).abs() < 1e-9);
        assert!((classes[1].1 - 24.0).abs() < 1e-9);
        assert_eq!(classes[2].1, 0.0);
    }

    #[test]
    fn test_binned_rows_match_schema() {
        let dir = TempDir::new().unwrap();
        let img = scene();
        let item = item_for(dir.path(), &img);

        let mut params = fixed_threshold();
        params.diameter_bins = Some(vec![0.0, 1.0]);
        let processor = SegmentProcessor::threshold(&params);

        let output = processor.process(&item).unwrap();
        let schema = processor.schema();

        assert_eq!(schema.columns()[2], "DiameterClass");
        assert_eq!(output.rows.len(), 2);
        assert!(output.rows.iter().all(|r| schema.accepts(r)));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let item = WorkItem::new(
            PathBuf::from("/definitely/not/here.png"),
            PathBuf::new(),
            Path::new("/out"),
            Path::new("/fail"),
            ".png",
        );
        assert!(SegmentProcessor::ridge(&AlgorithmParams::default())
            .process(&item)
            .is_err());
    }
}
