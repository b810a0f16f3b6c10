//! # Tennant 线交法适配器
//!
//! 输入为分割后的二值图像。统计目标与网格线的交叉数，
//! 长度 = 11/14 × 网格尺寸 × 交叉数。
//!
//! ## 依赖关系
//! - 被 `commands/tennant.rs` 构造
//! - 使用 `imaging/grid.rs`、`imaging/mask.rs`

use super::Processor;
use crate::error::{BatchError, Result};
use crate::imaging::{self, grid, Mask};
use crate::models::row::GRID_COLUMNS;
use crate::models::{AdapterOutput, ResultRow, StageReport, TableSchema, WorkItem};

use image::DynamicImage;

/// 产物中网格线的颜色
const OVERLAY_COLOR: [u8; 3] = [200, 0, 0];

/// 线交法长度估算适配器
#[derive(Debug, Clone)]
pub struct TennantProcessor {
    grid_size: u32,
}

impl TennantProcessor {
    pub fn new(grid_size: u32) -> Result<Self> {
        if grid_size == 0 {
            return Err(BatchError::InvalidParameter(
                "grid size must be at least 1 pixel".to_string(),
            ));
        }
        Ok(Self { grid_size })
    }
}

impl Processor for TennantProcessor {
    fn name(&self) -> &str {
        "tennant"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::new(&GRID_COLUMNS)
    }

    fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
        let img = imaging::load(&item.input_path)?;
        let mask = Mask::from_image(&img);

        let crossings = grid::count_crossings(&mask, self.grid_size);
        let length = grid::tennant_length(crossings, self.grid_size);

        let row = ResultRow::new()
            .with("ImageName", item.display_name.as_str())
            .with("GridSizePixels", self.grid_size as i64)
            .with("CrossingCount", crossings)
            .with("LengthPixels", length);

        let overlay = grid::draw_fishnet(&img, self.grid_size, OVERLAY_COLOR, 1);

        Ok(AdapterOutput {
            artifact: Some(DynamicImage::ImageRgb8(overlay)),
            rows: vec![row],
            stages: StageReport::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use image::{GrayImage, Luma};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_tennant_counts_diagonal() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("roots").join("seg.png");
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();
        DynamicImage::ImageLuma8(GrayImage::from_fn(30, 30, |x, y| {
            Luma([if x == y { 255 } else { 0 }])
        }))
        .save(&input)
        .unwrap();
        let item = WorkItem::new(
            input,
            PathBuf::from("roots"),
            &dir.path().join("out"),
            &dir.path().join("fail"),
            ".png",
        );

        let output = TennantProcessor::new(10).unwrap().process(&item).unwrap();

        let row = &output.rows[0];
        assert!(TableSchema::new(&GRID_COLUMNS).accepts(row));
        assert_eq!(row.get("ImageName"), Some(&FieldValue::from("roots/seg.png")));
        assert_eq!(row.get("CrossingCount"), Some(&FieldValue::Int(4)));
        match row.get("LengthPixels") {
            Some(FieldValue::Float(len)) => assert!((len - 4.0 * 10.0 * 11.0 / 14.0).abs() < 1e-9),
            other => panic!("unexpected length {:?}", other),
        }
    }

    #[test]
    fn test_zero_grid_is_rejected() {
        assert!(TennantProcessor::new(0).is_err());
    }
}
