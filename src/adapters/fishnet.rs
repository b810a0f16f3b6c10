//! # 网格绘制适配器
//!
//! 在每张图像上绘制方形网格，供人工线交计数。结果表为每张图像登记一行，
//! `CrossingCount` 与 `LengthPixels` 留空待填写。
//!
//! ## 依赖关系
//! - 被 `commands/fishnet.rs` 构造
//! - 使用 `imaging/grid.rs`

use super::Processor;
use crate::error::Result;
use crate::imaging::{self, grid};
use crate::models::row::GRID_COLUMNS;
use crate::models::{AdapterOutput, FieldValue, ResultRow, StageReport, TableSchema, WorkItem};

use image::DynamicImage;

/// 网格绘制适配器
#[derive(Debug, Clone)]
pub struct FishnetProcessor {
    size: u32,
    color: [u8; 3],
    weight: u32,
}

impl FishnetProcessor {
    pub fn new(size: u32, color: [u8; 3], weight: u32) -> Self {
        Self {
            size,
            color,
            weight,
        }
    }
}

impl Processor for FishnetProcessor {
    fn name(&self) -> &str {
        "fishnet"
    }

    fn schema(&self) -> TableSchema {
        TableSchema::new(&GRID_COLUMNS)
    }

    fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
        let img = imaging::load(&item.input_path)?;
        let gridded = grid::draw_fishnet(&img, self.size, self.color, self.weight);

        let row = ResultRow::new()
            .with("ImageName", item.display_name.as_str())
            .with("GridSizePixels", self.size as i64)
            .with("CrossingCount", FieldValue::Empty)
            .with("LengthPixels", FieldValue::Empty);

        Ok(AdapterOutput {
            artifact: Some(DynamicImage::ImageRgb8(gridded)),
            rows: vec![row],
            stages: StageReport::new(),
        })
    }
}
