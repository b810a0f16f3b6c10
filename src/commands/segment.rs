//! # segment 命令实现
//!
//! 读取参数文件，按所选方法构造分割适配器并运行批处理。
//! 不加 `--save-images` 时不写掩膜，此时重复运行不会跳过已处理的图像。
//!
//! ## 依赖关系
//! - 使用 `cli/segment.rs` 定义的参数
//! - 使用 `adapters/segment.rs`

use super::{batch_config, execute_batch};
use crate::adapters::SegmentProcessor;
use crate::cli::segment::{Method, SegmentArgs};
use crate::config::AlgorithmParams;
use crate::error::Result;
use crate::utils::output;

/// 执行 segment 命令
pub fn execute(args: SegmentArgs) -> Result<()> {
    let params = AlgorithmParams::from_file(&args.params)?;

    let processor = match args.method {
        Method::Threshold => SegmentProcessor::threshold(&params),
        Method::Ridge => SegmentProcessor::ridge(&params),
    };

    if !args.save_images && !args.batch.dry_run {
        output::print_warning("Masks are not saved; a re-run will process every image again.");
    }

    let config = batch_config(&args.batch, Some(".png"), args.save_images);
    let title = match args.method {
        Method::Threshold => "Threshold Segmentation",
        Method::Ridge => "Ridge Segmentation",
    };
    execute_batch(title, &args.batch, config, Box::new(processor))
}
