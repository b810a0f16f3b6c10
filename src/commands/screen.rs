//! # screen 命令实现
//!
//! 通过筛选的图像原样复制到输出目录，未通过的进入失败目录。
//!
//! ## 依赖关系
//! - 使用 `cli/screen.rs` 定义的参数
//! - 使用 `adapters/screen.rs`

use super::{batch_config, execute_batch};
use crate::adapters::ScreenProcessor;
use crate::cli::screen::ScreenArgs;
use crate::config::AlgorithmParams;
use crate::error::Result;

/// 执行 screen 命令
pub fn execute(args: ScreenArgs) -> Result<()> {
    let params = AlgorithmParams::from_file(&args.params)?;
    let processor = ScreenProcessor::new(params.screening);

    let config = batch_config(&args.batch, None, true);
    execute_batch("Quality Screening", &args.batch, config, Box::new(processor))
}
