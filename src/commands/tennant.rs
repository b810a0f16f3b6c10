//! # tennant 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/tennant.rs` 定义的参数
//! - 使用 `adapters/tennant.rs`

use super::{batch_config, execute_batch};
use crate::adapters::TennantProcessor;
use crate::cli::tennant::TennantArgs;
use crate::error::Result;

/// 执行 tennant 命令
pub fn execute(args: TennantArgs) -> Result<()> {
    let processor = TennantProcessor::new(args.grid_size)?;

    let config = batch_config(&args.batch, Some(".png"), args.save_images);
    execute_batch(
        &format!("Tennant Length ({} px grid)", args.grid_size),
        &args.batch,
        config,
        Box::new(processor),
    )
}
