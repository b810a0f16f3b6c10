//! # fishnet 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/fishnet.rs` 定义的参数
//! - 使用 `adapters/fishnet.rs`

use super::{batch_config, execute_batch};
use crate::adapters::FishnetProcessor;
use crate::cli::fishnet::FishnetArgs;
use crate::error::{BatchError, Result};

/// 执行 fishnet 命令
pub fn execute(args: FishnetArgs) -> Result<()> {
    if args.size == 0 {
        return Err(BatchError::InvalidArgument(
            "--size must be at least 1 pixel".to_string(),
        ));
    }
    let color: [u8; 3] = args.color.as_slice().try_into().map_err(|_| {
        BatchError::InvalidArgument(format!(
            "--color expects three values R,G,B, got {}",
            args.color.len()
        ))
    })?;

    let processor = FishnetProcessor::new(args.size, color, args.weight);

    let config = batch_config(&args.batch, None, true);
    execute_batch("Fishnet Grid", &args.batch, config, Box::new(processor))
}
