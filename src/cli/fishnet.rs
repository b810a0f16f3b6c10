//! # fishnet 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fishnet.rs`

use super::BatchArgs;
use clap::Args;

/// fishnet 子命令参数
#[derive(Args, Debug)]
pub struct FishnetArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Edge length of one grid cell in pixels
    #[arg(long, default_value_t = 50)]
    pub size: u32,

    /// Grid colour as R,G,B
    #[arg(long, value_delimiter = ',', default_values_t = [200u8, 0, 0])]
    pub color: Vec<u8>,

    /// Line width in pixels
    #[arg(long, default_value_t = 1)]
    pub weight: u32,
}
