//! # tennant 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/tennant.rs`

use super::BatchArgs;
use clap::Args;

/// tennant 子命令参数
#[derive(Args, Debug)]
pub struct TennantArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Grid size in pixels
    #[arg(short, long)]
    pub grid_size: u32,

    /// Write the input with the grid drawn over it (required for skipping on re-runs)
    #[arg(long, default_value_t = false)]
    pub save_images: bool,
}
