//! # preprocess 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/preprocess.rs`

use super::BatchArgs;
use clap::Args;
use std::path::PathBuf;

/// preprocess 子命令参数
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// YAML algorithm parameter file (`preprocessing` section)
    #[arg(short, long)]
    pub params: PathBuf,
}
