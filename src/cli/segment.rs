//! # segment 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/segment.rs`

use super::BatchArgs;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 分割方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Global threshold (Otsu or fixed level)
    Threshold,
    /// Multi-scale Hessian ridge filter
    Ridge,
}

/// segment 子命令参数
#[derive(Args, Debug)]
pub struct SegmentArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// YAML algorithm parameter file
    #[arg(short, long)]
    pub params: PathBuf,

    /// Segmentation method
    #[arg(short, long, value_enum, default_value_t = Method::Threshold)]
    pub method: Method,

    /// Write the binary masks (required for skipping on re-runs)
    #[arg(long, default_value_t = false)]
    pub save_images: bool,
}
