//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `segment`: 阈值 / 脊线分割
//! - `preprocess`: 明场校正、平滑、波段配准
//! - `screen`: 图像质量筛选
//! - `fishnet`: 绘制计数网格
//! - `tennant`: 线交法长度估算
//!
//! 所有子命令共享 `BatchArgs`（输入输出路径、并行度、跳过策略等）。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: segment, preprocess, screen, fishnet, tennant

pub mod fishnet;
pub mod preprocess;
pub mod screen;
pub mod segment;
pub mod tennant;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// rootbatch - 根系图像批处理
#[derive(Parser)]
#[command(name = "rootbatch")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Resumable, parallel batch processing of root image corpora", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Segment objects by global threshold or ridge filter and measure them
    Segment(segment::SegmentArgs),

    /// Correct images (brightfield, smoothing, band registration)
    Preprocess(preprocess::PreprocessArgs),

    /// Screen images for motion blur, colour temperature and low contrast
    Screen(screen::ScreenArgs),

    /// Draw a counting grid over each image
    Fishnet(fishnet::FishnetArgs),

    /// Estimate object length in binary images by the line-intersect method
    Tennant(tennant::TennantArgs),
}

/// 所有批处理子命令共享的参数
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Root directory of the input images (searched recursively)
    pub input: PathBuf,

    /// Input file extension, matched case-sensitively (e.g. ".png")
    #[arg(short, long)]
    pub ext: String,

    /// Output root directory [default: <INPUT>/analyzed]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for degraded outputs [default: <OUTPUT>/failed]
    #[arg(long)]
    pub failures: Option<PathBuf>,

    /// Result table (.tsv/.txt tab-separated, otherwise comma-separated)
    /// [default: <INPUT>/batch_results.tsv]
    #[arg(short, long)]
    pub table: Option<PathBuf>,

    /// Replace an existing result table instead of appending to it
    #[arg(long, default_value_t = false)]
    pub overwrite_table: bool,

    /// Extension of written images
    #[arg(long)]
    pub output_ext: Option<String>,

    /// Number of parallel jobs (0 = all CPUs, 1 = sequential)
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Reprocess items that only have a failure artifact
    #[arg(long, default_value_t = false, conflicts_with = "force")]
    pub retry_failures: bool,

    /// Reprocess every item and overwrite existing artifacts
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// List what would be processed without writing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Hide progress bars
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}
