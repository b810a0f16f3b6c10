//! # rootbatch - 根系图像批处理
//!
//! 对目录树中的图像逐个运行分析算法：结果行追加到单个结果表，
//! 产物按输入目录结构镜像写出，已处理的图像在重复运行时跳过。
//!
//! ## 子命令
//! - `segment` - 阈值 / 脊线分割与测量
//! - `preprocess` - 明场校正、平滑、波段配准
//! - `screen` - 图像质量筛选
//! - `fishnet` - 绘制计数网格
//! - `tennant` - 线交法长度估算
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (批处理引擎)
//!   │     ├── adapters/  (算法适配器)
//!   │     │     └── imaging/ (图像工具)
//!   │     ├── config/    (运行配置与参数文件)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (输出与进度条)
//!   └── error.rs    (错误处理)
//! ```

mod adapters;
mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod imaging;
mod models;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&adapters::error_chain(&e));
        std::process::exit(1);
    }
}

/// `RUST_LOG` 优先；否则按 `-v` 次数选择级别
fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
