//! # preprocess 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/preprocess.rs` 定义的参数
//! - 使用 `adapters/preprocess.rs`

use super::{batch_config, execute_batch};
use crate::adapters::PreprocessProcessor;
use crate::cli::preprocess::PreprocessArgs;
use crate::config::AlgorithmParams;
use crate::error::Result;

/// 执行 preprocess 命令
pub fn execute(args: PreprocessArgs) -> Result<()> {
    let params = AlgorithmParams::from_file(&args.params)?;
    let processor = PreprocessProcessor::new(params.preprocessing);

    let config = batch_config(&args.batch, None, true);
    execute_batch("Preprocessing", &args.batch, config, Box::new(processor))
}
