//! # 工作线程池
//!
//! 有界并行地执行批量任务，每个提交的工作单元恰好返回一个结果。
//!
//! ## 功能
//! - `jobs == 1`：在调用线程上按枚举顺序顺序执行（便于调试，结果确定）
//! - `jobs > 1`：独立的 rayon 线程池，通过 `par_bridge` 消费惰性迭代器，完成顺序不确定
//! - 每完成一个工作单元推进一次进度条
//!
//! ## 依赖关系
//! - 被 `batch/engine.rs` 调用
//! - 使用 `rayon` 进行并行计算
//! - 使用 `indicatif` 显示进度

use crate::error::{BatchError, Result};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::debug;

/// 工作线程池
pub struct WorkerPool {
    /// 并行作业数
    jobs: usize,
    /// 进度条（默认隐藏）
    progress: ProgressBar,
}

impl WorkerPool {
    /// 创建新的线程池，`jobs == 0` 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            progress: ProgressBar::hidden(),
        }
    }

    /// 设置进度条
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 执行任务，返回与输入数量相同的结果（顺序不保证）
    pub fn run<I, R, F>(&self, items: I, task: F) -> Result<Vec<R>>
    where
        I: Iterator + Send,
        I::Item: Send,
        R: Send,
        F: Fn(I::Item) -> R + Sync + Send,
    {
        let tick = |item: I::Item| {
            let result = task(item);
            self.progress.inc(1);
            result
        };

        let results: Vec<R> = if self.jobs == 1 {
            debug!("running sequentially");
            items.map(tick).collect()
        } else {
            // 配置 rayon 线程池
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

            debug!(jobs = self.jobs, "running in parallel");
            pool.install(|| items.par_bridge().map(tick).collect())
        };

        self.progress.finish_and_clear();
        Ok(results)
    }
}
