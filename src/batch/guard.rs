//! # 幂等跳过判断
//!
//! 仅依据产物文件是否存在决定是否跳过某个工作单元，不比较内容或时间戳。
//! 工作单元与输出路径一一对应，并发判断无需加锁。
//!
//! ## 依赖关系
//! - 被 `batch/engine.rs` 在每个工作单元处理前调用
//! - 使用 `config::SkipPolicy`

use crate::config::SkipPolicy;
use crate::models::WorkItem;

use std::path::Path;

/// 基于产物存在性的跳过判断
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyGuard {
    policy: SkipPolicy,
}

impl IdempotencyGuard {
    pub fn new(policy: SkipPolicy) -> Self {
        Self { policy }
    }

    /// 是否应跳过该工作单元
    pub fn should_skip(&self, item: &WorkItem) -> bool {
        match self.policy {
            SkipPolicy::Existing => item.output_path.exists() || item.failure_path.exists(),
            SkipPolicy::RetryFailures => item.output_path.exists(),
            SkipPolicy::Overwrite => false,
        }
    }

    /// 重新处理后另一侧遗留的旧产物（每个工作单元最多保留一个产物）
    ///
    /// `degraded` 为本次结果是否写入失败目录。
    pub fn stale_counterpart<'a>(&self, item: &'a WorkItem, degraded: bool) -> Option<&'a Path> {
        let other = if degraded {
            &item.output_path
        } else {
            &item.failure_path
        };
        match self.policy {
            SkipPolicy::Existing => None,
            SkipPolicy::RetryFailures | SkipPolicy::Overwrite => {
                Some(other.as_path()).filter(|p| p.exists())
            }
        }
    }
}
