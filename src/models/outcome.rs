//! # 处理结果数据模型
//!
//! - `StageReport`: 记录子阶段是已执行、未配置（静默跳过）还是配置了但失败
//! - `AdapterOutput`: 适配器成功返回的产物与结果行
//! - `ProcessingOutcome`: 每个工作单元唯一的终态结果（瞬态，不持久化）
//!
//! ## 依赖关系
//! - 被 `adapters/` 构造
//! - 被 `batch/engine.rs` 消费

use super::row::ResultRow;
use image::DynamicImage;

/// 子阶段执行记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    applied: Vec<String>,
    disabled: Vec<String>,
    failed: Vec<(String, String)>,
}

impl StageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 子阶段已执行
    pub fn applied(&mut self, stage: &str) {
        self.applied.push(stage.to_string());
    }

    /// 子阶段未配置（不是错误，不告警）
    pub fn disabled(&mut self, stage: &str) {
        self.disabled.push(stage.to_string());
    }

    /// 子阶段已配置但失败
    pub fn failed(&mut self, stage: &str, reason: impl Into<String>) {
        self.failed.push((stage.to_string(), reason.into()));
    }

    pub fn applied_stages(&self) -> &[String] {
        &self.applied
    }

    pub fn disabled_stages(&self) -> &[String] {
        &self.disabled
    }

    pub fn failed_stages(&self) -> &[(String, String)] {
        &self.failed
    }

    /// 没有任何失败的子阶段
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 适配器成功时的输出
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    /// 待写出的图像产物
    pub artifact: Option<DynamicImage>,
    /// 待追加到结果表的行
    pub rows: Vec<ResultRow>,
    /// 子阶段记录
    pub stages: StageReport,
}

/// 单个工作单元的终态结果
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// 处理完成（可能有子阶段失败）
    Success {
        artifact: Option<DynamicImage>,
        rows: Vec<ResultRow>,
        stages: StageReport,
    },
    /// 已处理过，跳过
    Skipped,
    /// 处理失败，不写产物也不写结果行
    Failed { reason: String },
}

impl From<AdapterOutput> for ProcessingOutcome {
    fn from(output: AdapterOutput) -> Self {
        ProcessingOutcome::Success {
            artifact: output.artifact,
            rows: output.rows,
            stages: output.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_stages_do_not_count_as_failures() {
        let mut report = StageReport::new();
        report.disabled("brightfield");
        report.applied("smoothing");

        assert!(report.is_clean());
        assert_eq!(report.failed_stages().len(), 0);

        report.failed("registration", "band mismatch");
        assert!(!report.is_clean());
        assert_eq!(report.failed_stages().len(), 1);
        assert_eq!(report.failed_stages()[0].0, "registration");
    }
}
