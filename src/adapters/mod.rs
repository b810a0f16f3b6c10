//! # 算法适配器模块
//!
//! 每个算法族实现一次 `Processor`，批处理引擎只通过这个接口调用算法。
//!
//! ## 子模块
//! - `threshold` / `ridge` - 两种分割方法，共用 `segment` 中的后处理与测量
//! - `preprocess` - 明场校正、平滑、波段配准
//! - `screen` - 运动模糊、色温、低对比度筛选
//! - `fishnet` - 绘制网格
//! - `tennant` - 线交法长度估算
//!
//! ## 依赖关系
//! - 被 `batch/engine.rs` 通过 `invoke` 调用
//! - 被 `commands/` 构造
//! - 使用 `imaging/` 的图像工具

pub mod fishnet;
pub mod preprocess;
pub mod ridge;
pub mod screen;
pub mod segment;
pub mod tennant;
pub mod threshold;

pub use fishnet::FishnetProcessor;
pub use preprocess::PreprocessProcessor;
pub use screen::ScreenProcessor;
pub use segment::{SegmentMethod, SegmentProcessor};
pub use tennant::TennantProcessor;

use crate::error::Result;
use crate::models::{AdapterOutput, ProcessingOutcome, TableSchema, WorkItem};

use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

/// 结果表时间戳格式（本地时间）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// 算法适配器接口
///
/// 实现不持有可变状态，同一个实例被所有工作线程共享。
pub trait Processor: Send + Sync {
    /// 算法名称（用于日志与进度显示）
    fn name(&self) -> &str;

    /// 本算法写入的结果表结构
    fn schema(&self) -> TableSchema;

    /// 处理一个工作单元
    ///
    /// 返回 `Err` 表示整个工作单元失败；子阶段失败记录在 `AdapterOutput::stages` 中。
    fn process(&self, item: &WorkItem) -> Result<AdapterOutput>;

    /// 不应作为输入处理的文件名（例如明场参考图像）
    fn excluded_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 调用适配器，错误和 panic 都转换为 `Failed`
pub fn invoke(processor: &dyn Processor, item: &WorkItem) -> ProcessingOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| processor.process(item))) {
        Ok(Ok(output)) => output.into(),
        Ok(Err(e)) => ProcessingOutcome::Failed {
            reason: error_chain(&e),
        },
        Err(payload) => ProcessingOutcome::Failed {
            reason: format!("{} panicked: {}", processor.name(), panic_message(&*payload)),
        },
    }
}

/// 当前本地时间戳
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// 错误及其所有 source，用 `: ` 连接
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use crate::models::ResultRow;
    use std::path::{Path, PathBuf};

    struct Stub;

    impl Processor for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn schema(&self) -> TableSchema {
            TableSchema::new(&["ImageName"])
        }

        fn process(&self, item: &WorkItem) -> Result<AdapterOutput> {
            match item.display_name.as_str() {
                "boom.png" => panic!("exploded on {}", item.display_name),
                "bad.png" => Err(BatchError::FileReadError {
                    path: item.display_name.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
                }),
                _ => Ok(AdapterOutput {
                    rows: vec![ResultRow::new().with("ImageName", item.display_name.as_str())],
                    ..Default::default()
                }),
            }
        }
    }

    fn item(name: &str) -> WorkItem {
        WorkItem::new(
            PathBuf::from(name),
            PathBuf::new(),
            Path::new("/out"),
            Path::new("/fail"),
            ".png",
        )
    }

    #[test]
    fn test_invoke_success() {
        match invoke(&Stub, &item("ok.png")) {
            ProcessingOutcome::Success { rows, .. } => assert_eq!(rows.len(), 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_error_keeps_source() {
        match invoke(&Stub, &item("bad.png")) {
            ProcessingOutcome::Failed { reason } => {
                assert!(reason.contains("bad.png"));
                assert!(reason.contains("disk on fire"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_catches_panic() {
        match invoke(&Stub, &item("boom.png")) {
            ProcessingOutcome::Failed { reason } => {
                assert!(reason.contains("exploded on boom.png"), "{reason}")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[10..11], "_");
    }
}
