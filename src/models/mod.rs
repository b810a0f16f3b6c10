//! # 数据模型模块
//!
//! 定义工作单元、结果行/表结构和处理结果的数据模型。
//!
//! ## 依赖关系
//! - 被 `batch/`、`adapters/` 和 `commands/` 使用
//! - 子模块: item, row, outcome

pub mod item;
pub mod outcome;
pub mod row;

pub use item::WorkItem;
pub use outcome::{AdapterOutput, ProcessingOutcome, StageReport};
pub use row::{FieldValue, ResultRow, TableSchema};
