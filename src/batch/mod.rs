//! # 批量处理模块
//!
//! 批处理编排的核心：目录遍历与镜像、幂等跳过、有界并行分发、单项故障隔离，
//! 以及对结构受检结果表的流式追加。
//!
//! ## 子模块
//! - `collector` - 输入文件集合（遍历、过滤、镜像目录）
//! - `guard` - 基于产物存在性的跳过判断
//! - `table` - 只追加的结果表
//! - `runner` - 工作线程池
//! - `engine` - 状态机，组合以上部分
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod engine;
pub mod guard;
pub mod runner;
pub mod table;

pub use collector::FileCollector;
pub use engine::{BatchEngine, BatchPlan, BatchSummary, EngineState, TableAction};
pub use guard::IdempotencyGuard;
pub use runner::WorkerPool;
pub use table::ResultTable;
