//! # 批处理引擎
//!
//! 组合文件收集、跳过判断、线程池和结果表，驱动一次完整的批处理运行。
//!
//! ## 状态
//! ```text
//! Configuring → ValidatingTable → Scanning → Dispatching → Draining → Done
//! ```
//! 只有前两个状态可能以错误终止整个运行；分发开始之后的任何错误都只影响单个工作单元。
//!
//! ## 结果归类
//! - 适配器成功且没有失败的子阶段：产物写入输出目录
//! - 适配器成功但有子阶段失败：产物写入失败目录，结果行照常写入
//! - 适配器返回错误或 panic：不写产物也不写结果行
//!
//! 归类与写入在工作线程内逐个完成，产物不会在内存中累积。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `batch/` 的其他子模块与 `adapters::invoke`

use super::collector::FileCollector;
use super::guard::IdempotencyGuard;
use super::runner::WorkerPool;
use super::table::{self, ResultTable};
use crate::adapters::{self, Processor};
use crate::config::{BatchConfig, ResolvedPaths};
use crate::error::{BatchError, Result};
use crate::imaging;
use crate::models::{ProcessingOutcome, ResultRow, TableSchema, WorkItem};
use crate::utils::progress;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Configuring,
    ValidatingTable,
    Scanning,
    Dispatching,
    Draining,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Configuring => "configuring",
            EngineState::ValidatingTable => "validating table",
            EngineState::Scanning => "scanning",
            EngineState::Dispatching => "dispatching",
            EngineState::Draining => "draining",
            EngineState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// 单个工作单元写入后的终态
#[derive(Debug, Clone)]
pub enum ItemStatus {
    Succeeded {
        rows: Vec<ResultRow>,
        /// 有子阶段失败，产物进入失败目录
        degraded: bool,
    },
    Skipped,
    Failed {
        reason: String,
    },
}

/// 单个工作单元的报告
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub name: String,
    pub status: ItemStatus,
}

/// 批处理结果统计
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// 计数预扫描发现的匹配文件数
    pub discovered: usize,
    /// 成功数量（含降级）
    pub succeeded: usize,
    /// 降级数量（成功的子集）
    pub degraded: usize,
    /// 跳过数量
    pub skipped: usize,
    /// 失败数量
    pub failed: usize,
    /// 失败详情 (显示名, 原因)
    pub failures: Vec<(String, String)>,
    /// 本次运行写入的所有结果行
    pub rows: Vec<ResultRow>,
}

impl BatchSummary {
    /// 合并处理结果
    pub fn merge(&mut self, report: ItemReport) {
        match report.status {
            ItemStatus::Succeeded { rows, degraded } => {
                self.succeeded += 1;
                if degraded {
                    self.degraded += 1;
                }
                self.rows.extend(rows);
            }
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed { reason } => {
                self.failed += 1;
                self.failures.push((report.name, reason));
            }
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// 结果表在本次运行中的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    Create,
    Append,
    Overwrite,
}

/// 预演结果
#[derive(Debug)]
pub struct BatchPlan {
    pub paths: ResolvedPaths,
    pub table: TableAction,
    /// 将被处理的工作单元
    pub pending: Vec<WorkItem>,
    /// 将被跳过的数量
    pub skipped: usize,
}

impl BatchPlan {
    pub fn total(&self) -> usize {
        self.pending.len() + self.skipped
    }
}

/// 批处理引擎
pub struct BatchEngine {
    config: BatchConfig,
    processor: Box<dyn Processor>,
    state: EngineState,
}

impl BatchEngine {
    pub fn new(config: BatchConfig, processor: Box<dyn Processor>) -> Self {
        Self {
            config,
            processor,
            state: EngineState::Configuring,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 执行完整的批处理
    pub fn run(&mut self) -> Result<BatchSummary> {
        let processor = self.processor.as_ref();
        let config = &self.config;
        let state = &mut self.state;

        // Configuring
        enter(state, EngineState::Configuring);
        let paths = config.resolve()?;

        // ValidatingTable
        enter(state, EngineState::ValidatingTable);
        let table = ResultTable::open_or_create(
            &paths.table_out,
            processor.schema(),
            config.overwrite_table,
        )?;

        // Scanning
        enter(state, EngineState::Scanning);
        for root in [&paths.root_out, &paths.failure_out] {
            fs::create_dir_all(root).map_err(|e| BatchError::CreateDirError {
                path: root.display().to_string(),
                source: e,
            })?;
        }
        let collector = collector_for(config, &paths, processor);
        let discovered = if config.show_progress {
            let spinner = progress::create_spinner("Counting input files");
            let total = collector.count();
            spinner.finish_and_clear();
            total
        } else {
            collector.count()
        };
        info!(total = discovered, "input files found");
        let progress = if config.show_progress {
            progress::create_progress_bar(discovered as u64, processor.name())
        } else {
            progress::hidden()
        };

        // Dispatching
        enter(state, EngineState::Dispatching);
        let pool = WorkerPool::new(config.parallelism).with_progress(progress);
        let context = ItemContext {
            processor,
            guard: IdempotencyGuard::new(config.skip_policy),
            table: &table,
            save_artifacts: config.save_artifacts,
        };
        let reports = pool.run(collector.items(), |item| context.handle(item))?;

        // Draining
        enter(state, EngineState::Draining);
        let mut summary = BatchSummary {
            discovered,
            ..BatchSummary::default()
        };
        for report in reports {
            summary.merge(report);
        }
        if let Err(e) = table.finish() {
            warn!(error = %adapters::error_chain(&e), "final flush of data table failed");
        }

        enter(state, EngineState::Done);
        info!(
            succeeded = summary.succeeded,
            degraded = summary.degraded,
            skipped = summary.skipped,
            failed = summary.failed,
            rows = table.rows_written(),
            "batch finished"
        );
        Ok(summary)
    }

    /// 预演：解析路径、检查结果表、列出将被处理的工作单元，不做任何写入
    pub fn plan(&self) -> Result<BatchPlan> {
        let paths = self.config.resolve()?;
        let schema = self.processor.schema();
        let table = inspect_table(&paths.table_out, &schema, self.config.overwrite_table)?;

        let collector = collector_for(&self.config, &paths, self.processor.as_ref());
        let guard = IdempotencyGuard::new(self.config.skip_policy);

        let mut pending = Vec::new();
        let mut skipped = 0;
        for item in collector.preview() {
            if guard.should_skip(&item) {
                skipped += 1;
            } else {
                pending.push(item);
            }
        }

        Ok(BatchPlan {
            paths,
            table,
            pending,
            skipped,
        })
    }
}

fn enter(state: &mut EngineState, next: EngineState) {
    debug!(from = %state, to = %next, "engine state");
    *state = next;
}

fn collector_for(
    config: &BatchConfig,
    paths: &ResolvedPaths,
    processor: &dyn Processor,
) -> FileCollector {
    FileCollector::new(
        &paths.root_in,
        &config.extension,
        &paths.root_out,
        &paths.failure_out,
    )
    .with_output_extension(&config.output_extension)
    .exclude_names(processor.excluded_names())
}

/// 只读地检查结果表会被如何处理
fn inspect_table(path: &Path, schema: &TableSchema, overwrite: bool) -> Result<TableAction> {
    let existing = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    match (existing, overwrite) {
        (false, _) => Ok(TableAction::Create),
        (true, true) => Ok(TableAction::Overwrite),
        (true, false) => {
            table::check_header(path, schema, table::delimiter_for(path))?;
            Ok(TableAction::Append)
        }
    }
}

/// 与目标同目录的临时文件名；保留扩展名以便按格式编码
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial.{}", name, ext))
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove temporary artifact");
        }
    }
}

/// 工作线程共享的只读上下文
struct ItemContext<'a> {
    processor: &'a dyn Processor,
    guard: IdempotencyGuard,
    table: &'a ResultTable,
    save_artifacts: bool,
}

impl ItemContext<'_> {
    /// 处理并写入一个工作单元
    fn handle(&self, item: WorkItem) -> ItemReport {
        let status = if self.guard.should_skip(&item) {
            debug!(item = %item.display_name, "already processed, skipping");
            ItemStatus::Skipped
        } else {
            let outcome = adapters::invoke(self.processor, &item);
            self.drain(&item, outcome)
        };

        if let ItemStatus::Failed { reason } = &status {
            warn!(item = %item.display_name, reason = %reason, "processing failed");
        }

        ItemReport {
            name: item.display_name,
            status,
        }
    }

    /// 按结果归类写出产物与结果行
    fn drain(&self, item: &WorkItem, outcome: ProcessingOutcome) -> ItemStatus {
        let (artifact, rows, stages) = match outcome {
            ProcessingOutcome::Success {
                artifact,
                rows,
                stages,
            } => (artifact, rows, stages),
            ProcessingOutcome::Skipped => return ItemStatus::Skipped,
            ProcessingOutcome::Failed { reason } => return ItemStatus::Failed { reason },
        };

        for (stage, reason) in stages.failed_stages() {
            warn!(item = %item.display_name, stage = %stage, reason = %reason, "stage failed");
        }
        let degraded = !stages.is_clean();
        let target = if degraded {
            &item.failure_path
        } else {
            &item.output_path
        };

        // 先写到临时文件，结果行落盘后再改名；追加失败时原有产物保持不变
        let staged: Option<PathBuf> = match artifact.filter(|_| self.save_artifacts) {
            Some(image) => {
                let staging = staging_path(target);
                match imaging::save(&image, &staging) {
                    Ok(()) => Some(staging),
                    Err(e) => {
                        discard(&staging);
                        return ItemStatus::Failed {
                            reason: format!(
                                "could not write {}: {}",
                                target.display(),
                                adapters::error_chain(&e)
                            ),
                        };
                    }
                }
            }
            None => None,
        };

        if let Err(e) = self.table.append(&rows) {
            if let Some(path) = &staged {
                discard(path);
            }
            return ItemStatus::Failed {
                reason: format!("could not append results: {}", adapters::error_chain(&e)),
            };
        }

        let written = match staged {
            Some(staging) => match fs::rename(&staging, target) {
                Ok(()) => Some(target),
                Err(e) => {
                    discard(&staging);
                    return ItemStatus::Failed {
                        reason: format!(
                            "results appended but {} could not be moved into place: {}",
                            target.display(),
                            e
                        ),
                    };
                }
            },
            None => None,
        };

        if written.is_some() {
            if let Some(stale) = self.guard.stale_counterpart(item, degraded) {
                debug!(path = %stale.display(), "removing stale artifact");
                if let Err(e) = fs::remove_file(stale) {
                    warn!(path = %stale.display(), error = %e, "could not remove stale artifact");
                }
            }
        }

        ItemStatus::Succeeded { rows, degraded }
    }
}
