//! # 命令执行模块
//!
//! 各子命令只负责构造适配器；读取共享参数、运行引擎和输出汇总在这里完成。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config/`, `batch/`, `adapters/`, `utils/`
//! - 子模块: segment, preprocess, screen, fishnet, tennant

pub mod fishnet;
pub mod preprocess;
pub mod screen;
pub mod segment;
pub mod tennant;

use crate::adapters::Processor;
use crate::batch::{BatchEngine, BatchPlan, BatchSummary, TableAction};
use crate::cli::{BatchArgs, Commands};
use crate::config::{BatchConfig, SkipPolicy};
use crate::error::Result;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 汇总中最多列出的失败项目
const MAX_LISTED_FAILURES: usize = 10;
/// 预演时最多列出的待处理项目
const MAX_LISTED_PENDING: usize = 20;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Segment(args) => segment::execute(args),
        Commands::Preprocess(args) => preprocess::execute(args),
        Commands::Screen(args) => screen::execute(args),
        Commands::Fishnet(args) => fishnet::execute(args),
        Commands::Tennant(args) => tennant::execute(args),
    }
}

/// 由共享参数构造运行配置
///
/// `default_output_ext` 在未给出 `--output-ext` 时使用；
/// 为 `None` 时沿用输入扩展名。
pub fn batch_config(
    args: &BatchArgs,
    default_output_ext: Option<&str>,
    save_artifacts: bool,
) -> BatchConfig {
    let output_ext = args
        .output_ext
        .clone()
        .or_else(|| default_output_ext.map(str::to_string))
        .unwrap_or_else(|| args.ext.clone());

    let policy = if args.force {
        SkipPolicy::Overwrite
    } else if args.retry_failures {
        SkipPolicy::RetryFailures
    } else {
        SkipPolicy::Existing
    };

    let mut config = BatchConfig::new(&args.input, &args.ext)
        .with_output_extension(output_ext)
        .overwrite_table(args.overwrite_table)
        .save_artifacts(save_artifacts)
        .parallelism(args.jobs)
        .skip_policy(policy)
        .show_progress(!args.quiet);

    if let Some(dir) = &args.output {
        config = config.with_output(dir);
    }
    if let Some(dir) = &args.failures {
        config = config.with_failures(dir);
    }
    if let Some(table) = &args.table {
        config = config.with_table(table);
    }
    config
}

/// 运行一次批处理（或预演）并输出汇总
pub fn execute_batch(
    title: &str,
    args: &BatchArgs,
    config: BatchConfig,
    processor: Box<dyn Processor>,
) -> Result<()> {
    output::print_header(title);

    let mut engine = BatchEngine::new(config, processor);

    if args.dry_run {
        let plan = engine.plan()?;
        print_plan(&plan);
        return Ok(());
    }

    let summary = engine.run()?;
    print_summary(&summary);
    if !summary.rows.is_empty() {
        if let Ok(paths) = engine.config().resolve() {
            output::print_success(&format!(
                "Results written to '{}'",
                paths.table_out.display()
            ));
        }
    }
    Ok(())
}

fn print_plan(plan: &BatchPlan) {
    output::print_info(&format!("Input:    {}", plan.paths.root_in.display()));
    output::print_info(&format!("Output:   {}", plan.paths.root_out.display()));
    output::print_info(&format!("Failures: {}", plan.paths.failure_out.display()));

    let action = match plan.table {
        TableAction::Create => "create",
        TableAction::Append => "append to",
        TableAction::Overwrite => "overwrite",
    };
    output::print_info(&format!(
        "Would {} table '{}'",
        action,
        plan.paths.table_out.display()
    ));

    output::print_separator();
    for item in plan.pending.iter().take(MAX_LISTED_PENDING) {
        println!("  {}", item.display_name);
    }
    if plan.pending.len() > MAX_LISTED_PENDING {
        println!("  ... and {} more", plan.pending.len() - MAX_LISTED_PENDING);
    }
    output::print_separator();

    output::print_done(&format!(
        "{} image(s) found: {} to process, {} to skip (dry run, nothing written)",
        plan.total(),
        plan.pending.len(),
        plan.skipped
    ));
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn print_summary(summary: &BatchSummary) {
    if summary.discovered == 0 {
        output::print_warning("No matching images found.");
        return;
    }
    output::print_info(&format!("{} matching image(s) found", summary.discovered));

    if summary.skipped > 0 {
        output::print_skip(&format!(
            "{} image(s) already processed",
            summary.skipped
        ));
    }
    if summary.degraded > 0 {
        output::print_warning(&format!(
            "{} image(s) had failed stages and were written to the failure directory",
            summary.degraded
        ));
    }

    if !summary.failures.is_empty() {
        let rows: Vec<FailureRow> = summary
            .failures
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|(image, reason)| FailureRow {
                image: image.clone(),
                reason: reason.clone(),
            })
            .collect();

        output::print_warning(&format!("{} image(s) failed:", summary.failed));
        println!("{}", Table::new(&rows));
        if summary.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more (run with -v for details)",
                summary.failures.len() - MAX_LISTED_FAILURES
            );
        }
    }

    output::print_done(&format!(
        "{} processed ({} degraded), {} skipped, {} failed, {} row(s) written",
        summary.succeeded,
        summary.degraded,
        summary.skipped,
        summary.failed,
        summary.rows.len()
    ));
}
