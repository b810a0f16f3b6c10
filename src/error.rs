//! # 统一错误处理模块
//!
//! 定义 rootbatch 的所有错误类型，使用 `thiserror` 派生。
//!
//! 致命错误（参数文件无效、结果表结构不兼容）在任何图像处理之前终止运行；
//! 单个图像的错误在适配器边界被转换为 `Failed` 结果，不会向上传播。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// rootbatch 统一错误类型
#[derive(Error, Debug)]
pub enum BatchError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid parameter file {path}\nReason: {reason}")]
    ConfigError { path: String, reason: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    // ─────────────────────────────────────────────────────────────
    // 结果表错误
    // ─────────────────────────────────────────────────────────────
    #[error(
        "Cannot append to existing data table {path}: expected columns [{expected}], found [{found}]. Use a new table name or --overwrite-table"
    )]
    SchemaMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 图像错误
    // ─────────────────────────────────────────────────────────────
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unexpected image shape: {0}")]
    ImageShape(String),

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, BatchError>;
