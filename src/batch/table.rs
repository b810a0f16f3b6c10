//! # 结果表
//!
//! 只追加的分隔文本表，表头固定。
//!
//! ## 功能
//! - 新建时写入一次表头；追加前校验已有表头（列数、列名、顺序）
//! - 每个工作单元的所有行在一次加锁内写入，随后 flush + fsync
//! - 多个工作线程的追加串行化，不会交错
//! - 上次运行中断留下的半行会被截掉，只丢失那一行
//!
//! `.tsv` / `.txt` 使用制表符分隔，其余扩展名使用逗号。
//!
//! ## 依赖关系
//! - 被 `batch/engine.rs` 使用
//! - 使用 `csv` crate 读写

use crate::error::{BatchError, Result};
use crate::models::{ResultRow, TableSchema};

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// 根据扩展名选择分隔符
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    }
}

/// 结果表句柄（单写者）
pub struct ResultTable {
    path: PathBuf,
    schema: TableSchema,
    writer: Mutex<csv::Writer<File>>,
    rows_written: AtomicUsize,
}

impl ResultTable {
    /// 打开已有结果表（校验表头）或新建结果表
    pub fn open_or_create(path: &Path, schema: TableSchema, overwrite: bool) -> Result<Self> {
        let delimiter = delimiter_for(path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BatchError::CreateDirError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let existing_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let fresh = overwrite || existing_len == 0;

        if fresh {
            if path.exists() {
                info!(path = %path.display(), "overwriting data table");
            } else {
                info!(path = %path.display(), "creating data table");
            }
        } else {
            check_header(path, &schema, delimiter)?;
            info!(path = %path.display(), "appending to existing data table");
        }

        let file = if fresh {
            File::create(path)
        } else {
            OpenOptions::new().read(true).append(true).open(path)
        }
        .map_err(|e| BatchError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;

        if !fresh {
            drop_incomplete_line(&file, path)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_writer(file);

        if fresh {
            writer.write_record(schema.columns())?;
            sync(&mut writer, path)?;
        }

        Ok(ResultTable {
            path: path.to_path_buf(),
            schema,
            writer: Mutex::new(writer),
            rows_written: AtomicUsize::new(0),
        })
    }

    /// 本次运行写入的行数
    pub fn rows_written(&self) -> usize {
        self.rows_written.load(Ordering::Relaxed)
    }

    /// 追加一个工作单元的所有结果行，返回后数据已落盘
    pub fn append(&self, rows: &[ResultRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        if let Some(bad) = rows.iter().find(|r| !self.schema.accepts(r)) {
            return Err(BatchError::SchemaMismatch {
                path: self.path.display().to_string(),
                expected: self.schema.describe(),
                found: bad
                    .fields()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BatchError::Other("result table writer is poisoned".to_string()))?;

        for row in rows {
            writer.write_record(row.to_record())?;
        }
        sync(&mut writer, &self.path)?;

        self.rows_written.fetch_add(rows.len(), Ordering::Relaxed);
        Ok(())
    }

    /// 结束写入
    pub fn finish(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BatchError::Other("result table writer is poisoned".to_string()))?;
        sync(&mut writer, &self.path)
    }
}

/// 读取首行并与表结构比较
pub(crate) fn check_header(path: &Path, schema: &TableSchema, delimiter: u8) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut record = csv::StringRecord::new();
    let found: Vec<String> = if reader.read_record(&mut record)? {
        record.iter().map(|s| s.trim().to_string()).collect()
    } else {
        Vec::new()
    };

    if schema.matches_header(&found) {
        Ok(())
    } else {
        Err(BatchError::SchemaMismatch {
            path: path.display().to_string(),
            expected: schema.describe(),
            found: found.join(", "),
        })
    }
}

/// 如果文件末尾是一段未完成的行，截断到最后一个换行之后
///
/// 整个文件只有一行（表头）且缺少换行时，补上换行而不是截断。
fn drop_incomplete_line(file: &File, path: &Path) -> Result<()> {
    let write_err = |e| BatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };

    let mut handle = file;
    let len = handle.seek(SeekFrom::End(0)).map_err(write_err)?;
    let keep = match last_newline_end(handle, len).map_err(write_err)? {
        Some(end) => end,
        None if len > 0 => {
            handle.write_all(b"\n").map_err(write_err)?;
            return handle.sync_data().map_err(write_err);
        }
        None => return Ok(()),
    };

    if keep < len {
        warn!(
            path = %path.display(),
            bytes = len - keep,
            "data table ends with an incomplete line, dropping it"
        );
        handle.set_len(keep).map_err(write_err)?;
        handle.sync_data().map_err(write_err)?;
    }
    Ok(())
}

/// 最后一个换行符之后的偏移量（从文件末尾向前分块查找）
fn last_newline_end(mut handle: &File, len: u64) -> std::io::Result<Option<u64>> {
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        handle.seek(SeekFrom::Start(start))?;
        handle.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(Some(start + pos as u64 + 1));
        }
        end = start;
    }
    Ok(None)
}

fn sync(writer: &mut csv::Writer<File>, path: &Path) -> Result<()> {
    let write_err = |e| BatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };
    writer.flush().map_err(write_err)?;
    writer.get_ref().sync_data().map_err(write_err)
}
