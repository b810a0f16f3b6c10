//! # 结果行与表结构
//!
//! 结果表的每一行是有序的 `(列名, 值)` 序列；表结构（列名及顺序）在创建时固定。
//!
//! ## 依赖关系
//! - 被 `adapters/` 用于构造结果
//! - 被 `batch/table.rs` 用于校验与写入

use std::fmt;

/// 分割结果的列
pub const SEGMENT_COLUMNS: [&str; 5] = [
    "Timestamp",
    "ImageName",
    "Length",
    "ObjectCount",
    "MeanDiameter",
];

/// 按直径分级时的分割结果列
pub const SEGMENT_BINNED_COLUMNS: [&str; 4] = ["Timestamp", "ImageName", "DiameterClass", "Length"];

/// 网格 / 交叉计数结果列
pub const GRID_COLUMNS: [&str; 4] = ["ImageName", "GridSizePixels", "CrossingCount", "LengthPixels"];

/// 预处理 / 质量筛选结果列
pub const STAGE_COLUMNS: [&str; 5] = ["Timestamp", "ImageName", "Applied", "Disabled", "Failed"];

/// 单元格值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    /// 留空（例如待人工填写的交叉计数）
    Empty,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{:.4}", x),
            FieldValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<usize> for FieldValue {
    fn from(i: usize) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

/// 命名字段
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// 结果表中的一行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    fields: Vec<Field>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个字段（构建器风格）
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 按名称查找字段值
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// 各字段的文本形式（按列顺序）
    pub fn to_record(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.value.to_string()).collect()
    }

    /// 去掉某个字段后的副本（用于忽略时间戳的比较）
    #[cfg(test)]
    pub fn without(&self, name: &str) -> ResultRow {
        ResultRow {
            fields: self
                .fields
                .iter()
                .filter(|f| f.name != name)
                .cloned()
                .collect(),
        }
    }
}

/// 结果表结构：固定的有序列名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<String>,
}

impl TableSchema {
    pub fn new(columns: &[&str]) -> Self {
        TableSchema {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 表头是否与结构完全一致（数量、名称、顺序）
    pub fn matches_header<S: AsRef<str>>(&self, header: &[S]) -> bool {
        header.len() == self.columns.len()
            && header
                .iter()
                .zip(&self.columns)
                .all(|(h, c)| h.as_ref() == c)
    }

    /// 行的字段名是否与结构一致
    pub fn accepts(&self, row: &ResultRow) -> bool {
        let names: Vec<&str> = row.fields().iter().map(|f| f.name.as_str()).collect();
        self.matches_header(&names)
    }

    /// 逗号连接的列名（用于错误信息）
    pub fn describe(&self) -> String {
        self.columns.join(", ")
    }
}
