// 该文件是 SmmTrack 项目的一部分。
// src/output.rs - 输出定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub trait Export<T: ?Sized> {
  type Error;
  fn export(&self, value: &T) -> Result<(), Self::Error>;
}

/// 可以写成表格的结果
pub trait ToTable {
  fn header(&self) -> Vec<&'static str>;
  fn rows(&self) -> Vec<Vec<String>>;
}

mod csv_table;
pub use self::csv_table::{CsvTableOutput, CsvTableOutputError};

mod json_file;
pub use self::json_file::{JsonFileOutput, JsonFileOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("CSV 表格输出错误: {0}")]
  CsvTableOutputError(#[from] CsvTableOutputError),
  #[error("JSON 文件输出错误: {0}")]
  JsonFileOutputError(#[from] JsonFileOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone)]
pub enum OutputWrapper {
  CsvTableOutput(CsvTableOutput),
  JsonFileOutput(JsonFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      CsvTableOutput::SCHEME => Ok(OutputWrapper::CsvTableOutput(CsvTableOutput::from_url(url)?)),
      JsonFileOutput::SCHEME => Ok(OutputWrapper::JsonFileOutput(JsonFileOutput::from_url(url)?)),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl OutputWrapper {
  pub fn path(&self) -> &Path {
    match self {
      OutputWrapper::CsvTableOutput(output) => output.path(),
      OutputWrapper::JsonFileOutput(output) => output.path(),
    }
  }
}

impl<T: ToTable + Serialize + ?Sized> Export<T> for OutputWrapper {
  type Error = OutputError;

  fn export(&self, value: &T) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::CsvTableOutput(output) => output.export(value).map_err(OutputError::from),
      OutputWrapper::JsonFileOutput(output) => output.export(value).map_err(OutputError::from),
    }
  }
}

fn create_parent(path: &Path) -> std::io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  Ok(())
}
