// 该文件是 SmmTrack 项目的一部分。
// src/output/json_file.rs - JSON 文件输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Export, create_parent},
  url_to_path,
};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone)]
pub struct JsonFileOutput {
  path: PathBuf,
  pretty: bool,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  /// `?compact` 关闭缩进
  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    let pretty = !uri.query_pairs().any(|(k, _)| k == "compact");
    Ok(Self {
      path: url_to_path(uri)?,
      pretty,
    })
  }
}

impl JsonFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      pretty: true,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<T: Serialize + ?Sized> Export<T> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn export(&self, value: &T) -> Result<(), Self::Error> {
    create_parent(&self.path)?;
    let mut writer = BufWriter::new(File::create(&self.path)?);
    if self.pretty {
      serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
      serde_json::to_writer(&mut writer, value)?;
    }
    writer.flush()?;
    info!("写入 {}", self.path.display());
    Ok(())
  }
}
