// 该文件是 SmmTrack 项目的一部分。
// src/input.rs - JSON 文件输入
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
  io::BufReader,
  marker::PhantomData,
  path::{Path, PathBuf},
};

use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, aggregator::Window, url_to_path};

#[derive(Error, Debug)]
pub enum JsonFileInputError {
  #[error("URI 方案不匹配: 期望 json, 实际 {0}")]
  SchemeMismatch(String),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
  #[error("读取 {path} 失败: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("解析 {path} 失败: {source}")]
  Json {
    path: PathBuf,
    source: serde_json::Error,
  },
}

/// 以 `json:` URL 指定的 JSON 文档
#[derive(Debug, Clone)]
pub struct JsonFileInput<T> {
  path: PathBuf,
  _document: PhantomData<fn() -> T>,
}

impl<T> FromUrlWithScheme for JsonFileInput<T> {
  const SCHEME: &'static str = "json";
}

impl<T> FromUrl for JsonFileInput<T> {
  type Error = JsonFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonFileInputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(Self::new(url_to_path(url)?))
  }
}

impl<T> JsonFileInput<T> {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      _document: PhantomData,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<T: DeserializeOwned> JsonFileInput<T> {
  pub fn load(&self) -> Result<T, JsonFileInputError> {
    debug!("读取 {}", self.path.display());
    let file = File::open(&self.path).map_err(|source| JsonFileInputError::Io {
      path: self.path.clone(),
      source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| JsonFileInputError::Json {
      path: self.path.clone(),
      source,
    })
  }
}

/// 分类器分数文件
///
/// 既可以是已经带有帧区间的窗口列表，也可以是与切分窗口一一对应的正类分数，
/// 或者每个窗口的二分类概率 `[负类, 正类]`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScoreDocument {
  Windows(Vec<Window>),
  Positive(Vec<f64>),
  Probabilities(Vec<[f64; 2]>),
}

impl ScoreDocument {
  pub fn len(&self) -> usize {
    match self {
      ScoreDocument::Windows(windows) => windows.len(),
      ScoreDocument::Positive(scores) => scores.len(),
      ScoreDocument::Probabilities(pairs) => pairs.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 不带区间的正类分数；窗口列表返回 `None`
  pub fn positive_scores(&self) -> Option<Vec<f64>> {
    match self {
      ScoreDocument::Windows(_) => None,
      ScoreDocument::Positive(scores) => Some(scores.clone()),
      ScoreDocument::Probabilities(pairs) => Some(pairs.iter().map(|p| p[1]).collect()),
    }
  }
}
