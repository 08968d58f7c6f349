// 该文件是 SmmTrack 项目的一部分。
// src/output/csv_table.rs - CSV 表格输出
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  aggregator::Segment,
  conclusion::Conclusion,
  matcher::ChildAnnotation,
  output::{Export, ToTable, create_parent},
  url_to_path,
};

#[derive(Error, Debug)]
pub enum CsvTableOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone)]
pub struct CsvTableOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for CsvTableOutput {
  const SCHEME: &'static str = "csv";
}

impl FromUrl for CsvTableOutput {
  type Error = CsvTableOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(CsvTableOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    Ok(Self::new(url_to_path(uri)?))
  }
}

impl CsvTableOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<T: ToTable + ?Sized> Export<T> for CsvTableOutput {
  type Error = CsvTableOutputError;

  fn export(&self, value: &T) -> Result<(), Self::Error> {
    let rows = value.rows();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(value.header().join(","));
    for row in &rows {
      let fields: Vec<String> = row.iter().map(|field| escape(field)).collect();
      lines.push(fields.join(","));
    }
    create_parent(&self.path)?;
    std::fs::write(&self.path, lines.join("\n") + "\n")?;
    info!("写入 {} 行到 {}", rows.len(), self.path.display());
    Ok(())
  }
}

fn escape(field: &str) -> String {
  if field.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

fn optional<T: ToString>(value: Option<T>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

impl ToTable for [Segment] {
  fn header(&self) -> Vec<&'static str> {
    vec![
      "video",
      "video_full_name",
      "video_path",
      "start_time",
      "end_time",
      "start_frame",
      "end_frame",
      "movement",
      "calc_date",
      "source",
      "score",
    ]
  }

  fn rows(&self) -> Vec<Vec<String>> {
    self
      .iter()
      .map(|s| {
        vec![
          s.meta.video.clone(),
          s.meta.video_full_name.clone(),
          s.meta.video_path.clone(),
          format!("{:.4}", s.start_time),
          format!("{:.4}", s.end_time),
          s.start_frame.to_string(),
          s.end_frame.to_string(),
          s.movement.to_string(),
          s.calc_date.to_rfc3339(),
          s.meta.source.clone(),
          format!("{:.4}", s.score),
        ]
      })
      .collect()
  }
}

impl ToTable for [Conclusion] {
  fn header(&self) -> Vec<&'static str> {
    vec![
      "video",
      "smm_length_minute",
      "smm_proportion",
      "smm_count",
      "fps",
      "video_length_minute",
      "video_frame_count",
      "valid_frames",
      "last_valid_frame",
      "smm/min",
      "assessment",
    ]
  }

  fn rows(&self) -> Vec<Vec<String>> {
    self
      .iter()
      .map(|c| {
        vec![
          c.video.clone(),
          format!("{:.4}", c.smm_length_minute),
          format!("{:.4}", c.smm_proportion),
          c.smm_count.to_string(),
          c.fps.to_string(),
          format!("{:.4}", c.video_length_minute),
          c.video_frame_count.to_string(),
          c.valid_frames.to_string(),
          optional(c.last_valid_frame),
          format!("{:.4}", c.smm_per_minute),
          c.assessment.clone(),
        ]
      })
      .collect()
  }
}

impl ToTable for ChildAnnotation {
  fn header(&self) -> Vec<&'static str> {
    vec![
      "frame",
      "child_id",
      "child_detected",
      "xcenter",
      "ycenter",
      "width",
      "height",
      "interpolated",
    ]
  }

  fn rows(&self) -> Vec<Vec<String>> {
    self
      .iter()
      .enumerate()
      .map(|(frame, identity)| {
        let bbox = identity.bbox.map(|b| b.to_array());
        let coordinate = |i: usize| optional(bbox.map(|b| format!("{:.4}", b[i])));
        vec![
          frame.to_string(),
          identity.track_id.map_or("-1".to_string(), |id| id.to_string()),
          format!("{:.4}", identity.confidence),
          coordinate(0),
          coordinate(1),
          coordinate(2),
          coordinate(3),
          identity.interpolated.to_string(),
        ]
      })
      .collect()
  }
}
