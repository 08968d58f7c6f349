// 该文件是 SmmTrack 项目的一部分。
// src/conclusion.rs - 单视频结论统计
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

use serde::{Deserialize, Serialize};

use crate::{aggregator::Segment, matcher::ChildAnnotation};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
  pub fps: f64,
  pub length_seconds: f64,
  pub frame_count: usize,
  pub valid_frames: usize,
  pub last_valid_frame: Option<usize>,
}

impl VideoProperties {
  /// 以标注帧数作为视频帧数
  pub fn from_annotation(fps: f64, annotation: &ChildAnnotation) -> Self {
    let frame_count = annotation.len();
    Self {
      fps,
      length_seconds: if fps > 0.0 { frame_count as f64 / fps } else { 0.0 },
      frame_count,
      valid_frames: annotation.valid_frames(),
      last_valid_frame: annotation.last_valid_frame(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conclusion {
  pub video: String,
  pub smm_length_minute: f64,
  pub smm_proportion: f64,
  pub smm_count: usize,
  pub fps: f64,
  pub video_length_minute: f64,
  pub video_frame_count: usize,
  pub valid_frames: usize,
  pub last_valid_frame: Option<usize>,
  pub smm_per_minute: f64,
  pub assessment: String,
}

/// 视频名去掉最后两个 `_` 字段
pub fn assessment(video: &str) -> String {
  let fields: Vec<&str> = video.split('_').collect();
  fields[..fields.len().saturating_sub(2)].join("_")
}

/// 汇总刻板动作片段，没有刻板动作时返回 `None`
pub fn conclude(segments: &[Segment], video: &str, properties: &VideoProperties) -> Option<Conclusion> {
  let stereotypical: Vec<&Segment> = segments.iter().filter(|s| s.is_stereotypical()).collect();
  if stereotypical.is_empty() {
    return None;
  }

  let frames: usize = stereotypical.iter().map(|s| s.frames()).sum();
  let smm_count = stereotypical.len();
  let video_length_minute = properties.length_seconds / 60.0;
  let ratio = |numerator: f64, denominator: f64| {
    if denominator > 0.0 {
      numerator / denominator
    } else {
      0.0
    }
  };

  Some(Conclusion {
    video: video.to_string(),
    smm_length_minute: ratio(frames as f64, properties.fps * 60.0),
    smm_proportion: ratio(frames as f64, properties.valid_frames as f64),
    smm_count,
    fps: properties.fps,
    video_length_minute,
    video_frame_count: properties.frame_count,
    valid_frames: properties.valid_frames,
    last_valid_frame: properties.last_valid_frame,
    smm_per_minute: ratio(smm_count as f64, video_length_minute),
    assessment: assessment(video),
  })
}
