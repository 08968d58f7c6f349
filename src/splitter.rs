// 该文件是 SmmTrack 项目的一部分。
// src/splitter.rs - 骨架滑动窗口切分
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
  aggregator::{AggregateError, SegmentMeta, Window},
  matcher::ChildAnnotation,
  skeleton::{Skeleton, SkeletonError},
};

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
  #[error("步长必须大于 0")]
  ZeroStep,
  #[error("标注帧数 {annotation} 与骨架帧数 {skeleton} 不一致")]
  AnnotationLength { annotation: usize, skeleton: usize },
  #[error("窗口下标 {index} 越界, 共 {count} 个窗口")]
  Index { index: usize, count: usize },
  #[error("骨架切片失败: {0}")]
  Skeleton(#[from] SkeletonError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
  pub sequence_length: usize,
  pub step_size: usize,
  /// 缺省为两倍步长
  pub min_length: Option<usize>,
}

impl Default for SplitterConfig {
  fn default() -> Self {
    Self {
      sequence_length: 200,
      step_size: 30,
      min_length: None,
    }
  }
}

impl SplitterConfig {
  pub fn min_length(&self) -> usize {
    self.min_length.unwrap_or(2 * self.step_size)
  }
}

/// 计算 `[start, end)` 形式的切分区间
///
/// 起点按步长从 0 递增直到 `max(T, T - L + step)`，终点截断到 `T`，
/// 长度不足 `min_length` 的区间被丢弃。
pub fn intervals(frames: usize, config: &SplitterConfig) -> Result<Vec<(usize, usize)>, SplitError> {
  if config.step_size == 0 {
    return Err(SplitError::ZeroStep);
  }
  let limit = frames.max((frames + config.step_size).saturating_sub(config.sequence_length));
  let min_length = config.min_length();
  Ok(
    (0..limit)
      .step_by(config.step_size)
      .map(|start| (start, (start + config.sequence_length).min(frames)))
      .filter(|&(start, end)| end.saturating_sub(start) >= min_length)
      .collect(),
  )
}

/// 一个切分窗口，作为分类器的输入样本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonWindow {
  pub frame_dir: String,
  pub segment_name: String,
  pub start: usize,
  pub end: usize,
  pub total_frames: usize,
  pub label: i32,
  #[serde(flatten)]
  pub skeleton: Skeleton,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub child_ids: Option<Vec<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub child_detected: Option<Vec<f32>>,
}

#[derive(Debug)]
pub struct Splitter<'a> {
  skeleton: &'a Skeleton,
  annotation: Option<&'a ChildAnnotation>,
  basename: String,
  intervals: Vec<(usize, usize)>,
}

impl<'a> Splitter<'a> {
  /// `name` 可以带扩展名，窗口命名时会去掉
  pub fn new(
    skeleton: &'a Skeleton,
    annotation: Option<&'a ChildAnnotation>,
    name: &str,
    config: &SplitterConfig,
  ) -> Result<Self, SplitError> {
    if let Some(annotation) = annotation {
      if annotation.len() != skeleton.frames() {
        return Err(SplitError::AnnotationLength {
          annotation: annotation.len(),
          skeleton: skeleton.frames(),
        });
      }
    }
    let basename = Path::new(name)
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_else(|| name.to_string());
    let intervals = intervals(skeleton.frames(), config)?;
    debug!("{} 切分为 {} 个窗口", basename, intervals.len());
    Ok(Self {
      skeleton,
      annotation,
      basename,
      intervals,
    })
  }

  pub fn intervals(&self) -> &[(usize, usize)] {
    &self.intervals
  }

  pub fn len(&self) -> usize {
    self.intervals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.intervals.is_empty()
  }

  pub fn window(&self, index: usize) -> Result<SkeletonWindow, SplitError> {
    let &(start, end) = self.intervals.get(index).ok_or(SplitError::Index {
      index,
      count: self.intervals.len(),
    })?;
    let skeleton = self.skeleton.slice_frames(start..end)?;
    let (child_ids, child_detected) = match self.annotation {
      Some(annotation) => (
        Some(annotation.child_ids()[start..end].to_vec()),
        Some(annotation.child_detected()[start..end].to_vec()),
      ),
      None => (None, None),
    };
    Ok(SkeletonWindow {
      frame_dir: format!("{}_{}", self.basename, index),
      segment_name: format!("{}_{}_{}", self.basename, start, end),
      start,
      end,
      total_frames: end - start,
      label: -1,
      skeleton,
      child_ids,
      child_detected,
    })
  }

  pub fn collect(&self) -> Result<Vec<SkeletonWindow>, SplitError> {
    (0..self.len()).map(|index| self.window(index)).collect()
  }
}

/// 将分类器给出的正类分数与切分区间配对
pub fn windows_from_scores(
  intervals: &[(usize, usize)],
  scores: &[f64],
  fps: f64,
  meta: &SegmentMeta,
) -> Result<Vec<Window>, AggregateError> {
  Window::from_intervals(intervals, scores, fps, meta)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    aggregator::{Aggregator, AggregatorConfig, Movement},
    conclusion::{VideoProperties, conclude},
    matcher::ChildIdentity,
  };

  fn skeleton(frames: usize) -> Skeleton {
    let keypoints = (0..frames).map(|f| [f as f32, 0.0]).collect();
    Skeleton::new(1, frames, 1, keypoints, vec![1.0; frames]).unwrap()
  }

  #[test]
  fn intervals_follow_sliding_window() {
    let config = SplitterConfig::default();
    let got = intervals(300, &config).unwrap();
    assert_eq!(got.first(), Some(&(0, 200)));
    assert_eq!(got.last(), Some(&(240, 300)));
    assert!(got.iter().all(|(s, e)| e - s >= 60));
    assert_eq!(got.len(), 9);
  }

  #[test]
  fn short_video_windows_are_truncated() {
    let config = SplitterConfig::default();
    assert_eq!(intervals(100, &config).unwrap(), vec![(0, 100), (30, 100)]);
    assert!(intervals(50, &config).unwrap().is_empty());
  }

  #[test]
  fn zero_step_is_rejected() {
    let config = SplitterConfig {
      step_size: 0,
      ..SplitterConfig::default()
    };
    assert_eq!(intervals(10, &config), Err(SplitError::ZeroStep));
  }

  #[test]
  fn windows_carry_names_and_slices() {
    let skeleton = skeleton(8);
    let annotation = ChildAnnotation::new(
      (0..8)
        .map(|f| ChildIdentity {
          track_id: (f % 2 == 0).then_some(0),
          confidence: f as f32 / 10.0,
          ..ChildIdentity::default()
        })
        .collect(),
    );
    let config = SplitterConfig {
      sequence_length: 4,
      step_size: 2,
      min_length: Some(3),
    };
    let splitter = Splitter::new(&skeleton, Some(&annotation), "kid_07.mp4", &config).unwrap();
    assert_eq!(splitter.intervals(), &[(0, 4), (2, 6), (4, 8)]);

    let window = splitter.window(1).unwrap();
    assert_eq!(window.frame_dir, "kid_07_1");
    assert_eq!(window.segment_name, "kid_07_2_6");
    assert_eq!(window.total_frames, 4);
    assert_eq!(window.skeleton.pose(0, 0).0, &[[2.0, 0.0]]);
    assert_eq!(window.child_ids, Some(vec![0, -1, 0, -1]));
    assert_eq!(splitter.collect().unwrap().len(), 3);
    assert!(splitter.window(3).is_err());
  }

  #[test]
  fn annotation_length_must_match() {
    let skeleton = skeleton(8);
    let annotation = ChildAnnotation::unmatched(5);
    let err = Splitter::new(&skeleton, Some(&annotation), "v", &SplitterConfig::default()).unwrap_err();
    assert_eq!(
      err,
      SplitError::AnnotationLength {
        annotation: 5,
        skeleton: 8
      }
    );
  }

  #[test]
  fn window_json_is_flat() {
    let skeleton = skeleton(4);
    let config = SplitterConfig {
      sequence_length: 4,
      step_size: 4,
      min_length: Some(1),
    };
    let splitter = Splitter::new(&skeleton, None, "v", &config).unwrap();
    let value = serde_json::to_value(splitter.window(0).unwrap()).unwrap();
    assert_eq!(value["label"], -1);
    assert_eq!(value["keypoint"][0].as_array().unwrap().len(), 4);
    assert!(value.get("child_ids").is_none());
  }

  #[test]
  fn bare_scores_on_sliding_windows_cover_video_once() {
    let intervals = intervals(300, &SplitterConfig::default()).unwrap();
    let mut scores = vec![0.9; intervals.len()];
    scores[1] = 0.1;
    let meta = SegmentMeta {
      video: "kid_ados_2024_01".to_string(),
      ..SegmentMeta::default()
    };
    let windows = windows_from_scores(&intervals, &scores, 30.0, &meta).unwrap();
    let segments = Aggregator::new(AggregatorConfig {
      allow_overlap: true,
      ..AggregatorConfig::default()
    })
    .aggregate(&windows)
    .unwrap();

    assert_eq!(segments.first().unwrap().start_frame, 0);
    assert_eq!(segments.last().unwrap().end_frame, 300);
    assert!(segments.iter().all(|s| s.start_frame < s.end_frame));
    for pair in segments.windows(2) {
      assert_eq!(pair[0].end_frame, pair[1].start_frame);
    }
    let labels: Vec<Movement> = segments.iter().map(|s| s.movement).collect();
    assert_eq!(labels, vec![Movement::Stereotypical, Movement::NoAction, Movement::Stereotypical]);

    let properties = VideoProperties {
      fps: 30.0,
      length_seconds: 10.0,
      frame_count: 300,
      valid_frames: 300,
      last_valid_frame: Some(299),
    };
    let conclusion = conclude(&segments, &meta.video, &properties).unwrap();
    assert!((conclusion.smm_proportion - 0.9).abs() < 1e-9);
  }
}
