// 该文件是 SmmTrack 项目的一部分。
// src/skeleton.rs - 骨架轨迹数据
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

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{CenterBox, bounding_box};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SkeletonError {
  #[error("骨架形状不匹配: {what} 期望 {expected}, 实际 {actual}")]
  Shape {
    what: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("骨架不含任何轨迹，需要给出 frame_count")]
  UnknownFrames,
  #[error("帧范围越界: {start}..{end}, 总帧数 {frames}")]
  FrameRange {
    start: usize,
    end: usize,
    frames: usize,
  },
}

/// 骨架的嵌套数组形式，`keypoint[M][T][J][2]` 与 `keypoint_score[M][T][J]`
///
/// 没有轨迹时帧数无法从数组得到，由 `frame_count` 给出。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonDocument {
  pub keypoint: Vec<Vec<Vec<[f32; 2]>>>,
  pub keypoint_score: Vec<Vec<Vec<f32>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub frame_count: Option<usize>,
}

/// 多人骨架轨迹，形状为 `(M, T, J)`
///
/// 同一轨迹下标在不同帧之间不保证对应同一个人。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SkeletonDocument", into = "SkeletonDocument")]
pub struct Skeleton {
  tracks: usize,
  frames: usize,
  joints: usize,
  keypoints: Vec<[f32; 2]>,
  scores: Vec<f32>,
}

impl Skeleton {
  pub fn new(
    tracks: usize,
    frames: usize,
    joints: usize,
    keypoints: Vec<[f32; 2]>,
    scores: Vec<f32>,
  ) -> Result<Self, SkeletonError> {
    let expected = tracks * frames * joints;
    if keypoints.len() != expected {
      return Err(SkeletonError::Shape {
        what: "keypoint",
        expected,
        actual: keypoints.len(),
      });
    }
    if scores.len() != expected {
      return Err(SkeletonError::Shape {
        what: "keypoint_score",
        expected,
        actual: scores.len(),
      });
    }
    Ok(Self {
      tracks,
      frames,
      joints,
      keypoints,
      scores,
    })
  }

  /// `(M, T, J)`
  pub fn shape(&self) -> (usize, usize, usize) {
    (self.tracks, self.frames, self.joints)
  }

  pub fn tracks(&self) -> usize {
    self.tracks
  }

  pub fn frames(&self) -> usize {
    self.frames
  }

  pub fn joints(&self) -> usize {
    self.joints
  }

  fn offset(&self, track: usize, frame: usize) -> usize {
    (track * self.frames + frame) * self.joints
  }

  /// 第 `track` 条轨迹在第 `frame` 帧的关键点和对应置信度
  pub fn pose(&self, track: usize, frame: usize) -> (&[[f32; 2]], &[f32]) {
    let start = self.offset(track, frame);
    let end = start + self.joints;
    (&self.keypoints[start..end], &self.scores[start..end])
  }

  /// 第 `frame` 帧中每条轨迹的外接框，下标即轨迹编号
  pub fn track_boxes(&self, frame: usize, epsilon: f32) -> Vec<CenterBox> {
    (0..self.tracks)
      .map(|track| {
        let (points, scores) = self.pose(track, frame);
        bounding_box(points, scores, epsilon)
      })
      .collect()
  }

  /// 截取 `[start, end)` 帧，保留全部轨迹
  pub fn slice_frames(&self, range: Range<usize>) -> Result<Self, SkeletonError> {
    if range.start > range.end || range.end > self.frames {
      return Err(SkeletonError::FrameRange {
        start: range.start,
        end: range.end,
        frames: self.frames,
      });
    }
    let frames = range.end - range.start;
    let mut keypoints = Vec::with_capacity(self.tracks * frames * self.joints);
    let mut scores = Vec::with_capacity(self.tracks * frames * self.joints);
    for track in 0..self.tracks {
      let start = self.offset(track, range.start);
      let end = self.offset(track, range.end);
      keypoints.extend_from_slice(&self.keypoints[start..end]);
      scores.extend_from_slice(&self.scores[start..end]);
    }
    Self::new(self.tracks, frames, self.joints, keypoints, scores)
  }
}

impl TryFrom<SkeletonDocument> for Skeleton {
  type Error = SkeletonError;

  fn try_from(document: SkeletonDocument) -> Result<Self, Self::Error> {
    let tracks = document.keypoint.len();
    if document.keypoint_score.len() != tracks {
      return Err(SkeletonError::Shape {
        what: "keypoint_score tracks",
        expected: tracks,
        actual: document.keypoint_score.len(),
      });
    }
    let frames = match (document.keypoint.first(), document.frame_count) {
      (Some(track), _) => track.len(),
      (None, Some(frame_count)) => frame_count,
      (None, None) => return Err(SkeletonError::UnknownFrames),
    };
    if let Some(frame_count) = document.frame_count {
      check_len("frame_count", frames, frame_count)?;
    }
    let joints = document
      .keypoint
      .first()
      .and_then(|track| track.first())
      .map(Vec::len)
      .unwrap_or(0);

    let mut keypoints = Vec::with_capacity(tracks * frames * joints);
    let mut scores = Vec::with_capacity(tracks * frames * joints);
    for (track_points, track_scores) in document.keypoint.into_iter().zip(document.keypoint_score) {
      check_len("keypoint frames", frames, track_points.len())?;
      check_len("keypoint_score frames", frames, track_scores.len())?;
      for (frame_points, frame_scores) in track_points.into_iter().zip(track_scores) {
        check_len("keypoint joints", joints, frame_points.len())?;
        check_len("keypoint_score joints", joints, frame_scores.len())?;
        keypoints.extend(frame_points);
        scores.extend(frame_scores);
      }
    }

    Self::new(tracks, frames, joints, keypoints, scores)
  }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), SkeletonError> {
  if expected != actual {
    return Err(SkeletonError::Shape {
      what,
      expected,
      actual,
    });
  }
  Ok(())
}

impl From<Skeleton> for SkeletonDocument {
  fn from(skeleton: Skeleton) -> Self {
    let mut keypoint = Vec::with_capacity(skeleton.tracks);
    let mut keypoint_score = Vec::with_capacity(skeleton.tracks);
    for track in 0..skeleton.tracks {
      let mut track_points = Vec::with_capacity(skeleton.frames);
      let mut track_scores = Vec::with_capacity(skeleton.frames);
      for frame in 0..skeleton.frames {
        let (points, scores) = skeleton.pose(track, frame);
        track_points.push(points.to_vec());
        track_scores.push(scores.to_vec());
      }
      keypoint.push(track_points);
      keypoint_score.push(track_scores);
    }
    SkeletonDocument {
      keypoint,
      keypoint_score,
      frame_count: (skeleton.tracks == 0).then_some(skeleton.frames),
    }
  }
}
