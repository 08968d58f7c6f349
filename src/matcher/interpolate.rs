// 该文件是 SmmTrack 项目的一部分。
// src/matcher/interpolate.rs - 缺失帧插值匹配
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

use tracing::debug;

use crate::{
  detection::{Detection, DetectionStream},
  geometry::{CenterBox, GeometryError, iou, nearest_box},
  matcher::{ChildIdentity, MatcherConfig},
  skeleton::Skeleton,
};

/// 每帧前后最近的锚点帧
///
/// 锚点帧是直接匹配置信度大于阈值的帧。锚点帧自身的前后锚点即为自己。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorIndex {
  prev: Vec<Option<usize>>,
  next: Vec<Option<usize>>,
}

impl AnchorIndex {
  /// 正反两次线性扫描建立索引
  pub fn scan(identities: &[ChildIdentity], confidence_threshold: f32) -> Self {
    let is_anchor = |i: usize| identities[i].confidence > confidence_threshold;

    let mut prev = Vec::with_capacity(identities.len());
    let mut last = None;
    for i in 0..identities.len() {
      if is_anchor(i) {
        last = Some(i);
      }
      prev.push(last);
    }

    let mut next = vec![None; identities.len()];
    let mut last = None;
    for i in (0..identities.len()).rev() {
      if is_anchor(i) {
        last = Some(i);
      }
      next[i] = last;
    }

    Self { prev, next }
  }

  pub fn prev(&self, frame: usize) -> Option<usize> {
    self.prev.get(frame).copied().flatten()
  }

  pub fn next(&self, frame: usize) -> Option<usize> {
    self.next.get(frame).copied().flatten()
  }

  /// 选择距 `frame` 最近且距离严格小于 `grace_distance` 的锚点。
  ///
  /// 前后距离相等时取后一个锚点。
  pub fn nearest(&self, frame: usize, grace_distance: usize) -> Option<usize> {
    let prev = self
      .prev(frame)
      .map(|j| (j, frame - j))
      .filter(|(_, d)| *d < grace_distance);
    let next = self
      .next(frame)
      .map(|j| (j, j - frame))
      .filter(|(_, d)| *d < grace_distance);
    match (prev, next) {
      (Some((p, dp)), Some((_, dn))) if dp < dn => Some(p),
      (_, Some((n, _))) => Some(n),
      (Some((p, _)), None) => Some(p),
      (None, None) => None,
    }
  }
}

/// 对单帧做插值匹配
///
/// 取锚点帧接受的儿童框，在本帧轨迹中寻找最近者；若有成人检测落在同一条轨迹上、
/// IoU 严格更高且其检测框与儿童框并不相似，则放弃本次插值。
pub fn interpolate_frame(
  config: &MatcherConfig,
  anchor_box: &CenterBox,
  current: &ChildIdentity,
  detections: &[Detection],
  tracks: &[CenterBox],
) -> Result<Option<ChildIdentity>, GeometryError> {
  let Some((candidate, candidate_iou)) = nearest_box(anchor_box, tracks)? else {
    return Ok(None);
  };
  if candidate_iou < config.iou_threshold {
    return Ok(None);
  }

  for adult in detections.iter().filter(|d| d.is_adult()) {
    let Some((rival, rival_iou)) = nearest_box(&adult.bbox, tracks)? else {
      continue;
    };
    if rival != candidate || rival_iou <= config.iou_threshold {
      continue;
    }
    if rival_iou > candidate_iou && iou(anchor_box, &adult.bbox)? <= config.similarity_threshold {
      debug!(
        "轨迹 {} 被成人检测占据 (IoU {:.4} > {:.4})，放弃插值",
        candidate, rival_iou, candidate_iou
      );
      return Ok(None);
    }
  }

  Ok(Some(ChildIdentity {
    track_id: Some(candidate),
    confidence: current.confidence,
    bbox: Some(*anchor_box),
    interpolated: true,
  }))
}

/// 对直接匹配置信度不超过阈值的帧做插值，返回补全的帧数
pub fn interpolate(
  config: &MatcherConfig,
  skeleton: &Skeleton,
  detections: &DetectionStream,
  identities: &mut [ChildIdentity],
) -> Result<usize, GeometryError> {
  let anchors = AnchorIndex::scan(identities, config.confidence_threshold);
  let mut filled = 0;

  for frame in 0..identities.len() {
    if identities[frame].confidence > config.confidence_threshold {
      continue;
    }
    let Some(anchor) = anchors.nearest(frame, config.grace_distance) else {
      continue;
    };
    // 锚点帧只会被跳过，不会被改写，其儿童框始终来自直接匹配
    let Some(anchor_box) = identities[anchor].bbox else {
      continue;
    };

    let tracks = skeleton.track_boxes(frame, config.epsilon);
    if let Some(identity) = interpolate_frame(
      config,
      &anchor_box,
      &identities[frame],
      detections.frame(frame),
      &tracks,
    )? {
      debug!(
        "帧 {}: 由锚点帧 {} 插值得到轨迹 {:?}",
        frame, anchor, identity.track_id
      );
      identities[frame] = identity;
      filled += 1;
    }
  }

  Ok(filled)
}
