// 该文件是 SmmTrack 项目的一部分。
// src/matcher.rs - 儿童骨架身份匹配
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

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  detection::DetectionStream,
  geometry::{CenterBox, DEFAULT_EPSILON, GeometryError},
  skeleton::Skeleton,
};

mod interpolate;
mod straight;

pub use self::interpolate::{AnchorIndex, interpolate, interpolate_frame};
pub use self::straight::{StraightState, select_child, straight_match, straight_step};

#[derive(Error, Debug, PartialEq)]
pub enum MatchError {
  #[error("长度不匹配: 骨架 {frames} 帧, 检测 {detections} 帧, 容差 {tolerance}")]
  LengthMismatch {
    detections: usize,
    frames: usize,
    tolerance: usize,
  },
  #[error("几何计算错误: {0}")]
  Geometry(#[from] GeometryError),
}

/// 匹配器配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
  /// 检测框与骨架框的最小 IoU
  pub iou_threshold: f32,
  /// 作为插值锚点所需的最小检测置信度
  pub confidence_threshold: f32,
  /// 插值允许的最大帧距离（严格小于）
  pub grace_distance: usize,
  /// 儿童框与成人框的相似度阈值，超过则视为同一目标
  pub similarity_threshold: f32,
  /// 检测流与骨架帧数允许的长度差
  pub tolerance: usize,
  /// 关键点置信度过滤阈值
  pub epsilon: f32,
}

impl Default for MatcherConfig {
  fn default() -> Self {
    Self {
      iou_threshold: 0.01,
      confidence_threshold: 0.1,
      grace_distance: 20,
      similarity_threshold: 0.85,
      tolerance: 100,
      epsilon: DEFAULT_EPSILON,
    }
  }
}

/// 单帧的儿童身份
///
/// `track_id` 为 `None` 表示该帧既没有直接匹配也没有插值匹配。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChildIdentity {
  pub track_id: Option<usize>,
  pub confidence: f32,
  pub bbox: Option<CenterBox>,
  pub interpolated: bool,
}

impl ChildIdentity {
  pub fn is_matched(&self) -> bool {
    self.track_id.is_some()
  }
}

/// 整段视频的逐帧儿童身份
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChildAnnotation {
  frames: Vec<ChildIdentity>,
}

impl ChildAnnotation {
  pub fn new(frames: Vec<ChildIdentity>) -> Self {
    Self { frames }
  }

  /// 全部未匹配的标注
  pub fn unmatched(frames: usize) -> Self {
    Self::new(vec![ChildIdentity::default(); frames])
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn get(&self, frame: usize) -> Option<&ChildIdentity> {
    self.frames.get(frame)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ChildIdentity> {
    self.frames.iter()
  }

  pub fn as_slice(&self) -> &[ChildIdentity] {
    &self.frames
  }

  /// 轨迹编号，未匹配帧为 `-1`
  pub fn child_ids(&self) -> Vec<i64> {
    self
      .frames
      .iter()
      .map(|f| f.track_id.map(|id| id as i64).unwrap_or(-1))
      .collect()
  }

  pub fn child_detected(&self) -> Vec<f32> {
    self.frames.iter().map(|f| f.confidence).collect()
  }

  pub fn child_bbox(&self) -> Vec<[f32; 4]> {
    self
      .frames
      .iter()
      .map(|f| f.bbox.map(|b| b.to_array()).unwrap_or([0.0; 4]))
      .collect()
  }

  /// 匹配到儿童的帧数
  pub fn valid_frames(&self) -> usize {
    self.frames.iter().filter(|f| f.is_matched()).count()
  }

  pub fn last_valid_frame(&self) -> Option<usize> {
    self.frames.iter().rposition(ChildIdentity::is_matched)
  }
}

/// 逐帧标注的数组形式，供下游按帧切分使用
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationArrays {
  pub child_ids: Vec<i64>,
  pub child_detected: Vec<f32>,
  pub child_bbox: Vec<[f32; 4]>,
}

impl AnnotationArrays {
  pub fn valid_frames(&self) -> usize {
    self.child_ids.iter().filter(|id| **id != -1).count()
  }

  pub fn last_valid_frame(&self) -> Option<usize> {
    self.child_ids.iter().rposition(|id| *id != -1)
  }
}

impl From<&ChildAnnotation> for AnnotationArrays {
  fn from(annotation: &ChildAnnotation) -> Self {
    Self {
      child_ids: annotation.child_ids(),
      child_detected: annotation.child_detected(),
      child_bbox: annotation.child_bbox(),
    }
  }
}

/// 从数组形式恢复标注，插值标记不保存在数组中，一律为 `false`
impl From<AnnotationArrays> for ChildAnnotation {
  fn from(arrays: AnnotationArrays) -> Self {
    let frames = arrays
      .child_ids
      .iter()
      .enumerate()
      .map(|(i, &id)| {
        let track_id = usize::try_from(id).ok();
        ChildIdentity {
          track_id,
          confidence: arrays.child_detected.get(i).copied().unwrap_or(0.0),
          bbox: track_id
            .and(arrays.child_bbox.get(i))
            .map(|b| CenterBox::from(*b)),
          interpolated: false,
        }
      })
      .collect();
    Self::new(frames)
  }
}

impl Serialize for ChildAnnotation {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    AnnotationArrays::from(self).serialize(serializer)
  }
}

/// 儿童骨架匹配器
#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletonMatcher {
  config: MatcherConfig,
}

impl SkeletonMatcher {
  pub fn new(config: MatcherConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &MatcherConfig {
    &self.config
  }

  /// 为每一帧确定儿童对应的骨架轨迹
  ///
  /// 先做逐帧直接匹配，再对未匹配或低置信度的帧做时间插值。
  /// 检测流与骨架帧数相差超过 `tolerance` 时直接报错。
  pub fn match_skeleton(
    &self,
    skeleton: &Skeleton,
    detections: &DetectionStream,
  ) -> Result<ChildAnnotation, MatchError> {
    let frames = skeleton.frames();
    let difference = detections.len().abs_diff(frames);
    if difference > self.config.tolerance {
      return Err(MatchError::LengthMismatch {
        detections: detections.len(),
        frames,
        tolerance: self.config.tolerance,
      });
    }
    if difference > 0 {
      warn!(
        "检测流长度 {} 与骨架帧数 {} 不一致，按帧号对齐",
        detections.len(),
        frames
      );
    }

    info!("直接匹配: {} 帧, {} 条轨迹", frames, skeleton.tracks());
    let mut identities = straight_match(&self.config, skeleton, detections)?;
    let straight = identities.iter().filter(|f| f.is_matched()).count();

    info!("插值匹配");
    let filled = interpolate(&self.config, skeleton, detections, &mut identities)?;

    info!(
      "匹配完成: 直接匹配 {} 帧, 插值补全 {} 帧, 共 {} 帧",
      straight, filled, frames
    );
    Ok(ChildAnnotation::new(identities))
  }
}
