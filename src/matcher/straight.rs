// 该文件是 SmmTrack 项目的一部分。
// src/matcher/straight.rs - 逐帧直接匹配
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
  geometry::{CenterBox, GeometryError, nearest_box},
  matcher::{ChildIdentity, MatcherConfig},
  skeleton::Skeleton,
};

/// 直接匹配在帧之间传递的状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StraightState {
  /// 最近一次被接受的儿童框
  pub previous_child: Option<CenterBox>,
}

/// 从一帧的儿童检测中选出候选框
///
/// 只有一个时直接使用；有多个且存在上一次接受的儿童框时，取与其 IoU 最大者；
/// 否则取置信度最高者。并列时取第一个。
pub fn select_child<'a>(
  children: &[&'a Detection],
  previous: Option<&CenterBox>,
) -> Result<Option<&'a Detection>, GeometryError> {
  match (children, previous) {
    ([], _) => Ok(None),
    ([only], _) => Ok(Some(*only)),
    (_, Some(previous)) => {
      let boxes: Vec<CenterBox> = children.iter().map(|d| d.bbox).collect();
      Ok(nearest_box(previous, &boxes)?.map(|(index, _)| children[index]))
    }
    (_, None) => {
      let mut best = children[0];
      for &candidate in &children[1..] {
        if candidate.confidence > best.confidence {
          best = candidate;
        }
      }
      Ok(Some(best))
    }
  }
}

/// 直接匹配的单步：处理一帧，返回新的状态与该帧的身份
pub fn straight_step(
  config: &MatcherConfig,
  state: StraightState,
  detections: &[Detection],
  tracks: &[CenterBox],
) -> Result<(StraightState, ChildIdentity), GeometryError> {
  let children: Vec<&Detection> = detections.iter().filter(|d| d.is_child()).collect();
  let Some(candidate) = select_child(&children, state.previous_child.as_ref())? else {
    return Ok((state, ChildIdentity::default()));
  };

  let Some((track_id, track_iou)) = nearest_box(&candidate.bbox, tracks)? else {
    return Ok((state, ChildIdentity::default()));
  };

  if track_iou < config.iou_threshold {
    debug!("候选儿童框与最近轨迹 {} 的 IoU {:.4} 低于阈值", track_id, track_iou);
    return Ok((state, ChildIdentity::default()));
  }

  let identity = ChildIdentity {
    track_id: Some(track_id),
    confidence: candidate.confidence,
    bbox: Some(candidate.bbox),
    interpolated: false,
  };
  let state = StraightState {
    previous_child: Some(candidate.bbox),
  };
  Ok((state, identity))
}

/// 对整段视频做直接匹配
///
/// 以 `StraightState` 为累加器从左到右折叠，每帧独立求解，
/// 只有在同一帧出现多个儿童检测时才参考上一次接受的儿童框。
pub fn straight_match(
  config: &MatcherConfig,
  skeleton: &Skeleton,
  detections: &DetectionStream,
) -> Result<Vec<ChildIdentity>, GeometryError> {
  let frames = skeleton.frames();
  let mut identities = Vec::with_capacity(frames);
  (0..frames).try_fold(StraightState::default(), |state, frame| {
    let tracks = skeleton.track_boxes(frame, config.epsilon);
    let (state, identity) = straight_step(config, state, detections.frame(frame), &tracks)?;
    if let Some(track_id) = identity.track_id {
      debug!("帧 {}: 直接匹配轨迹 {}", frame, track_id);
    }
    identities.push(identity);
    Ok::<_, GeometryError>(state)
  })?;
  Ok(identities)
}
