// 该文件是 SmmTrack 项目的一部分。
// src/geometry.rs - 边界框几何计算
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
use thiserror::Error;

/// 关键点置信度过滤的默认阈值
pub const DEFAULT_EPSILON: f32 = 1e-4;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
  #[error("边界框角点倒置: ({x1}, {y1}) - ({x2}, {y2})")]
  Inverted { x1: f32, y1: f32, x2: f32, y2: f32 },
}

/// 中心点形式的边界框 `(xcenter, ycenter, width, height)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CenterBox {
  pub xcenter: f32,
  pub ycenter: f32,
  pub width: f32,
  pub height: f32,
}

/// 角点形式的边界框 `(x1, y1, x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl CenterBox {
  pub fn new(xcenter: f32, ycenter: f32, width: f32, height: f32) -> Self {
    Self {
      xcenter,
      ycenter,
      width,
      height,
    }
  }

  /// 转为角点形式。
  ///
  /// 半宽、半高按 `floor(w / 2)` 计算，奇数宽度的框比真实区域略小。
  /// 匹配阈值是在这一语义下标定的。
  pub fn to_corners(&self) -> CornerBox {
    let half_width = (self.width / 2.0).floor();
    let half_height = (self.height / 2.0).floor();
    CornerBox {
      x1: self.xcenter - half_width,
      y1: self.ycenter - half_height,
      x2: self.xcenter + half_width,
      y2: self.ycenter + half_height,
    }
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.xcenter, self.ycenter, self.width, self.height]
  }
}

impl From<[f32; 4]> for CenterBox {
  fn from(value: [f32; 4]) -> Self {
    CenterBox::new(value[0], value[1], value[2], value[3])
  }
}

impl CornerBox {
  pub fn validate(&self) -> Result<(), GeometryError> {
    if self.x1 > self.x2 || self.y1 > self.y2 {
      return Err(GeometryError::Inverted {
        x1: self.x1,
        y1: self.y1,
        x2: self.x2,
        y2: self.y2,
      });
    }
    Ok(())
  }

  pub fn area(&self) -> f32 {
    (self.x2 - self.x1) * (self.y2 - self.y1)
  }
}

/// 计算两个边界框的 IoU，结果位于 `[0, 1]`
///
/// 两框不相交时返回 `0.0`。并集面积为零（两个退化框）时，
/// 仅在两框完全重合时返回 `1.0`。
pub fn iou(a: &CenterBox, b: &CenterBox) -> Result<f32, GeometryError> {
  let a = a.to_corners();
  let b = b.to_corners();
  a.validate()?;
  b.validate()?;

  let x_left = a.x1.max(b.x1);
  let y_top = a.y1.max(b.y1);
  let x_right = a.x2.min(b.x2);
  let y_bottom = a.y2.min(b.y2);

  if x_right < x_left || y_bottom < y_top {
    return Ok(0.0);
  }

  let intersection = (x_right - x_left) * (y_bottom - y_top);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    Ok((intersection / union).clamp(0.0, 1.0))
  } else if a == b {
    Ok(1.0)
  } else {
    Ok(0.0)
  }
}

/// 计算姿态关键点的外接框，只统计置信度大于 `epsilon` 的关键点。
///
/// 某个坐标轴上没有任何关键点留下时，该轴退化为 `0` 处的单点，
/// 得到宽或高为零的退化框，调用方需要能够处理这种框。
pub fn bounding_box(points: &[[f32; 2]], scores: &[f32], epsilon: f32) -> CenterBox {
  let (xs, ys): (Vec<f32>, Vec<f32>) = points
    .iter()
    .zip(scores)
    .filter(|(_, score)| **score > epsilon)
    .map(|(point, _)| (point[0], point[1]))
    .unzip();

  let (min_x, max_x) = extent(&xs);
  let (min_y, max_y) = extent(&ys);
  let width = max_x - min_x;
  let height = max_y - min_y;

  CenterBox::new(min_x + width / 2.0, min_y + height / 2.0, width, height)
}

fn extent(values: &[f32]) -> (f32, f32) {
  if values.is_empty() {
    return (0.0, 0.0);
  }
  values
    .iter()
    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
      (lo.min(v), hi.max(v))
    })
}

/// 在候选框中找到与参考框 IoU 最大的一个，返回 `(下标, IoU)`。
///
/// 多个候选 IoU 相同时取第一个；候选为空时返回 `None`。
pub fn nearest_box(
  reference: &CenterBox,
  candidates: &[CenterBox],
) -> Result<Option<(usize, f32)>, GeometryError> {
  let mut best: Option<(usize, f32)> = None;
  for (index, candidate) in candidates.iter().enumerate() {
    let value = iou(reference, candidate)?;
    match best {
      Some((_, best_iou)) if value <= best_iou => {}
      _ => best = Some((index, value)),
    }
  }
  Ok(best)
}
