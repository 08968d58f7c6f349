// 该文件是 SmmTrack 项目的一部分。
// src/detection.rs - 人物检测结果定义
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

use crate::geometry::CenterBox;

/// 检测类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionClass {
  Adult,
  Child,
}

/// 单个人物检测结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class: DetectionClass,
  pub confidence: f32,
  #[serde(flatten)]
  pub bbox: CenterBox,
}

impl Detection {
  pub fn child(confidence: f32, bbox: CenterBox) -> Self {
    Self {
      class: DetectionClass::Child,
      confidence,
      bbox,
    }
  }

  pub fn adult(confidence: f32, bbox: CenterBox) -> Self {
    Self {
      class: DetectionClass::Adult,
      confidence,
      bbox,
    }
  }

  pub fn is_child(&self) -> bool {
    self.class == DetectionClass::Child
  }

  pub fn is_adult(&self) -> bool {
    self.class == DetectionClass::Adult
  }
}

/// 逐帧检测流，第 `i` 个元素是第 `i` 帧中的全部检测
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionStream {
  frames: Vec<Vec<Detection>>,
}

impl DetectionStream {
  pub fn new(frames: Vec<Vec<Detection>>) -> Self {
    Self { frames }
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  /// 取第 `index` 帧的检测；超出检测流长度的帧视为没有检测。
  pub fn frame(&self, index: usize) -> &[Detection] {
    self.frames.get(index).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn children(&self, index: usize) -> impl Iterator<Item = &Detection> {
    self.frame(index).iter().filter(|d| d.is_child())
  }

  pub fn adults(&self, index: usize) -> impl Iterator<Item = &Detection> {
    self.frame(index).iter().filter(|d| d.is_adult())
  }
}

impl From<Vec<Vec<Detection>>> for DetectionStream {
  fn from(frames: Vec<Vec<Detection>>) -> Self {
    Self::new(frames)
  }
}
