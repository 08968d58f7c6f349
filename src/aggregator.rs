// 该文件是 SmmTrack 项目的一部分。
// src/aggregator.rs - 刻板动作片段聚合
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

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq)]
pub enum AggregateError {
  #[error("窗口 {index} 起止倒置: {start} > {end}")]
  Inverted { index: usize, start: usize, end: usize },
  #[error("窗口 {index} 乱序: 起始帧 {start} 早于前一窗口起始帧 {previous}")]
  OutOfOrder {
    index: usize,
    previous: usize,
    start: usize,
  },
  #[error("窗口 {index} 与前一窗口重叠: 起始帧 {start} < 前一窗口结束帧 {previous_end}")]
  Overlap {
    index: usize,
    previous_end: usize,
    start: usize,
  },
  #[error("窗口 {index} 与前一窗口之间有空隙: 起始帧 {start} > 前一窗口结束帧 {previous_end}")]
  Gap {
    index: usize,
    previous_end: usize,
    start: usize,
  },
  #[error("一次聚合只能处理一个视频: 期望 {expected}, 实际 {found}")]
  MixedVideos { expected: String, found: String },
  #[error("窗口数量 {windows} 与分数数量 {scores} 不一致")]
  ScoreCount { windows: usize, scores: usize },
  #[error("无效的帧率: {0}")]
  InvalidFps(f64),
  #[error("聚合结果不连续: 片段 {index} 为 {start}..{end}, 前一片段结束于 {previous_end}")]
  Discontinuous {
    index: usize,
    previous_end: usize,
    start: usize,
    end: usize,
  },
}

/// 片段动作类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
  Stereotypical,
  NoAction,
}

impl Movement {
  /// 分数严格大于阈值时为刻板动作
  pub fn from_score(score: f64, threshold: f64) -> Self {
    if score > threshold {
      Movement::Stereotypical
    } else {
      Movement::NoAction
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Movement::Stereotypical => "Stereotypical",
      Movement::NoAction => "NoAction",
    }
  }
}

impl fmt::Display for Movement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 片段所属视频的描述信息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentMeta {
  pub video: String,
  #[serde(default)]
  pub video_full_name: String,
  #[serde(default)]
  pub video_path: String,
  #[serde(default)]
  pub source: String,
}

/// 分类器对一个窗口给出的分数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
  pub start_frame: usize,
  pub end_frame: usize,
  pub start_time: f64,
  pub end_time: f64,
  pub score: f64,
  #[serde(flatten)]
  pub meta: SegmentMeta,
}

impl Window {
  /// 由切分区间与正类分数构造窗口，时间按 `帧号 / fps` 计算
  pub fn from_intervals(
    intervals: &[(usize, usize)],
    scores: &[f64],
    fps: f64,
    meta: &SegmentMeta,
  ) -> Result<Vec<Window>, AggregateError> {
    if intervals.len() != scores.len() {
      return Err(AggregateError::ScoreCount {
        windows: intervals.len(),
        scores: scores.len(),
      });
    }
    if !(fps > 0.0) {
      return Err(AggregateError::InvalidFps(fps));
    }
    Ok(
      intervals
        .iter()
        .zip(scores)
        .map(|(&(start, end), &score)| Window {
          start_frame: start,
          end_frame: end,
          start_time: start as f64 / fps,
          end_time: end as f64 / fps,
          score,
          meta: meta.clone(),
        })
        .collect(),
    )
  }
}

/// 聚合后的带标签片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
  pub start_frame: usize,
  pub end_frame: usize,
  pub start_time: f64,
  pub end_time: f64,
  pub movement: Movement,
  pub score: f64,
  #[serde(flatten)]
  pub meta: SegmentMeta,
  pub calc_date: DateTime<Utc>,
}

impl Segment {
  pub fn from_window(window: &Window, threshold: f64, calc_date: DateTime<Utc>) -> Self {
    Self {
      start_frame: window.start_frame,
      end_frame: window.end_frame,
      start_time: window.start_time,
      end_time: window.end_time,
      movement: Movement::from_score(window.score, threshold),
      score: window.score,
      meta: window.meta.clone(),
      calc_date,
    }
  }

  pub fn frames(&self) -> usize {
    self.end_frame.saturating_sub(self.start_frame)
  }

  pub fn is_stereotypical(&self) -> bool {
    self.movement == Movement::Stereotypical
  }
}

/// 聚合器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
  /// 分类阈值
  pub threshold: f64,
  /// 是否接受相互重叠的窗口（滑动窗口切分的结果）
  pub allow_overlap: bool,
  /// 覆盖输出片段的来源字段，通常是分类模型名称
  pub source: Option<String>,
}

impl Default for AggregatorConfig {
  fn default() -> Self {
    Self {
      threshold: 0.5,
      allow_overlap: false,
      source: None,
    }
  }
}

/// 检查窗口是否属于同一视频、按时间排序且首尾相接
///
/// `allow_overlap` 为真时允许后一窗口起始于前一窗口结束之前，但仍不允许乱序和空隙。
/// 重叠的窗口在打标签前由 [`clip_overlaps`] 裁剪。
pub fn validate(windows: &[Window], allow_overlap: bool) -> Result<(), AggregateError> {
  let Some(first) = windows.first() else {
    return Ok(());
  };

  for (index, window) in windows.iter().enumerate() {
    if window.start_frame > window.end_frame {
      return Err(AggregateError::Inverted {
        index,
        start: window.start_frame,
        end: window.end_frame,
      });
    }
    if window.meta.video != first.meta.video {
      return Err(AggregateError::MixedVideos {
        expected: first.meta.video.clone(),
        found: window.meta.video.clone(),
      });
    }
  }

  for (index, pair) in windows.windows(2).enumerate() {
    let (previous, current) = (&pair[0], &pair[1]);
    let index = index + 1;
    if current.start_frame < previous.start_frame {
      return Err(AggregateError::OutOfOrder {
        index,
        previous: previous.start_frame,
        start: current.start_frame,
      });
    }
    if current.start_frame > previous.end_frame {
      return Err(AggregateError::Gap {
        index,
        previous_end: previous.end_frame,
        start: current.start_frame,
      });
    }
    if !allow_overlap && current.start_frame < previous.end_frame {
      return Err(AggregateError::Overlap {
        index,
        previous_end: previous.end_frame,
        start: current.start_frame,
      });
    }
  }

  Ok(())
}

/// 合并相邻的同标签片段，分数取算术平均
pub fn run_length_merge(segments: &[Segment]) -> Vec<Segment> {
  let mut merged: Vec<Segment> = Vec::new();
  let mut run_scores: Vec<f64> = Vec::new();

  for segment in segments {
    match merged.last_mut() {
      Some(last) if last.movement == segment.movement => {
        last.end_frame = segment.end_frame;
        last.end_time = segment.end_time;
        run_scores.push(segment.score);
        last.score = mean(&run_scores);
      }
      _ => {
        merged.push(segment.clone());
        run_scores.clear();
        run_scores.push(segment.score);
      }
    }
  }

  merged
}

fn mean(values: &[f64]) -> f64 {
  values.iter().sum::<f64>() / values.len() as f64
}

/// 按帧长加权的平均分
///
/// 每个片段的权重为其帧长除以整个合并区间的帧长，再按权重和归一化。
/// 合并区间长度为零时退化为算术平均。
pub fn weighted_mean_score(folded: &[&Segment]) -> f64 {
  let (Some(first), Some(last)) = (folded.first(), folded.last()) else {
    return 0.0;
  };
  let total = last.end_frame as f64 - first.start_frame as f64;
  let weights: Vec<f64> = folded.iter().map(|s| s.frames() as f64 / total).collect();
  let weight_sum: f64 = weights.iter().sum();
  if !(total > 0.0) || !(weight_sum > 0.0) {
    let scores: Vec<f64> = folded.iter().map(|s| s.score).collect();
    return mean(&scores);
  }
  folded
    .iter()
    .zip(&weights)
    .map(|(s, w)| s.score * w)
    .sum::<f64>()
    / weight_sum
}

/// 跨越一个间隔片段合并刻板动作片段
///
/// 对每个刻板动作片段，检查其后第二个片段：若它的起点早于当前片段的终点，
/// 则连同中间片段一起并入，步长固定为 2，更宽的间隔不会被合并。
/// 最后一个片段不参与并入。
///
/// 每个输出片段的起点不早于上一个输出片段的终点；非刻板动作片段的终点改为
/// 下一个输入片段的起点。被前面片段完全覆盖的片段丢弃，随后相邻的同标签片段再合并一次。
pub fn unify(segments: &[Segment]) -> Vec<Segment> {
  let n = segments.len();
  let mut unified: Vec<Segment> = Vec::with_capacity(n);
  let mut i = 0;

  while i < n {
    let current = &segments[i];
    let previous = unified.last().map(|s: &Segment| (s.end_frame, s.end_time));
    let segment = if current.is_stereotypical() {
      let mut folded = vec![current];
      let mut j = i + 2;
      while j + 1 < n {
        let candidate = &segments[j];
        let tail = folded[folded.len() - 1];
        if candidate.start_frame < tail.end_frame {
          folded.push(candidate);
          j += 2;
          i += 2;
        } else {
          break;
        }
      }
      if folded.len() > 1 {
        debug!(
          "合并 {} 个刻板动作片段: {} - {}",
          folded.len(),
          current.start_frame,
          folded[folded.len() - 1].end_frame
        );
      }
      let tail = folded[folded.len() - 1];
      let (start_frame, start_time) = match previous {
        Some((end_frame, end_time)) if end_frame > current.start_frame => (end_frame, end_time),
        _ => (current.start_frame, current.start_time),
      };
      Segment {
        start_frame,
        start_time,
        end_frame: tail.end_frame,
        end_time: tail.end_time,
        score: weighted_mean_score(&folded),
        ..current.clone()
      }
    } else {
      let (start_frame, start_time) = previous.unwrap_or((current.start_frame, current.start_time));
      let (end_frame, end_time) = match segments.get(i + 1) {
        Some(next) => (next.start_frame, next.start_time),
        None => (current.end_frame, current.end_time),
      };
      Segment {
        start_frame,
        end_frame,
        start_time,
        end_time,
        ..current.clone()
      }
    };

    if segment.start_frame < segment.end_frame {
      unified.push(segment);
    } else {
      debug!(
        "丢弃被覆盖的 {} 片段: {} - {}",
        segment.movement, current.start_frame, current.end_frame
      );
    }
    i += 1;
  }

  run_length_merge(&unified)
}

/// 将相互重叠的窗口裁剪为首尾相接的窗口
///
/// 每个窗口的终点截断到下一个窗口的起点，最后一个窗口保留自身终点，
/// 裁剪后长度为零的窗口被丢弃。
pub fn clip_overlaps(windows: &[Window]) -> Vec<Window> {
  let mut clipped = Vec::with_capacity(windows.len());
  for (index, window) in windows.iter().enumerate() {
    let mut window = window.clone();
    if let Some(next) = windows.get(index + 1)
      && next.start_frame < window.end_frame
    {
      window.end_frame = next.start_frame;
      window.end_time = next.start_time;
    }
    if window.start_frame < window.end_frame {
      clipped.push(window);
    }
  }
  clipped
}

/// 检查片段按顺序首尾相接且没有倒置
pub fn check_contiguous(segments: &[Segment]) -> Result<(), AggregateError> {
  let mut previous_end = None;
  for (index, segment) in segments.iter().enumerate() {
    let inverted = segment.start_frame > segment.end_frame;
    let detached = previous_end.is_some_and(|end| end != segment.start_frame);
    if inverted || detached {
      return Err(AggregateError::Discontinuous {
        index,
        previous_end: previous_end.unwrap_or(segment.start_frame),
        start: segment.start_frame,
        end: segment.end_frame,
      });
    }
    previous_end = Some(segment.end_frame);
  }
  Ok(())
}

/// 片段聚合器
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
  config: AggregatorConfig,
}

impl Aggregator {
  pub fn new(config: AggregatorConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &AggregatorConfig {
    &self.config
  }

  /// 校验并裁剪窗口，打标签后依次做同标签合并与跨间隔合并
  pub fn aggregate(&self, windows: &[Window]) -> Result<Vec<Segment>, AggregateError> {
    validate(windows, self.config.allow_overlap)?;
    self.aggregate_at(windows, Utc::now())
  }

  fn aggregate_at(
    &self,
    windows: &[Window],
    calc_date: DateTime<Utc>,
  ) -> Result<Vec<Segment>, AggregateError> {
    let clipped = clip_overlaps(windows);
    let labeled: Vec<Segment> = clipped
      .iter()
      .map(|w| {
        let mut segment = Segment::from_window(w, self.config.threshold, calc_date);
        if let Some(source) = &self.config.source {
          segment.meta.source = source.clone();
        }
        segment
      })
      .collect();

    let merged = run_length_merge(&labeled);
    let unified = unify(&merged);
    info!(
      "聚合完成: {} 个窗口 -> {} 个同标签片段 -> {} 个输出片段",
      windows.len(),
      merged.len(),
      unified.len()
    );
    check_contiguous(&unified)?;
    Ok(unified)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn meta() -> SegmentMeta {
    SegmentMeta {
      video: "child_01_2024_03".to_string(),
      video_full_name: "child_01_2024_03.mp4".to_string(),
      video_path: "/videos/child_01_2024_03.mp4".to_string(),
      source: "binary".to_string(),
    }
  }

  fn window(start: usize, end: usize, score: f64) -> Window {
    Window {
      start_frame: start,
      end_frame: end,
      start_time: start as f64 / 10.0,
      end_time: end as f64 / 10.0,
      score,
      meta: meta(),
    }
  }

  fn segment(start: usize, end: usize, movement: Movement, score: f64) -> Segment {
    Segment {
      start_frame: start,
      end_frame: end,
      start_time: start as f64 / 10.0,
      end_time: end as f64 / 10.0,
      movement,
      score,
      meta: meta(),
      calc_date: DateTime::<Utc>::UNIX_EPOCH,
    }
  }

  fn assert_covers(segments: &[Segment], start: usize, end: usize) {
    assert_eq!(segments.first().unwrap().start_frame, start);
    assert_eq!(segments.last().unwrap().end_frame, end);
    for pair in segments.windows(2) {
      assert_eq!(pair[0].end_frame, pair[1].start_frame);
    }
  }

  #[test]
  fn label_requires_strictly_greater_score() {
    assert_eq!(Movement::from_score(0.5, 0.5), Movement::NoAction);
    assert_eq!(Movement::from_score(0.51, 0.5), Movement::Stereotypical);
  }

  #[test]
  fn run_length_merge_averages_scores() {
    use Movement::*;
    let merged = run_length_merge(&[
      segment(0, 10, Stereotypical, 0.9),
      segment(10, 20, Stereotypical, 0.7),
      segment(20, 30, Stereotypical, 0.8),
      segment(30, 40, NoAction, 0.1),
      segment(40, 50, NoAction, 0.3),
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!((merged[0].start_frame, merged[0].end_frame), (0, 30));
    assert!((merged[0].score - 0.8).abs() < 1e-9);
    assert_eq!((merged[1].start_frame, merged[1].end_frame), (30, 50));
    assert!((merged[1].score - 0.2).abs() < 1e-9);
    assert_eq!(merged[1].end_time, 5.0);
  }

  #[test]
  fn run_length_merge_is_idempotent() {
    use Movement::*;
    let merged = run_length_merge(&[
      segment(0, 10, NoAction, 0.2),
      segment(10, 20, Stereotypical, 0.9),
      segment(20, 30, Stereotypical, 0.6),
      segment(30, 40, NoAction, 0.1),
      segment(40, 50, Stereotypical, 0.7),
    ]);
    assert_eq!(run_length_merge(&merged), merged);
    for pair in merged.windows(2) {
      assert_ne!(pair[0].movement, pair[1].movement);
    }
  }

  #[test]
  fn weighted_mean_uses_frame_spans() {
    use Movement::*;
    let a = segment(0, 10, Stereotypical, 0.9);
    let b = segment(10, 40, Stereotypical, 0.5);
    let c = segment(40, 50, Stereotypical, 0.9);
    let score = weighted_mean_score(&[&a, &b, &c]);
    assert!((score - 0.66).abs() < 1e-9);
  }

  #[test]
  fn weighted_mean_of_single_segment_is_its_score() {
    let a = segment(5, 25, Movement::Stereotypical, 0.73);
    assert!((weighted_mean_score(&[&a]) - 0.73).abs() < 1e-12);
    let empty = segment(5, 5, Movement::Stereotypical, 0.4);
    assert!((weighted_mean_score(&[&empty]) - 0.4).abs() < 1e-12);
  }

  #[test]
  fn unify_folds_across_short_gap() {
    use Movement::*;
    let unified = unify(&[
      segment(0, 100, Stereotypical, 0.9),
      segment(80, 120, NoAction, 0.2),
      segment(90, 200, Stereotypical, 0.7),
      segment(180, 260, NoAction, 0.1),
      segment(250, 300, Stereotypical, 0.8),
    ]);
    assert_eq!(unified.len(), 3);
    assert_eq!(unified[0].movement, Stereotypical);
    assert_eq!((unified[0].start_frame, unified[0].end_frame), (0, 200));
    let expected = (0.9 * 100.0 + 0.7 * 110.0) / 210.0;
    assert!((unified[0].score - expected).abs() < 1e-9);
    assert_eq!(unified[1].movement, NoAction);
    assert_eq!((unified[1].start_frame, unified[1].end_frame), (200, 250));
    assert_eq!((unified[1].start_time, unified[1].end_time), (20.0, 25.0));
    assert_eq!((unified[2].start_frame, unified[2].end_frame), (250, 300));
    assert_eq!(unified[2].score, 0.8);
  }

  #[test]
  fn unify_never_folds_into_last_segment() {
    use Movement::*;
    let unified = unify(&[
      segment(0, 100, Stereotypical, 0.9),
      segment(80, 95, NoAction, 0.2),
      segment(90, 200, Stereotypical, 0.7),
    ]);
    // 中间片段被完全覆盖，两侧的刻板动作片段首尾相接后再合并
    assert_eq!(unified.len(), 1);
    assert_eq!((unified[0].start_frame, unified[0].end_frame), (0, 200));
    assert!((unified[0].score - 0.8).abs() < 1e-9);
    assert_eq!(check_contiguous(&unified), Ok(()));
  }

  #[test]
  fn unify_clips_overlapping_stereotypical_runs() {
    use Movement::*;
    let unified = unify(&[
      segment(0, 200, Stereotypical, 0.9),
      segment(30, 60, NoAction, 0.1),
      segment(60, 300, Stereotypical, 0.9),
    ]);
    assert_eq!(check_contiguous(&unified), Ok(()));
    assert!(unified.iter().all(|s| s.start_frame < s.end_frame));
    assert_eq!(unified.iter().map(Segment::frames).sum::<usize>(), 300);
  }

  #[test]
  fn clip_overlaps_makes_windows_contiguous() {
    let clipped = clip_overlaps(&[
      window(0, 200, 0.9),
      window(30, 230, 0.1),
      window(30, 230, 0.2),
      window(60, 260, 0.9),
    ]);
    let bounds: Vec<(usize, usize)> = clipped.iter().map(|w| (w.start_frame, w.end_frame)).collect();
    assert_eq!(bounds, vec![(0, 30), (30, 60), (60, 260)]);
    assert_eq!(clipped[0].end_time, 3.0);
    assert_eq!(clipped[1].score, 0.2);
  }

  #[test]
  fn overlapping_windows_aggregate_without_inversion() {
    let scores = [0.9, 0.1, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9];
    let windows: Vec<Window> = scores
      .iter()
      .enumerate()
      .map(|(i, &s)| window(i * 30, (i * 30 + 200).min(300), s))
      .collect();
    let aggregator = Aggregator::new(AggregatorConfig {
      allow_overlap: true,
      ..AggregatorConfig::default()
    });
    let segments = aggregator.aggregate(&windows).unwrap();
    assert_covers(&segments, 0, 300);
    assert!(segments.iter().all(|s| s.start_frame < s.end_frame));
    let bounds: Vec<(usize, usize, Movement)> = segments
      .iter()
      .map(|s| (s.start_frame, s.end_frame, s.movement))
      .collect();
    use Movement::*;
    assert_eq!(
      bounds,
      vec![(0, 30, Stereotypical), (30, 60, NoAction), (60, 300, Stereotypical)]
    );
  }

  #[test]
  fn broken_coverage_is_reported() {
    use Movement::*;
    let segments = [
      segment(0, 10, Stereotypical, 0.9),
      segment(20, 15, NoAction, 0.1),
    ];
    assert!(matches!(
      check_contiguous(&segments),
      Err(AggregateError::Discontinuous { index: 1, .. })
    ));
    assert!(check_contiguous(&[segment(0, 10, NoAction, 0.1), segment(5, 20, Stereotypical, 0.9)]).is_err());
  }

  #[test]
  fn unify_keeps_wide_gaps() {
    use Movement::*;
    let input = [
      segment(0, 10, Stereotypical, 0.9),
      segment(10, 20, NoAction, 0.2),
      segment(20, 30, Stereotypical, 0.7),
      segment(30, 40, NoAction, 0.1),
    ];
    assert_eq!(unify(&input), input.to_vec());
  }

  #[test]
  fn leading_no_action_keeps_its_start() {
    use Movement::*;
    let unified = unify(&[
      segment(0, 10, NoAction, 0.2),
      segment(10, 30, Stereotypical, 0.7),
    ]);
    assert_eq!((unified[0].start_frame, unified[0].end_frame), (0, 10));
  }

  #[test]
  fn aggregation_covers_whole_video_without_gaps() {
    let scores = [0.9, 0.8, 0.1, 0.7, 0.2, 0.3, 0.95, 0.4];
    let windows: Vec<Window> = scores
      .iter()
      .enumerate()
      .map(|(i, &s)| window(i * 25, (i + 1) * 25, s))
      .collect();
    let segments = Aggregator::default().aggregate(&windows).unwrap();
    assert_covers(&segments, 0, 200);
    let labels: Vec<Movement> = segments.iter().map(|s| s.movement).collect();
    use Movement::*;
    assert_eq!(
      labels,
      vec![Stereotypical, NoAction, Stereotypical, NoAction, Stereotypical, NoAction]
    );
    assert!((segments[0].score - 0.85).abs() < 1e-9);
  }

  #[test]
  fn source_override_is_applied() {
    let aggregator = Aggregator::new(AggregatorConfig {
      source: Some("stgcn".to_string()),
      ..AggregatorConfig::default()
    });
    let segments = aggregator.aggregate(&[window(0, 10, 0.9)]).unwrap();
    assert_eq!(segments[0].meta.source, "stgcn");
  }

  #[test]
  fn validation_rejects_bad_windows() {
    let overlap = [window(0, 20, 0.1), window(10, 30, 0.2)];
    assert!(matches!(
      validate(&overlap, false),
      Err(AggregateError::Overlap { index: 1, .. })
    ));
    assert_eq!(validate(&overlap, true), Ok(()));

    let out_of_order = [window(10, 20, 0.1), window(0, 10, 0.2)];
    assert!(matches!(
      validate(&out_of_order, true),
      Err(AggregateError::OutOfOrder { .. })
    ));

    let gap = [window(0, 10, 0.1), window(15, 20, 0.2)];
    assert!(matches!(validate(&gap, true), Err(AggregateError::Gap { .. })));

    let inverted = [window(10, 5, 0.1)];
    assert!(matches!(
      validate(&inverted, false),
      Err(AggregateError::Inverted { .. })
    ));

    let mut other = window(10, 20, 0.2);
    other.meta.video = "other".to_string();
    assert!(matches!(
      validate(&[window(0, 10, 0.1), other], false),
      Err(AggregateError::MixedVideos { .. })
    ));
  }

  #[test]
  fn empty_input_yields_no_segments() {
    assert!(Aggregator::default().aggregate(&[]).unwrap().is_empty());
  }

  #[test]
  fn windows_from_intervals() {
    let windows = Window::from_intervals(&[(0, 200), (30, 230)], &[0.2, 0.8], 25.0, &meta()).unwrap();
    assert_eq!(windows[1].start_time, 1.2);
    assert_eq!(windows[1].end_time, 9.2);
    assert_eq!(
      Window::from_intervals(&[(0, 200)], &[], 25.0, &meta()),
      Err(AggregateError::ScoreCount {
        windows: 1,
        scores: 0
      })
    );
    assert!(Window::from_intervals(&[], &[], 0.0, &meta()).is_err());
  }

  #[test]
  fn segment_json_uses_flat_columns() {
    let value = serde_json::to_value(segment(0, 10, Movement::NoAction, 0.1)).unwrap();
    assert_eq!(value["movement"], "NoAction");
    assert_eq!(value["video"], "child_01_2024_03");
    assert_eq!(value["calc_date"], "1970-01-01T00:00:00Z");
  }
}
