// 该文件是 SmmTrack 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

use smm_track::{aggregator::AggregatorConfig, matcher::MatcherConfig, splitter::SplitterConfig};

/// SmmTrack 儿童骨架定位与刻板动作片段聚合
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 日志详细程度，可重复使用（-v 为 debug，-vv 为 trace）
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  pub verbose: u8,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 根据检测结果为骨架确定儿童轨迹
  Match {
    /// 检测结果，例如 json:///data/v1/detections.json
    #[arg(long, value_name = "URL")]
    detections: Url,
    /// 骨架文件
    #[arg(long, value_name = "URL")]
    skeleton: Url,
    /// 标注输出，支持 json: 与 csv:
    #[arg(long, value_name = "URL")]
    output: Url,
    #[command(flatten)]
    matcher: MatcherArgs,
  },
  /// 将骨架切分为滑动窗口样本
  Split {
    #[arg(long, value_name = "URL")]
    skeleton: Url,
    /// 匹配得到的儿童标注
    #[arg(long, value_name = "URL")]
    annotation: Option<Url>,
    /// 视频名，用于窗口命名
    #[arg(long)]
    name: String,
    /// 窗口输出，json:
    #[arg(long, value_name = "URL")]
    output: Url,
    #[command(flatten)]
    splitter: SplitterArgs,
  },
  /// 将分类分数聚合为带标签的片段
  Aggregate {
    /// 窗口列表或正类分数
    #[arg(long, value_name = "URL")]
    scores: Url,
    /// 片段输出，支持 json: 与 csv:
    #[arg(long, value_name = "URL")]
    output: Url,
    /// 视频名
    #[arg(long)]
    name: String,
    /// 帧率
    #[arg(long, default_value_t = smm_track::task::DEFAULT_FPS)]
    fps: f64,
    /// 儿童标注，提供视频帧数与有效帧统计
    #[arg(long, value_name = "URL")]
    annotation: Option<Url>,
    /// 视频帧数，未给出标注且分数不带区间时必需
    #[arg(long, value_name = "COUNT")]
    frames: Option<usize>,
    /// 结论输出
    #[arg(long, value_name = "URL", requires = "annotation")]
    conclusion: Option<Url>,
    #[command(flatten)]
    aggregator: AggregatorArgs,
    #[command(flatten)]
    splitter: SplitterArgs,
  },
  /// 按清单批量处理视频
  Batch {
    /// 清单文件
    #[arg(long, value_name = "URL")]
    manifest: Url,
    /// 工作线程数，默认为可用核心数
    #[arg(long, value_name = "COUNT")]
    workers: Option<usize>,
    /// 处理报告输出
    #[arg(long, value_name = "URL")]
    report: Option<Url>,
    #[command(flatten)]
    matcher: MatcherArgs,
  },
}

#[derive(ClapArgs, Debug, Default)]
pub struct MatcherArgs {
  /// 检测框与骨架框的最小 IoU
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,
  /// 插值锚点的最小置信度
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence_threshold: Option<f32>,
  /// 插值的最大帧距离
  #[arg(long, value_name = "FRAMES")]
  pub grace_distance: Option<usize>,
  /// 儿童框与成人框的相似度阈值
  #[arg(long, value_name = "THRESHOLD")]
  pub similarity_threshold: Option<f32>,
  /// 检测流与骨架帧数允许的长度差
  #[arg(long, value_name = "FRAMES")]
  pub tolerance: Option<usize>,
}

impl MatcherArgs {
  pub fn apply(&self, base: MatcherConfig) -> MatcherConfig {
    MatcherConfig {
      iou_threshold: self.iou_threshold.unwrap_or(base.iou_threshold),
      confidence_threshold: self.confidence_threshold.unwrap_or(base.confidence_threshold),
      grace_distance: self.grace_distance.unwrap_or(base.grace_distance),
      similarity_threshold: self.similarity_threshold.unwrap_or(base.similarity_threshold),
      tolerance: self.tolerance.unwrap_or(base.tolerance),
      ..base
    }
  }
}

#[derive(ClapArgs, Debug, Default)]
pub struct SplitterArgs {
  /// 窗口长度
  #[arg(long, value_name = "FRAMES")]
  pub sequence_length: Option<usize>,
  /// 窗口步长
  #[arg(long, value_name = "FRAMES")]
  pub step_size: Option<usize>,
  /// 最短窗口长度，默认两倍步长
  #[arg(long, value_name = "FRAMES")]
  pub min_length: Option<usize>,
}

impl SplitterArgs {
  pub fn apply(&self, base: SplitterConfig) -> SplitterConfig {
    SplitterConfig {
      sequence_length: self.sequence_length.unwrap_or(base.sequence_length),
      step_size: self.step_size.unwrap_or(base.step_size),
      min_length: self.min_length.or(base.min_length),
    }
  }
}

#[derive(ClapArgs, Debug, Default)]
pub struct AggregatorArgs {
  /// 刻板动作分类阈值
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<f64>,
  /// 允许窗口重叠
  #[arg(long)]
  pub allow_overlap: bool,
  /// 片段来源，通常是分类模型名
  #[arg(long)]
  pub source: Option<String>,
}

impl AggregatorArgs {
  pub fn apply(&self, base: AggregatorConfig) -> AggregatorConfig {
    AggregatorConfig {
      threshold: self.threshold.unwrap_or(base.threshold),
      allow_overlap: self.allow_overlap || base.allow_overlap,
      source: self.source.clone().or(base.source),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matcher_flags_override_defaults() {
    let args = Args::parse_from([
      "smm-track",
      "match",
      "--detections",
      "json:///d.json",
      "--skeleton",
      "json:///s.json",
      "--output",
      "csv:///a.csv",
      "--grace-distance",
      "7",
    ]);
    let Command::Match { matcher, .. } = args.command else {
      panic!("expected match command");
    };
    let config = matcher.apply(MatcherConfig::default());
    assert_eq!(config.grace_distance, 7);
    assert_eq!(config.iou_threshold, MatcherConfig::default().iou_threshold);
  }

  #[test]
  fn conclusion_requires_annotation() {
    let result = Args::try_parse_from([
      "smm-track",
      "aggregate",
      "--scores",
      "json:///s.json",
      "--output",
      "csv:///o.csv",
      "--name",
      "v",
      "--conclusion",
      "csv:///c.csv",
    ]);
    assert!(result.is_err());
  }

  #[test]
  fn verbose_is_global() {
    let args = Args::parse_from([
      "smm-track",
      "batch",
      "--manifest",
      "json:///m.json",
      "-vv",
    ]);
    assert_eq!(args.verbose, 2);
  }
}
