// 该文件是 SmmTrack 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{Level, info, warn};
use url::Url;

use smm_track::{
  FromUrl,
  aggregator::{Aggregator, AggregatorConfig, SegmentMeta},
  conclusion::{VideoProperties, conclude},
  detection::DetectionStream,
  input::{JsonFileInput, ScoreDocument},
  matcher::{AnnotationArrays, ChildAnnotation, MatcherConfig, SkeletonMatcher},
  output::{Export, JsonFileOutput, OutputWrapper},
  skeleton::Skeleton,
  splitter::{SplitterConfig, Splitter, intervals, windows_from_scores},
  task::{BatchManifest, BatchTask, Task},
};

use args::{Args, Command};

fn load<T: serde::de::DeserializeOwned>(url: &Url) -> Result<T> {
  let document = JsonFileInput::<T>::from_url(url)?
    .load()
    .with_context(|| format!("读取 {} 失败", url))?;
  Ok(document)
}

fn load_annotation(url: &Url) -> Result<ChildAnnotation> {
  Ok(ChildAnnotation::from(load::<AnnotationArrays>(url)?))
}

fn main() -> Result<()> {
  let args = Args::parse();

  let level = match args.verbose {
    0 => Level::INFO,
    1 => Level::DEBUG,
    _ => Level::TRACE,
  };
  tracing_subscriber::fmt().with_max_level(level).init();

  match args.command {
    Command::Match {
      detections,
      skeleton,
      output,
      matcher,
    } => {
      info!("检测结果: {}", detections);
      info!("骨架: {}", skeleton);
      info!("输出路径: {}", output);

      let detections: DetectionStream = load(&detections)?;
      let skeleton: Skeleton = load(&skeleton)?;
      let matcher = SkeletonMatcher::new(matcher.apply(MatcherConfig::default()));
      let annotation = matcher.match_skeleton(&skeleton, &detections)?;
      OutputWrapper::from_url(&output)?.export(&annotation)?;
      info!(
        "有效帧 {} / {}, 最后有效帧 {:?}",
        annotation.valid_frames(),
        annotation.len(),
        annotation.last_valid_frame()
      );
    }
    Command::Split {
      skeleton,
      annotation,
      name,
      output,
      splitter,
    } => {
      let skeleton: Skeleton = load(&skeleton)?;
      let annotation = annotation.as_ref().map(load_annotation).transpose()?;
      let config = splitter.apply(SplitterConfig::default());
      let splitter = Splitter::new(&skeleton, annotation.as_ref(), &name, &config)?;
      let windows = splitter.collect()?;
      JsonFileOutput::from_url(&output)?.export(windows.as_slice())?;
      info!("{} 切分为 {} 个窗口", name, windows.len());
    }
    Command::Aggregate {
      scores,
      output,
      name,
      fps,
      annotation,
      frames,
      conclusion,
      aggregator,
      splitter,
    } => {
      let config = aggregator.apply(AggregatorConfig::default());
      let annotation = annotation.as_ref().map(load_annotation).transpose()?;
      let segments = match load::<ScoreDocument>(&scores)? {
        ScoreDocument::Windows(windows) => Aggregator::new(config).aggregate(&windows)?,
        document => {
          let Some(frames) = frames.or(annotation.as_ref().map(ChildAnnotation::len)) else {
            bail!("分数不带帧区间，需要 --frames 或 --annotation");
          };
          let intervals = intervals(frames, &splitter.apply(SplitterConfig::default()))?;
          let meta = SegmentMeta {
            video: name.clone(),
            video_full_name: name.clone(),
            video_path: String::new(),
            source: config.source.clone().unwrap_or_default(),
          };
          let scores = document.positive_scores().unwrap_or_default();
          let windows = windows_from_scores(&intervals, &scores, fps, &meta)?;
          let config = AggregatorConfig {
            allow_overlap: true,
            ..config
          };
          Aggregator::new(config).aggregate(&windows)?
        }
      };
      OutputWrapper::from_url(&output)?.export(segments.as_slice())?;

      if let (Some(url), Some(annotation)) = (conclusion, annotation) {
        let properties = VideoProperties::from_annotation(fps, &annotation);
        match conclude(&segments, &name, &properties) {
          Some(conclusion) => {
            OutputWrapper::from_url(&url)?.export(std::slice::from_ref(&conclusion))?
          }
          None => warn!("{} 未发现刻板动作，不输出结论", name),
        }
      }
    }
    Command::Batch {
      manifest,
      workers,
      report,
      matcher,
    } => {
      let mut manifest: BatchManifest = load(&manifest)?;
      manifest.matcher = matcher.apply(manifest.matcher);
      let workers = workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
          .map(|n| n.get())
          .unwrap_or(1)
      });
      let result = BatchTask::default()
        .with_workers(workers)
        .with_interrupt(true)
        .run_task(manifest)?;
      if let Some(url) = report {
        JsonFileOutput::from_url(&url)?.export(&result)?;
      }
      if !result.failed.is_empty() {
        bail!("{} 个视频处理失败", result.failed.len());
      }
    }
  }

  Ok(())
}
