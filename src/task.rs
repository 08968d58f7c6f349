// 该文件是 SmmTrack 项目的一部分。
// src/task.rs - 单视频与批量处理任务
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

use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
  },
  thread,
  time::Instant,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl,
  aggregator::{Aggregator, AggregatorConfig, Segment, SegmentMeta},
  conclusion::{Conclusion, VideoProperties, conclude},
  detection::DetectionStream,
  input::{JsonFileInput, ScoreDocument},
  matcher::{ChildAnnotation, MatcherConfig, SkeletonMatcher},
  output::{CsvTableOutput, Export, JsonFileOutput},
  skeleton::Skeleton,
  splitter::{SplitterConfig, intervals, windows_from_scores},
};

/// 未给出帧率时使用的帧率
pub const DEFAULT_FPS: f64 = 30.0;

pub trait Task<I>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I) -> Result<Self::Output, Self::Error>;
}

/// 清单中的一个视频
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
  pub name: String,
  pub detections: Url,
  pub skeleton: Url,
  #[serde(default)]
  pub scores: Option<Url>,
  #[serde(default)]
  pub fps: Option<f64>,
  #[serde(default)]
  pub video_full_name: Option<String>,
  #[serde(default)]
  pub video_path: Option<String>,
  /// 输出目录
  pub output: PathBuf,
}

impl VideoJob {
  pub fn fps(&self) -> f64 {
    self.fps.unwrap_or(DEFAULT_FPS)
  }

  pub fn annotation_path(&self) -> PathBuf {
    self.output.join(format!("{}_annotation.json", self.name))
  }

  pub fn segments_path(&self) -> PathBuf {
    self.output.join(format!("{}_segments.csv", self.name))
  }

  pub fn conclusion_path(&self) -> PathBuf {
    self.output.join(format!("{}_conclusion.csv", self.name))
  }

  fn meta(&self, source: Option<&str>) -> SegmentMeta {
    SegmentMeta {
      video: self.name.clone(),
      video_full_name: self.video_full_name.clone().unwrap_or_else(|| self.name.clone()),
      video_path: self.video_path.clone().unwrap_or_default(),
      source: source.unwrap_or_default().to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReport {
  pub name: String,
  pub frames: usize,
  pub valid_frames: usize,
  pub segments: Option<usize>,
  pub conclusion: Option<Conclusion>,
}

/// 单个视频的完整流程：匹配、写标注、可选的聚合与结论
#[derive(Debug, Clone, Default)]
pub struct VideoTask {
  matcher: SkeletonMatcher,
  aggregator: AggregatorConfig,
  splitter: SplitterConfig,
}

impl VideoTask {
  pub fn new(matcher: MatcherConfig, aggregator: AggregatorConfig, splitter: SplitterConfig) -> Self {
    Self {
      matcher: SkeletonMatcher::new(matcher),
      aggregator,
      splitter,
    }
  }

  fn segments(
    &self,
    job: &VideoJob,
    frames: usize,
    scores: ScoreDocument,
  ) -> anyhow::Result<Vec<Segment>> {
    let segments = match scores {
      ScoreDocument::Windows(windows) => {
        Aggregator::new(self.aggregator.clone()).aggregate(&windows)?
      }
      document => {
        let scores = document.positive_scores().unwrap_or_default();
        // 分数对应滑动窗口，窗口之间必然重叠
        let intervals = intervals(frames, &self.splitter)?;
        let meta = job.meta(self.aggregator.source.as_deref());
        let windows = windows_from_scores(&intervals, &scores, job.fps(), &meta)?;
        let config = AggregatorConfig {
          allow_overlap: true,
          ..self.aggregator.clone()
        };
        Aggregator::new(config).aggregate(&windows)?
      }
    };
    Ok(segments)
  }
}

impl Task<VideoJob> for VideoTask {
  type Output = VideoReport;
  type Error = anyhow::Error;

  fn run_task(self, job: VideoJob) -> Result<Self::Output, Self::Error> {
    info!("开始处理视频 {}", job.name);
    let now = Instant::now();

    let detections = JsonFileInput::<DetectionStream>::from_url(&job.detections)?
      .load()
      .context("读取检测结果失败")?;
    let skeleton = JsonFileInput::<Skeleton>::from_url(&job.skeleton)?
      .load()
      .context("读取骨架失败")?;

    let annotation: ChildAnnotation = self.matcher.match_skeleton(&skeleton, &detections)?;
    JsonFileOutput::new(job.annotation_path()).export(&annotation)?;
    info!("匹配完成，耗时: {:.2?}", now.elapsed());

    let mut report = VideoReport {
      name: job.name.clone(),
      frames: annotation.len(),
      valid_frames: annotation.valid_frames(),
      segments: None,
      conclusion: None,
    };

    let Some(scores_url) = &job.scores else {
      return Ok(report);
    };
    let scores = JsonFileInput::<ScoreDocument>::from_url(scores_url)?
      .load()
      .context("读取分类分数失败")?;
    let segments = self.segments(&job, skeleton.frames(), scores)?;
    CsvTableOutput::new(job.segments_path()).export(segments.as_slice())?;

    let properties = VideoProperties::from_annotation(job.fps(), &annotation);
    let conclusion = conclude(&segments, &job.name, &properties);
    match &conclusion {
      Some(conclusion) => {
        CsvTableOutput::new(job.conclusion_path()).export(std::slice::from_ref(conclusion))?;
      }
      None => info!("{} 未发现刻板动作", job.name),
    }

    report.segments = Some(segments.len());
    report.conclusion = conclusion;
    info!("视频 {} 处理完成，耗时: {:.2?}", job.name, now.elapsed());
    Ok(report)
  }
}

/// 批量处理清单
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
  pub videos: Vec<VideoJob>,
  #[serde(default)]
  pub matcher: MatcherConfig,
  #[serde(default)]
  pub aggregator: AggregatorConfig,
  #[serde(default)]
  pub splitter: SplitterConfig,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
  pub succeeded: Vec<VideoReport>,
  pub failed: Vec<(String, String)>,
  pub interrupted: bool,
}

/// 多线程批量处理，单个视频失败不影响其余视频
#[derive(Debug, Clone)]
pub struct BatchTask {
  workers: usize,
  handle_interrupt: bool,
}

impl Default for BatchTask {
  fn default() -> Self {
    Self {
      workers: 1,
      handle_interrupt: false,
    }
  }
}

impl BatchTask {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  /// 收到 Ctrl-C 后不再领取新视频，已开始的视频继续处理完
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt(&self) -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    if self.handle_interrupt {
      let flag = stop.clone();
      if let Err(e) = ctrlc::set_handler(move || {
        warn!("收到中断信号，等待进行中的视频完成...");
        flag.store(true, Ordering::SeqCst);
      }) {
        warn!("无法设置 Ctrl-C 处理: {}", e);
      }
    }
    stop
  }
}

/// 运行单个视频，发生 panic 时转为错误，不影响同一线程上的后续视频
fn run_isolated<T>(run: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
  panic::catch_unwind(AssertUnwindSafe(run))
    .unwrap_or_else(|payload| Err(anyhow::anyhow!("处理过程中发生 panic: {}", panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  payload
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("未知错误")
}

impl Task<BatchManifest> for BatchTask {
  type Output = BatchReport;
  type Error = anyhow::Error;

  fn run_task(self, manifest: BatchManifest) -> Result<Self::Output, Self::Error> {
    let BatchManifest {
      videos,
      matcher,
      aggregator,
      splitter,
    } = manifest;
    let task = VideoTask::new(matcher, aggregator, splitter);
    let workers = self.workers.min(videos.len()).max(1);
    info!("批量处理 {} 个视频, {} 个工作线程", videos.len(), workers);

    let stop = self.install_interrupt();
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
      for _ in 0..workers {
        let tx = tx.clone();
        let (task, videos, next, stop) = (&task, &videos, &next, &stop);
        scope.spawn(move || {
          while !stop.load(Ordering::SeqCst) {
            let index = next.fetch_add(1, Ordering::SeqCst);
            let Some(job) = videos.get(index) else {
              break;
            };
            let result = run_isolated(|| task.clone().run_task(job.clone()));
            if tx.send((index, job.name.clone(), result)).is_err() {
              break;
            }
          }
        });
      }
    });
    drop(tx);

    let mut results: Vec<_> = rx.into_iter().collect();
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport {
      interrupted: stop.load(Ordering::SeqCst),
      ..BatchReport::default()
    };
    for (_, name, result) in results {
      match result {
        Ok(video) => report.succeeded.push(video),
        Err(e) => {
          error!("视频 {} 处理失败: {:#}", name, e);
          report.failed.push((name, format!("{:#}", e)));
        }
      }
    }
    if report.interrupted {
      warn!("批量处理被中断");
    }
    info!(
      "批量处理完成: 成功 {}, 失败 {}",
      report.succeeded.len(),
      report.failed.len()
    );
    Ok(report)
  }
}
