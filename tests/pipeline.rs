// 该文件是 SmmTrack 项目的一部分。
// tests/pipeline.rs - 批量处理集成测试
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

use std::path::Path;

use serde::Serialize;
use tempfile::TempDir;
use url::Url;

use smm_track::{
  detection::{Detection, DetectionStream},
  geometry::CenterBox,
  matcher::AnnotationArrays,
  skeleton::Skeleton,
  splitter::SplitterConfig,
  task::{BatchManifest, BatchTask, Task, VideoJob},
};

const FRAMES: usize = 10;

fn write_json<T: Serialize>(path: &Path, value: &T) -> Url {
  std::fs::write(path, serde_json::to_vec(value).expect("serialize")).expect("write fixture");
  json_url(path)
}

fn json_url(path: &Path) -> Url {
  Url::parse(&format!("json://{}", path.display())).expect("fixture url")
}

/// 一条轨迹，每帧两个关键点围成 (10, 10, 4, 4) 的框
fn skeleton() -> Skeleton {
  let keypoints = (0..FRAMES).flat_map(|_| [[8.0, 8.0], [12.0, 12.0]]).collect();
  Skeleton::new(1, FRAMES, 2, keypoints, vec![1.0; FRAMES * 2]).expect("skeleton")
}

fn detections() -> DetectionStream {
  let child = Detection::child(0.9, CenterBox::new(10.0, 10.0, 4.0, 4.0));
  DetectionStream::new(
    (0..FRAMES)
      .map(|frame| if frame % 5 == 0 { vec![child] } else { vec![] })
      .collect(),
  )
}

fn fixture(dir: &TempDir) -> BatchManifest {
  let root = dir.path();
  let detections = write_json(&root.join("det.json"), &detections());
  let skeleton = write_json(&root.join("skeleton.json"), &skeleton());
  let scores = write_json(&root.join("scores.json"), &vec![0.9, 0.8, 0.1, 0.7, 0.2]);

  BatchManifest {
    videos: vec![
      VideoJob {
        name: "kid_ados_2024_01".to_string(),
        detections: detections.clone(),
        skeleton,
        scores: Some(scores),
        fps: Some(2.0),
        video_full_name: Some("kid_ados_2024_01.mp4".to_string()),
        video_path: None,
        output: root.join("out"),
      },
      VideoJob {
        name: "missing".to_string(),
        detections,
        skeleton: json_url(&root.join("does-not-exist.json")),
        scores: None,
        fps: None,
        video_full_name: None,
        video_path: None,
        output: root.join("out"),
      },
    ],
    splitter: SplitterConfig {
      sequence_length: 4,
      step_size: 2,
      min_length: Some(2),
    },
    ..BatchManifest::default()
  }
}

#[test]
fn batch_isolates_failures_and_writes_outputs() {
  let dir = tempfile::tempdir().expect("temp dir");
  let manifest = fixture(&dir);
  let job = manifest.videos[0].clone();

  let report = BatchTask::default()
    .with_workers(2)
    .run_task(manifest)
    .expect("batch run");

  assert!(!report.interrupted);
  assert_eq!(report.succeeded.len(), 1);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].0, "missing");

  let video = &report.succeeded[0];
  assert_eq!(video.frames, FRAMES);
  // 两个锚点之间的帧全部由插值补全
  assert_eq!(video.valid_frames, FRAMES);
  // 滑动窗口裁剪为 [0,2) [2,4) [4,6) [6,8) [8,10)，标签 S S N S N
  assert_eq!(video.segments, Some(4));

  let conclusion = video.conclusion.as_ref().expect("stereotypical segments");
  assert_eq!(conclusion.smm_count, 2);
  assert!((conclusion.smm_proportion - 0.6).abs() < 1e-9);
  assert_eq!(conclusion.assessment, "kid_ados");

  let annotation: AnnotationArrays =
    serde_json::from_str(&std::fs::read_to_string(job.annotation_path()).expect("annotation"))
      .expect("annotation json");
  assert_eq!(annotation.child_ids, vec![0; FRAMES]);
  assert_eq!(annotation.last_valid_frame(), Some(FRAMES - 1));

  let segments = std::fs::read_to_string(job.segments_path()).expect("segments csv");
  let rows: Vec<&str> = segments.lines().collect();
  assert_eq!(rows.len(), 5);
  assert!(rows[1].starts_with("kid_ados_2024_01,kid_ados_2024_01.mp4,,0.0000,2.0000,0,4,Stereotypical"));
  let bounds: Vec<(usize, usize, &str)> = rows[1..]
    .iter()
    .map(|row| {
      let fields: Vec<&str> = row.split(',').collect();
      (
        fields[5].parse().expect("start frame"),
        fields[6].parse().expect("end frame"),
        fields[7],
      )
    })
    .collect();
  assert_eq!(
    bounds,
    vec![
      (0, 4, "Stereotypical"),
      (4, 6, "NoAction"),
      (6, 8, "Stereotypical"),
      (8, 10, "NoAction"),
    ]
  );
  assert!(job.conclusion_path().exists());
}

#[test]
fn video_without_scores_only_writes_annotation() {
  let dir = tempfile::tempdir().expect("temp dir");
  let mut manifest = fixture(&dir);
  manifest.videos.truncate(1);
  manifest.videos[0].scores = None;
  let job = manifest.videos[0].clone();

  let report = BatchTask::default().run_task(manifest).expect("batch run");
  assert_eq!(report.succeeded[0].segments, None);
  assert!(job.annotation_path().exists());
  assert!(!job.segments_path().exists());
}
