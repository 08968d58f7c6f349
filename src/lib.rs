// 该文件是 SmmTrack 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod aggregator;
pub mod conclusion;
pub mod detection;
pub mod geometry;
pub mod input;
pub mod matcher;
pub mod output;
pub mod skeleton;
pub mod splitter;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 中取出文件路径。
///
/// 支持 `json:///abs/path.json`（绝对路径）与 `json:relative/path.json`
/// （相对路径）两种写法，路径中的百分号编码会被解码。
pub fn url_to_path(url: &url::Url) -> Result<std::path::PathBuf, std::string::FromUtf8Error> {
  let mut raw = String::new();
  if let Some(host) = url.host_str() {
    raw.push_str(host);
  }
  raw.push_str(url.path());
  let decoded = urlencoding::decode(&raw)?;
  Ok(std::path::PathBuf::from(decoded.into_owned()))
}
