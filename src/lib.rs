//! # Liu (流)
//!
//! 纯 Rust 实现的帧精确容器解封装框架.
//!
//! Liu 面向需要逐帧随机访问的播放与检索场景:
//! - **AVI**: 含 OpenDML 扩展的两级惰性索引, 定位请求可以指向尚未
//!   加载的索引分段, 由解封装器先绕道补齐索引再就位
//! - **APE**: 由 seek 表重建帧表, 合成 FFmpeg 兼容的解码器配置与
//!   每帧头部
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use liu::format::{FormatRegistry, IoContext};
//!
//! let mut registry = FormatRegistry::new();
//! liu::format::register_all(&mut registry);
//!
//! let mut io = IoContext::open("movie.avi").unwrap();
//! let demuxer = registry.open_input(&mut io, Some("movie.avi")).unwrap();
//! println!("格式: {}", demuxer.name());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 核心类型与工具 |
//! | `liu-format` | 容器格式框架与解封装器 |

/// 核心类型与工具
pub use liu_core as core;

/// 容器格式框架
pub use liu_format as format;
