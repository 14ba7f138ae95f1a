//! # liu-format
//!
//! Liu 多媒体框架容器格式库, 提供解封装框架与具体格式实现.
//!
//! 解封装采用宿主驱动的推送模型 (见 [`demuxer`] 模块): 宿主循环调用
//! `read()`, 解封装器把样本推入 `TrackSink`, 返回值告知宿主继续、
//! 定位或结束. 目前内置 AVI (含 OpenDML 扩展索引) 与 APE 两种格式.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod probe;
pub mod registry;
pub mod stream;

// 重导出常用类型
pub use demuxer::{Demuxer, ReadResult, SeekMap, SeekPoint, SeekPoints, TrackSink};
pub use format_id::FormatId;
pub use io::IoContext;
pub use probe::ProbeResult;
pub use registry::FormatRegistry;
pub use stream::TrackFormat;

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
}
