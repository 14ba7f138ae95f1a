//! 解封装器实现模块.

pub mod ape;
pub mod avi;
pub mod mpeg_audio;

use crate::format_id::FormatId;
use crate::registry::FormatRegistry;

/// 注册所有内置解封装器
pub fn register_all_demuxers(registry: &mut FormatRegistry) {
    registry.register_demuxer(FormatId::Avi, "avi", avi::AviDemuxer::create);
    registry.register_probe(Box::new(avi::AviProbe));

    registry.register_demuxer(FormatId::Ape, "ape", ape::ApeDemuxer::create);
    registry.register_probe(Box::new(ape::ApeProbe));
}
