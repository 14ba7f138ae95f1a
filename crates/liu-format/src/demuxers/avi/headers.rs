//! AVI `hdrl` 头部列表解析.
//!
//! `hdrl` 结构:
//! ```text
//! LIST 'hdrl'
//!   avih (主头: 帧时长、总帧数、流数、标志)
//!   LIST 'strl' (每流一个)
//!     strh (流头: 类型、处理器、scale/rate、块数)
//!     strf (流格式: BITMAPINFOHEADER 或 WAVEFORMATEX)
//!     strn (流名称, 可选)
//!     indx (OpenDML 超级索引或单段标准索引, 可选)
//! ```
//!
//! 块体在内存中整体解析 (解封装器已把 `hdrl` 体读进缓冲).

use bytes::Bytes;
use log::warn;

use liu_core::{LiuError, LiuResult, MediaType, MICROS_PER_SECOND};

use crate::io::{IoContext, MemoryBackend};
use crate::stream::{self, PcmEncoding, TrackFormat};

use super::index::StreamIndexChunk;

/// avih 标志: 文件带 idx1 旧式索引
pub const AVIF_HAS_INDEX: u32 = 0x10;

/// WAV 格式码: PCM
const WAV_FORMAT_PCM: u16 = 0x0001;
/// WAV 格式码: IEEE 浮点
const WAV_FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// WAV 格式码: MPEG Layer 1/2
const WAV_FORMAT_MPEG: u16 = 0x0050;
/// WAV 格式码: MPEG Layer 3
const WAV_FORMAT_MP3: u16 = 0x0055;
/// WAV 格式码: AAC
const WAV_FORMAT_AAC: u16 = 0x00FF;
/// WAV 格式码: AC-3
const WAV_FORMAT_AC3: u16 = 0x2000;

/// avih 主头
#[derive(Debug, Clone, Copy)]
pub struct AviMainHeader {
    /// 每帧时长 (微秒)
    pub frame_duration_us: u32,
    /// 标志位
    pub flags: u32,
    /// 总帧数
    pub total_frames: u32,
    /// 流数量
    pub streams: u32,
}

impl AviMainHeader {
    /// 文件是否声明了 idx1 旧式索引
    pub fn has_index(&self) -> bool {
        self.flags & AVIF_HAS_INDEX != 0
    }
}

/// strh 流头
#[derive(Debug, Clone, Copy)]
pub struct AviStreamHeader {
    /// 流类型 ("vids" / "auds" / "txts")
    pub stream_type: [u8; 4],
    /// 处理器 FourCC
    pub handler: [u8; 4],
    /// 时间刻度分子
    pub scale: u32,
    /// 时间刻度分母
    pub rate: u32,
    /// 数据块总数
    pub length: u32,
    /// 建议缓冲区大小
    pub suggested_buffer_size: u32,
}

impl AviStreamHeader {
    /// 流时长 (微秒)
    pub fn duration_us(&self) -> i64 {
        if self.rate == 0 {
            return 0;
        }
        i64::from(self.length) * i64::from(self.scale) * MICROS_PER_SECOND / i64::from(self.rate)
    }

    /// 帧率 (fps)
    pub fn frame_rate(&self) -> f32 {
        if self.scale == 0 {
            return 0.0;
        }
        self.rate as f32 / self.scale as f32
    }
}

/// 一条可用流的构建蓝图
pub struct StreamBlueprint {
    /// 媒体类型
    pub media_type: MediaType,
    /// 流头
    pub header: AviStreamHeader,
    /// 轨道格式
    pub format: TrackFormat,
    /// strl 内的 `indx` 块 (超级索引或单段标准索引)
    pub index_chunk: Option<StreamIndexChunk>,
}

/// `hdrl` 解析结果
pub struct HdrlInfo {
    /// 主头
    pub main: AviMainHeader,
    /// 各流的蓝图, 下标即流序号; 不支持的流为 None
    pub streams: Vec<Option<StreamBlueprint>>,
}

/// 解析 `hdrl` 列表体 (不含开头的 "hdrl" 类型字段)
pub fn parse_hdrl(body: Vec<u8>) -> LiuResult<HdrlInfo> {
    let end = body.len() as u64;
    let mut io = IoContext::new(Box::new(MemoryBackend::from_data(body)));

    let mut main: Option<AviMainHeader> = None;
    let mut streams = Vec::new();

    while io.position()? < end {
        let tag = io.read_tag()?;
        let size = io.read_u32_le()?;
        match &tag {
            b"avih" => {
                main = Some(parse_avih(&mut io, size)?);
            }
            b"LIST" => {
                let list_type = io.read_tag()?;
                let list_body = size.saturating_sub(4);
                if &list_type == b"strl" {
                    // 流序号在不支持的流上也要递增
                    let stream_id = streams.len() as u32;
                    streams.push(parse_strl(&mut io, list_body, stream_id)?);
                } else {
                    io.skip(list_body as usize)?;
                }
            }
            _ => {
                io.skip(size as usize)?;
            }
        }
        if size % 2 != 0 {
            io.skip(1)?;
        }
    }

    let main = main.ok_or_else(|| LiuError::InvalidData("hdrl 中缺少 avih 主头".into()))?;
    Ok(HdrlInfo { main, streams })
}

/// 解析 avih 块体
fn parse_avih(io: &mut IoContext, size: u32) -> LiuResult<AviMainHeader> {
    if size < 56 {
        return Err(LiuError::InvalidData("avih 块不足 56 字节".into()));
    }
    let frame_duration_us = io.read_u32_le()?; // dwMicroSecPerFrame
    let _max_bytes_per_sec = io.read_u32_le()?;
    let _padding = io.read_u32_le()?;
    let flags = io.read_u32_le()?;
    let total_frames = io.read_u32_le()?;
    let _initial_frames = io.read_u32_le()?;
    let streams = io.read_u32_le()?;
    // dwSuggestedBufferSize + dwWidth + dwHeight + dwReserved[4]
    io.skip(7 * 4)?;
    if size > 56 {
        io.skip((size - 56) as usize)?;
    }
    Ok(AviMainHeader {
        frame_duration_us,
        flags,
        total_frames,
        streams,
    })
}

/// 解析一个 `strl` 列表, 产出该流的蓝图 (不支持的流返回 None)
fn parse_strl(
    io: &mut IoContext,
    list_body: u32,
    stream_id: u32,
) -> LiuResult<Option<StreamBlueprint>> {
    let strl_end = io.position()? + u64::from(list_body);

    let mut header: Option<AviStreamHeader> = None;
    let mut format_body: Option<Vec<u8>> = None;
    let mut name: Option<String> = None;
    let mut index_chunk: Option<StreamIndexChunk> = None;

    while io.position()? < strl_end {
        let tag = io.read_tag()?;
        let size = io.read_u32_le()?;
        match &tag {
            b"strh" => {
                header = Some(parse_strh(io, size)?);
            }
            b"strf" => {
                format_body = Some(io.read_bytes(size as usize)?);
            }
            b"strn" => {
                let raw = io.read_bytes(size as usize)?;
                let text: String = raw
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                if !text.is_empty() {
                    name = Some(text);
                }
            }
            b"indx" => {
                let raw = io.read_bytes(size as usize)?;
                match StreamIndexChunk::parse(raw) {
                    Ok(chunk) => index_chunk = Some(chunk),
                    Err(LiuError::Unsupported(kind)) => {
                        warn!("流 {stream_id} 的 indx 块不受支持, 忽略: {kind}");
                    }
                    Err(err) => return Err(err),
                }
            }
            b"LIST" => {
                // strl 内嵌套的列表 (如 odml) 不参与解封装
                io.skip(size as usize)?;
            }
            _ => {
                io.skip(size as usize)?;
            }
        }
        if size % 2 != 0 {
            io.skip(1)?;
        }
    }

    let Some(header) = header else {
        warn!("流 {stream_id} 缺少 strh 流头, 跳过");
        return Ok(None);
    };
    let Some(format_body) = format_body else {
        warn!("流 {stream_id} 缺少 strf 流格式, 跳过");
        return Ok(None);
    };

    let (media_type, format) = match &header.stream_type {
        b"vids" => match build_video_format(&header, &format_body, stream_id) {
            Some(format) => (MediaType::Video, format),
            None => {
                warn!("流 {stream_id} 的视频编码不受支持, 跳过");
                return Ok(None);
            }
        },
        b"auds" => match build_audio_format(&format_body, stream_id) {
            Some(format) => (MediaType::Audio, format),
            None => {
                warn!("流 {stream_id} 的音频格式不受支持, 跳过");
                return Ok(None);
            }
        },
        b"txts" => {
            warn!("流 {stream_id} 为字幕流, 不受支持, 跳过");
            return Ok(None);
        }
        other => {
            warn!(
                "流 {stream_id} 的类型 {:?} 不受支持, 跳过",
                String::from_utf8_lossy(other)
            );
            return Ok(None);
        }
    };

    let mut format = format;
    format.label = name;
    if header.suggested_buffer_size != 0 {
        format.max_input_size = header.suggested_buffer_size;
    }
    if media_type == MediaType::Video {
        format.frame_rate = header.frame_rate();
    }

    Ok(Some(StreamBlueprint {
        media_type,
        header,
        format,
        index_chunk,
    }))
}

/// 解析 strh 块体
fn parse_strh(io: &mut IoContext, size: u32) -> LiuResult<AviStreamHeader> {
    if size < 36 {
        return Err(LiuError::InvalidData("strh 块不足 36 字节".into()));
    }
    let stream_type = io.read_tag()?;
    let handler = io.read_tag()?;
    let _flags = io.read_u32_le()?;
    let _priority = io.read_u16_le()?;
    let _language = io.read_u16_le()?;
    let _initial_frames = io.read_u32_le()?;
    let scale = io.read_u32_le()?;
    let rate = io.read_u32_le()?;
    let _start = io.read_u32_le()?;
    let length = io.read_u32_le()?;
    // 已读 36 字节; dwSuggestedBufferSize 紧随其后
    let suggested_buffer_size = if size >= 40 { io.read_u32_le()? } else { 0 };
    let consumed = if size >= 40 { 40 } else { 36 };
    // 跳过 dwQuality, dwSampleSize, rcFrame
    io.skip((size - consumed) as usize)?;
    Ok(AviStreamHeader {
        stream_type,
        handler,
        scale,
        rate,
        length,
        suggested_buffer_size,
    })
}

/// 由 BITMAPINFOHEADER 构建视频轨道格式
fn build_video_format(
    header: &AviStreamHeader,
    strf: &[u8],
    stream_id: u32,
) -> Option<TrackFormat> {
    if strf.len() < 40 {
        return None;
    }
    let width = u32::from_le_bytes([strf[4], strf[5], strf[6], strf[7]]);
    let height = u32::from_le_bytes([strf[8], strf[9], strf[10], strf[11]]);
    let compression = u32::from_le_bytes([strf[16], strf[17], strf[18], strf[19]]);

    let mime = resolve_video_mime(&header.handler, compression)?;
    let mut codec_init = Vec::new();
    if strf.len() > 40 {
        // BITMAPINFOHEADER 之后的附加字节作为解码器初始化数据
        codec_init.push(Bytes::copy_from_slice(&strf[40..]));
    }
    Some(TrackFormat {
        id: stream_id,
        mime: mime.to_string(),
        width,
        height,
        codec_init,
        ..TrackFormat::default()
    })
}

/// 由处理器 FourCC 或 biCompression 解析视频 MIME
fn resolve_video_mime(handler: &[u8; 4], compression: u32) -> Option<&'static str> {
    if let Some(mime) = video_mime_for_fourcc(handler) {
        return Some(mime);
    }
    video_mime_for_fourcc(&compression.to_le_bytes())
}

/// FourCC 到视频 MIME 的映射
fn video_mime_for_fourcc(fourcc: &[u8; 4]) -> Option<&'static str> {
    let text = String::from_utf8_lossy(fourcc);
    match text.trim_end_matches('\0').trim().to_uppercase().as_str() {
        "H264" | "X264" | "AVC1" => Some(stream::VIDEO_H264),
        "H265" | "HEVC" | "HVC1" => Some(stream::VIDEO_H265),
        "MP4V" | "XVID" | "DIVX" | "DX50" | "FMP4" => Some(stream::VIDEO_MP4V),
        "MJPG" | "JPEG" => Some(stream::VIDEO_MJPEG),
        "VP80" => Some(stream::VIDEO_VP8),
        _ => None,
    }
}

/// 由 WAVEFORMATEX 构建音频轨道格式
fn build_audio_format(strf: &[u8], stream_id: u32) -> Option<TrackFormat> {
    if strf.len() < 16 {
        return None;
    }
    let format_tag = u16::from_le_bytes([strf[0], strf[1]]);
    let channels = u16::from_le_bytes([strf[2], strf[3]]);
    let sample_rate = u32::from_le_bytes([strf[4], strf[5], strf[6], strf[7]]);
    let avg_bytes_per_sec = u32::from_le_bytes([strf[8], strf[9], strf[10], strf[11]]);
    let bits_per_sample = u16::from_le_bytes([strf[14], strf[15]]);

    let (mime, pcm_encoding) = match format_tag {
        WAV_FORMAT_PCM => (
            stream::AUDIO_RAW,
            Some(PcmEncoding::from_bits_per_sample(u32::from(bits_per_sample))?),
        ),
        WAV_FORMAT_IEEE_FLOAT => {
            if bits_per_sample != 32 {
                return None;
            }
            (stream::AUDIO_RAW, Some(PcmEncoding::F32Le))
        }
        WAV_FORMAT_MPEG | WAV_FORMAT_MP3 => (stream::AUDIO_MPEG, None),
        WAV_FORMAT_AAC => (stream::AUDIO_AAC, None),
        WAV_FORMAT_AC3 => (stream::AUDIO_AC3, None),
        _ => return None,
    };

    // WAVEFORMATEX 的 cbSize 附加数据作为解码器初始化数据
    let mut codec_init = Vec::new();
    if strf.len() > 18 {
        let cb_size = u16::from_le_bytes([strf[16], strf[17]]) as usize;
        if cb_size > 0 && strf.len() >= 18 + cb_size {
            codec_init.push(Bytes::copy_from_slice(&strf[18..18 + cb_size]));
        }
    }

    Some(TrackFormat {
        id: stream_id,
        mime: mime.to_string(),
        sample_rate,
        channels: u32::from(channels),
        pcm_encoding,
        average_bitrate: avg_bytes_per_sec.saturating_mul(8),
        codec_init,
        ..TrackFormat::default()
    })
}
