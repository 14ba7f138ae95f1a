//! APE (Monkey's Audio) 解封装器.
//!
//! 文件结构 (v3980 及以后):
//! ```text
//! 描述符 (52 字节: "MAC " + 版本 + 各区段长度 + MD5)
//! 头部   (24 字节: 压缩级别、每帧块数、总帧数、采样参数)
//! seek 表 (每帧一个 u32: 帧的文件偏移)
//! [帧数据...]
//! ```
//! 更早的版本只有一个 32 字节头, `blocks_per_frame` 要按版本与压缩
//! 级别查表推出.
//!
//! 帧在存储中按 4 字节对齐, 相邻帧因此重叠至多 4 字节; 顺序读取时
//! 缓存上一帧的末尾 4 字节即可拼出下一帧, 省掉一次回退 seek.
//! 送往解码器的每个样本带 8 字节帧头 (块数 + 跳过位), 解码器配置为
//! 6 字节 (版本 + 压缩级别 + 格式标志), 两者的布局与 FFmpeg 的
//! APE 解码器约定一致.

use bytes::Bytes;
use log::warn;

use liu_core::timestamp::{samples_from_time_us, time_us_from_samples};
use liu_core::{LiuError, LiuResult, MediaType};

use crate::demuxer::{
    Demuxer, ReadResult, SeekMap, SeekPoint, SeekPoints, TrackSink, SAMPLE_FLAG_KEY_FRAME,
};
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream::{self, PcmEncoding, TrackFormat};

/// 文件签名
const APE_SIGNATURE: &[u8; 4] = b"MAC ";

/// 送往解码器的每帧头部长度 (块数 u32 + 跳过位 u32)
const FRAME_HEADER_LENGTH: usize = 8;

/// 格式标志: 8 位采样
const MAC_FORMAT_FLAG_8_BIT: u32 = 1;
/// 格式标志: 带峰值电平字段
const MAC_FORMAT_FLAG_HAS_PEAK_LEVEL: u32 = 4;
/// 格式标志: 24 位采样
const MAC_FORMAT_FLAG_24_BIT: u32 = 8;
/// 格式标志: 带 seek 表元素数字段
const MAC_FORMAT_FLAG_HAS_SEEK_ELEMENTS: u32 = 16;
/// 格式标志: wav 头未随文件存储
const MAC_FORMAT_FLAG_CREATE_WAV_HEADER: u32 = 32;

/// 文件级参数
#[derive(Debug, Clone, Copy)]
struct ApeInfo {
    /// 文件版本 (如 3990)
    file_version: u32,
    /// 压缩级别
    compression_type: u32,
    /// 格式标志
    format_flags: u32,
    /// 描述符长度
    descriptor_length: u64,
    /// 头部长度
    header_length: u64,
    /// seek 表长度 (字节)
    seek_table_length: u64,
    /// wav 头长度
    wav_header_length: u64,
    /// wav 尾长度
    wav_tail_length: u64,
    /// 每帧块数
    blocks_per_frame: u32,
    /// 末帧块数
    final_frame_blocks: u32,
    /// 总帧数
    total_frames: u32,
    /// 位深
    bits_per_sample: u32,
    /// 声道数
    channels: u32,
    /// 采样率 (Hz)
    sample_rate: u32,
    /// 总采样数
    total_samples: i64,
    /// 总时长 (微秒)
    duration_us: i64,
}

/// 一帧的存储与时间参数
#[derive(Debug, Clone, Copy, Default)]
struct ApeFrame {
    /// 文件偏移 (已对齐到 4 字节)
    pos: u64,
    /// 字节大小 (4 字节对齐)
    size: u32,
    /// 块数
    blocks: u32,
    /// 解码前要跳过的位数
    skip: u32,
    /// 呈现时间 (累计块数)
    pts: i64,
}

/// 解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApeState {
    /// 读取头部与 seek 表
    ReadHeader,
    /// 逐帧产出样本
    ReadFrames,
}

/// APE 解封装器
pub struct ApeDemuxer {
    /// 当前状态
    state: ApeState,
    /// 文件级参数
    info: Option<ApeInfo>,
    /// 帧表
    frames: Vec<ApeFrame>,
    /// 各帧的累计采样数 (定位用)
    frame_samples_add_up: Vec<i64>,
    /// 各帧的文件偏移 (定位用)
    frame_positions: Vec<u64>,
    /// 下一个要产出的帧
    current_frame: usize,
    /// 帧组装缓冲 (最大帧 + 帧头, 容量只增不减)
    buffer: Vec<u8>,
    /// 缓存的上一帧末尾 4 字节所在偏移
    cached_position: Option<u64>,
    /// 缓存的上一帧末尾 4 字节
    cached_bytes: [u8; 4],
}

impl ApeDemuxer {
    /// 创建 APE 解封装器
    pub fn new() -> Self {
        Self {
            state: ApeState::ReadHeader,
            info: None,
            frames: Vec::new(),
            frame_samples_add_up: Vec::new(),
            frame_positions: Vec::new(),
            current_frame: 0,
            buffer: Vec::new(),
            cached_position: None,
            cached_bytes: [0u8; 4],
        }
    }

    /// 创建解封装器实例 (工厂函数)
    pub fn create() -> LiuResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new()))
    }

    // ========================
    // 头部
    // ========================

    /// 读取头部 (只窥视, 不移动读游标)
    fn read_header(io: &mut IoContext) -> LiuResult<ApeInfo> {
        io.reset_peek_position();
        let mut signature = [0u8; 4];
        io.peek_fully(&mut signature)?;
        if &signature != APE_SIGNATURE {
            return Err(LiuError::InvalidData("不是有效的 APE 文件".into()));
        }
        let mut version_bytes = [0u8; 2];
        io.peek_fully(&mut version_bytes)?;
        let version = u32::from(u16::from_le_bytes(version_bytes));
        io.reset_peek_position();

        let mut info = if version >= 3980 {
            Self::read_header_v3980(io)?
        } else {
            Self::read_header_v0000(io)?
        };

        info.total_samples = if info.total_frames == 0 {
            0
        } else {
            i64::from(info.total_frames - 1) * i64::from(info.blocks_per_frame)
                + i64::from(info.final_frame_blocks)
        };
        info.duration_us = time_us_from_samples(info.total_samples, info.sample_rate);
        Ok(info)
    }

    /// v3980 及以后: 52 字节描述符 + 24 字节头
    fn read_header_v3980(io: &mut IoContext) -> LiuResult<ApeInfo> {
        let mut descriptor = [0u8; 52];
        io.peek_fully(&mut descriptor)?;
        let file_version = u32::from(u16::from_le_bytes([descriptor[4], descriptor[5]]));
        let descriptor_length = u64::from(read_u32(&descriptor, 8));
        let header_length = u64::from(read_u32(&descriptor, 12));
        let seek_table_length = u64::from(read_u32(&descriptor, 16));
        let wav_header_length = u64::from(read_u32(&descriptor, 20));
        let wav_tail_length = u64::from(read_u32(&descriptor, 32));
        if descriptor_length > 52 {
            io.advance_peek_position((descriptor_length - 52) as usize)?;
        }

        let mut header = [0u8; 24];
        io.peek_fully(&mut header)?;
        let compression_type = u32::from(u16::from_le_bytes([header[0], header[1]]));
        let format_flags = u32::from(u16::from_le_bytes([header[2], header[3]]));
        let blocks_per_frame = read_u32(&header, 4);
        let final_frame_blocks = read_u32(&header, 8);
        let total_frames = read_u32(&header, 12);
        let bits_per_sample = u32::from(u16::from_le_bytes([header[16], header[17]]));
        let channels = u32::from(u16::from_le_bytes([header[18], header[19]]));
        let sample_rate = read_u32(&header, 20);
        if header_length > 24 {
            io.advance_peek_position((header_length - 24) as usize)?;
        }

        Ok(ApeInfo {
            file_version,
            compression_type,
            format_flags,
            descriptor_length,
            header_length,
            seek_table_length,
            wav_header_length,
            wav_tail_length,
            blocks_per_frame,
            final_frame_blocks,
            total_frames,
            bits_per_sample,
            channels,
            sample_rate,
            total_samples: 0,
            duration_us: 0,
        })
    }

    /// 旧版: 单个 32 字节头, blocks_per_frame 按版本/压缩级别查表
    fn read_header_v0000(io: &mut IoContext) -> LiuResult<ApeInfo> {
        let mut header = [0u8; 32];
        io.peek_fully(&mut header)?;
        let file_version = u32::from(u16::from_le_bytes([header[4], header[5]]));
        let compression_type = u32::from(u16::from_le_bytes([header[6], header[7]]));
        let format_flags = u32::from(u16::from_le_bytes([header[8], header[9]]));
        let channels = u32::from(u16::from_le_bytes([header[10], header[11]]));
        let sample_rate = read_u32(&header, 12);
        let wav_header_length = u64::from(read_u32(&header, 16));
        let wav_tail_length = u64::from(read_u32(&header, 20));
        let total_frames = read_u32(&header, 24);
        let final_frame_blocks = read_u32(&header, 28);

        // FFmpeg 的版本/压缩级别对照表
        let blocks_per_frame = if file_version >= 3950 {
            73728 * 4
        } else if file_version >= 3900 || (file_version >= 3800 && compression_type >= 4000) {
            73728
        } else {
            9216
        };
        let bits_per_sample = if format_flags & MAC_FORMAT_FLAG_8_BIT != 0 {
            8
        } else if format_flags & MAC_FORMAT_FLAG_24_BIT != 0 {
            24
        } else {
            16
        };

        let mut header_length = 32u64;
        let mut scratch = [0u8; 4];
        if format_flags & MAC_FORMAT_FLAG_HAS_PEAK_LEVEL != 0 {
            io.peek_fully(&mut scratch)?;
            header_length += 4;
        }
        let seek_table_elements = if format_flags & MAC_FORMAT_FLAG_HAS_SEEK_ELEMENTS != 0 {
            io.peek_fully(&mut scratch)?;
            header_length += 4;
            u64::from(u32::from_le_bytes(scratch))
        } else {
            u64::from(total_frames)
        };
        if format_flags & MAC_FORMAT_FLAG_CREATE_WAV_HEADER == 0 {
            io.advance_peek_position(wav_header_length as usize)?;
        }

        Ok(ApeInfo {
            file_version,
            compression_type,
            format_flags,
            descriptor_length: 0,
            header_length,
            seek_table_length: seek_table_elements * 4,
            wav_header_length,
            wav_tail_length,
            blocks_per_frame,
            final_frame_blocks,
            total_frames,
            bits_per_sample,
            channels,
            sample_rate,
            total_samples: 0,
            duration_us: 0,
        })
    }

    // ========================
    // seek 表 → 帧表
    // ========================

    /// 由 seek 表物化帧表 (逻辑源自 FFmpeg libavformat/ape.c)
    fn process_seek_table(&mut self, info: &ApeInfo, io: &mut IoContext) -> LiuResult<()> {
        if info.seek_table_length / 4 < u64::from(info.total_frames) {
            return Err(LiuError::InvalidData("APE seek 表条目数少于帧数".into()));
        }
        let total = info.total_frames as usize;
        if total == 0 {
            return Ok(());
        }

        let mut first_frame_position = info.descriptor_length
            + info.header_length
            + info.seek_table_length
            + info.wav_header_length;
        if info.file_version < 3810 {
            // 旧版在 seek 表后还有每帧一个字节的跳过位表
            first_frame_position += u64::from(info.total_frames);
        }

        let mut frames = vec![ApeFrame::default(); total];
        frames[0].pos = first_frame_position;
        frames[0].blocks = info.blocks_per_frame;

        let mut scratch = [0u8; 4];
        io.peek_fully(&mut scratch)?;
        let first_entry = u64::from(u32::from_le_bytes(scratch));
        if first_entry != first_frame_position {
            return Err(LiuError::InvalidData(format!(
                "APE seek 表首项 {first_entry} 与首帧位置 {first_frame_position} 不符"
            )));
        }
        for i in 1..total {
            io.peek_fully(&mut scratch)?;
            let entry = u64::from(u32::from_le_bytes(scratch));
            frames[i].pos = entry;
            frames[i].blocks = info.blocks_per_frame;
            frames[i - 1].size = (entry - frames[i - 1].pos) as u32;
            frames[i].skip = ((entry - frames[0].pos) & 3) as u32;
        }
        // 越过 seek 表中多余的条目
        let extra = info.seek_table_length - (total as u64) * 4;
        if extra > 0 {
            io.advance_peek_position(extra as usize)?;
        }

        frames[total - 1].blocks = info.final_frame_blocks;
        {
            // 末帧大小由文件总长推出; 长度未知时保守取 final_frame_blocks * 8
            let file_size = io.size().map(|s| s as i64).unwrap_or(-1);
            let mut final_size = 0i64;
            if file_size > 0 {
                final_size =
                    file_size - frames[total - 1].pos as i64 - info.wav_tail_length as i64;
                final_size -= final_size & 3;
            }
            if file_size <= 0 || final_size <= 0 {
                final_size = i64::from(info.final_frame_blocks) * 8;
            }
            frames[total - 1].size = final_size as u32;
        }

        for frame in frames.iter_mut() {
            if frame.skip > 0 {
                frame.pos -= u64::from(frame.skip);
                frame.size += frame.skip;
            }
            frame.size = (frame.size + 3) & !3;
        }
        if info.file_version < 3810 {
            // 跳过位表: 每帧 2 字节
            let mut bits_scratch = [0u8; 2];
            for i in 0..total {
                io.peek_fully(&mut bits_scratch)?;
                let bits = u32::from(u16::from_le_bytes(bits_scratch));
                if i > 0 && bits != 0 {
                    frames[i - 1].size += 4;
                }
                frames[i].skip <<= 3;
                frames[i].skip += bits;
            }
        }

        let mut pts = 0i64;
        for frame in frames.iter_mut() {
            frame.pts = pts;
            pts += i64::from(info.blocks_per_frame);
        }

        self.frame_samples_add_up = frames.iter().map(|f| f.pts).collect();
        self.frame_positions = frames.iter().map(|f| f.pos).collect();
        self.frames = frames;
        Ok(())
    }

    /// FFmpeg APE 解码器的 6 字节配置 (版本 + 压缩级别 + 格式标志)
    fn decoder_config(info: &ApeInfo) -> Bytes {
        let mut config = Vec::with_capacity(6);
        config.extend_from_slice(&(info.file_version as u16).to_le_bytes());
        config.extend_from_slice(&(info.compression_type as u16).to_le_bytes());
        config.extend_from_slice(&(info.format_flags as u16).to_le_bytes());
        Bytes::from(config)
    }

    /// 发布轨道格式
    fn publish_format(&self, info: &ApeInfo, file_size: Option<u64>, sink: &mut dyn TrackSink) {
        let duration_seconds = info.duration_us / 1_000_000;
        let average_bitrate = match (file_size, duration_seconds) {
            (Some(size), seconds) if seconds > 0 => (size as i64 * 8 / seconds) as u32,
            _ => 0,
        };
        sink.track(0, MediaType::Audio);
        sink.format(
            0,
            TrackFormat {
                id: 0,
                mime: stream::AUDIO_APE.to_string(),
                codecs: Some("ape".to_string()),
                sample_rate: info.sample_rate,
                channels: info.channels,
                pcm_encoding: PcmEncoding::from_bits_per_sample(info.bits_per_sample),
                average_bitrate,
                codec_init: vec![Self::decoder_config(info)],
                ..TrackFormat::default()
            },
        );
        sink.end_tracks();
    }

    // ========================
    // 帧读取
    // ========================

    fn read_frames(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<ReadResult> {
        let info = self
            .info
            .ok_or_else(|| LiuError::Internal("帧读取前头部未解析".into()))?;
        if self.current_frame >= info.total_frames as usize {
            return Ok(ReadResult::EndOfInput);
        }

        let input_position = io.position()?;
        let goal_start = self.frames[self.current_frame].pos;
        let mut cache_hit = false;
        if goal_start != input_position {
            cache_hit = self.cached_position == Some(goal_start)
                && input_position <= goal_start + self.cached_bytes.len() as u64;
            if !cache_hit {
                // 帧级定位应由定位映射完成, 这里不应再跳
                warn!(
                    "读取帧 {} 时位置偏差 {} 字节, 重新定位",
                    self.current_frame,
                    goal_start as i64 - input_position as i64
                );
                return Ok(ReadResult::Seek(goal_start));
            }
        }

        let frame = self.frames[self.current_frame];
        let buffer_size = frame.size as usize + FRAME_HEADER_LENGTH;
        if self.buffer.len() < buffer_size {
            self.buffer.resize(buffer_size, 0);
        }

        // 帧头: 块数 + 跳过位 (小端)
        self.buffer[0..4].copy_from_slice(&frame.blocks.to_le_bytes());
        self.buffer[4..8].copy_from_slice(&frame.skip.to_le_bytes());
        let mut bytes_buffered = FRAME_HEADER_LENGTH;

        if cache_hit {
            // 相邻帧重叠的开头几个字节来自缓存
            let bytes_to_copy = (input_position - goal_start) as usize;
            self.buffer[bytes_buffered..bytes_buffered + bytes_to_copy]
                .copy_from_slice(&self.cached_bytes[..bytes_to_copy]);
            bytes_buffered += bytes_to_copy;
        }

        while bytes_buffered < buffer_size {
            let read = io.read(&mut self.buffer[bytes_buffered..buffer_size])?;
            if read == 0 {
                return Ok(ReadResult::EndOfInput);
            }
            bytes_buffered += read;
        }

        self.cached_position = Some(io.position()? - self.cached_bytes.len() as u64);
        self.cached_bytes
            .copy_from_slice(&self.buffer[buffer_size - 4..buffer_size]);

        sink.sample_data(0, &self.buffer[..buffer_size]);
        let time_us = if self.current_frame == 0 {
            0
        } else {
            time_us_from_samples(
                self.current_frame as i64 * i64::from(info.blocks_per_frame),
                info.sample_rate,
            )
        };
        sink.sample_metadata(0, time_us, SAMPLE_FLAG_KEY_FRAME, buffer_size as u32, 0);
        self.current_frame += 1;

        if self.current_frame == info.total_frames as usize {
            Ok(ReadResult::EndOfInput)
        } else {
            Ok(ReadResult::Continue)
        }
    }
}

impl Default for ApeDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer for ApeDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Ape
    }

    fn name(&self) -> &str {
        "ape"
    }

    fn sniff(&mut self, io: &mut IoContext) -> LiuResult<bool> {
        io.reset_peek_position();
        let mut signature = [0u8; 4];
        let ok = match io.peek_fully(&mut signature) {
            Ok(()) => &signature == APE_SIGNATURE,
            Err(LiuError::Eof) => false,
            Err(err) => return Err(err),
        };
        io.reset_peek_position();
        Ok(ok)
    }

    fn read(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<ReadResult> {
        match self.state {
            ApeState::ReadHeader => {
                io.reset_peek_position();
                let info = Self::read_header(io)?;
                self.process_seek_table(&info, io)?;
                self.publish_format(&info, io.size(), sink);
                sink.seek_map(SeekMap::Seekable {
                    duration_us: info.duration_us,
                });
                self.info = Some(info);
                if info.total_frames > 0 {
                    // 预先分配到最大帧, 容量此后只增不减
                    let largest = self.frames.iter().map(|f| f.size).max().unwrap_or(0);
                    self.buffer = vec![0u8; largest as usize + FRAME_HEADER_LENGTH];
                    let skip = self.frames[0].pos.saturating_sub(io.position()?);
                    io.skip(skip as usize)?;
                    self.state = ApeState::ReadFrames;
                    self.current_frame = 0;
                    Ok(ReadResult::Continue)
                } else {
                    Ok(ReadResult::EndOfInput)
                }
            }
            ApeState::ReadFrames => {
                io.reset_peek_position();
                self.read_frames(io, sink)
            }
        }
    }

    fn seek_points(&mut self, time_us: i64) -> SeekPoints {
        let Some(info) = self.info else {
            return SeekPoints::single(SeekPoint::new(0, 0));
        };
        if self.frame_samples_add_up.is_empty() {
            return SeekPoints::single(SeekPoint::new(0, 0));
        }
        let target_sample = samples_from_time_us(time_us, info.sample_rate, info.total_samples);
        let index = binary_search_floor(&self.frame_samples_add_up, target_sample);
        let first = SeekPoint::new(
            time_us_from_samples(self.frame_samples_add_up[index], info.sample_rate),
            self.frame_positions[index],
        );
        if first.time_us == time_us || index == self.frame_samples_add_up.len() - 1 {
            SeekPoints::single(first)
        } else {
            SeekPoints::pair(
                first,
                SeekPoint::new(
                    time_us_from_samples(self.frame_samples_add_up[index + 1], info.sample_rate),
                    self.frame_positions[index + 1],
                ),
            )
        }
    }

    fn seek(&mut self, position: u64, time_us: i64) {
        if position == 0 {
            self.state = ApeState::ReadHeader;
            return;
        }
        let Some(info) = self.info else {
            return;
        };
        let samples = samples_from_time_us(time_us, info.sample_rate, info.total_samples);
        self.current_frame = binary_search_floor(&self.frame_samples_add_up, samples);
    }

    fn duration_us(&self) -> Option<i64> {
        self.info.map(|info| info.duration_us)
    }
}

/// APE 格式探测器
pub struct ApeProbe;

impl FormatProbe for ApeProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if data.len() >= 4 && &data[0..4] == APE_SIGNATURE {
            return Some(SCORE_MAX);
        }
        if let Some(name) = filename {
            let lower = name.to_lowercase();
            if lower.ends_with(".ape") || lower.ends_with(".mac") {
                return Some(SCORE_EXTENSION);
            }
        }
        None
    }

    fn format_id(&self) -> FormatId {
        FormatId::Ape
    }
}

/// 小端 u32 读取
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// 最大的满足 `array[i] <= value` 的下标, 全部更大时返回 0
fn binary_search_floor(array: &[i64], value: i64) -> usize {
    array.partition_point(|&x| x <= value).saturating_sub(1)
}
