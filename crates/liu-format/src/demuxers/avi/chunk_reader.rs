//! movi 数据块读取器.
//!
//! 每条音视频流一个 [`ChunkReader`], 消费 `movi` 中属于本流的数据块并
//! 产出带时间戳的样本. 共享状态放在 [`ChunkReader`] 本体, 按载荷差异
//! 分三个变体:
//! - 视频: 原样转发字节, 按块序号推导时间戳, 按索引命中设置关键帧标志;
//! - MP3: 块内可能混入 ID3 碎片或零填充, 需要按 MPEG 帧头逐字节重同步;
//! - AC3: 把载荷交给外部注入的 AC3 包读取器切分.
//!
//! 读取器同时负责解析落在 `movi` 中的本流 `ix##` 索引块并安装到自己的
//! [`StreamIndex`].

use log::{debug, warn};

use liu_core::{LiuError, LiuResult, MICROS_PER_SECOND, NOPTS_VALUE};

use crate::demuxer::{TrackSink, SAMPLE_FLAG_KEY_FRAME};
use crate::io::IoContext;

use super::super::mpeg_audio;
use super::index::{StreamIndex, StreamIndexChunk};

/// MPEG-1 Layer III 每帧采样数
const SAMPLES_PER_FRAME_L3_V1: u32 = 1152;

/// 重同步时单次读入 scratch 的最大字节数
///
/// 取小值以避免一次读入多个帧; 只有定位后的重同步才会走到这条慢路径.
const RESYNC_READ_LIMIT: usize = 16;

/// AC3 包读取器能力
///
/// AC3 的帧切分属于编解码层, 由宿主注入实现; 读取器只负责在块首
/// 告知时间戳并移交载荷字节.
pub trait Ac3PacketReader: Send {
    /// 一个新数据包 (一个 AVI 数据块) 开始
    fn packet_started(&mut self, time_us: i64, flags: u32);

    /// 消费数据包载荷
    fn consume(&mut self, data: &[u8], track_id: u32, sink: &mut dyn TrackSink) -> LiuResult<()>;
}

/// 按流序号和后缀两字符组装数据块 FourCC (如 1 + "wb" -> "01wb")
fn chunk_id_fourcc(stream_id: u32, suffix: [u8; 2]) -> u32 {
    let tens = (stream_id / 10) as u8;
    let ones = (stream_id % 10) as u8;
    u32::from_le_bytes([b'0' + tens, b'0' + ones, suffix[0], suffix[1]])
}

/// 组装索引块 FourCC (如 1 -> "ix01")
fn index_chunk_fourcc(stream_id: u32) -> u32 {
    let tens = (stream_id / 10) as u8;
    let ones = (stream_id % 10) as u8;
    u32::from_le_bytes([b'i', b'x', b'0' + tens, b'0' + ones])
}

/// 各变体独有的载荷状态
enum ChunkPayload {
    /// 视频直通
    Video {
        /// 当前数据块的全局块序号 (由索引解出; None 表示未知)
        current_chunk_index: Option<u32>,
    },
    /// MP3 帧重同步
    Mp3 {
        /// 采样率 (来自 strf)
        sample_rate: u32,
        /// 当前 MPEG 帧剩余字节 (0 表示正在寻找下一帧)
        frame_remaining: u32,
        /// 最近一次识别出的帧大小
        frame_size: u32,
        /// 重同步 scratch 缓冲
        scratch: Vec<u8>,
        /// scratch 的读取位置
        scratch_pos: usize,
        /// 流内当前时间 (微秒)
        time_us: i64,
        /// 因分段索引待定而推迟时钟同步的次数 (诊断)
        pending_sync_skips: u64,
    },
    /// AC3 直通到包读取器
    Ac3 {
        /// 外部注入的包读取器
        reader: Box<dyn Ac3PacketReader>,
        /// 中转缓冲
        scratch: Vec<u8>,
        /// 流内当前时间 (微秒)
        time_us: i64,
    },
}

/// movi 数据块读取器
pub struct ChunkReader {
    /// 轨道 id (容器流序号)
    track_id: u32,
    /// 主数据块 FourCC (如 "00dc" / "01wb")
    chunk_id: u32,
    /// 备用 FourCC; 个别封装器用未压缩视频 id ("db") 标记关键帧
    alt_chunk_id: Option<u32>,
    /// 本流索引块 FourCC (如 "ix00")
    index_chunk_id: u32,
    /// 流时长 (微秒)
    duration_us: i64,
    /// 流头声明的数据块总数
    stream_chunk_count: u32,
    /// 当前数据块大小
    current_chunk_size: u32,
    /// 当前数据块剩余未消费字节
    bytes_remaining: u32,
    /// 当前数据块头的文件偏移
    current_chunk_offset: u64,
    /// 当前块是本流的索引块
    index_chunk_start: bool,
    /// 本流的索引状态机 (读取器独占)
    pub index: StreamIndex,
    /// 变体载荷
    payload: ChunkPayload,
}

impl ChunkReader {
    /// 创建视频块读取器
    ///
    /// 顺序播放从块序号 0 起自然计数; 只有定位会使序号失效,
    /// 之后按偏移从索引中解出.
    pub fn video(track_id: u32, duration_us: i64, stream_chunk_count: u32) -> Self {
        Self::new(
            track_id,
            chunk_id_fourcc(track_id, *b"dc"),
            Some(chunk_id_fourcc(track_id, *b"db")),
            duration_us,
            stream_chunk_count,
            ChunkPayload::Video {
                current_chunk_index: Some(0),
            },
        )
    }

    /// 创建通用音频直通块读取器
    ///
    /// PCM/AAC 等一块一样本的音频与视频直通走同一套机制,
    /// 只是块 FourCC 用 "wb" 且没有备用 id.
    pub fn audio_passthrough(track_id: u32, duration_us: i64, stream_chunk_count: u32) -> Self {
        Self::new(
            track_id,
            chunk_id_fourcc(track_id, *b"wb"),
            None,
            duration_us,
            stream_chunk_count,
            ChunkPayload::Video {
                current_chunk_index: Some(0),
            },
        )
    }

    /// 创建 MP3 块读取器
    pub fn mp3(track_id: u32, duration_us: i64, sample_rate: u32, stream_chunk_count: u32) -> Self {
        Self::new(
            track_id,
            chunk_id_fourcc(track_id, *b"wb"),
            None,
            duration_us,
            stream_chunk_count,
            ChunkPayload::Mp3 {
                sample_rate,
                frame_remaining: 0,
                frame_size: 0,
                scratch: Vec::with_capacity(RESYNC_READ_LIMIT),
                scratch_pos: 0,
                time_us: NOPTS_VALUE,
                pending_sync_skips: 0,
            },
        )
    }

    /// 创建 AC3 块读取器
    pub fn ac3(
        track_id: u32,
        duration_us: i64,
        stream_chunk_count: u32,
        reader: Box<dyn Ac3PacketReader>,
    ) -> Self {
        Self::new(
            track_id,
            chunk_id_fourcc(track_id, *b"wb"),
            None,
            duration_us,
            stream_chunk_count,
            ChunkPayload::Ac3 {
                reader,
                scratch: Vec::new(),
                time_us: NOPTS_VALUE,
            },
        )
    }

    fn new(
        track_id: u32,
        chunk_id: u32,
        alt_chunk_id: Option<u32>,
        duration_us: i64,
        stream_chunk_count: u32,
        payload: ChunkPayload,
    ) -> Self {
        Self {
            track_id,
            chunk_id,
            alt_chunk_id,
            index_chunk_id: index_chunk_fourcc(track_id),
            duration_us,
            stream_chunk_count,
            current_chunk_size: 0,
            bytes_remaining: 0,
            current_chunk_offset: 0,
            index_chunk_start: false,
            index: StreamIndex::new(stream_chunk_count, duration_us),
            payload,
        }
    }

    /// 轨道 id
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// 流时长 (微秒)
    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    /// 是否为视频流读取器
    pub fn is_video(&self) -> bool {
        matches!(self.payload, ChunkPayload::Video { .. })
    }

    /// 本读取器是否处理该 FourCC (主、备用或索引块)
    pub fn handles(&self, fourcc: u32) -> bool {
        self.chunk_id == fourcc
            || self.alt_chunk_id == Some(fourcc)
            || self.index_chunk_id == fourcc
    }

    /// 该 FourCC 是否为本流的索引块
    pub fn handles_index_chunk(&self, fourcc: u32) -> bool {
        self.index_chunk_id == fourcc
    }

    /// 准备解析一个大小为 `size` 的数据块
    pub fn on_chunk_start(&mut self, fourcc: u32, size: u32) {
        if fourcc == self.index_chunk_id {
            self.index_chunk_start = true;
        }
        self.current_chunk_size = size;
        self.bytes_remaining = size;
    }

    /// 消费当前数据块的数据, 返回整块是否已解析完
    pub fn on_chunk_data(
        &mut self,
        io: &mut IoContext,
        sink: &mut dyn TrackSink,
    ) -> LiuResult<bool> {
        if self.current_chunk_size == self.bytes_remaining {
            // 块首: 读游标在 8 字节块头之后
            self.current_chunk_offset = io.position()?.saturating_sub(8);
        }
        if self.index_chunk_start {
            self.index_chunk_start = false;
            return self.process_index_chunk(io);
        }
        match self.payload {
            ChunkPayload::Video { .. } => self.on_video_data(io, sink),
            ChunkPayload::Mp3 { .. } => self.on_mp3_data(io, sink),
            ChunkPayload::Ac3 { .. } => self.on_ac3_data(io, sink),
        }
    }

    /// 解封装器将要执行一次传输层定位
    ///
    /// 重置当前块进度并使变体状态失效; 用户时间定位还会在索引上
    /// 按需登记分段加载.
    pub fn will_seek_to(&mut self, position: u64, time_us: i64) -> bool {
        let needs_indices = self.index.will_seek_to(position, time_us);
        self.bytes_remaining = 0;
        self.current_chunk_size = 0;
        self.index_chunk_start = false;
        match &mut self.payload {
            ChunkPayload::Video {
                current_chunk_index,
            } => {
                *current_chunk_index = if !self.index.is_ready() && !self.index.is_open_dml() {
                    Some(0)
                } else {
                    self.index.chunk_index_by_position(position)
                };
            }
            ChunkPayload::Mp3 {
                frame_remaining,
                scratch,
                scratch_pos,
                time_us: mp3_time,
                ..
            } => {
                *frame_remaining = 0;
                scratch.clear();
                *scratch_pos = 0;
                *mp3_time = NOPTS_VALUE;
            }
            ChunkPayload::Ac3 {
                time_us: ac3_time, ..
            } => {
                *ac3_time = NOPTS_VALUE;
            }
        }
        needs_indices
    }

    /// 状态摘要 (日志用)
    pub fn report(&self) -> String {
        let kind = match &self.payload {
            ChunkPayload::Video { .. } => "视频".to_string(),
            ChunkPayload::Mp3 {
                pending_sync_skips, ..
            } => format!("MP3 (推迟时钟同步 {pending_sync_skips} 次)"),
            ChunkPayload::Ac3 { .. } => "AC3".to_string(),
        };
        format!(
            "轨道 {} ({kind}): 声明块数 {}, 时长 {} 微秒, {}",
            self.track_id,
            self.stream_chunk_count,
            self.duration_us,
            if self.index.is_open_dml() {
                "OpenDML 索引"
            } else {
                "仅 idx1 索引"
            }
        )
    }

    // ========================
    // 索引块
    // ========================

    /// 整块读入并解析 `indx`/`ix##`, 安装到本流索引
    fn process_index_chunk(&mut self, io: &mut IoContext) -> LiuResult<bool> {
        let body = io.read_bytes(self.bytes_remaining as usize)?;
        self.bytes_remaining = 0;
        match StreamIndexChunk::parse(body) {
            Ok(StreamIndexChunk::Super { entries }) => {
                self.index.install_super_index(&entries);
            }
            Ok(StreamIndexChunk::Standard {
                base_offset,
                entries,
            }) => {
                let position = io.position()?;
                self.index
                    .install_standard_index(base_offset, &entries, Some(position));
            }
            Err(LiuError::Unsupported(kind)) => {
                warn!("轨道 {} 的索引块不受支持, 丢弃: {kind}", self.track_id);
            }
            Err(err) => return Err(err),
        }
        Ok(true)
    }

    // ========================
    // 视频
    // ========================

    fn on_video_data(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<bool> {
        let ChunkPayload::Video {
            current_chunk_index,
        } = &mut self.payload
        else {
            return Err(LiuError::Internal("载荷变体与调用不符".into()));
        };
        if current_chunk_index.is_none()
            && self.current_chunk_size == self.bytes_remaining
            && self.index.pending_seek_offset().is_none()
        {
            *current_chunk_index = self.index.chunk_index_by_position(self.current_chunk_offset);
            if let Some(chunk_index) = current_chunk_index {
                debug!(
                    "轨道 {}: 由偏移 {} 解出块序号 {chunk_index}",
                    self.track_id, self.current_chunk_offset
                );
            }
        }
        let Some(chunk_index) = *current_chunk_index else {
            // 块序号未知 (定位后落在未索引区域): 静默丢弃该块
            io.skip(self.bytes_remaining as usize)?;
            self.bytes_remaining = 0;
            return Ok(true);
        };
        let read = sink.sample_data_from(self.track_id, io, self.bytes_remaining as usize)?;
        if read == 0 && self.bytes_remaining > 0 {
            return Err(LiuError::Eof);
        }
        self.bytes_remaining -= read as u32;
        let done = self.bytes_remaining == 0;
        if done {
            if self.current_chunk_size > 0 {
                let time_us = self.index.chunk_timestamp_us(chunk_index);
                let flags = if self.index.is_key_frame_offset(self.current_chunk_offset) {
                    SAMPLE_FLAG_KEY_FRAME
                } else {
                    0
                };
                sink.sample_metadata(self.track_id, time_us, flags, self.current_chunk_size, 0);
            }
            *current_chunk_index = Some(chunk_index + 1);
        }
        Ok(done)
    }

    // ========================
    // MP3
    // ========================

    fn on_mp3_data(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<bool> {
        let ChunkPayload::Mp3 {
            sample_rate,
            frame_remaining,
            frame_size,
            scratch,
            scratch_pos,
            time_us,
            pending_sync_skips,
        } = &mut self.payload
        else {
            return Err(LiuError::Internal("载荷变体与调用不符".into()));
        };
        let sample_rate = *sample_rate;

        if self.current_chunk_size == 0 {
            // 空块: 只推进时钟一帧
            advance_mp3_time(time_us, sample_rate);
            return Ok(true);
        }
        if self.bytes_remaining == self.current_chunk_size && *time_us == NOPTS_VALUE {
            // 块首时钟同步; 分段索引待定时不问索引
            if self.index.pending_seek_offset().is_none() {
                if let Some(ts) = self.index.timestamp_for_offset(self.current_chunk_offset) {
                    *time_us = ts;
                    debug!(
                        "轨道 {}: 块偏移 {} 时钟同步到 {ts} 微秒",
                        self.track_id, self.current_chunk_offset
                    );
                }
            } else {
                *pending_sync_skips += 1;
            }
        }
        if *frame_remaining == 0 {
            // 寻找下一个 MPEG 帧头
            match find_frame(io, scratch, scratch_pos, &mut self.bytes_remaining)? {
                Some(header) => {
                    *frame_remaining = header.frame_size;
                    *frame_size = header.frame_size;
                }
                None => {
                    if scratch.len() >= self.current_chunk_size as usize {
                        // 整块都没有可用帧头 (ID3 碎片或零填充):
                        // 丢弃, 时钟仍推进一帧, 避免污染解码器
                        scratch.clear();
                        *scratch_pos = 0;
                        advance_mp3_time(time_us, sample_rate);
                    }
                    return Ok(self.bytes_remaining == 0);
                }
            }
        }
        // 先倒出 scratch 中积累的帧数据 (含 4 字节帧头)
        let scratch_left = scratch.len() - *scratch_pos;
        if scratch_left > 0 {
            sink.sample_data(self.track_id, &scratch[*scratch_pos..]);
            *frame_remaining = frame_remaining.saturating_sub(scratch_left as u32);
            scratch.clear();
            *scratch_pos = 0;
        }
        // 再从输入直接流式送入, 不越过帧尾也不越过块尾
        let to_read = (*frame_remaining).min(self.bytes_remaining) as usize;
        let read = if to_read > 0 {
            let read = sink.sample_data_from(self.track_id, io, to_read)?;
            if read == 0 {
                return Err(LiuError::Eof);
            }
            read
        } else {
            0
        };
        *frame_remaining -= read as u32;
        if *frame_remaining == 0 {
            if *frame_size > 0 {
                sink.sample_metadata(
                    self.track_id,
                    *time_us,
                    SAMPLE_FLAG_KEY_FRAME,
                    *frame_size,
                    0,
                );
            }
            advance_mp3_time(time_us, sample_rate);
        }
        self.bytes_remaining -= read as u32;
        Ok(self.bytes_remaining == 0)
    }

    // ========================
    // AC3
    // ========================

    fn on_ac3_data(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<bool> {
        let ChunkPayload::Ac3 {
            reader,
            scratch,
            time_us,
        } = &mut self.payload
        else {
            return Err(LiuError::Internal("载荷变体与调用不符".into()));
        };
        if self.bytes_remaining == self.current_chunk_size && *time_us == NOPTS_VALUE {
            if let Some(ts) = self.index.timestamp_for_offset(self.current_chunk_offset) {
                *time_us = ts;
                debug!(
                    "轨道 {}: 块偏移 {} 时钟同步到 {ts} 微秒",
                    self.track_id, self.current_chunk_offset
                );
                reader.packet_started(ts, 0);
            }
        }
        if *time_us == NOPTS_VALUE {
            // 时间戳无从推导: 丢弃该块
            io.skip(self.bytes_remaining as usize)?;
            self.bytes_remaining = 0;
            return Ok(true);
        }
        let to_read = self.bytes_remaining as usize;
        if scratch.len() < to_read {
            scratch.resize(to_read, 0);
        }
        let read = io.read(&mut scratch[..to_read])?;
        if read == 0 {
            return Err(LiuError::Eof);
        }
        self.bytes_remaining -= read as u32;
        reader.consume(&scratch[..read], self.track_id, sink)?;
        Ok(self.bytes_remaining == 0)
    }
}

/// 推进 MP3 时钟一帧 (时钟未同步时不动)
fn advance_mp3_time(time_us: &mut i64, sample_rate: u32) {
    if *time_us != NOPTS_VALUE && sample_rate > 0 {
        *time_us += i64::from(SAMPLES_PER_FRAME_L3_V1) * MICROS_PER_SECOND / i64::from(sample_rate);
    }
}

/// 向 scratch 软读取至多 `bytes` 字节, 返回实际读到的字节数 (0 = 流结束)
fn read_scratch(
    io: &mut IoContext,
    scratch: &mut Vec<u8>,
    bytes_remaining: &mut u32,
    bytes: usize,
) -> LiuResult<usize> {
    let to_read = bytes.min(*bytes_remaining as usize);
    if to_read == 0 {
        return Ok(0);
    }
    let old_len = scratch.len();
    scratch.resize(old_len + to_read, 0);
    let read = io.read(&mut scratch[old_len..])?;
    scratch.truncate(old_len + read);
    *bytes_remaining -= read as u32;
    Ok(read)
}

/// 在当前块内寻找有效的 MPEG 帧头
///
/// 以至多 [`RESYNC_READ_LIMIT`] 字节为步长读入 scratch, 不匹配则滑动
/// 1 字节重试. 命中时 4 字节帧头保留在 scratch 中, 作为样本的起始.
fn find_frame(
    io: &mut IoContext,
    scratch: &mut Vec<u8>,
    scratch_pos: &mut usize,
    bytes_remaining: &mut u32,
) -> LiuResult<Option<mpeg_audio::MpegAudioHeader>> {
    let mut to_read = 4usize;
    while *bytes_remaining > 0 {
        if read_scratch(io, scratch, bytes_remaining, to_read)? == 0 {
            break;
        }
        while scratch.len() - *scratch_pos >= 4 {
            let b = &scratch[*scratch_pos..];
            let word = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            if let Some(header) = mpeg_audio::parse_header(word) {
                return Ok(Some(header));
            }
            *scratch_pos += 1;
        }
        to_read = (*bytes_remaining as usize).min(RESYNC_READ_LIMIT);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demuxer::SeekMap;
    use crate::io::MemoryBackend;
    use crate::stream::TrackFormat;
    use liu_core::MediaType;

    /// 收集样本的测试接收器
    #[derive(Default)]
    struct CollectSink {
        data: Vec<u8>,
        samples: Vec<(u32, i64, u32, u32)>,
    }

    impl TrackSink for CollectSink {
        fn track(&mut self, _id: u32, _media_type: MediaType) {}
        fn format(&mut self, _id: u32, _format: TrackFormat) {}
        fn end_tracks(&mut self) {}

        fn sample_data(&mut self, _id: u32, data: &[u8]) {
            self.data.extend_from_slice(data);
        }

        fn sample_data_from(
            &mut self,
            _id: u32,
            io: &mut IoContext,
            length: usize,
        ) -> LiuResult<usize> {
            let mut buf = vec![0u8; length];
            let read = io.read(&mut buf)?;
            self.data.extend_from_slice(&buf[..read]);
            Ok(read)
        }

        fn sample_metadata(&mut self, id: u32, time_us: i64, flags: u32, size: u32, _offset: u32) {
            self.samples.push((id, time_us, flags, size));
        }

        fn seek_map(&mut self, _seek_map: SeekMap) {}
    }

    fn memory_io(data: Vec<u8>) -> IoContext {
        IoContext::new(Box::new(MemoryBackend::from_data(data)))
    }

    /// 一个有效的 417 字节 MPEG-1 Layer III 帧 (128 kbps / 44100 Hz)
    fn mp3_frame() -> Vec<u8> {
        let mut frame = vec![0x55u8; 417];
        frame[0] = 0xFF;
        frame[1] = 0xFB;
        frame[2] = 0x90;
        frame[3] = 0x00;
        frame
    }

    /// 驱动读取器读完一个块
    fn drive_chunk(
        reader: &mut ChunkReader,
        io: &mut IoContext,
        sink: &mut CollectSink,
        fourcc: u32,
        size: u32,
    ) {
        reader.on_chunk_start(fourcc, size);
        loop {
            if reader.on_chunk_data(io, sink).unwrap() {
                break;
            }
        }
    }

    #[test]
    fn test_mp3_前导杂质重同步() {
        // 块体: 8 字节杂质 + 一个完整 MPEG 帧
        let mut file = Vec::new();
        file.extend_from_slice(b"01wb");
        let frame = mp3_frame();
        let body_len = 8 + frame.len();
        file.extend_from_slice(&(body_len as u32).to_le_bytes());
        file.extend_from_slice(&[0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00]); // ID3 碎片
        file.extend_from_slice(&frame);

        let mut reader = ChunkReader::mp3(1, 1_000_000, 44100, 1);
        reader.index.append_idx1_key_frame(0, body_len as u32);
        reader.index.increment_idx1_chunk_count();

        let mut io = memory_io(file);
        io.skip(8).unwrap(); // 跳过块头, 模拟解封装器的路由
        let mut sink = CollectSink::default();
        drive_chunk(&mut reader, &mut io, &mut sink, chunk_id_fourcc(1, *b"wb"), body_len as u32);

        // 杂质被滤除, 样本从帧头开始
        assert_eq!(sink.data.len(), 417);
        assert_eq!(&sink.data[..4], &[0xFF, 0xFB, 0x90, 0x00]);
        assert_eq!(sink.samples.len(), 1);
        let (id, time_us, flags, size) = sink.samples[0];
        assert_eq!(id, 1);
        assert_eq!(time_us, 0); // 全帧索引下块序号 0
        assert_eq!(flags, SAMPLE_FLAG_KEY_FRAME);
        assert_eq!(size, 417);
    }

    #[test]
    fn test_mp3_空块只推进时钟() {
        let frame = mp3_frame();
        let mut file = Vec::new();
        // 块 0: 一个完整帧; 块 1: 空块; 块 2: 又一个完整帧
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        file.extend_from_slice(&frame);
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        file.extend_from_slice(&frame);

        let mut reader = ChunkReader::mp3(1, 1_000_000, 44100, 3);
        reader.index.append_idx1_key_frame(0, frame.len() as u32);
        reader.index.increment_idx1_chunk_count();
        reader.index.increment_idx1_chunk_count();
        reader.index.increment_idx1_chunk_count();

        let mut io = memory_io(file);
        let mut sink = CollectSink::default();
        let fourcc = chunk_id_fourcc(1, *b"wb");

        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, frame.len() as u32);
        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, 0);
        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, frame.len() as u32);

        // 空块没有样本, 但时钟被推进: 第二个样本隔了两个帧时长
        assert_eq!(sink.samples.len(), 2);
        let frame_time = 1152 * 1_000_000 / 44100;
        assert_eq!(sink.samples[0].1, 0);
        assert_eq!(sink.samples[1].1, 2 * frame_time);
    }

    #[test]
    fn test_mp3_整块无帧头被丢弃且时钟推进() {
        let frame = mp3_frame();
        let mut file = Vec::new();
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        file.extend_from_slice(&frame);
        // 32 字节零填充块, 不含任何帧头
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&32u32.to_le_bytes());
        file.extend_from_slice(&[0u8; 32]);
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        file.extend_from_slice(&frame);

        let mut reader = ChunkReader::mp3(1, 1_000_000, 44100, 3);
        reader.index.append_idx1_key_frame(0, frame.len() as u32);
        for _ in 0..3 {
            reader.index.increment_idx1_chunk_count();
        }

        let mut io = memory_io(file);
        let mut sink = CollectSink::default();
        let fourcc = chunk_id_fourcc(1, *b"wb");

        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, frame.len() as u32);
        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, 32);
        io.skip(8).unwrap();
        drive_chunk(&mut reader, &mut io, &mut sink, fourcc, frame.len() as u32);

        assert_eq!(sink.samples.len(), 2);
        let frame_time = 1152 * 1_000_000 / 44100;
        assert_eq!(sink.samples[1].1, 2 * frame_time);
        // 零填充没有混入样本数据
        assert_eq!(sink.data.len(), 2 * 417);
    }

    /// 记录调用的 AC3 包读取器 (状态共享给测试断言)
    struct RecordingAc3Reader {
        started: std::sync::Arc<std::sync::Mutex<Vec<i64>>>,
        consumed: std::sync::Arc<std::sync::Mutex<usize>>,
    }

    impl Ac3PacketReader for RecordingAc3Reader {
        fn packet_started(&mut self, time_us: i64, _flags: u32) {
            self.started.lock().unwrap().push(time_us);
        }

        fn consume(
            &mut self,
            data: &[u8],
            _track_id: u32,
            _sink: &mut dyn TrackSink,
        ) -> LiuResult<()> {
            *self.consumed.lock().unwrap() += data.len();
            Ok(())
        }
    }

    #[test]
    fn test_ac3_块首上报时间戳() {
        let mut file = Vec::new();
        file.extend_from_slice(b"01wb");
        file.extend_from_slice(&64u32.to_le_bytes());
        file.extend_from_slice(&[0xAAu8; 64]);

        let started = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let consumed = std::sync::Arc::new(std::sync::Mutex::new(0usize));
        let mut reader = ChunkReader::ac3(
            1,
            2_000_000,
            1,
            Box::new(RecordingAc3Reader {
                started: started.clone(),
                consumed: consumed.clone(),
            }),
        );
        reader.index.append_idx1_key_frame(0, 64);
        reader.index.increment_idx1_chunk_count();

        let mut io = memory_io(file);
        io.skip(8).unwrap();
        let mut sink = CollectSink::default();
        drive_chunk(&mut reader, &mut io, &mut sink, chunk_id_fourcc(1, *b"wb"), 64);

        assert_eq!(*started.lock().unwrap(), vec![0]);
        assert_eq!(*consumed.lock().unwrap(), 64);
    }

    #[test]
    fn test_视频_定位后未知偏移的块被静默丢弃() {
        let mut file = Vec::new();
        file.extend_from_slice(b"00dc");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&[0x11u8; 16]);

        let mut reader = ChunkReader::video(0, 1_000_000, 10);
        // 索引只认识偏移 9999
        reader.index.append_idx1_key_frame(9999, 16);
        reader.index.increment_idx1_chunk_count();
        // 定位使块序号失效; 偏移 0 处的块不在索引中
        reader.will_seek_to(500, NOPTS_VALUE);

        let mut io = memory_io(file);
        io.skip(8).unwrap();
        let mut sink = CollectSink::default();
        drive_chunk(&mut reader, &mut io, &mut sink, chunk_id_fourcc(0, *b"dc"), 16);

        assert!(sink.samples.is_empty());
        assert!(sink.data.is_empty());
    }

    #[test]
    fn test_视频_关键帧标志与时间戳() {
        let mut file = Vec::new();
        file.extend_from_slice(b"00dc");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&[0x22u8; 16]);

        let mut reader = ChunkReader::video(0, 1_000_000, 10);
        // 全帧索引: 10 个块都在 idx1 中, 偏移 0 是第 5 块的关键帧
        for i in 0..10u32 {
            if i == 5 {
                reader.index.append_idx1_key_frame(0, 16);
            }
            reader.index.increment_idx1_chunk_count();
        }
        // 定位后块序号由偏移解出
        reader.will_seek_to(0, NOPTS_VALUE);

        let mut io = memory_io(file);
        io.skip(8).unwrap();
        let mut sink = CollectSink::default();
        drive_chunk(&mut reader, &mut io, &mut sink, chunk_id_fourcc(0, *b"dc"), 16);

        assert_eq!(sink.samples.len(), 1);
        let (_, time_us, flags, size) = sink.samples[0];
        assert_eq!(time_us, 5 * 1_000_000 / 10);
        assert_eq!(flags, SAMPLE_FLAG_KEY_FRAME);
        assert_eq!(size, 16);
        assert_eq!(sink.data, vec![0x22u8; 16]);
    }

    #[test]
    fn test_fourcc_组装() {
        assert_eq!(chunk_id_fourcc(0, *b"dc"), u32::from_le_bytes(*b"00dc"));
        assert_eq!(chunk_id_fourcc(1, *b"wb"), u32::from_le_bytes(*b"01wb"));
        assert_eq!(chunk_id_fourcc(12, *b"dc"), u32::from_le_bytes(*b"12dc"));
        assert_eq!(index_chunk_fourcc(1), u32::from_le_bytes(*b"ix01"));
    }
}
