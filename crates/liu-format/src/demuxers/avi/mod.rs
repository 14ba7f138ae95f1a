//! AVI (Audio Video Interleave) 解封装器, 含 OpenDML 扩展索引.
//!
//! 文件结构:
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih (主头)
//!     LIST 'strl' (每流一个: strh + strf [+ strn] [+ indx])
//!   LIST 'movi'
//!     00dc / 00db (视频数据, 关键/非关键)
//!     01wb        (音频数据)
//!     ix00 / ix01 (OpenDML 分段索引, 散布其中)
//!     LIST 'rec ' (交错分组)
//!   idx1 (旧式平坦索引, 可选)
//! RIFF 'AVIX'     (超过 2GiB 的续接载荷, 可多个)
//!   LIST 'movi'
//! ```
//!
//! 解析按显式状态机推进, 每次 [`Demuxer::read`] 只消费一小段输入.
//! OpenDML 文件的定位可能要先绕道读取 `ix##` 分段索引
//! (见 [`index::StreamIndex`] 的惰性加载说明).

pub mod chunk_reader;
pub mod headers;
pub mod index;

use log::{debug, info, warn};

use liu_core::{LiuError, LiuResult, NOPTS_VALUE};

use crate::demuxer::{Demuxer, ReadResult, SeekMap, SeekPoint, SeekPoints, TrackSink};
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream;

use chunk_reader::{Ac3PacketReader, ChunkReader};
use headers::parse_hdrl;
use index::{SeekAnswer, StreamIndexChunk};

/// 把 4 字节标签视作小端 u32
const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

const FOURCC_RIFF: u32 = fourcc(b"RIFF");
const FOURCC_AVI_: u32 = fourcc(b"AVI ");
const FOURCC_AVIX: u32 = fourcc(b"AVIX");
const FOURCC_LIST: u32 = fourcc(b"LIST");
const FOURCC_MOVI: u32 = fourcc(b"movi");
const FOURCC_REC: u32 = fourcc(b"rec ");
const FOURCC_JUNK: u32 = fourcc(b"JUNK");
const FOURCC_IDX1: u32 = fourcc(b"idx1");

/// idx1 条目标志: 关键帧
const AVIIF_KEYFRAME: u32 = 0x10;

/// 向前重定位不超过该距离时直接跳读, 不触发传输层 seek
///
/// 短距离跳读比 seek 便宜 (网络输入上 seek 往往要重建连接).
const RELOAD_MIN_SKIP: u64 = 256 * 1024;

/// AC3 包读取器工厂
pub type Ac3ReaderFactory = fn() -> Box<dyn Ac3PacketReader>;

/// 解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// 校验 12 字节文件头
    SkipToHdrl,
    /// 读取 hdrl 列表头
    ReadHdrlHeader,
    /// 读取并解析 hdrl 列表体
    ReadHdrlBody,
    /// 定位 movi 列表
    FindMovi,
    /// 在 movi 之后寻找 idx1 块头
    FindIdx1,
    /// 读取并解析 idx1 块体
    ReadIdx1,
    /// 顺序读取 movi 数据块
    ReadSamples,
    /// 为待定的定位请求收集分段索引
    RequestIndices,
}

/// AVI 解封装器
pub struct AviDemuxer {
    /// 当前解析状态
    state: ParserState,
    /// AC3 包读取器工厂 (未注入则跳过 AC3 流)
    ac3_factory: Option<Ac3ReaderFactory>,
    /// 主头
    main_header: Option<headers::AviMainHeader>,
    /// 容器时长 (微秒)
    duration_us: i64,
    /// 每条可用流一个块读取器
    chunk_readers: Vec<ChunkReader>,
    /// 正在消费数据块的读取器下标
    current_reader: Option<usize>,
    /// hdrl 列表大小 (含类型字段)
    hdrl_size: u32,
    /// movi LIST 头的文件偏移
    movi_start: Option<u64>,
    /// movi LIST 的结束偏移
    movi_end: u64,
    /// idx1 块体大小
    idx1_body_size: u32,
    /// 待执行的重定位目标
    pending_reposition: Option<u64>,
    /// 待定定位请求的目标时间 (微秒)
    pending_seek_time_us: i64,
    /// 定位映射是否已发布
    seek_map_published: bool,
}

impl AviDemuxer {
    /// 创建 AVI 解封装器
    pub fn new() -> Self {
        Self {
            state: ParserState::SkipToHdrl,
            ac3_factory: None,
            main_header: None,
            duration_us: 0,
            chunk_readers: Vec::new(),
            current_reader: None,
            hdrl_size: 0,
            movi_start: None,
            movi_end: 0,
            idx1_body_size: 0,
            pending_reposition: None,
            pending_seek_time_us: NOPTS_VALUE,
            seek_map_published: false,
        }
    }

    /// 创建解封装器实例 (工厂函数)
    pub fn create() -> LiuResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new()))
    }

    /// 注入 AC3 包读取器工厂
    ///
    /// AC3 的帧切分属于编解码层; 未注入时 AC3 流按不支持跳过.
    pub fn with_ac3_reader_factory(mut self, factory: Ac3ReaderFactory) -> Self {
        self.ac3_factory = Some(factory);
        self
    }

    // ========================
    // 内部: 重定位
    // ========================

    /// 处理待执行的重定位
    ///
    /// 目标在当前位置前方不远时直接跳读; 否则交给宿主 seek.
    fn resolve_pending_reposition(&mut self, io: &mut IoContext) -> LiuResult<Option<ReadResult>> {
        let Some(target) = self.pending_reposition.take() else {
            return Ok(None);
        };
        let position = io.position()?;
        if target < position || target > position + RELOAD_MIN_SKIP {
            if self.state == ParserState::ReadSamples {
                for reader in &mut self.chunk_readers {
                    reader.will_seek_to(target, NOPTS_VALUE);
                }
            }
            if let Some(size) = io.size() {
                if target >= size {
                    return Ok(Some(ReadResult::EndOfInput));
                }
            }
            return Ok(Some(ReadResult::Seek(target)));
        }
        io.skip((target - position) as usize)?;
        Ok(None)
    }

    // ========================
    // 内部: 头部阶段
    // ========================

    /// 窥视并校验 12 字节文件头
    fn peek_file_header(io: &mut IoContext) -> LiuResult<bool> {
        let mut scratch = [0u8; 12];
        io.reset_peek_position();
        io.peek_fully(&mut scratch)?;
        io.reset_peek_position();
        let riff = u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]]);
        let avi = u32::from_le_bytes([scratch[8], scratch[9], scratch[10], scratch[11]]);
        Ok(riff == FOURCC_RIFF && avi == FOURCC_AVI_)
    }

    /// 解析 hdrl 列表体: 构建块读取器并发布轨道
    fn parse_hdrl_body(&mut self, body: Vec<u8>, sink: &mut dyn TrackSink) -> LiuResult<()> {
        let info = parse_hdrl(body)?;
        self.duration_us =
            i64::from(info.main.total_frames) * i64::from(info.main.frame_duration_us);
        self.main_header = Some(info.main);

        for (stream_id, blueprint) in info.streams.into_iter().enumerate() {
            let stream_id = stream_id as u32;
            let Some(blueprint) = blueprint else {
                continue;
            };
            let duration_us = blueprint.header.duration_us();
            let mut reader = match blueprint.format.mime.as_str() {
                stream::AUDIO_MPEG => ChunkReader::mp3(
                    stream_id,
                    duration_us,
                    blueprint.format.sample_rate,
                    blueprint.header.length,
                ),
                stream::AUDIO_AC3 => {
                    let Some(factory) = self.ac3_factory else {
                        warn!("流 {stream_id} 为 AC3 但未注入包读取器, 跳过");
                        continue;
                    };
                    ChunkReader::ac3(stream_id, duration_us, blueprint.header.length, factory())
                }
                _ if blueprint.media_type == liu_core::MediaType::Audio => {
                    ChunkReader::audio_passthrough(stream_id, duration_us, blueprint.header.length)
                }
                _ => ChunkReader::video(stream_id, duration_us, blueprint.header.length),
            };
            // 总时长通常被 avih 低估, 以流头推导为准
            self.duration_us = duration_us;
            match blueprint.index_chunk {
                Some(StreamIndexChunk::Super { entries }) => {
                    reader.index.install_super_index(&entries);
                }
                Some(StreamIndexChunk::Standard {
                    base_offset,
                    entries,
                }) => {
                    // hdrl 内的单段标准索引
                    reader.index.install_standard_index(base_offset, &entries, None);
                }
                None => {}
            }
            sink.track(stream_id, blueprint.media_type);
            sink.format(stream_id, blueprint.format);
            info!("{}", reader.report());
            self.chunk_readers.push(reader);
        }
        sink.end_tracks();
        if self.chunk_readers.is_empty() {
            return Err(LiuError::InvalidData("AVI 中没有可解封装的流".into()));
        }
        Ok(())
    }

    // ========================
    // 内部: idx1
    // ========================

    /// 解析 idx1 块体并发布定位映射
    fn parse_idx1_body(&mut self, body: &[u8], sink: &mut dyn TrackSink) {
        if body.len() < 16 {
            // 空 idx1: 没有任何定位信息
            sink.seek_map(SeekMap::Unseekable {
                duration_us: self.duration_us,
            });
            self.seek_map_published = true;
            return;
        }
        let seek_offset = self.infer_idx1_offset_base(body);
        for entry in body.chunks_exact(16) {
            let chunk_id = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let flags = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
            let offset = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
            let size = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]);
            let Some(reader) = self.chunk_readers.iter_mut().find(|r| r.handles(chunk_id)) else {
                // 未知块 id 直接忽略
                continue;
            };
            if flags & AVIIF_KEYFRAME != 0 {
                reader
                    .index
                    .append_idx1_key_frame(u64::from(offset) + seek_offset, size);
            }
            reader.index.increment_idx1_chunk_count();
        }
        for reader in &mut self.chunk_readers {
            reader.index.compact();
            info!("{}", reader.report());
        }
        self.seek_map_published = true;
        sink.seek_map(SeekMap::Seekable {
            duration_us: self.duration_us,
        });
    }

    /// 推断 idx1 条目偏移的基准
    ///
    /// 规范说偏移以 movi 的 fourCC 为基准, 但不少封装器以文件头为基准.
    /// 比较第一个条目的偏移与 movi 位置即可区分.
    fn infer_idx1_offset_base(&self, body: &[u8]) -> u64 {
        let movi_start = self.movi_start.unwrap_or(0);
        let first_offset = u32::from_le_bytes([body[8], body[9], body[10], body[11]]);
        if u64::from(first_offset) > movi_start {
            0
        } else {
            movi_start + 8
        }
    }

    // ========================
    // 内部: movi 数据块
    // ========================

    /// 读取 movi 数据块, 跨越所有 RIFF-AVIX 续接容器
    fn read_movi_chunks(
        &mut self,
        io: &mut IoContext,
        sink: &mut dyn TrackSink,
    ) -> LiuResult<ReadResult> {
        if let Some(size) = io.size() {
            if io.position()? >= size {
                return Ok(ReadResult::EndOfInput);
            }
        }
        if let Some(reader_idx) = self.current_reader {
            let done = self.chunk_readers[reader_idx].on_chunk_data(io, sink)?;
            if done {
                let pending = self.chunk_readers[reader_idx].index.pending_seek_offset();
                self.current_reader = None;
                if let Some(position) = pending {
                    self.pending_reposition = Some(position);
                }
            }
            return Ok(ReadResult::Continue);
        }

        // 块头按双字对齐, 奇数位置补一个填充字节
        if io.position()? & 1 == 1 {
            io.skip(1)?;
        }
        let mut scratch = [0u8; 12];
        io.reset_peek_position();
        match io.peek_fully(&mut scratch) {
            Ok(()) => {}
            // 尾部不足一个块头: 视作输入结束
            Err(LiuError::Eof) => return Ok(ReadResult::EndOfInput),
            Err(err) => return Err(err),
        }
        io.reset_peek_position();
        let chunk_type = u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]]);
        let size = u32::from_le_bytes([scratch[4], scratch[5], scratch[6], scratch[7]]);
        let list_type = u32::from_le_bytes([scratch[8], scratch[9], scratch[10], scratch[11]]);

        if chunk_type == FOURCC_LIST {
            // 进入 movi/rec 分组, 其余列表只越过头部
            io.skip(if list_type == FOURCC_MOVI || list_type == FOURCC_REC {
                12
            } else {
                8
            })?;
            return Ok(ReadResult::Continue);
        }
        if chunk_type == FOURCC_JUNK {
            self.pending_reposition = Some(io.position()? + u64::from(size) + 8);
            return Ok(ReadResult::Continue);
        }
        if chunk_type == FOURCC_RIFF {
            // 多 RIFF: 续接容器必须是 AVIX
            if list_type != FOURCC_AVIX {
                return Err(LiuError::InvalidData(format!(
                    "RIFF 续接容器类型异常: {list_type:#010x}"
                )));
            }
            io.skip(12)?;
            return Ok(ReadResult::Continue);
        }

        io.skip(8)?;
        match self.chunk_readers.iter().position(|r| r.handles(chunk_type)) {
            Some(reader_idx) => {
                self.chunk_readers[reader_idx].on_chunk_start(chunk_type, size);
                self.current_reader = Some(reader_idx);
            }
            None => {
                // 没有处理者的块直接越过
                let target = io.position()? + u64::from(size);
                debug!(
                    "未处理的块 {:?}, 大小 {size}, 跳到 {target}",
                    chunk_type.to_le_bytes().map(|b| b as char)
                );
                self.pending_reposition = Some(target);
            }
        }
        Ok(ReadResult::Continue)
    }

    /// RequestIndices 状态: 逐个读取缺失的分段索引, 全部就绪后回到采样
    fn request_indices(
        &mut self,
        io: &mut IoContext,
        sink: &mut dyn TrackSink,
    ) -> LiuResult<ReadResult> {
        let result = self.read_movi_chunks(io, sink)?;
        if result != ReadResult::Continue
            || self.current_reader.is_some()
            || self.pending_reposition.is_some()
        {
            return Ok(result);
        }
        // 还有分段未就绪则继续绕道
        for reader in &self.chunk_readers {
            if let Some(position) = reader.index.pending_seek_offset() {
                self.pending_reposition = Some(position);
                return Ok(result);
            }
        }
        // 全部就绪: 以各流首候选的最小字节位置作为最终定位目标
        let time_us = self.pending_seek_time_us;
        let points = self.collect_seek_points(time_us);
        debug!(
            "分段索引就绪, 定位到 {time_us} 微秒 -> 位置 {}",
            points.first.position
        );
        self.pending_reposition = Some(points.first.position);
        self.state = ParserState::ReadSamples;
        self.pending_seek_time_us = NOPTS_VALUE;
        Ok(result)
    }

    /// 汇总各流的定位候选; 有流待定时返回其索引块位置作为过渡目标
    fn collect_seek_points(&mut self, time_us: i64) -> SeekPoints {
        let movi_body = self.movi_start.map(|s| s + 12).unwrap_or(0);
        let mut result: Option<SeekPoints> = None;
        for reader in &mut self.chunk_readers {
            match reader.index.seek_points(time_us) {
                SeekAnswer::Ready(points) => {
                    let better = result
                        .as_ref()
                        .map_or(true, |r| points.first.position < r.first.position);
                    if better {
                        result = Some(points);
                    }
                }
                SeekAnswer::Pending(position) => {
                    self.pending_seek_time_us = time_us;
                    self.state = ParserState::RequestIndices;
                    return SeekPoints::single(SeekPoint::new(time_us, position));
                }
            }
        }
        result.unwrap_or_else(|| SeekPoints::single(SeekPoint::new(0, movi_body)))
    }
}

impl Default for AviDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer for AviDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Avi
    }

    fn name(&self) -> &str {
        "avi"
    }

    fn sniff(&mut self, io: &mut IoContext) -> LiuResult<bool> {
        Self::peek_file_header(io)
    }

    fn read(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<ReadResult> {
        if let Some(result) = self.resolve_pending_reposition(io)? {
            return Ok(result);
        }
        match self.state {
            ParserState::SkipToHdrl => {
                // 宿主可能没有先 sniff, 这里再校验一次以便给出明确错误
                if Self::peek_file_header(io)? {
                    io.skip(12)?;
                } else {
                    return Err(LiuError::InvalidData("AVI 头部列表缺失".into()));
                }
                self.state = ParserState::ReadHdrlHeader;
                Ok(ReadResult::Continue)
            }
            ParserState::ReadHdrlHeader => {
                let tag = io.read_tag()?;
                let size = io.read_u32_le()?;
                let list_type = io.read_tag()?;
                if fourcc(&tag) != FOURCC_LIST || &list_type != b"hdrl" {
                    return Err(LiuError::InvalidData(format!(
                        "期望 LIST hdrl, 实际 {:?} {:?}",
                        String::from_utf8_lossy(&tag),
                        String::from_utf8_lossy(&list_type)
                    )));
                }
                if size < 4 {
                    return Err(LiuError::InvalidData("hdrl 列表大小异常".into()));
                }
                self.hdrl_size = size;
                self.state = ParserState::ReadHdrlBody;
                Ok(ReadResult::Continue)
            }
            ParserState::ReadHdrlBody => {
                // 大小含已读的类型字段, 去掉 4 字节
                let body = io.read_bytes((self.hdrl_size - 4) as usize)?;
                self.parse_hdrl_body(body, sink)?;
                self.state = ParserState::FindMovi;
                Ok(ReadResult::Continue)
            }
            ParserState::FindMovi => {
                if let Some(movi_start) = self.movi_start {
                    if io.position()? != movi_start {
                        self.pending_reposition = Some(movi_start);
                        return Ok(ReadResult::Continue);
                    }
                }
                let mut scratch = [0u8; 12];
                io.reset_peek_position();
                io.peek_fully(&mut scratch)?;
                io.reset_peek_position();
                let chunk_type =
                    u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]]);
                let size = u32::from_le_bytes([scratch[4], scratch[5], scratch[6], scratch[7]]);
                let list_type =
                    u32::from_le_bytes([scratch[8], scratch[9], scratch[10], scratch[11]]);
                if chunk_type == FOURCC_RIFF {
                    // 位于文件开头: movi 在 RIFF 体内, 越过外层头
                    io.skip(12)?;
                    return Ok(ReadResult::Continue);
                }
                if chunk_type != FOURCC_LIST || list_type != FOURCC_MOVI {
                    // 越过块头与整个块体
                    self.pending_reposition = Some(io.position()? + u64::from(size) + 8);
                    return Ok(ReadResult::Continue);
                }
                let movi_start = io.position()?;
                self.movi_start = Some(movi_start);
                // 大小含列表类型但不含 LIST 和大小字段
                self.movi_end = movi_start + u64::from(size) + 8;
                if !self.seek_map_published {
                    let has_index = self
                        .main_header
                        .as_ref()
                        .map(|h| h.has_index())
                        .unwrap_or(false);
                    if has_index {
                        self.state = ParserState::FindIdx1;
                        self.pending_reposition = Some(self.movi_end);
                        return Ok(ReadResult::Continue);
                    }
                    // 无旧式索引: 有 OpenDML 超级索引仍可定位
                    let open_dml = self.chunk_readers.iter().any(|r| r.index.is_open_dml());
                    sink.seek_map(if open_dml {
                        SeekMap::Seekable {
                            duration_us: self.duration_us,
                        }
                    } else {
                        SeekMap::Unseekable {
                            duration_us: self.duration_us,
                        }
                    });
                    self.seek_map_published = true;
                }
                // 跳过 LIST 头进入 movi 体
                self.pending_reposition = Some(movi_start + 12);
                self.state = ParserState::ReadSamples;
                Ok(ReadResult::Continue)
            }
            ParserState::FindIdx1 => {
                let tag = io.read_u32_le()?;
                let size = io.read_u32_le()?;
                if tag == FOURCC_IDX1 {
                    self.idx1_body_size = size;
                    self.state = ParserState::ReadIdx1;
                } else {
                    // 不是 idx1, 越过该块继续找
                    self.pending_reposition = Some(io.position()? + u64::from(size));
                }
                Ok(ReadResult::Continue)
            }
            ParserState::ReadIdx1 => {
                let body = io.read_bytes(self.idx1_body_size as usize)?;
                self.parse_idx1_body(&body, sink);
                self.state = ParserState::ReadSamples;
                self.pending_reposition = self.movi_start;
                Ok(ReadResult::Continue)
            }
            ParserState::ReadSamples => self.read_movi_chunks(io, sink),
            ParserState::RequestIndices => self.request_indices(io, sink),
        }
    }

    fn seek_points(&mut self, time_us: i64) -> SeekPoints {
        self.collect_seek_points(time_us)
    }

    fn seek(&mut self, position: u64, time_us: i64) {
        self.pending_reposition = None;
        self.current_reader = None;
        let mut needs_indices = false;
        for reader in &mut self.chunk_readers {
            needs_indices |= reader.will_seek_to(position, time_us);
        }
        if needs_indices && time_us != NOPTS_VALUE {
            self.pending_seek_time_us = time_us;
        }
        if position == 0 {
            self.state = if self.chunk_readers.is_empty() {
                // 头部尚未解析完
                ParserState::SkipToHdrl
            } else {
                ParserState::FindMovi
            };
            return;
        }
        self.state = if self.pending_seek_time_us == NOPTS_VALUE {
            ParserState::ReadSamples
        } else {
            ParserState::RequestIndices
        };
    }

    fn duration_us(&self) -> Option<i64> {
        if self.duration_us > 0 {
            Some(self.duration_us)
        } else {
            None
        }
    }
}

/// AVI 格式探测器
pub struct AviProbe;

impl FormatProbe for AviProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"AVI " {
            return Some(SCORE_MAX);
        }
        if let Some(name) = filename {
            if name.to_lowercase().ends_with(".avi") {
                return Some(SCORE_EXTENSION);
            }
        }
        None
    }

    fn format_id(&self) -> FormatId {
        FormatId::Avi
    }
}
