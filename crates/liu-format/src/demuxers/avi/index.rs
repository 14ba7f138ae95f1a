//! AVI 流索引.
//!
//! 每条流一个 [`StreamIndex`], 汇集三路索引来源:
//! - `idx1` 旧式平坦索引 (文件尾部, 只收录带关键帧标志的条目);
//! - OpenDML `indx` 超级索引 (hdrl 内, 描述各分段索引块的位置与时长);
//! - `ix##` 标准索引块 (散布在 movi 数据中, 惰性加载).
//!
//! `ix##` 块不保证出现在其索引的数据之前, 因此采用惰性加载策略:
//! 定位请求落在尚未加载的分段时, 返回该分段索引块自身的偏移作为
//! 待定答案 ([`SeekAnswer::Pending`]), 由解封装器先绕道读取索引块,
//! 再继续真正的定位.
//!
//! 时间戳推导按覆盖程度分三类:
//! 1. 索引覆盖全部数据块 → 块序号按帧时长线性换算;
//! 2. OpenDML 稀疏索引 → 用分段内关键帧字节累计量在该分段时长份额
//!    中的比例换算;
//! 3. 稀疏 idx1 (常见于音频) → 用关键帧字节累计量在全部关键帧字节
//!    中的比例换算.

use log::{debug, warn};

use liu_core::{LiuError, LiuResult, NOPTS_VALUE};

use crate::demuxer::{SeekPoint, SeekPoints};
use crate::io::{IoContext, MemoryBackend};

/// `indx`/`ix##` 块头中的索引类型: 超级索引
const AVI_INDEX_OF_INDEXES: u8 = 0x00;
/// `indx`/`ix##` 块头中的索引类型: 数据块索引
const AVI_INDEX_OF_CHUNKS: u8 = 0x01;
/// `indx`/`ix##` 块头中的索引类型: 内联数据
const AVI_INDEX_IS_DATA: u8 = 0x80;
/// 子类型: 按场索引
const AVI_INDEX_2FIELD: u8 = 0x01;

/// 标准索引条目 size 字段的最高位: 置位表示非关键帧
const STANDARD_INDEX_NON_KEY_BIT: u32 = 0x8000_0000;

/// 超级索引条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperIndexEntry {
    /// `ix##` 块在文件中的偏移
    pub offset: u64,
    /// `ix##` 块的字节大小 (含 32 字节块头)
    pub size: u32,
    /// 该分段的时长 (流 tick)
    pub duration: u32,
}

/// 标准索引条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardIndexEntry {
    /// 数据相对 `base_offset` 的偏移 (指向块内数据, 块头在其前 8 字节)
    pub offset: u32,
    /// 数据大小, bit 31 置位表示非关键帧
    pub size: u32,
}

/// 已解析的 `indx`/`ix##` 块体
#[derive(Debug, Clone)]
pub enum StreamIndexChunk {
    /// 超级索引 (AVI_INDEX_OF_INDEXES)
    Super {
        /// 分段描述条目
        entries: Vec<SuperIndexEntry>,
    },
    /// 标准索引 (AVI_INDEX_OF_CHUNKS)
    Standard {
        /// 条目偏移的基准
        base_offset: u64,
        /// 索引条目
        entries: Vec<StandardIndexEntry>,
    },
}

impl StreamIndexChunk {
    /// 解析 `indx`/`ix##` 块体
    ///
    /// 结构断言失败 (longsPerEntry 不符、声称的条目数超出块体) 返回
    /// `InvalidData`; 按场索引与内联数据索引不受支持.
    pub fn parse(body: Vec<u8>) -> LiuResult<StreamIndexChunk> {
        let body_len = body.len();
        let mut io = IoContext::new(Box::new(MemoryBackend::from_data(body)));

        let longs_per_entry = io.read_u16_le()?;
        let sub_type = io.read_u8()?;
        let index_type = io.read_u8()?;
        let entries_in_use = io.read_u32_le()? as usize;
        let _chunk_id = io.read_u32_le()?;

        match index_type {
            AVI_INDEX_OF_INDEXES => {
                if longs_per_entry != 4 || sub_type != 0 {
                    return Err(LiuError::InvalidData(format!(
                        "超级索引块头异常: longsPerEntry={longs_per_entry}, subType={sub_type}"
                    )));
                }
                io.skip(4 * 3)?; // dwReserved[3]
                if entries_in_use.saturating_mul(16) > body_len.saturating_sub(24) {
                    return Err(LiuError::InvalidData(format!(
                        "超级索引条目数超出块体: {entries_in_use}"
                    )));
                }
                let mut entries = Vec::with_capacity(entries_in_use);
                for _ in 0..entries_in_use {
                    entries.push(SuperIndexEntry {
                        offset: io.read_u64_le()?,
                        size: io.read_u32_le()?,
                        duration: io.read_u32_le()?,
                    });
                }
                Ok(StreamIndexChunk::Super { entries })
            }
            AVI_INDEX_OF_CHUNKS => {
                if sub_type == AVI_INDEX_2FIELD {
                    return Err(LiuError::Unsupported("按场索引 (AVI_INDEX_2FIELD)".into()));
                }
                if longs_per_entry != 2 {
                    return Err(LiuError::InvalidData(format!(
                        "标准索引块头异常: longsPerEntry={longs_per_entry}"
                    )));
                }
                let base_offset = io.read_u64_le()?;
                io.skip(4)?; // dwReserved3
                if entries_in_use.saturating_mul(8) > body_len.saturating_sub(24) {
                    return Err(LiuError::InvalidData(format!(
                        "标准索引条目数超出块体: {entries_in_use}"
                    )));
                }
                let mut entries = Vec::with_capacity(entries_in_use);
                for _ in 0..entries_in_use {
                    entries.push(StandardIndexEntry {
                        offset: io.read_u32_le()?,
                        size: io.read_u32_le()?,
                    });
                }
                Ok(StreamIndexChunk::Standard {
                    base_offset,
                    entries,
                })
            }
            AVI_INDEX_IS_DATA => Err(LiuError::Unsupported("内联数据索引 (AVI_INDEX_IS_DATA)".into())),
            other => Err(LiuError::InvalidData(format!("未知索引类型: {other:#04x}"))),
        }
    }
}

/// 定位查询的答案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekAnswer {
    /// 索引就绪, 给出候选定位点
    Ready(SeekPoints),
    /// 目标落在未加载的分段中, 给出该分段 `ix##` 块的文件偏移
    Pending(u64),
}

/// 待定的定位请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSeek {
    /// 目标分段序号
    segment: usize,
    /// 该分段 `ix##` 块的文件偏移
    position: u64,
}

/// 惰性加载的标准索引分段 (对应超级索引的一行)
#[derive(Debug, Clone, Default)]
struct IndexSegment {
    /// 是否已从 `ix##` 块填充
    loaded: bool,
    /// 关键帧的全局块序号
    ordinals: Vec<u32>,
    /// 关键帧数据块头的文件偏移
    offsets: Vec<u64>,
    /// 关键帧数据大小
    sizes: Vec<u32>,
}

/// 每条流的索引状态机
#[derive(Debug)]
pub struct StreamIndex {
    /// 流时长 (微秒)
    duration_us: i64,
    /// 流头声明的数据块总数
    stream_chunk_count: u32,

    // === idx1 初始索引 ===
    /// idx1 中本流的全部条目数 (含非关键帧)
    idx1_chunk_count: u32,
    /// 关键帧数据块偏移 (严格递增)
    key_offsets: Vec<u64>,
    /// 关键帧的块序号
    key_ordinals: Vec<u32>,
    /// 截至每个关键帧 (含) 的关键帧字节累计
    key_byte_sums: Vec<u64>,
    /// 累计计数器
    key_bytes_total: u64,

    // === OpenDML 超级索引 ===
    /// 每个分段声称的条目总数 ((块大小 - 32) / 8)
    segment_entry_counts: Vec<u32>,
    /// 各分段 `ix##` 块的文件偏移
    ix_offsets: Vec<u64>,
    /// 各分段时长 (流 tick)
    ix_durations: Vec<u32>,
    /// 截至每个分段 (含) 的 tick 累计
    ix_ticks: Vec<u64>,
    /// 惰性加载的分段
    segments: Vec<IndexSegment>,

    /// 待定的定位请求 (至多一个)
    pending: Option<PendingSeek>,
}

impl StreamIndex {
    /// 创建流索引
    pub fn new(stream_chunk_count: u32, duration_us: i64) -> Self {
        Self {
            duration_us,
            stream_chunk_count,
            idx1_chunk_count: 0,
            key_offsets: Vec::new(),
            key_ordinals: Vec::new(),
            key_byte_sums: Vec::new(),
            key_bytes_total: 0,
            segment_entry_counts: Vec::new(),
            ix_offsets: Vec::new(),
            ix_durations: Vec::new(),
            ix_ticks: Vec::new(),
            segments: Vec::new(),
            pending: None,
        }
    }

    /// 流时长 (微秒)
    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    // ========================
    // idx1 喂入
    // ========================

    /// 追加一个 idx1 关键帧条目
    ///
    /// 必须在对应的 [`Self::increment_idx1_chunk_count`] 之前调用,
    /// 关键帧的块序号取调用时的块计数.
    pub fn append_idx1_key_frame(&mut self, offset: u64, size: u32) {
        self.key_offsets.push(offset);
        self.key_ordinals.push(self.idx1_chunk_count);
        self.key_bytes_total += u64::from(size);
        self.key_byte_sums.push(self.key_bytes_total);
    }

    /// idx1 中出现了本流的一个条目 (无论是否关键帧)
    pub fn increment_idx1_chunk_count(&mut self) {
        self.idx1_chunk_count += 1;
    }

    /// idx1 解析完成, 回收多余容量
    pub fn compact(&mut self) {
        self.key_offsets.shrink_to_fit();
        self.key_ordinals.shrink_to_fit();
        self.key_byte_sums.shrink_to_fit();
    }

    // ========================
    // OpenDML 索引安装
    // ========================

    /// 安装超级索引 (来自 hdrl 的 `indx` 块), 幂等
    pub fn install_super_index(&mut self, entries: &[SuperIndexEntry]) {
        if !self.ix_offsets.is_empty() && self.ix_offsets.len() == entries.len() {
            return;
        }
        let len = entries.len();
        self.segment_entry_counts = Vec::with_capacity(len);
        self.ix_offsets = Vec::with_capacity(len);
        self.ix_durations = Vec::with_capacity(len);
        self.ix_ticks = Vec::with_capacity(len);
        if self.segments.len() != len {
            self.segments = vec![IndexSegment::default(); len];
        }
        let mut tick_sum = 0u64;
        for entry in entries {
            // 每条目 8 字节, 块头 32 字节
            self.segment_entry_counts
                .push(entry.size.saturating_sub(32) / 8);
            self.ix_offsets.push(entry.offset);
            self.ix_durations.push(entry.duration);
            tick_sum += u64::from(entry.duration);
            self.ix_ticks.push(tick_sum);
        }
        debug!(
            "超级索引已安装: {} 个分段, 声称条目总数 {}",
            len,
            self.segment_total_entries()
        );
    }

    /// 安装一个标准索引分段, 幂等
    ///
    /// `chunk_position`: 读取到该 `ix##` 块时的文件位置, 用于确定它属于
    /// 哪个分段; 来自 hdrl 的单段索引传 `None`.
    pub fn install_standard_index(
        &mut self,
        base_offset: u64,
        entries: &[StandardIndexEntry],
        chunk_position: Option<u64>,
    ) {
        // 无超级索引且来自 hdrl: 单段索引
        if self.segments.is_empty() && chunk_position.is_none() {
            self.segment_entry_counts = vec![entries.len() as u32];
            self.segments = vec![IndexSegment::default()];
        }
        if self.segments.is_empty() {
            warn!("收到标准索引但超级索引尚未安装, 丢弃");
            return;
        }
        let seg_no = self.locate_segment_by_position(chunk_position);
        if let Some(pending) = self.pending {
            if pending.segment == seg_no {
                self.pending = None;
            }
        }
        if self.segments[seg_no].loaded {
            // 顺序读取与定位绕道可能两次经过同一个 ix## 块
            return;
        }

        let declared = self.segment_entry_counts.get(seg_no).copied().unwrap_or(0);
        let mut ordinal = self.segment_ordinal_base(seg_no);
        let segment = &mut self.segments[seg_no];
        segment.ordinals = Vec::with_capacity(declared as usize);
        segment.offsets = Vec::with_capacity(declared as usize);
        segment.sizes = Vec::with_capacity(declared as usize);
        for entry in entries {
            if entry.size & STANDARD_INDEX_NON_KEY_BIT == 0 {
                segment.ordinals.push(ordinal);
                // 条目偏移指向块内数据, 回退 8 字节到块头
                segment
                    .offsets
                    .push((base_offset + u64::from(entry.offset)).saturating_sub(8));
                segment.sizes.push(entry.size);
            }
            ordinal += 1;
        }
        segment.loaded = true;
        if entries.len() as u32 != declared && declared != 0 {
            warn!(
                "标准索引分段 {seg_no} 条目数 {} 与超级索引声称的 {declared} 不符",
                entries.len()
            );
        }
        debug!(
            "标准索引分段 {seg_no} 已安装: {} 个关键帧, 位置 {chunk_position:?}",
            self.segments[seg_no].offsets.len()
        );
    }

    // ========================
    // 查询
    // ========================

    /// 是否存在 OpenDML 索引 (超级索引或单段标准索引)
    pub fn is_open_dml(&self) -> bool {
        !self.segments.is_empty()
    }

    /// idx1 是否已提供关键帧信息
    pub fn is_ready(&self) -> bool {
        !self.key_offsets.is_empty()
    }

    /// 索引是否覆盖了流的全部数据块
    ///
    /// 视频流的 idx1/索引块通常逐帧收录, 音频流往往只收录关键帧.
    pub fn indices_cover_all_frames(&self) -> bool {
        self.idx1_chunk_count == self.stream_chunk_count
            || self.segment_total_entries() == self.stream_chunk_count
    }

    /// 单帧 (单块) 时长 (微秒)
    pub fn frame_duration_us(&self) -> i64 {
        self.chunk_timestamp_us(1)
    }

    /// 块序号换算时间戳 (微秒)
    pub fn chunk_timestamp_us(&self, chunk_index: u32) -> i64 {
        if self.stream_chunk_count == 0 {
            return 0;
        }
        self.duration_us * i64::from(chunk_index) / i64::from(self.stream_chunk_count)
    }

    /// 由数据块偏移查全局块序号
    ///
    /// 偏移必须精确命中某个已索引的关键帧, 否则返回 None.
    pub fn chunk_index_by_position(&self, offset: u64) -> Option<u32> {
        if let Ok(i) = self.key_offsets.binary_search(&offset) {
            return Some(self.key_ordinals[i]);
        }
        for segment in &self.segments {
            if segment.offsets.is_empty() {
                continue;
            }
            if offset < segment.offsets[0] {
                return None;
            }
            if offset > *segment.offsets.last().unwrap() {
                continue;
            }
            if let Ok(i) = segment.offsets.binary_search(&offset) {
                return Some(segment.ordinals[i]);
            }
        }
        None
    }

    /// 偏移是否命中已索引的关键帧
    pub fn is_key_frame_offset(&self, offset: u64) -> bool {
        self.chunk_index_by_position(offset).is_some()
    }

    /// 由数据块偏移推导时间戳 (微秒)
    pub fn timestamp_for_offset(&self, offset: u64) -> Option<i64> {
        if self.indices_cover_all_frames() || self.is_open_dml() {
            let chunk_index = self.chunk_index_by_position(offset)?;
            if self.indices_cover_all_frames() {
                return Some(self.chunk_timestamp_us(chunk_index));
            }
            return self.timestamp_for_chunk_index_ix(chunk_index);
        }
        // 稀疏 idx1: 按关键帧字节累计比例换算
        let i = self.key_offsets.binary_search(&offset).ok()?;
        let total = *self.key_byte_sums.last()?;
        if total == 0 {
            return Some(0);
        }
        let before = if i == 0 { 0 } else { self.key_byte_sums[i - 1] };
        Some(before as i64 * self.duration_us / total as i64)
    }

    /// OpenDML 稀疏索引下由全局块序号推导时间戳
    fn timestamp_for_chunk_index_ix(&self, chunk_index: u32) -> Option<i64> {
        let (seg_no, key_no) = self.segment_position_of_ordinal(chunk_index)?;
        let segment = &self.segments[seg_no];
        let seg_bytes: u64 = segment.sizes.iter().map(|&s| u64::from(s)).sum();
        if seg_bytes == 0 {
            return None;
        }
        let bytes_before: u64 = segment.sizes[..key_no].iter().map(|&s| u64::from(s)).sum();
        let total_ticks = *self.ix_ticks.last()? as i64;
        if total_ticks == 0 {
            return None;
        }
        let mut ticks = if seg_no == 0 {
            0
        } else {
            self.ix_ticks[seg_no - 1] as i64
        };
        ticks += i64::from(self.ix_durations[seg_no]) * bytes_before as i64 / seg_bytes as i64;
        Some(ticks * self.duration_us / total_ticks)
    }

    /// 查询时间点的定位候选
    pub fn seek_points(&mut self, time_us: i64) -> SeekAnswer {
        if self.is_open_dml() {
            self.seek_points_ix(time_us)
        } else {
            SeekAnswer::Ready(self.seek_points_initial(time_us))
        }
    }

    /// 当前待定分段的 `ix##` 块偏移
    pub fn pending_seek_offset(&self) -> Option<u64> {
        self.pending.map(|p| p.position)
    }

    /// 解封装器将要执行一次传输层定位
    ///
    /// 用户时间定位 (`time_us` 有效) 会取消旧的待定请求并按需登记新的;
    /// 返回 true 表示需要先绕道加载分段索引.
    pub fn will_seek_to(&mut self, _position: u64, time_us: i64) -> bool {
        if time_us == NOPTS_VALUE {
            return false;
        }
        self.pending = None;
        if !self.is_open_dml() || self.ix_offsets.is_empty() {
            return false;
        }
        let seg_no = self.locate_segment_by_time(time_us);
        if !self.segments[seg_no].loaded {
            self.pending = Some(PendingSeek {
                segment: seg_no,
                position: self.ix_offsets[seg_no],
            });
            debug!(
                "定位到 {time_us} 微秒需要先加载分段 {seg_no} 的索引块 (偏移 {})",
                self.ix_offsets[seg_no]
            );
            return true;
        }
        false
    }

    // ========================
    // 内部工具
    // ========================

    /// 超级索引声称的条目总数
    fn segment_total_entries(&self) -> u32 {
        self.segment_entry_counts.iter().sum()
    }

    /// 分段 `seg_no` 之前的全局块序号基准
    fn segment_ordinal_base(&self, seg_no: usize) -> u32 {
        self.segment_entry_counts[..seg_no].iter().sum()
    }

    /// 由 `ix##` 块的读取位置确定其分段序号
    fn locate_segment_by_position(&self, position: Option<u64>) -> usize {
        let position = match position {
            Some(p) if !self.ix_offsets.is_empty() => p,
            _ => return 0,
        };
        for i in 1..self.ix_offsets.len() {
            if position < self.ix_offsets[i] {
                return i - 1;
            }
        }
        self.ix_offsets.len() - 1
    }

    /// 由时间点确定其所属分段序号
    fn locate_segment_by_time(&self, time_us: i64) -> usize {
        if self.ix_ticks.is_empty() {
            return 0;
        }
        let total_ticks = *self.ix_ticks.last().unwrap() as i64;
        if self.duration_us <= 0 || total_ticks == 0 {
            return 0;
        }
        let target_ticks = (time_us.max(0) * total_ticks / self.duration_us) as u64;
        binary_search_ceil(&self.ix_ticks, target_ticks)
    }

    /// 全局块序号在哪个已加载分段的第几个关键帧
    fn segment_position_of_ordinal(&self, ordinal: u32) -> Option<(usize, usize)> {
        for (i, segment) in self.segments.iter().enumerate() {
            if segment.ordinals.is_empty() {
                continue;
            }
            if ordinal < segment.ordinals[0] {
                return None;
            }
            if ordinal > *segment.ordinals.last().unwrap() {
                continue;
            }
            if let Ok(j) = segment.ordinals.binary_search(&ordinal) {
                return Some((i, j));
            }
        }
        None
    }

    /// 仅凭 idx1 索引求定位候选
    fn seek_points_initial(&self, time_us: i64) -> SeekPoints {
        self.seek_points_in(time_us, &self.key_ordinals, &self.key_offsets)
    }

    /// 在给定关键帧数组中求定位候选
    fn seek_points_in(&self, time_us: i64, ordinals: &[u32], offsets: &[u64]) -> SeekPoints {
        if offsets.is_empty() {
            return SeekPoints::single(SeekPoint::new(0, 0));
        }
        let frame_duration = self.frame_duration_us();
        let target_frame = if frame_duration > 0 {
            (time_us.max(0) / frame_duration) as u32
        } else {
            0
        };
        let key_index = if self.indices_cover_all_frames() {
            binary_search_floor(ordinals, target_frame)
        } else {
            // 稀疏: 最大的满足"关键帧时间 <= 请求时间"的关键帧
            let count = offsets.len();
            let mut idx = count - 1;
            for i in 0..count {
                if self.sparse_key_frame_time_us(i) > time_us {
                    idx = i.saturating_sub(1);
                    break;
                }
            }
            idx
        };
        let first = self.seek_point_at(key_index, ordinals, offsets);
        if first.time_us == time_us
            || (self.indices_cover_all_frames() && ordinals.get(key_index) == Some(&target_frame))
        {
            return SeekPoints::single(first);
        }
        // 目标不是关键帧, 给出夹住它的两个候选
        if key_index + 1 < offsets.len() {
            SeekPoints::pair(first, self.seek_point_at(key_index + 1, ordinals, offsets))
        } else {
            SeekPoints::single(first)
        }
    }

    /// 稀疏 idx1 下第 `i` 个关键帧的时间戳
    fn sparse_key_frame_time_us(&self, i: usize) -> i64 {
        let total = self.key_byte_sums.last().copied().unwrap_or(0);
        if total == 0 {
            return 0;
        }
        let before = if i == 0 { 0 } else { self.key_byte_sums[i - 1] };
        before as i64 * self.duration_us / total as i64
    }

    /// 给定关键帧数组下标处的定位点
    fn seek_point_at(&self, key_index: usize, ordinals: &[u32], offsets: &[u64]) -> SeekPoint {
        let time_us = if self.indices_cover_all_frames() {
            i64::from(ordinals[key_index]) * self.frame_duration_us()
        } else {
            self.sparse_key_frame_time_us(key_index)
        };
        SeekPoint::new(time_us, offsets[key_index])
    }

    /// OpenDML 索引下求定位候选, 分段未加载时登记待定
    fn seek_points_ix(&mut self, time_us: i64) -> SeekAnswer {
        let seg_no = self.locate_segment_by_time(time_us);
        let segment = &self.segments[seg_no];
        if segment.loaded && !segment.offsets.is_empty() {
            if self.indices_cover_all_frames() {
                let ordinals = &self.segments[seg_no].ordinals;
                let offsets = &self.segments[seg_no].offsets;
                return SeekAnswer::Ready(self.seek_points_in(time_us, ordinals, offsets));
            }
            // 稀疏分段索引: 按分段时长份额内的比例定位
            let total_ticks = self.ix_ticks.last().copied().unwrap_or(0) as i64;
            let seg_duration = i64::from(self.ix_durations[seg_no]);
            if total_ticks == 0 || seg_duration == 0 || self.duration_us <= 0 {
                let offset = self.segments[seg_no].offsets[0];
                return SeekAnswer::Ready(SeekPoints::single(SeekPoint::new(time_us, offset)));
            }
            let mut ticks = time_us.max(0) * total_ticks / self.duration_us;
            ticks -= if seg_no == 0 {
                0
            } else {
                self.ix_ticks[seg_no - 1] as i64
            };
            let offsets = &self.segments[seg_no].offsets;
            let index =
                ((ticks * offsets.len() as i64 / seg_duration).max(0) as usize).min(offsets.len() - 1);
            return SeekAnswer::Ready(SeekPoints::single(SeekPoint::new(time_us, offsets[index])));
        }
        if self.ix_offsets.is_empty() {
            // 单段索引尚未加载 (不应发生): 退化为起始点
            return SeekAnswer::Ready(SeekPoints::single(SeekPoint::new(0, 0)));
        }
        let position = self.ix_offsets[seg_no];
        self.pending = Some(PendingSeek {
            segment: seg_no,
            position,
        });
        SeekAnswer::Pending(position)
    }
}

/// 最大的满足 `array[i] <= value` 的下标, 全部更大时返回 0
fn binary_search_floor<T: Ord + Copy>(array: &[T], value: T) -> usize {
    let pp = array.partition_point(|&x| x <= value);
    pp.saturating_sub(1)
}

/// 最小的满足 `array[i] >= value` 的下标, 全部更小时收敛到末尾
fn binary_search_ceil<T: Ord + Copy>(array: &[T], value: T) -> usize {
    array
        .partition_point(|&x| x < value)
        .min(array.len().saturating_sub(1))
}
