//! 解封装器 (Demuxer) trait 定义.
//!
//! Liu 的解封装器采用宿主驱动的推送模型: 宿主循环调用 [`Demuxer::read`],
//! 解封装器把样本数据与元数据推入 [`TrackSink`], 并通过返回值告知宿主
//! 下一步动作 (继续 / 定位到某字节位置 / 输入结束).
//!
//! 使用流程:
//! 1. `sniff()` 探测容器
//! 2. 循环调用 `read()`; 返回 [`ReadResult::Seek`] 时宿主把输入定位到
//!    指定位置后再继续调用
//! 3. 用户发起时间定位时, 先调用 `seek_points()` 取得目标字节位置,
//!    把输入定位过去, 再调用 `seek()` 通知解封装器
//!
//! 整个过程单线程协作式, 解封装器内部没有线程、回调或异步挂起.

use liu_core::{LiuResult, MediaType};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::TrackFormat;

/// 样本标志: 关键帧
pub const SAMPLE_FLAG_KEY_FRAME: u32 = 1;

/// `read()` 的返回值, 告知宿主下一步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// 继续调用 `read()`
    Continue,
    /// 把输入定位到指定字节位置后再继续
    Seek(u64),
    /// 输入已结束
    EndOfInput,
}

/// 定位映射
///
/// 解封装器解析出索引后向 [`TrackSink`] 发布一次. 具体某个时间点的
/// 定位目标由宿主向活动的解封装器查询 ([`Demuxer::seek_points`]),
/// 因为 OpenDML 的分段索引可能还在惰性加载中.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMap {
    /// 不可定位 (只能顺序播放)
    Unseekable {
        /// 总时长 (微秒)
        duration_us: i64,
    },
    /// 可定位
    Seekable {
        /// 总时长 (微秒)
        duration_us: i64,
    },
}

impl SeekMap {
    /// 总时长 (微秒)
    pub fn duration_us(&self) -> i64 {
        match self {
            Self::Unseekable { duration_us } | Self::Seekable { duration_us } => *duration_us,
        }
    }

    /// 是否可定位
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable { .. })
    }
}

/// 一个定位候选点: 时间戳与文件字节位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    /// 时间戳 (微秒)
    pub time_us: i64,
    /// 字节位置
    pub position: u64,
}

impl SeekPoint {
    /// 创建定位点
    pub const fn new(time_us: i64, position: u64) -> Self {
        Self { time_us, position }
    }
}

/// 定位查询结果: 一个或两个夹住请求时间的候选点
///
/// `first.time_us <= 请求时间`; 若存在 `second`, 则
/// `second.time_us >= 请求时间`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoints {
    /// 不晚于请求时间的候选点
    pub first: SeekPoint,
    /// 不早于请求时间的候选点 (请求命中关键帧时为 None)
    pub second: Option<SeekPoint>,
}

impl SeekPoints {
    /// 只有一个候选点
    pub const fn single(point: SeekPoint) -> Self {
        Self {
            first: point,
            second: None,
        }
    }

    /// 两个候选点
    pub const fn pair(first: SeekPoint, second: SeekPoint) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }
}

/// 样本接收器
///
/// 解封装器产出的下游: 接收轨道声明、格式、样本数据/元数据和定位映射.
/// 所有方法都以轨道 id 区分目标轨道, 解封装器不持有轨道对象
/// (避免跨组件的所有权纠缠).
pub trait TrackSink {
    /// 声明一条轨道
    fn track(&mut self, id: u32, media_type: MediaType);

    /// 发布轨道格式
    fn format(&mut self, id: u32, format: TrackFormat);

    /// 所有轨道已声明完毕
    fn end_tracks(&mut self);

    /// 推入一段内存中的样本数据
    fn sample_data(&mut self, id: u32, data: &[u8]);

    /// 从输入流式读取至多 `length` 字节样本数据
    ///
    /// 可以部分读取, 返回实际消耗的字节数 (0 表示流结束).
    fn sample_data_from(
        &mut self,
        id: u32,
        io: &mut IoContext,
        length: usize,
    ) -> LiuResult<usize>;

    /// 提交一个完整样本的元数据
    ///
    /// `size` 为该样本的总字节数, `offset` 为样本尾部距最近一次
    /// 数据推入末尾的字节数 (通常为 0).
    fn sample_metadata(&mut self, id: u32, time_us: i64, flags: u32, size: u32, offset: u32);

    /// 发布定位映射
    fn seek_map(&mut self, seek_map: SeekMap);
}

/// 解封装器 trait
pub trait Demuxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 探测输入是否为本格式 (只使用窥视, 不移动读游标)
    fn sniff(&mut self, io: &mut IoContext) -> LiuResult<bool>;

    /// 推进解封装
    ///
    /// 从输入读取一小段数据并产出到 `sink`, 返回下一步动作.
    /// Eof 与无效数据错误直接上抛; 可恢复问题在内部消化.
    fn read(&mut self, io: &mut IoContext, sink: &mut dyn TrackSink) -> LiuResult<ReadResult>;

    /// 查询时间点对应的定位候选
    ///
    /// 若目标位于尚未加载的索引分段中, 返回的候选指向该分段索引块的
    /// 位置, 同时在内部记下待定状态; 宿主照常执行 `seek()` 即可,
    /// 解封装器会先绕道加载索引再就位.
    fn seek_points(&mut self, time_us: i64) -> SeekPoints;

    /// 通知解封装器: 宿主已把输入定位到 `position`
    ///
    /// `time_us` 为触发本次定位的请求时间, 顺序重放 (非用户定位)
    /// 传 [`liu_core::NOPTS_VALUE`].
    fn seek(&mut self, position: u64, time_us: i64);

    /// 获取容器总时长 (微秒), None 表示未知
    fn duration_us(&self) -> Option<i64>;
}
