//! 轨道格式定义.
//!
//! 描述容器中一条音视频轨道的采样参数与解码器初始化数据.

use bytes::Bytes;

/// MIME: H.264 视频
pub const VIDEO_H264: &str = "video/avc";
/// MIME: H.265 视频
pub const VIDEO_H265: &str = "video/hevc";
/// MIME: MPEG-4 Part 2 视频 (DivX/Xvid)
pub const VIDEO_MP4V: &str = "video/mp4v-es";
/// MIME: Motion JPEG 视频
pub const VIDEO_MJPEG: &str = "video/mjpeg";
/// MIME: VP8 视频
pub const VIDEO_VP8: &str = "video/x-vnd.on2.vp8";
/// MIME: MPEG 音频 (MP3)
pub const AUDIO_MPEG: &str = "audio/mpeg";
/// MIME: AC-3 音频
pub const AUDIO_AC3: &str = "audio/ac3";
/// MIME: AAC 音频
pub const AUDIO_AAC: &str = "audio/mp4a-latm";
/// MIME: 原始 PCM 音频
pub const AUDIO_RAW: &str = "audio/raw";
/// MIME: Monkey's Audio
pub const AUDIO_APE: &str = "audio/x-ape";

/// PCM 编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    /// 8 位无符号
    U8,
    /// 16 位小端有符号
    S16Le,
    /// 24 位小端有符号
    S24Le,
    /// 32 位小端有符号
    S32Le,
    /// 32 位小端浮点
    F32Le,
}

/// 轨道格式
///
/// 在头部解析完成后构建一次, 之后不再修改.
#[derive(Debug, Clone, Default)]
pub struct TrackFormat {
    /// 轨道 id (容器中的流序号)
    pub id: u32,
    /// 采样 MIME 类型
    pub mime: String,
    /// 编解码器描述串 (如 "ape")
    pub codecs: Option<String>,
    /// 轨道名称 (来自容器元数据)
    pub label: Option<String>,
    /// 平均码率 (bps, 0 表示未知)
    pub average_bitrate: u32,
    /// 单个样本的建议最大字节数 (0 表示未知)
    pub max_input_size: u32,
    /// 解码器初始化数据
    pub codec_init: Vec<Bytes>,

    // === 视频参数 ===
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 帧率 (fps, 0.0 表示未知)
    pub frame_rate: f32,

    // === 音频参数 ===
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// PCM 编码方式 (仅对未压缩音频有意义)
    pub pcm_encoding: Option<PcmEncoding>,
}

impl PcmEncoding {
    /// 根据位深推导 PCM 编码方式
    pub fn from_bits_per_sample(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16Le),
            24 => Some(Self::S24Le),
            32 => Some(Self::S32Le),
            _ => None,
        }
    }
}
