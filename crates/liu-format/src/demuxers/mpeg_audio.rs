//! MPEG 音频帧头解析.
//!
//! 帧头结构 (32 位, 按字节流顺序的大端视图):
//! ```text
//! AAAA AAAA  AAAB BCCD  EEEE FFGH  IIJJ KLMM
//! A = 同步位 (11 bit, 全1)   B = MPEG 版本    C = 层
//! D = CRC 保护              E = 比特率索引    F = 采样率索引
//! G = 填充位                H = 私有位        I = 声道模式
//! ```
//!
//! AVI 音频块内的 MP3 数据常混入 ID3 片段或零填充, 读取方需要以
//! 本模块的有效性判定为准逐字节重同步.

/// MPEG 音频版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1
    V1,
    /// MPEG-2
    V2,
    /// MPEG-2.5
    V25,
}

/// MPEG 音频帧头部信息
#[derive(Debug, Clone, Copy)]
pub struct MpegAudioHeader {
    /// MPEG 版本
    pub version: MpegVersion,
    /// 层 (1, 2, 3)
    pub layer: u8,
    /// 比特率 (bps)
    pub bitrate: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 帧总字节数 (含头部)
    pub frame_size: u32,
    /// 每帧采样数
    pub samples_per_frame: u32,
}

/// MPEG-1 Layer III 比特率表 (kbps), 索引 1-14
const BITRATE_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

/// MPEG-2/2.5 Layer III 比特率表 (kbps), 索引 1-14
const BITRATE_V2_L3: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// MPEG-1 Layer II 比特率表 (kbps)
const BITRATE_V1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];

/// MPEG-1 Layer I 比特率表 (kbps)
const BITRATE_V1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];

/// MPEG-1 采样率表
const SAMPLERATE_V1: [u32; 3] = [44100, 48000, 32000];

/// 解析 4 字节帧头, 未通过有效性判定返回 None
pub fn parse_header(header: u32) -> Option<MpegAudioHeader> {
    // 同步位 (bit 31-21 必须全为 1)
    if (header >> 21) != 0x7FF {
        return None;
    }

    // MPEG 版本 (bit 20-19)
    let version = match (header >> 19) & 0x03 {
        0 => MpegVersion::V25,
        2 => MpegVersion::V2,
        3 => MpegVersion::V1,
        _ => return None, // 1 = reserved
    };

    // 层 (bit 18-17)
    let layer = match (header >> 17) & 0x03 {
        1 => 3,           // Layer III
        2 => 2,           // Layer II
        3 => 1,           // Layer I
        _ => return None, // 0 = reserved
    };

    // 比特率索引 (bit 15-12)
    let br_idx = ((header >> 12) & 0x0F) as usize;
    if br_idx == 0 || br_idx == 15 {
        return None; // free / bad
    }

    let bitrate_kbps = match (version, layer) {
        (MpegVersion::V1, 3) => BITRATE_V1_L3[br_idx],
        (MpegVersion::V1, 2) => BITRATE_V1_L2[br_idx],
        (MpegVersion::V1, 1) => BITRATE_V1_L1[br_idx],
        (_, 3) | (_, 2) => BITRATE_V2_L3[br_idx],
        (_, 1) => BITRATE_V1_L2[br_idx],
        _ => return None,
    };
    let bitrate = bitrate_kbps * 1000;

    // 采样率索引 (bit 11-10)
    let sr_idx = ((header >> 10) & 0x03) as usize;
    if sr_idx == 3 {
        return None; // reserved
    }
    let sample_rate = match version {
        MpegVersion::V1 => SAMPLERATE_V1[sr_idx],
        MpegVersion::V2 => SAMPLERATE_V1[sr_idx] / 2,
        MpegVersion::V25 => SAMPLERATE_V1[sr_idx] / 4,
    };

    // 填充 (bit 9)
    let padding = (header >> 9) & 1;

    // 每帧采样数
    let samples_per_frame = match (version, layer) {
        (_, 1) => 384,
        (_, 2) => 1152,
        (MpegVersion::V1, 3) => 1152,
        (_, 3) => 576,
        _ => return None,
    };

    // 帧大小
    let frame_size = if layer == 1 {
        (12 * bitrate / sample_rate + padding) * 4
    } else {
        let factor = if matches!(version, MpegVersion::V1) {
            144
        } else {
            72
        };
        factor * bitrate / sample_rate + padding
    };

    if frame_size < 4 {
        return None;
    }

    Some(MpegAudioHeader {
        version,
        layer,
        bitrate,
        sample_rate,
        frame_size,
        samples_per_frame,
    })
}
