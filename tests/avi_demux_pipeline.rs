//! AVI 解封装器集成测试.
//!
//! 在内存中构造符合 RIFF/AVI 规范的二进制数据, 测试完整的
//! 探测 → 头部解析 → 样本读取 → 定位 流程, 覆盖 idx1 旧式索引、
//! OpenDML 两级惰性索引与多 RIFF (AVIX) 续接.

use std::io::SeekFrom;

use liu_core::{LiuResult, MediaType};
use liu_format::demuxer::{
    Demuxer, ReadResult, SeekMap, TrackSink, SAMPLE_FLAG_KEY_FRAME,
};
use liu_format::demuxers::avi::AviDemuxer;
use liu_format::io::{IoContext, MemoryBackend};
use liu_format::stream::TrackFormat;

/// idx1 条目标志: 关键帧
const AVIIF_KEYFRAME: u32 = 0x10;
/// avih 标志: 带 idx1 索引
const AVIF_HAS_INDEX: u32 = 0x10;

// ========================
// 构造辅助
// ========================

fn push_chunk(buf: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(body);
    if body.len() % 2 != 0 {
        buf.push(0);
    }
}

fn avih_body(frame_duration_us: u32, total_frames: u32, streams: u32, flags: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&frame_duration_us.to_le_bytes());
    body.extend_from_slice(&[0u8; 8]);
    body.extend_from_slice(&flags.to_le_bytes());
    body.extend_from_slice(&total_frames.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&streams.to_le_bytes());
    body.extend_from_slice(&[0u8; 28]);
    body
}

fn strh_body(stream_type: &[u8; 4], handler: &[u8; 4], scale: u32, rate: u32, length: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(stream_type);
    body.extend_from_slice(handler);
    body.extend_from_slice(&[0u8; 12]);
    body.extend_from_slice(&scale.to_le_bytes());
    body.extend_from_slice(&rate.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&length.to_le_bytes());
    body.extend_from_slice(&[0u8; 16]);
    body
}

fn video_strf() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&40u32.to_le_bytes());
    body.extend_from_slice(&320u32.to_le_bytes());
    body.extend_from_slice(&240u32.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&24u16.to_le_bytes());
    body.extend_from_slice(b"H264");
    body.extend_from_slice(&[0u8; 20]);
    body
}

fn mp3_strf(sample_rate: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x0055u16.to_le_bytes());
    body.extend_from_slice(&2u16.to_le_bytes());
    body.extend_from_slice(&sample_rate.to_le_bytes());
    body.extend_from_slice(&16_000u32.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body
}

/// 一个有效的 417 字节 MPEG-1 Layer III 帧 (128 kbps / 44100 Hz)
fn mp3_frame(marker: u8) -> Vec<u8> {
    let mut frame = vec![marker; 417];
    frame[0] = 0xFF;
    frame[1] = 0xFB;
    frame[2] = 0x90;
    frame[3] = 0x00;
    frame
}

// ========================
// 收集接收器与驱动
// ========================

#[derive(Default)]
struct CollectSink {
    tracks: Vec<(u32, MediaType)>,
    formats: Vec<TrackFormat>,
    seek_maps: Vec<SeekMap>,
    /// (轨道, 时间戳, 标志, 大小)
    samples: Vec<(u32, i64, u32, u32)>,
    data: Vec<u8>,
}

impl TrackSink for CollectSink {
    fn track(&mut self, id: u32, media_type: MediaType) {
        self.tracks.push((id, media_type));
    }

    fn format(&mut self, _id: u32, format: TrackFormat) {
        self.formats.push(format);
    }

    fn end_tracks(&mut self) {}

    fn sample_data(&mut self, _id: u32, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn sample_data_from(&mut self, _id: u32, io: &mut IoContext, length: usize) -> LiuResult<usize> {
        let mut buf = vec![0u8; length];
        let read = io.read(&mut buf)?;
        self.data.extend_from_slice(&buf[..read]);
        Ok(read)
    }

    fn sample_metadata(&mut self, id: u32, time_us: i64, flags: u32, size: u32, _offset: u32) {
        self.samples.push((id, time_us, flags, size));
    }

    fn seek_map(&mut self, seek_map: SeekMap) {
        self.seek_maps.push(seek_map);
    }
}

/// 驱动解封装到输入结束
fn drive(demuxer: &mut AviDemuxer, io: &mut IoContext, sink: &mut CollectSink) {
    loop {
        match demuxer.read(io, sink).unwrap() {
            ReadResult::Continue => {}
            ReadResult::Seek(position) => {
                io.seek(SeekFrom::Start(position)).unwrap();
            }
            ReadResult::EndOfInput => break,
        }
    }
}

fn memory_io(data: Vec<u8>) -> IoContext {
    IoContext::new(Box::new(MemoryBackend::from_data(data)))
}

// ========================
// 平铺 AVI (idx1)
// ========================

/// 单视频流 AVI: `frame_count` 帧, 每 `keyframe_interval` 帧一个关键帧,
/// idx1 收录所有块. 块体 64 字节, 内容为帧序号.
fn build_plain_avi(frame_count: u32, keyframe_interval: u32, rate: u32) -> Vec<u8> {
    let mut hdrl = Vec::new();
    hdrl.extend_from_slice(b"hdrl");
    push_chunk(
        &mut hdrl,
        b"avih",
        &avih_body(1_000_000 / rate, frame_count, 1, AVIF_HAS_INDEX),
    );
    let mut strl = Vec::new();
    strl.extend_from_slice(b"strl");
    push_chunk(&mut strl, b"strh", &strh_body(b"vids", b"H264", 1, rate, frame_count));
    push_chunk(&mut strl, b"strf", &video_strf());
    push_chunk(&mut hdrl, b"LIST", &strl);

    let mut movi = Vec::new();
    movi.extend_from_slice(b"movi");
    let mut offsets = Vec::new();
    for i in 0..frame_count {
        offsets.push(movi.len() as u32); // 相对 movi fourCC
        push_chunk(&mut movi, b"00dc", &vec![i as u8; 64]);
    }

    let mut idx1 = Vec::new();
    for (i, &offset) in offsets.iter().enumerate() {
        idx1.extend_from_slice(b"00dc");
        let flags = if i as u32 % keyframe_interval == 0 {
            AVIIF_KEYFRAME
        } else {
            0
        };
        idx1.extend_from_slice(&flags.to_le_bytes());
        idx1.extend_from_slice(&offset.to_le_bytes());
        idx1.extend_from_slice(&64u32.to_le_bytes());
    }

    let mut riff_body = Vec::new();
    riff_body.extend_from_slice(b"AVI ");
    push_chunk(&mut riff_body, b"LIST", &hdrl);
    push_chunk(&mut riff_body, b"LIST", &movi);
    push_chunk(&mut riff_body, b"idx1", &idx1);

    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(riff_body.len() as u32).to_le_bytes());
    file.extend_from_slice(&riff_body);
    file
}

#[test]
fn test_平铺avi_顺序读取() {
    // 250 帧 / 25 fps = 10 秒
    let file = build_plain_avi(250, 25, 25);
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    assert!(demuxer.sniff(&mut io).unwrap());

    let mut sink = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink);

    assert_eq!(sink.tracks, vec![(0, MediaType::Video)]);
    assert_eq!(sink.seek_maps.len(), 1);
    assert!(sink.seek_maps[0].is_seekable());
    assert_eq!(demuxer.duration_us(), Some(10_000_000));

    assert_eq!(sink.samples.len(), 250);
    let mut last_time = -1i64;
    for (i, &(_, time_us, flags, _)) in sink.samples.iter().enumerate() {
        // 同一流内时间戳严格递增
        assert!(time_us > last_time);
        last_time = time_us;
        let expect_key = i % 25 == 0;
        assert_eq!(flags == SAMPLE_FLAG_KEY_FRAME, expect_key, "帧 {i}");
    }
}

#[test]
fn test_平铺avi_定位到中点() {
    // 10 秒, 250 帧, 每 25 帧一个关键帧: 第 125 帧恰是关键帧
    let file = build_plain_avi(250, 25, 25);
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    let mut sink = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink);

    let points = demuxer.seek_points(5_000_000);
    assert_eq!(points.first.time_us, 5_000_000);
    assert!(points.second.is_none());

    demuxer.seek(points.first.position, 5_000_000);
    io.seek(SeekFrom::Start(points.first.position)).unwrap();
    assert_eq!(io.position().unwrap(), points.first.position);

    let mut sink2 = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink2);
    // 第一个样本正是请求的关键帧
    let &(_, time_us, flags, _) = sink2.samples.first().unwrap();
    assert_eq!(time_us, 5_000_000);
    assert_eq!(flags, SAMPLE_FLAG_KEY_FRAME);
    assert_eq!(sink2.data[0], 125);
    assert_eq!(sink2.samples.len(), 125);
}

// ========================
// 音视频交错
// ========================

/// 视频 + MP3 双流 AVI, 块交错排列, idx1 收录所有块
fn build_interleaved_avi(video_frames: u32, audio_chunks: u32) -> Vec<u8> {
    let mut hdrl = Vec::new();
    hdrl.extend_from_slice(b"hdrl");
    push_chunk(
        &mut hdrl,
        b"avih",
        &avih_body(40_000, video_frames, 2, AVIF_HAS_INDEX),
    );
    let mut strl_video = Vec::new();
    strl_video.extend_from_slice(b"strl");
    push_chunk(&mut strl_video, b"strh", &strh_body(b"vids", b"H264", 1, 25, video_frames));
    push_chunk(&mut strl_video, b"strf", &video_strf());
    push_chunk(&mut hdrl, b"LIST", &strl_video);

    let mut strl_audio = Vec::new();
    strl_audio.extend_from_slice(b"strl");
    push_chunk(&mut strl_audio, b"strh", &strh_body(b"auds", b"\0\0\0\0", 1, 4, audio_chunks));
    push_chunk(&mut strl_audio, b"strf", &mp3_strf(44100));
    push_chunk(&mut hdrl, b"LIST", &strl_audio);

    let mut movi = Vec::new();
    movi.extend_from_slice(b"movi");
    let mut entries = Vec::new(); // (tag, 偏移, 大小, 关键帧)
    let count = video_frames.max(audio_chunks);
    for i in 0..count {
        if i < video_frames {
            entries.push((*b"00dc", movi.len() as u32, 64u32, true));
            push_chunk(&mut movi, b"00dc", &vec![i as u8; 64]);
        }
        if i < audio_chunks {
            let frame = mp3_frame(i as u8);
            entries.push((*b"01wb", movi.len() as u32, frame.len() as u32, true));
            push_chunk(&mut movi, b"01wb", &frame);
        }
    }

    let mut idx1 = Vec::new();
    for &(tag, offset, size, key) in &entries {
        idx1.extend_from_slice(&tag);
        idx1.extend_from_slice(&if key { AVIIF_KEYFRAME } else { 0 }.to_le_bytes());
        idx1.extend_from_slice(&offset.to_le_bytes());
        idx1.extend_from_slice(&size.to_le_bytes());
    }

    let mut riff_body = Vec::new();
    riff_body.extend_from_slice(b"AVI ");
    push_chunk(&mut riff_body, b"LIST", &hdrl);
    push_chunk(&mut riff_body, b"LIST", &movi);
    push_chunk(&mut riff_body, b"idx1", &idx1);

    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(riff_body.len() as u32).to_le_bytes());
    file.extend_from_slice(&riff_body);
    file
}

#[test]
fn test_交错avi_双流读取() {
    let file = build_interleaved_avi(4, 4);
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    let mut sink = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink);

    assert_eq!(
        sink.tracks,
        vec![(0, MediaType::Video), (1, MediaType::Audio)]
    );
    let video: Vec<_> = sink.samples.iter().filter(|s| s.0 == 0).collect();
    let audio: Vec<_> = sink.samples.iter().filter(|s| s.0 == 1).collect();
    assert_eq!(video.len(), 4);
    assert_eq!(audio.len(), 4);

    // 每条流内时间戳严格递增; 音频按 MPEG 帧时长推进
    let frame_time = 1152 * 1_000_000 / 44100;
    for (i, sample) in video.iter().enumerate() {
        assert_eq!(sample.1, i as i64 * 40_000);
    }
    for (i, sample) in audio.iter().enumerate() {
        assert_eq!(sample.1, i as i64 * frame_time);
        assert_eq!(sample.2, SAMPLE_FLAG_KEY_FRAME);
        assert_eq!(sample.3, 417);
    }
}

// ========================
// OpenDML 两级索引
// ========================

/// OpenDML AVI: 无 idx1, 超级索引两个分段, `ix00` 散布在 movi 中.
/// 视频 8 帧 (4 fps), 每分段 4 帧, 全部关键帧.
/// 返回 (文件, 分段 1 首帧的文件偏移).
fn build_open_dml_avi() -> (Vec<u8>, u64) {
    let frame_count = 8u32;
    let seg_frames = 4u32;
    let ix_chunk_size = 32 + seg_frames * 8; // 块体大小

    let mut hdrl = Vec::new();
    hdrl.extend_from_slice(b"hdrl");
    push_chunk(&mut hdrl, b"avih", &avih_body(250_000, frame_count, 1, 0));
    let mut strl = Vec::new();
    strl.extend_from_slice(b"strl");
    push_chunk(&mut strl, b"strh", &strh_body(b"vids", b"H264", 1, 4, frame_count));
    push_chunk(&mut strl, b"strf", &video_strf());
    // indx 超级索引: 偏移稍后回填
    let mut indx = Vec::new();
    indx.extend_from_slice(&4u16.to_le_bytes()); // wLongsPerEntry
    indx.push(0); // bIndexSubType
    indx.push(0); // bIndexType = AVI_INDEX_OF_INDEXES
    indx.extend_from_slice(&2u32.to_le_bytes()); // nEntriesInUse
    indx.extend_from_slice(b"00dc");
    indx.extend_from_slice(&[0u8; 12]); // dwReserved
    let super_entries_in_indx = indx.len();
    for _ in 0..2 {
        indx.extend_from_slice(&0u64.to_le_bytes()); // qwOffset (回填)
        indx.extend_from_slice(&ix_chunk_size.to_le_bytes());
        indx.extend_from_slice(&500u32.to_le_bytes()); // dwDuration
    }
    let indx_in_strl = strl.len() + 8;
    push_chunk(&mut strl, b"indx", &indx);
    let strl_in_hdrl = hdrl.len() + 8;
    push_chunk(&mut hdrl, b"LIST", &strl);

    // movi: 4 帧 + ix00(分段0) + 4 帧 + ix00(分段1)
    let mut movi = Vec::new();
    movi.extend_from_slice(b"movi");
    let mut chunk_offsets = Vec::new(); // 相对 movi 缓冲起点
    let mut ix_offsets_in_movi = Vec::new();
    for seg in 0..2u32 {
        let base = movi.len(); // 本段第一个块头, 作为标准索引的基准
        for i in 0..seg_frames {
            let frame_no = seg * seg_frames + i;
            chunk_offsets.push(movi.len());
            push_chunk(&mut movi, b"00dc", &vec![frame_no as u8; 64]);
        }
        let mut ix = Vec::new();
        ix.extend_from_slice(&2u16.to_le_bytes()); // wLongsPerEntry
        ix.push(0); // bIndexSubType
        ix.push(1); // bIndexType = AVI_INDEX_OF_CHUNKS
        ix.extend_from_slice(&seg_frames.to_le_bytes());
        ix.extend_from_slice(b"00dc");
        ix.extend_from_slice(&0u64.to_le_bytes()); // qwBaseOffset (回填)
        ix.extend_from_slice(&[0u8; 4]); // dwReserved
        for i in 0..seg_frames as usize {
            // 条目偏移指向块内数据 (块头 + 8), 相对基准
            let data_offset = (chunk_offsets[(seg * seg_frames) as usize + i] + 8 - base) as u32;
            ix.extend_from_slice(&data_offset.to_le_bytes());
            ix.extend_from_slice(&64u32.to_le_bytes());
        }
        ix_offsets_in_movi.push((movi.len(), base));
        push_chunk(&mut movi, b"ix00", &ix);
    }

    let mut riff_body = Vec::new();
    riff_body.extend_from_slice(b"AVI ");
    push_chunk(&mut riff_body, b"LIST", &hdrl);
    let movi_list_pos_in_riff = riff_body.len();
    push_chunk(&mut riff_body, b"LIST", &movi);

    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(riff_body.len() as u32).to_le_bytes());
    file.extend_from_slice(&riff_body);

    // 回填: movi 缓冲起点 ("movi" fourCC) 的文件偏移.
    // 文件布局: RIFF 头(8) + "AVI "(4) + 各 LIST
    let movi_fourcc_pos = 8 + movi_list_pos_in_riff + 8;
    // hdrl 缓冲 (含 "hdrl" fourCC) 在文件中的偏移: 12 + LIST 头(8)
    let hdrl_in_file = 12 + 8;
    let indx_body_in_file = hdrl_in_file + strl_in_hdrl + indx_in_strl;
    for (seg, &(ix_pos, _)) in ix_offsets_in_movi.iter().enumerate() {
        let entry_pos = indx_body_in_file + super_entries_in_indx + seg * 16;
        let ix_file_offset = (movi_fourcc_pos + ix_pos) as u64;
        file[entry_pos..entry_pos + 8].copy_from_slice(&ix_file_offset.to_le_bytes());
    }
    // 标准索引基准: 各段第一个块头的文件偏移
    for &(ix_pos, base) in &ix_offsets_in_movi {
        let ix_body_in_file = movi_fourcc_pos + ix_pos + 8;
        let base_file_offset = (movi_fourcc_pos + base) as u64;
        file[ix_body_in_file + 12..ix_body_in_file + 20]
            .copy_from_slice(&base_file_offset.to_le_bytes());
    }

    let seg1_first_frame = (movi_fourcc_pos + chunk_offsets[4]) as u64;
    (file, seg1_first_frame)
}

#[test]
fn test_opendml_惰性索引定位() {
    let (file, seg1_first_frame) = build_open_dml_avi();
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    let mut sink = CollectSink::default();

    // 头部解析完成即发布可定位映射 (凭超级索引)
    loop {
        match demuxer.read(&mut io, &mut sink).unwrap() {
            ReadResult::Continue => {}
            ReadResult::Seek(position) => {
                io.seek(SeekFrom::Start(position)).unwrap();
            }
            ReadResult::EndOfInput => break,
        }
        if !sink.seek_maps.is_empty() && !sink.samples.is_empty() {
            break;
        }
    }
    assert!(sink.seek_maps[0].is_seekable());

    // 1.5 秒 (总时长 2 秒) 落在分段 1, 其索引尚未加载:
    // 返回的过渡目标是分段 1 的 ix00 块
    let points = demuxer.seek_points(1_500_000);
    demuxer.seek(points.first.position, 1_500_000);
    io.seek(SeekFrom::Start(points.first.position)).unwrap();

    // 继续驱动: 解封装器先读取索引块, 再自行定位到目标关键帧
    let mut sink2 = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink2);

    let &(_, time_us, flags, _) = sink2.samples.first().unwrap();
    assert_eq!(time_us, 1_500_000);
    assert_eq!(flags, SAMPLE_FLAG_KEY_FRAME);
    // 目标是分段 1 的第 6 帧 (帧号 6)
    assert_eq!(sink2.data[0], 6);

    // 索引就绪后再次查询, 直接得到精确答案
    let points = demuxer.seek_points(1_500_000);
    assert_eq!(points.first.time_us, 1_500_000);
    assert!(points.first.position >= seg1_first_frame);
}

// ========================
// 多 RIFF (AVIX)
// ========================

/// 两个 RIFF 容器: 前 4 帧在 AVI 主体, 后 4 帧在 AVIX 续接.
/// idx1 在主体内, 偏移为文件绝对地址.
fn build_multi_riff_avi() -> Vec<u8> {
    let mut hdrl = Vec::new();
    hdrl.extend_from_slice(b"hdrl");
    push_chunk(&mut hdrl, b"avih", &avih_body(250_000, 8, 1, AVIF_HAS_INDEX));
    let mut strl = Vec::new();
    strl.extend_from_slice(b"strl");
    push_chunk(&mut strl, b"strh", &strh_body(b"vids", b"H264", 1, 4, 8));
    push_chunk(&mut strl, b"strf", &video_strf());
    push_chunk(&mut hdrl, b"LIST", &strl);

    // 先按布局推算各块的文件绝对偏移:
    // 主体: RIFF(12) + LIST hdrl + LIST movi{4 帧} + idx1
    // 续接: RIFF AVIX(12) + LIST movi{4 帧}
    let hdrl_total = 8 + hdrl.len();
    let movi1_pos = 12 + hdrl_total;
    let chunk_stride = 8 + 64;
    let mut offsets = Vec::new();
    for i in 0..4u64 {
        offsets.push(movi1_pos as u64 + 12 + i * chunk_stride as u64);
    }
    let movi1_total = 8 + 4 + 4 * chunk_stride;
    let idx1_pos = movi1_pos + movi1_total;
    let idx1_total = 8 + 8 * 16;
    let avix_pos = idx1_pos + idx1_total;
    for i in 0..4u64 {
        offsets.push(avix_pos as u64 + 12 + 12 + i * chunk_stride as u64);
    }

    let mut idx1 = Vec::new();
    for &offset in &offsets {
        idx1.extend_from_slice(b"00dc");
        idx1.extend_from_slice(&AVIIF_KEYFRAME.to_le_bytes());
        idx1.extend_from_slice(&(offset as u32).to_le_bytes());
        idx1.extend_from_slice(&64u32.to_le_bytes());
    }

    let mut movi1 = Vec::new();
    movi1.extend_from_slice(b"movi");
    for i in 0..4u32 {
        push_chunk(&mut movi1, b"00dc", &vec![i as u8; 64]);
    }
    let mut movi2 = Vec::new();
    movi2.extend_from_slice(b"movi");
    for i in 4..8u32 {
        push_chunk(&mut movi2, b"00dc", &vec![i as u8; 64]);
    }

    let mut riff_body = Vec::new();
    riff_body.extend_from_slice(b"AVI ");
    push_chunk(&mut riff_body, b"LIST", &hdrl);
    push_chunk(&mut riff_body, b"LIST", &movi1);
    push_chunk(&mut riff_body, b"idx1", &idx1);

    let mut avix_body = Vec::new();
    avix_body.extend_from_slice(b"AVIX");
    push_chunk(&mut avix_body, b"LIST", &movi2);

    let mut file = Vec::new();
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(riff_body.len() as u32).to_le_bytes());
    file.extend_from_slice(&riff_body);
    file.extend_from_slice(b"RIFF");
    file.extend_from_slice(&(avix_body.len() as u32).to_le_bytes());
    file.extend_from_slice(&avix_body);

    assert_eq!(avix_pos, file.len() - (12 + 12 + 4 * chunk_stride));
    file
}

#[test]
fn test_多riff_块序号跨容器连续() {
    let file = build_multi_riff_avi();
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    let mut sink = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink);

    // AVIX 被透明消费: 8 帧连续产出
    assert_eq!(sink.samples.len(), 8);
    for (i, &(_, time_us, _, _)) in sink.samples.iter().enumerate() {
        assert_eq!(time_us, i as i64 * 250_000);
    }
    for i in 0..8u8 {
        assert_eq!(sink.data[i as usize * 64], i);
    }
}

#[test]
fn test_多riff_定位进入avix区域() {
    let file = build_multi_riff_avi();
    let file_len = file.len() as u64;
    let mut io = memory_io(file);
    let mut demuxer = AviDemuxer::new();
    let mut sink = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink);

    // 第 6 帧在 AVIX 续接容器内
    let points = demuxer.seek_points(6 * 250_000);
    assert_eq!(points.first.time_us, 6 * 250_000);
    // 目标偏移落在第二个 RIFF 的范围内
    assert!(points.first.position > file_len / 2);

    demuxer.seek(points.first.position, 6 * 250_000);
    io.seek(SeekFrom::Start(points.first.position)).unwrap();
    let mut sink2 = CollectSink::default();
    drive(&mut demuxer, &mut io, &mut sink2);
    assert_eq!(sink2.samples.len(), 2);
    assert_eq!(sink2.samples[0].1, 6 * 250_000);
    assert_eq!(sink2.data[0], 6);
}
