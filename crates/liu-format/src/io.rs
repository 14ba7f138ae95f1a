//! I/O 抽象层.
//!
//! 为解封装器提供统一的只读字节源接口, 支持文件、内存缓冲区等不同后端.
//!
//! 除常规的读/跳/定位外, `IoContext` 还维护一个独立的窥视 (peek) 游标:
//! 窥视不移动逻辑读游标, 随后的读取保证返回被窥视过的字节.
//! 容器探测和块头预读都依赖这一语义.

use std::io::{self, Read, Seek};

use liu_core::{LiuError, LiuResult};

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的字节来源 (文件、内存、网络等).
pub trait IoBackend: Send {
    /// 读取数据到缓冲区, 返回读到的字节数 (0 表示流结束)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位 (seek)
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持 seek
    fn is_seekable(&self) -> bool;
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// I/O 上下文
///
/// 封装底层 I/O 后端, 为解封装器提供带缓冲的读取、小端整数读取和
/// 独立窥视游标. 所有读取失败于数据不足时返回 [`LiuError::Eof`].
pub struct IoContext {
    /// 内部 I/O 后端
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
    /// 窥视游标相对读游标的偏移
    peek_off: usize,
}

impl IoContext {
    /// 从 I/O 后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
            peek_off: 0,
        }
    }

    /// 从文件路径打开 (只读)
    pub fn open(path: &str) -> LiuResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    // ========================
    // 读取方法
    // ========================

    /// 读满指定缓冲区, 数据不足返回 Eof
    pub fn read_exact(&mut self, buf: &mut [u8]) -> LiuResult<()> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let to_copy = buffered.min(buf.len() - total_read);
                buf[total_read..total_read + to_copy]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                self.peek_off = self.peek_off.saturating_sub(to_copy);
                total_read += to_copy;
            } else {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    return Err(LiuError::Eof);
                }
            }
        }
        Ok(())
    }

    /// 读取尽可能多的数据 (可能为部分读取), 返回读到的字节数, 0 表示流结束
    pub fn read(&mut self, buf: &mut [u8]) -> LiuResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let buffered = self.buf_len - self.buf_pos;
        if buffered > 0 {
            let to_copy = buffered.min(buf.len());
            buf[..to_copy].copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
            self.buf_pos += to_copy;
            self.peek_off = self.peek_off.saturating_sub(to_copy);
            return Ok(to_copy);
        }
        Ok(self.inner.read(buf)?)
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> LiuResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// 读取 u16 小端
    pub fn read_u16_le(&mut self) -> LiuResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// 读取 u24 小端 (3 字节无符号整数)
    pub fn read_u24_le(&mut self) -> LiuResult<u32> {
        let mut buf = [0u8; 3];
        self.read_exact(&mut buf)?;
        Ok(u32::from(buf[0]) | (u32::from(buf[1]) << 8) | (u32::from(buf[2]) << 16))
    }

    /// 读取 u32 小端
    pub fn read_u32_le(&mut self) -> LiuResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// 读取 i32 小端
    pub fn read_i32_le(&mut self) -> LiuResult<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// 读取 u64 小端
    pub fn read_u64_le(&mut self) -> LiuResult<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// 读取 4 字节标签 (FourCC)
    pub fn read_tag(&mut self) -> LiuResult<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取指定数量的字节
    pub fn read_bytes(&mut self, count: usize) -> LiuResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 跳过指定字节数
    pub fn skip(&mut self, count: usize) -> LiuResult<()> {
        // 先消耗缓冲区中的数据
        let buffered = self.buf_len - self.buf_pos;
        if count <= buffered {
            self.buf_pos += count;
            self.peek_off = self.peek_off.saturating_sub(count);
            return Ok(());
        }

        let remaining = count - buffered;
        self.buf_pos = self.buf_len;
        self.peek_off = 0;

        if self.inner.is_seekable() {
            let end = self.inner.position()? + remaining as u64;
            if let Some(size) = self.inner.size() {
                if end > size {
                    self.inner.seek(io::SeekFrom::End(0))?;
                    return Err(LiuError::Eof);
                }
            }
            self.inner.seek(io::SeekFrom::Current(remaining as i64))?;
        } else {
            // 逐块丢弃读取的数据
            let mut left = remaining;
            while left > 0 {
                let to_read = left.min(self.buffer.len());
                let read = self.inner.read(&mut self.buffer[..to_read])?;
                if read == 0 {
                    return Err(LiuError::Eof);
                }
                left -= read;
            }
            self.buf_pos = 0;
            self.buf_len = 0;
        }
        Ok(())
    }

    // ========================
    // 窥视方法
    // ========================

    /// 确保读游标之后至少缓冲了 `n` 字节 (供窥视使用)
    fn fill_for_peek(&mut self, n: usize) -> LiuResult<()> {
        if self.buf_len - self.buf_pos >= n {
            return Ok(());
        }
        // 把未消耗的数据搬到缓冲区头部, 腾出尾部空间
        if self.buf_pos > 0 {
            self.buffer.copy_within(self.buf_pos..self.buf_len, 0);
            self.buf_len -= self.buf_pos;
            self.buf_pos = 0;
        }
        if n > self.buffer.len() {
            self.buffer.resize(n, 0);
        }
        while self.buf_len < n {
            let read = self.inner.read(&mut self.buffer[self.buf_len..])?;
            if read == 0 {
                return Err(LiuError::Eof);
            }
            self.buf_len += read;
        }
        Ok(())
    }

    /// 从窥视游标处读满指定缓冲区, 并推进窥视游标
    ///
    /// 不移动逻辑读游标; 随后的 `read_exact` 仍会返回这些字节.
    pub fn peek_fully(&mut self, buf: &mut [u8]) -> LiuResult<()> {
        self.fill_for_peek(self.peek_off + buf.len())?;
        let start = self.buf_pos + self.peek_off;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        self.peek_off += buf.len();
        Ok(())
    }

    /// 推进窥视游标 (不读出数据)
    pub fn advance_peek_position(&mut self, n: usize) -> LiuResult<()> {
        self.fill_for_peek(self.peek_off + n)?;
        self.peek_off += n;
        Ok(())
    }

    /// 将窥视游标重置到读游标处
    pub fn reset_peek_position(&mut self) {
        self.peek_off = 0;
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位 (seek)
    ///
    /// 注意: seek 会清空读缓冲区和窥视游标.
    pub fn seek(&mut self, pos: io::SeekFrom) -> LiuResult<u64> {
        self.buf_pos = 0;
        self.buf_len = 0;
        self.peek_off = 0;
        Ok(self.inner.seek(pos)?)
    }

    /// 获取当前逻辑读位置
    ///
    /// 考虑读缓冲区中尚未消耗的数据量.
    pub fn position(&mut self) -> LiuResult<u64> {
        let raw_pos = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw_pos - buffered)
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小 (None 表示未知)
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// 文件 I/O 后端
pub struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    /// 从打开的文件创建后端
    pub fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区 I/O 后端
///
/// 用于测试和内存中处理.
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_io(data: Vec<u8>) -> IoContext {
        IoContext::new(Box::new(MemoryBackend::from_data(data)))
    }

    #[test]
    fn test_小端整数读取() {
        let mut io = memory_io(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(io.read_u16_le().unwrap(), 0x0201);
        assert_eq!(io.read_u24_le().unwrap(), 0x05_0403);
        assert_eq!(io.read_u8().unwrap(), 0x06);
        assert_eq!(io.position().unwrap(), 6);
        assert!(matches!(io.read_u32_le(), Err(LiuError::Eof)));
    }

    #[test]
    fn test_窥视后读取返回相同字节() {
        let mut io = memory_io((0u8..32).collect());
        let mut peeked = [0u8; 12];
        io.peek_fully(&mut peeked).unwrap();
        assert_eq!(io.position().unwrap(), 0);

        let mut read = [0u8; 12];
        io.read_exact(&mut read).unwrap();
        assert_eq!(peeked, read);
        assert_eq!(io.position().unwrap(), 12);
    }

    #[test]
    fn test_窥视游标重置与推进() {
        let mut io = memory_io((0u8..64).collect());
        io.advance_peek_position(8).unwrap();
        let mut buf = [0u8; 4];
        io.peek_fully(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);

        io.reset_peek_position();
        io.peek_fully(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        // 读取消耗被窥视过的区域后, 窥视游标随之回收
        let mut head = [0u8; 2];
        io.read_exact(&mut head).unwrap();
        io.reset_peek_position();
        io.peek_fully(&mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4, 5]);
    }

    #[test]
    fn test_跳过超出末尾返回eof() {
        let mut io = memory_io(vec![0u8; 16]);
        io.skip(8).unwrap();
        assert!(matches!(io.skip(100), Err(LiuError::Eof)));
    }

    #[test]
    fn test_部分读取() {
        let mut io = memory_io((0u8..8).collect());
        let mut buf = [0u8; 16];
        let n = io.read(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert_eq!(io.read(&mut buf).unwrap(), 0);
    }
}
