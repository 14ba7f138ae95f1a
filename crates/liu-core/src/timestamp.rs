//! 时间工具.
//!
//! 框架内所有时间戳统一以 64 位微秒表示, 中间乘积也在 64 位内完成,
//! 避免大文件下的溢出.

/// 表示"未定义"的微秒时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 每秒的微秒数
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// 采样号换算为微秒时间戳
pub fn time_us_from_samples(samples: i64, sample_rate: u32) -> i64 {
    if sample_rate == 0 {
        return 0;
    }
    MICROS_PER_SECOND * samples / i64::from(sample_rate)
}

/// 微秒时间戳换算为采样号, 并收敛到 `[0, total_samples - 1]`
pub fn samples_from_time_us(time_us: i64, sample_rate: u32, total_samples: i64) -> i64 {
    let samples = time_us * i64::from(sample_rate) / MICROS_PER_SECOND;
    samples.clamp(0, (total_samples - 1).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_采样号与微秒互转() {
        assert_eq!(time_us_from_samples(44100, 44100), MICROS_PER_SECOND);
        assert_eq!(samples_from_time_us(MICROS_PER_SECOND, 44100, 88200), 44100);
    }

    #[test]
    fn test_采样号收敛边界() {
        assert_eq!(samples_from_time_us(-5, 44100, 100), 0);
        assert_eq!(samples_from_time_us(i64::MAX / 44100, 44100, 100), 99);
    }
}
