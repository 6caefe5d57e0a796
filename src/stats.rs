//! 링크 전송 통계

use std::time::{Duration, Instant};

use crate::Error;

/// 송수신 통계
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 송신 패킷 수
    pub packets_sent: u64,

    /// 송신 바이트
    pub bytes_sent: u64,

    /// 수신 (유효) 패킷 수
    pub packets_received: u64,

    /// 수신 바이트 (버린 패킷 포함)
    pub bytes_received: u64,

    /// CRC 불일치로 버린 패킷
    pub checksum_failures: u64,

    /// 헤더/길이 오류로 버린 패킷
    pub framing_failures: u64,

    /// 재동기화 중 버린 바이트
    pub resync_bytes_discarded: u64,

    /// 유한하지 않은 파워로 건너뛴 윈도우
    pub windows_skipped: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            packets_sent: 0,
            bytes_sent: 0,
            packets_received: 0,
            bytes_received: 0,
            checksum_failures: 0,
            framing_failures: 0,
            resync_bytes_discarded: 0,
            windows_skipped: 0,
        }
    }

    /// 송신 기록
    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// 버린 패킷 기록 (에러 종류별)
    pub fn record_dropped(&mut self, error: &Error) {
        match error {
            Error::ChecksumMismatch { .. } => self.checksum_failures += 1,
            _ => self.framing_failures += 1,
        }
    }

    /// 버린 패킷 합계
    pub fn packets_dropped(&self) -> u64 {
        self.checksum_failures + self.framing_failures
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 손실률 (버린 패킷 / 전체 수신 시도)
    pub fn drop_rate(&self) -> f64 {
        let total = self.packets_received + self.packets_dropped();
        if total == 0 {
            return 0.0;
        }
        self.packets_dropped() as f64 / total as f64
    }

    /// 초당 패킷 (송신 + 수신)
    pub fn packet_rate(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        (self.packets_sent + self.packets_received) as f64 / elapsed
    }

    /// 통계 리셋
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sent: {} ({} B) | Received: {} | Dropped: {} (crc {}, framing {}) | Drop: {:.2}% | Resync: {} B | Skipped windows: {}",
            self.elapsed().as_secs_f64(),
            self.packets_sent,
            self.bytes_sent,
            self.packets_received,
            self.packets_dropped(),
            self.checksum_failures,
            self.framing_failures,
            self.drop_rate() * 100.0,
            self.resync_bytes_discarded,
            self.windows_skipped,
        )
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_accounting() {
        let mut stats = LinkStats::new();
        stats.packets_received = 3;
        stats.record_dropped(&Error::ChecksumMismatch { expected: 1, got: 2 });
        stats.record_dropped(&Error::InvalidHeader { sync: [0, 0], len: 0 });

        assert_eq!(stats.packets_dropped(), 2);
        assert_eq!(stats.checksum_failures, 1);
        assert!((stats.drop_rate() - 0.4).abs() < 1e-12);

        stats.reset();
        assert_eq!(stats.packets_dropped(), 0);
        assert_eq!(stats.drop_rate(), 0.0);
    }
}
