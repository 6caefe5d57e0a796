//! 에러 타입 정의

use thiserror::Error;

/// BPS 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    /// 추출기/코덱 입력 형태 오류 (호출자 버그)
    #[error("유효하지 않은 입력 형태: {reason}")]
    TypeInvalid { reason: String },

    #[error("CRC 불일치: expected {expected:02X}, got {got:02X}")]
    ChecksumMismatch { expected: u8, got: u8 },

    #[error("유효하지 않은 패킷 헤더: sync={sync:02X?}, len={len}")]
    InvalidHeader { sync: [u8; 2], len: u8 },

    #[error("유효하지 않은 패킷 길이: expected {expected}, got {got}")]
    InvalidPacketLength { expected: usize, got: usize },

    #[error("링크 IO 에러: {0}")]
    LinkIo(#[from] std::io::Error),

    #[error("링크 타임아웃: {wanted} 바이트 중 {got} 바이트 수신")]
    LinkTimeout { wanted: usize, got: usize },

    #[error("시리얼 포트 에러: {0}")]
    Serial(#[from] serialport::Error),

    #[error("연결 종료")]
    ConnectionClosed,

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn type_invalid(reason: impl Into<String>) -> Self {
        Error::TypeInvalid {
            reason: reason.into(),
        }
    }

    /// 패킷 단위로 버려도 되는 에러인지 (수신 루프에서 로컬 처리)
    pub fn is_packet_invalid(&self) -> bool {
        matches!(
            self,
            Error::ChecksumMismatch { .. }
                | Error::InvalidHeader { .. }
                | Error::InvalidPacketLength { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_invalid_classification() {
        assert!(Error::ChecksumMismatch { expected: 1, got: 2 }.is_packet_invalid());
        assert!(Error::InvalidHeader { sync: [0, 0], len: 8 }.is_packet_invalid());
        assert!(!Error::ConnectionClosed.is_packet_invalid());
        assert!(!Error::LinkTimeout { wanted: 12, got: 3 }.is_packet_invalid());
    }
}
