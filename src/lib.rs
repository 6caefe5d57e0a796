//! # BPS (Band Power Stream)
//!
//! 4채널 EEG 샘플 → 대역 파워 → CRC-8 프레임 시리얼 전송
//!
//! ## 핵심 특징
//! - **슬라이딩 윈도우 FFT**: 윈도우마다 delta/theta/alpha/beta 파워 계산
//! - **고정 12바이트 패킷**: 싱크 바이트 + 길이 + u16 × 4 + CRC-8
//! - **무손상 배치 수신**: 깨진 패킷만 버리고 배치는 계속
//! - **선택적 재동기화**: 바이트 유실 링크에서 싱크 바이트 탐색
//! - **링크 추상화**: UART, TCP, 테스트용 목 링크

pub mod acquisition;
pub mod band;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractor;
pub mod link;
pub mod pipeline;
pub mod record;
pub mod sample;
pub mod stats;
pub mod transport;

pub use acquisition::SyntheticSource;
pub use band::{Band, BandTable, FrequencyRange};
pub use codec::{crc8, decode, encode, find_sync, validate_packet};
pub use config::{Config, ExtractorConfig, FramingMode, LinkConfig};
pub use error::{Error, Result};
pub use extractor::{extract_band_powers, extract_from_rows, BandPowerExtractor};
pub use link::{IoLink, Link, MockLink, SerialLink, SharedLink};
pub use pipeline::StreamPipeline;
pub use record::BandPowerRecord;
pub use sample::{Sample, SampleTable};
pub use stats::LinkStats;
pub use transport::{PacketReceiver, PacketSender, ReceiveBatch, ReceiveState};

/// 샘플당 채널 수
pub const CHANNEL_COUNT: usize = 4;

/// 싱크 바이트 1
pub const SYNC_BYTE_1: u8 = 0xAA;

/// 싱크 바이트 2
pub const SYNC_BYTE_2: u8 = 0x55;

/// 페이로드 길이 (u16 × 4)
pub const PAYLOAD_LEN: usize = 8;

/// 패킷 전체 길이 (헤더 3 + 페이로드 8 + CRC 1)
pub const PACKET_SIZE: usize = 12;

/// 기본 윈도우 크기 (샘플)
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// 기본 스텝 (50% 겹침)
pub const DEFAULT_STEP_SIZE: usize = 128;
