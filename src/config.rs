//! 추출기 및 링크 설정

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::band::BandTable;
use crate::{Error, Result, DEFAULT_STEP_SIZE, DEFAULT_WINDOW_SIZE};

/// 샘플 간격 하한 (타이머 주기는 0이 될 수 없음)
const MIN_SAMPLE_PERIOD: Duration = Duration::from_nanos(1);

/// 샘플 간격 상한
const MAX_SAMPLE_PERIOD: Duration = Duration::from_secs(3600);

/// 대역 파워 추출기 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// 윈도우 크기 (샘플 수)
    pub window_size: usize,

    /// 슬라이딩 간격 (샘플 수, 0 < step <= window)
    pub step_size: usize,

    /// 샘플링 레이트 (Hz)
    /// 주파수 축 계산에 사용. 기본값은 window_size와 같음
    pub sample_rate: f64,

    /// 대역 테이블
    pub bands: BandTable,
}

impl ExtractorConfig {
    /// 윈도우/스텝으로 설정 생성
    ///
    /// 샘플링 레이트는 윈도우 크기와 같게 묶임 (bin 간격 1 Hz).
    /// 둘 중 하나만 바꾸면 모든 대역 경계가 이동함
    pub fn new(window_size: usize, step_size: usize) -> Self {
        Self {
            window_size,
            step_size,
            sample_rate: window_size as f64,
            bands: BandTable::canonical(),
        }
    }

    /// 샘플링 레이트 명시 (윈도우 크기와 분리)
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_bands(mut self, bands: BandTable) -> Self {
        self.bands = bands;
        self
    }

    /// 주파수 해상도 (Hz per bin)
    pub fn frequency_resolution(&self) -> f64 {
        self.sample_rate / self.window_size as f64
    }

    /// 샘플 하나의 간격 (획득 타이머 주기)
    ///
    /// [1 ns, 1 h] 범위로 클램프
    pub fn sample_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.sample_rate)
            .unwrap_or(MAX_SAMPLE_PERIOD)
            .clamp(MIN_SAMPLE_PERIOD, MAX_SAMPLE_PERIOD)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 0보다 커야 함".into()));
        }
        if self.step_size == 0 || self.step_size > self.window_size {
            return Err(Error::InvalidConfig(format!(
                "step_size는 1..={} 범위여야 함: {}",
                self.window_size, self.step_size
            )));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "유효하지 않은 sample_rate: {}",
                self.sample_rate
            )));
        }
        if let Some((band, _)) = self.bands.iter().find(|(_, r)| !r.is_well_formed()) {
            return Err(Error::InvalidConfig(format!("{} 대역 범위 오류", band)));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_STEP_SIZE)
    }
}

/// 수신측 프레이밍 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FramingMode {
    /// 고정 정렬: 패킷마다 정확히 12바이트 읽음
    /// 바이트 유실 시 이후 배치 전체가 검증 실패
    #[default]
    Fixed,

    /// 싱크 바이트 탐색으로 재동기화
    Resync,
}

/// 시리얼 링크 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// 포트 경로 (예: /dev/ttyUSB0, COM3)
    pub port: String,

    /// 보레이트
    pub baud_rate: u32,

    /// 읽기 타임아웃 (밀리초)
    pub timeout_ms: u64,

    /// 수신 프레이밍
    pub framing: FramingMode,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 1000,
            framing: FramingMode::Fixed,
        }
    }
}

/// BPS 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub extractor: ExtractorConfig,

    pub link: LinkConfig,

    /// 전송 전 파워 스케일 (u16 범위로 맞추기 위한 배율)
    pub power_scale: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            link: LinkConfig::default(),
            power_scale: 1.0,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// Muse 2 헤드셋 (256 Hz, 4채널)
    pub fn muse2() -> Self {
        Self {
            extractor: ExtractorConfig::new(256, 128).with_sample_rate(256.0),
            ..Self::default()
        }
    }

    /// 저지연 설정 (작은 윈도우, 짧은 스텝)
    pub fn low_latency() -> Self {
        Self {
            extractor: ExtractorConfig::new(128, 32),
            link: LinkConfig {
                timeout_ms: 100,
                ..LinkConfig::default()
            },
            power_scale: 1.0,
        }
    }

    /// 바이트 유실이 있는 링크용 (재동기화 수신)
    pub fn noisy_link() -> Self {
        Self {
            link: LinkConfig {
                framing: FramingMode::Resync,
                ..LinkConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.extractor.validate()?;
        if !self.power_scale.is_finite() || self.power_scale < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "유효하지 않은 power_scale: {}",
                self.power_scale
            )));
        }
        if self.link.baud_rate == 0 {
            return Err(Error::InvalidConfig("baud_rate는 0보다 커야 함".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{Band, FrequencyRange};

    #[test]
    fn test_sample_rate_follows_window() {
        let config = ExtractorConfig::new(512, 256);
        assert_eq!(config.sample_rate, 512.0);
        assert_eq!(config.frequency_resolution(), 1.0);
    }

    #[test]
    fn test_sample_period_is_clamped() {
        let config = ExtractorConfig::new(256, 128);
        assert_eq!(config.sample_period(), Duration::from_secs_f64(1.0 / 256.0));

        let fast = config.clone().with_sample_rate(1e12);
        assert!(fast.validate().is_ok());
        assert_eq!(fast.sample_period(), Duration::from_nanos(1));

        let slow = config.with_sample_rate(1e-30);
        assert!(slow.validate().is_ok());
        assert_eq!(slow.sample_period(), Duration::from_secs(3600));
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [
            Config::default(),
            Config::muse2(),
            Config::low_latency(),
            Config::noisy_link(),
        ] {
            assert!(config.validate().is_ok());
        }
        assert_eq!(Config::noisy_link().link.framing, FramingMode::Resync);
    }

    #[test]
    fn test_invalid_step() {
        assert!(ExtractorConfig::new(256, 0).validate().is_err());
        assert!(ExtractorConfig::new(256, 257).validate().is_err());
        assert!(ExtractorConfig::new(256, 256).validate().is_ok());
        assert!(ExtractorConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_invalid_band_table() {
        let bands = BandTable::canonical().with_range(Band::Alpha, FrequencyRange::new(13.0, 8.0));
        let config = ExtractorConfig::default().with_bands(bands);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
