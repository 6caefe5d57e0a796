//! EEG 주파수 대역 정의
//!
//! - Delta: 0.5 ~ 4 Hz
//! - Theta: 4 ~ 8 Hz
//! - Alpha: 8 ~ 13 Hz
//! - Beta: 13 ~ 32 Hz
//!
//! 32 Hz 이상(Gamma)은 사용하지 않으므로 테이블에 없음

use std::fmt;

use serde::{Deserialize, Serialize};

/// 대역 종류 (레코드 필드 순서와 동일)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Band {
    Delta = 0,
    Theta = 1,
    Alpha = 2,
    Beta = 3,
}

impl Band {
    /// 필드 순서대로 전체 대역
    pub const ALL: [Band; 4] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta];

    /// 레코드/페이로드 내 인덱스
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
        }
    }

    /// 표준 대역 범위
    pub const fn canonical_range(self) -> FrequencyRange {
        match self {
            Band::Delta => FrequencyRange::new(0.5, 4.0),
            Band::Theta => FrequencyRange::new(4.0, 8.0),
            Band::Alpha => FrequencyRange::new(8.0, 13.0),
            Band::Beta => FrequencyRange::new(13.0, 32.0),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 반개구간 주파수 범위 [low, high)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyRange {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// low <= freq < high
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz < self.high_hz
    }

    pub fn is_well_formed(&self) -> bool {
        self.low_hz.is_finite() && self.high_hz.is_finite() && self.low_hz < self.high_hz
    }
}

/// 대역 → 주파수 범위 매핑
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
    ranges: [FrequencyRange; 4],
}

impl BandTable {
    /// 표준 EEG 대역 테이블
    pub fn canonical() -> Self {
        Self {
            ranges: Band::ALL.map(Band::canonical_range),
        }
    }

    /// 특정 대역의 범위를 교체
    pub fn with_range(mut self, band: Band, range: FrequencyRange) -> Self {
        self.ranges[band.index()] = range;
        self
    }

    pub fn range(&self, band: Band) -> FrequencyRange {
        self.ranges[band.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, FrequencyRange)> + '_ {
        Band::ALL.iter().map(move |&band| (band, self.ranges[band.index()]))
    }

    /// 주파수가 속한 대역 (없으면 None)
    pub fn classify(&self, freq_hz: f64) -> Option<Band> {
        self.iter()
            .find(|(_, range)| range.contains(freq_hz))
            .map(|(band, _)| band)
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_boundaries() {
        let table = BandTable::canonical();

        assert_eq!(table.classify(0.0), None);
        assert_eq!(table.classify(0.5), Some(Band::Delta));
        assert_eq!(table.classify(4.0), Some(Band::Theta));
        assert_eq!(table.classify(8.0), Some(Band::Alpha));
        assert_eq!(table.classify(12.999), Some(Band::Alpha));
        assert_eq!(table.classify(13.0), Some(Band::Beta));
        assert_eq!(table.classify(31.9), Some(Band::Beta));
        // Gamma 제외
        assert_eq!(table.classify(32.0), None);
        assert_eq!(table.classify(60.0), None);
    }

    #[test]
    fn test_with_range() {
        let table = BandTable::canonical().with_range(Band::Beta, FrequencyRange::new(13.0, 30.0));
        assert_eq!(table.classify(31.0), None);
        assert!(table.range(Band::Beta).is_well_formed());
        assert!(!FrequencyRange::new(5.0, 5.0).is_well_formed());
    }
}
