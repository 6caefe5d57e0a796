//! 대역 파워 레코드

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::band::Band;

/// 윈도우 하나의 대역별 파워
///
/// 정상 레코드는 네 필드 모두 유한하고 0 이상
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandPowerRecord {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl BandPowerRecord {
    pub const fn new(delta: f64, theta: f64, alpha: f64, beta: f64) -> Self {
        Self {
            delta,
            theta,
            alpha,
            beta,
        }
    }

    /// 필드 순서 (delta, theta, alpha, beta) 배열에서 생성
    pub const fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub const fn as_array(&self) -> [f64; 4] {
        [self.delta, self.theta, self.alpha, self.beta]
    }

    pub fn get(&self, band: Band) -> f64 {
        self.as_array()[band.index()]
    }

    /// 모든 필드가 유한하고 0 이상인지
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite() && *v >= 0.0)
    }

    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// 전체 대역에 배율 적용
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_array(self.as_array().map(|v| v * factor))
    }

    /// 반올림 후 u16 범위로 클램프 (코덱 전달 전 호출자 측 전처리)
    pub fn quantized(&self) -> Self {
        Self::from_array(
            self.as_array()
                .map(|v| if v.is_nan() { 0.0 } else { v.round().clamp(0.0, u16::MAX as f64) }),
        )
    }
}

impl fmt::Display for BandPowerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delta={:.3} theta={:.3} alpha={:.3} beta={:.3}",
            self.delta, self.theta, self.alpha, self.beta
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(BandPowerRecord::default().is_valid());
        assert!(BandPowerRecord::new(1.0, 2.0, 3.0, 4.0).is_valid());
        assert!(!BandPowerRecord::new(f64::NAN, 0.0, 0.0, 0.0).is_valid());
        assert!(!BandPowerRecord::new(0.0, f64::INFINITY, 0.0, 0.0).is_valid());
        assert!(!BandPowerRecord::new(0.0, 0.0, -1.0, 0.0).is_valid());
    }

    #[test]
    fn test_quantized_clamps() {
        let record = BandPowerRecord::new(41.4, 86.6, 70000.0, -3.0).quantized();
        assert_eq!(record, BandPowerRecord::new(41.0, 87.0, 65535.0, 0.0));
    }

    #[test]
    fn test_scaled_and_get() {
        let record = BandPowerRecord::new(1.0, 2.0, 3.0, 4.0).scaled(10.0);
        assert_eq!(record.get(Band::Alpha), 30.0);
        assert_eq!(record.total(), 100.0);
    }
}
