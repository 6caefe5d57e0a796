//! 합성 샘플 소스
//!
//! 헤드셋 없이 파이프라인을 돌리기 위한 4채널 신호 생성기.
//! 대역마다 사인 성분 하나씩 + 시드 고정 노이즈

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sample::Sample;
use crate::CHANNEL_COUNT;

/// (주파수 Hz, 진폭 µV)
const DEFAULT_COMPONENTS: [(f64, f64); 4] = [
    (2.0, 6.0),   // delta
    (6.0, 4.0),   // theta
    (10.0, 10.0), // alpha
    (20.0, 3.0),  // beta
];

/// 합성 EEG 소스
pub struct SyntheticSource {
    sample_rate: f64,
    components: Vec<(f64, f64)>,
    noise_amplitude: f64,
    rng: StdRng,
    index: u64,
}

impl SyntheticSource {
    /// 기본 성분으로 생성
    pub fn new(sample_rate: f64, seed: u64) -> Self {
        Self {
            sample_rate,
            components: DEFAULT_COMPONENTS.to_vec(),
            noise_amplitude: 1.0,
            rng: StdRng::seed_from_u64(seed),
            index: 0,
        }
    }

    /// 모든 채널이 0인 소스
    pub fn silent() -> Self {
        Self {
            sample_rate: 1.0,
            components: Vec::new(),
            noise_amplitude: 0.0,
            rng: StdRng::seed_from_u64(0),
            index: 0,
        }
    }

    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn next_sample(&mut self) -> Sample {
        let t = self.index as f64 / self.sample_rate;
        self.index += 1;

        let channels = std::array::from_fn::<f64, CHANNEL_COUNT, _>(|ch| {
            // 채널마다 위상 조금씩 다르게
            let phase = ch as f64 * PI / 8.0;
            self.components
                .iter()
                .map(|&(freq, amp)| amp * (2.0 * PI * freq * t + phase).sin())
                .sum::<f64>()
        });

        let mut sample = Sample::from(channels);
        if self.noise_amplitude > 0.0 {
            for value in sample.channels.iter_mut() {
                *value += self.rng.gen_range(-1.0..1.0) * self.noise_amplitude;
            }
        }
        sample
    }
}

impl Iterator for SyntheticSource {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::extractor::BandPowerExtractor;
    use crate::sample::SampleTable;

    #[test]
    fn test_seeded_source_is_deterministic() {
        let a: Vec<_> = SyntheticSource::new(256.0, 3).take(64).collect();
        let b: Vec<_> = SyntheticSource::new(256.0, 3).take(64).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_noise_ignores_seed() {
        let a: Vec<_> = SyntheticSource::new(256.0, 1).with_noise(0.0).take(64).collect();
        let b: Vec<_> = SyntheticSource::new(256.0, 2).with_noise(0.0).take(64).collect();
        assert_eq!(a, b);

        let noisy: Vec<_> = SyntheticSource::new(256.0, 2).take(64).collect();
        assert_ne!(a, noisy);
    }

    #[test]
    fn test_silent_source() {
        assert!(SyntheticSource::silent()
            .take(32)
            .all(|s| s == Sample::default()));
    }

    #[test]
    fn test_alpha_dominates_default_mix() {
        let table: SampleTable = SyntheticSource::new(256.0, 1).take(256).collect();
        let extractor = BandPowerExtractor::new(ExtractorConfig::default()).unwrap();

        let record = extractor.extract_all(&table)[0];
        assert!(record.alpha > record.delta);
        assert!(record.alpha > record.theta);
        assert!(record.alpha > record.beta);
    }
}
