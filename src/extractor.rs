//! 대역 파워 추출기
//!
//! 샘플 버퍼를 슬라이딩 윈도우로 나누고 윈도우마다 4개 대역 파워를 계산
//!
//! 윈도우 처리 순서:
//! 1. 시작 인덱스에서 W개 샘플 추출
//! 2. 채널별 FFT, 계수를 W로 정규화
//! 3. 주파수 축: f_k = k * sample_rate / W (양의 주파수 절반만)
//! 4. 대역에 속한 bin의 |X_k / W|^2 를 bin과 채널에 걸쳐 합산

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, warn};

use crate::band::Band;
use crate::config::ExtractorConfig;
use crate::record::BandPowerRecord;
use crate::sample::{Sample, SampleTable};
use crate::{Result, CHANNEL_COUNT};

/// 대역 파워 추출기
///
/// 가변 상태가 없으므로 여러 스레드에서 동시에 사용 가능
pub struct BandPowerExtractor {
    config: ExtractorConfig,
    fft: Arc<dyn Fft<f64>>,
    /// 대역별 bin 인덱스 (Band::index 순서)
    band_bins: [Vec<usize>; 4],
}

impl std::fmt::Debug for BandPowerExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandPowerExtractor")
            .field("config", &self.config)
            .field("band_bins", &self.band_bins)
            .finish()
    }
}

impl BandPowerExtractor {
    /// 새 추출기 생성 (FFT 계획은 한 번만 수립)
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;

        let fft = FftPlanner::new().plan_fft_forward(config.window_size);
        let freqs = positive_frequencies(config.window_size, config.sample_rate);
        let band_bins = Band::ALL.map(|band| {
            let range = config.bands.range(band);
            freqs
                .iter()
                .enumerate()
                .filter(|&(_, &f)| range.contains(f))
                .map(|(k, _)| k)
                .collect::<Vec<_>>()
        });

        debug!(
            "추출기 생성: window={}, step={}, rate={} Hz, bins={:?}",
            config.window_size,
            config.step_size,
            config.sample_rate,
            band_bins.iter().map(Vec::len).collect::<Vec<_>>()
        );

        Ok(Self {
            config,
            fft,
            band_bins,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// 대역에 선택된 bin 인덱스
    pub fn bins(&self, band: Band) -> &[usize] {
        &self.band_bins[band.index()]
    }

    /// 버퍼 길이에 대한 윈도우 수
    pub fn window_count(&self, len: usize) -> usize {
        let w = self.config.window_size;
        if len < w {
            0
        } else {
            (len - w) / self.config.step_size + 1
        }
    }

    /// 윈도우 하나의 대역 파워
    ///
    /// 길이가 window_size가 아니거나 결과가 유한하지 않으면 None
    pub fn window_power(&self, window: &[Sample]) -> Option<BandPowerRecord> {
        let w = self.config.window_size;
        if window.len() != w {
            return None;
        }

        let mut powers = [0.0f64; 4];
        let mut buffer = vec![Complex::new(0.0, 0.0); w];
        let norm = w as f64;

        for ch in 0..CHANNEL_COUNT {
            for (slot, sample) in buffer.iter_mut().zip(window) {
                *slot = Complex::new(sample.channels[ch], 0.0);
            }
            self.fft.process(&mut buffer);

            for (band_power, bins) in powers.iter_mut().zip(&self.band_bins) {
                *band_power += bins
                    .iter()
                    .map(|&k| (buffer[k] / norm).norm_sqr())
                    .sum::<f64>();
            }
        }

        let record = BandPowerRecord::from_array(powers);
        record.is_valid().then_some(record)
    }

    /// 슬라이스 위의 지연 윈도우 이터레이터
    ///
    /// 샘플이 window_size보다 적으면 빈 이터레이터
    pub fn windows<'a>(&'a self, samples: &'a [Sample]) -> BandPowers<'a> {
        BandPowers {
            extractor: self,
            samples,
            next_start: 0,
        }
    }

    /// 테이블 전체 처리
    pub fn extract_all(&self, table: &SampleTable) -> Vec<BandPowerRecord> {
        self.windows(table.as_slice()).collect()
    }

    /// 테이블 전체 병렬 처리 (결과는 윈도우 순서 유지)
    pub fn extract_all_par(&self, table: &SampleTable) -> Vec<BandPowerRecord> {
        let samples = table.as_slice();
        let w = self.config.window_size;
        let s = self.config.step_size;

        (0..self.window_count(samples.len()))
            .into_par_iter()
            .filter_map(|i| {
                let start = i * s;
                self.window_power(&samples[start..start + w])
            })
            .collect()
    }
}

/// 윈도우별 대역 파워 이터레이터
pub struct BandPowers<'a> {
    extractor: &'a BandPowerExtractor,
    samples: &'a [Sample],
    next_start: usize,
}

impl Iterator for BandPowers<'_> {
    type Item = BandPowerRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let w = self.extractor.config.window_size;
        let s = self.extractor.config.step_size;

        loop {
            let start = self.next_start;
            if start + w > self.samples.len() {
                return None;
            }
            self.next_start += s;

            match self.extractor.window_power(&self.samples[start..start + w]) {
                Some(record) => return Some(record),
                None => warn!("윈도우 {} 건너뜀: 유한하지 않은 파워", start),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .extractor
            .window_count(self.samples.len().saturating_sub(self.next_start));
        (0, Some(remaining))
    }
}

/// 설정으로 추출기를 만들어 테이블 전체 처리
pub fn extract_band_powers(
    table: &SampleTable,
    config: &ExtractorConfig,
) -> Result<Vec<BandPowerRecord>> {
    let extractor = BandPowerExtractor::new(config.clone())?;
    Ok(extractor.extract_all(table))
}

/// 행 목록을 바로 처리 (4열이 아니면 TypeInvalid)
pub fn extract_from_rows<R: AsRef<[f64]>>(
    rows: &[R],
    config: &ExtractorConfig,
) -> Result<Vec<BandPowerRecord>> {
    let table = SampleTable::from_rows(rows)?;
    extract_band_powers(&table, config)
}

/// 길이 n 신호의 음이 아닌 주파수 축 (DFT bin 0..ceil(n/2))
fn positive_frequencies(n: usize, sample_rate: f64) -> Vec<f64> {
    let resolution = sample_rate / n as f64;
    (0..(n + 1) / 2).map(|k| k as f64 * resolution).collect()
}
