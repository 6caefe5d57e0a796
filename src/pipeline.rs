//! 획득 → 추출 → 송신 파이프라인
//!
//! 샘플이 들어올 때마다 버퍼에 쌓고, 윈도우가 차면 대역 파워를 계산해 바로 전송한 뒤
//! 가장 오래된 step개 샘플을 버림. 전송 순서는 윈도우 시작 순서와 같음

use tracing::{debug, warn};

use crate::config::Config;
use crate::extractor::BandPowerExtractor;
use crate::link::Link;
use crate::record::BandPowerRecord;
use crate::sample::Sample;
use crate::stats::LinkStats;
use crate::transport::PacketSender;
use crate::Result;

/// 스트리밍 파이프라인
pub struct StreamPipeline<L> {
    extractor: BandPowerExtractor,
    sender: PacketSender<L>,
    buffer: Vec<Sample>,
    power_scale: f64,
    records_sent: u64,
}

impl<L: Link> StreamPipeline<L> {
    pub fn new(config: &Config, link: L) -> Result<Self> {
        config.validate()?;
        let extractor = BandPowerExtractor::new(config.extractor.clone())?;

        Ok(Self {
            buffer: Vec::with_capacity(config.extractor.window_size),
            extractor,
            sender: PacketSender::new(link),
            power_scale: config.power_scale,
            records_sent: 0,
        })
    }

    /// 샘플 하나 추가
    ///
    /// 윈도우가 완성되어 전송했다면 전송한 (스케일/양자화된) 레코드 반환
    pub fn push(&mut self, sample: Sample) -> Result<Option<BandPowerRecord>> {
        let window_size = self.extractor.config().window_size;
        let step_size = self.extractor.config().step_size;

        self.buffer.push(sample);
        if self.buffer.len() < window_size {
            return Ok(None);
        }

        let power = self.extractor.window_power(&self.buffer[..window_size]);
        self.buffer.drain(..step_size);

        let Some(record) = power else {
            warn!("윈도우 건너뜀: 유한하지 않은 파워");
            self.sender.stats_mut().windows_skipped += 1;
            return Ok(None);
        };

        let wire = record.scaled(self.power_scale).quantized();
        self.sender.send(&wire)?;
        self.records_sent += 1;

        debug!("윈도우 {} 전송: {}", self.records_sent, wire);
        Ok(Some(wire))
    }

    /// 샘플 스트림 처리, 전송한 레코드 수 반환
    pub fn push_all<I: IntoIterator<Item = Sample>>(&mut self, samples: I) -> Result<usize> {
        let mut sent = 0;
        for sample in samples {
            if self.push(sample)?.is_some() {
                sent += 1;
            }
        }
        Ok(sent)
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    /// 버퍼에 남은 샘플 수 (항상 window_size 미만)
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &LinkStats {
        self.sender.stats()
    }
}
