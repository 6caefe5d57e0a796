//! 4채널 샘플과 샘플 테이블

use serde::{Deserialize, Serialize};

use crate::{Error, Result, CHANNEL_COUNT};

/// 한 시점의 4채널 측정값
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub channels: [f64; CHANNEL_COUNT],
}

impl Sample {
    pub const fn new(ch1: f64, ch2: f64, ch3: f64, ch4: f64) -> Self {
        Self {
            channels: [ch1, ch2, ch3, ch4],
        }
    }

    /// 가변 길이 행에서 생성 (열 수가 4가 아니면 TypeInvalid)
    pub fn from_row(row: &[f64]) -> Result<Self> {
        let channels: [f64; CHANNEL_COUNT] = row.try_into().map_err(|_| {
            Error::type_invalid(format!(
                "{}열 테이블이 필요함, 행 길이 {}",
                CHANNEL_COUNT,
                row.len()
            ))
        })?;
        Ok(Self { channels })
    }
}

impl From<[f64; CHANNEL_COUNT]> for Sample {
    fn from(channels: [f64; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }
}

/// 검증된 4열 샘플 테이블 (도착 순서 유지)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    samples: Vec<Sample>,
}

impl SampleTable {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// 행 목록에서 생성
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let samples = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Sample::from_row(row.as_ref()).map_err(|e| match e {
                    Error::TypeInvalid { reason } => {
                        Error::type_invalid(format!("행 {}: {}", i, reason))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples })
    }

    /// 채널별 열 목록에서 생성
    pub fn from_columns<C: AsRef<[f64]>>(columns: &[C]) -> Result<Self> {
        if columns.len() != CHANNEL_COUNT {
            return Err(Error::type_invalid(format!(
                "{}개 채널 열이 필요함, {}개 입력",
                CHANNEL_COUNT,
                columns.len()
            )));
        }

        let len = columns[0].as_ref().len();
        if columns.iter().any(|c| c.as_ref().len() != len) {
            return Err(Error::type_invalid("채널 열 길이 불일치"));
        }

        let samples = (0..len)
            .map(|i| Sample {
                channels: std::array::from_fn(|ch| columns[ch].as_ref()[i]),
            })
            .collect();
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

impl From<Vec<Sample>> for SampleTable {
    fn from(samples: Vec<Sample>) -> Self {
        Self::new(samples)
    }
}

impl FromIterator<Sample> for SampleTable {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
