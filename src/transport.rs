//! 패킷 송수신 루프
//!
//! - 송신: 레코드마다 인코딩 후 즉시 쓰기 (배칭 없음, 쓰기 실패는 치명적)
//! - 수신: 예상 패킷 수만큼 읽고 검증. 잘못된 패킷은 버리고 계속 진행
//!
//! 수신 상태 머신:
//!
//! ```text
//! AwaitingPacket ──(12바이트)──▶ Validating ──(다음 패킷)──▶ AwaitingPacket
//!        │
//!        └──(N개 처리 또는 링크 에러)──▶ Done
//! ```

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::{self, find_sync};
use crate::config::FramingMode;
use crate::link::Link;
use crate::record::BandPowerRecord;
use crate::stats::LinkStats;
use crate::{Error, Result, PACKET_SIZE, SYNC_BYTE_1};

/// 송신자
pub struct PacketSender<L> {
    link: L,
    buf: BytesMut,
    stats: LinkStats,
}

impl<L: Link> PacketSender<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            buf: BytesMut::with_capacity(PACKET_SIZE),
            stats: LinkStats::new(),
        }
    }

    /// 레코드 하나 전송 (패킷당 write 한 번)
    pub fn send(&mut self, record: &BandPowerRecord) -> Result<()> {
        self.buf.clear();
        codec::encode_into(record, &mut self.buf);

        self.link.write_all(&self.buf)?;
        self.link.flush()?;

        self.stats.record_sent(self.buf.len());
        Ok(())
    }

    /// 순서대로 전송. 첫 쓰기 실패에서 중단
    pub fn send_all<'a, I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a BandPowerRecord>,
    {
        let mut sent = 0;
        for record in records {
            self.send(record)?;
            sent += 1;
        }
        Ok(sent)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut LinkStats {
        &mut self.stats
    }
}

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    AwaitingPacket,
    Validating,
    Done,
}

/// 수신 배치 결과
///
/// 링크 에러가 나도 그 전까지 받은 레코드는 유지
#[derive(Debug, Default)]
pub struct ReceiveBatch {
    /// 유효 레코드 (수신 순서)
    pub records: Vec<BandPowerRecord>,

    /// 버린 패킷 수
    pub dropped: usize,

    /// 배치를 중단시킨 링크 에러
    pub error: Option<Error>,
}

impl ReceiveBatch {
    /// 링크 에러 없이 끝났는지
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// 링크 에러가 있으면 Err, 부분 결과는 버림
    pub fn into_result(self) -> Result<Vec<BandPowerRecord>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.records),
        }
    }
}

/// 수신자
pub struct PacketReceiver<L> {
    link: L,
    framing: FramingMode,
    state: ReceiveState,
    /// Resync 모드에서 아직 소비하지 않은 바이트
    pending: Vec<u8>,
    /// 마지막 프레임 이후 슬롯으로 집계되지 않은 버린 바이트
    unframed: usize,
    /// 버린 패킷의 나머지 중 아직 버리지 않은 바이트 (이미 슬롯으로 집계됨)
    covered: usize,
    stats: LinkStats,
}

impl<L: Link> PacketReceiver<L> {
    pub fn new(link: L) -> Self {
        Self::with_framing(link, FramingMode::Fixed)
    }

    pub fn with_framing(link: L, framing: FramingMode) -> Self {
        Self {
            link,
            framing,
            state: ReceiveState::Done,
            pending: Vec::with_capacity(PACKET_SIZE * 2),
            unframed: 0,
            covered: 0,
            stats: LinkStats::new(),
        }
    }

    /// 패킷 expected개 수신
    ///
    /// expected == 0이면 링크를 건드리지 않고 빈 배치 반환
    pub fn receive(&mut self, expected: usize) -> ReceiveBatch {
        let mut batch = ReceiveBatch::default();

        for slot in 0..expected {
            self.state = ReceiveState::AwaitingPacket;

            match self.receive_one() {
                Ok(Some(record)) => batch.records.push(record),
                Ok(None) => batch.dropped += 1,
                Err(e) => {
                    warn!("수신 중단 ({}/{}): {}", slot, expected, e);
                    batch.error = Some(e);
                    break;
                }
            }
        }

        self.state = ReceiveState::Done;
        debug!(
            "배치 수신: {} 유효, {} 버림, expected={}",
            batch.records.len(),
            batch.dropped,
            expected
        );
        batch
    }

    /// 패킷 하나 수신. 잘못된 패킷이면 Ok(None)
    pub fn receive_one(&mut self) -> Result<Option<BandPowerRecord>> {
        match self.framing {
            FramingMode::Fixed => self.receive_fixed(),
            FramingMode::Resync => self.receive_resync(),
        }
    }

    fn receive_fixed(&mut self) -> Result<Option<BandPowerRecord>> {
        let mut frame = [0u8; PACKET_SIZE];
        let mut filled = 0;

        while filled < PACKET_SIZE {
            let n = self.link.read(&mut frame[filled..])?;
            if n == 0 {
                return Err(Error::LinkTimeout {
                    wanted: PACKET_SIZE,
                    got: filled,
                });
            }
            filled += n;
            self.stats.bytes_received += n as u64;
        }

        self.state = ReceiveState::Validating;
        match codec::decode(&frame) {
            Ok(record) => {
                self.stats.packets_received += 1;
                Ok(Some(record))
            }
            Err(e) if e.is_packet_invalid() => {
                warn!("패킷 버림: {}", e);
                self.stats.record_dropped(&e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resync 수신
    ///
    /// 헤더가 깨진 패킷은 싱크 탐색 중에 바이트 단위로 버려지므로, 버린 바이트가
    /// 패킷 하나 분량이 될 때마다 슬롯 하나를 버린 패킷으로 집계. Fixed 모드와
    /// 같은 스트림에서 같은 dropped 수가 나옴
    fn receive_resync(&mut self) -> Result<Option<BandPowerRecord>> {
        loop {
            self.align_to_sync();
            if self.unframed >= PACKET_SIZE {
                self.unframed -= PACKET_SIZE;
                self.stats.framing_failures += 1;
                warn!("패킷 버림: 싱크 없는 {} 바이트", PACKET_SIZE);
                return Ok(None);
            }

            if self.pending.len() < PACKET_SIZE {
                self.fill_pending()?;
                continue;
            }

            self.state = ReceiveState::Validating;
            match codec::decode(&self.pending[..PACKET_SIZE]) {
                Ok(record) => {
                    self.pending.drain(..PACKET_SIZE);
                    self.unframed = 0;
                    self.covered = 0;
                    self.stats.packets_received += 1;
                    return Ok(Some(record));
                }
                Err(e @ Error::InvalidHeader { .. }) => {
                    // 가짜 싱크이거나 길이 바이트가 깨진 패킷. 한 바이트 밀고 다시 탐색
                    debug!("싱크 건너뜀: {}", e);
                    self.pending.drain(..1);
                    self.stats.resync_bytes_discarded += 1;
                    self.note_discarded(1);
                    self.state = ReceiveState::AwaitingPacket;
                }
                Err(e) if e.is_packet_invalid() => {
                    // 길이 바이트를 믿지 않고 첫 싱크 바이트만 넘김
                    warn!("패킷 버림: {}", e);
                    self.pending.drain(..1);
                    self.unframed = 0;
                    self.covered = PACKET_SIZE - 1;
                    self.stats.record_dropped(&e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 싱크 바이트 앞의 쓰레기 바이트 제거
    fn align_to_sync(&mut self) {
        let discard = match find_sync(&self.pending) {
            Some(pos) => pos,
            None if self.pending.last() == Some(&SYNC_BYTE_1) => self.pending.len() - 1,
            None => self.pending.len(),
        };

        if discard > 0 {
            debug!("재동기화: {} 바이트 버림", discard);
            self.pending.drain(..discard);
            self.stats.resync_bytes_discarded += discard as u64;
            self.note_discarded(discard);
        }
    }

    /// 버린 바이트 집계. 이미 버린 패킷의 나머지는 다시 세지 않음
    fn note_discarded(&mut self, n: usize) {
        let covered = n.min(self.covered);
        self.covered -= covered;
        self.unframed += n - covered;
    }

    /// 패킷 하나를 채울 만큼만 읽기
    fn fill_pending(&mut self) -> Result<()> {
        let want = PACKET_SIZE.saturating_sub(self.pending.len()).max(1);
        let mut temp = [0u8; PACKET_SIZE];

        let n = self.link.read(&mut temp[..want])?;
        if n == 0 {
            return Err(Error::LinkTimeout {
                wanted: PACKET_SIZE,
                got: self.pending.len(),
            });
        }

        self.pending.extend_from_slice(&temp[..n]);
        self.stats.bytes_received += n as u64;
        Ok(())
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn framing(&self) -> FramingMode {
        self.framing
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::link::{IoLink, MockLink};

    fn records() -> Vec<BandPowerRecord> {
        vec![
            BandPowerRecord::new(41.0, 86.0, 31.0, 12.0),
            BandPowerRecord::new(100.0, 200.0, 300.0, 400.0),
            BandPowerRecord::new(1.0, 2.0, 3.0, 4.0),
            BandPowerRecord::new(5.0, 6.0, 7.0, 8.0),
            BandPowerRecord::new(9.0, 10.0, 11.0, 12.0),
        ]
    }

    #[test]
    fn test_send_one_write_per_record() {
        let link = MockLink::new();
        let mut sender = PacketSender::new(link.clone());

        let sent = sender.send_all(&records()).unwrap();

        assert_eq!(sent, 5);
        let writes = link.writes();
        assert_eq!(writes.len(), 5);
        for (write, record) in writes.iter().zip(records()) {
            assert_eq!(write.as_slice(), encode(&record).as_ref());
        }
        assert_eq!(sender.stats().packets_sent, 5);
        assert_eq!(sender.stats().bytes_sent, 60);
    }

    #[test]
    fn test_send_failure_is_fatal() {
        let link = MockLink::new();
        link.fail_writes();
        let mut sender = PacketSender::new(link.clone());

        let err = sender.send_all(&records()).unwrap_err();
        assert!(matches!(err, Error::LinkIo(_)));
        assert_eq!(sender.stats().packets_sent, 0);
    }

    #[test]
    fn test_receive_zero_touches_nothing() {
        let link = MockLink::new();
        link.inject_read(&encode(&records()[0]));
        let mut receiver = PacketReceiver::new(link.clone());

        let batch = receiver.receive(0);

        assert!(batch.records.is_empty());
        assert!(batch.is_complete());
        assert_eq!(link.read_calls(), 0);
        assert_eq!(link.pending_read(), 12);
        assert_eq!(receiver.state(), ReceiveState::Done);
    }

    #[test]
    fn test_receive_drops_corrupted_and_keeps_order() {
        let link = MockLink::new();
        for (i, record) in records().iter().enumerate() {
            let mut packet = encode(record).to_vec();
            if i == 1 || i == 3 {
                packet[11] ^= 0xFF;
            }
            link.inject_read(&packet);
        }
        let mut receiver = PacketReceiver::new(link);

        let batch = receiver.receive(5);

        let all = records();
        assert_eq!(batch.records, vec![all[0], all[2], all[4]]);
        assert_eq!(batch.dropped, 2);
        assert!(batch.is_complete());
        assert_eq!(receiver.stats().checksum_failures, 2);
        assert_eq!(receiver.stats().packets_received, 3);
    }

    #[test]
    fn test_receive_handles_short_reads() {
        let link = MockLink::new();
        link.set_max_read(5);
        for record in records() {
            link.inject_read(&encode(&record));
        }
        let mut receiver = PacketReceiver::new(link);

        let records_out = receiver.receive(5).into_result().unwrap();
        assert_eq!(records_out, records());
    }

    #[test]
    fn test_timeout_keeps_partial_records() {
        let link = MockLink::new();
        link.inject_read(&encode(&records()[0]));
        link.inject_read(&encode(&records()[1])[..7]);
        let mut receiver = PacketReceiver::new(link);

        let batch = receiver.receive(3);

        assert_eq!(batch.records, vec![records()[0]]);
        assert!(matches!(
            batch.error,
            Some(Error::LinkTimeout { wanted: 12, got: 7 })
        ));
        assert!(batch.into_result().is_err());
    }

    #[test]
    fn test_link_error_is_propagated() {
        let link = MockLink::new();
        link.inject_read(&encode(&records()[0]));
        link.fail_reads_when_empty();
        let mut receiver = PacketReceiver::new(link);

        let batch = receiver.receive(2);
        assert_eq!(batch.records.len(), 1);
        assert!(matches!(batch.error, Some(Error::LinkIo(_))));
        assert_eq!(receiver.state(), ReceiveState::Done);
    }

    /// 앞쪽 쓰레기 2바이트 + 두 번째 패킷의 페이로드 1바이트 유실
    fn misaligned_stream(with_garbage: bool) -> Vec<u8> {
        let mut stream = Vec::new();
        if with_garbage {
            stream.extend_from_slice(&[0x00, 0x13]);
        }
        for (i, record) in records().iter().enumerate() {
            let mut packet = encode(record).to_vec();
            if i == 1 {
                packet.remove(5);
            }
            stream.extend_from_slice(&packet);
        }
        stream
    }

    #[test]
    fn test_fixed_framing_loses_alignment() {
        let link = MockLink::new();
        link.inject_read(&misaligned_stream(false));
        let mut receiver = PacketReceiver::new(link);

        let batch = receiver.receive(5);

        assert_eq!(batch.records, vec![records()[0]]);
        assert_eq!(batch.dropped, 3);
        assert!(matches!(
            batch.error,
            Some(Error::LinkTimeout { wanted: 12, got: 11 })
        ));
    }

    #[test]
    fn test_resync_framing_recovers() {
        let link = MockLink::new();
        link.inject_read(&misaligned_stream(true));
        let mut receiver = PacketReceiver::with_framing(link, FramingMode::Resync);

        let batch = receiver.receive(5);

        let all = records();
        assert_eq!(batch.records, vec![all[0], all[2], all[3], all[4]]);
        assert_eq!(batch.dropped, 1);
        assert!(batch.is_complete());
        assert!(receiver.stats().resync_bytes_discarded >= 12);
    }

    fn stream_with_corrupted_byte(packet: usize, byte: usize, value: u8) -> Vec<u8> {
        let mut stream = Vec::new();
        for (i, record) in records().iter().enumerate() {
            let mut bytes = encode(record).to_vec();
            if i == packet {
                bytes[byte] = value;
            }
            stream.extend_from_slice(&bytes);
        }
        stream
    }

    #[test]
    fn test_resync_counts_corrupted_header_as_dropped() {
        let all = records();
        // (패킷, 바이트, 값, 남는 레코드)
        let cases = [
            (1, 0, 0x00, vec![all[0], all[2], all[3], all[4]]),
            (1, 1, 0x00, vec![all[0], all[2], all[3], all[4]]),
            (3, 2, 0x10, vec![all[0], all[1], all[2], all[4]]),
        ];

        for (packet, byte, value, expected) in cases {
            let stream = stream_with_corrupted_byte(packet, byte, value);

            for framing in [FramingMode::Fixed, FramingMode::Resync] {
                let link = MockLink::new();
                link.inject_read(&stream);
                let mut receiver = PacketReceiver::with_framing(link, framing);

                let batch = receiver.receive(5);
                assert_eq!(batch.records, expected, "{:?} packet {}", framing, packet);
                assert_eq!(batch.dropped, 1, "{:?} packet {}", framing, packet);
                assert!(batch.is_complete(), "{:?}: {:?}", framing, batch.error);
                assert_eq!(receiver.stats().framing_failures, 1);
            }
        }
    }

    #[test]
    fn test_resync_corrupted_header_with_short_reads() {
        let link = MockLink::new();
        link.set_max_read(3);
        link.inject_read(&stream_with_corrupted_byte(2, 0, 0x00));
        let mut receiver = PacketReceiver::with_framing(link, FramingMode::Resync);

        let all = records();
        let records_out = receiver.receive(5);
        assert_eq!(records_out.records, vec![all[0], all[1], all[3], all[4]]);
        assert_eq!(records_out.dropped, 1);
        assert_eq!(receiver.stats().resync_bytes_discarded, 12);
        assert!(records_out.into_result().is_ok());
    }

    #[test]
    fn test_closed_stream_is_connection_closed() {
        let mut packet = encode(&records()[0]).to_vec();
        packet.extend_from_slice(&[0xAA, 0x55]);
        let link = IoLink::new(std::io::Cursor::new(packet));

        for framing in [FramingMode::Fixed, FramingMode::Resync] {
            let mut receiver = PacketReceiver::with_framing(
                IoLink::new(std::io::Cursor::new(Vec::<u8>::new())),
                framing,
            );
            for _ in 0..3 {
                let batch = receiver.receive(1);
                assert!(matches!(batch.error, Some(Error::ConnectionClosed)));
            }
        }

        let mut receiver = PacketReceiver::new(link);
        let batch = receiver.receive(3);
        assert_eq!(batch.records, vec![records()[0]]);
        assert!(matches!(batch.error, Some(Error::ConnectionClosed)));
    }

    #[test]
    fn test_resync_aligned_stream_matches_fixed() {
        let link = MockLink::new();
        link.set_max_read(3);
        for record in records() {
            link.inject_read(&encode(&record));
        }
        let mut receiver = PacketReceiver::with_framing(link, FramingMode::Resync);

        assert_eq!(receiver.receive(5).into_result().unwrap(), records());
        assert_eq!(receiver.stats().resync_bytes_discarded, 0);
    }
}
