//! 패킷 코덱
//!
//! 대역 파워 레코드 하나를 12바이트 패킷으로 직렬화
//!
//! ```text
//! [0xAA][0x55][0x08][delta u16][theta u16][alpha u16][beta u16][crc8]
//!   0     1     2     3..5       5..7       7..9       9..11     11
//! ```
//!
//! - u16 필드는 little-endian
//! - CRC-8 (poly 0x07, init 0x00, 반사 없음)은 페이로드 8바이트에만 계산
//! - 헤더와 체크섬 바이트는 CRC 계산에서 제외

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_8_SMBUS};

use crate::record::BandPowerRecord;
use crate::{Error, Result, PACKET_SIZE, PAYLOAD_LEN, SYNC_BYTE_1, SYNC_BYTE_2};

/// 헤더 길이 (sync 2 + len 1)
pub const HEADER_LEN: usize = 3;

/// 페이로드 바이트 범위
const PAYLOAD_RANGE: std::ops::Range<usize> = HEADER_LEN..HEADER_LEN + PAYLOAD_LEN;

/// CRC-8/SMBUS: poly 0x07, init 0x00, refin/refout false, xorout 0x00
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// CRC-8 체크섬
pub fn crc8(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}

/// 레코드 값을 u16 필드로 변환
///
/// 0 방향으로 자른 뒤 2^16으로 wrap (음수 포함). 클램프하지 않으므로
/// 범위를 벗어나는 값은 호출자가 미리 스케일해야 함. NaN/무한대는 0
fn to_wire(value: f64) -> u16 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(65536.0) as u16
}

/// 레코드를 버퍼 끝에 패킷으로 추가
pub fn encode_into(record: &BandPowerRecord, buf: &mut BytesMut) {
    buf.reserve(PACKET_SIZE);
    buf.put_u8(SYNC_BYTE_1);
    buf.put_u8(SYNC_BYTE_2);
    buf.put_u8(PAYLOAD_LEN as u8);

    let payload_start = buf.len();
    for value in record.as_array() {
        buf.put_u16_le(to_wire(value));
    }

    let checksum = crc8(&buf[payload_start..]);
    buf.put_u8(checksum);
}

/// 레코드를 12바이트 패킷으로 직렬화
pub fn encode(record: &BandPowerRecord) -> Bytes {
    let mut buf = BytesMut::with_capacity(PACKET_SIZE);
    encode_into(record, &mut buf);
    buf.freeze()
}

/// 패킷에서 레코드 역직렬화
///
/// 길이/헤더/CRC 중 하나라도 맞지 않으면 에러. 부분 레코드는 반환하지 않음
pub fn decode(packet: &[u8]) -> Result<BandPowerRecord> {
    if packet.len() != PACKET_SIZE {
        return Err(Error::InvalidPacketLength {
            expected: PACKET_SIZE,
            got: packet.len(),
        });
    }

    if packet[0] != SYNC_BYTE_1 || packet[1] != SYNC_BYTE_2 || packet[2] != PAYLOAD_LEN as u8 {
        return Err(Error::InvalidHeader {
            sync: [packet[0], packet[1]],
            len: packet[2],
        });
    }

    let payload = &packet[PAYLOAD_RANGE];
    let expected = crc8(payload);
    let got = packet[PACKET_SIZE - 1];
    if expected != got {
        return Err(Error::ChecksumMismatch { expected, got });
    }

    let mut cursor = payload;
    let mut values = [0.0f64; 4];
    for value in values.iter_mut() {
        *value = f64::from(cursor.get_u16_le());
    }

    Ok(BandPowerRecord::from_array(values))
}

/// 패킷 검증만 수행
pub fn validate_packet(packet: &[u8]) -> bool {
    decode(packet).is_ok()
}

/// 첫 싱크 바이트 쌍 (0xAA 0x55) 위치
pub fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(2)
        .position(|pair| pair[0] == SYNC_BYTE_1 && pair[1] == SYNC_BYTE_2)
}
