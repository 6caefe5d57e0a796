//! 바이트 링크 추상화
//!
//! 링크는 프레이밍을 모름. 몇 바이트를 읽을지는 전송 계층이 결정
//!
//! - `SerialLink`: UART (serialport)
//! - `IoLink`: 임의의 Read + Write 스트림 (예: TcpStream)
//! - `SharedLink`: 여러 스레드에서 읽기/쓰기를 직렬화하는 핸들
//! - `MockLink`: 테스트용

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::config::LinkConfig;
use crate::{Error, Result};

/// 바이트 단위 양방향 채널
pub trait Link: Send {
    /// 최대 buf.len() 바이트 읽기
    ///
    /// 타임아웃 동안 데이터가 없으면 Ok(0), 상대가 연결을 닫으면 ConnectionClosed
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// 전체 바이트 쓰기 (부분 성공 없음)
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// 타임아웃성 IO 에러를 0바이트 읽기로 변환
fn read_with_timeout<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(0)
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// UART 링크
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// 시리얼 포트 열기 (8N1, 흐름 제어 없음)
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()?;

        info!(
            "Opened serial port: {} at {} baud (timeout {} ms)",
            config.port, config.baud_rate, config.timeout_ms
        );

        Ok(Self { port })
    }

    /// 사용 가능한 포트 목록
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }
}

impl Link for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_with_timeout(&mut self.port, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        Write::write_all(&mut self.port, bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Write::flush(&mut self.port)?;
        Ok(())
    }
}

/// std 스트림 어댑터
pub struct IoLink<T> {
    inner: T,
}

impl<T: Read + Write + Send> IoLink<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Send> Link for IoLink<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        // 스트림의 Ok(0)은 타임아웃이 아니라 EOF
        match read_with_timeout(&mut self.inner, buf)? {
            0 if !buf.is_empty() => Err(Error::ConnectionClosed),
            n => Ok(n),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// 공유 링크 핸들
///
/// 링크 자체는 스레드 안전하지 않다고 가정. 각 read/write 호출은 잠금을 잡고 수행
pub struct SharedLink<L> {
    inner: Arc<Mutex<L>>,
}

impl<L: Link> SharedLink<L> {
    pub fn new(link: L) -> Self {
        Self {
            inner: Arc::new(Mutex::new(link)),
        }
    }
}

impl<L> Clone for SharedLink<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: Link> Link for SharedLink<L> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.lock().read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.lock().write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.lock().flush()
    }
}

/// 테스트용 링크
///
/// 클론은 같은 버퍼를 공유하므로 전송 계층에 넘긴 뒤에도 검사 가능
#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Default)]
struct MockLinkInner {
    read_buffer: VecDeque<u8>,
    /// read 호출당 최대 바이트 (짧은 읽기 재현)
    max_read: Option<usize>,
    /// 남은 바이트 소진 후 반환할 에러
    fail_reads: bool,
    fail_writes: bool,
    writes: Vec<Vec<u8>>,
    read_calls: usize,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 읽을 데이터 주입
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// read 호출당 반환 바이트 제한
    pub fn set_max_read(&self, max: usize) {
        self.inner.lock().max_read = Some(max);
    }

    /// 버퍼가 비면 0바이트 대신 IO 에러 반환
    pub fn fail_reads_when_empty(&self) {
        self.inner.lock().fail_reads = true;
    }

    pub fn fail_writes(&self) {
        self.inner.lock().fail_writes = true;
    }

    /// write_all 호출별 기록
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().writes.clone()
    }

    /// 쓰여진 전체 바이트
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().writes.concat()
    }

    pub fn read_calls(&self) -> usize {
        self.inner.lock().read_calls
    }

    pub fn pending_read(&self) -> usize {
        self.inner.lock().read_buffer.len()
    }
}

impl Link for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.read_calls += 1;

        if inner.read_buffer.is_empty() && inner.fail_reads {
            return Err(Error::LinkIo(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "mock link disconnected",
            )));
        }

        let limit = inner.max_read.unwrap_or(usize::MAX);
        let n = inner.read_buffer.len().min(buf.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(Error::LinkIo(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "mock link write failure",
            )));
        }
        inner.writes.push(bytes.to_vec());
        Ok(())
    }
}
