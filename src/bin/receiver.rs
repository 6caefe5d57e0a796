//! BPS 수신기 - Band Power Stream
//!
//! 시리얼(또는 TCP) 링크에서 12바이트 패킷을 받아 검증하고 대역 파워 출력
//! - CRC/헤더가 깨진 패킷은 버리고 계속 수신
//! - --resync: 바이트 유실 링크에서 싱크 바이트로 재정렬
//!
//! 사용법:
//!   cargo run --release --bin bps-receiver -- [OPTIONS]
//!
//! 예시:
//!   # UART에서 10개 수신
//!   cargo run --release --bin bps-receiver -- --port /dev/ttyUSB0 --count 10
//!
//!   # TCP로 송신기를 기다리고 계속 수신, JSON 출력
//!   cargo run --release --bin bps-receiver -- --tcp-listen 0.0.0.0:9100 --follow --json

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use band_stream::{
    Config, Error, FramingMode, IoLink, Link, LinkStats, PacketReceiver, SerialLink,
};

/// 수신기 설정
struct ReceiverConfig {
    tcp_connect: Option<SocketAddr>,
    tcp_listen: Option<SocketAddr>,
    /// 배치당 패킷 수
    count: usize,
    /// 타임아웃 후에도 계속 수신
    follow: bool,
    json: bool,
    verbose: bool,
    config: Config,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            tcp_connect: None,
            tcp_listen: None,
            count: 10,
            follow: false,
            json: false,
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_value<T: FromStr>(args: &[String], i: usize, name: &str) -> T {
    match args.get(i + 1).map(|v| v.parse()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("{} 옵션에 유효한 값 필요", name);
            std::process::exit(2);
        }
    }
}

fn parse_args() -> ReceiverConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ReceiverConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                config.config.link.port = parse_value(&args, i, "--port");
                i += 1;
            }
            "--baud" | "-b" => {
                config.config.link.baud_rate = parse_value(&args, i, "--baud");
                i += 1;
            }
            "--tcp" | "-t" => {
                config.tcp_connect = Some(parse_value(&args, i, "--tcp"));
                i += 1;
            }
            "--tcp-listen" | "-l" => {
                config.tcp_listen = Some(parse_value(&args, i, "--tcp-listen"));
                i += 1;
            }
            "--timeout" => {
                config.config.link.timeout_ms = parse_value(&args, i, "--timeout");
                i += 1;
            }
            "--count" | "-n" => {
                config.count = parse_value(&args, i, "--count");
                i += 1;
            }
            "--follow" | "-f" => {
                config.follow = true;
            }
            "--resync" => {
                config.config.link.framing = FramingMode::Resync;
            }
            "--json" => {
                config.json = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"BPS Receiver - Band Power Stream 수신기

12바이트 CRC-8 패킷 → 검증 → 대역 파워 출력

사용법:
  cargo run --release --bin bps-receiver -- [OPTIONS]

옵션:
  -p, --port <PATH>       시리얼 포트 (기본: /dev/ttyUSB0)
  -b, --baud <RATE>       보레이트 (기본: 115200)
  -t, --tcp <ADDR>        시리얼 대신 TCP 연결
  -l, --tcp-listen <ADDR> TCP 연결 대기
  --timeout <MS>          읽기 타임아웃 (기본: 1000)
  -n, --count <N>         배치당 패킷 수 (기본: 10)
  -f, --follow            Ctrl-C까지 계속 수신
  --resync                싱크 바이트로 재정렬
  --json                  레코드를 JSON 한 줄씩 출력
  -v, --verbose           디버그 로그
  -h, --help              이 도움말 출력

예시:
  cargo run --release --bin bps-receiver -- -p /dev/ttyUSB0 -n 10
  cargo run --release --bin bps-receiver -- -l 0.0.0.0:9100 -f --json
"#
                );
                std::process::exit(0);
            }
            other => {
                warn!("알 수 없는 옵션 무시: {}", other);
            }
        }
        i += 1;
    }

    config
}

fn tcp_link(stream: TcpStream, timeout: Duration) -> band_stream::Result<Box<dyn Link>> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(Box::new(IoLink::new(stream)))
}

fn open_link(receiver_config: &ReceiverConfig) -> band_stream::Result<Box<dyn Link>> {
    let link_config = &receiver_config.config.link;
    let timeout = Duration::from_millis(link_config.timeout_ms);

    if let Some(addr) = receiver_config.tcp_listen {
        let listener = TcpListener::bind(addr)?;
        info!("Waiting for sender on {}", addr);
        let (stream, peer) = listener.accept()?;
        info!("Sender connected from {}", peer);
        return tcp_link(stream, timeout);
    }

    if let Some(addr) = receiver_config.tcp_connect {
        let stream = TcpStream::connect(addr)?;
        info!("Connected to {}", addr);
        return tcp_link(stream, timeout);
    }

    Ok(Box::new(SerialLink::open(link_config)?))
}

/// 수신 루프 (블로킹)
fn receive_loop(
    mut receiver: PacketReceiver<Box<dyn Link>>,
    count: usize,
    follow: bool,
    json: bool,
    running: Arc<AtomicBool>,
) -> band_stream::Result<LinkStats> {
    let mut index: u64 = 0;

    while running.load(Ordering::Relaxed) {
        let batch = receiver.receive(count);

        for record in &batch.records {
            if json {
                match serde_json::to_string(record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("JSON 변환 실패: {}", e),
                }
            } else {
                println!("#{:<6} {}", index, record);
            }
            index += 1;
        }

        if batch.dropped > 0 {
            debug!("배치에서 {} 패킷 버림", batch.dropped);
        }

        match batch.error {
            None if follow => {}
            None => break,
            Some(Error::LinkTimeout { .. }) if follow => {
                debug!("타임아웃, 계속 대기");
            }
            Some(e) => return Err(e),
        }
    }

    Ok(receiver.stats().clone())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let receiver_config = parse_args();

    // 로깅 설정 (레코드는 stdout, 로그는 stderr)
    let level = if receiver_config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = receiver_config.config.validate() {
        error!("설정 오류: {}", e);
        return Err(e.into());
    }

    info!("BPS Receiver starting...");
    info!(
        "Framing: {:?}, timeout: {} ms, batch: {}",
        receiver_config.config.link.framing,
        receiver_config.config.link.timeout_ms,
        receiver_config.count
    );

    let link = match open_link(&receiver_config) {
        Ok(link) => link,
        Err(e) => {
            error!("링크 열기 실패: {}", e);
            return Err(e.into());
        }
    };

    let receiver = PacketReceiver::with_framing(link, receiver_config.config.link.framing);
    let running = Arc::new(AtomicBool::new(true));

    let count = receiver_config.count;
    let follow = receiver_config.follow;
    let json = receiver_config.json;
    let running_clone = running.clone();
    let mut receive_task = tokio::task::spawn_blocking(move || {
        receive_loop(receiver, count, follow, json, running_clone)
    });

    // 읽기 타임아웃마다 플래그를 확인하므로 Ctrl-C 후 곧 종료됨
    let outcome = tokio::select! {
        result = &mut receive_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping...");
            running.store(false, Ordering::Relaxed);
            None
        }
    };

    let result = match outcome {
        Some(result) => result,
        None => receive_task.await,
    }?;

    match result {
        Ok(stats) => {
            info!("Reception finished");
            info!("{}", stats.summary());
            Ok(())
        }
        Err(e) => {
            error!("수신 실패: {}", e);
            Err(e.into())
        }
    }
}
