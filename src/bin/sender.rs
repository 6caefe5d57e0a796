//! BPS 송신기 - Band Power Stream
//!
//! 합성 4채널 EEG를 샘플링 레이트에 맞춰 생성하고, 윈도우마다 대역 파워를
//! 12바이트 패킷으로 시리얼(또는 TCP) 링크에 전송
//!
//! 사용법:
//!   cargo run --release --bin bps-sender -- [OPTIONS]
//!
//! 예시:
//!   # UART 전송
//!   cargo run --release --bin bps-sender -- --port /dev/ttyUSB0 --baud 115200
//!
//!   # TCP로 수신기에 연결, 윈도우 20개만 전송
//!   cargo run --release --bin bps-sender -- --tcp 127.0.0.1:9100 --count 20

use std::net::{SocketAddr, TcpStream};
use std::str::FromStr;

use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use band_stream::{Config, IoLink, Link, SerialLink, StreamPipeline, SyntheticSource};

/// 송신기 설정
struct SenderConfig {
    tcp_addr: Option<SocketAddr>,
    /// 전송할 윈도우 수 (0이면 무제한)
    count: u64,
    seed: u64,
    /// 합성 노이즈 진폭 (µV)
    noise: f64,
    /// 샘플링 레이트에 맞춰 생성할지 (false면 최대 속도)
    pace: bool,
    verbose: bool,
    config: Config,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            tcp_addr: None,
            count: 0,
            seed: 0,
            noise: 1.0,
            pace: true,
            verbose: false,
            config: Config::muse2(),
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

fn parse_args() -> SenderConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SenderConfig::default();

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
                config.tcp_addr = Some(parse_value(&args, i, "--tcp"));
                i += 1;
            }
            "--window" | "-w" => {
                let window: usize = parse_value(&args, i, "--window");
                let step = config.config.extractor.step_size.min(window);
                config.config.extractor.window_size = window;
                config.config.extractor.step_size = step;
                i += 1;
            }
            "--step" | "-s" => {
                config.config.extractor.step_size = parse_value(&args, i, "--step");
                i += 1;
            }
            "--rate" | "-r" => {
                config.config.extractor.sample_rate = parse_value(&args, i, "--rate");
                i += 1;
            }
            "--scale" => {
                config.config.power_scale = parse_value(&args, i, "--scale");
                i += 1;
            }
            "--count" | "-n" => {
                config.count = parse_value(&args, i, "--count");
                i += 1;
            }
            "--seed" => {
                config.seed = parse_value(&args, i, "--seed");
                i += 1;
            }
            "--noise" => {
                config.noise = parse_value(&args, i, "--noise");
                i += 1;
            }
            "--no-pace" => {
                config.pace = false;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--list-ports" => {
                for port in SerialLink::list_ports() {
                    println!("{}", port);
                }
                std::process::exit(0);
            }
            "--help" | "-h" => {
                println!(
                    r#"BPS Sender - Band Power Stream 송신기

합성 4채널 EEG → 슬라이딩 윈도우 대역 파워 → 12바이트 CRC-8 패킷

사용법:
  cargo run --release --bin bps-sender -- [OPTIONS]

옵션:
  -p, --port <PATH>       시리얼 포트 (기본: /dev/ttyUSB0)
  -b, --baud <RATE>       보레이트 (기본: 115200)
  -t, --tcp <ADDR>        시리얼 대신 TCP 연결
  -w, --window <N>        윈도우 크기 샘플 (기본: 256)
  -s, --step <N>          슬라이딩 간격 샘플 (기본: 128)
  -r, --rate <HZ>         샘플링 레이트 (기본: 256)
  --scale <FACTOR>        전송 전 파워 배율 (기본: 1.0)
  -n, --count <N>         전송할 윈도우 수, 0이면 무제한 (기본: 0)
  --seed <N>              합성 노이즈 시드 (기본: 0)
  --noise <AMP>           합성 노이즈 진폭 µV, 0이면 노이즈 없음 (기본: 1.0)
  --no-pace               샘플링 레이트 무시하고 최대 속도로 생성
  --list-ports            시리얼 포트 목록 출력
  -v, --verbose           디버그 로그
  -h, --help              이 도움말 출력

예시:
  cargo run --release --bin bps-sender -- -p /dev/ttyUSB0 -b 115200
  cargo run --release --bin bps-sender -- --tcp 127.0.0.1:9100 -n 20 --no-pace
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

fn open_link(sender_config: &SenderConfig) -> band_stream::Result<Box<dyn Link>> {
    match sender_config.tcp_addr {
        Some(addr) => {
            let stream = TcpStream::connect(addr)?;
            stream.set_nodelay(true)?;
            info!("Connected to {}", addr);
            Ok(Box::new(IoLink::new(stream)))
        }
        None => Ok(Box::new(SerialLink::open(&sender_config.config.link)?)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sender_config = parse_args();

    // 로깅 설정
    let level = if sender_config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = sender_config.config.clone();
    if let Err(e) = config.validate() {
        error!("설정 오류: {}", e);
        return Err(e.into());
    }

    info!("BPS Sender starting...");
    info!(
        "Window: {} samples, step: {}, rate: {} Hz",
        config.extractor.window_size, config.extractor.step_size, config.extractor.sample_rate
    );
    info!("Power scale: {}", config.power_scale);

    let link = match open_link(&sender_config) {
        Ok(link) => link,
        Err(e) => {
            error!("링크 열기 실패: {}", e);
            return Err(e.into());
        }
    };

    let mut pipeline = StreamPipeline::new(&config, link)?;

    // ─────────────────────────────────────────────────────────────────
    // 획득 태스크: 샘플링 레이트로 합성 샘플 생성
    // ─────────────────────────────────────────────────────────────────
    let (sample_tx, mut sample_rx) = mpsc::channel(4096);
    let sample_rate = config.extractor.sample_rate;
    let sample_period = config.extractor.sample_period();
    let seed = sender_config.seed;
    let noise = sender_config.noise;
    let pace = sender_config.pace;

    let acquisition = tokio::spawn(async move {
        let mut source = SyntheticSource::new(sample_rate, seed).with_noise(noise);
        let mut ticker = tokio::time::interval(sample_period);
        loop {
            if pace {
                ticker.tick().await;
            }
            let Some(sample) = source.next() else { break };
            if sample_tx.send(sample).await.is_err() {
                break;
            }
        }
    });

    // ─────────────────────────────────────────────────────────────────
    // 송신 루프: 블로킹 링크 IO는 별도 스레드에서
    // ─────────────────────────────────────────────────────────────────
    let count = sender_config.count;
    let mut send_task = tokio::task::spawn_blocking(move || {
        while let Some(sample) = sample_rx.blocking_recv() {
            if pipeline.push(sample)?.is_some() {
                let sent = pipeline.records_sent();
                if sent % 100 == 0 {
                    info!("{}", pipeline.stats().summary());
                }
                if count > 0 && sent >= count {
                    break;
                }
            }
        }
        Ok::<_, band_stream::Error>(pipeline.stats().clone())
    });

    let outcome = tokio::select! {
        result = &mut send_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping...");
            None
        }
    };

    acquisition.abort();

    // Ctrl-C: 채널이 닫히면 송신 루프도 종료됨
    let result = match outcome {
        Some(result) => result,
        None => send_task.await,
    }?;

    match result {
        Ok(stats) => {
            info!("Transmission finished");
            info!("{}", stats.summary());
            Ok(())
        }
        Err(e) => {
            error!("전송 실패: {}", e);
            Err(e.into())
        }
    }
}
