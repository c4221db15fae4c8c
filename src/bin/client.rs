//! sfshim 클라이언트 - 서버가 보낸 바이트를 그대로 받는 데모
//!
//! 연결이 닫힐 때까지 수신하고 총 바이트 수와 CRC32를 출력한다.
//!
//! 사용법:
//!   cargo run --release --bin sfshim-client -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin sfshim-client -- --server 127.0.0.1:9000 --output received.bin

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Instant;

use bytes::{BufMut, BytesMut};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// 클라이언트 설정
struct ClientConfig {
    server_addr: SocketAddr,
    output_path: Option<PathBuf>,
    /// 헤더 길이 (CRC 계산에서 제외)
    skip_header: usize,
    /// 트레일러 길이 (CRC 계산에서 제외)
    skip_trailer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            output_path: None,
            skip_header: 0,
            skip_trailer: 0,
        }
    }
}

fn parse_args() -> Result<ClientConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        let need = |name: &str| value.clone().ok_or(format!("{} 값 필요", name));

        match args[i].as_str() {
            "--server" | "-s" => {
                config.server_addr =
                    need("--server")?.parse().map_err(|_| "유효한 주소 필요")?;
                i += 1;
            }
            "--output" | "-o" => {
                config.output_path = Some(PathBuf::from(need("--output")?));
                i += 1;
            }
            "--skip-header" => {
                config.skip_header =
                    need("--skip-header")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--skip-trailer" => {
                config.skip_trailer =
                    need("--skip-trailer")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"sfshim Client - sfshim 서버 수신 데모

사용법:
  cargo run --release --bin sfshim-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>      서버 주소 (기본: 127.0.0.1:9000)
  -o, --output <PATH>      수신 데이터 저장 경로
      --skip-header <N>    CRC 계산에서 앞 N 바이트 제외
      --skip-trailer <N>   CRC 계산에서 뒤 N 바이트 제외
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => warn!("알 수 없는 옵션 무시: {}", other),
        }
        i += 1;
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args()?;

    info!("sfshim Client starting...");
    info!("Server address: {}", client_config.server_addr);

    let mut stream = TcpStream::connect(client_config.server_addr)?;
    let start = Instant::now();

    let mut received = BytesMut::with_capacity(64 * 1024);
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        received.put_slice(&buf[..n]);
    }

    let elapsed = start.elapsed();
    let data = received.freeze();

    let body_end = data.len().saturating_sub(client_config.skip_trailer);
    let body_start = client_config.skip_header.min(body_end);
    let crc = crc32fast::hash(&data[body_start..body_end]);

    info!(
        "수신 완료: {} bytes, {:.2}ms, {:.2} MB/s",
        data.len(),
        elapsed.as_secs_f64() * 1000.0,
        data.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1_000_000.0
    );
    info!("Body CRC32: {:08X}", crc);

    if let Some(path) = &client_config.output_path {
        std::fs::write(path, &data)?;
        info!("저장: {:?}", path);
    }

    Ok(())
}
