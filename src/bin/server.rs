//! sfshim 서버 - 파일을 TCP로 내보내는 데모
//!
//! 연결마다 헤더 → 파일 → 트레일러 순서로 `sendfile()` 한 번을 수행한다.
//!
//! 사용법:
//!   cargo run --release --bin sfshim-server -- [OPTIONS]
//!
//! 예시:
//!   # 파일 전체 전송
//!   cargo run --release --bin sfshim-server -- --bind 0.0.0.0:9000 --file data.bin
//!
//!   # 오프셋/길이 지정 + 헤더/트레일러
//!   cargo run --release --bin sfshim-server -- -f data.bin --offset 1024 --length 4096 \
//!       --header "BEGIN\n" --trailer "END\n"

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sfshim::{Config, HeaderTrailer, Span, Transfer, TransferRequest};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    file_path: Option<PathBuf>,
    offset: i64,
    length: i64,
    header: Option<String>,
    trailer: Option<String>,
    /// 연결 수 제한 (0 = 무제한)
    max_connections: usize,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            file_path: None,
            offset: 0,
            length: 0,
            header: None,
            trailer: None,
            max_connections: 0,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<ServerConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        let need = |name: &str| value.clone().ok_or(format!("{} 값 필요", name));

        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = need("--bind")?.parse().map_err(|_| "유효한 주소 필요")?;
                i += 1;
            }
            "--file" | "-f" => {
                config.file_path = Some(PathBuf::from(need("--file")?));
                i += 1;
            }
            "--offset" => {
                config.offset = need("--offset")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--length" | "-l" => {
                config.length = need("--length")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--header" => {
                config.header = Some(unescape(&need("--header")?));
                i += 1;
            }
            "--trailer" => {
                config.trailer = Some(unescape(&need("--trailer")?));
                i += 1;
            }
            "--connections" | "-n" => {
                config.max_connections =
                    need("--connections")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--chunk-size" => {
                config.config.chunk_size =
                    need("--chunk-size")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--retry-limit" => {
                config.config.retry_limit =
                    need("--retry-limit")?.parse().map_err(|_| "유효한 숫자 필요")?;
                i += 1;
            }
            "--preset" => {
                // 프리셋은 앞선 --chunk-size/--retry-limit를 덮어쓴다
                config.config = match need("--preset")?.as_str() {
                    "default" => Config::default(),
                    "high" => Config::high_throughput(),
                    "low" => Config::low_spec(),
                    other => return Err(format!("알 수 없는 프리셋: {}", other)),
                };
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"sfshim Server - 사용자 공간 sendfile() 데모 서버

연결마다 헤더 → 파일 → 트레일러를 한 번의 sendfile()로 전송

사용법:
  cargo run --release --bin sfshim-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        바인드 주소 (기본: 0.0.0.0:9000)
  -f, --file <PATH>        전송할 파일 경로 (필수)
      --offset <N>         파일 시작 위치 (기본: 0)
  -l, --length <N>         보낼 파일 바이트 수 (기본: 0 = 끝까지)
      --header <TEXT>      앞에 붙일 헤더 (\n, \r 이스케이프 지원)
      --trailer <TEXT>     뒤에 붙일 트레일러
  -n, --connections <N>    처리할 연결 수 (기본: 0 = 무제한)
      --chunk-size <SIZE>  본문 버퍼 크기 (기본: 1500)
      --retry-limit <N>    일시적 에러 재시도 상한 (기본: 20)
      --preset <NAME>      default | high | low
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

/// `\n`, `\r`, `\t` 이스케이프 처리
fn unescape(text: &str) -> String {
    text.replace("\\r", "\r").replace("\\n", "\n").replace("\\t", "\t")
}

/// 보낼 본문 구간의 CRC32 (클라이언트 결과와 비교용)
fn body_crc32(file: &mut File, offset: i64, length: i64) -> std::io::Result<u32> {
    let mut hasher = crc32fast::Hasher::new();
    file.seek(SeekFrom::Start(offset.max(0) as u64))?;

    let limit = if length > 0 { length as u64 } else { u64::MAX };
    let mut reader = file.take(limit);

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args()?;
    server_config.config.validate()?;

    let path = server_config
        .file_path
        .clone()
        .ok_or("--file 옵션이 필요합니다")?;

    info!("sfshim Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("File: {:?}", path);
    info!("Offset: {}, Length: {}", server_config.offset, server_config.length);
    info!("Chunk size: {} bytes", server_config.config.chunk_size);
    info!("Retry limit: {}", server_config.config.retry_limit);

    let mut file = File::open(&path)?;
    let crc = body_crc32(&mut file, server_config.offset, server_config.length)?;
    info!("Body CRC32: {:08X}", crc);

    let header = server_config.header.clone().unwrap_or_default();
    let trailer = server_config.trailer.clone().unwrap_or_default();
    let headers: Vec<Span<'_>> = [header.as_bytes()]
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(Span::new)
        .collect();
    let trailers: Vec<Span<'_>> = [trailer.as_bytes()]
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(Span::new)
        .collect();
    let request = TransferRequest::new(server_config.offset, server_config.length)
        .with_hdtr(HeaderTrailer::new(&headers, &trailers));

    let listener = TcpListener::bind(server_config.bind_addr)?;
    info!("Server listening on {}", server_config.bind_addr);

    let mut transfer = Transfer::new(server_config.config.clone());
    let mut served = 0usize;

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("accept 에러: {}", e);
                continue;
            }
        };
        let peer = stream.peer_addr()?;
        info!("클라이언트 연결: {}", peer);

        match transfer.run(&mut file, &mut stream, &request) {
            Ok(stats) => info!("{} 전송 완료 | {}", peer, stats.summary()),
            Err(e) => warn!("{} 전송 실패: {}", peer, e),
        }

        served += 1;
        if server_config.max_connections != 0 && served >= server_config.max_connections {
            break;
        }
    }

    info!("Server stopped after {} connection(s)", served);
    Ok(())
}
