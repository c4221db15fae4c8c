//! # sfshim
//!
//! 커널에 없는 `sendfile()`을 사용자 공간에서 구현
//!
//! ## 핵심 특징
//! - **동일한 호출 규약**: 인자 검증, errno 어휘, 바이트 계산이 네이티브와 같음
//! - **헤더/트레일러**: writev로 전송, 짧은 쓰기 이후 정확히 이어서 전송
//! - **본문 버퍼 복사**: read → send, 부분 전송/부하/EMSGSIZE 흡수
//! - **제한된 재시도**: 일시적 에러는 예산 안에서만 재시도
//! - **호출 단위 상태**: 호출 사이에 남는 상태 없음

pub mod config;
pub mod error;
pub mod fault;
pub mod io;
pub mod retry;
pub mod sender;
pub mod span;
pub mod spool;
pub mod stats;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, PartialError, Result};
pub use io::{SocketKind, SourceFile, SourceInfo, StreamSocket};
pub use retry::{NanoSleep, Pause, RetryBudget};
pub use sender::Sender;
pub use span::{HeaderTrailer, Span, SpanSet};
pub use spool::Spooler;
pub use stats::TransferStats;
pub use transfer::{sendfile, sendfile_fd, Transfer, TransferRequest};

/// 기본 본문 버퍼 크기 (바이트): 네트워크 패킷 하나에 들어가는 크기
pub const DEFAULT_CHUNK_SIZE: usize = 1500;

/// 기본 재시도 상한
pub const DEFAULT_RETRY_LIMIT: u32 = 20;

/// writev 한 번에 넘기는 기본 최대 슬라이스 수 (IOV_MAX)
pub const DEFAULT_MAX_IOV: usize = 1024;
