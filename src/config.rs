//! 전송 엔진 설정
//!
//! 모든 값은 호출 단위로 전달된다. 프로세스 전역 상수는 두지 않는다.

use std::time::Duration;

use crate::{Error, Result, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_IOV, DEFAULT_RETRY_LIMIT};

/// 재시도 사이 대기 시간: 1/60초
pub const DEFAULT_RETRY_QUANTUM: Duration = Duration::from_nanos(16_666_667);

/// 전송 엔진 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 파일 본문 읽기 버퍼 크기 (바이트)
    /// 정확성과는 무관한 튜닝 값
    pub chunk_size: usize,

    /// 일시적 에러 재시도 상한 (재시도 사이트당)
    /// 총 시도 횟수 = 1 + retry_limit
    pub retry_limit: u32,

    /// 재시도 사이 대기 시간
    pub retry_quantum: Duration,

    /// EMSGSIZE 이후 축소된 send 크기의 상한 (네트워크 패킷 크기)
    pub shrink_ceiling: usize,

    /// writev 한 번에 넘기는 최대 슬라이스 수
    pub max_iov: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_quantum: DEFAULT_RETRY_QUANTUM,
            shrink_ceiling: DEFAULT_CHUNK_SIZE,
            max_iov: DEFAULT_MAX_IOV,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.shrink_ceiling == 0 || self.max_iov == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// 대기 없는 설정 (테스트, 로컬 파이프용)
    pub fn no_delay() -> Self {
        Self {
            retry_quantum: Duration::ZERO,
            ..Self::default()
        }
    }

    /// 대용량 전송용 설정
    pub fn high_throughput() -> Self {
        Self {
            chunk_size: 64 * 1024,            // 64KB
            retry_limit: 40,
            retry_quantum: Duration::from_millis(5),
            shrink_ceiling: DEFAULT_CHUNK_SIZE,
            max_iov: DEFAULT_MAX_IOV,
        }
    }

    /// 저사양 기기용 설정
    pub fn low_spec() -> Self {
        Self {
            chunk_size: 512,
            retry_limit: 10,
            retry_quantum: Duration::from_millis(50),
            shrink_ceiling: 512,
            max_iov: 64,
        }
    }
}
