//! 전송 통계 (호출 단위)

use std::time::{Duration, Instant};

/// 한 번의 전송 호출에 대한 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전송된 헤더 바이트
    pub header_bytes: u64,

    /// 전송된 본문(파일) 바이트
    pub body_bytes: u64,

    /// 전송된 트레일러 바이트
    pub trailer_bytes: u64,

    /// 파일 read 호출 수
    pub read_calls: u64,

    /// 본문 send 호출 수
    pub send_calls: u64,

    /// 일시적 에러로 재시도한 횟수 (모든 단계 합계)
    pub retries: u32,

    /// EMSGSIZE로 전송 크기를 줄인 횟수
    pub shrinks: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            header_bytes: 0,
            body_bytes: 0,
            trailer_bytes: 0,
            read_calls: 0,
            send_calls: 0,
            retries: 0,
            shrinks: 0,
        }
    }

    /// 헤더 + 본문 + 트레일러
    pub fn total(&self) -> u64 {
        self.header_bytes + self.body_bytes + self.trailer_bytes
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total() as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.3}s | Bytes: {} (hdr {} / body {} / trl {}) | Throughput: {:.2} MB/s | Reads: {} | Sends: {} | Retries: {} | Shrinks: {}",
            self.elapsed().as_secs_f64(),
            self.total(),
            self.header_bytes,
            self.body_bytes,
            self.trailer_bytes,
            self.throughput() / 1_000_000.0,
            self.read_calls,
            self.send_calls,
            self.retries,
            self.shrinks,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
