//! 신뢰 송신자
//!
//! 평평한 버퍼 하나를 send()로 끝까지 밀어 넣는다.
//! - 부하(EAGAIN/ENOBUFS): 한 퀀텀 대기 후 재시도, 예산 소진 시 WouldBlock
//! - 규약 밖의 연결 에러: NotConnected로 매핑
//! - EMSGSIZE: 시도 크기를 3/4로 줄여 즉시 재시도 (예산 소비 없음)

use tracing::{trace, warn};

use crate::fault::{classify, Fault, Op};
use crate::io::StreamSocket;
use crate::retry::{backoff, Pause, RetryBudget};
use crate::{Config, Error, PartialError};

/// 다음 시도 크기: 이전의 3/4, 상한 `ceiling`, 최소 1
pub fn shrink(previous: usize, ceiling: usize) -> usize {
    let three_quarters = previous / 4 * 3 + previous % 4 * 3 / 4;
    three_quarters.min(ceiling).max(1)
}

/// 신뢰 송신자
pub struct Sender<'c, P> {
    /// 설정
    config: &'c Config,

    /// 재시도 대기
    pause: P,

    /// send 호출 수
    calls: u64,

    /// 사용한 재시도 횟수 (누적)
    retries: u32,

    /// EMSGSIZE로 크기를 줄인 횟수 (누적)
    shrinks: u32,
}

impl<'c, P: Pause> Sender<'c, P> {
    /// 새 송신자 생성
    pub fn new(config: &'c Config, pause: P) -> Self {
        Self {
            config,
            pause,
            calls: 0,
            retries: 0,
            shrinks: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn shrinks(&self) -> u32 {
        self.shrinks
    }

    /// 버퍼 전체 전송
    ///
    /// 성공은 버퍼 전체가 전송된 경우에만. 실패 시 상대가 받아들인 누적 바이트 수를
    /// [`PartialError`]에 담는다.
    pub fn send_all<S>(&mut self, socket: &mut S, buf: &[u8]) -> Result<u64, PartialError>
    where
        S: StreamSocket + ?Sized,
    {
        let mut sent = 0usize;
        let mut attempt = buf.len();
        let mut budget = RetryBudget::new(self.config.retry_limit);

        let result = loop {
            if sent >= buf.len() {
                break Ok(());
            }

            let end = sent + attempt.min(buf.len() - sent);
            self.calls += 1;

            match socket.send(&buf[sent..end]) {
                Ok(0) => {
                    if let Err(err) = self.wait(&mut budget) {
                        break Err(err);
                    }
                }
                Ok(n) => {
                    sent += n.min(end - sent);
                    trace!("send {} 바이트 ({}/{})", n, sent, buf.len());
                    // 남은 양보다 크게 시도하지 않는다
                    attempt = attempt.min(buf.len() - sent);
                }
                Err(e) => match classify(Op::Send, &e) {
                    Fault::Transient(Error::WouldBlock) => {
                        if let Err(err) = self.wait(&mut budget) {
                            break Err(err);
                        }
                    }
                    Fault::Transient(err) | Fault::Fatal(err) => break Err(err),
                    Fault::Interrupted => {
                        if !budget.consume() {
                            warn!("send 중단 재시도 소진");
                            break Err(Error::Interrupted);
                        }
                    }
                    Fault::Oversize => {
                        if attempt <= 1 {
                            break Err(Error::Io);
                        }
                        attempt = shrink(attempt, self.config.shrink_ceiling);
                        self.shrinks += 1;
                        trace!("EMSGSIZE: 시도 크기 {} 로 축소", attempt);
                    }
                },
            }
        };

        self.retries += budget.used();

        match result {
            Ok(()) => Ok(sent as u64),
            Err(error) => Err(PartialError::new(error, sent as u64)),
        }
    }

    fn wait(&mut self, budget: &mut RetryBudget) -> Result<(), Error> {
        backoff(budget, &mut self.pause, self.config.retry_quantum, Error::WouldBlock).map_err(
            |err| {
                warn!("send 재시도 포기: {} (재시도 {}회)", err, budget.used());
                err
            },
        )
    }
}
