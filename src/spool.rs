//! 벡터 I/O 스풀러
//!
//! 검증된 [`SpanSet`]을 writev로 전부 흘려보낸다. 입력은 건드리지 않고
//! (인덱스, 스팬 내 오프셋) 커서만 움직이므로 짧은 쓰기 이후에도 바이트가
//! 빠지거나 중복되지 않는다.
//!
//! EMSGSIZE를 받으면 본문 송신과 같은 규칙으로 한 번에 보내는 바이트 수를 줄인다.

use std::io::IoSlice;

use tracing::{debug, trace, warn};

use crate::fault::{classify, Fault, Op};
use crate::io::StreamSocket;
use crate::retry::{backoff, Pause, RetryBudget};
use crate::sender::shrink;
use crate::span::SpanSet;
use crate::{Config, Error, PartialError};

/// 스팬 목록 전송 상태
#[derive(Debug)]
pub struct Spooler<'s, 'a> {
    set: &'s SpanSet<'a>,

    /// 아직 다 보내지 못한 첫 스팬
    index: usize,

    /// 그 스팬 안에서 이미 보낸 바이트 수
    offset: usize,

    /// 보낸 바이트 수
    sent: u64,

    /// 사용한 재시도 횟수
    retries: u32,

    /// writev 한 번의 최대 바이트 수 (EMSGSIZE 이후에만 설정)
    cap: Option<usize>,

    /// EMSGSIZE로 크기를 줄인 횟수
    shrinks: u32,
}

impl<'s, 'a> Spooler<'s, 'a> {
    pub fn new(set: &'s SpanSet<'a>) -> Self {
        Self {
            set,
            index: 0,
            offset: 0,
            sent: 0,
            retries: 0,
            cap: None,
            shrinks: 0,
        }
    }

    /// 지금까지 전송된 바이트 수
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn shrinks(&self) -> u32 {
        self.shrinks
    }

    /// 남은 바이트 수
    pub fn remaining_len(&self) -> u64 {
        self.set.total() - self.sent
    }

    pub fn is_done(&self) -> bool {
        self.remaining_len() == 0
    }

    /// 아직 보내지 않은 부분 (첫 미전송 바이트부터 순서대로)
    pub fn remaining(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        let offset = self.offset;
        self.set
            .regions()
            .iter()
            .skip(self.index)
            .enumerate()
            .map(move |(i, &region)| if i == 0 { &region[offset..] } else { region })
    }

    /// 다음 writev에 넘길 슬라이스 (최대 `max_iov`개, 합계는 `cap` 이하)
    fn io_slices(&self, max_iov: usize) -> Vec<IoSlice<'a>> {
        let mut left = self.cap.unwrap_or(usize::MAX);
        let mut slices = Vec::new();

        for region in self.remaining().take(max_iov.max(1)) {
            if left == 0 {
                break;
            }
            let take = region.len().min(left);
            slices.push(IoSlice::new(&region[..take]));
            left -= take;
        }
        slices
    }

    /// n 바이트 전송 완료 처리
    fn advance(&mut self, n: usize) {
        let regions = self.set.regions();
        let mut left = n;

        while left > 0 && self.index < regions.len() {
            let unsent = regions[self.index].len() - self.offset;
            if left < unsent {
                self.offset += left;
                left = 0;
            } else {
                left -= unsent;
                self.index += 1;
                self.offset = 0;
            }
        }

        self.sent += (n - left) as u64;
    }

    /// 남은 스팬을 모두 전송
    ///
    /// 성공 시 이번 호출로 보낸 바이트 수, 실패 시 실패 전까지 보낸 바이트 수를
    /// 담은 [`PartialError`].
    pub fn run<S, P>(
        &mut self,
        socket: &mut S,
        config: &Config,
        pause: &mut P,
    ) -> Result<u64, PartialError>
    where
        S: StreamSocket + ?Sized,
        P: Pause,
    {
        let start = self.sent;
        let mut budget = RetryBudget::new(config.retry_limit);

        let result = self.drive(socket, config, pause, &mut budget);
        self.retries += budget.used();

        let sent = self.sent - start;
        match result {
            Ok(()) => {
                debug!("스팬 {}개 전송 완료: {} 바이트", self.set.len(), sent);
                Ok(sent)
            }
            Err(error) => {
                debug!("스팬 전송 실패: {} ({} 바이트 전송 후)", error, sent);
                Err(PartialError::new(error, sent))
            }
        }
    }

    fn drive<S, P>(
        &mut self,
        socket: &mut S,
        config: &Config,
        pause: &mut P,
        budget: &mut RetryBudget,
    ) -> Result<(), Error>
    where
        S: StreamSocket + ?Sized,
        P: Pause,
    {
        while !self.is_done() {
            let slices = self.io_slices(config.max_iov);
            let attempt: usize = slices.iter().map(|s| s.len()).sum();

            match socket.send_vectored(&slices) {
                Ok(0) => {
                    // 진행 없음: 부하 상황과 같은 규칙으로 재시도
                    trace!("writev 0 바이트");
                    self.retry_after_pause(budget, pause, config, Error::WouldBlock)?;
                }
                Ok(n) => {
                    trace!("writev {} 바이트 (남은 {})", n, self.remaining_len());
                    self.advance(n);
                }
                Err(e) => match classify(Op::WriteVectored, &e) {
                    Fault::Transient(err) => {
                        self.retry_after_pause(budget, pause, config, err)?;
                    }
                    Fault::Interrupted => {
                        if !budget.consume() {
                            warn!("writev 중단 재시도 소진");
                            return Err(Error::Interrupted);
                        }
                    }
                    Fault::Oversize => {
                        if attempt <= 1 {
                            return Err(Error::Io);
                        }
                        let next = shrink(attempt, config.shrink_ceiling);
                        self.cap = Some(next);
                        self.shrinks += 1;
                        trace!("EMSGSIZE: writev 크기 {} 로 축소", next);
                    }
                    Fault::Fatal(err) => return Err(err),
                },
            }
        }

        Ok(())
    }

    fn retry_after_pause<P: Pause>(
        &self,
        budget: &mut RetryBudget,
        pause: &mut P,
        config: &Config,
        exhausted: Error,
    ) -> Result<(), Error> {
        backoff(budget, pause, config.retry_quantum, exhausted).map_err(|err| {
            warn!("writev 재시도 포기: {} (재시도 {}회)", err, budget.used());
            err
        })
    }
}

/// 스팬 목록 전체를 한 번에 전송
pub fn spool<S, P>(
    socket: &mut S,
    set: &SpanSet<'_>,
    config: &Config,
    pause: &mut P,
) -> Result<u64, PartialError>
where
    S: StreamSocket + ?Sized,
    P: Pause,
{
    Spooler::new(set).run(socket, config, pause)
}
