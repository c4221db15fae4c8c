//! 재시도 예산과 대기
//!
//! 재시도 사이트마다 새 [`RetryBudget`]을 만든다. 대기는 [`Pause`] 트레잇으로
//! 주입되어 테스트에서 지연 없는 구현으로 바꿀 수 있다.

use std::io;
use std::time::Duration;

use tracing::trace;

use crate::fault::{classify, Fault, Op};
use crate::Error;

/// 재시도 사이 대기
pub trait Pause {
    /// `quantum`만큼 대기. 시그널에 의해 깨어나면 `EINTR` 에러를 돌려준다.
    fn pause(&mut self, quantum: Duration) -> io::Result<()>;
}

/// `nanosleep(2)` 기반 대기 (시그널 중단을 그대로 보고)
#[derive(Debug, Default, Clone, Copy)]
pub struct NanoSleep;

impl Pause for NanoSleep {
    fn pause(&mut self, quantum: Duration) -> io::Result<()> {
        if quantum.is_zero() {
            return Ok(());
        }

        let request = libc::timespec {
            tv_sec: quantum.as_secs() as libc::time_t,
            tv_nsec: quantum.subsec_nanos() as _,
        };

        // SAFETY: request는 유효한 timespec, 남은 시간은 받지 않는다.
        let rc = unsafe { libc::nanosleep(&request, std::ptr::null_mut()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl<P: Pause + ?Sized> Pause for &mut P {
    fn pause(&mut self, quantum: Duration) -> io::Result<()> {
        (**self).pause(quantum)
    }
}

/// 재시도 예산 (요청 단위)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// 재시도 한 번을 소비. 남은 예산이 없으면 false
    pub fn consume(&mut self) -> bool {
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }

    /// 지금까지 사용한 재시도 횟수
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// 대기 후 재시도할지 결정
///
/// 예산이 남아 있으면 한 번 대기하고 `Ok(())`. 소진되었으면 `exhausted`,
/// 대기가 중단되었으면 매핑된 에러(`Interrupted`)로 실패한다.
pub fn backoff<P: Pause>(
    budget: &mut RetryBudget,
    pause: &mut P,
    quantum: Duration,
    exhausted: Error,
) -> Result<(), Error> {
    if !budget.consume() {
        return Err(exhausted);
    }

    trace!("재시도 {}/{} 대기: {:?}", budget.used(), budget.limit, quantum);

    pause.pause(quantum).map_err(|e| match classify(Op::Pause, &e) {
        Fault::Fatal(err) => err,
        _ => Error::Io,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPause;

    #[test]
    fn test_budget_allows_exactly_limit_retries() {
        let mut budget = RetryBudget::new(3);
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(!budget.consume());
        assert!(budget.is_exhausted());
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut budget = RetryBudget::new(0);
        let mut pause = ScriptedPause::default();

        let result = backoff(&mut budget, &mut pause, Duration::ZERO, Error::WouldBlock);
        assert_eq!(result, Err(Error::WouldBlock));
        assert_eq!(pause.calls, 0);
    }

    #[test]
    fn test_interrupted_pause_aborts() {
        let mut budget = RetryBudget::new(5);
        let mut pause = ScriptedPause::interrupt_on(1);

        let result = backoff(&mut budget, &mut pause, Duration::ZERO, Error::WouldBlock);
        assert_eq!(result, Err(Error::Interrupted));
        assert_eq!(pause.calls, 1);
    }

    #[test]
    fn test_zero_nanosleep_returns_immediately() {
        assert!(NanoSleep.pause(Duration::ZERO).is_ok());
        assert!(NanoSleep.pause(Duration::from_micros(10)).is_ok());
    }
}
