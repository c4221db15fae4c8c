//! 에러 타입 정의
//!
//! 네이티브 `sendfile()`과 같은 errno 어휘만 사용한다. 어떤 OS 에러도
//! 이 닫힌 집합 밖으로 새어 나가지 않는다 (매핑은 [`crate::fault`] 참고).

use std::io;

use thiserror::Error;

/// sfshim 에러 타입
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("유효하지 않은 인자")]
    InvalidArgument,

    #[error("유효하지 않은 주소")]
    InvalidAddress,

    #[error("유효하지 않은 디스크립터")]
    BadDescriptor,

    #[error("지원하지 않는 소스: 일반 파일이 아님")]
    NotSupported,

    #[error("스트림 소켓이 아님")]
    NotASocket,

    #[error("소켓이 연결되어 있지 않음")]
    NotConnected,

    #[error("상대방이 연결을 종료함")]
    BrokenPipe,

    #[error("I/O 에러")]
    Io,

    #[error("대상이 일시적으로 데이터를 받을 수 없음")]
    WouldBlock,

    #[error("시그널에 의해 중단됨")]
    Interrupted,
}

impl Error {
    /// 대응하는 errno 값
    pub fn raw_os_error(self) -> i32 {
        match self {
            Error::InvalidArgument => libc::EINVAL,
            Error::InvalidAddress => libc::EFAULT,
            Error::BadDescriptor => libc::EBADF,
            Error::NotSupported => libc::ENOTSUP,
            Error::NotASocket => libc::ENOTSOCK,
            Error::NotConnected => libc::ENOTCONN,
            Error::BrokenPipe => libc::EPIPE,
            Error::Io => libc::EIO,
            Error::WouldBlock => libc::EAGAIN,
            Error::Interrupted => libc::EINTR,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::from_raw_os_error(err.raw_os_error())
    }
}

/// 전송 도중 실패: 실패 직전까지 실제로 전송된 바이트 수를 함께 보고
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{error} ({sent} 바이트 전송 후)")]
pub struct PartialError {
    /// 매핑된 에러
    pub error: Error,

    /// 실패 전까지 전송된 바이트 수
    pub sent: u64,
}

impl PartialError {
    pub fn new(error: Error, sent: u64) -> Self {
        Self { error, sent }
    }

    /// 아무것도 보내기 전에 실패
    pub fn before_send(error: Error) -> Self {
        Self { error, sent: 0 }
    }

    /// 앞 단계에서 보낸 바이트를 누적
    pub fn after(mut self, earlier: u64) -> Self {
        self.sent += earlier;
        self
    }
}

impl From<Error> for PartialError {
    fn from(error: Error) -> Self {
        Self::before_send(error)
    }
}

impl From<PartialError> for io::Error {
    fn from(err: PartialError) -> Self {
        err.error.into()
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_is_stable() {
        assert_eq!(Error::InvalidArgument.raw_os_error(), libc::EINVAL);
        assert_eq!(Error::WouldBlock.raw_os_error(), libc::EAGAIN);

        let io_err: io::Error = Error::NotASocket.into();
        assert_eq!(io_err.raw_os_error(), Some(libc::ENOTSOCK));
    }

    #[test]
    fn test_partial_error_accumulates() {
        let err = PartialError::new(Error::BrokenPipe, 10).after(20);
        assert_eq!(err.sent, 30);
        assert_eq!(err.error, Error::BrokenPipe);
    }
}
