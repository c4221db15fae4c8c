//! OS 에러 분류
//!
//! (연산, OS 에러) 쌍을 닫힌 에러 집합과 재시도 방식으로 바꾸는 단 하나의
//! 전역 함수. 모든 재시도 사이트가 이 함수만 사용한다.

use std::io;

use crate::Error;

/// 에러가 발생한 연산
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// 소스 파일 fstat
    ProbeSource,
    /// 대상 소켓 종류/피어 확인
    ProbeSocket,
    /// 소스 파일 lseek
    Seek,
    /// 소스 파일 read
    Read,
    /// 헤더/트레일러 writev
    WriteVectored,
    /// 본문 청크 send
    Send,
    /// 재시도 사이 대기
    Pause,
}

impl Op {
    fn is_write(self) -> bool {
        matches!(self, Op::WriteVectored | Op::Send)
    }

    fn is_io(self) -> bool {
        matches!(self, Op::Read | Op::WriteVectored | Op::Send)
    }
}

/// 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 재시도하지 않고 즉시 실패
    Fatal(Error),
    /// 대기 후 재시도 (예산 소진 시 해당 에러로 실패)
    Transient(Error),
    /// 시그널에 의해 중단된 호출: 대기 없이 재시도
    Interrupted,
    /// 한 번에 보내기엔 너무 큼: 크기를 줄여 즉시 재시도
    Oversize,
}

/// (연산, OS 에러) → 분류
///
/// raw errno가 있으면 그것을, 없으면 `io::ErrorKind`를 기준으로 판단한다.
pub fn classify(op: Op, err: &io::Error) -> Fault {
    match err.raw_os_error() {
        Some(code) => classify_errno(op, code),
        None => classify_kind(op, err.kind()),
    }
}

fn classify_errno(op: Op, code: i32) -> Fault {
    use Fault::{Fatal, Transient};

    if code == libc::EINTR {
        return if op == Op::Pause {
            Fatal(Error::Interrupted)
        } else {
            Fault::Interrupted
        };
    }

    if code == libc::EAGAIN || code == libc::EWOULDBLOCK {
        return if op.is_io() {
            Transient(Error::WouldBlock)
        } else {
            Fatal(Error::Io)
        };
    }

    if code == libc::EBADF {
        return Fatal(Error::BadDescriptor);
    }

    if code == libc::ENOTSUP || code == libc::EOPNOTSUPP {
        return match op {
            Op::ProbeSource => Fatal(Error::NotSupported),
            Op::ProbeSocket => Fatal(Error::NotASocket),
            _ => Fatal(Error::Io),
        };
    }

    match (op, code) {
        (Op::Send | Op::WriteVectored, libc::ENOBUFS) => Transient(Error::WouldBlock),
        (Op::Send | Op::WriteVectored, libc::EMSGSIZE) => Fault::Oversize,

        (Op::Send | Op::WriteVectored, libc::EPIPE | libc::ECONNRESET) => {
            Fatal(Error::BrokenPipe)
        }

        // 이 호출 규약에서 돌려줄 수 없는 연결 관련 에러
        (
            Op::Send | Op::WriteVectored | Op::ProbeSocket,
            libc::ENOTCONN
            | libc::EDESTADDRREQ
            | libc::EACCES
            | libc::EHOSTUNREACH
            | libc::ENETUNREACH
            | libc::ENETDOWN
            | libc::EHOSTDOWN,
        ) => Fatal(Error::NotConnected),

        // 디스크 쓰기에서만 가능한 에러
        (Op::Send | Op::WriteVectored, libc::EFBIG | libc::ENOSPC | libc::EDQUOT) => {
            Fatal(Error::NotASocket)
        }
        (Op::Send | Op::WriteVectored | Op::ProbeSocket, libc::ENOTSOCK) => {
            Fatal(Error::NotASocket)
        }

        (Op::Send | Op::WriteVectored | Op::ProbeSocket | Op::ProbeSource, libc::EFAULT) => {
            Fatal(Error::InvalidAddress)
        }
        (Op::Send | Op::WriteVectored, libc::EINVAL) => Fatal(Error::InvalidArgument),
        (Op::ProbeSocket, libc::EINVAL | libc::ENOPROTOOPT | libc::EDOM) => {
            Fatal(Error::InvalidArgument)
        }

        // 읽기/탐색 쪽 EINVAL 등은 예약된 인자 에러와 겹치므로 EIO
        _ => Fatal(Error::Io),
    }
}

fn classify_kind(op: Op, kind: io::ErrorKind) -> Fault {
    use io::ErrorKind;
    use Fault::{Fatal, Transient};

    match kind {
        ErrorKind::Interrupted if op == Op::Pause => Fatal(Error::Interrupted),
        ErrorKind::Interrupted => Fault::Interrupted,
        ErrorKind::WouldBlock if op.is_io() => Transient(Error::WouldBlock),
        ErrorKind::WriteZero if op.is_write() => Transient(Error::WouldBlock),

        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            if op.is_write() =>
        {
            Fatal(Error::BrokenPipe)
        }
        ErrorKind::NotConnected | ErrorKind::PermissionDenied | ErrorKind::AddrNotAvailable
            if op.is_write() || op == Op::ProbeSocket =>
        {
            Fatal(Error::NotConnected)
        }
        ErrorKind::InvalidInput if op.is_write() || op == Op::ProbeSocket => {
            Fatal(Error::InvalidArgument)
        }
        ErrorKind::Unsupported if op == Op::ProbeSource => Fatal(Error::NotSupported),
        ErrorKind::Unsupported if op == Op::ProbeSocket => Fatal(Error::NotASocket),

        _ => Fatal(Error::Io),
    }
}
