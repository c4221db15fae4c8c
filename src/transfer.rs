//! 전송 오케스트레이터
//!
//! Validating → SpoolingHeaders → CopyingBody → SpoolingTrailers → Done
//! 어느 단계에서든 Failed로 갈 수 있으며, 그때까지 실제로 전송된 바이트 수를
//! 함께 보고한다.

use std::fs::File;
use std::os::fd::BorrowedFd;

use bytes::BytesMut;
use socket2::SockRef;
use tracing::{debug, trace};

use crate::fault::{classify, Fault, Op};
use crate::io::{SocketKind, SourceFile, StreamSocket};
use crate::retry::{NanoSleep, Pause, RetryBudget};
use crate::sender::Sender;
use crate::span::{validate_optional, HeaderTrailer, SpanSet};
use crate::spool::Spooler;
use crate::stats::TransferStats;
use crate::{Config, Error, PartialError, Result};

/// 전송 요청
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferRequest<'s, 'a> {
    /// 파일 읽기 시작 위치 (0 이상)
    pub offset: i64,

    /// 보낼 파일 바이트 수 (0 = 파일 끝까지)
    pub length: i64,

    /// 헤더/트레일러
    pub hdtr: Option<HeaderTrailer<'s, 'a>>,

    /// 예약 (0이어야 함)
    pub flags: i32,
}

impl<'s, 'a> TransferRequest<'s, 'a> {
    pub fn new(offset: i64, length: i64) -> Self {
        Self {
            offset,
            length,
            hdtr: None,
            flags: 0,
        }
    }

    pub fn with_hdtr(mut self, hdtr: HeaderTrailer<'s, 'a>) -> Self {
        self.hdtr = Some(hdtr);
        self
    }

    pub fn with_flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }
}

/// 검증을 통과한 실행 계획
#[derive(Debug)]
struct Plan<'a> {
    headers: Option<SpanSet<'a>>,
    trailers: Option<SpanSet<'a>>,
    /// None = 파일 끝까지
    body_limit: Option<u64>,
}

/// 검증 단계의 OS 에러를 닫힌 집합으로
fn probe_error(op: Op, err: &std::io::Error) -> Error {
    match classify(op, err) {
        Fault::Fatal(e) | Fault::Transient(e) => e,
        Fault::Interrupted => Error::Interrupted,
        Fault::Oversize => Error::Io,
    }
}

/// 전송 엔진
pub struct Transfer<P = NanoSleep> {
    /// 설정
    config: Config,

    /// 재시도 대기
    pause: P,
}

impl Transfer<NanoSleep> {
    /// 새 전송 엔진 생성
    pub fn new(config: Config) -> Self {
        Self::with_pause(config, NanoSleep)
    }
}

impl Default for Transfer<NanoSleep> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<P: Pause> Transfer<P> {
    /// 대기 구현을 지정해 생성
    pub fn with_pause(config: Config, pause: P) -> Self {
        Self { config, pause }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 헤더 → 파일 본문 → 트레일러 전송
    ///
    /// 성공 시 통계 (`total()`이 전송된 총 바이트), 실패 시 실패 직전까지
    /// 전송된 바이트 수를 담은 [`PartialError`].
    pub fn run<F, S>(
        &mut self,
        source: &mut F,
        socket: &mut S,
        request: &TransferRequest<'_, '_>,
    ) -> std::result::Result<TransferStats, PartialError>
    where
        F: SourceFile + ?Sized,
        S: StreamSocket + ?Sized,
    {
        let mut stats = TransferStats::new();

        match self.drive(source, socket, request, &mut stats) {
            Ok(()) => {
                debug!("전송 완료: {}", stats.summary());
                Ok(stats)
            }
            Err(error) => {
                debug!("전송 실패: {} | {}", error, stats.summary());
                Err(PartialError::new(error, stats.total()))
            }
        }
    }

    fn drive<F, S>(
        &mut self,
        source: &mut F,
        socket: &mut S,
        request: &TransferRequest<'_, '_>,
        stats: &mut TransferStats,
    ) -> Result<()>
    where
        F: SourceFile + ?Sized,
        S: StreamSocket + ?Sized,
    {
        trace!("Validating: offset={} length={}", request.offset, request.length);
        let plan = self.plan(source, socket, request)?;

        if let Some(headers) = &plan.headers {
            trace!("SpoolingHeaders: {} 바이트", headers.total());
            let (sent, result) = self.spool_phase(socket, headers, stats);
            stats.header_bytes = sent;
            result?;
        }

        trace!("CopyingBody: limit={:?}", plan.body_limit);
        self.copy_body(source, socket, plan.body_limit, stats)?;

        if let Some(trailers) = &plan.trailers {
            trace!("SpoolingTrailers: {} 바이트", trailers.total());
            let (sent, result) = self.spool_phase(socket, trailers, stats);
            stats.trailer_bytes = sent;
            result?;
        }

        trace!("Done");
        Ok(())
    }

    /// 인자와 디스크립터 검증, 파일 위치 이동
    fn plan<'a, F, S>(
        &self,
        source: &mut F,
        socket: &mut S,
        request: &TransferRequest<'_, 'a>,
    ) -> Result<Plan<'a>>
    where
        F: SourceFile + ?Sized,
        S: StreamSocket + ?Sized,
    {
        if request.offset < 0 || request.flags != 0 || request.length < 0 {
            return Err(Error::InvalidArgument);
        }
        self.config.validate()?;

        // 소스: 일반 파일이어야 함
        let info = source
            .probe()
            .map_err(|e| probe_error(Op::ProbeSource, &e))?;
        if !info.regular {
            return Err(Error::NotSupported);
        }

        let offset = request.offset as u64;
        let body_limit = if offset > info.size {
            // 파일 끝 너머: 본문 없이 헤더/트레일러만
            Some(0)
        } else if request.length == 0 {
            None
        } else {
            Some(request.length as u64)
        };

        // 대상: 연결된 스트림 소켓이어야 함
        let kind = socket
            .socket_kind()
            .map_err(|e| probe_error(Op::ProbeSocket, &e))?;
        if kind != SocketKind::Stream {
            return Err(Error::NotASocket);
        }
        let connected = socket
            .has_peer()
            .map_err(|e| probe_error(Op::ProbeSocket, &e))?;
        if !connected {
            return Err(Error::NotConnected);
        }

        // 스팬 검증은 파일 위치를 옮기기 전에
        let hdtr = request.hdtr.unwrap_or_default();
        let headers = validate_optional(hdtr.headers)?;
        let trailers = validate_optional(hdtr.trailers)?;

        match source.seek_to(offset) {
            Ok(position) if position == offset => {}
            _ => return Err(Error::Io),
        }

        Ok(Plan {
            headers,
            trailers,
            body_limit,
        })
    }

    /// 헤더/트레일러 단계. 실패해도 전송된 바이트 수를 함께 돌려준다.
    fn spool_phase<S>(
        &mut self,
        socket: &mut S,
        set: &SpanSet<'_>,
        stats: &mut TransferStats,
    ) -> (u64, Result<()>)
    where
        S: StreamSocket + ?Sized,
    {
        let mut spooler = Spooler::new(set);
        let result = spooler.run(socket, &self.config, &mut self.pause);
        stats.retries += spooler.retries();
        stats.shrinks += spooler.shrinks();

        match result {
            Ok(sent) => (sent, Ok(())),
            Err(e) => (e.sent, Err(e.error)),
        }
    }

    /// 파일 본문을 버퍼 단위로 읽어 전송
    fn copy_body<F, S>(
        &mut self,
        source: &mut F,
        socket: &mut S,
        limit: Option<u64>,
        stats: &mut TransferStats,
    ) -> Result<()>
    where
        F: SourceFile + ?Sized,
        S: StreamSocket + ?Sized,
    {
        if limit == Some(0) {
            return Ok(());
        }

        let chunk_size = self.config.chunk_size;
        let retry_limit = self.config.retry_limit;
        let mut buf = BytesMut::zeroed(chunk_size);
        let mut sender = Sender::new(&self.config, &mut self.pause);
        let mut remaining = limit;

        let result = loop {
            let want = match remaining {
                Some(0) => break Ok(()),
                Some(n) => n.min(chunk_size as u64) as usize,
                None => chunk_size,
            };

            let n = match read_retrying(source, &mut buf[..want], retry_limit, stats) {
                Ok(0) => {
                    trace!("EOF");
                    break Ok(());
                }
                Ok(n) => n,
                Err(err) => break Err(err),
            };

            match sender.send_all(socket, &buf[..n]) {
                Ok(sent) => stats.body_bytes += sent,
                Err(e) => {
                    stats.body_bytes += e.sent;
                    break Err(e.error);
                }
            }

            if let Some(left) = remaining.as_mut() {
                *left -= n as u64;
            }
        };

        stats.send_calls += sender.calls();
        stats.retries += sender.retries();
        stats.shrinks += sender.shrinks();
        result
    }

    /// 길이 입출력 규약을 따르는 `sendfile()`
    ///
    /// `len`은 입력으로 보낼 파일 바이트 수 (0 = 끝까지)를 받고, 성공이든 실패든
    /// 실제로 전송된 총 바이트 수 (헤더 + 본문 + 트레일러)로 덮어쓴다.
    pub fn sendfile<F, S>(
        &mut self,
        source: &mut F,
        socket: &mut S,
        offset: i64,
        len: Option<&mut i64>,
        hdtr: Option<&HeaderTrailer<'_, '_>>,
        flags: i32,
    ) -> Result<()>
    where
        F: SourceFile + ?Sized,
        S: StreamSocket + ?Sized,
    {
        let Some(len) = len else {
            return Err(Error::InvalidArgument);
        };

        let request = TransferRequest {
            offset,
            length: *len,
            hdtr: hdtr.copied(),
            flags,
        };

        match self.run(source, socket, &request) {
            Ok(stats) => {
                *len = stats.total() as i64;
                Ok(())
            }
            Err(e) => {
                *len = e.sent as i64;
                Err(e.error)
            }
        }
    }
}

/// 파일 read. 시그널 중단과 EAGAIN은 예산만큼 즉시 재시도한다.
fn read_retrying<F>(
    source: &mut F,
    buf: &mut [u8],
    retry_limit: u32,
    stats: &mut TransferStats,
) -> Result<usize>
where
    F: SourceFile + ?Sized,
{
    let mut budget = RetryBudget::new(retry_limit);

    let result = loop {
        stats.read_calls += 1;
        match source.read_chunk(buf) {
            Ok(n) => break Ok(n),
            Err(e) => match classify(Op::Read, &e) {
                Fault::Interrupted => {
                    if !budget.consume() {
                        break Err(Error::Interrupted);
                    }
                }
                Fault::Transient(err) => {
                    if !budget.consume() {
                        break Err(err);
                    }
                }
                Fault::Fatal(err) => break Err(err),
                Fault::Oversize => break Err(Error::Io),
            },
        }
    };

    stats.retries += budget.used();
    result
}

/// 기본 설정으로 `sendfile()` 수행
pub fn sendfile<F, S>(
    source: &mut F,
    socket: &mut S,
    offset: i64,
    len: Option<&mut i64>,
    hdtr: Option<&HeaderTrailer<'_, '_>>,
    flags: i32,
) -> Result<()>
where
    F: SourceFile + ?Sized,
    S: StreamSocket + ?Sized,
{
    Transfer::default().sendfile(source, socket, offset, len, hdtr, flags)
}

/// 원시 디스크립터로 `sendfile()` 수행
///
/// 파일 디스크립터는 복제해서 쓰므로 (파일 위치는 공유) 호출자의 디스크립터는
/// 닫히지 않는다. 소켓은 빌려 쓴다.
pub fn sendfile_fd(
    fd: BorrowedFd<'_>,
    sd: BorrowedFd<'_>,
    offset: i64,
    len: Option<&mut i64>,
    hdtr: Option<&HeaderTrailer<'_, '_>>,
    flags: i32,
) -> Result<()> {
    let Some(len) = len else {
        return Err(Error::InvalidArgument);
    };
    if offset < 0 || flags != 0 {
        *len = 0;
        return Err(Error::InvalidArgument);
    }

    let owned = match fd.try_clone_to_owned() {
        Ok(owned) => owned,
        Err(e) => {
            *len = 0;
            return Err(probe_error(Op::ProbeSource, &e));
        }
    };
    let mut file = File::from(owned);
    let mut socket = SockRef::from(&sd);

    sendfile(&mut file, &mut socket, offset, Some(len), hdtr, flags)
}
