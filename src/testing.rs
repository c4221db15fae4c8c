//! 테스트용 스크립트 파일/소켓/대기

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::time::Duration;

use crate::io::{SocketKind, SourceFile, SourceInfo, StreamSocket};
use crate::retry::Pause;

/// 소켓 호출 한 번의 응답
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    /// 전부 수락
    All,
    /// 최대 n 바이트만 수락
    Accept(usize),
    /// errno로 실패
    Fail(i32),
}

/// 응답 스크립트를 따르는 소켓. 수락된 바이트는 `wire`에 쌓인다.
#[derive(Debug)]
pub(crate) struct ScriptedSocket {
    script: VecDeque<Reply>,
    fallback: Reply,
    /// Err = getsockopt errno
    pub kind: Result<SocketKind, i32>,
    pub peer: bool,
    /// 이 크기를 넘는 send/writev는 EMSGSIZE
    pub oversize_above: Option<usize>,
    pub wire: Vec<u8>,
    pub vectored_calls: usize,
    pub send_calls: usize,
    /// send에 넘어온 크기 기록
    pub send_sizes: Vec<usize>,
    /// writev에 넘어온 슬라이스 수 기록
    pub iov_counts: Vec<usize>,
    /// writev에 넘어온 총 바이트 수 기록
    pub vectored_sizes: Vec<usize>,
}

impl ScriptedSocket {
    pub fn accepting() -> Self {
        Self::with_script([], Reply::All)
    }

    pub fn with_script(script: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
            kind: Ok(SocketKind::Stream),
            peer: true,
            oversize_above: None,
            wire: Vec::new(),
            vectored_calls: 0,
            send_calls: 0,
            send_sizes: Vec::new(),
            iov_counts: Vec::new(),
            vectored_sizes: Vec::new(),
        }
    }

    fn next_reply(&mut self) -> Reply {
        self.script.pop_front().unwrap_or(self.fallback)
    }

    fn reject_oversize(&self, len: usize) -> io::Result<()> {
        match self.oversize_above {
            Some(limit) if len > limit => Err(io::Error::from_raw_os_error(libc::EMSGSIZE)),
            _ => Ok(()),
        }
    }

    fn accept(&mut self, bufs: &[&[u8]]) -> io::Result<usize> {
        let total: usize = bufs.iter().map(|b| b.len()).sum();
        let limit = match self.next_reply() {
            Reply::All => total,
            Reply::Accept(n) => n.min(total),
            Reply::Fail(code) => return Err(io::Error::from_raw_os_error(code)),
        };

        let mut left = limit;
        for buf in bufs {
            let take = left.min(buf.len());
            self.wire.extend_from_slice(&buf[..take]);
            left -= take;
        }
        Ok(limit)
    }
}

impl StreamSocket for ScriptedSocket {
    fn socket_kind(&self) -> io::Result<SocketKind> {
        self.kind.map_err(io::Error::from_raw_os_error)
    }

    fn has_peer(&self) -> io::Result<bool> {
        Ok(self.peer)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.vectored_calls += 1;
        self.iov_counts.push(bufs.len());
        let slices: Vec<&[u8]> = bufs.iter().map(|b| &**b).collect();
        let len: usize = slices.iter().map(|s| s.len()).sum();
        self.vectored_sizes.push(len);
        self.reject_oversize(len)?;
        self.accept(&slices)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_calls += 1;
        self.send_sizes.push(buf.len());
        self.reject_oversize(buf.len())?;
        self.accept(&[buf])
    }
}

/// 메모리 기반 파일. 읽기 에러를 순서대로 주입할 수 있다.
#[derive(Debug)]
pub(crate) struct ScriptedFile {
    data: Vec<u8>,
    pos: usize,
    pub regular: bool,
    /// 읽기 호출마다 앞에서 하나씩 꺼내 실패시킨다 (None = 정상 읽기)
    pub read_faults: VecDeque<Option<i32>>,
    /// seek 결과를 강제로 바꾼다
    pub seek_result: Option<io::Result<u64>>,
    pub read_calls: usize,
}

impl ScriptedFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            regular: true,
            read_faults: VecDeque::new(),
            seek_result: None,
            read_calls: 0,
        }
    }

    /// 0, 1, 2, ... 255, 0, ... 패턴의 파일
    pub fn patterned(size: usize) -> Self {
        Self::new((0..size).map(|i| (i % 251) as u8).collect())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl SourceFile for ScriptedFile {
    fn probe(&self) -> io::Result<SourceInfo> {
        Ok(SourceInfo {
            regular: self.regular,
            size: self.data.len() as u64,
        })
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<u64> {
        if let Some(result) = self.seek_result.take() {
            return result;
        }
        self.pos = offset as usize;
        Ok(offset)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_calls += 1;
        if let Some(Some(code)) = self.read_faults.pop_front() {
            return Err(io::Error::from_raw_os_error(code));
        }

        let start = self.pos.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n;
        Ok(n)
    }
}

/// 실제로 잠들지 않는 대기. 지정한 회차에 EINTR을 돌려준다.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPause {
    pub calls: usize,
    interrupt_on: Option<usize>,
}

impl ScriptedPause {
    pub fn interrupt_on(call: usize) -> Self {
        Self {
            calls: 0,
            interrupt_on: Some(call),
        }
    }
}

impl Pause for ScriptedPause {
    fn pause(&mut self, _quantum: Duration) -> io::Result<()> {
        self.calls += 1;
        if self.interrupt_on == Some(self.calls) {
            return Err(io::Error::from_raw_os_error(libc::EINTR));
        }
        Ok(())
    }
}
