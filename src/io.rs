//! 파일/소켓 접근 경계
//!
//! 엔진은 디스크립터를 소유하지 않고 이 트레잇들을 통해서만 접근한다.

use std::fs::File;
use std::io::{self, IoSlice, Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;

use socket2::{SockRef, Socket, Type};

/// 소스 파일 fstat 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// 일반 파일 여부
    pub regular: bool,

    /// 파일 크기 (바이트)
    pub size: u64,
}

/// 대상 소켓 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Other,
}

/// 읽기 원본 (일반 파일)
pub trait SourceFile {
    fn probe(&self) -> io::Result<SourceInfo>;

    /// 읽기 위치를 `offset`으로 옮기고 실제 위치를 돌려준다
    fn seek_to(&mut self, offset: u64) -> io::Result<u64>;

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 전송 대상 (스트림 소켓)
pub trait StreamSocket {
    fn socket_kind(&self) -> io::Result<SocketKind>;

    /// 연결된 피어가 있는지
    fn has_peer(&self) -> io::Result<bool>;

    /// writev: 여러 슬라이스를 순서대로 한 번에 전송
    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;

    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl SourceFile for File {
    fn probe(&self) -> io::Result<SourceInfo> {
        let meta = self.metadata()?;
        Ok(SourceInfo {
            regular: meta.file_type().is_file(),
            size: meta.len(),
        })
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(offset))
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

fn peer_from<T>(result: io::Result<T>) -> io::Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
        Err(e) => Err(e),
    }
}

fn kind_of(ty: Type) -> SocketKind {
    if ty == Type::STREAM {
        SocketKind::Stream
    } else {
        SocketKind::Other
    }
}

impl StreamSocket for Socket {
    fn socket_kind(&self) -> io::Result<SocketKind> {
        self.r#type().map(kind_of)
    }

    fn has_peer(&self) -> io::Result<bool> {
        peer_from(self.peer_addr())
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Socket::send_vectored(self, bufs)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        Socket::send(self, buf)
    }
}

impl StreamSocket for SockRef<'_> {
    fn socket_kind(&self) -> io::Result<SocketKind> {
        self.r#type().map(kind_of)
    }

    fn has_peer(&self) -> io::Result<bool> {
        peer_from(self.peer_addr())
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Socket::send_vectored(self, bufs)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        Socket::send(self, buf)
    }
}

impl StreamSocket for TcpStream {
    fn socket_kind(&self) -> io::Result<SocketKind> {
        Ok(SocketKind::Stream)
    }

    fn has_peer(&self) -> io::Result<bool> {
        peer_from(self.peer_addr())
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Write::write_vectored(self, bufs)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }
}

impl StreamSocket for UnixStream {
    fn socket_kind(&self) -> io::Result<SocketKind> {
        Ok(SocketKind::Stream)
    }

    fn has_peer(&self) -> io::Result<bool> {
        peer_from(self.peer_addr())
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Write::write_vectored(self, bufs)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }
}
