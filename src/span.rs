//! 헤더/트레일러 스팬 정의와 검증
//!
//! - Span: 전송할 연속 메모리 영역 하나 (포인터, 길이)
//! - SpanSet: 검증을 통과한 스팬 목록 (전송 순서 = 목록 순서)

use crate::{Error, Result};

/// 전송할 메모리 영역 하나
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    cursor: Option<&'a [u8]>,
    length: i64,
}

impl<'a> Span<'a> {
    /// 슬라이스 전체를 가리키는 스팬
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Some(bytes),
            length: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
        }
    }

    /// 길이를 명시한 스팬. 길이가 영역을 넘으면 검증에서 주소 에러
    pub fn with_length(bytes: &'a [u8], length: i64) -> Self {
        Self {
            cursor: Some(bytes),
            length,
        }
    }

    /// 커서가 없는 스팬 (널 포인터)
    pub fn null(length: i64) -> Self {
        Self {
            cursor: None,
            length,
        }
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    fn region(&self) -> Result<&'a [u8]> {
        let bytes = self.cursor.ok_or(Error::InvalidAddress)?;
        if self.length <= 0 {
            return Err(Error::InvalidArgument);
        }
        let len = usize::try_from(self.length).map_err(|_| Error::InvalidAddress)?;
        bytes.get(..len).ok_or(Error::InvalidAddress)
    }
}

impl<'a> From<&'a [u8]> for Span<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Span::new(bytes)
    }
}

/// 검증된 스팬 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanSet<'a> {
    regions: Vec<&'a [u8]>,
    total: i64,
}

impl<'a> SpanSet<'a> {
    /// 영역 목록 (전송 순서)
    pub fn regions(&self) -> &[&'a [u8]] {
        &self.regions
    }

    /// 총 바이트 수
    pub fn total(&self) -> u64 {
        self.total as u64
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// 스팬 목록 검증 및 총 크기 계산
///
/// 빈 목록, 0 이하 길이, 합계 오버플로우는 `InvalidArgument`,
/// 커서 없음이나 영역을 넘는 길이는 `InvalidAddress`. 앞쪽 스팬의 에러가 우선한다.
pub fn validate<'a>(spans: &[Span<'a>]) -> Result<SpanSet<'a>> {
    if spans.is_empty() {
        return Err(Error::InvalidArgument);
    }

    let mut total: i64 = 0;
    let mut regions = Vec::with_capacity(spans.len());

    for span in spans {
        let region = span.region()?;
        total = total
            .checked_add(span.length)
            .ok_or(Error::InvalidArgument)?;
        regions.push(region);
    }

    Ok(SpanSet { regions, total })
}

/// 헤더와 트레일러 (빈 슬라이스 = 없음)
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTrailer<'s, 'a> {
    pub headers: &'s [Span<'a>],
    pub trailers: &'s [Span<'a>],
}

impl<'s, 'a> HeaderTrailer<'s, 'a> {
    pub fn new(headers: &'s [Span<'a>], trailers: &'s [Span<'a>]) -> Self {
        Self { headers, trailers }
    }

    pub fn headers(headers: &'s [Span<'a>]) -> Self {
        Self {
            headers,
            trailers: &[],
        }
    }

    pub fn trailers(trailers: &'s [Span<'a>]) -> Self {
        Self {
            headers: &[],
            trailers,
        }
    }
}

/// 있으면 검증, 없으면 None
pub(crate) fn validate_optional<'a>(spans: &[Span<'a>]) -> Result<Option<SpanSet<'a>>> {
    if spans.is_empty() {
        Ok(None)
    } else {
        validate(spans).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_of_valid_set() {
        let a = [1u8; 7];
        let b = [2u8; 13];
        let set = validate(&[Span::new(&a), Span::new(&b)]).unwrap();

        assert_eq!(set.total(), 20);
        assert_eq!(set.len(), 2);
        assert_eq!(set.regions()[1], &b[..]);
    }

    #[test]
    fn test_declared_length_trims_region() {
        let data = b"headerJUNK";
        let set = validate(&[Span::with_length(data, 6)]).unwrap();
        assert_eq!(set.regions(), &[&b"header"[..]]);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert_eq!(validate(&[]), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_null_cursor_is_address_fault() {
        let a = [0u8; 4];
        assert_eq!(
            validate(&[Span::new(&a), Span::null(4)]),
            Err(Error::InvalidAddress)
        );
    }

    #[test]
    fn test_non_positive_length_rejected() {
        let a = [0u8; 4];
        assert_eq!(validate(&[Span::new(&[])]), Err(Error::InvalidArgument));
        assert_eq!(
            validate(&[Span::with_length(&a, -1)]),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_length_past_region_is_address_fault() {
        let a = [0u8; 4];
        assert_eq!(validate(&[Span::with_length(&a, 5)]), Err(Error::InvalidAddress));
    }

    #[test]
    fn test_first_bad_span_decides() {
        assert_eq!(
            validate(&[Span::null(0), Span::new(&[])]),
            Err(Error::InvalidAddress)
        );
        assert_eq!(
            validate(&[Span::new(&[]), Span::null(1)]),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_optional_empty_is_none() {
        assert_eq!(validate_optional(&[]), Ok(None));
    }
}
