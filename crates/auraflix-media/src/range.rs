//! `Range` header parsing and window resolution.
//!
//! Only a single `bytes` range is supported:
//! - `bytes=0-499`
//! - `bytes=500-`
//! - `bytes=-500` (last 500 bytes)
//!
//! Parsing is independent of the asset size; [`RangeSpec::resolve`] then
//! checks the parsed range against the size and clamps the end.

use crate::error::{Error, Result};

/// A syntactically valid byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=S-E`
    Bounded { start: u64, end: u64 },
    /// `bytes=S-`
    From { start: u64 },
    /// `bytes=-N`
    Suffix { len: u64 },
}

/// An inclusive byte window inside an asset of `total` bytes.
///
/// Always satisfies `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    start: u64,
    end: u64,
    total: u64,
}

impl RangeWindow {
    /// The whole asset, or `None` if it is empty.
    pub fn full(total: u64) -> Option<Self> {
        (total > 0).then(|| Self {
            start: 0,
            end: total - 1,
            total,
        })
    }

    /// First byte offset.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Size of the whole asset.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Windows are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Parse a `Range` header value.
pub fn parse_range_header(value: &str) -> Result<RangeSpec> {
    let value = value.trim();
    let (unit, set) = value
        .split_once('=')
        .ok_or_else(|| Error::malformed_range(value))?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(Error::malformed_range(value));
    }
    if set.contains(',') {
        return Err(Error::malformed_range(value));
    }

    let (start, end) = set
        .split_once('-')
        .ok_or_else(|| Error::malformed_range(value))?;
    let start = start.trim();
    let end = end.trim();

    let parse = |s: &str| -> Result<u64> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed_range(value));
        }
        s.parse().map_err(|_| Error::malformed_range(value))
    };

    match (start.is_empty(), end.is_empty()) {
        (true, true) => Err(Error::malformed_range(value)),
        (true, false) => Ok(RangeSpec::Suffix { len: parse(end)? }),
        (false, true) => Ok(RangeSpec::From {
            start: parse(start)?,
        }),
        (false, false) => {
            let start = parse(start)?;
            let end = parse(end)?;
            if start > end {
                return Err(Error::malformed_range(value));
            }
            Ok(RangeSpec::Bounded { start, end })
        }
    }
}

impl RangeSpec {
    /// Resolve against an asset of `size` bytes.
    ///
    /// Fails with [`Error::RangeNotSatisfiable`] when the range selects no
    /// bytes: a start at or past the end, a zero-length suffix, or any range
    /// over an empty asset.
    pub fn resolve(self, size: u64) -> Result<RangeWindow> {
        if size == 0 {
            return Err(Error::RangeNotSatisfiable { size });
        }
        let last = size - 1;
        let (start, end) = match self {
            RangeSpec::Bounded { start, end } => (start, end.min(last)),
            RangeSpec::From { start } => (start, last),
            RangeSpec::Suffix { len: 0 } => return Err(Error::RangeNotSatisfiable { size }),
            RangeSpec::Suffix { len } => (size.saturating_sub(len), last),
        };
        if start >= size {
            return Err(Error::RangeNotSatisfiable { size });
        }
        Ok(RangeWindow {
            start,
            end,
            total: size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn window(header: &str, size: u64) -> Result<(u64, u64)> {
        let w = parse_range_header(header)?.resolve(size)?;
        Ok((w.start(), w.end()))
    }

    #[test]
    fn parse_bounded() {
        assert_eq!(
            parse_range_header("bytes=0-499").unwrap(),
            RangeSpec::Bounded { start: 0, end: 499 }
        );
        assert_eq!(
            parse_range_header(" bytes = 10 - 20 ").unwrap(),
            RangeSpec::Bounded { start: 10, end: 20 }
        );
    }

    #[test]
    fn parse_open_and_suffix() {
        assert_eq!(
            parse_range_header("bytes=500-").unwrap(),
            RangeSpec::From { start: 500 }
        );
        assert_eq!(
            parse_range_header("bytes=-500").unwrap(),
            RangeSpec::Suffix { len: 500 }
        );
    }

    #[test]
    fn parse_malformed() {
        for header in [
            "",
            "bytes",
            "bytes=",
            "bytes=-",
            "bytes=abc-def",
            "bytes=1-abc",
            "bytes=+1-2",
            "bytes=10-5",
            "bytes=0-1,4-5",
            "items=0-10",
            "0-10",
            "bytes=99999999999999999999999-",
        ] {
            assert_matches!(
                parse_range_header(header),
                Err(Error::MalformedRange(_)),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn resolve_windows() {
        assert_eq!(window("bytes=0-", 100).unwrap(), (0, 99));
        assert_eq!(window("bytes=0-9", 100).unwrap(), (0, 9));
        assert_eq!(window("bytes=50-", 100).unwrap(), (50, 99));
        assert_eq!(window("bytes=-10", 100).unwrap(), (90, 99));
        assert_eq!(window("bytes=99-99", 100).unwrap(), (99, 99));
    }

    #[test]
    fn resolve_clamps_end_and_suffix() {
        assert_eq!(window("bytes=90-1000", 100).unwrap(), (90, 99));
        assert_eq!(window("bytes=-1000", 100).unwrap(), (0, 99));
    }

    #[test]
    fn resolve_unsatisfiable() {
        for (header, size) in [
            ("bytes=100-", 100),
            ("bytes=100-110", 100),
            ("bytes=-0", 100),
            ("bytes=0-", 0),
            ("bytes=-5", 0),
        ] {
            assert_matches!(
                window(header, size),
                Err(Error::RangeNotSatisfiable { size: s }) if s == size,
                "header {header:?} over {size} bytes"
            );
        }
    }

    #[test]
    fn window_metadata() {
        let w = parse_range_header("bytes=10-19")
            .unwrap()
            .resolve(50)
            .unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w.total(), 50);
        assert_eq!(w.content_range(), "bytes 10-19/50");

        let full = RangeWindow::full(50).unwrap();
        assert_eq!(full.len(), 50);
        assert_eq!(full.content_range(), "bytes 0-49/50");
        assert!(RangeWindow::full(0).is_none());
    }
}
