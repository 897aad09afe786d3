//! Incremental decoding of readings payloads.
//!
//! The header is read up front; the `readings` array is decoded one element
//! per `next()` call. Nothing is retained once an element has been yielded.

use std::io::BufRead;

use serde_json::Value;

use crate::domain::{Header, Reading, Readings};
use crate::error::DcsError;
use crate::io::decode::decode_reading;
use crate::io::scanner::Scanner;

pub(crate) fn decode_stream<R: BufRead + Send + 'static>(
    reader: R,
) -> Result<(Header, Readings), DcsError> {
    let mut scanner = Scanner::new(reader);
    let (header, has_array) = read_header(&mut scanner)?;
    if !has_array {
        return Ok((header, Readings::empty()));
    }

    let stream = StreamedReadings {
        scanner,
        first: true,
        done: false,
        count: 0,
    };
    Ok((header, Readings::Streamed(Box::new(stream))))
}

/// Read header fields until the `readings` array opens.
///
/// Returns whether an array is waiting to be read.
fn read_header<R: BufRead>(scanner: &mut Scanner<R>) -> Result<(Header, bool), DcsError> {
    let mut header = Header::new();
    scanner.expect(b'{')?;

    if scanner.peek_non_ws()? == Some(b'}') {
        scanner.skip_peeked();
        return Ok((header, false));
    }

    loop {
        let key = scanner.read_string()?;
        scanner.expect(b':')?;

        if key == "readings" {
            match scanner.peek_non_ws()? {
                Some(b'[') => {
                    scanner.skip_peeked();
                    return Ok((header, true));
                }
                _ => {
                    let raw = scanner.capture_value()?;
                    if raw != b"null" {
                        return Err(DcsError::Decode(format!(
                            "`readings` must be an array, found {}",
                            String::from_utf8_lossy(&raw)
                        )));
                    }
                    return Ok((header, false));
                }
            }
        } else {
            let raw = scanner.capture_value()?;
            let value: Value = serde_json::from_slice(&raw)
                .map_err(|e| DcsError::Decode(format!("invalid header field '{key}': {e}")))?;
            header.insert(key, value);
        }

        match scanner.peek_non_ws()? {
            Some(b',') => scanner.skip_peeked(),
            Some(b'}') => {
                scanner.skip_peeked();
                return Ok((header, false));
            }
            Some(b) => return Err(scanner.unexpected(b, "',' or '}'")),
            None => {
                return Err(DcsError::Decode(format!(
                    "unexpected end of payload at byte {}",
                    scanner.offset()
                )));
            }
        }
    }
}

struct StreamedReadings<R> {
    scanner: Scanner<R>,
    first: bool,
    done: bool,
    count: usize,
}

impl<R: BufRead> StreamedReadings<R> {
    fn pull(&mut self) -> Result<Option<Reading>, DcsError> {
        let next = self.scanner.peek_non_ws()?;
        match (self.first, next) {
            (_, Some(b']')) => {
                self.scanner.skip_peeked();
                return Ok(None);
            }
            (true, Some(_)) => self.first = false,
            (false, Some(b',')) => self.scanner.skip_peeked(),
            (false, Some(b)) => return Err(self.scanner.unexpected(b, "',' or ']'")),
            (_, None) => {
                return Err(DcsError::Decode(format!(
                    "readings array not terminated at byte {}",
                    self.scanner.offset()
                )));
            }
        }

        let raw = self.scanner.capture_value()?;
        decode_reading(&raw).map(Some)
    }
}

impl<R: BufRead> Iterator for StreamedReadings<R> {
    type Item = Result<Reading, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pull() {
            Ok(Some(reading)) => {
                self.count += 1;
                Some(Ok(reading))
            }
            Ok(None) => {
                self.done = true;
                log::debug!("All {} readings streamed", self.count);
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    use crate::domain::DecodeMode;
    use crate::io::decode::decode;
    use crate::io::raw::RawResponse;

    const BODY: &str = r#"{"id":"R839","startTime":"2022-01-01T00:00:00Z","readings":[
        {"timestamp":"2022-01-01T00:00:00Z","value":1.0,"status":0},
        {"timestamp":"2022-01-02T00:00:00Z","value":Infinity},
        {"timestamp":"2022-01-03T00:00:00Z","value":-Infinity}
    ],"after":1}"#;

    /// Serves `data`, then fails like a dropped connection.
    struct DroppingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for DroppingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            Ok(n)
        }
    }

    #[test]
    fn header_and_readings_match_eager_decode() {
        let (h1, r1) =
            decode_stream(BufReader::new(Cursor::new(BODY.as_bytes().to_vec()))).unwrap();
        assert!(r1.is_streamed());
        let raw = RawResponse::new(200, Cursor::new(BODY.as_bytes().to_vec()));
        let (h2, r2) = decode(raw, DecodeMode::Eager).unwrap();

        assert_eq!(h1, h2);
        assert_eq!(r1.collect_all().unwrap(), r2.collect_all().unwrap());
    }

    #[test]
    fn readings_are_pulled_lazily_and_errors_surface_on_pull() {
        let partial = r#"{"id":"R1","readings":[{"timestamp":"2022-01-01T00:00:00Z","value":1},{"timestamp":"2022-01-02T00:00:00Z","value":2},"#;
        let reader = BufReader::new(DroppingReader {
            data: Cursor::new(partial.as_bytes().to_vec()),
        });

        let (header, readings) = decode_stream(reader).unwrap();
        assert_eq!(header.get("id"), Some(&Value::from("R1")));

        let mut stream = readings.into_stream();
        assert_eq!(stream.next().unwrap().unwrap().value, 1.0);
        assert_eq!(stream.next().unwrap().unwrap().value, 2.0);
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, DcsError::Request { status: None, .. }));
        assert!(stream.next().is_none());
    }

    #[test]
    fn malformed_element_stops_the_stream() {
        let body = r#"{"readings":[{"timestamp":"2022-01-01T00:00:00Z","value":1},{"timestamp":"bad","value":2},{"timestamp":"2022-01-03T00:00:00Z","value":3}]}"#;
        let (_, readings) = decode_stream(Cursor::new(body.as_bytes().to_vec())).unwrap();
        let items: Vec<_> = readings.into_iter().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(DcsError::Decode(_))));
    }

    #[test]
    fn empty_and_null_readings() {
        let (_, r) = decode_stream(Cursor::new(b"{\"readings\":[]}".to_vec())).unwrap();
        assert!(r.collect_all().unwrap().is_empty());
        let (h, r) = decode_stream(Cursor::new(b"{\"readings\":null,\"id\":\"R2\"}".to_vec())).unwrap();
        assert!(r.collect_all().unwrap().is_empty());
        assert!(h.get("id").is_none(), "fields after readings are not read");
        let (_, r) = decode_stream(Cursor::new(b"{}".to_vec())).unwrap();
        assert!(!r.is_streamed());
    }

    #[test]
    fn gzip_stream_through_decode() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(BODY.as_bytes()).unwrap();
        let raw = RawResponse::new(200, Cursor::new(enc.finish().unwrap()))
            .with_header("Content-Encoding", "gzip");

        let (_, readings) = decode(raw, DecodeMode::Streaming).unwrap();
        let readings = readings.collect_all().unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[1].value, f64::INFINITY);
    }
}
