//! Archive decoder
//!
//! [`Decoder`] is a single-pass, line-driven state machine. Feed it one line at
//! a time (terminator included) and it hands back each record as soon as the
//! record is closed, so an archive never has to be held in memory as a whole.
//! Orphaned or out-of-context lines are ignored.

use std::collections::HashMap;

use base64::Engine;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{
    is_marker_line, strip_terminator, BodyEncoding, Record, RelativePath, ENCODING_TAG, FILE_TAG,
    HASH_TAG,
};

/// A path and the digest its header promised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub path: RelativePath,
    pub expected: String,
}

/// A record whose body could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("corrupt body for {path}: {reason}")]
pub struct CorruptRecord {
    pub path: RelativePath,
    pub reason: String,
}

/// What the decoder collected besides the records themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Number of file-name header lines accepted
    pub discovered: usize,
    /// Verification queue, in stream order
    pub expectations: Vec<Expectation>,
    /// Header paths refused because they could escape the destination
    pub rejected: Vec<String>,
}

#[derive(Debug, Default)]
struct Header {
    path: Option<RelativePath>,
    digest: Option<String>,
    encoding: Option<BodyEncoding>,
}

#[derive(Debug)]
struct Body {
    path: RelativePath,
    digest: Option<String>,
    encoding: BodyEncoding,
    buffer: String,
    started: bool,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    OutsideHeader,
    InsideHeader(Header),
    InsideBody(Body),
}

/// Streaming archive decoder
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    summary: DecodeSummary,
    /// Slot of each path in `summary.expectations`
    queued: HashMap<RelativePath, usize>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, including its terminator.
    ///
    /// Returns a finished record when `line` is the marker that closes one.
    pub fn feed_line(&mut self, line: &str) -> Option<Result<Record, CorruptRecord>> {
        if is_marker_line(line) {
            return self.on_marker();
        }

        match &mut self.state {
            State::OutsideHeader => {}
            State::InsideHeader(header) => {
                Self::on_header_line(&mut self.summary, &mut self.queued, header, line)
            }
            State::InsideBody(body) => body.push_line(line),
        }
        None
    }

    /// Finish the stream, flushing a record still being accumulated
    pub fn finish(mut self) -> (Option<Result<Record, CorruptRecord>>, DecodeSummary) {
        let pending = match std::mem::take(&mut self.state) {
            State::InsideBody(body) => Some(body.into_record(false)),
            State::InsideHeader(Header { path: Some(path), .. }) => {
                warn!(path = %path, "archive ended inside a header");
                None
            }
            _ => None,
        };
        (pending, self.summary)
    }

    /// Decode a whole archive held in memory
    pub fn decode(input: &str) -> (Vec<Result<Record, CorruptRecord>>, DecodeSummary) {
        let mut decoder = Self::new();
        let mut records = Vec::new();

        for line in input.split_inclusive('\n') {
            records.extend(decoder.feed_line(line));
        }

        let (last, summary) = decoder.finish();
        records.extend(last);
        (records, summary)
    }

    fn on_marker(&mut self) -> Option<Result<Record, CorruptRecord>> {
        match std::mem::take(&mut self.state) {
            State::OutsideHeader => {
                debug!("header opened");
                self.state = State::InsideHeader(Header::default());
                None
            }
            State::InsideHeader(header) => {
                match header.path {
                    Some(path) => {
                        debug!(path = %path, "header closed");
                        self.state = State::InsideBody(Body {
                            path,
                            digest: header.digest,
                            encoding: header.encoding.unwrap_or(BodyEncoding::Text),
                            buffer: String::new(),
                            started: false,
                        });
                    }
                    None => debug!("header closed without a file name"),
                }
                None
            }
            State::InsideBody(body) => {
                // Closes this record and opens the next header
                self.state = State::InsideHeader(Header::default());
                Some(body.into_record(true))
            }
        }
    }

    fn on_header_line(
        summary: &mut DecodeSummary,
        queued: &mut HashMap<RelativePath, usize>,
        header: &mut Header,
        line: &str,
    ) {
        let line = strip_terminator(line);

        if let Some(raw) = line.strip_prefix(FILE_TAG) {
            match RelativePath::parse(raw) {
                Ok(path) => {
                    info!(path = %path, "found");
                    summary.discovered += 1;
                    header.path = Some(path);
                }
                Err(e) => {
                    warn!(path = raw.trim(), error = %e, "rejected unsafe path");
                    summary.rejected.push(raw.trim().to_string());
                    header.path = None;
                }
            }
            header.digest = None;
        } else if let Some(raw) = line.strip_prefix(HASH_TAG) {
            let Some(path) = header.path.clone() else {
                return;
            };
            let expected = raw.trim().to_string();
            header.digest = Some(expected.clone());
            Self::expect(summary, queued, path, expected);
        } else if let Some(raw) = line.strip_prefix(ENCODING_TAG) {
            match BodyEncoding::parse(raw) {
                Some(encoding) => header.encoding = Some(encoding),
                None => warn!(encoding = raw.trim(), "unknown body encoding, reading as text"),
            }
        }
    }

    /// Queue a verification; a repeated path keeps its slot and takes the new digest
    fn expect(
        summary: &mut DecodeSummary,
        queued: &mut HashMap<RelativePath, usize>,
        path: RelativePath,
        expected: String,
    ) {
        if let Some(&slot) = queued.get(&path) {
            summary.expectations[slot].expected = expected;
            return;
        }
        queued.insert(path.clone(), summary.expectations.len());
        summary.expectations.push(Expectation { path, expected });
    }
}

impl Body {
    fn push_line(&mut self, line: &str) {
        // The blank line after the closing header marker is structural
        if !self.started {
            self.started = true;
            if strip_terminator(line).is_empty() {
                return;
            }
        }
        self.buffer.push_str(line);
    }

    /// Build the record. `closed_by_marker` strips the separator newline that
    /// precedes the next record's marker.
    fn into_record(self, closed_by_marker: bool) -> Result<Record, CorruptRecord> {
        let mut text = self.buffer;
        if closed_by_marker && text.ends_with('\n') {
            text.pop();
        }

        let content = match self.encoding {
            BodyEncoding::Text => text.into_bytes(),
            BodyEncoding::Base64 => {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| CorruptRecord {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?
            }
        };

        Ok(Record {
            path: self.path,
            digest: self.digest,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MARKER;
    use crate::encoder::Encoder;
    use crate::hash::Digest;

    fn rel(path: &str) -> RelativePath {
        RelativePath::parse(path).unwrap()
    }

    fn ok_records(input: &str) -> Vec<Record> {
        let (records, _) = Decoder::decode(input);
        records.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_decode_single_record_at_end_of_stream() {
        let input = format!("\n{MARKER}\n// 文件: app.json\n// SHA256: abc\n{MARKER}\n\n{{}}");
        let records = ok_records(&input);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, rel("app.json"));
        assert_eq!(records[0].digest.as_deref(), Some("abc"));
        assert_eq!(records[0].content, b"{}");
    }

    #[test]
    fn test_decode_multiple_records_exact_bytes() {
        let input = format!(
            "\n{MARKER}\n// 文件: a.js\n// SHA256: 1\n{MARKER}\n\nline one\nline two\n\
             \n{MARKER}\n// 文件: b.js\n// SHA256: 2\n{MARKER}\n\nno newline\
             \n{MARKER}\n// 文件: c.js\n// SHA256: 3\n{MARKER}\n\n\nleading blank\n"
        );
        let records = ok_records(&input);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].content, b"line one\nline two\n");
        assert_eq!(records[1].content, b"no newline");
        assert_eq!(records[2].content, b"\nleading blank\n");
    }

    #[test]
    fn test_decode_empty_bodies() {
        let records = [
            Record::new(rel("empty.js"), Digest::of(b"").to_hex(), ""),
            Record::new(rel("last.js"), Digest::of(b"").to_hex(), ""),
        ];
        let decoded = ok_records(&Encoder::new().encode(&records));
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_decode_preserves_crlf() {
        let record = Record::new(rel("win.txt"), "d", "a\r\nb\r\n");
        let decoded = ok_records(&Encoder::new().encode(&[record.clone(), record.clone()]));
        assert_eq!(decoded[0].content, b"a\r\nb\r\n");
        assert_eq!(decoded[1].content, b"a\r\nb\r\n");
    }

    #[test]
    fn test_decode_queues_expectations_in_order() {
        let input = format!(
            "\n{MARKER}\n// 文件: a.js\n// SHA256: aaa\n{MARKER}\n\nA\
             \n{MARKER}\n// 文件: b.js\n// SHA256: bbb\n{MARKER}\n\nB"
        );
        let (_, summary) = Decoder::decode(&input);

        assert_eq!(summary.discovered, 2);
        assert_eq!(
            summary.expectations,
            vec![
                Expectation { path: rel("a.js"), expected: "aaa".into() },
                Expectation { path: rel("b.js"), expected: "bbb".into() },
            ]
        );
    }

    #[test]
    fn test_decode_ignores_orphan_lines() {
        let input = format!(
            "preamble text\n// SHA256: orphan\n\
             \n{MARKER}\n// SHA256: before-name\n// 文件: a.js\n{MARKER}\n\nA"
        );
        let (records, summary) = Decoder::decode(&input);

        assert_eq!(records.len(), 1);
        assert!(summary.expectations.is_empty());
        let record = records.into_iter().next().unwrap().unwrap();
        assert_eq!(record.digest, None);
        assert_eq!(record.content, b"A");
    }

    #[test]
    fn test_decode_header_without_name_drops_body() {
        let input = format!(
            "\n{MARKER}\n// SHA256: x\n{MARKER}\n\nstray body\n\
             \n{MARKER}\n// 文件: a.js\n// SHA256: y\n{MARKER}\n\nA"
        );
        let records = ok_records(&input);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, rel("a.js"));
    }

    #[test]
    fn test_decode_rejects_traversal() {
        let input = format!(
            "\n{MARKER}\n// 文件: ../evil.sh\n// SHA256: x\n{MARKER}\n\nrm -rf /\n\
             \n{MARKER}\n// 文件: ok.js\n// SHA256: y\n{MARKER}\n\nfine"
        );
        let (records, summary) = Decoder::decode(&input);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().path, rel("ok.js"));
        assert_eq!(summary.rejected, vec!["../evil.sh".to_string()]);
        assert_eq!(summary.expectations.len(), 1);
        assert_eq!(summary.discovered, 1);
    }

    #[test]
    fn test_decode_duplicate_paths_keep_last_digest() {
        let input = format!(
            "\n{MARKER}\n// 文件: a.js\n// SHA256: first\n{MARKER}\n\n1\
             \n{MARKER}\n// 文件: b.js\n// SHA256: other\n{MARKER}\n\n2\
             \n{MARKER}\n// 文件: a.js\n// SHA256: second\n{MARKER}\n\n3"
        );
        let (records, summary) = Decoder::decode(&input);

        assert_eq!(records.len(), 3);
        assert_eq!(summary.expectations.len(), 2);
        assert_eq!(summary.expectations[0].path, rel("a.js"));
        assert_eq!(summary.expectations[0].expected, "second");
    }

    #[test]
    fn test_decode_many_records_with_repeats() {
        let mut input = String::new();
        for round in 0..3 {
            for i in 0..2000 {
                input.push_str(&format!(
                    "\n{MARKER}\n// 文件: f{i}.js\n// SHA256: r{round}\n{MARKER}\n\n{i}"
                ));
            }
        }
        let (records, summary) = Decoder::decode(&input);

        assert_eq!(records.len(), 6000);
        assert_eq!(summary.discovered, 6000);
        assert_eq!(summary.expectations.len(), 2000);
        assert_eq!(summary.expectations[1999].path, rel("f1999.js"));
        assert!(summary.expectations.iter().all(|e| e.expected == "r2"));
    }

    #[test]
    fn test_decode_unterminated_header() {
        let input = format!("\n{MARKER}\n// 文件: a.js\n// SHA256: x\n");
        let (records, summary) = Decoder::decode(&input);

        assert!(records.is_empty());
        assert_eq!(summary.expectations.len(), 1);
    }

    #[test]
    fn test_decode_base64_body() {
        let content = format!("# Format\n{MARKER}\nexample\n");
        let digest = Digest::of(content.as_bytes()).to_hex();
        let record = Record::new(rel("README.md"), digest, content.clone());
        let encoded = Encoder::new().encode(&[record.clone(), record.clone()]);

        let decoded = ok_records(&encoded);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].content, content.as_bytes());
        assert_eq!(decoded[1].content, content.as_bytes());
    }

    #[test]
    fn test_decode_corrupt_base64() {
        let input = format!(
            "\n{MARKER}\n// 文件: bad.bin\n// SHA256: x\n// 编码: base64\n{MARKER}\n\n\
             !!!not base64!!!"
        );
        let (records, summary) = Decoder::decode(&input);

        assert_eq!(records.len(), 1);
        let err = records.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.path, rel("bad.bin"));
        assert_eq!(summary.expectations.len(), 1);
    }

    #[test]
    fn test_decode_unescaped_marker_splits_record() {
        // Without escaping, a marker inside content is read as a boundary
        let content = format!("top\n{MARKER}\nbottom");
        let record = Record::new(rel("doc.md"), "d", content);
        let encoded = Encoder::new().with_marker_escaping(false).encode(&[record]);

        let records = ok_records(&encoded);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, b"top");
    }

    #[test]
    fn test_feed_line_returns_record_on_next_marker() {
        let mut decoder = Decoder::new();
        let header = ["\n", MARKER, "// 文件: a.js\n", "// SHA256: x\n", MARKER];
        for line in header.into_iter().chain(["\n", "body\n", "\n"]) {
            assert!(decoder.feed_line(line).is_none());
        }
        let record = decoder.feed_line(MARKER).unwrap().unwrap();
        assert_eq!(record.content, b"body\n");

        let (pending, _) = decoder.finish();
        assert!(pending.is_none());
    }
}
