//! Archive encoder

use std::io::Write;

use base64::Engine;

use crate::archive::{
    BodyEncoding, Record, BASE64_ENCODING, BASE64_LINE_WIDTH, ENCODING_TAG, FILE_TAG, HASH_TAG,
    MARKER,
};

/// Renders records into the archive text format
#[derive(Debug, Clone)]
pub struct Encoder {
    escape_markers: bool,
}

impl Encoder {
    /// Create a new encoder with marker escaping enabled
    pub fn new() -> Self {
        Self { escape_markers: true }
    }

    /// Enable or disable base64 escaping of bodies that contain the marker line.
    ///
    /// With escaping disabled the output is byte-compatible with readers that
    /// do not know the encoding header, but such bodies cannot be read back.
    pub fn with_marker_escaping(mut self, enabled: bool) -> Self {
        self.escape_markers = enabled;
        self
    }

    /// The body encoding this encoder will use for `content`
    pub fn body_encoding(&self, content: &[u8]) -> BodyEncoding {
        BodyEncoding::detect(content, self.escape_markers)
    }

    /// Encode records into one archive string
    pub fn encode(&self, records: &[Record]) -> String {
        let mut output = String::new();
        for record in records {
            self.encode_record_into(&mut output, record);
        }
        output
    }

    /// Encode a single record block
    pub fn encode_record(&self, record: &Record) -> String {
        let mut output = String::new();
        self.encode_record_into(&mut output, record);
        output
    }

    fn encode_record_into(&self, output: &mut String, record: &Record) {
        let encoding = self.body_encoding(&record.content);

        // Header
        output.push('\n');
        output.push_str(MARKER);
        output.push('\n');
        output.push_str(FILE_TAG);
        output.push_str(record.path.as_str());
        output.push('\n');
        if let Some(digest) = &record.digest {
            output.push_str(HASH_TAG);
            output.push_str(digest);
            output.push('\n');
        }
        if encoding == BodyEncoding::Base64 {
            output.push_str(ENCODING_TAG);
            output.push_str(BASE64_ENCODING);
            output.push('\n');
        }
        output.push_str(MARKER);
        output.push('\n');
        output.push('\n');

        // Body
        match encoding {
            BodyEncoding::Text => output.push_str(&String::from_utf8_lossy(&record.content)),
            BodyEncoding::Base64 => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&record.content);
                // The alphabet is ASCII, so byte offsets are char boundaries
                for (i, chunk) in encoded.as_bytes().chunks(BASE64_LINE_WIDTH).enumerate() {
                    if i > 0 {
                        output.push('\n');
                    }
                    output.push_str(&String::from_utf8_lossy(chunk));
                }
            }
        }
    }

    /// Append one record to `writer` with a single write, then flush
    pub fn encode_to_writer<W: Write>(
        &self,
        record: &Record,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let encoded = self.encode_record(record);
        writer.write_all(encoded.as_bytes())?;
        writer.flush()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
