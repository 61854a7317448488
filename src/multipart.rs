//! `multipart/form-data` body encoding.
//!
//! [`MultipartFormData`] collects named parts in order and encodes them either
//! into one buffer ([`build`](MultipartFormData::build)) or as a lazy sequence
//! of segments ([`build_stream`](MultipartFormData::build_stream)). Both
//! encodings produce identical bytes for identical parts and boundary.
//!
//! The boundary must not occur inside any part's payload. This is not checked.
//!
//! Duplicate part names are allowed and kept in order, as with HTML forms.
//!
//! # Examples
//!
//! ```
//! use fetchwire::multipart::{MultipartFormData, Part};
//!
//! let mut form = MultipartFormData::with_boundary("B");
//! form.append_field("name", "alice");
//! form.append(Part::new("file", "hi").file_name("hello.txt").mime_type("text/plain"));
//!
//! let encoded = form.build();
//! assert_eq!(encoded.content_type, "multipart/form-data; boundary=B");
//! assert!(encoded.body.ends_with(b"--B--\r\n"));
//! ```

use crate::request::ByteStream;
use bytes::{BufMut, Bytes, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

const CRLF: &[u8] = b"\r\n";

/// One named part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl Part {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            mime_type: None,
            data: data.into(),
        }
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// The boundary line and part headers, up to and including the blank line.
    fn header_bytes(&self, boundary: &str) -> Bytes {
        let mut header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"",
            boundary,
            escape_quoted(&self.name)
        );
        if let Some(file_name) = &self.file_name {
            header.push_str(&format!("; filename=\"{}\"", escape_quoted(file_name)));
        }
        header.push_str("\r\n");
        if let Some(mime_type) = &self.mime_type {
            header.push_str(&format!("Content-Type: {}\r\n", escape_line_breaks(mime_type)));
        }
        header.push_str("\r\n");
        Bytes::from(header)
    }
}

/// A buffered multipart body and its `Content-Type` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMultipart {
    pub content_type: String,
    pub body: Bytes,
}

/// Builder for a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartFormData {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartFormData {
    /// Creates an empty form with a random boundary.
    pub fn new() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::with_boundary(format!("fetchwire-{}", token))
    }

    /// Creates an empty form with a caller-chosen boundary.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Appends a part.
    pub fn append(&mut self, part: Part) -> &mut Self {
        self.parts.push(part);
        self
    }

    /// Appends a plain text field.
    pub fn append_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.append(Part::new(name, value.into()))
    }

    /// Appends a file part.
    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> &mut Self {
        self.append(Part::new(name, data).file_name(file_name).mime_type(mime_type))
    }

    /// The `Content-Type` header value for this form.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encodes the whole body into one buffer.
    ///
    /// Calling this repeatedly on an unchanged form yields identical bytes.
    pub fn build(&self) -> EncodedMultipart {
        let mut body = BytesMut::with_capacity(self.segments_len() as usize);
        for segment in self.build_stream() {
            body.put(segment);
        }
        EncodedMultipart {
            content_type: self.content_type(),
            body: body.freeze(),
        }
    }

    /// Encodes the body lazily, one segment at a time.
    pub fn build_stream(&self) -> MultipartStream {
        MultipartStream {
            content_type: self.content_type(),
            content_length: self.segments_len(),
            boundary: self.boundary.clone(),
            parts: self.parts.clone().into_iter(),
            pending: None,
            closed: false,
        }
    }

    fn segments_len(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|part| {
                part.header_bytes(&self.boundary).len() as u64
                    + part.data.len() as u64
                    + CRLF.len() as u64
            })
            .sum();
        parts + closing_boundary(&self.boundary).len() as u64
    }
}

impl Default for MultipartFormData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum Pending {
    Payload(Bytes),
    Trailer,
}

/// A forward-only producer of multipart body segments.
///
/// Yields, per part, the header block, the payload and a trailing CRLF, then
/// the closing boundary. At most one segment is materialized at a time. The
/// producer cannot be restarted once consumed; build a new one from the form.
#[derive(Debug)]
pub struct MultipartStream {
    content_type: String,
    content_length: u64,
    boundary: String,
    parts: std::vec::IntoIter<Part>,
    pending: Option<Pending>,
    closed: bool,
}

impl MultipartStream {
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The exact number of bytes the producer yields in total.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Adapts the producer into an async body stream.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(futures::stream::iter(self.map(Ok::<_, std::io::Error>)))
    }
}

impl Iterator for MultipartStream {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        match self.pending.take() {
            Some(Pending::Payload(data)) => {
                self.pending = Some(Pending::Trailer);
                return Some(data);
            }
            Some(Pending::Trailer) => return Some(Bytes::from_static(CRLF)),
            None => {}
        }

        if let Some(part) = self.parts.next() {
            let header = part.header_bytes(&self.boundary);
            self.pending = Some(Pending::Payload(part.data));
            return Some(header);
        }

        if self.closed {
            None
        } else {
            self.closed = true;
            Some(closing_boundary(&self.boundary))
        }
    }
}

fn closing_boundary(boundary: &str) -> Bytes {
    Bytes::from(format!("--{}--\r\n", boundary))
}

/// Percent-escapes the characters that would break a quoted disposition value.
fn escape_quoted(value: &str) -> String {
    escape_line_breaks(&value.replace('"', "%22"))
}

/// Percent-escapes CR and LF so a value stays on its header line.
fn escape_line_breaks(value: &str) -> String {
    value.replace('\r', "%0D").replace('\n', "%0A")
}
