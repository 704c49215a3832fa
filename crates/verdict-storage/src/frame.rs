//! Record framing shared by the feedback log and the audit chain.
//!
//! ```text
//! +------+---------+------+-------------+-----------+
//! | "VF" | version | kind | len (u32le) | JSON body |
//! +------+---------+------+-------------+-----------+
//! ```

use std::io::{self, Read};

use verdict_core::constants::MAX_FRAME_BODY_BYTES;
use verdict_core::errors::StoreError;

pub const MAGIC: [u8; 2] = *b"VF";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;

/// What a frame's body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Feedback = 1,
    Audit = 2,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Feedback),
            2 => Some(Self::Audit),
            _ => None,
        }
    }
}

/// Encode one frame. The result is written with a single `write_all`.
pub fn encode(kind: FrameKind, body: &[u8]) -> Result<Vec<u8>, StoreError> {
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_BODY_BYTES)
        .ok_or_else(|| StoreError::Io {
            path: String::new(),
            message: format!("frame body of {} bytes exceeds limit", body.len()),
        })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(FORMAT_VERSION);
    buf.push(kind as u8);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// One decoded frame and its position in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub kind: FrameKind,
    pub offset: u64,
    pub body: Vec<u8>,
}

/// Outcome of reading at one offset.
#[derive(Debug)]
pub enum FrameRead {
    Frame(RawFrame),
    /// Clean end of file on a frame boundary.
    End,
    /// Bytes at `offset` do not form a complete, valid frame.
    Torn { offset: u64, details: String },
}

/// Sequential frame reader over any byte source.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Offset of the next unread frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn next_frame(&mut self) -> io::Result<FrameRead> {
        let offset = self.offset;
        let mut header = [0u8; HEADER_LEN];
        let got = read_up_to(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(FrameRead::End);
        }
        if got < HEADER_LEN {
            return Ok(torn(offset, format!("header truncated after {got} bytes")));
        }
        if header[0..2] != MAGIC {
            return Ok(torn(offset, "bad magic".to_string()));
        }
        if header[2] != FORMAT_VERSION {
            return Ok(torn(offset, format!("unsupported format version {}", header[2])));
        }
        let Some(kind) = FrameKind::from_byte(header[3]) else {
            return Ok(torn(offset, format!("unknown frame kind {}", header[3])));
        };
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len > MAX_FRAME_BODY_BYTES {
            return Ok(torn(offset, format!("declared length {len} exceeds limit")));
        }

        let mut body = vec![0u8; len as usize];
        let got = read_up_to(&mut self.inner, &mut body)?;
        if got < body.len() {
            return Ok(torn(
                offset,
                format!("body truncated: declared {len} bytes, found {got}"),
            ));
        }

        self.offset += (HEADER_LEN + body.len()) as u64;
        Ok(FrameRead::Frame(RawFrame { kind, offset, body }))
    }
}

fn torn(offset: u64, details: String) -> FrameRead {
    FrameRead::Torn { offset, details }
}

/// Fill as much of `buf` as the source has; short only at end of input.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
