// Copyright 2026 The Task Shuffle Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Append-mode spill file framing.
//!
//! Every dump writes `header || payload`: a fixed-width header encoding
//! `(payload_len, is_marshal, is_sorted)` followed by `payload_len` bytes of
//! compressed, encoded items. A reader recovers the original bucket
//! contents by decoding each frame independently and concatenating their
//! item lists — append mode never has to read the whole file to make sense
//! of one frame.

use std::io::{self, Read, Write};

/// `payload_len: u32 | is_marshal: u8 | is_sorted: u8 | reserved: u16`.
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u32,
    pub is_marshal: bool,
    /// Always false in the current design; sort-merge mode uses a
    /// different, frame-less writer. Reserved for future use — never
    /// elided.
    pub is_sorted: bool,
}

pub fn pack_header(payload_len: u32, is_marshal: bool, is_sorted: bool) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0..4].copy_from_slice(&payload_len.to_le_bytes());
    buf[4] = is_marshal as u8;
    buf[5] = is_sorted as u8;
    // buf[6..8] reserved, left zeroed
    buf
}

pub fn unpack_header(buf: &[u8; HEADER_LEN]) -> FrameHeader {
    let payload_len = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    FrameHeader {
        payload_len,
        is_marshal: buf[4] != 0,
        is_sorted: buf[5] != 0,
    }
}

pub fn write_frame<W: Write>(w: &mut W, payload: &[u8], is_marshal: bool, is_sorted: bool) -> io::Result<()> {
    let header = pack_header(payload.len() as u32, is_marshal, is_sorted);
    w.write_all(&header)?;
    w.write_all(payload)?;
    Ok(())
}

/// Reads one `(header, payload)` frame, or `None` at clean end-of-stream.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<(FrameHeader, Vec<u8>)>> {
    let mut header_buf = [0u8; HEADER_LEN];
    match read_exact_or_eof(r, &mut header_buf)? {
        false => return Ok(None),
        true => {}
    }
    let header = unpack_header(&header_buf);
    let mut payload = vec![0u8; header.payload_len as usize];
    r.read_exact(&mut payload)?;
    Ok(Some((header, payload)))
}

/// Like `Read::read_exact`, but returns `Ok(false)` instead of erroring when
/// zero bytes are available at the very start of the read (clean EOF),
/// while still erroring on a truncated frame.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame header"));
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Reads every frame in a file/stream in order, concatenating each frame's
/// decoded payload via `decode`. Used by property tests and by tooling
/// that just wants "what did this file contain" without a live
/// `Aggregator`.
pub fn read_all_frames<R: Read>(mut r: R) -> io::Result<Vec<FrameHeader>> {
    let mut headers = Vec::new();
    while let Some((header, _payload)) = read_frame(&mut r)? {
        headers.push(header);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let packed = pack_header(12345, true, false);
        let unpacked = unpack_header(&packed);
        assert_eq!(unpacked.payload_len, 12345);
        assert!(unpacked.is_marshal);
        assert!(!unpacked.is_sorted);
    }

    #[test]
    fn is_sorted_bit_is_always_zero_today_but_preserved_in_the_wire_format() {
        let packed = pack_header(0, false, false);
        assert_eq!(packed[5], 0);
    }

    #[test]
    fn frame_round_trip_is_independent_per_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first", true, false).unwrap();
        write_frame(&mut buf, b"second-longer", false, false).unwrap();

        let mut cursor = Cursor::new(buf);
        let (h1, p1) = read_frame(&mut cursor).unwrap().unwrap();
        assert!(h1.is_marshal);
        assert_eq!(p1, b"first");

        let (h2, p2) = read_frame(&mut cursor).unwrap().unwrap();
        assert!(!h2.is_marshal);
        assert_eq!(p2, b"second-longer");

        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_an_error_not_a_clean_eof() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello", true, false).unwrap();
        buf.truncate(buf.len() - 2);
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).is_err());
    }
}
