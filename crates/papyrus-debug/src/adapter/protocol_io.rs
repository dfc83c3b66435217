//! DAP protocol framing IO.
//! - read_message: parse Content-Length payload
//! - write_message/write_message_locked: emit payload
//! - write_protocol_log: optional transcript logging

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};

use parking_lot::Mutex;

const CONTENT_LENGTH: &str = "Content-Length";

pub(super) type ProtocolLog = Mutex<BufWriter<File>>;

pub(super) fn read_message<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut content_length = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes = reader.read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if content_length.is_none() {
                continue;
            }
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;
    String::from_utf8(buffer)
        .map(Some)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8 payload"))
}

pub(super) fn write_message<W: Write + ?Sized>(writer: &mut W, payload: &str) -> io::Result<()> {
    let length = payload.len();
    write!(writer, "Content-Length: {length}\r\n\r\n")?;
    writer.write_all(payload.as_bytes())?;
    writer.flush()
}

/// Frames are written whole so the request loop and the event writer
/// never interleave.
pub(super) fn write_message_locked<W: Write + ?Sized>(
    writer: &Mutex<W>,
    payload: &str,
) -> io::Result<()> {
    let mut writer = writer.lock();
    write_message(&mut *writer, payload)
}

pub(super) fn write_protocol_log(
    logger: &ProtocolLog,
    direction: &str,
    payload: &str,
) -> io::Result<()> {
    let mut logger = logger.lock();
    writeln!(logger, "{direction} {payload}")?;
    logger.flush()
}
