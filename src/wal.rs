//! Booking change log.
//!
//! Each frame is `[u32 le: len][bincode WalEvent][u32 le: crc32 of payload]`.
//! A crash can leave a partial last frame; replay stops at the first frame
//! that is short, claims more than `MAX_FRAME_BYTES`, fails its checksum or
//! does not decode.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::limits::MAX_FRAME_BYTES;
use crate::record::{Record, Table};

/// One durable change to the booking tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEvent {
    /// Insert or full replacement of a row.
    Upserted(Record),
    Deleted { table: Table, booking_id: String },
}

fn write_frame(out: &mut impl Write, event: &WalEvent) -> io::Result<()> {
    let payload = bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "event exceeds the frame limit"));
    }
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.write_all(&frame)
}

/// Fill `buf`, or report a clean or torn end of file as `false`.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// The next intact event, or `None` at the end of the usable log.
fn read_frame(input: &mut impl Read) -> io::Result<Option<WalEvent>> {
    let mut word = [0u8; 4];
    if !read_full(input, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_FRAME_BYTES {
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !read_full(input, &mut payload)? || !read_full(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

fn open_for_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

/// Append handle on the log. Only the store's writer task owns one.
pub struct Wal {
    out: BufWriter<File>,
    path: PathBuf,
    appended: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: open_for_append(path)?,
            path: path.to_path_buf(),
            appended: 0,
        })
    }

    /// Buffer one event. Nothing is durable until [`Wal::sync`].
    pub fn push(&mut self, event: &WalEvent) -> io::Result<()> {
        write_frame(&mut self.out, event)?;
        self.appended += 1;
        Ok(())
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()
    }

    /// Events pushed since the log was opened or last rewritten.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Replace the log with `events`. They are written to a sibling temp
    /// file, fsynced and renamed over the log.
    pub fn rewrite(&mut self, events: &[WalEvent]) -> io::Result<()> {
        self.sync()?;
        let staged = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&staged)?);
            for event in events {
                write_frame(&mut out, event)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&staged, &self.path)?;
        self.out = open_for_append(&self.path)?;
        self.appended = 0;
        Ok(())
    }

    /// Every intact event in the log at `path`. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<WalEvent>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut input = BufReader::new(file);
        let mut events = Vec::new();
        while let Some(event) = read_frame(&mut input)? {
            events.push(event);
        }
        Ok(events)
    }
}
