//! File block store
//!
//! All blocks live in one file. Allocation appends a zeroed frame; ids are the
//! frame's position in the file, so the offset table is rebuilt by scanning
//! frames on open.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                        │
//! │   Magic: "SKBS" (4) | Version: u16 (2) | Reserved (2)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frame 0                                                 │
//! │   [Size: u32 LE][Payload: Size bytes]                   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frame 1 ...                                             │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};

use super::{BlockId, BlockStore};

/// Magic bytes identifying a splitkv block file
const MAGIC: &[u8; 4] = b"SKBS";

/// Current file format version
const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Reserved (2)
const HEADER_SIZE: u64 = 8;

/// Frame header size: payload length (4)
const FRAME_HEADER_SIZE: u64 = 4;

/// Location of one block's payload
#[derive(Debug, Clone, Copy)]
struct Frame {
    offset: u64,
    size: usize,
}

#[derive(Debug)]
struct Inner {
    /// None once closed
    file: Option<File>,
    frames: Vec<Frame>,
    end: u64,
}

/// Block store backed by a single file
///
/// ## Concurrency:
/// - File handle and frame table share one Mutex (reads seek, so they lock too)
#[derive(Debug)]
pub struct FileBlockStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileBlockStore {
    /// Open or create a block file
    ///
    /// On open:
    /// 1. Write the header if the file is new, validate it otherwise
    /// 2. Scan frames to rebuild the offset table
    /// 3. Drop a torn trailing frame left by an interrupted allocation
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            Self::write_header(&mut file)?;
        } else {
            Self::check_header(&mut file, len)?;
        }

        let (frames, end) = Self::scan_frames(&mut file)?;
        let file_len = file.metadata()?.len();
        if file_len > end {
            warn!(
                path = %path.display(),
                torn_bytes = file_len - end,
                "Truncating torn frame at end of block file"
            );
            file.set_len(end)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), blocks = frames.len(), "Opened block file");

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file: Some(file), frames, end }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_header(file: &mut File) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(MAGIC)?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&[0u8; 2])?;
        Ok(())
    }

    fn check_header(file: &mut File, len: u64) -> Result<()> {
        if len < HEADER_SIZE {
            return Err(IndexError::Corruption(format!(
                "Block file too short for header: {} bytes",
                len
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(IndexError::Corruption(format!(
                "Invalid block file magic: expected SKBS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(IndexError::Corruption(format!(
                "Unsupported block file version: {}",
                version
            )));
        }

        Ok(())
    }

    /// Walk the frames after the header. Returns the frames and the offset
    /// just past the last complete one.
    fn scan_frames(file: &mut File) -> Result<(Vec<Frame>, u64)> {
        let len = file.metadata()?.len();
        let mut frames = Vec::new();
        let mut pos = HEADER_SIZE;

        while pos + FRAME_HEADER_SIZE <= len {
            let mut size_bytes = [0u8; FRAME_HEADER_SIZE as usize];
            file.seek(SeekFrom::Start(pos))?;
            file.read_exact(&mut size_bytes)?;
            let size = u32::from_le_bytes(size_bytes) as u64;

            let payload = pos + FRAME_HEADER_SIZE;
            if payload + size > len {
                break;
            }

            frames.push(Frame { offset: payload, size: size as usize });
            pos = payload + size;
        }

        Ok((frames, pos))
    }
}

impl Inner {
    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(IndexError::StoreClosed)
    }

    fn frame(&self, id: BlockId) -> Result<Frame> {
        self.frames
            .get(id as usize)
            .copied()
            .ok_or(IndexError::UnknownBlock(id))
    }
}

impl BlockStore for FileBlockStore {
    fn allocate_block(&self, size: usize) -> Result<BlockId> {
        let size_u32 = u32::try_from(size).map_err(|_| {
            IndexError::Storage(format!("Block size {} does not fit in a frame", size))
        })?;

        let mut inner = self.inner.lock();
        let end = inner.end;

        {
            let file = inner.file()?;
            file.seek(SeekFrom::Start(end))?;

            let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + size);
            frame.extend_from_slice(&size_u32.to_le_bytes());
            frame.resize(FRAME_HEADER_SIZE as usize + size, 0);
            file.write_all(&frame)?;
        }

        let id = inner.frames.len() as BlockId;
        inner.frames.push(Frame { offset: end + FRAME_HEADER_SIZE, size });
        inner.end = end + FRAME_HEADER_SIZE + size as u64;

        Ok(id)
    }

    fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let frame = inner.frame(id)?;
        let file = inner.file()?;

        let mut bytes = vec![0u8; frame.size];
        file.seek(SeekFrom::Start(frame.offset))?;
        file.read_exact(&mut bytes)?;

        Ok(bytes)
    }

    fn write_block(&self, id: BlockId, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let frame = inner.frame(id)?;

        if bytes.len() > frame.size {
            return Err(IndexError::Storage(format!(
                "Write of {} bytes exceeds block {} size {}",
                bytes.len(),
                id,
                frame.size
            )));
        }

        let mut padded = Vec::with_capacity(frame.size);
        padded.extend_from_slice(bytes);
        padded.resize(frame.size, 0);

        let file = inner.file()?;
        file.seek(SeekFrom::Start(frame.offset))?;
        file.write_all(&padded)?;

        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file()?.sync_all()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file = None;
        inner.frames.clear();
        Ok(())
    }

    fn truncate(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        {
            let file = inner.file()?;
            file.set_len(HEADER_SIZE)?;
            file.sync_all()?;
        }

        inner.frames.clear();
        inner.end = HEADER_SIZE;
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.inner.lock().frames.len()
    }
}
