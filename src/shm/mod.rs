//! Shared-memory buffer allocation
//!
//! A buffer is backed by an anonymous file in `XDG_RUNTIME_DIR`. The file
//! never has a resolvable path once [`ShmAllocator::allocate`] returns: it
//! lives only through the open descriptor, which is handed to the server
//! when the pool is created, and through our read/write shared mapping.
//!
//! Pixels are XRGB8888, four bytes each, rows packed with no padding.

use crate::error::{PopstackError, Result};
use log::debug;
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};

/// Environment variable naming the per-user runtime directory
pub const RUNTIME_DIR_VAR: &str = "XDG_RUNTIME_DIR";

/// Bytes per XRGB8888 pixel
pub const BYTES_PER_PIXEL: i32 = 4;

/// Pixel layout of every buffer this client creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Xrgb8888,
}

/// Creates shared-memory buffers inside a runtime directory
#[derive(Debug, Clone)]
pub struct ShmAllocator {
    runtime_dir: PathBuf,
}

impl ShmAllocator {
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
        }
    }

    /// Allocator for `$XDG_RUNTIME_DIR`; there is no fallback directory
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(RUNTIME_DIR_VAR) {
            Some(dir) if !dir.is_empty() => Ok(Self::new(dir)),
            _ => Err(PopstackError::MissingRuntimeDir),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Create a mapped, unlinked backing file for a `width`x`height` image
    pub fn allocate(&self, width: i32, height: i32) -> Result<ShmBuffer> {
        let (stride, size) = buffer_layout(width, height)?;

        let file = tempfile::tempfile_in(&self.runtime_dir).map_err(|source| {
            PopstackError::ResourceAllocation {
                what: "create backing file",
                size,
                source,
            }
        })?;
        set_cloexec(&file).map_err(|source| PopstackError::ResourceAllocation {
            what: "set close-on-exec",
            size,
            source,
        })?;
        file.set_len(size as u64)
            .map_err(|source| PopstackError::ResourceAllocation {
                what: "truncate backing file",
                size,
                source,
            })?;

        // SAFETY: the file is private to this process (no path) and sized
        // above; the server only ever reads through its own mapping.
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }.map_err(|source| {
            PopstackError::ResourceAllocation {
                what: "mmap",
                size,
                source,
            }
        })?;

        debug!(
            "Allocated {}x{} shm buffer ({} B, stride {}) in {}",
            width,
            height,
            size,
            stride,
            self.runtime_dir.display()
        );

        Ok(ShmBuffer {
            file,
            mmap,
            width,
            height,
            stride,
        })
    }
}

/// Stride and byte size for a buffer, rejecting what the wire can't carry
pub fn buffer_layout(width: i32, height: i32) -> Result<(i32, usize)> {
    if width <= 0 || height <= 0 {
        return Err(PopstackError::InvalidDimensions { width, height });
    }
    let size = width
        .checked_mul(BYTES_PER_PIXEL)
        .and_then(|stride| stride.checked_mul(height).map(|size| (stride, size)));
    match size {
        Some((stride, size)) => Ok((stride, size as usize)),
        None => Err(PopstackError::InvalidDimensions { width, height }),
    }
}

fn set_cloexec(file: &File) -> std::io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: fcntl on a descriptor we own.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(std::io::Error::last_os_error());
    }
    if flags & libc::FD_CLOEXEC != 0 {
        return Ok(());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// One mapped shared-memory image
#[derive(Debug)]
pub struct ShmBuffer {
    file: File,
    mmap: MmapMut,
    width: i32,
    height: i32,
    stride: i32,
}

impl ShmBuffer {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn stride(&self) -> i32 {
        self.stride
    }

    /// Size in bytes; always `width * height * 4`
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Xrgb8888
    }

    /// Descriptor handed to the server for pool creation
    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn pixels(&self) -> &[u32] {
        bytemuck::cast_slice(&self.mmap[..])
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        bytemuck::cast_slice_mut(&mut self.mmap[..])
    }

    /// Flat fill of the whole image with a packed 0x00RRGGBB color
    pub fn fill(&mut self, color: u32) {
        debug!("Painting {}x{} pixels with {:06X}", self.width, self.height, color);
        self.pixels_mut().fill(color);
    }
}
