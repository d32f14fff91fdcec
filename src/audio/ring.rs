//! Lock-free single-producer single-consumer byte ring for captured audio.
//!
//! The audio callback thread writes raw PCM bytes through [`RingProducer`];
//! the daemon thread drains them through [`RingConsumer`]. Cursors are
//! monotonically increasing byte counts; the physical offset is
//! `cursor % capacity`. The write path is wait-free: on overflow the excess
//! is dropped and the caller observes a short write.

use crate::defaults::SAMPLE_BYTES;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct RingInner {
    buf: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    // Cursors live on separate cache lines so the producer's stores do not
    // invalidate the consumer's line and vice versa.
    write_pos: CachePadded<AtomicU64>,
    read_pos: CachePadded<AtomicU64>,
}

// SAFETY: the buffer is only mutated through the single RingProducer and
// single RingConsumer handles. The producer writes bytes strictly ahead of
// `write_pos` and publishes them with a release store; the consumer reads
// strictly behind `write_pos` after an acquire load. The handles are not
// Clone, so the single-writer/single-reader discipline is enforced by
// ownership.
unsafe impl Sync for RingInner {}
unsafe impl Send for RingInner {}

impl RingInner {
    fn base(&self) -> *mut u8 {
        // UnsafeCell<u8> is repr(transparent) over u8.
        self.buf.as_ptr() as *mut u8
    }
}

/// Create a ring of `capacity` bytes, returning the producer and consumer
/// handles.
pub fn ring(capacity: usize) -> (RingProducer, RingConsumer) {
    assert!(capacity > 0, "ring capacity must be positive");
    let inner = Arc::new(RingInner {
        buf: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
        capacity,
        write_pos: CachePadded::new(AtomicU64::new(0)),
        read_pos: CachePadded::new(AtomicU64::new(0)),
    });
    (
        RingProducer {
            inner: Arc::clone(&inner),
        },
        RingConsumer { inner },
    )
}

/// Write handle, owned by the audio capture thread.
pub struct RingProducer {
    inner: Arc<RingInner>,
}

impl RingProducer {
    /// Copy up to `data.len()` bytes into the ring and return how many were
    /// accepted. Never blocks, never allocates. Excess bytes on a full ring
    /// are dropped.
    pub fn write(&self, data: &[u8]) -> usize {
        let inner = &*self.inner;
        let w = inner.write_pos.load(Ordering::Relaxed);
        let r = inner.read_pos.load(Ordering::Acquire);

        let free = inner.capacity - (w - r) as usize;
        let to_write = data.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let offset = (w as usize) % inner.capacity;
        let first = to_write.min(inner.capacity - offset);
        // SAFETY: the region [w, w + to_write) is unpublished and therefore
        // not read by the consumer; bounds are within the allocation.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), inner.base().add(offset), first);
            if first < to_write {
                ptr::copy_nonoverlapping(data.as_ptr().add(first), inner.base(), to_write - first);
            }
        }

        inner
            .write_pos
            .store(w + to_write as u64, Ordering::Release);
        to_write
    }
}

/// Read handle, owned by the daemon thread.
pub struct RingConsumer {
    inner: Arc<RingInner>,
}

impl RingConsumer {
    /// Copy up to `dest.len()` bytes out of the ring and return how many
    /// were copied.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        let inner = &*self.inner;
        let r = inner.read_pos.load(Ordering::Relaxed);
        let w = inner.write_pos.load(Ordering::Acquire);

        let avail = (w - r) as usize;
        let to_read = dest.len().min(avail);
        if to_read == 0 {
            return 0;
        }

        let offset = (r as usize) % inner.capacity;
        let first = to_read.min(inner.capacity - offset);
        // SAFETY: the region [r, r + to_read) was published by the producer's
        // release store and is not rewritten until we advance read_pos.
        unsafe {
            ptr::copy_nonoverlapping(inner.base().add(offset), dest.as_mut_ptr(), first);
            if first < to_read {
                ptr::copy_nonoverlapping(inner.base(), dest.as_mut_ptr().add(first), to_read - first);
            }
        }

        inner.read_pos.store(r + to_read as u64, Ordering::Release);
        to_read
    }

    /// Drain all available bytes, rounded down to whole 16-bit samples.
    ///
    /// A trailing odd byte stays in the ring so sample alignment survives
    /// across drains.
    pub fn drain_samples(&self) -> Vec<i16> {
        let avail = self.available() & !(SAMPLE_BYTES - 1);
        if avail == 0 {
            return Vec::new();
        }

        let mut bytes = vec![0u8; avail];
        let n = self.read(&mut bytes);
        bytes[..n]
            .chunks_exact(SAMPLE_BYTES)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Bytes currently readable.
    pub fn available(&self) -> usize {
        let inner = &*self.inner;
        let w = inner.write_pos.load(Ordering::Acquire);
        let r = inner.read_pos.load(Ordering::Acquire);
        (w - r) as usize
    }

    /// Reset both cursors to zero.
    ///
    /// Only valid while capture is stopped: the producer must not be writing
    /// concurrently.
    pub fn reset(&self) {
        self.inner.read_pos.store(0, Ordering::Relaxed);
        self.inner.write_pos.store(0, Ordering::Relaxed);
    }
}
