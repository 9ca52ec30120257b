//! Deferred release of GPU objects.
//!
//! GPU-backed resources hold an [`Owned`] handle. Dropping it, on any thread,
//! only sends the handle down a channel; the [`ReleaseQueue`] destroys the
//! objects on the thread that owns the backend when it is drained, which the
//! render context does once per frame.

use crate::backend::{BufferHandle, GpuBackend, TextureHandle, VertexArrayHandle};
use std::fmt;

/// A GPU object waiting to be destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    VertexArray(VertexArrayHandle),
}

/// Handles that can be released through the queue
pub trait GpuHandle: Copy + fmt::Debug + Send + Sync + 'static {
    fn to_release(self) -> Release;
}

impl GpuHandle for BufferHandle {
    fn to_release(self) -> Release {
        Release::Buffer(self)
    }
}

impl GpuHandle for TextureHandle {
    fn to_release(self) -> Release {
        Release::Texture(self)
    }
}

impl GpuHandle for VertexArrayHandle {
    fn to_release(self) -> Release {
        Release::VertexArray(self)
    }
}

/// Sending side of the release channel; cheap to clone
#[derive(Clone)]
pub struct Releaser {
    tx: flume::Sender<Release>,
}

impl Releaser {
    pub fn release(&self, release: Release) {
        if self.tx.send(release).is_err() {
            // The context is gone and took the device with it
            log::trace!("Dropped {:?} after the render context shut down", release);
        }
    }
}

/// Receiving side, drained on the backend's thread
pub struct ReleaseQueue {
    tx: flume::Sender<Release>,
    rx: flume::Receiver<Release>,
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    pub fn releaser(&self) -> Releaser {
        Releaser {
            tx: self.tx.clone(),
        }
    }

    /// Releases queued but not yet executed
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Destroy everything queued so far; returns the number of objects destroyed
    pub fn drain<B: GpuBackend + ?Sized>(&self, backend: &mut B) -> usize {
        let mut released = 0;
        for release in self.rx.try_iter() {
            match release {
                Release::Buffer(handle) => backend.destroy_buffer(handle),
                Release::Texture(handle) => backend.destroy_texture(handle),
                Release::VertexArray(handle) => backend.destroy_vertex_array(handle),
            }
            released += 1;
        }
        released
    }
}

/// Exclusive ownership of one GPU object; released when dropped
pub struct Owned<H: GpuHandle> {
    handle: H,
    releaser: Releaser,
}

impl<H: GpuHandle> Owned<H> {
    pub fn new(handle: H, releaser: Releaser) -> Self {
        Self { handle, releaser }
    }

    pub fn handle(&self) -> H {
        self.handle
    }
}

impl<H: GpuHandle> Drop for Owned<H> {
    fn drop(&mut self) {
        self.releaser.release(self.handle.to_release());
    }
}

impl<H: GpuHandle> fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owned({:?})", self.handle)
    }
}
