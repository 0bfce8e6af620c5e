//! Frame-scoped transient texture pool.
//!
//! Passes acquire scratch textures while configuring and release them during
//! cleanup. Released textures go to a free list keyed by [`TextureDesc`] and are
//! handed out again by later frames; [`TransientPool::trim`] destroys the ones
//! that have sat idle for too long.
//!
//! ```text
//! begin_frame(n) ── acquire ── ... ── release ── end_frame ── trim
//!                     │                  ▲           │
//!                     └─ TransientTexture┘           └─ reclaims leaked tokens
//! ```

use log::{trace, warn};
use rustc_hash::FxHashMap;

use crate::backend::{BackendError, RenderBackend};
use crate::handle::TextureHandle;
use crate::texture::TextureDesc;

/// Ownership token for a pooled texture.
///
/// Not `Clone` or `Copy`: [`TransientPool::release`] consumes it, so a texture
/// cannot be returned twice.
#[derive(Debug, PartialEq, Eq)]
pub struct TransientTexture {
    id: u64,
    handle: TextureHandle,
    desc: TextureDesc,
    name: &'static str,
    frame: u64,
}

impl TransientTexture {
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Frame the texture was acquired in.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Counters for pool activity since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    /// Tokens handed out and not yet returned.
    pub outstanding: u64,
    /// Backend allocations.
    pub created: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Backend frees.
    pub destroyed: u64,
}

struct FreeTexture {
    handle: TextureHandle,
    idle_frames: u32,
}

struct ActiveTexture {
    /// Acquisition the handle is currently lent to.
    id: u64,
    desc: TextureDesc,
    name: &'static str,
}

/// Texture pool for per-frame scratch buffers.
#[derive(Default)]
pub struct TransientPool {
    frame: u64,
    next_id: u64,
    active: FxHashMap<TextureHandle, ActiveTexture>,
    free: FxHashMap<TextureDesc, Vec<FreeTexture>>,
    stats: PoolStats,
}

impl TransientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame; subsequent acquisitions are stamped with `frame`.
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Hand out a texture matching `desc`, reusing a free one when possible.
    pub fn acquire(
        &mut self,
        backend: &mut dyn RenderBackend,
        name: &'static str,
        desc: &TextureDesc,
    ) -> Result<TransientTexture, BackendError> {
        let recycled = self.free.get_mut(desc).and_then(Vec::pop);
        let handle = match recycled {
            Some(free) => {
                self.stats.reused += 1;
                free.handle
            }
            None => {
                let handle = backend.create_texture(name, desc)?;
                self.stats.created += 1;
                handle
            }
        };
        trace!("Acquired transient '{}' {:?} ({:?})", name, handle, desc);

        let id = self.next_id;
        self.next_id += 1;
        self.active.insert(
            handle,
            ActiveTexture {
                id,
                desc: *desc,
                name,
            },
        );
        self.stats.acquired += 1;
        self.stats.outstanding += 1;
        Ok(TransientTexture {
            id,
            handle,
            desc: *desc,
            name,
            frame: self.frame,
        })
    }

    /// Return a texture to the free list.
    pub fn release(&mut self, texture: TransientTexture) {
        if texture.frame != self.frame {
            warn!(
                "Transient '{}' acquired in frame {} released in frame {}",
                texture.name, texture.frame, self.frame
            );
        }
        // A reclaimed handle may already be lent to a newer acquisition.
        if self
            .active
            .get(&texture.handle)
            .is_none_or(|active| active.id != texture.id)
        {
            warn!("Transient '{}' released after reclamation", texture.name);
            return;
        }
        self.active.remove(&texture.handle);
        trace!("Released transient '{}' {:?}", texture.name, texture.handle);
        self.recycle(texture.handle, texture.desc);
        self.stats.released += 1;
    }

    /// Close the frame: reclaim any textures still outstanding and age the
    /// free list. Returns the number of reclaimed (leaked) textures.
    pub fn end_frame(&mut self) -> usize {
        for list in self.free.values_mut() {
            for free in list.iter_mut() {
                free.idle_frames += 1;
            }
        }

        let leaked: Vec<_> = self.active.drain().collect();
        for (handle, active) in &leaked {
            warn!(
                "Transient '{}' {:?} was not released in frame {}; reclaiming",
                active.name, handle, self.frame
            );
            self.recycle(*handle, active.desc);
            self.stats.released += 1;
        }
        leaked.len()
    }

    /// Destroy free textures that have been idle for more than `max_idle_frames`.
    /// Returns the number destroyed.
    pub fn trim(&mut self, backend: &mut dyn RenderBackend, max_idle_frames: u32) -> usize {
        let mut destroyed = 0;
        for list in self.free.values_mut() {
            list.retain(|free| {
                if free.idle_frames > max_idle_frames {
                    backend.destroy_texture(free.handle);
                    destroyed += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.free.retain(|_, list| !list.is_empty());
        self.stats.destroyed += destroyed as u64;
        destroyed
    }

    /// Destroy every texture the pool owns, including outstanding ones.
    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        let outstanding = self.active.len() as u64;
        for (handle, _) in self.active.drain() {
            backend.destroy_texture(handle);
            self.stats.destroyed += 1;
        }
        for (_, list) in self.free.drain() {
            for free in list {
                backend.destroy_texture(free.handle);
                self.stats.destroyed += 1;
            }
        }
        self.stats.outstanding -= outstanding;
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Textures sitting in the free list.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    fn recycle(&mut self, handle: TextureHandle, desc: TextureDesc) {
        self.stats.outstanding -= 1;
        self.free.entry(desc).or_default().push(FreeTexture {
            handle,
            idle_frames: 0,
        });
    }
}
