//! Typed, backend-opaque resource handles.
//!
//! A [`Handle`] is a plain index tagged with a zero-sized marker type, so a
//! texture handle can never be passed where a material is expected. Only the
//! [`RenderBackend`](crate::RenderBackend) that issued a handle can resolve it
//! to a concrete GPU object.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker for texture handles.
#[derive(Debug)]
pub enum Texture {}

/// Marker for shader program handles.
#[derive(Debug)]
pub enum Shader {}

/// Marker for material handles (a shader bound to its parameter layout).
#[derive(Debug)]
pub enum Material {}

/// A copyable id for a backend-owned resource of kind `T`.
pub struct Handle<T> {
    index: u32,
    _kind: PhantomData<fn() -> T>,
}

/// Handle to a GPU texture (transient, persistent, or imported).
pub type TextureHandle = Handle<Texture>;
/// Handle to a compiled shader program.
pub type ShaderHandle = Handle<Shader>;
/// Handle to a material instance.
pub type MaterialHandle = Handle<Material>;

impl<T> Handle<T> {
    /// Wrap a raw backend index.
    pub const fn from_raw(index: u32) -> Self {
        Self {
            index,
            _kind: PhantomData,
        }
    }

    /// The raw backend index.
    pub const fn raw(self) -> u32 {
        self.index
    }
}

// Manual impls: derives would put bounds on the marker type.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("Handle");
        write!(f, "{kind}#{}", self.index)
    }
}

/// Monotonic handle allocator shared by the backends.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn next<T>(&mut self) -> Handle<T> {
        let handle = Handle::from_raw(self.next);
        self.next = self.next.wrapping_add(1);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_handles_compare_by_index() {
        let a = TextureHandle::from_raw(3);
        let b = TextureHandle::from_raw(3);
        let c = TextureHandle::from_raw(4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn test_handles_are_hashable() {
        let mut set = FxHashSet::default();
        set.insert(MaterialHandle::from_raw(1));
        set.insert(MaterialHandle::from_raw(1));
        set.insert(MaterialHandle::from_raw(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_debug_names_the_kind() {
        assert_eq!(format!("{:?}", TextureHandle::from_raw(7)), "Texture#7");
        assert_eq!(format!("{:?}", ShaderHandle::from_raw(0)), "Shader#0");
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = HandleAllocator::default();
        let a: TextureHandle = alloc.next();
        let b: TextureHandle = alloc.next();
        assert_eq!(a.raw() + 1, b.raw());
    }
}
