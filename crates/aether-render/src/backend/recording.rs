//! Deterministic in-memory backend.
//!
//! Nothing touches a GPU. Each texture carries a content fingerprint that
//! `Copy` and `Blit` commands propagate, so callers can check whether a
//! texture's contents were modified without reading back pixels.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use super::{BackendError, RenderBackend, check_budget};
use crate::command::{Command, CommandBuffer};
use crate::handle::{HandleAllocator, MaterialHandle, TextureHandle};
use crate::texture::TextureDesc;

/// A texture known to the recording backend.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedTexture {
    pub label: String,
    pub desc: TextureDesc,
    /// Stand-in for the pixel contents.
    pub fingerprint: u64,
    /// Imported textures are owned by the caller and survive `destroy_texture`.
    pub imported: bool,
}

/// Headless backend that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    handles: HandleAllocator,
    textures: FxHashMap<TextureHandle, RecordedTexture>,
    materials: Vec<MaterialHandle>,
    submissions: Vec<CommandBuffer>,
    created: u64,
    destroyed: u64,
    budget: Option<u64>,
    in_use: u64,
    fail_next_allocation: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the bytes of created (non-imported) textures.
    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    /// Make the next `create_texture` fail with [`BackendError::OutOfMemory`].
    pub fn fail_next_allocation(&mut self) {
        self.fail_next_allocation = true;
    }

    /// Register a caller-owned texture (e.g. the camera color buffer) with a
    /// fingerprint derived from its label.
    pub fn import_texture(&mut self, label: &str, desc: TextureDesc) -> TextureHandle {
        let handle = self.handles.next();
        self.textures.insert(
            handle,
            RecordedTexture {
                label: label.to_string(),
                desc,
                fingerprint: fingerprint_of(&label),
                imported: true,
            },
        );
        handle
    }

    /// Register a material id. Materials have no state in this backend.
    pub fn create_material(&mut self) -> MaterialHandle {
        let handle = self.handles.next();
        self.materials.push(handle);
        handle
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&RecordedTexture> {
        self.textures.get(&handle)
    }

    pub fn fingerprint(&self, handle: TextureHandle) -> Option<u64> {
        self.textures.get(&handle).map(|t| t.fingerprint)
    }

    /// Every command buffer submitted so far, in order.
    pub fn submissions(&self) -> &[CommandBuffer] {
        &self.submissions
    }

    /// All submitted commands flattened in submission order.
    pub fn submitted_commands(&self) -> impl Iterator<Item = &Command> {
        self.submissions.iter().flat_map(|b| b.commands())
    }

    pub fn clear_submissions(&mut self) {
        self.submissions.clear();
    }

    /// Textures created through `create_texture`.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// Textures freed through `destroy_texture`.
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }

    /// Created textures that are still alive.
    pub fn live_texture_count(&self) -> usize {
        self.textures.values().filter(|t| !t.imported).count()
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.in_use
    }

    fn require(&self, handle: TextureHandle) -> Result<&RecordedTexture, BackendError> {
        self.textures
            .get(&handle)
            .ok_or(BackendError::UnknownTexture(handle))
    }

    fn apply(&mut self, command: &Command) -> Result<(), BackendError> {
        match command {
            Command::PushDebugGroup(_) | Command::PopDebugGroup => Ok(()),
            Command::Copy {
                source,
                destination,
            } => {
                let src = self.require(*source)?;
                let dst = self.require(*destination)?;
                if src.desc.format != dst.desc.format
                    || (src.desc.width, src.desc.height) != (dst.desc.width, dst.desc.height)
                {
                    return Err(BackendError::UnsupportedBlit {
                        reason: format!("copy {:?} -> {:?}", src.desc, dst.desc),
                    });
                }
                let fingerprint = src.fingerprint;
                self.set_fingerprint(*destination, fingerprint);
                Ok(())
            }
            Command::Blit {
                source,
                destination,
                material,
                pass_index,
                params,
            } => {
                if source == destination {
                    return Err(BackendError::UnsupportedBlit {
                        reason: "source and destination alias".to_string(),
                    });
                }
                if !self.materials.contains(material) {
                    return Err(BackendError::UnknownMaterial(*material));
                }
                let src = self.require(*source)?.fingerprint;
                self.require(*destination)?;
                let mut hasher = FxHasher::default();
                src.hash(&mut hasher);
                material.hash(&mut hasher);
                pass_index.hash(&mut hasher);
                for (name, value) in params.iter() {
                    name.hash(&mut hasher);
                    value.to_bits().hash(&mut hasher);
                }
                self.set_fingerprint(*destination, hasher.finish());
                Ok(())
            }
        }
    }

    fn set_fingerprint(&mut self, handle: TextureHandle, fingerprint: u64) {
        if let Some(texture) = self.textures.get_mut(&handle) {
            texture.fingerprint = fingerprint;
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_texture(
        &mut self,
        label: &str,
        desc: &TextureDesc,
    ) -> Result<TextureHandle, BackendError> {
        desc.validate()?;
        if std::mem::take(&mut self.fail_next_allocation) {
            return Err(BackendError::OutOfMemory {
                requested: desc.byte_size(),
                available: 0,
                budget: self.budget.unwrap_or(0),
            });
        }
        check_budget(desc, self.in_use, self.budget)?;

        let handle = self.handles.next();
        self.textures.insert(
            handle,
            RecordedTexture {
                label: label.to_string(),
                desc: *desc,
                fingerprint: 0,
                imported: false,
            },
        );
        self.in_use += desc.byte_size();
        self.created += 1;
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if self.textures.get(&handle).is_some_and(|t| t.imported) {
            return;
        }
        if let Some(texture) = self.textures.remove(&handle) {
            self.in_use = self.in_use.saturating_sub(texture.desc.byte_size());
            self.destroyed += 1;
        }
    }

    fn texture_desc(&self, handle: TextureHandle) -> Option<TextureDesc> {
        self.textures.get(&handle).map(|t| t.desc)
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<(), BackendError> {
        for command in commands.commands() {
            self.apply(command)?;
        }
        self.submissions.push(commands);
        Ok(())
    }
}

fn fingerprint_of(value: &impl Hash) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ShaderParams;

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    #[test]
    fn test_copy_propagates_fingerprint() {
        let mut backend = RecordingBackend::new();
        let camera = backend.import_texture("camera", TextureDesc::new(8, 8, FORMAT));
        let scratch = backend
            .create_texture("scratch", &TextureDesc::new(8, 8, FORMAT))
            .unwrap();

        let mut cmd = CommandBuffer::new("copy");
        cmd.copy(camera, scratch);
        backend.submit(cmd).unwrap();

        assert_eq!(backend.fingerprint(scratch), backend.fingerprint(camera));
    }

    #[test]
    fn test_copy_resolves_multisampled_source() {
        let mut backend = RecordingBackend::new();
        let camera =
            backend.import_texture("camera", TextureDesc::new(8, 8, FORMAT).with_samples(4));
        let scratch = backend
            .create_texture("scratch", &TextureDesc::new(8, 8, FORMAT))
            .unwrap();

        let mut cmd = CommandBuffer::new("resolve");
        cmd.copy(camera, scratch);
        assert!(backend.submit(cmd).is_ok());
    }

    #[test]
    fn test_blit_changes_destination() {
        let mut backend = RecordingBackend::new();
        let material = backend.create_material();
        let camera = backend.import_texture("camera", TextureDesc::new(8, 8, FORMAT));
        let scratch = backend
            .create_texture("scratch", &TextureDesc::new(8, 8, FORMAT))
            .unwrap();
        let before = backend.fingerprint(camera);

        let mut cmd = CommandBuffer::new("shade");
        cmd.copy(camera, scratch)
            .blit(scratch, camera, material, 0, ShaderParams::new().with("k", 1.0));
        backend.submit(cmd).unwrap();

        assert_ne!(backend.fingerprint(camera), before);
        assert_eq!(backend.submissions().len(), 1);
    }

    #[test]
    fn test_blit_in_place_is_rejected() {
        let mut backend = RecordingBackend::new();
        let material = backend.create_material();
        let camera = backend.import_texture("camera", TextureDesc::new(8, 8, FORMAT));

        let mut cmd = CommandBuffer::new("bad");
        cmd.blit(camera, camera, material, 0, ShaderParams::new());
        assert!(matches!(
            backend.submit(cmd),
            Err(BackendError::UnsupportedBlit { .. })
        ));
    }

    #[test]
    fn test_unknown_material_is_rejected() {
        let mut backend = RecordingBackend::new();
        let a = backend.import_texture("a", TextureDesc::new(8, 8, FORMAT));
        let b = backend.import_texture("b", TextureDesc::new(8, 8, FORMAT));

        let mut cmd = CommandBuffer::new("bad");
        cmd.blit(a, b, MaterialHandle::from_raw(99), 0, ShaderParams::new());
        assert!(matches!(
            backend.submit(cmd),
            Err(BackendError::UnknownMaterial(_))
        ));
    }

    #[test]
    fn test_budget_and_forced_failure() {
        let desc = TextureDesc::new(16, 16, wgpu::TextureFormat::Rgba8Unorm);
        let mut backend = RecordingBackend::new().with_budget(desc.byte_size());

        let first = backend.create_texture("a", &desc).unwrap();
        assert!(matches!(
            backend.create_texture("b", &desc),
            Err(BackendError::OutOfMemory { .. })
        ));

        backend.destroy_texture(first);
        assert_eq!(backend.bytes_in_use(), 0);

        backend.fail_next_allocation();
        assert!(backend.create_texture("c", &desc).is_err());
        assert!(backend.create_texture("d", &desc).is_ok());
    }

    #[test]
    fn test_destroy_ignores_imported_textures() {
        let mut backend = RecordingBackend::new();
        let camera = backend.import_texture("camera", TextureDesc::new(8, 8, FORMAT));
        backend.destroy_texture(camera);
        assert!(backend.texture(camera).is_some());
        assert_eq!(backend.destroyed_count(), 0);
    }
}
