//! Backend-neutral command recording.
//!
//! Passes record [`Command`]s into a [`CommandBuffer`] and hand it to the frame
//! context for submission. Backends replay the buffer in program order.

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};

use crate::handle::{MaterialHandle, TextureHandle};

/// Ordered list of named scalar shader parameters.
///
/// Values are forwarded to the material verbatim; backends pack them into a
/// uniform block of `vec4<f32>` rows in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderParams {
    entries: Vec<(&'static str, f32)>,
}

impl ShaderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, replacing an existing one with the same name in place.
    pub fn with(mut self, name: &'static str, value: f32) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: f32) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Values padded with zeros to a whole number of `vec4<f32>` rows (at least one).
    pub fn uniform_words(&self) -> Vec<f32> {
        let rows = self.entries.len().div_ceil(4).max(1);
        let mut words = vec![0.0; rows * 4];
        for (slot, (_, value)) in words.iter_mut().zip(&self.entries) {
            *slot = *value;
        }
        words
    }
}

/// A single recorded operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Open a named profiling / debug scope.
    PushDebugGroup(Cow<'static, str>),
    /// Close the innermost open scope.
    PopDebugGroup,
    /// Copy (resolving if needed) `source` into `destination`.
    Copy {
        source: TextureHandle,
        destination: TextureHandle,
    },
    /// Full-screen shader pass reading `source` and writing `destination`.
    Blit {
        source: TextureHandle,
        destination: TextureHandle,
        material: MaterialHandle,
        pass_index: u32,
        params: ShaderParams,
    },
}

impl Command {
    /// Whether this command produces GPU work (as opposed to a scope marker).
    pub fn is_gpu_work(&self) -> bool {
        matches!(self, Self::Copy { .. } | Self::Blit { .. })
    }
}

/// A labelled, ordered command list.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandBuffer {
    label: Cow<'static, str>,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands that produce GPU work.
    pub fn gpu_command_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_gpu_work()).count()
    }

    /// Drop all recorded commands, keeping the label.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn copy(&mut self, source: TextureHandle, destination: TextureHandle) -> &mut Self {
        self.commands.push(Command::Copy {
            source,
            destination,
        });
        self
    }

    pub fn blit(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        material: MaterialHandle,
        pass_index: u32,
        params: ShaderParams,
    ) -> &mut Self {
        self.commands.push(Command::Blit {
            source,
            destination,
            material,
            pass_index,
            params,
        });
        self
    }

    /// Open a debug scope that closes when the returned guard drops.
    pub fn scope(&mut self, label: impl Into<Cow<'static, str>>) -> CommandScope<'_> {
        self.commands.push(Command::PushDebugGroup(label.into()));
        CommandScope { buffer: self }
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// RAII guard for a debug scope; records [`Command::PopDebugGroup`] on drop.
pub struct CommandScope<'a> {
    buffer: &'a mut CommandBuffer,
}

impl Deref for CommandScope<'_> {
    type Target = CommandBuffer;

    fn deref(&self) -> &CommandBuffer {
        self.buffer
    }
}

impl DerefMut for CommandScope<'_> {
    fn deref_mut(&mut self) -> &mut CommandBuffer {
        self.buffer
    }
}

impl Drop for CommandScope<'_> {
    fn drop(&mut self) {
        self.buffer.commands.push(Command::PopDebugGroup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex(i: u32) -> TextureHandle {
        TextureHandle::from_raw(i)
    }

    #[test]
    fn test_scope_brackets_commands() {
        let mut cmd = CommandBuffer::new("test");
        {
            let mut scope = cmd.scope("outer");
            scope.copy(tex(0), tex(1));
        }
        assert_eq!(
            cmd.commands(),
            &[
                Command::PushDebugGroup("outer".into()),
                Command::Copy {
                    source: tex(0),
                    destination: tex(1)
                },
                Command::PopDebugGroup,
            ]
        );
    }

    #[test]
    fn test_scope_closes_on_early_return() {
        fn record(cmd: &mut CommandBuffer, bail: bool) -> Option<()> {
            let mut scope = cmd.scope("early");
            if bail {
                return None;
            }
            scope.copy(tex(0), tex(1));
            Some(())
        }

        let mut cmd = CommandBuffer::new("test");
        assert!(record(&mut cmd, true).is_none());
        assert_eq!(cmd.commands().last(), Some(&Command::PopDebugGroup));
        assert_eq!(cmd.gpu_command_count(), 0);
    }

    #[test]
    fn test_gpu_command_count_ignores_markers() {
        let mut cmd = CommandBuffer::new("test");
        {
            let mut scope = cmd.scope("s");
            scope
                .copy(tex(0), tex(1))
                .blit(tex(1), tex(0), MaterialHandle::from_raw(0), 0, ShaderParams::new());
        }
        assert_eq!(cmd.commands().len(), 4);
        assert_eq!(cmd.gpu_command_count(), 2);
    }

    #[test]
    fn test_clear_keeps_label() {
        let mut cmd = CommandBuffer::new("keep-me");
        cmd.copy(tex(0), tex(1));
        cmd.clear();
        assert!(cmd.is_empty());
        assert_eq!(cmd.label(), "keep-me");
    }

    #[test]
    fn test_params_set_replaces_in_place() {
        let mut params = ShaderParams::new().with("a", 1.0).with("b", 2.0);
        params.set("a", 5.0);
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(params.get("a"), Some(5.0));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_uniform_words_pad_to_vec4() {
        assert_eq!(ShaderParams::new().uniform_words(), vec![0.0; 4]);

        let params = ShaderParams::new()
            .with("planet_radius", 64_000_000.0)
            .with("atmospheric_height", 8_000_000.0)
            .with("atmospheric_density", 1.0);
        assert_eq!(
            params.uniform_words(),
            vec![64_000_000.0, 8_000_000.0, 1.0, 0.0]
        );

        let five = (0..5).fold(ShaderParams::new(), |p, i| {
            p.with(["a", "b", "c", "d", "e"][i], i as f32)
        });
        assert_eq!(five.uniform_words().len(), 8);
    }
}
