use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::renderer::GraphicsBackend;

/// A shader combination: vertex/fragment file pair plus preprocessor
/// defines. Defines are sorted at construction so two keys with the same
/// set in different order hash identically.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    pub vertex_file: String,
    pub fragment_file: String,
    pub defines: Vec<String>,
}

impl ShaderKey {
    pub fn new(
        vertex_file: impl Into<String>,
        fragment_file: impl Into<String>,
        mut defines: Vec<String>,
    ) -> Self {
        defines.sort();
        Self {
            vertex_file: vertex_file.into(),
            fragment_file: fragment_file.into(),
            defines,
        }
    }

    pub fn hash_value(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Process-lifetime cache of compiled shader programs, keyed by the
/// combination hash. Never invalidated within a session. Failed
/// compilations are cached too so a broken shader is reported once and the
/// draws referencing it keep getting skipped.
#[derive(Default)]
pub struct ShaderCache {
    programs: HashMap<u64, Option<u32>>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        key: &ShaderKey,
    ) -> Option<u32> {
        let hash = key.hash_value();
        if let Some(entry) = self.programs.get(&hash) {
            return *entry;
        }

        let program =
            backend.create_shader_program(&key.vertex_file, &key.fragment_file, &key.defines);
        if program.is_none() {
            log::error!(
                "Failed to compile shader program {} / {} (defines: {:?})",
                key.vertex_file,
                key.fragment_file,
                key.defines
            );
        }
        self.programs.insert(hash, program);
        program
    }

    pub fn lookup(&self, key: &ShaderKey) -> Option<u32> {
        self.programs.get(&key.hash_value()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
