use std::collections::HashMap;

use rayon::prelude::*;
use thiserror::Error;

use crate::renderer::stage::{create_stage, InitContext, RenderStage, StageKind};
use crate::renderer::{GraphicsBackend, PipelineConfig, ShaderCache};
use crate::scene::{Geometry, Scene};
use crate::settings::RenderSettings;

/// Number of worker threads updating stages in parallel each frame.
const WORKER_THREADS: usize = 4;

/// Stage construction order. Differs from the execution order because a
/// stage's init may resolve textures from a target another stage creates:
/// the shadow-occlusion resolve samples the G-buffer depth, and the
/// lighting pass samples the shadow-occlusion output.
const INIT_ORDER: [StageKind; 4] = [
    StageKind::Deferred,
    StageKind::Shadow,
    StageKind::Lighting,
    StageKind::PostProcess,
];

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to build the render worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Owns the render stages and drives them through the frame protocol:
/// snapshot the scene, clear and update every stage in parallel, then
/// execute them sequentially in fixed stage order on the frame thread.
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    cache: ShaderCache,
    settings: RenderSettings,
    targets: HashMap<String, u32>,
    textures: HashMap<String, u32>,
    screen: (u32, u32),
    fullscreen: Geometry,
    stages: Vec<Box<dyn RenderStage>>,
    pool: rayon::ThreadPool,
}

impl<B: GraphicsBackend> Renderer<B> {
    pub fn new(
        mut backend: B,
        settings: RenderSettings,
        config: &PipelineConfig,
    ) -> Result<Self, RendererError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(WORKER_THREADS)
            .thread_name(|i| format!("render-worker-{i}"))
            .build()?;

        let screen = (settings.resolution.width, settings.resolution.height);
        let fullscreen = create_fullscreen_triangle(&mut backend);

        let mut cache = ShaderCache::new();
        let mut targets = HashMap::new();
        let mut textures = HashMap::new();

        for stage_config in &config.stages {
            if StageKind::from_name(&stage_config.name).is_none() {
                log::error!("Unknown render stage '{}' in pipeline config; skipping", stage_config.name);
            }
        }

        let mut stages: Vec<Box<dyn RenderStage>> = Vec::new();
        for kind in INIT_ORDER {
            for stage_config in &config.stages {
                if StageKind::from_name(&stage_config.name) != Some(kind) {
                    continue;
                }
                let mut ctx = InitContext {
                    backend: &mut backend,
                    cache: &mut cache,
                    targets: &mut targets,
                    textures: &mut textures,
                    settings: &settings,
                    screen,
                    fullscreen_geometry: fullscreen,
                };
                if let Some(stage) = create_stage(stage_config, &mut ctx) {
                    stages.push(stage);
                }
            }
        }
        // Execution follows the fixed stage order, not config order.
        stages.sort_by_key(|stage| stage.kind());

        log::info!(
            "Renderer up: {} stages, {}x{}, {} workers",
            stages.len(),
            screen.0,
            screen.1,
            WORKER_THREADS
        );

        Ok(Self {
            backend,
            cache,
            settings,
            targets,
            textures,
            screen,
            fullscreen,
            stages,
            pool,
        })
    }

    pub fn with_default_pipeline(
        backend: B,
        settings: RenderSettings,
    ) -> Result<Self, RendererError> {
        Self::new(backend, settings, &PipelineConfig::standard_deferred())
    }

    /// Renders one frame. Stage updates run on the worker pool against the
    /// immutable snapshot; backend submission happens here, sequentially,
    /// in stage order.
    pub fn render_frame(&mut self, scene: &mut Scene) {
        let frame = scene.snapshot();

        for stage in &mut self.stages {
            stage.clear_stage();
        }

        let stages = &mut self.stages;
        self.pool.install(|| {
            stages.par_iter_mut().for_each(|stage| stage.update(&frame));
        });

        for stage in &self.stages {
            stage.execute(&mut self.backend, &mut self.cache);
        }
    }

    /// Recreates every size-dependent resource. Runs to completion before
    /// the next frame; stages are rebuilt in init order so cross-stage
    /// texture references resolve against the new targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.screen || width == 0 || height == 0 {
            return;
        }
        self.screen = (width, height);

        for handle in self.targets.values() {
            self.backend.remove_resource(*handle);
        }
        self.targets.clear();

        for kind in INIT_ORDER {
            let Some(index) = self.stages.iter().position(|s| s.kind() == kind) else {
                continue;
            };
            let mut ctx = InitContext {
                backend: &mut self.backend,
                cache: &mut self.cache,
                targets: &mut self.targets,
                textures: &mut self.textures,
                settings: &self.settings,
                screen: self.screen,
                fullscreen_geometry: self.fullscreen,
            };
            self.stages[index].resize_resources(&mut ctx);
        }
        log::info!("Resized render resources to {}x{}", width, height);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Handle of a named offline render target, if the pipeline created
    /// one under that name.
    pub fn target_handle(&self, name: &str) -> Option<u32> {
        self.targets.get(name).copied()
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|stage| stage.kind()).collect()
    }

    pub fn shader_cache(&self) -> &ShaderCache {
        &self.cache
    }
}

/// One oversized triangle covering the screen; cheaper than a quad and
/// immune to the diagonal seam.
fn create_fullscreen_triangle(backend: &mut dyn GraphicsBackend) -> Geometry {
    // x, y, z, u, v
    let vertices: [f32; 15] = [
        -1.0, -1.0, 0.0, 0.0, 0.0, //
        3.0, -1.0, 0.0, 2.0, 0.0, //
        -1.0, 3.0, 0.0, 0.0, 2.0,
    ];
    let indices: [u32; 3] = [0, 1, 2];

    Geometry {
        vertex_buffer: backend.create_vertex_buffer(bytemuck::cast_slice(&vertices)),
        index_buffer: backend.create_index_buffer(bytemuck::cast_slice(&indices)),
        index_count: 3,
        bounds: crate::geom::Aabb::new(
            glam::Vec3::new(-1.0, -1.0, 0.0),
            glam::Vec3::new(3.0, 3.0, 0.0),
        ),
    }
}
