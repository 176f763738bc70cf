//! Shader and texture binding.
//!
//! Before a pass draws, the binder makes the volume textures resident and
//! bound, activates the program for the pass, and pushes that pass's uniforms.
//! Passes run one after another, so there is only ever one set of bindings.

use glam::Vec4;
use tractview_core::{Dataset, DatasetId, DatasetRegistry, DatasetType, TextureId};

use crate::backend::{GpuBackend, ProgramKind, TextureContent, TextureFilter, Uniform};
use crate::error::{RenderError, RenderResult};

/// Texture units available to the slice program.
pub const MAX_TEXTURES: usize = 10;

/// Program selection and uniform set for one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassUniforms {
    Slices {
        use_color_map: bool,
    },
    Mesh {
        show_fs: bool,
        use_tex: bool,
        alpha: f32,
        use_lic: bool,
        is_glyph: bool,
        cut_at_surface: bool,
        light_on: bool,
    },
    SplineSurface {
        show_fs: bool,
        use_tex: bool,
        use_color_map: bool,
        use_lic: bool,
    },
    Legend {
        use_color_map: bool,
    },
    /// Edges between spline points. A zero `global_color` keeps the
    /// per-edge vertex colors.
    Graph {
        global_color: Vec4,
    },
    /// Glyphs, fibers and wireframes: no program, vertex colors only.
    FixedFunction,
}

impl PassUniforms {
    #[must_use]
    pub fn program(&self) -> Option<ProgramKind> {
        match self {
            Self::Slices { .. } => Some(ProgramKind::Slices),
            Self::Mesh { .. } => Some(ProgramKind::Mesh),
            Self::SplineSurface { .. } => Some(ProgramKind::SplineSurface),
            Self::Legend { .. } => Some(ProgramKind::Legend),
            Self::Graph { .. } => Some(ProgramKind::Graph),
            Self::FixedFunction => None,
        }
    }

    /// The pass-specific uniforms, in push order.
    #[must_use]
    pub fn uniforms(&self) -> Vec<Uniform> {
        match *self {
            Self::Slices { use_color_map } | Self::Legend { use_color_map } => {
                vec![Uniform::UseColorMap(use_color_map)]
            }
            Self::Mesh {
                show_fs,
                use_tex,
                alpha,
                use_lic,
                is_glyph,
                cut_at_surface,
                light_on,
            } => vec![
                Uniform::ShowFs(show_fs),
                Uniform::UseTex(use_tex),
                Uniform::Alpha(alpha),
                Uniform::UseLic(use_lic),
                Uniform::IsGlyph(is_glyph),
                Uniform::CutAtSurface(cut_at_surface),
                Uniform::LightOn(light_on),
            ],
            Self::SplineSurface {
                show_fs,
                use_tex,
                use_color_map,
                use_lic,
            } => vec![
                Uniform::ShowFs(show_fs),
                Uniform::UseTex(use_tex),
                Uniform::UseColorMap(use_color_map),
                Uniform::UseLic(use_lic),
            ],
            Self::Graph { global_color } => vec![Uniform::Color(global_color)],
            Self::FixedFunction => Vec::new(),
        }
    }
}

/// A volume bound for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundTexture {
    pub unit: usize,
    pub dataset: DatasetId,
    pub threshold: f32,
    pub alpha: f32,
    pub content: TextureContent,
}

/// Tracks texture units and the active program.
#[derive(Debug)]
pub struct ShaderTextureBinder {
    max_textures: usize,
    bound: Vec<BoundTexture>,
    active: Option<ProgramKind>,
}

impl Default for ShaderTextureBinder {
    fn default() -> Self {
        Self::new(MAX_TEXTURES)
    }
}

impl ShaderTextureBinder {
    /// Creates a binder using at most `max_textures` units, capped at [`MAX_TEXTURES`].
    #[must_use]
    pub fn new(max_textures: usize) -> Self {
        Self {
            max_textures: max_textures.min(MAX_TEXTURES),
            bound: Vec::new(),
            active: None,
        }
    }

    /// Resets per-frame state and frees textures of unloaded datasets.
    pub fn begin_frame(&mut self, backend: &mut dyn GpuBackend, registry: &mut DatasetRegistry) {
        for texture in registry.take_pending_releases() {
            backend.release_texture(texture);
        }
        self.bound.clear();
        self.active = None;
    }

    /// Binds the visible volumes in display order, uploading textures on
    /// first use, and returns how many were bound.
    ///
    /// Binding stops with a warning as soon as the last unit is taken;
    /// volumes past the limit are simply not drawn this frame.
    pub fn bind_visible_volume_textures(
        &mut self,
        backend: &mut dyn GpuBackend,
        registry: &mut DatasetRegistry,
    ) -> usize {
        self.bound.clear();
        let ids = registry.order().to_vec();
        for id in ids {
            if self.bound.len() >= self.max_textures {
                break;
            }
            let Some(dataset) = registry.get_mut(id) else {
                continue;
            };
            // Tensor and ODF fields rank as volumes but draw as glyphs.
            if !dataset.status.visible || !dataset.is_volume() || dataset.volume().is_none() {
                continue;
            }
            let texture = match ensure_resident(backend, dataset) {
                Ok(texture) => texture,
                Err(e) => {
                    log::warn!("couldn't upload '{}': {e}", dataset.name());
                    continue;
                }
            };
            let filter = if dataset.status.full_smoothing {
                TextureFilter::Linear
            } else {
                TextureFilter::Nearest
            };
            let unit = self.bound.len();
            backend.bind_texture_3d(unit, texture, filter);
            self.bound.push(BoundTexture {
                unit,
                dataset: id,
                threshold: dataset.status.threshold,
                alpha: dataset.status.alpha,
                content: content_of(dataset.dataset_type()),
            });
            if self.bound.len() == self.max_textures {
                log::warn!("reached {} textures, remaining volumes are not shown", self.max_textures);
                break;
            }
        }
        self.bound.len()
    }

    /// Activates the program for a pass and pushes its uniforms.
    ///
    /// The slice program also receives the per-unit thresholds, opacities
    /// and content kinds of the textures bound this frame.
    pub fn activate(&mut self, backend: &mut dyn GpuBackend, pass: &PassUniforms) {
        let program = pass.program();
        backend.use_program(program);
        self.active = program;

        if program == Some(ProgramKind::Slices) {
            backend.set_uniform(Uniform::TextureCount(self.bound.len() as u32));
            for b in &self.bound {
                backend.set_uniform(Uniform::TextureThreshold {
                    unit: b.unit,
                    value: b.threshold,
                });
                backend.set_uniform(Uniform::TextureAlpha {
                    unit: b.unit,
                    value: b.alpha,
                });
                backend.set_uniform(Uniform::TextureContent {
                    unit: b.unit,
                    content: b.content,
                });
            }
        }
        for uniform in pass.uniforms() {
            backend.set_uniform(uniform);
        }
    }

    /// Textures bound this frame, unit 0 first.
    #[must_use]
    pub fn bound(&self) -> &[BoundTexture] {
        &self.bound
    }

    /// Returns true once every available unit was bound this frame.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.bound.len() >= self.max_textures
    }

    #[must_use]
    pub fn active_program(&self) -> Option<ProgramKind> {
        self.active
    }
}

fn ensure_resident(backend: &mut dyn GpuBackend, dataset: &mut Dataset) -> RenderResult<TextureId> {
    if let Some(texture) = dataset.texture() {
        return Ok(texture);
    }
    let Some(volume) = dataset.volume() else {
        return Err(RenderError::TextureCreationFailed(format!(
            "'{}' has no voxel payload",
            dataset.name()
        )));
    };
    let texture = backend.upload_volume_texture(volume.dims().as_uvec3(), &volume.to_rgba())?;
    dataset.set_texture(texture);
    Ok(texture)
}

fn content_of(ty: DatasetType) -> TextureContent {
    match ty {
        DatasetType::HeadByte | DatasetType::HeadShort => TextureContent::Scalar,
        DatasetType::Overlay => TextureContent::Overlay,
        _ => TextureContent::Color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Command, RecordingBackend};
    use tractview_core::{DatasetData, LoadedPayload, VolumeData, VolumeDims, VoxelFormat};

    fn add_volume(reg: &mut DatasetRegistry, name: &str, smooth: bool) -> DatasetId {
        let dims = VolumeDims::new(2, 2, 2);
        let volume = VolumeData::new(dims, VoxelFormat::Byte, vec![0.0; 8]).unwrap();
        let mut payload = LoadedPayload::new(DatasetData::Anatomy(volume));
        payload.status = Some(tractview_core::DatasetStatus {
            full_smoothing: smooth,
            ..Default::default()
        });
        reg.register(name.into(), payload).unwrap()
    }

    #[test]
    fn test_binds_in_display_order_with_filters() {
        let mut reg = DatasetRegistry::new();
        let a = add_volume(&mut reg, "a.nii", true);
        let b = add_volume(&mut reg, "b.nii", false);
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();

        assert_eq!(binder.bind_visible_volume_textures(&mut backend, &mut reg), 2);
        assert_eq!(binder.bound()[0].dataset, b);
        assert_eq!(binder.bound()[1].dataset, a);

        let binds: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::BindTexture { unit, filter, .. } => Some((*unit, *filter)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![(0, TextureFilter::Nearest), (1, TextureFilter::Linear)]);
        assert!(reg.get(a).unwrap().is_resident());
    }

    #[test]
    fn test_uploads_only_once() {
        let mut reg = DatasetRegistry::new();
        add_volume(&mut reg, "a.nii", true);
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        binder.bind_visible_volume_textures(&mut backend, &mut reg);
        binder.bind_visible_volume_textures(&mut backend, &mut reg);
        let uploads = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Upload { .. }))
            .count();
        assert_eq!(uploads, 1);
    }

    #[test]
    fn test_caps_at_max_textures() {
        let mut reg = DatasetRegistry::new();
        for i in 0..12 {
            add_volume(&mut reg, &format!("v{i}.nii"), true);
        }
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        assert_eq!(binder.bind_visible_volume_textures(&mut backend, &mut reg), MAX_TEXTURES);
        assert_eq!(backend.resident_textures(), MAX_TEXTURES);
    }

    #[test]
    fn test_exactly_max_textures_fills_every_unit() {
        let mut reg = DatasetRegistry::new();
        for i in 0..MAX_TEXTURES {
            add_volume(&mut reg, &format!("v{i}.nii"), false);
        }
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        assert_eq!(binder.bind_visible_volume_textures(&mut backend, &mut reg), MAX_TEXTURES);
        assert!(binder.is_full());
    }

    #[test]
    fn test_skips_hidden_and_failed_uploads() {
        let mut reg = DatasetRegistry::new();
        let a = add_volume(&mut reg, "a.nii", true);
        reg.get_mut(a).unwrap().status.visible = false;
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        assert_eq!(binder.bind_visible_volume_textures(&mut backend, &mut reg), 0);

        reg.get_mut(a).unwrap().status.visible = true;
        backend.set_fail_uploads(true);
        assert_eq!(binder.bind_visible_volume_textures(&mut backend, &mut reg), 0);
        assert!(!reg.get(a).unwrap().is_resident());
    }

    #[test]
    fn test_activate_pushes_pass_uniforms() {
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        binder.activate(
            &mut backend,
            &PassUniforms::Mesh {
                show_fs: true,
                use_tex: false,
                alpha: 0.5,
                use_lic: false,
                is_glyph: false,
                cut_at_surface: false,
                light_on: true,
            },
        );
        assert_eq!(binder.active_program(), Some(ProgramKind::Mesh));
        assert_eq!(backend.commands()[0], Command::UseProgram(Some(ProgramKind::Mesh)));
        assert!(backend
            .commands()
            .contains(&Command::SetUniform(Uniform::Alpha(0.5))));

        backend.clear();
        binder.activate(&mut backend, &PassUniforms::FixedFunction);
        assert_eq!(backend.commands(), &[Command::UseProgram(None)]);
    }

    #[test]
    fn test_begin_frame_releases_unloaded_textures() {
        let mut reg = DatasetRegistry::new();
        let a = add_volume(&mut reg, "a.nii", true);
        let mut backend = RecordingBackend::new();
        let mut binder = ShaderTextureBinder::default();
        binder.bind_visible_volume_textures(&mut backend, &mut reg);
        assert_eq!(backend.resident_textures(), 1);

        reg.unload(a);
        binder.begin_frame(&mut backend, &mut reg);
        assert_eq!(backend.resident_textures(), 0);
        assert!(binder.bound().is_empty());
    }
}
