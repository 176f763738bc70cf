//! Headless rendering to an RGBA buffer.
//!
//! Each call creates a fresh wgpu device, so textures recorded on datasets by
//! an earlier device are forgotten before drawing and re-uploaded lazily.

use pollster::FutureExt;
use tractview_core::Context;
use tractview_render::{SceneRenderer, WgpuBackend};

use crate::Result;

/// Renders one frame of `ctx` and returns `width * height * 4` bytes of RGBA.
///
/// # Example
/// ```no_run
/// use tractview::*;
///
/// let mut ctx = Context::default();
/// let mut renderer = SceneRenderer::new();
/// renderer.initialize(&ctx.options);
/// let pixels = render_context_to_image(&mut renderer, &mut ctx, 256, 256).unwrap();
/// assert_eq!(pixels.len(), 256 * 256 * 4);
/// ```
pub fn render_context_to_image(
    renderer: &mut SceneRenderer,
    ctx: &mut Context,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let mut backend = WgpuBackend::new_headless(width, height).block_on()?;

    forget_gpu_resources(ctx);

    let stats = renderer.render_frame(ctx, &mut backend)?;
    if stats.gpu_errors > 0 {
        log::warn!("headless frame finished with {} GPU errors", stats.gpu_errors);
    }
    Ok(backend.read_pixels()?)
}

/// Drops texture handles that belong to a previous device.
fn forget_gpu_resources(ctx: &mut Context) {
    let ids = ctx.registry.order().to_vec();
    for id in ids {
        if let Some(dataset) = ctx.registry.get_mut(id) {
            let _ = dataset.take_texture();
        }
    }
    let _ = ctx.registry.take_pending_releases();
}
