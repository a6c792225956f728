//! Collage Editor
//!
//! Headless driver for the scene engine. Replays a short editing session
//! (add, box select, drag, undo/redo, save point) and logs the resulting
//! state. Pass a settings JSON path as the first argument to override the
//! defaults.

use anyhow::{Context, Result};
use collage_asset::{MeshManager, TextureDesc, TextureManager, UNIT_SQUARE_MESH};
use collage_core::selection::{CpuHitTester, PointerTarget};
use collage_core::view::ViewTransform;
use collage_core::{CanvasSettings, EditCommand, Layer, LayerFlags, ResourceHandle, Scene};
use glam::{vec2, Vec2};

/// Placeholder pixel payload; a windowed build stores GPU textures instead.
type Pixels = Vec<u8>;

fn load_settings() -> Result<CanvasSettings> {
    match std::env::args().nth(1) {
        Some(path) => CanvasSettings::load(&path).with_context(|| format!("loading settings from {path}")),
        None => Ok(CanvasSettings::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Collage Editor v{}", collage_core::VERSION);
    let settings = load_settings()?;
    tracing::debug!(?settings, "settings loaded");

    let meshes = MeshManager::with_unit_square(settings.max_mesh_triangles).context("creating mesh arena")?;
    let textures: TextureManager<Pixels> = TextureManager::new(settings.max_textures);
    let square = meshes
        .mesh_info(UNIT_SQUARE_MESH)
        .context("unit square mesh missing")?;

    let mut scene = Scene::new(&settings);
    let mut tester = CpuHitTester::background();
    let mut view = ViewTransform::default();

    // A textured photo and two flat swatches.
    let photo_desc = TextureDesc::rgba(64, 64);
    let photo = textures.add(photo_desc, vec![200; photo_desc.byte_len()])?;
    let none = ResourceHandle::invalid();

    let layer = |center: Vec2, size: f32| {
        Layer::quad(center, vec2(size, 0.0), vec2(0.0, size)).with_mesh(square.start, square.len)
    };
    scene.add_layer(layer(vec2(100.0, 100.0), 80.0), &photo, &none)?;
    scene.add_layer(layer(vec2(300.0, 100.0), 40.0).with_color([255, 64, 64, 255]), &none, &none)?;
    scene.add_layer(
        layer(vec2(140.0, 130.0), 30.0)
            .with_color([64, 64, 255, 255])
            .with_flags(LayerFlags::HAS_PILL_ALPHA_TEX),
        &none,
        &none,
    )?;
    drop(photo);
    tracing::info!(layers = scene.layers.len(), textures = textures.cur_length(), "canvas populated");

    // Rubber-band select the left group in window space, then drag it.
    view.zoom_at(vec2(0.0, 0.0), 1.0, settings.zoom_scale_factor);
    let to_canvas = |view: &ViewTransform, x: f32, y: f32| view.to_canvas(vec2(x, y));

    scene.selection.pointer_down(
        to_canvas(&view, 0.0, 0.0),
        PointerTarget::Canvas,
        &scene.layers,
        &mut scene.history,
    );
    scene.selection.pointer_move(to_canvas(&view, 150.0, 150.0), &mut scene.layers);
    settle(&mut scene, &mut tester);
    let box_end = to_canvas(&view, 250.0, 250.0);
    scene.selection.pointer_move(box_end, &mut scene.layers);
    scene.selection.pointer_up(box_end, &scene.layers, &mut scene.history);
    settle(&mut scene, &mut tester);
    tracing::info!(selected = scene.layers.num_selected(), "box selection done");

    let grab = scene.selection.selection_center();
    let target = scene.selection.target_at(
        grab,
        view.canvas_length(settings.handle_half_size),
        view.canvas_length(settings.rotate_handle_height),
    );
    scene.selection.pointer_down(grab, target, &scene.layers, &mut scene.history);
    for step in 1..=10 {
        scene
            .selection
            .pointer_move(grab + vec2(step as f32 * 5.0, 0.0), &mut scene.layers);
    }
    scene
        .selection
        .pointer_up(grab + vec2(50.0, 0.0), &scene.layers, &mut scene.history);
    settle(&mut scene, &mut tester);
    tracing::info!(?target, center = ?scene.selection.selection_center(), "drag done");

    scene.mark_saved();
    scene.apply(EditCommand::FlipHorizontal);
    scene.apply(EditCommand::Duplicate(vec2(0.0, 120.0)));
    tracing::info!(layers = scene.layers.len(), dirty = scene.is_dirty(), "edits applied");

    scene.apply(EditCommand::Undo);
    scene.apply(EditCommand::Undo);
    tracing::info!(layers = scene.layers.len(), dirty = scene.is_dirty(), "back at save point");
    scene.apply(EditCommand::Redo);
    settle(&mut scene, &mut tester);

    tracing::info!(
        layers = scene.layers.len(),
        selected = scene.layers.num_selected(),
        history = scene.history.len(),
        textures = textures.cur_length(),
        triangles = scene.layers.triangle_count(),
        "session finished"
    );
    Ok(())
}

/// Run frames until the background hit test has answered.
fn settle(scene: &mut Scene, tester: &mut CpuHitTester) {
    for _ in 0..1000 {
        scene.frame(tester);
        if scene.selection.is_ready() && scene.selection.pending() == collage_core::selection::SelectDispatch::None {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    tracing::warn!("hit test did not settle");
}
