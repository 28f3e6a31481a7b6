use std::{fs, path::Path};

use cgmath::Vector4;
use deltaviewer::{
    config::{PathConfig, ViewerConfig},
    gfx::{device::RecordingDevice, geometry::generate_cube, scene::Transform},
    Viewer,
};

fn copy_shaders(root: &Path) -> PathConfig {
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/shaders");
    let shaders = root.join("shaders");
    fs::create_dir_all(&shaders).unwrap();
    for entry in fs::read_dir(bundled).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), shaders.join(entry.file_name())).unwrap();
    }
    PathConfig::with_root(root)
}

fn viewer(root: &Path) -> Viewer<RecordingDevice> {
    let mut config = ViewerConfig::default();
    config.paths = copy_shaders(root);
    config.geometry.vertex_capacity = 1 << 20;
    config.geometry.index_capacity = 1 << 20;
    Viewer::new(RecordingDevice::new(), config).unwrap()
}

#[test]
fn test_broken_shader_skips_draws_until_fixed() {
    let root = tempfile::tempdir().unwrap();
    let mut viewer = viewer(root.path());
    viewer
        .add_shape(&generate_cube(), Vector4::new(1.0, 0.5, 0.0, 1.0), Transform::new())
        .unwrap();
    assert_eq!(viewer.render_frame().draw_calls, 1);

    let fragment = viewer.config().paths.mesh_fragment_shader.clone();
    let good_source = fs::read_to_string(&fragment).unwrap();
    fs::write(&fragment, "@fragment fn fs_main( -> {").unwrap();

    // Only the plane shader survives
    assert_eq!(viewer.reload_shaders(), 1);
    assert!(!viewer.mesh_shader().is_valid());

    let stats = viewer.render_frame();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.skipped, 1);

    fs::write(&fragment, good_source).unwrap();
    assert_eq!(viewer.reload_shaders(), 2);
    assert!(viewer.mesh_shader().is_valid());
    assert_eq!(viewer.render_frame().draw_calls, 1);
}

#[test]
fn test_reload_swaps_program_under_existing_materials() {
    let root = tempfile::tempdir().unwrap();
    let mut viewer = viewer(root.path());
    let material = viewer.solid_material(Vector4::new(0.0, 1.0, 0.0, 1.0));
    let before = viewer.mesh_shader().program().unwrap();

    assert_eq!(viewer.reload_shaders(), 2);

    let after = material.borrow().shader().program().unwrap();
    assert_ne!(before, after);
    assert!(!viewer.device().is_live_program(before));
    assert!(viewer.device().is_live_program(after));
}
