use std::path::{Path, PathBuf};

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};
use deltaviewer::{
    config::{PathConfig, ViewerConfig},
    gfx::{
        device::{RecordingDevice, RenderDevice},
        geometry::{generate_cube, generate_quad, GeometryArena, GeometryHandle},
        scene::Transform,
    },
    logging::{init_logging, LoggingConfig},
    Viewer,
};

const MIB: u64 = 1024 * 1024;

fn assets() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets")
}

fn config() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.paths = PathConfig::with_root(assets());
    config.geometry.vertex_capacity = MIB;
    config.geometry.index_capacity = MIB;
    config
}

#[test]
fn test_two_quads_share_one_arena() {
    let mut device = RecordingDevice::new();
    let mut arena = GeometryArena::new(&mut device, MIB, MIB).unwrap();

    let (vertices, indices) = generate_quad().to_vertices();
    let first = arena.upload(&mut device, &vertices, &indices);
    let second = arena.upload(&mut device, &vertices, &indices);

    assert_eq!(first.base_vertex, 0);
    assert_eq!(second.base_vertex, 4);
    assert_eq!(second.index_byte_offset, first.index_byte_offset + 6 * 4);

    device.bind_vertex_array(arena.vertex_array().unwrap());
    first.draw_geometry(&mut device);
    second.draw_geometry(&mut device);

    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].base_vertex, 4);
    assert!(draws.iter().all(|d| d.vertex_array == arena.vertex_array()));

    GeometryHandle::INVALID.draw_geometry(&mut device);
    assert_eq!(device.draws().len(), 2);
}

#[test]
fn test_viewer_draws_scene_with_bundled_shaders() {
    init_logging(&LoggingConfig::default());
    let mut viewer = Viewer::new(RecordingDevice::new(), config()).unwrap();
    assert!(viewer.mesh_shader().is_valid());

    let left = Transform::from_position(Vector3::new(-1.0, 0.0, 0.0));
    let right = Transform::from_position(Vector3::new(1.0, 0.0, 0.0));
    let cube = viewer
        .add_shape(&generate_cube(), Vector4::new(0.2, 0.4, 0.8, 1.0), left.clone())
        .unwrap();
    viewer
        .add_shape(&generate_quad(), Vector4::new(1.0, 1.0, 1.0, 0.3), right)
        .unwrap();
    viewer
        .scene_mut()
        .add_clip_plane(Vector4::new(0.0, 0.0, 1.0, 0.0))
        .unwrap();

    let stats = viewer.render_frame();
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.opaque, 1);
    assert_eq!(stats.transparent, 2);
    assert_eq!(stats.skipped, 0);

    let draws = viewer.device().draws();
    // Opaque first, with depth writes
    assert!(draws[0].depth_write);
    assert_eq!(draws[0].model, Some(left.model_matrix()));
    assert!(draws[1..].iter().all(|d| !d.depth_write));

    viewer.scene_mut().remove_entity(cube);
    viewer.device_mut().take_commands();
    let stats = viewer.render_frame();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.opaque, 0);

    let device = viewer.shutdown();
    assert!(device.live_resources().is_empty());
}

#[test]
fn test_viewer_loads_obj_model() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("triangle.obj");
    std::fs::write(
        &obj,
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n",
    )
    .unwrap();

    let mut viewer = Viewer::new(RecordingDevice::new(), config()).unwrap();
    let entities = viewer.load_model(&obj).unwrap();
    assert_eq!(entities.len(), 1);

    let entity = viewer.scene().entity(entities[0]).unwrap();
    assert_eq!(entity.transform.model_matrix(), Matrix4::identity());

    let stats = viewer.render_frame();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(viewer.device().draws()[0].index_count, 3);
}

#[test]
fn test_missing_model_is_an_error() {
    let mut viewer = Viewer::new(RecordingDevice::new(), config()).unwrap();
    assert!(viewer.load_model("does/not/exist.obj").is_err());
    assert_eq!(viewer.scene().entity_count(), 0);
}
