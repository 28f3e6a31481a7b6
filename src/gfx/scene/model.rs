//! OBJ model loading
//!
//! Every sub-mesh of the file becomes a [`ModelPart`]: its vertices go into
//! the [`GeometryArena`] and it gets a [`Material`] on the shader the caller
//! provides. Diffuse and specular maps named by the MTL file are loaded
//! through the [`ResourceCache`], relative to the model's directory.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use cgmath::{InnerSpace, Vector3, Vector4};

use crate::gfx::{
    device::RenderDevice,
    error::ModelError,
    geometry::{GeometryArena, GeometryHandle, Vertex},
    resources::{Material, ResourceCache, SharedMaterial, SharedShader, TextureKind},
};

use super::{
    scene::{EntityId, SceneGraph},
    transform::Transform,
};

const DEFAULT_DIFFUSE: [f32; 3] = [0.8, 0.8, 0.8];
const DEFAULT_SHININESS: f32 = 32.0;

/// One drawable piece of a model
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub name: String,
    pub geometry: GeometryHandle,
    pub material: SharedMaterial,
}

#[derive(Debug, Clone)]
pub struct Model {
    path: PathBuf,
    parts: Vec<ModelPart>,
}

impl Model {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parts(&self) -> &[ModelPart] {
        &self.parts
    }

    /// Adds one entity per part, all sharing `transform`.
    pub fn add_to_scene(&self, scene: &mut SceneGraph, transform: Transform) -> Vec<EntityId> {
        self.parts
            .iter()
            .map(|part| {
                scene.add_entity(
                    Some(part.geometry),
                    Some(part.material.clone()),
                    transform.clone(),
                )
            })
            .collect()
    }
}

pub struct ModelLoader;

impl ModelLoader {
    /// Loads an OBJ file (and its MTL, if any) into the arena.
    ///
    /// Parts that do not fit in the arena are skipped with an error log. The
    /// load fails only when the file cannot be parsed, no part could be
    /// uploaded, or the device rejects a texture.
    pub fn load_obj(
        device: &mut dyn RenderDevice,
        arena: &mut GeometryArena,
        cache: &mut ResourceCache,
        path: impl AsRef<Path>,
        shader: &SharedShader,
    ) -> Result<Model, ModelError> {
        let path = path.as_ref();
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| ModelError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("No usable MTL for '{}': {}", path.display(), e);
            Vec::new()
        });
        let directory = path.parent().unwrap_or_else(|| Path::new(""));

        // One shared material per MTL entry; `None` is the default material
        let mut built: HashMap<Option<usize>, SharedMaterial> = HashMap::new();
        let mut parts = Vec::with_capacity(models.len());

        for model in &models {
            let (vertices, indices) = mesh_vertices(&model.mesh);
            if indices.is_empty() {
                log::debug!("Skipping empty mesh '{}'", model.name);
                continue;
            }

            let geometry = match arena.try_upload(device, &vertices, &indices) {
                Ok(handle) => handle,
                Err(e) => {
                    log::error!(
                        "Skipping mesh '{}' of '{}': {}",
                        model.name,
                        path.display(),
                        e
                    );
                    continue;
                }
            };

            let material_id = model.mesh.material_id.filter(|&id| id < materials.len());
            let material = match built.get(&material_id) {
                Some(material) => material.clone(),
                None => {
                    let material = build_material(
                        device,
                        cache,
                        shader,
                        directory,
                        material_id.map(|id| &materials[id]),
                    )?;
                    built.insert(material_id, material.clone());
                    material
                }
            };

            parts.push(ModelPart {
                name: model.name.clone(),
                geometry,
                material,
            });
        }

        if parts.is_empty() {
            return Err(ModelError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!(
            "Loaded model '{}': {} parts, {} materials",
            path.display(),
            parts.len(),
            built.len()
        );

        Ok(Model {
            path: path.to_path_buf(),
            parts,
        })
    }
}

fn build_material(
    device: &mut dyn RenderDevice,
    cache: &mut ResourceCache,
    shader: &SharedShader,
    directory: &Path,
    mtl: Option<&tobj::Material>,
) -> Result<SharedMaterial, ModelError> {
    let mut material = Material::new(shader.clone());

    let diffuse = mtl.and_then(|m| m.diffuse).unwrap_or(DEFAULT_DIFFUSE);
    let alpha = mtl.and_then(|m| m.dissolve).unwrap_or(1.0);
    material.set_vec4(
        "color",
        Vector4::new(diffuse[0], diffuse[1], diffuse[2], alpha),
    );
    material.set_float(
        "shininess",
        mtl.and_then(|m| m.shininess).unwrap_or(DEFAULT_SHININESS),
    );
    material.set_transparent(alpha < 1.0);

    let mut textured = false;
    if let Some(mtl) = mtl {
        for (file, kind) in [
            (&mtl.diffuse_texture, TextureKind::Diffuse),
            (&mtl.specular_texture, TextureKind::Specular),
        ] {
            let (Some(file), Some(uniform)) = (file, kind.uniform_name()) else {
                continue;
            };
            let texture = cache.load_texture(device, directory.join(file), kind)?;
            material.set_texture(uniform, texture);
            textured = true;
        }
    }
    material.set_bool("use_textures", textured);

    Ok(material.shared())
}

/// Interleaves a tobj mesh. Missing normals are replaced by smooth normals.
fn mesh_vertices(mesh: &tobj::Mesh) -> (Vec<Vertex>, Vec<u32>) {
    let vertex_count = mesh.positions.len() / 3;
    let normals = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals.clone()
    } else {
        smooth_normals(&mesh.positions, &mesh.indices)
    };
    let has_tex_coords = mesh.texcoords.len() / 2 == vertex_count;

    let vertices = (0..vertex_count)
        .map(|i| Vertex {
            position: [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ],
            normal: [normals[3 * i], normals[3 * i + 1], normals[3 * i + 2]],
            tex_coords: if has_tex_coords {
                [mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]]
            } else {
                [0.0, 0.0]
            },
        })
        .collect();

    (vertices, mesh.indices.clone())
}

/// Area-weighted average of the face normals around each vertex
pub fn smooth_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let position = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); vertex_count];
    for triangle in indices.chunks_exact(3) {
        if triangle.iter().any(|&i| i as usize >= vertex_count) {
            continue;
        }
        let (a, b, c) = (position(triangle[0]), position(triangle[1]), position(triangle[2]));
        // |cross| is twice the triangle area
        let face = (b - a).cross(c - a);
        for &i in triangle {
            accumulated[i as usize] += face;
        }
    }

    accumulated
        .into_iter()
        .flat_map(|n| {
            let n = if n.magnitude2() > 0.0 {
                n.normalize()
            } else {
                Vector3::unit_z()
            };
            [n.x, n.y, n.z]
        })
        .collect()
}
