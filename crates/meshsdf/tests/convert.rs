use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use meshsdf::{
    create_sdf_with, create_sdf_with_convex_decomp, ConvertError, ConvertOptions,
    ConvexDecomposer, DecompositionError, DecompositionParams, NoPreview, Preview, TriangleMesh,
};
use meshsdf_mesh::save_mesh;
use meshsdf_sdf::Geometry;
use nalgebra::Vector3;

fn write_box(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    save_mesh(&path, &TriangleMesh::cuboid(Vector3::new(0.1, 0.1, 0.1))).unwrap();
    path
}

fn fast_options() -> ConvertOptions {
    ConvertOptions {
        decomposition: DecompositionParams {
            resolution: 4000,
            max_hulls: 4,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn piece_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[test]
fn test_box_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_box(dir.path(), "block.obj");

    let report = create_sdf_with_convex_decomp(&input, &fast_options()).unwrap();
    assert_eq!(report.sdf_path, dir.path().join("block.sdf"));
    assert_eq!(report.parts_dir, dir.path().join("block_parts"));
    assert!(!report.decomposition_failed);

    // 0.1 m cube at 2000 kg/m^3.
    assert_relative_eq!(report.inertial.mass, 2.0, epsilon = 1e-3);

    let descriptor = meshsdf_sdf::load(&report.sdf_path).unwrap();
    assert_eq!(descriptor.model.name, "block");
    let link = &descriptor.model.links[0];
    assert_eq!(link.name, "block_body_link");

    let inertial = link.inertial.as_ref().unwrap();
    assert_relative_eq!(inertial.mass, report.inertial.mass, max_relative = 1e-4);
    let i = inertial.inertia.to_matrix();
    assert_relative_eq!(i, i.transpose(), epsilon = 1e-9);
    // m * (a^2 + a^2) / 12
    assert_relative_eq!(i[(0, 0)], 2.0 * 0.02 / 12.0, max_relative = 1e-3);

    match &link.visuals[0].geometry {
        Geometry::Mesh(mesh) => {
            assert_eq!(mesh.uri, "block.obj");
            assert_eq!(mesh.scale, Some(Vector3::repeat(1.0)));
        }
        other => panic!("unexpected visual geometry {other:?}"),
    }

    let files = piece_files(&report.parts_dir);
    assert!(!files.is_empty());
    assert!(files.len() <= 4);
    assert_eq!(files, report.piece_paths);
    assert_eq!(link.collisions.len(), files.len());
    for (k, collision) in link.collisions.iter().enumerate() {
        assert_eq!(collision.name, format!("collision_{k:04}"));
        match &collision.geometry {
            Geometry::Mesh(mesh) => {
                assert!(mesh.declare_convex);
                assert_eq!(mesh.uri, format!("block_parts/block_convex_piece_{k:03}.obj"));
                assert!(mesh.resolve(dir.path()).unwrap().exists());
            }
            other => panic!("unexpected collision geometry {other:?}"),
        }
    }
}

#[test]
fn test_conversion_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_box(dir.path(), "block.obj");

    let first = create_sdf_with_convex_decomp(&input, &fast_options()).unwrap();
    let sdf = fs::read(&first.sdf_path).unwrap();
    let pieces: Vec<_> = first.piece_paths.iter().map(|p| fs::read(p).unwrap()).collect();

    let second = create_sdf_with_convex_decomp(&input, &fast_options()).unwrap();
    assert_eq!(fs::read(&second.sdf_path).unwrap(), sdf);
    let again: Vec<_> = second.piece_paths.iter().map(|p| fs::read(p).unwrap()).collect();
    assert_eq!(again, pieces);
}

#[test]
fn test_scale_applies_to_mass_and_visual() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_box(dir.path(), "block.obj");
    let options = ConvertOptions {
        scale: 2.0,
        ..fast_options()
    };

    let report = create_sdf_with_convex_decomp(&input, &options).unwrap();
    assert_relative_eq!(report.inertial.mass, 16.0, max_relative = 1e-3);

    let descriptor = meshsdf_sdf::load(&report.sdf_path).unwrap();
    match &descriptor.model.links[0].visuals[0].geometry {
        Geometry::Mesh(mesh) => assert_eq!(mesh.scale, Some(Vector3::repeat(2.0))),
        other => panic!("unexpected visual geometry {other:?}"),
    }
}

struct FailingDecomposer;

impl ConvexDecomposer for FailingDecomposer {
    fn decompose(&self, _mesh: &TriangleMesh) -> Result<Vec<TriangleMesh>, DecompositionError> {
        Err(DecompositionError::Library("boom".into()))
    }
}

#[derive(Default)]
struct RecordingPreview {
    meshes: usize,
    pieces: Option<usize>,
}

impl Preview for RecordingPreview {
    fn show_mesh(&mut self, _mesh: &TriangleMesh) {
        self.meshes += 1;
    }

    fn show_pieces(&mut self, pieces: &[TriangleMesh]) {
        self.pieces = Some(pieces.len());
    }
}

#[test]
fn test_failed_decomposition_still_writes_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_box(dir.path(), "block.obj");
    let mut preview = RecordingPreview::default();

    let report = create_sdf_with(&input, &fast_options(), &FailingDecomposer, &mut preview).unwrap();
    assert!(report.decomposition_failed);
    assert!(report.piece_paths.is_empty());
    assert!(report.parts_dir.is_dir());
    assert!(piece_files(&report.parts_dir).is_empty());
    assert_eq!(preview.meshes, 1);
    assert_eq!(preview.pieces, Some(0));

    let descriptor = meshsdf_sdf::load(&report.sdf_path).unwrap();
    let link = &descriptor.model.links[0];
    assert!(link.collisions.is_empty());
    assert_eq!(link.visuals.len(), 1);
    assert!(link.inertial.is_some());
}

#[test]
fn test_preview_sees_pieces() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_box(dir.path(), "block.obj");
    let mut preview = RecordingPreview::default();
    let decomposer = meshsdf::VhacdDecomposer::new(fast_options().decomposition);

    let report = create_sdf_with(&input, &fast_options(), &decomposer, &mut preview).unwrap();
    assert_eq!(preview.meshes, 1);
    assert_eq!(preview.pieces, Some(report.piece_paths.len()));
}

#[test]
fn test_missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.obj");

    let err = create_sdf_with(&input, &fast_options(), &FailingDecomposer, &mut NoPreview)
        .unwrap_err();
    assert!(matches!(err, ConvertError::MissingInput(_)));
    assert!(piece_files(dir.path()).is_empty());
}

#[test]
fn test_visual_simplification() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ball.obj");
    let sphere = TriangleMesh::uv_sphere(0.05, 16, 32);
    save_mesh(&input, &sphere).unwrap();
    let options = ConvertOptions {
        do_visual_simplification: true,
        target_tris: 100,
        ..fast_options()
    };

    let report = create_sdf_with_convex_decomp(&input, &options).unwrap();
    assert_eq!(report.visual_path, dir.path().join("ball_simple_vis.obj"));
    let simplified = meshsdf_mesh::load_mesh(&report.visual_path).unwrap();
    assert!(simplified.num_triangles() < sphere.num_triangles());
    assert!(simplified.num_triangles() > 0);

    let descriptor = meshsdf_sdf::load(&report.sdf_path).unwrap();
    match &descriptor.model.links[0].visuals[0].geometry {
        Geometry::Mesh(mesh) => assert_eq!(mesh.uri, "ball_simple_vis.obj"),
        other => panic!("unexpected visual geometry {other:?}"),
    }
}
