//! Scene tree shared between the viewer handle and the HTTP thread.
//!
//! Paths are `/`-separated. A transform set on a path applies to every object
//! at or below it, composed from the root down.

use std::collections::BTreeMap;

use meshsdf_mesh::TriangleMesh;
use nalgebra::{Isometry3, Matrix4};
use serde::{Deserialize, Serialize};

/// Colour with alpha, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Opacity.
    pub a: f32,
}

impl Rgba {
    /// Build a colour.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone)]
struct SceneObject {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    rgba: Rgba,
}

/// One drawable object in a [`SceneSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// Scene path.
    pub path: String,
    /// Flat vertex positions.
    pub vertices: Vec<f32>,
    /// Flat triangle indices.
    pub indices: Vec<u32>,
    /// Colour and opacity.
    pub rgba: [f32; 4],
    /// World transform, 4x4 column-major.
    pub transform: [f32; 16],
}

/// A UI button and how often it was pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    /// Label, also the button's identifier.
    pub name: String,
    /// Presses since the button was added.
    pub clicks: u32,
}

/// Everything needed to draw the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Bumped whenever objects or buttons change.
    pub revision: u64,
    /// Simulated time shown in the page.
    pub time: f64,
    /// Objects in path order.
    pub objects: Vec<ObjectSnapshot>,
    /// Buttons in insertion order.
    pub buttons: Vec<ButtonState>,
}

/// Frequently-changing part of the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Same counter as [`SceneSnapshot::revision`].
    pub revision: u64,
    /// Simulated time.
    pub time: f64,
    /// World transform per object path, column-major.
    pub transforms: BTreeMap<String, [f32; 16]>,
    /// Buttons in insertion order.
    pub buttons: Vec<ButtonState>,
}

/// Mutable scene held behind the viewer's mutex.
#[derive(Debug, Default)]
pub(crate) struct SceneState {
    revision: u64,
    time: f64,
    objects: BTreeMap<String, SceneObject>,
    transforms: BTreeMap<String, Matrix4<f32>>,
    buttons: Vec<ButtonState>,
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_within(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

fn column_major(m: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

impl SceneState {
    pub(crate) fn set_object(&mut self, path: &str, mesh: &TriangleMesh, rgba: Rgba) {
        self.objects.insert(
            normalize(path),
            SceneObject {
                vertices: mesh.vertices.clone(),
                indices: mesh.indices.clone(),
                rgba,
            },
        );
        self.revision += 1;
    }

    pub(crate) fn set_transform(&mut self, path: &str, transform: &Isometry3<f32>) {
        self.transforms
            .insert(normalize(path), transform.to_homogeneous());
    }

    pub(crate) fn delete(&mut self, path: &str) {
        let prefix = normalize(path);
        self.objects.retain(|p, _| !is_within(p, &prefix));
        self.transforms.retain(|p, _| !is_within(p, &prefix));
        self.revision += 1;
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub(crate) fn add_button(&mut self, name: &str) {
        if let Some(button) = self.buttons.iter_mut().find(|b| b.name == name) {
            button.clicks = 0;
        } else {
            self.buttons.push(ButtonState {
                name: name.to_string(),
                clicks: 0,
            });
        }
        self.revision += 1;
    }

    pub(crate) fn delete_button(&mut self, name: &str) {
        self.buttons.retain(|b| b.name != name);
        self.revision += 1;
    }

    pub(crate) fn button_clicks(&self, name: &str) -> u32 {
        self.buttons
            .iter()
            .find(|b| b.name == name)
            .map_or(0, |b| b.clicks)
    }

    /// Register a press. Returns false for unknown buttons.
    pub(crate) fn click(&mut self, name: &str) -> bool {
        match self.buttons.iter_mut().find(|b| b.name == name) {
            Some(button) => {
                button.clicks += 1;
                true
            }
            None => false,
        }
    }

    /// World transform of `path`: every transform on the way down, composed.
    fn world_transform(&self, path: &str) -> Matrix4<f32> {
        let mut world = Matrix4::identity();
        let mut end = 0;
        loop {
            let next = path[end..].find('/').map(|i| end + i);
            let prefix = &path[..next.unwrap_or(path.len())];
            if let Some(m) = self.transforms.get(prefix) {
                world *= m;
            }
            match next {
                Some(i) => end = i + 1,
                None => break,
            }
        }
        world
    }

    pub(crate) fn scene(&self) -> SceneSnapshot {
        SceneSnapshot {
            revision: self.revision,
            time: self.time,
            objects: self
                .objects
                .iter()
                .map(|(path, object)| ObjectSnapshot {
                    path: path.clone(),
                    vertices: object.vertices.clone(),
                    indices: object.indices.clone(),
                    rgba: object.rgba.to_array(),
                    transform: column_major(&self.world_transform(path)),
                })
                .collect(),
            buttons: self.buttons.clone(),
        }
    }

    pub(crate) fn state(&self) -> StateSnapshot {
        StateSnapshot {
            revision: self.revision,
            time: self.time,
            transforms: self
                .objects
                .keys()
                .map(|path| (path.clone(), column_major(&self.world_transform(path))))
                .collect(),
            buttons: self.buttons.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, Vector3};

    fn triangle() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            normals: vec![],
        }
    }

    #[test]
    fn test_transforms_compose_down_the_tree() {
        let mut scene = SceneState::default();
        scene.set_object("/visual/mug/body/visual", &triangle(), Rgba::new(1.0, 0.0, 0.0, 1.0));
        scene.set_transform("visual", &Isometry3::from(Translation3::new(1.0, 0.0, 0.0)));
        scene.set_transform("visual/mug/body", &Isometry3::from(Translation3::new(0.0, 2.0, 0.0)));

        let snapshot = scene.scene();
        assert_eq!(snapshot.objects.len(), 1);
        assert_eq!(snapshot.objects[0].path, "visual/mug/body/visual");
        let t = snapshot.objects[0].transform;
        // Translation sits in the last column.
        assert_relative_eq!(Vector3::new(t[12], t[13], t[14]), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_sibling_prefix_not_matched() {
        let mut scene = SceneState::default();
        scene.set_object("visual/a", &triangle(), Rgba::new(0.0, 0.0, 0.0, 1.0));
        scene.set_object("visualx/a", &triangle(), Rgba::new(0.0, 0.0, 0.0, 1.0));
        scene.set_transform("visual", &Isometry3::from(Translation3::new(5.0, 0.0, 0.0)));
        let state = scene.state();
        assert_eq!(state.transforms["visual/a"][12], 5.0);
        assert_eq!(state.transforms["visualx/a"][12], 0.0);

        scene.delete("visual");
        let remaining: Vec<_> = scene.scene().objects.into_iter().map(|o| o.path).collect();
        assert_eq!(remaining, ["visualx/a"]);
    }

    #[test]
    fn test_buttons() {
        let mut scene = SceneState::default();
        let before = scene.revision;
        scene.add_button("Stop Simulation");
        assert!(scene.revision > before);
        assert_eq!(scene.button_clicks("Stop Simulation"), 0);
        assert!(scene.click("Stop Simulation"));
        assert!(scene.click("Stop Simulation"));
        assert_eq!(scene.button_clicks("Stop Simulation"), 2);
        assert!(!scene.click("Other"));
        scene.delete_button("Stop Simulation");
        assert_eq!(scene.button_clicks("Stop Simulation"), 0);
        assert!(scene.state().buttons.is_empty());
    }

    #[test]
    fn test_time_and_revision() {
        let mut scene = SceneState::default();
        scene.set_time(2.0);
        scene.set_transform("a", &Isometry3::identity());
        let state = scene.state();
        assert_eq!(state.time, 2.0);
        // Transforms alone do not force a full refetch.
        assert_eq!(state.revision, 0);
    }
}
