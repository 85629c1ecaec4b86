//! Descriptor inspection: load into physics, weld, show, simulate.

use std::collections::HashSet;
use std::path::Path;

use meshsdf_physics::{PhysicsWorld, Role, Simulator};
use meshsdf_viewer::{Rgba, Viewer, ViewerConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::InspectError;

/// Label of the button that ends the inspection loop.
pub const STOP_BUTTON: &str = "Stop Simulation";

/// Seconds between viewer transform updates while simulating.
const PUBLISH_PERIOD: f64 = 1.0 / 32.0;

/// Settings for [`Inspector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectOptions {
    /// Physics step in seconds.
    pub time_step: f64,
    /// Simulated seconds between stop-button checks.
    pub advance_interval: f64,
    /// Target ratio of simulated to wall-clock time; 0 runs unpaced.
    pub realtime_rate: f64,
    /// Viewer address.
    pub viewer: ViewerConfig,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            advance_interval: 2.0,
            realtime_rate: 1.0,
            viewer: ViewerConfig::default(),
        }
    }
}

/// How one geometry role is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerParams {
    /// Geometry to draw.
    pub role: Role,
    /// Top-level scene path.
    pub prefix: &'static str,
    /// Colour and opacity.
    pub default_color: Rgba,
}

impl VisualizerParams {
    /// Visual geometry, translucent blue.
    pub const fn illustration() -> Self {
        Self {
            role: Role::Illustration,
            prefix: "visual",
            default_color: Rgba::new(0.1, 0.6, 1.0, 0.3),
        }
    }

    /// Collision geometry, translucent orange.
    pub const fn proximity() -> Self {
        Self {
            role: Role::Proximity,
            prefix: "collision",
            default_color: Rgba::new(0.8, 0.5, 0.2, 0.3),
        }
    }
}

/// A descriptor loaded into physics and shown in the viewer.
pub struct Inspector {
    simulator: Simulator,
    viewer: Viewer,
    visualizers: [VisualizerParams; 2],
    advance_interval: f64,
}

impl Inspector {
    /// Load `sdf_path`, weld its bodies to the world, start the viewer and
    /// publish every visual and collision geometry.
    pub fn new(sdf_path: &Path, options: &InspectOptions) -> Result<Self, InspectError> {
        if !sdf_path.exists() {
            return Err(InspectError::MissingDescriptor(sdf_path.to_path_buf()));
        }
        let world = PhysicsWorld::load(sdf_path)?;
        let viewer = Viewer::start(&options.viewer)?;

        let mut simulator = Simulator::new(world, options.time_step);
        simulator.set_target_realtime_rate(options.realtime_rate);

        let inspector = Self {
            simulator,
            viewer,
            visualizers: [VisualizerParams::illustration(), VisualizerParams::proximity()],
            advance_interval: if options.advance_interval > 0.0 {
                options.advance_interval
            } else {
                InspectOptions::default().advance_interval
            },
        };
        inspector.publish_geometry();
        inspector.publish_poses();
        Ok(inspector)
    }

    /// URL of the viewer page.
    pub fn web_url(&self) -> String {
        self.viewer.web_url()
    }

    /// The viewer showing this scene.
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.simulator.time()
    }

    fn publish_geometry(&self) {
        let world = self.simulator.world();
        for params in &self.visualizers {
            self.viewer.delete(params.prefix);
            let mut used = HashSet::new();
            for (i, geometry) in world.geometries(params.role).enumerate() {
                let mut name = geometry.name.clone();
                if name.is_empty() || !used.insert((geometry.link.clone(), name.clone())) {
                    name = format!("{}_{i}", geometry.name);
                    used.insert((geometry.link.clone(), name.clone()));
                }
                let path = format!(
                    "{}/{name}",
                    link_path(params.prefix, world.model_name(), &geometry.link)
                );
                self.viewer.set_object(&path, &geometry.mesh, params.default_color);
                self.viewer.set_transform(&path, &geometry.pose);
            }
            debug!(prefix = params.prefix, "published geometry");
        }
    }

    fn publish_poses(&self) {
        publish_poses(
            &self.viewer,
            &self.visualizers,
            self.simulator.world(),
            self.simulator.time(),
        );
    }

    /// Simulate one `advance_interval`, publishing poses along the way.
    pub fn advance(&mut self) {
        let target = self.simulator.time() + self.advance_interval;
        let mut next_publish = self.simulator.time() + PUBLISH_PERIOD;
        let viewer = &self.viewer;
        let visualizers = &self.visualizers;
        self.simulator.advance_to_with(target, |world, time| {
            if time + 1e-9 >= next_publish {
                next_publish = time + PUBLISH_PERIOD;
                publish_poses(viewer, visualizers, world, time);
            }
        });
        self.publish_poses();
    }

    /// Add the stop button and simulate until it has been pressed, checking
    /// after every `advance_interval`. Removes the button before returning.
    pub fn run_until_stopped(&mut self) {
        self.viewer.add_button(STOP_BUTTON);
        info!("press '{STOP_BUTTON}' in the viewer to finish");
        while self.viewer.button_clicks(STOP_BUTTON) < 1 {
            self.advance();
        }
        self.viewer.delete_button(STOP_BUTTON);
        info!(time = self.simulator.time(), "simulation stopped");
    }
}

fn link_path(prefix: &str, model: &str, link: &str) -> String {
    format!("{prefix}/{model}/{link}")
}

fn publish_poses(viewer: &Viewer, visualizers: &[VisualizerParams], world: &PhysicsWorld, time: f64) {
    for params in visualizers {
        for (link, pose) in world.link_poses() {
            viewer.set_transform(&link_path(params.prefix, world.model_name(), link), &pose);
        }
    }
    viewer.set_time(time);
}

/// Inspect `sdf_path` until the stop button is pressed. `on_ready` receives
/// the viewer URL once the scene is published.
pub fn inspect(
    sdf_path: &Path,
    options: &InspectOptions,
    on_ready: impl FnOnce(&str),
) -> Result<(), InspectError> {
    let mut inspector = Inspector::new(sdf_path, options)?;
    on_ready(&inspector.web_url());
    inspector.run_until_stopped();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::path::PathBuf;

    use meshsdf_mesh::{save_mesh, TriangleMesh};
    use meshsdf_sdf::{Collision, Descriptor, Geometry, Link, MeshGeometry, Model, Visual};
    use nalgebra::Vector3;

    fn write_scene(dir: &Path) -> PathBuf {
        save_mesh(dir.join("box.obj"), &TriangleMesh::cuboid(Vector3::new(0.2, 0.1, 0.1))).unwrap();
        let mut link = Link::new("box_body_link");
        link.pose.position = Vector3::new(0.0, 0.0, 0.5);
        link.visuals.push(Visual {
            name: "visual".into(),
            pose: None,
            geometry: Geometry::Mesh(MeshGeometry::new("box.obj")),
        });
        for k in 0..2 {
            link.collisions.push(Collision {
                name: format!("collision_{k:04}"),
                pose: None,
                geometry: Geometry::Mesh(MeshGeometry {
                    uri: "box.obj".into(),
                    scale: None,
                    declare_convex: true,
                }),
            });
        }
        let path = dir.join("box.sdf");
        meshsdf_sdf::save(
            &path,
            &Descriptor::new(Model {
                name: "box".into(),
                links: vec![link],
            }),
        )
        .unwrap();
        path
    }

    fn fast_options() -> InspectOptions {
        InspectOptions {
            advance_interval: 0.05,
            realtime_rate: 0.0,
            viewer: ViewerConfig {
                port: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_publishes_both_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = Inspector::new(&write_scene(dir.path()), &fast_options()).unwrap();
        let scene = inspector.viewer().snapshot();
        let paths: Vec<_> = scene.objects.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "collision/box/box_body_link/collision_0000",
                "collision/box/box_body_link/collision_0001",
                "visual/box/box_body_link/visual",
            ]
        );
        assert_eq!(scene.objects[0].rgba, [0.8, 0.5, 0.2, 0.3]);
        assert_eq!(scene.objects[2].rgba, [0.1, 0.6, 1.0, 0.3]);
        // Link pose is applied through the tree.
        assert!((scene.objects[2].transform[14] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_advance_moves_time_not_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let mut inspector = Inspector::new(&write_scene(dir.path()), &fast_options()).unwrap();
        inspector.advance();
        inspector.advance();
        assert!((inspector.time() - 0.1).abs() < 1e-9);
        let scene = inspector.viewer().snapshot();
        assert!((scene.time - 0.1).abs() < 1e-9);
        assert!((scene.objects[2].transform[14] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_descriptor() {
        let err = Inspector::new(Path::new("/no/such/model.sdf"), &fast_options()).err().unwrap();
        assert!(matches!(err, InspectError::MissingDescriptor(_)));
    }

    #[test]
    fn test_stop_button_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut inspector = Inspector::new(&write_scene(dir.path()), &fast_options()).unwrap();
        let addr = inspector.viewer().local_addr();

        let clicker = std::thread::spawn(move || loop {
            let mut stream = TcpStream::connect(addr).unwrap();
            write!(
                stream,
                "POST /buttons/Stop%20Simulation HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n"
            )
            .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            if response.starts_with("HTTP/1.1 200") {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        });

        inspector.run_until_stopped();
        clicker.join().unwrap();
        assert!(inspector.time() > 0.0);
        assert!(inspector.viewer().snapshot().buttons.is_empty());
    }
}
