//! Interactive previews shown during conversion.

use std::thread;
use std::time::Duration;

use meshsdf_mesh::TriangleMesh;
use meshsdf_viewer::{Rgba, Viewer, ViewerConfig, ViewerError};

/// Label of the button that ends a preview.
pub const PROCEED_BUTTON: &str = "Proceed";

const MESH_COLOR: Rgba = Rgba::new(0.7, 0.7, 0.7, 1.0);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shows intermediate conversion results. Both calls may block.
pub trait Preview {
    /// Show the scaled input mesh.
    fn show_mesh(&mut self, _mesh: &TriangleMesh) {}
    /// Show the convex pieces; empty when decomposition failed.
    fn show_pieces(&mut self, _pieces: &[TriangleMesh]) {}
}

/// Preview that shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreview;

impl Preview for NoPreview {}

/// Distinct, stable colour for piece `k`.
///
/// Hues step by the golden ratio so neighbouring pieces contrast.
pub fn piece_color(k: usize) -> Rgba {
    let hue = (k as f32 * 0.618_034).fract();
    let (s, v) = (0.65, 0.95);
    let h = hue * 6.0;
    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    Rgba::new(r + m, g + m, b + m, 1.0)
}

/// Preview in the browser viewer; each call blocks until the page's
/// `Proceed` button is pressed.
pub struct ViewerPreview {
    viewer: Viewer,
}

impl ViewerPreview {
    /// Start a viewer for previews.
    pub fn start(config: &ViewerConfig) -> Result<Self, ViewerError> {
        Ok(Self {
            viewer: Viewer::start(config)?,
        })
    }

    /// URL of the preview page.
    pub fn web_url(&self) -> String {
        self.viewer.web_url()
    }

    fn wait_for_proceed(&self) {
        self.viewer.add_button(PROCEED_BUTTON);
        while self.viewer.button_clicks(PROCEED_BUTTON) < 1 {
            thread::sleep(POLL_INTERVAL);
        }
        self.viewer.delete_button(PROCEED_BUTTON);
    }
}

impl Preview for ViewerPreview {
    fn show_mesh(&mut self, mesh: &TriangleMesh) {
        self.viewer.delete("preview");
        self.viewer.set_object("preview/mesh", mesh, MESH_COLOR);
        self.wait_for_proceed();
    }

    fn show_pieces(&mut self, pieces: &[TriangleMesh]) {
        self.viewer.delete("preview");
        for (k, piece) in pieces.iter().enumerate() {
            self.viewer
                .set_object(&format!("preview/piece_{k:03}"), piece, piece_color(k));
        }
        self.wait_for_proceed();
    }
}
