//! SDF rendering.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Result, SdfError};
use crate::format::format_sci;
use crate::{Collision, Descriptor, Geometry, Inertial, Link, MeshGeometry, Pose, Visual, DRAKE_NAMESPACE};

/// Render `descriptor` as an SDF document string.
///
/// Output uses two-space indentation, has no XML declaration and ends with
/// a newline. Identical descriptors render to identical bytes.
pub fn to_string(descriptor: &Descriptor) -> Result<String> {
    let mut buf = Vec::new();
    write(&mut buf, descriptor)?;
    String::from_utf8(buf).map_err(|e| SdfError::Malformed(e.to_string()))
}

/// Write `descriptor` as an SDF document to `sink`.
pub fn write<W: Write>(sink: W, descriptor: &Descriptor) -> Result<()> {
    let mut xml = Writer::new_with_indent(sink, b' ', 2);

    let mut root = BytesStart::new("sdf");
    root.push_attribute(("version", descriptor.version.as_str()));
    root.push_attribute(("xmlns:drake", DRAKE_NAMESPACE));
    xml.write_event(Event::Start(root))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("name", descriptor.model.name.as_str()));
    xml.write_event(Event::Start(model))?;
    for link in &descriptor.model.links {
        write_link(&mut xml, link)?;
    }
    xml.write_event(Event::End(BytesEnd::new("model")))?;

    xml.write_event(Event::End(BytesEnd::new("sdf")))?;
    xml.get_mut().write_all(b"\n")?;
    Ok(())
}

fn start_named<W: Write>(xml: &mut Writer<W>, tag: &str, name: &str) -> Result<()> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("name", name));
    xml.write_event(Event::Start(start))?;
    Ok(())
}

fn start<W: Write>(xml: &mut Writer<W>, tag: &str) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    Ok(())
}

fn end<W: Write>(xml: &mut Writer<W>, tag: &str) -> Result<()> {
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn text_element<W: Write>(xml: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    start(xml, tag)?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    end(xml, tag)
}

fn write_link<W: Write>(xml: &mut Writer<W>, link: &Link) -> Result<()> {
    start_named(xml, "link", &link.name)?;
    write_pose(xml, &link.pose)?;
    if let Some(inertial) = &link.inertial {
        write_inertial(xml, inertial)?;
    }
    for visual in &link.visuals {
        write_visual(xml, visual)?;
    }
    for collision in &link.collisions {
        write_collision(xml, collision)?;
    }
    end(xml, "link")
}

fn write_pose<W: Write>(xml: &mut Writer<W>, pose: &Pose) -> Result<()> {
    text_element(xml, "pose", &pose.to_string())
}

fn write_inertial<W: Write>(xml: &mut Writer<W>, inertial: &Inertial) -> Result<()> {
    start(xml, "inertial")?;
    text_element(xml, "mass", &format_sci(inertial.mass))?;
    start(xml, "inertia")?;
    for (tag, value) in inertial.inertia.components() {
        text_element(xml, tag, &format_sci(value))?;
    }
    end(xml, "inertia")?;
    end(xml, "inertial")
}

fn write_visual<W: Write>(xml: &mut Writer<W>, visual: &Visual) -> Result<()> {
    start_named(xml, "visual", &visual.name)?;
    if let Some(pose) = &visual.pose {
        write_pose(xml, pose)?;
    }
    write_geometry(xml, &visual.geometry)?;
    end(xml, "visual")
}

fn write_collision<W: Write>(xml: &mut Writer<W>, collision: &Collision) -> Result<()> {
    start_named(xml, "collision", &collision.name)?;
    if let Some(pose) = &collision.pose {
        write_pose(xml, pose)?;
    }
    write_geometry(xml, &collision.geometry)?;
    end(xml, "collision")
}

fn write_geometry<W: Write>(xml: &mut Writer<W>, geometry: &Geometry) -> Result<()> {
    start(xml, "geometry")?;
    match geometry {
        Geometry::Mesh(mesh) => write_mesh(xml, mesh)?,
        Geometry::Box { size } => {
            start(xml, "box")?;
            text_element(xml, "size", &format!("{} {} {}", size.x, size.y, size.z))?;
            end(xml, "box")?;
        }
        Geometry::Sphere { radius } => {
            start(xml, "sphere")?;
            text_element(xml, "radius", &radius.to_string())?;
            end(xml, "sphere")?;
        }
        Geometry::Cylinder { radius, length } => {
            start(xml, "cylinder")?;
            text_element(xml, "radius", &radius.to_string())?;
            text_element(xml, "length", &length.to_string())?;
            end(xml, "cylinder")?;
        }
    }
    end(xml, "geometry")
}

fn write_mesh<W: Write>(xml: &mut Writer<W>, mesh: &MeshGeometry) -> Result<()> {
    start(xml, "mesh")?;
    text_element(xml, "uri", &mesh.uri)?;
    if let Some(scale) = &mesh.scale {
        let text = format!(
            "{} {} {}",
            format_sci(scale.x),
            format_sci(scale.y),
            format_sci(scale.z)
        );
        text_element(xml, "scale", &text)?;
    }
    if mesh.declare_convex {
        xml.write_event(Event::Empty(BytesStart::new("drake:declare_convex")))?;
    }
    end(xml, "mesh")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_descriptors::mug;

    #[test]
    fn test_document_shape() {
        let text = to_string(&mug()).unwrap();
        assert!(text.starts_with("<sdf version=\"1.5\" xmlns:drake=\"drake.mit.edu\">"));
        assert!(text.ends_with("</sdf>\n"));
        assert!(!text.contains("<?xml"));
        assert!(text.contains("\n  <model name=\"mug\">"));
        assert!(text.contains("2.0000E+03"));
        assert!(text.contains("-1.5000E-05"));
        assert!(text.contains("1.0000E+00 1.0000E+00 1.0000E+00"));
        assert!(text.contains("mug_parts/mug_convex_piece_001.obj"));
        assert!(text.contains("<drake:declare_convex/>"));
        assert_eq!(text.matches("<collision name=").count(), 2);
    }

    #[test]
    fn test_inertia_order() {
        let text = to_string(&mug()).unwrap();
        let positions: Vec<_> = ["<ixx>", "<ixy>", "<ixz>", "<iyy>", "<iyz>", "<izz>"]
            .iter()
            .map(|tag| text.find(tag).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(to_string(&mug()).unwrap(), to_string(&mug()).unwrap());
    }

    #[test]
    fn test_escapes_names() {
        let mut d = mug();
        d.model.name = "a<b&c".into();
        let text = to_string(&d).unwrap();
        assert!(text.contains("name=\"a&lt;b&amp;c\""));
    }

    #[test]
    fn test_no_collisions() {
        let mut d = mug();
        d.model.links[0].collisions.clear();
        let text = to_string(&d).unwrap();
        assert!(!text.contains("<collision"));
        assert!(text.contains("<visual name=\"visual\">"));
    }
}
