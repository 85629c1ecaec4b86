//! SDF parsing.
//!
//! The document is first read into a small element tree, then interpreted.
//! Unknown elements are skipped.

use nalgebra::Vector3;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Result, SdfError};
use crate::{Collision, Descriptor, Geometry, Inertia, Inertial, Link, MeshGeometry, Model, Pose, Visual};

#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    /// Name without namespace prefix.
    fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, key: &'static str) -> Result<&str> {
        self.attr(key).ok_or_else(|| SdfError::Missing {
            element: key,
            parent: self.name.clone(),
        })
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    fn required_child(&self, name: &'static str) -> Result<&Node> {
        self.child(name).ok_or_else(|| SdfError::Missing {
            element: name,
            parent: self.name.clone(),
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    fn numbers(&self) -> Result<Vec<f64>> {
        self.text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| SdfError::InvalidNumber {
                    element: self.name.clone(),
                    value: self.text.clone(),
                })
            })
            .collect()
    }

    fn number(&self) -> Result<f64> {
        match self.numbers()?.as_slice() {
            [value] => Ok(*value),
            _ => Err(SdfError::InvalidNumber {
                element: self.name.clone(),
                value: self.text.clone(),
            }),
        }
    }

    fn vector3(&self) -> Result<Vector3<f64>> {
        match self.numbers()?.as_slice() {
            [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
            _ => Err(SdfError::InvalidNumber {
                element: self.name.clone(),
                value: self.text.clone(),
            }),
        }
    }
}

fn parse_tree(text: &str) -> Result<Node> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Node::from_start(&e)?),
            Event::Empty(e) => {
                let node = Node::from_start(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| SdfError::Malformed("unbalanced end tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        return Err(SdfError::Malformed(format!("unclosed <{}>", open.name)));
    }
    root.ok_or_else(|| SdfError::Malformed("empty document".into()))
}

/// Parse an SDF document.
///
/// Only the first `<model>` is read. Links may carry any number of visual
/// and collision elements with mesh, box, sphere or cylinder geometry.
pub fn parse(text: &str) -> Result<Descriptor> {
    let root = parse_tree(text)?;
    if root.local_name() != "sdf" {
        return Err(SdfError::UnexpectedRoot(root.name));
    }
    let version = root.attr("version").unwrap_or(crate::SDF_VERSION).to_string();

    let mut models = root.children_named("model");
    let model_node = models.next().ok_or_else(|| SdfError::Missing {
        element: "model",
        parent: root.name.clone(),
    })?;
    if models.next().is_some() {
        debug!("descriptor holds several models, reading only the first");
    }

    let model = Model {
        name: model_node.required_attr("name")?.to_string(),
        links: model_node
            .children_named("link")
            .map(parse_link)
            .collect::<Result<_>>()?,
    };
    Ok(Descriptor { version, model })
}

fn parse_pose(node: &Node) -> Result<Pose> {
    let values = node.numbers()?;
    match values.as_slice() {
        [] => Ok(Pose::identity()),
        [x, y, z, roll, pitch, yaw] => Ok(Pose {
            position: Vector3::new(*x, *y, *z),
            rpy: Vector3::new(*roll, *pitch, *yaw),
        }),
        _ => Err(SdfError::InvalidNumber {
            element: node.name.clone(),
            value: node.text.clone(),
        }),
    }
}

fn optional_pose(node: &Node) -> Result<Option<Pose>> {
    node.child("pose").map(parse_pose).transpose()
}

fn parse_link(node: &Node) -> Result<Link> {
    let mut link = Link::new(node.required_attr("name")?);
    link.pose = optional_pose(node)?.unwrap_or_default();
    link.inertial = node.child("inertial").map(parse_inertial).transpose()?;
    for visual in node.children_named("visual") {
        link.visuals.push(Visual {
            name: visual.attr("name").unwrap_or_default().to_string(),
            pose: optional_pose(visual)?,
            geometry: parse_geometry(visual.required_child("geometry")?)?,
        });
    }
    for collision in node.children_named("collision") {
        link.collisions.push(Collision {
            name: collision.attr("name").unwrap_or_default().to_string(),
            pose: optional_pose(collision)?,
            geometry: parse_geometry(collision.required_child("geometry")?)?,
        });
    }
    Ok(link)
}

fn parse_inertial(node: &Node) -> Result<Inertial> {
    let mass = node.required_child("mass")?.number()?;
    let mut inertia = Inertia::default();
    if let Some(tensor) = node.child("inertia") {
        let read = |name: &str| -> Result<f64> {
            tensor.child(name).map(Node::number).unwrap_or(Ok(0.0))
        };
        inertia = Inertia {
            ixx: read("ixx")?,
            ixy: read("ixy")?,
            ixz: read("ixz")?,
            iyy: read("iyy")?,
            iyz: read("iyz")?,
            izz: read("izz")?,
        };
    }
    Ok(Inertial { mass, inertia })
}

fn parse_geometry(node: &Node) -> Result<Geometry> {
    if let Some(mesh) = node.child("mesh") {
        return Ok(Geometry::Mesh(MeshGeometry {
            uri: mesh.required_child("uri")?.text.trim().to_string(),
            scale: mesh.child("scale").map(Node::vector3).transpose()?,
            declare_convex: mesh.child("declare_convex").is_some(),
        }));
    }
    if let Some(shape) = node.child("box") {
        return Ok(Geometry::Box {
            size: shape.required_child("size")?.vector3()?,
        });
    }
    if let Some(shape) = node.child("sphere") {
        return Ok(Geometry::Sphere {
            radius: shape.required_child("radius")?.number()?,
        });
    }
    if let Some(shape) = node.child("cylinder") {
        return Ok(Geometry::Cylinder {
            radius: shape.required_child("radius")?.number()?,
            length: shape.required_child("length")?.number()?,
        });
    }
    Err(SdfError::Malformed(format!(
        "unsupported geometry in <{}>",
        node.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_descriptors::mug;
    use crate::to_string;
    use approx::assert_relative_eq;

    #[test]
    fn test_written_descriptor_reads_back() {
        let written = to_string(&mug()).unwrap();
        let parsed = parse(&written).unwrap();
        let link = &parsed.model.links[0];
        assert_eq!(parsed.version, "1.5");
        assert_eq!(parsed.model.name, "mug");
        assert_eq!(link.name, "mug_body_link");
        assert_eq!(link.pose, Pose::identity());
        assert_eq!(link.visuals.len(), 1);
        assert_eq!(link.collisions.len(), 2);
        assert_eq!(link.collisions[1].name, "collision_0001");

        let inertial = link.inertial.unwrap();
        assert_relative_eq!(inertial.mass, 2000.0);
        assert_relative_eq!(inertial.inertia.ixy, -1.5e-5);
        assert_relative_eq!(inertial.inertia.ixx, 333.33, epsilon = 1e-9);

        match &link.collisions[0].geometry {
            Geometry::Mesh(mesh) => {
                assert!(mesh.declare_convex);
                assert_eq!(mesh.uri, "mug_parts/mug_convex_piece_000.obj");
                assert_eq!(mesh.scale, None);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
        match &link.visuals[0].geometry {
            Geometry::Mesh(mesh) => {
                assert!(!mesh.declare_convex);
                assert_eq!(mesh.scale, Some(Vector3::repeat(1.0)));
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_parses_primitives_and_multiple_links() {
        let text = r#"<?xml version="1.0"?>
<sdf version="1.7">
  <model name="table">
    <link name="top">
      <pose>0 0 0.7 0 0 0</pose>
      <collision name="c"><geometry><box><size>1 0.6 0.05</size></box></geometry></collision>
    </link>
    <link name="leg">
      <!-- a comment -->
      <visual name="v"><geometry><cylinder><radius>0.03</radius><length>0.7</length></cylinder></geometry></visual>
      <visual name="knob"><pose>0 0 0.1 0 0 0</pose><geometry><sphere><radius>0.05</radius></sphere></geometry></visual>
    </link>
  </model>
</sdf>"#;
        let d = parse(text).unwrap();
        assert_eq!(d.version, "1.7");
        assert_eq!(d.model.links.len(), 2);
        assert_relative_eq!(d.model.links[0].pose.position.z, 0.7);
        assert!(d.model.links[0].inertial.is_none());
        assert_eq!(
            d.model.links[0].collisions[0].geometry,
            Geometry::Box {
                size: Vector3::new(1.0, 0.6, 0.05)
            }
        );
        let leg = &d.model.links[1];
        assert_eq!(leg.visuals.len(), 2);
        assert_eq!(
            leg.visuals[0].geometry,
            Geometry::Cylinder {
                radius: 0.03,
                length: 0.7
            }
        );
        assert!(leg.visuals[1].pose.is_some());
    }

    #[test]
    fn test_any_prefix_for_declare_convex() {
        let text = r#"<sdf version="1.5" xmlns:d="drake.mit.edu"><model name="m"><link name="l">
            <collision name="c"><geometry><mesh><uri>a.obj</uri><d:declare_convex/></mesh></geometry></collision>
            </link></model></sdf>"#;
        let d = parse(text).unwrap();
        match &d.model.links[0].collisions[0].geometry {
            Geometry::Mesh(mesh) => assert!(mesh.declare_convex),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(matches!(
            parse("<robot name=\"r\"></robot>"),
            Err(SdfError::UnexpectedRoot(name)) if name == "robot"
        ));
    }

    #[test]
    fn test_rejects_missing_model() {
        assert!(matches!(
            parse("<sdf version=\"1.5\"></sdf>"),
            Err(SdfError::Missing { element: "model", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_number() {
        let text = "<sdf><model name=\"m\"><link name=\"l\"><inertial><mass>heavy</mass></inertial></link></model></sdf>";
        assert!(matches!(parse(text), Err(SdfError::InvalidNumber { .. })));
    }

    #[test]
    fn test_rejects_unclosed() {
        assert!(parse("<sdf><model name=\"m\">").is_err());
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        assert!(matches!(parse("<sdf><model></sdf>"), Err(SdfError::Xml(_))));
    }
}
