// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute graph persistence for `OrdoPlay` Editor.
//!
//! Tools use this crate to store configuration as a graph of named,
//! attribute-bearing nodes (rig setups, tool presets) and write it to a
//! compact line-oriented text format.
//!
//! ## Architecture
//!
//! - [`Graph`] owns nodes in an arena; node-valued attributes hold a
//!   [`NodeId`], so sharing and cycles need no shared ownership
//! - a type guard on [`Graph::set`] accepts built-in scalars, node
//!   references and types registered in the [`TypeRegistry`]
//! - [`Serializer`] writes each node body once and back-references after that
//! - [`Deserializer`] rebuilds the graph, registering each node before its
//!   attributes so cycles resolve
//! - [`equality`] compares graphs structurally, terminating on cycles
//! - [`bridge`] converts to and from shared nested [`Mapping`]s

pub mod bridge;
pub mod config;
pub mod deserializer;
pub mod equality;
pub mod escape;
pub mod graph;
pub mod node;
pub mod registry;
pub mod serializer;
pub mod value;

pub use bridge::{from_mapping, to_mapping, MapValue, Mapping};
pub use config::FormatOptions;
pub use deserializer::{DeserializeError, Deserializer, ParseError, ParseErrorKind};
pub use equality::{equals, not_equals};
pub use graph::{AttributeError, Graph};
pub use node::{Node, NodeId};
pub use registry::{RegistrationError, TypeCodec, TypeRegistry};
pub use serializer::{SerializeError, Serializer};
pub use value::{CustomValue, Value, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::str::FromStr;

    fn isolated_graph() -> Graph {
        Graph::with_registry(TypeRegistry::new().into_shared())
    }

    fn round_trip(graph: &Graph, root: NodeId) -> (Graph, NodeId) {
        let text = graph.serialize(root).unwrap();
        Deserializer::new()
            .with_registry(graph.registry().clone())
            .deserialize(&text)
            .unwrap()
    }

    #[test]
    fn test_flat_round_trip() {
        let fruits = [
            "apple",
            "banana",
            "cherry",
            "date",
            "elderberry",
            "fig",
            "grape",
            "watermelon",
        ];
        let mut graph = isolated_graph();
        let root = graph.add_node();
        for (i, fruit) in fruits.iter().enumerate() {
            graph.set(root, *fruit, i as i64).unwrap();
        }

        let (loaded, loaded_root) = round_trip(&graph, root);
        let names: Vec<_> = loaded.attribute_names(loaded_root).unwrap().collect();
        assert_eq!(names, fruits);
        for (i, fruit) in fruits.iter().enumerate() {
            assert_eq!(loaded.get(loaded_root, fruit).unwrap(), &Value::Int(i as i64));
        }
        assert!(equals(&graph, root, &loaded, loaded_root));
    }

    #[test]
    fn test_shared_child_round_trip() {
        let mut graph = isolated_graph();
        let s = graph
            .add_node_with([
                ("some_float", Value::Float(200.0)),
                ("crazy_list_sum", Value::Int(6)),
                ("someBool", Value::Bool(true)),
            ])
            .unwrap();
        let root = graph.add_node();
        graph.set(root, "aSubObject", s).unwrap();
        let t = graph.add_node();
        graph.set(t, "duplicate_ref_to_s2", s).unwrap();
        graph.set(t, "label", "t").unwrap();
        let container = graph.add_node_with([("root", root), ("t", t)]).unwrap();

        let text = graph.serialize(container).unwrap();
        assert_eq!(text.matches("some_float").count(), 1);

        let (loaded, loaded_container) = round_trip(&graph, container);
        let loaded_root = loaded.child(loaded_container, "root").unwrap();
        let loaded_t = loaded.child(loaded_container, "t").unwrap();
        let via_root = loaded.child(loaded_root, "aSubObject").unwrap();
        let via_t = loaded.child(loaded_t, "duplicate_ref_to_s2").unwrap();
        assert_eq!(via_root, via_t);
        assert_eq!(loaded.node_count(), 4);
        assert!(equals(&graph, container, &loaded, loaded_container));
    }

    #[test]
    fn test_cyclic_round_trip() {
        let mut graph = isolated_graph();
        let root = graph.add_node();
        let s4 = graph.add_node();
        graph.set(root, "name", "root").unwrap();
        graph.set(root, "s4", s4).unwrap();
        graph.set(s4, "recursive_ref_to_root", root).unwrap();
        assert_eq!(
            graph.child(graph.child(root, "s4").unwrap(), "recursive_ref_to_root").unwrap(),
            root
        );

        let (loaded, loaded_root) = round_trip(&graph, root);
        let loaded_s4 = loaded.child(loaded_root, "s4").unwrap();
        assert_eq!(loaded.child(loaded_s4, "recursive_ref_to_root").unwrap(), loaded_root);
        assert!(graph.structurally_eq(root, &loaded, loaded_root));
    }

    #[test]
    fn test_escaping_round_trip() {
        let text = "first line\nsecond \"quoted\" line\r\nC:\\new\\dir";
        let mut graph = isolated_graph();
        let root = graph.add_node();
        graph.set(root, "note", text).unwrap();

        let encoded = graph.serialize(root).unwrap();
        assert_eq!(encoded.lines().count(), 3);

        let (loaded, loaded_root) = round_trip(&graph, root);
        assert_eq!(loaded.get(loaded_root, "note").unwrap().as_str(), Some(text));
    }

    #[test]
    fn test_relaxed_round_trip_keeps_names() {
        let mut graph = isolated_graph();
        let root = graph.add_node();
        assert!(matches!(
            graph.set(root, " lead", 1),
            Err(AttributeError::InvalidName(_))
        ));
        graph.set(root, "inner space", 2).unwrap();
        let child = graph.add_node_with([("nested name", 3)]).unwrap();
        graph.set(root, "child", child).unwrap();

        let text = Serializer::new(&graph)
            .with_options(FormatOptions::relaxed())
            .serialize(root)
            .unwrap();
        let (loaded, loaded_root) = Deserializer::new()
            .with_options(FormatOptions::relaxed())
            .with_registry(graph.registry().clone())
            .deserialize(&text)
            .unwrap();
        let names: Vec<_> = loaded.attribute_names(loaded_root).unwrap().collect();
        assert_eq!(names, ["inner space", "child"]);
        assert!(equals(&graph, root, &loaded, loaded_root));
    }

    #[test]
    fn test_all_primitive_kinds_round_trip() {
        let big: num_bigint::BigInt = "-987654321098765432109876543210".parse().unwrap();
        let mut graph = isolated_graph();
        let root = graph
            .add_node_with([
                ("s", Value::from("")),
                ("i", Value::Int(i64::MIN)),
                ("f", Value::Float(-0.1)),
                ("nan", Value::Float(f64::NAN)),
                ("inf", Value::Float(f64::INFINITY)),
                ("b", Value::Bool(false)),
                ("big", Value::BigInt(big)),
            ])
            .unwrap();

        let (loaded, loaded_root) = round_trip(&graph, root);
        assert!(equals(&graph, root, &loaded, loaded_root));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vec3([f32; 3]);

    impl fmt::Display for Vec3 {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} {} {}", self.0[0], self.0[1], self.0[2])
        }
    }

    impl FromStr for Vec3 {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let parts: Vec<f32> = s
                .split(' ')
                .map(|p| p.parse::<f32>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?;
            match parts.as_slice() {
                [x, y, z] => Ok(Vec3([*x, *y, *z])),
                _ => Err(format!("expected 3 components, got {}", parts.len())),
            }
        }
    }

    #[test]
    fn test_registered_type_round_trip() {
        let registry = TypeRegistry::new().into_shared();
        registry
            .write()
            .register(TypeCodec::display::<Vec3>("vec3"))
            .unwrap();
        let mut graph = Graph::with_registry(registry);
        let root = graph.add_node();
        let joint = graph.add_node();
        graph.set(root, "joint", joint).unwrap();
        graph.set(joint, "offset", Value::custom(Vec3([1.0, 2.5, -3.0]))).unwrap();

        let text = graph.serialize(root).unwrap();
        assert!(text.contains("offset(vec3):1 2.5 -3\n"));

        let (loaded, loaded_root) = round_trip(&graph, root);
        let loaded_joint = loaded.child(loaded_root, "joint").unwrap();
        let offset = loaded.get(loaded_joint, "offset").unwrap();
        assert_eq!(
            offset.as_custom().unwrap().downcast_ref::<Vec3>(),
            Some(&Vec3([1.0, 2.5, -3.0]))
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rig.graph");

        let mut graph = Graph::new();
        let root = graph.add_node();
        let spine = graph.add_node_with([("joints", 5)]).unwrap();
        graph.set(root, "spine", spine).unwrap();
        graph.set(spine, "rig", root).unwrap();

        graph.write(root, &path).unwrap();
        let (loaded, loaded_root) = Graph::load(&path).unwrap();
        assert!(equals(&graph, root, &loaded, loaded_root));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Graph::load(&dir.path().join("missing.graph"));
        assert!(matches!(result, Err(DeserializeError::Io(_))));
    }

    #[test]
    fn test_mapping_round_trip_through_text() {
        let nested = Mapping::new();
        nested.insert("bleargh", 111);
        let mapping = Mapping::new();
        mapping.insert("something", 12);
        mapping.insert("nestedDict", nested.clone());
        nested.insert("cyclic_ref", mapping.clone());

        let mut graph = isolated_graph();
        let root = from_mapping(&mut graph, &mapping).unwrap();
        let (loaded, loaded_root) = round_trip(&graph, root);
        let back = to_mapping(&loaded, loaded_root).unwrap();
        assert!(back.structurally_eq(&mapping));
    }
}
