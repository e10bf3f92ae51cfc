//! flatbed: geometry and layer-tree construction for an SVG-like dialect.
//!
//! The pipeline decodes markup into an attributed element tree, walks it
//! into a flattened layer tree (path-data parsing, transform composition,
//! shape synthesis), classifies sub-path winding and hole/island
//! containment, and re-encodes element trees through a canonical,
//! diff-stable XML encoder.
//!
//! Every stage is a pure, synchronous function over immutable inputs;
//! rasterization, font shaping and file I/O are the callers' concerns.

pub mod builder;
pub mod error;
pub mod path_data;
pub mod transform;
pub mod types;
pub mod winding;
pub mod xml;

pub use builder::{
    BuildDiagnostic, BuildOutcome, Fill, FillRule, Layer, LayerBuilder, LayerContent, ShapeLayer,
    Style,
};
pub use error::{FlatbedError, GeometryError, ParseError, XmlError};
pub use path_data::{Path, Segment};
pub use transform::{Matrix, TransformOp};
pub use types::{Color, Point};
pub use winding::{
    resolve_containment, resolve_containment_all, sub_paths, ContainmentNode, Direction, SubPath,
};
pub use xml::{Content, Element};

/// Facade bundling the pipeline with its two knobs: encoder indent width
/// and the builder's recursion bound.
#[derive(Debug, Clone)]
pub struct Flatbed {
    indent: usize,
    max_depth: usize,
}

impl Default for Flatbed {
    fn default() -> Self {
        Flatbed {
            indent: 2,
            max_depth: 64,
        }
    }
}

impl Flatbed {
    pub fn new() -> Flatbed {
        Flatbed::default()
    }

    pub fn with_indent(mut self, indent: usize) -> Flatbed {
        self.indent = indent;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Flatbed {
        self.max_depth = max_depth;
        self
    }

    pub fn decode(&self, text: &str) -> Result<Element, XmlError> {
        xml::decode(text)
    }

    pub fn encode(&self, element: &Element) -> String {
        xml::encode(element, self.indent)
    }

    pub fn encode_document(&self, element: &Element) -> String {
        xml::encode_document(element, self.indent)
    }

    /// Decodes a document and builds its flattened layer tree.
    pub fn compile(&self, text: &str) -> Result<BuildOutcome, FlatbedError> {
        let root = xml::decode(text)?;
        LayerBuilder::new().with_max_depth(self.max_depth).build(&root)
    }

    /// Containment forest for one flattened path.
    pub fn resolve<'a>(&self, path: &'a Path) -> Vec<ContainmentNode<'a>> {
        winding::resolve_containment(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_shapes<'a>(layer: &'a Layer, out: &mut Vec<&'a ShapeLayer>) {
        for content in &layer.contents {
            match content {
                LayerContent::Shape(shape) => out.push(shape),
                LayerContent::Layer(child) => collect_shapes(child, out),
            }
        }
    }

    #[test]
    fn pipeline_decodes_builds_and_resolves() {
        let doc = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg height="24" width="24">
  <g fill="#202f5f" transform="translate(2, 2)">
    <path d="M10 20 L0 10 L10 0 L20 10 Z M10 14 L6 10 L10 6 L14 10 Z" fill-rule="evenodd" />
  </g>
</svg>"##;
        let flatbed = Flatbed::new();
        let outcome = flatbed.compile(doc).unwrap();
        assert!(outcome.diagnostics.is_empty());

        let mut shapes = Vec::new();
        collect_shapes(&outcome.root, &mut shapes);
        assert_eq!(shapes.len(), 1);
        let shape = shapes[0];
        assert_eq!(shape.style.fill, Some(Fill::Color(Color::rgb(0x20, 0x2f, 0x5f))));
        assert_eq!(shape.style.fill_rule, FillRule::EvenOdd);
        // Flattened through translate(2, 2).
        assert_eq!(shape.path.segments[0], Segment::MoveTo(Point::new(12.0, 22.0)));

        let roots = flatbed.resolve(&shape.path);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].depth(), 2);
        assert_eq!(roots[0].sub_path().direction(), roots[0].children()[0].sub_path().direction());
    }

    #[test]
    fn round_trip_through_the_codec_is_stable() {
        let doc = "<svg width=\"480\">\n  <g id=\"Guides\">\n    <path d=\"M18.0,26.0 l500.0,0.0\" id=\"Capline-S\" />\n  </g>\n  <text x=\"18.0\" y=\"126.0\">Small</text>\n</svg>";
        let flatbed = Flatbed::new();
        let first = flatbed.decode(doc).unwrap();
        let encoded = flatbed.encode(&first);
        assert_eq!(encoded, doc);
        let second = flatbed.decode(&encoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn generated_documents_encode_canonically() {
        let mut svg = Element::new("svg");
        svg.set_attribute("width", xml::format_length(480));
        svg.set_attribute("height", xml::format_length(352));
        let mut rect = Element::new("rect");
        rect.set_attribute("x", xml::format_coordinate(112.0));
        rect.set_attribute("y", xml::format_coordinate(48.0));
        rect.set_attribute("width", xml::format_coordinate(256.0));
        rect.set_attribute("height", xml::format_coordinate(256.0));
        svg.append_child(rect);

        assert_eq!(
            Flatbed::new().encode_document(&svg),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <svg height=\"352\" width=\"480\">\n\
             \x20 <rect height=\"256.0\" width=\"256.0\" x=\"112.0\" y=\"48.0\" />\n\
             </svg>"
        );
    }

    #[test]
    fn path_survives_a_full_write_parse_build_cycle() {
        let source = path_data::parse("M0,0 L10,0 L10,10 L0,10 Z M2,2 L8,2 L8,8 L2,8 Z").unwrap();
        let rewritten = path_data::write(&source);
        let mut doc = String::from("<svg><path d=\"");
        doc.push_str(&rewritten);
        doc.push_str("\" /></svg>");

        let outcome = Flatbed::new().compile(&doc).unwrap();
        let mut shapes = Vec::new();
        collect_shapes(&outcome.root, &mut shapes);
        assert_eq!(shapes[0].path, source);
    }
}
