use crate::error::{FlatbedError, GeometryError, ParseError};
use crate::path_data::{self, Path, Segment};
use crate::transform::{self, Matrix};
use crate::types::{parse_color, Color, Point};
use crate::xml::Element;

/// Paint applied to a shape. References name a paint server (gradient,
/// pattern) resolved by the rendering collaborator, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    Color(Color),
    Reference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// Style state resolved through attribute inheritance: a child attribute
/// wins, otherwise the parent's resolved value applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill: Option<Fill>,
    pub fill_rule: FillRule,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Style {
    /// SVG defaults: black fill, nonzero winding, no stroke.
    pub fn document_default() -> Style {
        Style {
            fill: Some(Fill::Color(Color::BLACK)),
            fill_rule: FillRule::NonZero,
            stroke: None,
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

/// A drawable path, flattened into the root coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeLayer {
    pub id: Option<String>,
    pub path: Path,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    Shape(ShapeLayer),
    Layer(Layer),
}

/// One level of the layer tree, mirroring a group in the source document.
/// Every coordinate below is already in root space; only the tree shape
/// survives from the source nesting.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: Option<String>,
    pub contents: Vec<LayerContent>,
}

/// A child the builder skipped, with the reason. Skips never abort the
/// document; they are reported here so nothing is silently swallowed.
#[derive(Debug)]
pub struct BuildDiagnostic {
    pub element: String,
    pub error: FlatbedError,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub root: Layer,
    pub diagnostics: Vec<BuildDiagnostic>,
}

/// Walks a decoded element tree into a flattened layer tree.
///
/// The source tree is read-only to the builder. A malformed child is
/// skipped and recorded; a malformed root, or nesting beyond `max_depth`,
/// fails the whole build.
#[derive(Debug, Clone)]
pub struct LayerBuilder {
    max_depth: usize,
}

impl Default for LayerBuilder {
    fn default() -> Self {
        LayerBuilder { max_depth: 64 }
    }
}

const SHAPE_NAMES: [&str; 7] = [
    "path", "rect", "circle", "ellipse", "line", "polyline", "polygon",
];

impl LayerBuilder {
    pub fn new() -> LayerBuilder {
        LayerBuilder::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> LayerBuilder {
        self.max_depth = max_depth;
        self
    }

    pub fn build(&self, root: &Element) -> Result<BuildOutcome, FlatbedError> {
        let style = Style::document_default();
        let mut diagnostics = Vec::new();
        let layer = if SHAPE_NAMES.contains(&root.name.as_str()) {
            let shape = build_shape(root, Matrix::identity(), &style)?;
            Layer {
                id: shape.id.clone(),
                contents: vec![LayerContent::Shape(shape)],
            }
        } else {
            self.build_layer(root, Matrix::identity(), &style, 0, &mut diagnostics)?
        };
        Ok(BuildOutcome {
            root: layer,
            diagnostics,
        })
    }

    fn build_layer(
        &self,
        element: &Element,
        inherited: Matrix,
        inherited_style: &Style,
        depth: usize,
        diagnostics: &mut Vec<BuildDiagnostic>,
    ) -> Result<Layer, FlatbedError> {
        if depth >= self.max_depth {
            return Err(GeometryError::TooDeep(depth).into());
        }

        let ctm = concat_own_transform(element, inherited)?;
        let style = resolve_style(element, inherited_style);
        let mut contents = Vec::new();

        for child in element.child_elements() {
            let name = child.name.as_str();
            if name == "g" || name == "svg" {
                match self.build_layer(child, ctm, &style, depth + 1, diagnostics) {
                    Ok(layer) => contents.push(LayerContent::Layer(layer)),
                    Err(err @ FlatbedError::Geometry(GeometryError::TooDeep(_))) => {
                        return Err(err);
                    }
                    Err(error) => diagnostics.push(BuildDiagnostic {
                        element: child.name.clone(),
                        error,
                    }),
                }
            } else if SHAPE_NAMES.contains(&name) {
                match build_shape(child, ctm, &style) {
                    Ok(shape) => contents.push(LayerContent::Shape(shape)),
                    Err(error) => diagnostics.push(BuildDiagnostic {
                        element: child.name.clone(),
                        error,
                    }),
                }
            }
            // Anything else (defs, gradients, metadata) belongs to other
            // collaborators and is not drawable here.
        }

        Ok(Layer {
            id: element.attribute("id").map(str::to_string),
            contents,
        })
    }
}

fn build_shape(
    element: &Element,
    inherited: Matrix,
    inherited_style: &Style,
) -> Result<ShapeLayer, FlatbedError> {
    let ctm = concat_own_transform(element, inherited)?;
    let style = resolve_style(element, inherited_style);
    let path = synthesize_path(element)?;
    Ok(ShapeLayer {
        id: element.attribute("id").map(str::to_string),
        path: transform_path(&path, ctm),
        style,
    })
}

fn concat_own_transform(element: &Element, inherited: Matrix) -> Result<Matrix, FlatbedError> {
    match element.attribute("transform") {
        Some(text) => {
            let ops = transform::parse_list(text)?;
            Ok(inherited.concat(transform::compose(&ops)))
        }
        None => Ok(inherited),
    }
}

/// Applies a composed matrix to every point of a path.
pub fn transform_path(path: &Path, m: Matrix) -> Path {
    Path::new(
        path.segments
            .iter()
            .map(|segment| match segment {
                Segment::MoveTo(p) => Segment::MoveTo(m.apply(*p)),
                Segment::LineTo(p) => Segment::LineTo(m.apply(*p)),
                Segment::CubicTo { to, ctrl1, ctrl2 } => Segment::CubicTo {
                    to: m.apply(*to),
                    ctrl1: m.apply(*ctrl1),
                    ctrl2: m.apply(*ctrl2),
                },
                Segment::Close => Segment::Close,
            })
            .collect(),
    )
}

fn resolve_style(element: &Element, inherited: &Style) -> Style {
    let mut style = inherited.clone();
    if let Some(value) = element.attribute("fill") {
        if let Some(fill) = parse_fill(value) {
            style.fill = fill;
        }
    }
    if let Some(value) = element.attribute("fill-rule") {
        match value.trim() {
            "nonzero" => style.fill_rule = FillRule::NonZero,
            "evenodd" => style.fill_rule = FillRule::EvenOdd,
            _ => {}
        }
    }
    if let Some(value) = element.attribute("stroke") {
        if value.trim().eq_ignore_ascii_case("none") {
            style.stroke = None;
        } else if let Some(color) = parse_color(value) {
            style.stroke = Some(color);
        }
    }
    if let Some(value) = element.attribute("stroke-width") {
        if let Ok(width) = value.trim().parse::<f64>() {
            style.stroke_width = width;
        }
    }
    if let Some(value) = element.attribute("opacity") {
        if let Ok(opacity) = value.trim().parse::<f64>() {
            style.opacity = opacity.clamp(0.0, 1.0) * inherited.opacity;
        }
    }
    style
}

/// `Some(Some(fill))` semantics flattened: `None` means the value did not
/// parse and the inherited fill should stand; `Some(None)` is `fill="none"`.
fn parse_fill(value: &str) -> Option<Option<Fill>> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    if let Some(id) = parse_url_reference(v) {
        return Some(Some(Fill::Reference(id)));
    }
    parse_color(v).map(|c| Some(Fill::Color(c)))
}

fn parse_url_reference(value: &str) -> Option<String> {
    let inner = value.strip_prefix("url(")?.strip_suffix(')')?.trim();
    let inner = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(inner);
    inner.strip_prefix('#').map(str::to_string)
}

fn synthesize_path(element: &Element) -> Result<Path, FlatbedError> {
    match element.name.as_str() {
        "path" => {
            let d = element
                .attribute("d")
                .ok_or(GeometryError::MissingAttribute("d"))?;
            Ok(path_data::parse(d)?)
        }
        "rect" => {
            let x = optional_number(element, "x")?;
            let y = optional_number(element, "y")?;
            let width = required_number(element, "width")?;
            let height = required_number(element, "height")?;
            if width <= 0.0 || height <= 0.0 {
                return Err(degenerate(element, "width and height must be positive"));
            }
            Ok(Path::new(vec![
                Segment::MoveTo(Point::new(x, y)),
                Segment::LineTo(Point::new(x + width, y)),
                Segment::LineTo(Point::new(x + width, y + height)),
                Segment::LineTo(Point::new(x, y + height)),
                Segment::Close,
            ]))
        }
        "circle" => {
            let cx = optional_number(element, "cx")?;
            let cy = optional_number(element, "cy")?;
            let r = required_number(element, "r")?;
            if r <= 0.0 {
                return Err(degenerate(element, "radius must be positive"));
            }
            Ok(ellipse_path(cx, cy, r, r))
        }
        "ellipse" => {
            let cx = optional_number(element, "cx")?;
            let cy = optional_number(element, "cy")?;
            let rx = required_number(element, "rx")?;
            let ry = required_number(element, "ry")?;
            if rx <= 0.0 || ry <= 0.0 {
                return Err(degenerate(element, "radii must be positive"));
            }
            Ok(ellipse_path(cx, cy, rx, ry))
        }
        "line" => {
            let x1 = optional_number(element, "x1")?;
            let y1 = optional_number(element, "y1")?;
            let x2 = optional_number(element, "x2")?;
            let y2 = optional_number(element, "y2")?;
            Ok(Path::new(vec![
                Segment::MoveTo(Point::new(x1, y1)),
                Segment::LineTo(Point::new(x2, y2)),
            ]))
        }
        "polyline" => poly_path(element, false),
        "polygon" => poly_path(element, true),
        other => Err(degenerate(element, &format!("<{other}> produces no shape"))),
    }
}

/// Approximates an ellipse with 4 cubic Beziers; `KAPPA` places the
/// control points on the tangents.
const KAPPA: f64 = 0.5522847498;

fn ellipse_path(cx: f64, cy: f64, rx: f64, ry: f64) -> Path {
    let ox = rx * KAPPA;
    let oy = ry * KAPPA;
    Path::new(vec![
        Segment::MoveTo(Point::new(cx + rx, cy)),
        Segment::CubicTo {
            ctrl1: Point::new(cx + rx, cy + oy),
            ctrl2: Point::new(cx + ox, cy + ry),
            to: Point::new(cx, cy + ry),
        },
        Segment::CubicTo {
            ctrl1: Point::new(cx - ox, cy + ry),
            ctrl2: Point::new(cx - rx, cy + oy),
            to: Point::new(cx - rx, cy),
        },
        Segment::CubicTo {
            ctrl1: Point::new(cx - rx, cy - oy),
            ctrl2: Point::new(cx - ox, cy - ry),
            to: Point::new(cx, cy - ry),
        },
        Segment::CubicTo {
            ctrl1: Point::new(cx + ox, cy - ry),
            ctrl2: Point::new(cx + rx, cy - oy),
            to: Point::new(cx + rx, cy),
        },
        Segment::Close,
    ])
}

fn poly_path(element: &Element, close: bool) -> Result<Path, FlatbedError> {
    let raw = element
        .attribute("points")
        .ok_or(GeometryError::MissingAttribute("points"))?;
    let mut numbers = Vec::new();
    for token in raw.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        let value = token
            .parse::<f64>()
            .map_err(|_| ParseError::MalformedNumber {
                token: token.to_string(),
                offset: 0,
            })?;
        numbers.push(value);
    }
    if numbers.len() % 2 != 0 {
        return Err(degenerate(element, "odd coordinate count in points"));
    }
    let points: Vec<Point> = numbers
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect();
    if points.len() < 2 {
        return Err(degenerate(element, "needs at least two points"));
    }
    let mut segments = vec![Segment::MoveTo(points[0])];
    segments.extend(points[1..].iter().map(|p| Segment::LineTo(*p)));
    if close {
        segments.push(Segment::Close);
    }
    Ok(Path::new(segments))
}

fn optional_number(element: &Element, name: &str) -> Result<f64, FlatbedError> {
    match element.attribute(name) {
        None => Ok(0.0),
        Some(value) => parse_attribute_number(value),
    }
}

fn required_number(element: &Element, name: &'static str) -> Result<f64, FlatbedError> {
    let value = element
        .attribute(name)
        .ok_or(GeometryError::MissingAttribute(name))?;
    parse_attribute_number(value)
}

fn parse_attribute_number(value: &str) -> Result<f64, FlatbedError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| {
            ParseError::MalformedNumber {
                token: value.trim().to_string(),
                offset: 0,
            }
            .into()
        })
}

fn degenerate(element: &Element, detail: &str) -> FlatbedError {
    GeometryError::DegenerateShape {
        element: element.name.clone(),
        detail: detail.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::decode;

    fn build(doc: &str) -> BuildOutcome {
        LayerBuilder::new().build(&decode(doc).unwrap()).unwrap()
    }

    fn shapes(layer: &Layer) -> Vec<&ShapeLayer> {
        let mut out = Vec::new();
        collect_shapes(layer, &mut out);
        out
    }

    fn collect_shapes<'a>(layer: &'a Layer, out: &mut Vec<&'a ShapeLayer>) {
        for content in &layer.contents {
            match content {
                LayerContent::Shape(shape) => out.push(shape),
                LayerContent::Layer(child) => collect_shapes(child, out),
            }
        }
    }

    #[test]
    fn rect_expands_to_four_lines_and_close() {
        let outcome = build(r#"<svg><rect x="1" y="2" width="10" height="5" /></svg>"#);
        let all = shapes(&outcome.root);
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].path.segments,
            vec![
                Segment::MoveTo(Point::new(1.0, 2.0)),
                Segment::LineTo(Point::new(11.0, 2.0)),
                Segment::LineTo(Point::new(11.0, 7.0)),
                Segment::LineTo(Point::new(1.0, 7.0)),
                Segment::Close,
            ]
        );
    }

    #[test]
    fn circle_expands_to_four_kappa_cubics() {
        let outcome = build(r#"<svg><circle cx="10" cy="10" r="4" /></svg>"#);
        let all = shapes(&outcome.root);
        let segments = &all[0].path.segments;
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0], Segment::MoveTo(Point::new(14.0, 10.0)));
        let Segment::CubicTo { ctrl1, to, .. } = segments[1] else {
            panic!("expected cubic");
        };
        assert_eq!(to, Point::new(10.0, 14.0));
        assert!((ctrl1.y - (10.0 + 4.0 * KAPPA)).abs() < 1e-12);
        assert_eq!(segments[5], Segment::Close);
    }

    #[test]
    fn polygon_closes_and_polyline_does_not() {
        let closed = build(r#"<svg><polygon points="0,0 10,0 10,10" /></svg>"#);
        assert!(matches!(
            shapes(&closed.root)[0].path.segments.last(),
            Some(Segment::Close)
        ));
        let open = build(r#"<svg><polyline points="0,0 10,0 10,10" /></svg>"#);
        assert!(!matches!(
            shapes(&open.root)[0].path.segments.last(),
            Some(Segment::Close)
        ));
    }

    #[test]
    fn transforms_flatten_parent_before_child() {
        let outcome = build(
            r#"<svg><g transform="translate(10, 0)"><rect transform="scale(2, 2)" width="3" height="3" /></g></svg>"#,
        );
        let all = shapes(&outcome.root);
        // translate . scale applied to (3, 3): (2*3+10, 2*3).
        assert_eq!(
            all[0].path.segments[2],
            Segment::LineTo(Point::new(16.0, 6.0))
        );
    }

    #[test]
    fn style_inherits_and_child_wins() {
        let outcome = build(
            r##"<svg fill="#ff0000" fill-rule="evenodd">
                 <g stroke="blue" stroke-width="2">
                   <rect width="1" height="1" />
                   <rect fill="none" stroke="none" width="1" height="1" />
                 </g>
               </svg>"##,
        );
        let all = shapes(&outcome.root);
        assert_eq!(all[0].style.fill, Some(Fill::Color(Color::rgb(255, 0, 0))));
        assert_eq!(all[0].style.fill_rule, FillRule::EvenOdd);
        assert_eq!(all[0].style.stroke, Some(Color::rgb(0, 0, 255)));
        assert_eq!(all[0].style.stroke_width, 2.0);
        assert_eq!(all[1].style.fill, None);
        assert_eq!(all[1].style.stroke, None);
    }

    #[test]
    fn opacity_multiplies_down_the_tree() {
        let outcome = build(
            r#"<svg opacity="0.5"><g opacity="0.5"><rect width="1" height="1" /></g></svg>"#,
        );
        let all = shapes(&outcome.root);
        assert!((all[0].style.opacity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn unresolved_paint_reference_is_kept_for_the_renderer() {
        let outcome =
            build(r#"<svg><rect fill="url(#violet)" width="1" height="1" /></svg>"#);
        let all = shapes(&outcome.root);
        assert_eq!(
            all[0].style.fill,
            Some(Fill::Reference("violet".to_string()))
        );
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn malformed_child_is_skipped_and_reported() {
        let outcome = build(
            r#"<svg>
                 <rect width="10" height="10" />
                 <rect height="10" />
                 <circle cx="1" cy="1" r="0" />
                 <path d="M0 0 L1e" />
               </svg>"#,
        );
        assert_eq!(shapes(&outcome.root).len(), 1);
        assert_eq!(outcome.diagnostics.len(), 3);
        assert!(matches!(
            outcome.diagnostics[0].error,
            FlatbedError::Geometry(GeometryError::MissingAttribute("width"))
        ));
        assert!(matches!(
            outcome.diagnostics[1].error,
            FlatbedError::Geometry(GeometryError::DegenerateShape { .. })
        ));
        assert!(matches!(
            outcome.diagnostics[2].error,
            FlatbedError::Parse(ParseError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn malformed_root_transform_is_fatal() {
        let root = decode(r#"<svg transform="rotate("><rect width="1" height="1"/></svg>"#).unwrap();
        assert!(LayerBuilder::new().build(&root).is_err());
    }

    #[test]
    fn pathological_nesting_is_rejected() {
        let mut doc = String::from("<svg>");
        for _ in 0..8 {
            doc.push_str("<g>");
        }
        doc.push_str(r#"<rect width="1" height="1" />"#);
        for _ in 0..8 {
            doc.push_str("</g>");
        }
        doc.push_str("</svg>");
        let root = decode(&doc).unwrap();
        let err = LayerBuilder::new()
            .with_max_depth(4)
            .build(&root)
            .unwrap_err();
        assert!(matches!(
            err,
            FlatbedError::Geometry(GeometryError::TooDeep(_))
        ));
    }

    #[test]
    fn groups_keep_their_tree_shape() {
        let outcome = build(
            r#"<svg><g id="a"><g id="b"><rect width="1" height="1"/></g></g><rect width="2" height="2"/></svg>"#,
        );
        assert_eq!(outcome.root.contents.len(), 2);
        let LayerContent::Layer(a) = &outcome.root.contents[0] else {
            panic!("expected group layer");
        };
        assert_eq!(a.id.as_deref(), Some("a"));
        let LayerContent::Layer(b) = &a.contents[0] else {
            panic!("expected nested layer");
        };
        assert_eq!(b.id.as_deref(), Some("b"));
    }
}
