use crate::path_data::{Path, Segment};
use crate::types::Point;

/// Winding classification of a sub-path's vertex ordering, in the y-down
/// document coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    Anticlockwise,
}

/// A view of one sub-path: the segment run up to and including its `Close`
/// marker. The winding direction is computed once at construction from the
/// segment endpoints (cubic control points are ignored, a polygon
/// approximation) and never mutated.
#[derive(Debug, Clone)]
pub struct SubPath<'a> {
    segments: &'a [Segment],
    vertices: Vec<Point>,
    direction: Direction,
}

impl<'a> SubPath<'a> {
    fn new(segments: &'a [Segment]) -> SubPath<'a> {
        let vertices: Vec<Point> = segments.iter().filter_map(Segment::location).collect();
        let direction = direction_of(&vertices);
        SubPath {
            segments,
            vertices,
            direction,
        }
    }

    pub fn segments(&self) -> &'a [Segment] {
        self.segments
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True when every vertex of `other` lies inside this sub-path's
    /// polygon. Empty candidates are contained by nothing.
    fn encloses(&self, other: &SubPath<'_>) -> bool {
        if other.vertices.is_empty() {
            return false;
        }
        other
            .vertices
            .iter()
            .all(|p| point_in_polygon(&self.vertices, *p))
    }
}

/// Splits a path into sub-paths immediately after each `Close`; runs with
/// no drawable endpoint (including trailing empties) are discarded.
pub fn sub_paths(path: &Path) -> Vec<SubPath<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, segment) in path.segments.iter().enumerate() {
        if matches!(segment, Segment::Close) {
            push_sub_path(&mut out, &path.segments[start..=i]);
            start = i + 1;
        }
    }
    if start < path.segments.len() {
        push_sub_path(&mut out, &path.segments[start..]);
    }
    out
}

fn push_sub_path<'a>(out: &mut Vec<SubPath<'a>>, segments: &'a [Segment]) {
    let sub = SubPath::new(segments);
    if !sub.vertices.is_empty() {
        out.push(sub);
    }
}

fn direction_of(vertices: &[Point]) -> Direction {
    // Shoelace cross sum; a positive sum in y-down coordinates traces
    // clockwise on screen. Pinned by the fixture tests below.
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    if sum > 0.0 {
        Direction::Clockwise
    } else {
        Direction::Anticlockwise
    }
}

/// Ray-cast with the half-open boundary rule: the `<` / `>=` asymmetry on
/// the edge endpoints keeps a vertex shared by two edges from being
/// counted twice.
fn point_in_polygon(polygon: &[Point], test: Point) -> bool {
    if polygon.is_empty() {
        return false;
    }
    let mut contains = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = polygon[i];
        let pj = polygon[j];
        if ((pi.y < test.y && pj.y >= test.y) || (pj.y < test.y && pi.y >= test.y))
            && (pi.x <= test.x || pj.x <= test.x)
            && pi.x + (test.y - pi.y) / (pj.y - pi.y) * (pj.x - pi.x) < test.x
        {
            contains = !contains;
        }
        j = i;
    }
    contains
}

/// One node of the containment forest: a sub-path plus the sub-paths
/// nested strictly inside it. Immutable once the resolver returns it.
#[derive(Debug)]
pub struct ContainmentNode<'a> {
    sub_path: SubPath<'a>,
    children: Vec<ContainmentNode<'a>>,
}

impl<'a> ContainmentNode<'a> {
    pub fn sub_path(&self) -> &SubPath<'a> {
        &self.sub_path
    }

    pub fn children(&self) -> &[ContainmentNode<'a>] {
        &self.children
    }

    /// Longest root-to-leaf chain length, this node included.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ContainmentNode::depth)
            .max()
            .unwrap_or(0)
    }

    fn insert(&mut self, node: ContainmentNode<'a>) {
        // Descend into an existing child before widening this level, so the
        // candidate lands under the most specific enclosing sub-path.
        for child in &mut self.children {
            if child.sub_path.encloses(&node.sub_path) {
                child.insert(node);
                return;
            }
        }
        self.children.push(node);
    }
}

/// Builds the containment forest for a path's sub-paths, in source order.
/// Never fails on well-formed input; degenerate sub-paths are skipped.
pub fn resolve_containment(path: &Path) -> Vec<ContainmentNode<'_>> {
    let mut roots: Vec<ContainmentNode<'_>> = Vec::new();
    'next: for sub in sub_paths(path) {
        let node = ContainmentNode {
            sub_path: sub,
            children: Vec::new(),
        };
        for root in &mut roots {
            if root.sub_path.encloses(&node.sub_path) {
                root.insert(node);
                continue 'next;
            }
        }
        roots.push(node);
    }
    roots
}

/// Resolves many independent paths in parallel, joining results in source
/// order. Each path's resolution is a pure function of that path alone.
pub fn resolve_containment_all(paths: &[Path]) -> Vec<Vec<ContainmentNode<'_>>> {
    use rayon::prelude::*;
    paths.par_iter().map(resolve_containment).collect()
}
