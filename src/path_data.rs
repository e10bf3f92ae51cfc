use crate::error::ParseError;
use crate::types::Point;
use crate::xml::format_coordinate;

/// One drawing command of a parsed path. Shorthand source commands
/// (`H/V/S/Q/T/A`) are lowered to these four kinds at parse time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    CubicTo {
        to: Point,
        ctrl1: Point,
        ctrl2: Point,
    },
    Close,
}

impl Segment {
    /// Endpoint of the segment. `Close` carries no location.
    pub fn location(&self) -> Option<Point> {
        match self {
            Segment::MoveTo(p) | Segment::LineTo(p) => Some(*p),
            Segment::CubicTo { to, .. } => Some(*to),
            Segment::Close => None,
        }
    }
}

/// An ordered segment sequence. Always begins with `MoveTo`; source order
/// is preserved exactly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn new(segments: Vec<Segment>) -> Path {
        Path { segments }
    }
}

/// Parses SVG 1.1 path data in a single forward scan.
///
/// Commands repeat while further coordinate groups follow; uppercase is
/// absolute, lowercase relative to the current point. Whitespace and
/// commas separate tokens, and a `-` or a second `.` may begin a new
/// number without any separator.
pub fn parse(d: &str) -> Result<Path, ParseError> {
    let mut segments = Vec::new();
    let mut s = Scanner::new(d);
    let mut cur = Point::ZERO;
    let mut subpath_start = Point::ZERO;
    // Reflection state for the S/T shorthands.
    let mut last_cubic_ctrl2: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;

    loop {
        s.skip_separators();
        if s.at_end() {
            break;
        }
        let offset = s.pos();
        let cmd = s.command()?;
        let rel = cmd.is_ascii_lowercase();
        match cmd {
            'M' | 'm' => {
                let p = s.pair(cmd, rel, cur)?;
                segments.push(Segment::MoveTo(p));
                cur = p;
                subpath_start = p;
                // Implicit subsequent pairs are treated as LineTo.
                while s.has_number_start() {
                    let p = s.pair(cmd, rel, cur)?;
                    segments.push(Segment::LineTo(p));
                    cur = p;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'L' | 'l' => {
                loop {
                    let p = s.pair(cmd, rel, cur)?;
                    segments.push(Segment::LineTo(p));
                    cur = p;
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' | 'h' => {
                loop {
                    let v = s.number(cmd)?;
                    let x = if rel { cur.x + v } else { v };
                    cur = Point::new(x, cur.y);
                    segments.push(Segment::LineTo(cur));
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' | 'v' => {
                loop {
                    let v = s.number(cmd)?;
                    let y = if rel { cur.y + v } else { v };
                    cur = Point::new(cur.x, y);
                    segments.push(Segment::LineTo(cur));
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' | 'c' => {
                loop {
                    let ctrl1 = s.pair(cmd, rel, cur)?;
                    let ctrl2 = s.pair(cmd, rel, cur)?;
                    let to = s.pair(cmd, rel, cur)?;
                    segments.push(Segment::CubicTo { to, ctrl1, ctrl2 });
                    cur = to;
                    last_cubic_ctrl2 = Some(ctrl2);
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_quad_ctrl = None;
            }
            'S' | 's' => {
                loop {
                    let ctrl2 = s.pair(cmd, rel, cur)?;
                    let to = s.pair(cmd, rel, cur)?;
                    let ctrl1 = match last_cubic_ctrl2 {
                        Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                        None => cur,
                    };
                    segments.push(Segment::CubicTo { to, ctrl1, ctrl2 });
                    cur = to;
                    last_cubic_ctrl2 = Some(ctrl2);
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_quad_ctrl = None;
            }
            'Q' | 'q' => {
                loop {
                    let qctrl = s.pair(cmd, rel, cur)?;
                    let to = s.pair(cmd, rel, cur)?;
                    let (ctrl1, ctrl2) = quad_to_cubic(cur, qctrl, to);
                    segments.push(Segment::CubicTo { to, ctrl1, ctrl2 });
                    cur = to;
                    last_quad_ctrl = Some(qctrl);
                    last_cubic_ctrl2 = Some(ctrl2);
                    if !s.has_number_start() {
                        break;
                    }
                }
            }
            'T' | 't' => loop {
                let to = s.pair(cmd, rel, cur)?;
                let qctrl = match last_quad_ctrl {
                    Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                    None => cur,
                };
                let (ctrl1, ctrl2) = quad_to_cubic(cur, qctrl, to);
                segments.push(Segment::CubicTo { to, ctrl1, ctrl2 });
                cur = to;
                last_quad_ctrl = Some(qctrl);
                last_cubic_ctrl2 = Some(ctrl2);
                if !s.has_number_start() {
                    break;
                }
            },
            'A' | 'a' => {
                loop {
                    let rx = s.number(cmd)?;
                    let ry = s.number(cmd)?;
                    let rot = s.number(cmd)?;
                    let large_arc = s.arc_flag(cmd)?;
                    let sweep = s.arc_flag(cmd)?;
                    let to = s.pair(cmd, rel, cur)?;
                    let curves = arc_to_cubics(cur, rx, ry, rot, large_arc, sweep, to);
                    last_cubic_ctrl2 = curves.iter().rev().find_map(|seg| {
                        if let Segment::CubicTo { ctrl2, .. } = seg {
                            Some(*ctrl2)
                        } else {
                            None
                        }
                    });
                    segments.extend(curves);
                    cur = to;
                    if !s.has_number_start() {
                        break;
                    }
                }
                last_quad_ctrl = None;
            }
            'Z' | 'z' => {
                segments.push(Segment::Close);
                cur = subpath_start;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            other => {
                return Err(ParseError::UnknownCommand {
                    command: other,
                    offset,
                });
            }
        }
    }

    Ok(Path::new(segments))
}

/// Serializes a path back to canonical absolute path data:
/// `M12,22 C6.47,22 2,17.5 2,12 Z`. `parse(write(p))` reproduces `p`.
pub fn write(path: &Path) -> String {
    let mut out = String::new();
    for seg in &path.segments {
        if !out.is_empty() {
            out.push(' ');
        }
        match seg {
            Segment::MoveTo(p) => {
                out.push('M');
                push_pair(&mut out, *p);
            }
            Segment::LineTo(p) => {
                out.push('L');
                push_pair(&mut out, *p);
            }
            Segment::CubicTo { to, ctrl1, ctrl2 } => {
                out.push('C');
                push_pair(&mut out, *ctrl1);
                out.push(' ');
                push_pair(&mut out, *ctrl2);
                out.push(' ');
                push_pair(&mut out, *to);
            }
            Segment::Close => out.push('Z'),
        }
    }
    out
}

fn push_pair(out: &mut String, p: Point) {
    out.push_str(&format_coordinate(p.x));
    out.push(',');
    out.push_str(&format_coordinate(p.y));
}

fn quad_to_cubic(from: Point, qctrl: Point, to: Point) -> (Point, Point) {
    let ctrl1 = Point::new(
        from.x + (2.0 / 3.0) * (qctrl.x - from.x),
        from.y + (2.0 / 3.0) * (qctrl.y - from.y),
    );
    let ctrl2 = Point::new(
        to.x + (2.0 / 3.0) * (qctrl.x - to.x),
        to.y + (2.0 / 3.0) * (qctrl.y - to.y),
    );
    (ctrl1, ctrl2)
}

fn arc_to_cubics(
    from: Point,
    rx_in: f64,
    ry_in: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) -> Vec<Segment> {
    // SVG elliptical arc -> sequence of cubic Beziers.
    // Based on the SVG 1.1 implementation notes (center parameterization).
    use std::f64::consts::PI;

    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 || from == to {
        return vec![Segment::LineTo(to)];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sin(phi);
    let cos_phi = libm::cos(phi);

    // Step 1: compute (x1', y1')
    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Step 2: ensure radii are large enough
    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = (x1p2 / (rx * rx)) + (y1p2 / (ry * ry));
    if lambda > 1.0 {
        let s = libm::sqrt(lambda);
        rx *= s;
        ry *= s;
    }

    // Step 3: compute center (cx', cy')
    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let mut coef = 0.0;
    if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        coef = sign * libm::sqrt((num / den).max(0.0));
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    // Step 4: compute center (cx, cy)
    let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

    // Step 5: compute angles
    fn angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
        let dot = ux * vx + uy * vy;
        let det = ux * vy - uy * vx;
        libm::atan2(det, dot)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta1 = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);

    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    // Split into <= 90deg segments.
    let count = libm::ceil(dtheta.abs() / (PI / 2.0)).max(1.0) as i32;
    let delta = dtheta / f64::from(count);

    let mut out = Vec::new();
    for _ in 0..count {
        out.push(arc_segment_to_cubic(
            cx,
            cy,
            rx,
            ry,
            sin_phi,
            cos_phi,
            theta1,
            theta1 + delta,
        ));
        theta1 += delta;
    }
    out
}

fn arc_segment_to_cubic(
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    sin_phi: f64,
    cos_phi: f64,
    t1: f64,
    t2: f64,
) -> Segment {
    // Convert an ellipse arc segment t1..t2 into a cubic Bezier.
    let dt = t2 - t1;
    let k = (4.0 / 3.0) * libm::tan(dt / 4.0);

    let s1 = libm::sin(t1);
    let c1 = libm::cos(t1);
    let s2 = libm::sin(t2);
    let c2 = libm::cos(t2);

    // Unit circle control points, then ellipse -> rotate -> translate.
    let map = |x: f64, y: f64| -> Point {
        let x = rx * x;
        let y = ry * y;
        Point::new(
            cx + cos_phi * x - sin_phi * y,
            cy + sin_phi * x + cos_phi * y,
        )
    };

    Segment::CubicTo {
        ctrl1: map(c1 - k * s1, s1 + k * c1),
        ctrl2: map(c2 + k * s2, s2 - k * c2),
        to: map(c2, s2),
    }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn pos(&self) -> usize {
        self.i
    }

    fn at_end(&self) -> bool {
        self.i >= self.bytes.len()
    }

    fn skip_separators(&mut self) {
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b' ' | b'\n' | b'\r' | b'\t' | b',' => self.i += 1,
                _ => break,
            }
        }
    }

    fn command(&mut self) -> Result<char, ParseError> {
        let b = self.bytes[self.i];
        let c = b as char;
        if c.is_ascii_alphabetic() {
            self.i += 1;
            Ok(c)
        } else {
            Err(ParseError::UnknownCommand {
                command: c,
                offset: self.i,
            })
        }
    }

    /// True if the next token can begin a number: the caller uses this to
    /// detect whether a command's repeat group continues.
    fn has_number_start(&mut self) -> bool {
        self.skip_separators();
        match self.bytes.get(self.i) {
            Some(b) => b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'),
            None => false,
        }
    }

    fn number(&mut self, cmd: char) -> Result<f64, ParseError> {
        self.skip_separators();
        if self.at_end() {
            return Err(ParseError::TruncatedCommand {
                command: cmd,
                offset: self.i,
            });
        }
        if self.bytes[self.i].is_ascii_alphabetic() {
            // A new command letter mid-group: the group is incomplete.
            return Err(ParseError::TruncatedCommand {
                command: cmd,
                offset: self.i,
            });
        }

        let start = self.i;
        let mut has_digits = false;
        if matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has_digits = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has_digits = true;
            }
        }
        if has_digits && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
            }
        }

        let token = std::str::from_utf8(&self.bytes[start..self.i])
            .unwrap_or_default()
            .to_string();
        if token.is_empty() {
            return Err(ParseError::MalformedNumber {
                token: (self.bytes[self.i] as char).to_string(),
                offset: self.i,
            });
        }
        token.parse::<f64>().map_err(|_| ParseError::MalformedNumber {
            token,
            offset: start,
        })
    }

    fn pair(&mut self, cmd: char, rel: bool, cur: Point) -> Result<Point, ParseError> {
        let x = self.number(cmd)?;
        let y = self.number(cmd)?;
        if rel {
            Ok(Point::new(cur.x + x, cur.y + y))
        } else {
            Ok(Point::new(x, y))
        }
    }

    fn arc_flag(&mut self, cmd: char) -> Result<bool, ParseError> {
        self.skip_separators();
        // Flags may be packed without separators ("...0 01 20,20").
        match self.bytes.get(self.i) {
            Some(b'0') => {
                self.i += 1;
                Ok(false)
            }
            Some(b'1') => {
                self.i += 1;
                Ok(true)
            }
            _ => Ok(self.number(cmd)?.abs() > 0.5),
        }
    }
}
