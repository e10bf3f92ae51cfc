use crate::error::ParseError;
use crate::types::Point;

/// 2x3 affine transform `[[a, c, e], [b, d, f]]`.
///
/// Composition is associative but not commutative; `concat` keeps the
/// running composite on the left, so a list of document-order transforms
/// applies to a column vector right-to-left (the first listed transform
/// acts last in the final coordinate space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn rotate(deg: f64) -> Self {
        let rad = deg.to_radians();
        let s = libm::sin(rad);
        let c = libm::cos(rad);
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn rotate_about(deg: f64, cx: f64, cy: f64) -> Self {
        Matrix::translate(cx, cy)
            .concat(Matrix::rotate(deg))
            .concat(Matrix::translate(-cx, -cy))
    }

    pub fn skew_x(deg: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: libm::tan(deg.to_radians()),
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_y(deg: f64) -> Self {
        Self {
            a: 1.0,
            b: libm::tan(deg.to_radians()),
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn concat(self, other: Self) -> Self {
        // [self] * [other]
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

/// One declarative operation from a `transform` attribute. Angles are in
/// degrees and only become radians inside the matrix constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    Matrix {
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        e: f64,
        f: f64,
    },
    Translate {
        tx: f64,
        ty: f64,
    },
    Scale {
        sx: f64,
        sy: f64,
    },
    Rotate {
        angle: f64,
    },
    RotateAbout {
        angle: f64,
        cx: f64,
        cy: f64,
    },
    SkewX {
        angle: f64,
    },
    SkewY {
        angle: f64,
    },
}

impl TransformOp {
    pub fn to_matrix(self) -> Matrix {
        match self {
            TransformOp::Matrix { a, b, c, d, e, f } => Matrix { a, b, c, d, e, f },
            TransformOp::Translate { tx, ty } => Matrix::translate(tx, ty),
            TransformOp::Scale { sx, sy } => Matrix::scale(sx, sy),
            TransformOp::Rotate { angle } => Matrix::rotate(angle),
            TransformOp::RotateAbout { angle, cx, cy } => Matrix::rotate_about(angle, cx, cy),
            TransformOp::SkewX { angle } => Matrix::skew_x(angle),
            TransformOp::SkewY { angle } => Matrix::skew_y(angle),
        }
    }
}

/// Reduces a document-order op list to one matrix.
pub fn compose(ops: &[TransformOp]) -> Matrix {
    let mut out = Matrix::identity();
    for op in ops {
        out = out.concat(op.to_matrix());
    }
    out
}

/// Parses a `transform` attribute: a sequence of `name(arg, arg ...)`
/// function calls separated by whitespace or commas.
pub fn parse_list(input: &str) -> Result<Vec<TransformOp>, ParseError> {
    let mut ops = Vec::new();
    let mut offset = skip_separators(input, 0);

    while offset < input.len() {
        let open = input[offset..].find('(').map(|i| offset + i).ok_or_else(|| {
            ParseError::UnknownFunction {
                name: input[offset..].trim().to_string(),
                offset,
            }
        })?;
        let name = input[offset..open].trim_end();
        let command = name.chars().next().unwrap_or('(');
        let close = input[open + 1..]
            .find(')')
            .map(|i| open + 1 + i)
            .ok_or(ParseError::TruncatedCommand { command, offset })?;

        let args = parse_arguments(input, open + 1, close)?;
        ops.push(op_from_call(name, offset, command, &args)?);

        offset = skip_separators(input, close + 1);
    }

    Ok(ops)
}

fn op_from_call(
    name: &str,
    offset: usize,
    command: char,
    args: &[f64],
) -> Result<TransformOp, ParseError> {
    let truncated = ParseError::TruncatedCommand { command, offset };
    match name {
        "matrix" => {
            if args.len() != 6 {
                return Err(truncated);
            }
            Ok(TransformOp::Matrix {
                a: args[0],
                b: args[1],
                c: args[2],
                d: args[3],
                e: args[4],
                f: args[5],
            })
        }
        "translate" => match args {
            [tx] => Ok(TransformOp::Translate { tx: *tx, ty: 0.0 }),
            [tx, ty] => Ok(TransformOp::Translate { tx: *tx, ty: *ty }),
            _ => Err(truncated),
        },
        "scale" => match args {
            [s] => Ok(TransformOp::Scale { sx: *s, sy: *s }),
            [sx, sy] => Ok(TransformOp::Scale { sx: *sx, sy: *sy }),
            _ => Err(truncated),
        },
        "rotate" => match args {
            [angle] => Ok(TransformOp::Rotate { angle: *angle }),
            [angle, cx, cy] => Ok(TransformOp::RotateAbout {
                angle: *angle,
                cx: *cx,
                cy: *cy,
            }),
            _ => Err(truncated),
        },
        "skewX" => match args {
            [angle] => Ok(TransformOp::SkewX { angle: *angle }),
            _ => Err(truncated),
        },
        "skewY" => match args {
            [angle] => Ok(TransformOp::SkewY { angle: *angle }),
            _ => Err(truncated),
        },
        _ => Err(ParseError::UnknownFunction {
            name: name.to_string(),
            offset,
        }),
    }
}

fn parse_arguments(input: &str, start: usize, end: usize) -> Result<Vec<f64>, ParseError> {
    let mut args = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = skip_separators(input, cursor).min(end);
        if next >= end {
            break;
        }
        let token_end = input[next..end]
            .find(|c: char| c.is_whitespace() || c == ',')
            .map(|i| next + i)
            .unwrap_or(end);
        let token = &input[next..token_end];
        let value = token
            .parse::<f64>()
            .map_err(|_| ParseError::MalformedNumber {
                token: token.to_string(),
                offset: next,
            })?;
        args.push(value);
        cursor = token_end;
    }
    Ok(args)
}

fn skip_separators(input: &str, mut offset: usize) -> usize {
    let bytes = input.as_bytes();
    while offset < bytes.len()
        && matches!(bytes[offset], b' ' | b'\t' | b'\n' | b'\r' | b',')
    {
        offset += 1;
    }
    offset
}
