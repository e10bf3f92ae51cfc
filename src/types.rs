#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b, a: 255 }
    }
}

/// Parses a color literal: `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a small
/// named set. Returns `None` for anything else, including `none`.
pub(crate) fn parse_color(input: &str) -> Option<Color> {
    let v = input.trim();
    if v.eq_ignore_ascii_case("none") {
        return None;
    }
    if let Some(hex) = v.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::rgb(r, g, b));
        }
        if hex.len() == 3 {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            return Some(Color::rgb(r * 17, g * 17, b * 17));
        }
        return None;
    }
    if let Some(args) = v
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let mut channels = args.split(',').map(str::trim);
        let r = channels.next()?.parse::<u8>().ok()?;
        let g = channels.next()?.parse::<u8>().ok()?;
        let b = channels.next()?.parse::<u8>().ok()?;
        if channels.next().is_some() {
            return None;
        }
        return Some(Color::rgb(r, g, b));
    }
    // Minimal named color set (enough for common exports).
    match v.to_ascii_lowercase().as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::rgb(255, 0, 0)),
        "green" => Some(Color::rgb(0, 128, 0)),
        "blue" => Some(Color::rgb(0, 0, 255)),
        "yellow" => Some(Color::rgb(255, 255, 0)),
        "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#27aae1"), Some(Color::rgb(0x27, 0xaa, 0xe1)));
        assert_eq!(parse_color("#fff"), Some(Color::WHITE));
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn parses_rgb_function() {
        assert_eq!(
            parse_color("rgb(39, 170, 225)"),
            Some(Color::rgb(39, 170, 225))
        );
        assert_eq!(parse_color("rgb(1, 2)"), None);
        assert_eq!(parse_color("rgb(1, 2, 3, 4)"), None);
    }

    #[test]
    fn none_is_no_color() {
        assert_eq!(parse_color("none"), None);
        assert_eq!(parse_color("  NONE "), None);
    }

    #[test]
    fn named_colors() {
        assert_eq!(parse_color("black"), Some(Color::BLACK));
        assert_eq!(parse_color("Green"), Some(Color::rgb(0, 128, 0)));
        assert_eq!(parse_color("chartreuse"), None);
    }
}
