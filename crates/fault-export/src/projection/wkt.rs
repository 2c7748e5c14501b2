//! Minimal well-known-text reader yielding every coordinate in order.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WktError {
    #[error("geometry text is empty")]
    Empty,
    #[error("unsupported geometry type '{0}'")]
    UnsupportedType(String),
    #[error("malformed geometry text at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

const GEOMETRY_TYPES: &[&str] = &[
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
];

/// Parses `text` into `(x, y)` pairs; z and m ordinates are dropped.
///
/// An `SRID=n;` prefix is accepted. `EMPTY` geometries yield no points.
pub fn parse(text: &str) -> Result<Vec<(f64, f64)>, WktError> {
    let mut text = text.trim();
    if let Some((prefix, rest)) = text.split_once(';') {
        if prefix.trim().to_ascii_uppercase().starts_with("SRID=") {
            text = rest.trim();
        }
    }
    if text.is_empty() {
        return Err(WktError::Empty);
    }

    let split = text.find('(').unwrap_or(text.len());
    let (head, body) = text.split_at(split);
    let mut words = head.split_whitespace();
    let kind = words
        .next()
        .map(str::to_ascii_uppercase)
        .ok_or(WktError::Empty)?;
    if !GEOMETRY_TYPES.contains(&kind.as_str()) {
        return Err(WktError::UnsupportedType(kind));
    }

    let mut empty = false;
    for word in words {
        match word.to_ascii_uppercase().as_str() {
            "Z" | "M" | "ZM" => {}
            "EMPTY" => empty = true,
            _ => {
                return Err(WktError::Malformed {
                    offset: 0,
                    reason: "unexpected token after geometry type",
                })
            }
        }
    }

    if empty {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Err(WktError::Malformed {
            offset: split,
            reason: "EMPTY geometry with coordinates",
        });
    }
    if body.is_empty() {
        return Err(WktError::Malformed {
            offset: split,
            reason: "missing coordinate list",
        });
    }

    parse_body(body, split)
}

fn parse_body(body: &str, base: usize) -> Result<Vec<(f64, f64)>, WktError> {
    let mut points = Vec::new();
    let mut token = String::new();
    let mut depth = 0usize;
    let mut closed = false;

    for (index, ch) in body.char_indices() {
        let offset = base + index;
        if closed {
            if ch.is_whitespace() {
                continue;
            }
            return Err(WktError::Malformed {
                offset,
                reason: "trailing text after geometry",
            });
        }
        match ch {
            '(' => {
                if !token.trim().is_empty() {
                    return Err(WktError::Malformed {
                        offset,
                        reason: "unexpected '('",
                    });
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(WktError::Malformed {
                        offset,
                        reason: "unbalanced ')'",
                    });
                }
                flush(&mut token, &mut points)?;
                depth -= 1;
                closed = depth == 0;
            }
            ',' => {
                if depth == 0 {
                    return Err(WktError::Malformed {
                        offset,
                        reason: "separator outside coordinate list",
                    });
                }
                flush(&mut token, &mut points)?;
            }
            other => {
                if depth == 0 && !other.is_whitespace() {
                    return Err(WktError::Malformed {
                        offset,
                        reason: "text outside coordinate list",
                    });
                }
                token.push(other);
            }
        }
    }

    if depth != 0 {
        return Err(WktError::Malformed {
            offset: base + body.len(),
            reason: "unclosed '('",
        });
    }
    Ok(points)
}

fn flush(token: &mut String, points: &mut Vec<(f64, f64)>) -> Result<(), WktError> {
    let text = std::mem::take(token);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let mut ordinates = trimmed.split_whitespace().map(|value| {
        value
            .parse::<f64>()
            .map_err(|_| WktError::InvalidCoordinate(trimmed.to_string()))
    });
    let x = ordinates.next().transpose()?;
    let y = ordinates.next().transpose()?;
    for extra in ordinates {
        extra?;
    }
    match (x, y) {
        (Some(x), Some(y)) => {
            points.push((x, y));
            Ok(())
        }
        _ => Err(WktError::InvalidCoordinate(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linestring_in_order() {
        let points = parse("LINESTRING(-117.1 34.2, -117.3 34.4,-117.5 34.6)").expect("parse");
        assert_eq!(points, vec![(-117.1, 34.2), (-117.3, 34.4), (-117.5, 34.6)]);
    }

    #[test]
    fn flattens_multi_geometries() {
        let points = parse("MULTILINESTRING((1 2, 3 4), (5 6))").expect("parse");
        assert_eq!(points, vec![(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);

        let points = parse("SRID=4326;POLYGON Z ((0 0 1, 1 0 1, 1 1 1, 0 0 1))").expect("parse");
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], points[3]);
    }

    #[test]
    fn empty_geometry_yields_no_points() {
        assert_eq!(parse("LINESTRING EMPTY"), Ok(Vec::new()));
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(parse("   "), Err(WktError::Empty));
        assert!(matches!(parse("CIRCLE(1 2)"), Err(WktError::UnsupportedType(_))));
        assert!(matches!(parse("LINESTRING(1 2, 3 4"), Err(WktError::Malformed { .. })));
        assert!(matches!(parse("LINESTRING(1 2) junk"), Err(WktError::Malformed { .. })));
        assert!(matches!(
            parse("LINESTRING(1 north, 3 4)"),
            Err(WktError::InvalidCoordinate(_))
        ));
        assert!(matches!(parse("POINT(1)"), Err(WktError::InvalidCoordinate(_))));
    }
}
