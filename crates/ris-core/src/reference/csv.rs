//! Comma-separated reference patterns.
//!
//! ```text
//! # optional comment lines
//! theta_deg,pattern_db
//! -90,-32.1
//! -88,-30.7
//! ...
//! ```
//!
//! Column names are trimmed. `pattern_db` is used when both pattern columns
//! are present.

use super::{select_keys, ReferenceError, ReferencePattern};

/// Parse a reference CSV from a string.
pub fn parse_csv(content: &str) -> Result<ReferencePattern, ReferenceError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let header: Vec<String> = match lines.next() {
        Some((_, line)) => line.split(',').map(|c| c.trim().to_string()).collect(),
        None => return Err(ReferenceError::MissingKeys { found: Vec::new() }),
    };
    let kind = select_keys(&header)?;

    let column = |key: &str| header.iter().position(|h| h == key);
    let (theta_col, value_col) = match (column("theta_deg"), column(kind.key())) {
        (Some(t), Some(v)) => (t, v),
        _ => return Err(ReferenceError::MissingKeys { found: header.clone() }),
    };

    let mut theta = Vec::new();
    let mut values = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |col: usize, name: &str| -> Result<f64, ReferenceError> {
            let raw = fields.get(col).ok_or_else(|| ReferenceError::FormatError {
                line: line_no,
                message: format!("Missing {} value in '{}'", name, line),
            })?;
            raw.parse().map_err(|_| ReferenceError::FormatError {
                line: line_no,
                message: format!("Invalid {} value: {}", name, raw),
            })
        };
        theta.push(field(theta_col, "theta_deg")?);
        values.push(field(value_col, kind.key())?);
    }

    ReferencePattern::new(theta, values, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::PatternKind;

    #[test]
    fn test_parse_db_csv() {
        let content = "# measured 2024\n theta_deg , pattern_db \n-10,-3.5\n\n0,0.0\n10,-4\n";
        let r = parse_csv(content).unwrap();
        assert_eq!(r.kind, PatternKind::Db);
        assert_eq!(r.theta_deg, vec![-10.0, 0.0, 10.0]);
        assert_eq!(r.values, vec![-3.5, 0.0, -4.0]);
    }

    #[test]
    fn test_parse_linear_csv_with_extra_columns() {
        let content = "pattern_linear,note,theta_deg\n0.5,a,1\n1.0,b,2\n";
        let r = parse_csv(content).unwrap();
        assert_eq!(r.kind, PatternKind::Linear);
        assert_eq!(r.theta_deg, vec![1.0, 2.0]);
        assert_eq!(r.values, vec![0.5, 1.0]);
    }

    #[test]
    fn test_bad_rows() {
        let err = parse_csv("theta_deg,pattern_db\n0,abc\n").unwrap_err();
        assert!(matches!(err, ReferenceError::FormatError { line: 2, .. }));
        let err = parse_csv("theta_deg,pattern_db\n0\n").unwrap_err();
        assert!(matches!(err, ReferenceError::FormatError { .. }));
        assert!(matches!(
            parse_csv("theta_deg,pattern_db\n"),
            Err(ReferenceError::Empty)
        ));
        assert!(matches!(
            parse_csv("angle,gain\n0,1\n"),
            Err(ReferenceError::MissingKeys { .. })
        ));
    }
}
