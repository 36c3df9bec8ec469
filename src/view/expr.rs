//! Parsing of view expressions.
//!
//! A view expression is a sequence of bracketed clauses. Each clause is
//! either a quoted compound field name (`['name']` or `["name"]`, with
//! backslash escapes) or a comma-separated list of slice specifiers:
//! an integer index, a `start:stop:step` range, `...` or `newaxis`.

use crate::error::MdError;

/// One slice specifier inside a bracketed clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Specifier {
    /// A single integer index, dropping the axis. Negative counts from the
    /// end.
    Index(i64),
    /// A `start:stop:step` range. Empty fields are `None`.
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// `...`, expanding to the remaining parent axes.
    Ellipsis,
    /// `newaxis`, inserting a new axis of size 1.
    NewAxis,
}

/// One bracketed clause of a view expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Clause {
    /// Compound field access.
    Field(String),
    /// Slicing and indexing.
    Slice(Vec<Specifier>),
}

/// Parse a full view expression into its clauses.
pub(crate) fn parse_view_expr(expr: &str) -> Result<Vec<Clause>, MdError> {
    let chars: Vec<char> = expr.chars().collect();
    let len = chars.len();
    let mut clauses = Vec::new();
    let mut pos = 0;
    loop {
        if pos >= len || chars[pos] != '[' {
            return Err(MdError::illegal("slice string should start with ["));
        }
        if pos + 2 < len && (chars[pos + 1] == '"' || chars[pos + 1] == '\'') {
            let quote = chars[pos + 1];
            let mut field = String::new();
            let mut idx = pos + 2;
            while idx < len && chars[idx] != quote {
                if chars[idx] == '\\' && idx + 1 < len {
                    field.push(chars[idx + 1]);
                    idx += 2;
                } else {
                    field.push(chars[idx]);
                    idx += 1;
                }
            }
            if idx + 1 >= len || chars[idx + 1] != ']' {
                return Err(MdError::illegal("invalid field access specification"));
            }
            clauses.push(Clause::Field(field));
            pos = idx + 2;
        } else {
            let Some(end) = chars[pos + 1..].iter().position(|&c| c == ']') else {
                return Err(MdError::illegal("missing ]"));
            };
            let end = pos + 1 + end;
            if end == pos + 1 {
                return Err(MdError::illegal("[] not allowed"));
            }
            let inner: String = chars[pos + 1..end].iter().collect();
            clauses.push(Clause::Slice(parse_slice_specifiers(&inner)?));
            pos = end + 1;
        }
        if pos == len {
            return Ok(clauses);
        }
    }
}

/// Parse the comma-separated specifiers of one slice clause.
pub(crate) fn parse_slice_specifiers(clause: &str) -> Result<Vec<Specifier>, MdError> {
    let mut specs = Vec::new();
    for token in clause.split(',') {
        if token.is_empty() {
            continue;
        }
        if token == "..." {
            specs.push(Specifier::Ellipsis);
        } else if token.eq_ignore_ascii_case("newaxis") || token.eq_ignore_ascii_case("np.newaxis")
        {
            specs.push(Specifier::NewAxis);
        } else if token.contains(':') {
            let parts: Vec<&str> = token.split(':').collect();
            if parts.len() > 3 {
                return Err(MdError::IllegalArgument(format!("too many : in {token}")));
            }
            let parse_field = |field: &str| -> Result<Option<i64>, MdError> {
                if field.is_empty() {
                    Ok(None)
                } else {
                    field
                        .parse()
                        .map(Some)
                        .map_err(|_| MdError::IllegalArgument(format!("invalid value {field}")))
                }
            };
            specs.push(Specifier::Range {
                start: parse_field(parts[0])?,
                stop: parse_field(parts[1])?,
                step: parts.get(2).map_or(Ok(None), |p| parse_field(p))?,
            });
        } else {
            let value = token
                .parse()
                .map_err(|_| MdError::IllegalArgument(format!("invalid value {token}")))?;
            specs.push(Specifier::Index(value));
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_slice_clause() {
        assert_eq!(
            parse_slice_specifiers("1,2:5,::-1,...,newaxis").unwrap(),
            [
                Specifier::Index(1),
                Specifier::Range {
                    start: Some(2),
                    stop: Some(5),
                    step: None
                },
                Specifier::Range {
                    start: None,
                    stop: None,
                    step: Some(-1)
                },
                Specifier::Ellipsis,
                Specifier::NewAxis,
            ]
        );
        assert!(parse_slice_specifiers("1:2:3:4").is_err());
        assert!(parse_slice_specifiers("abc").is_err());
    }

    #[test]
    fn parse_expression_clauses() {
        assert_eq!(
            parse_view_expr("[1,::2]['name'][\"with\\'quote\"]").unwrap(),
            [
                Clause::Slice(vec![
                    Specifier::Index(1),
                    Specifier::Range {
                        start: None,
                        stop: None,
                        step: Some(2)
                    },
                ]),
                Clause::Field("name".to_string()),
                Clause::Field("with'quote".to_string()),
            ]
        );
    }

    #[test]
    fn parse_expression_errors() {
        assert!(parse_view_expr("").is_err());
        assert!(parse_view_expr("1:3").is_err());
        assert!(parse_view_expr("[]").is_err());
        assert!(parse_view_expr("[1:3").is_err());
        assert!(parse_view_expr("['unterminated]").is_err());
    }
}
