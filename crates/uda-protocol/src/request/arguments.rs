//! Splitting of `name=value` argument lists.

use super::ParseError;

/// One `name=value` pair as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
    /// Argument name, trimmed, without a leading `/`.
    pub name: String,
    /// Value text exactly as written between the separators, minus
    /// surrounding whitespace. Quotes are kept.
    pub value: String,
}

impl Argument {
    /// Builds an argument.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Value given to a bare keyword such as `/verbose`.
pub const KEYWORD_VALUE: &str = "true";

/// Splits `text` on top-level commas: commas inside quotes or nested
/// brackets do not separate arguments.
pub(crate) fn split_top_level(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut pieces = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, character) in text.char_indices() {
        if let Some(open) = quote {
            if character == open {
                quote = None;
            }
            continue;
        }
        match character {
            '"' | '\'' => quote = Some(character),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| ParseError::UnbalancedBrackets {
                    text: text.to_owned(),
                })?;
            }
            ',' if depth == 0 => {
                pieces.push(text.get(start..index).unwrap_or_default());
                start = index + character.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote {
            text: text.to_owned(),
        });
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedBrackets {
            text: text.to_owned(),
        });
    }
    pieces.push(text.get(start..).unwrap_or_default());
    Ok(pieces)
}

/// Parses the text between the parentheses of a function call.
pub(crate) fn parse_arguments(text: &str) -> Result<Vec<Argument>, ParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(text)?
        .into_iter()
        .enumerate()
        .map(|(position, piece)| parse_argument(position, piece))
        .collect()
}

fn parse_argument(position: usize, piece: &str) -> Result<Argument, ParseError> {
    let (raw_name, value) = match piece.split_once('=') {
        Some((name, value)) => (name, value.trim()),
        None => (piece, KEYWORD_VALUE),
    };
    let name = raw_name.trim().trim_start_matches('/').trim();
    if name.is_empty() {
        return Err(ParseError::EmptyArgumentName { position });
    }
    Ok(Argument::new(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("a=1, b=2", vec!["a=1", " b=2"])]
    #[case::quoted_comma("text=\"x, y\", n=1", vec!["text=\"x, y\"", " n=1"])]
    #[case::nested("expr=f(a, b)[1,2], k", vec!["expr=f(a, b)[1,2]", " k"])]
    #[case::single_quotes("s='a,b'", vec!["s='a,b'"])]
    fn splits_on_top_level_commas(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_top_level(input).unwrap(), expected);
    }

    #[rstest]
    #[case::quote("a=\"open")]
    #[case::bracket("a=(1, 2")]
    #[case::closing("a=1)")]
    fn rejects_unbalanced_text(#[case] input: &str) {
        assert!(split_top_level(input).is_err());
    }

    #[test]
    fn keyword_becomes_true_and_loses_slash() {
        let arguments = parse_arguments(" /verbose , debug").unwrap();
        assert_eq!(
            arguments,
            vec![
                Argument::new("verbose", KEYWORD_VALUE),
                Argument::new("debug", KEYWORD_VALUE)
            ]
        );
    }

    #[test]
    fn value_interior_is_verbatim() {
        let arguments = parse_arguments("path = /a b/c.dat , q=' x = y '").unwrap();
        assert_eq!(arguments[0], Argument::new("path", "/a b/c.dat"));
        assert_eq!(arguments[1], Argument::new("q", "' x = y '"));
    }

    #[test]
    fn empty_name_reports_position() {
        let error = parse_arguments("a=1,=2").unwrap_err();
        assert_eq!(error, ParseError::EmptyArgumentName { position: 1 });
    }

    #[test]
    fn trailing_comma_is_an_empty_argument() {
        assert!(matches!(
            parse_arguments("a=1,"),
            Err(ParseError::EmptyArgumentName { position: 1 })
        ));
    }
}
