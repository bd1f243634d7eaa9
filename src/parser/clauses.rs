//! Clause-list parsing: GROUP BY and ORDER BY fragments arrive as
//! comma-separated term lists, split only at top-level commas so function
//! arguments stay intact.

use crate::error::QueryResult;
use crate::lexer::{Lexer, Token};
use crate::query::{GroupBy, Sort};

/// Split an expression list at commas outside any parentheses.
///
/// Returns an empty vec for blank input. Segments keep their original
/// text so each can be re-parsed as a full term.
pub(crate) fn split_top_level_commas(input: &str) -> QueryResult<Vec<String>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tokens = Lexer::new(input).tokenize()?;
    let chars: Vec<char> = input.chars().collect();

    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for spanned in &tokens {
        match spanned.token {
            Token::LeftParen => depth += 1,
            Token::RightParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                segments.push(chars[start..spanned.offset].iter().collect::<String>());
                start = spanned.offset + 1;
            }
            _ => {}
        }
    }
    segments.push(chars[start..].iter().collect::<String>());

    Ok(segments)
}

impl GroupBy {
    /// Parse a comma-separated list of grouping terms.
    pub fn parse(input: &str) -> QueryResult<GroupBy> {
        let mut group_by = GroupBy::new();
        for segment in split_top_level_commas(input)? {
            let term = super::parse_term(&segment)?;
            group_by.add(term);
        }
        Ok(group_by)
    }
}

impl Sort {
    /// Parse a comma-separated list of sort terms, each with an optional
    /// trailing `ASC` or `DESC`.
    pub fn parse(input: &str) -> QueryResult<Sort> {
        let mut sort = Sort::new();
        for segment in split_top_level_commas(input)? {
            let (expr, reverse) = strip_direction(&segment)?;
            let term = super::parse_term(&expr)?;
            sort.add(term, reverse);
        }
        Ok(sort)
    }
}

/// Strip a trailing ASC/DESC keyword off a sort segment. Only the last
/// token counts; an identifier named `Desc` inside a formula is untouched.
fn strip_direction(segment: &str) -> QueryResult<(String, bool)> {
    let tokens = Lexer::new(segment).tokenize()?;

    // Last real token before Eof.
    let last = tokens.iter().rev().find(|s| s.token != Token::Eof);
    let (cut, reverse) = match last {
        Some(s) if s.token == Token::Asc => (Some(s.offset), false),
        Some(s) if s.token == Token::Desc => (Some(s.offset), true),
        _ => (None, false),
    };

    match cut {
        Some(offset) => {
            let expr: String = segment.chars().take(offset).collect();
            Ok((expr, reverse))
        }
        None => Ok((segment.to_string(), false)),
    }
}
