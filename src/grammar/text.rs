/*
    This module parses the `A -> B C` production syntax

    Right-side names are resolved by membership in the nonterminal list;
    everything else is taken as a terminal. An empty right side (or a
    lone ε) denotes the empty production.
*/

use itertools::Itertools;
use thiserror::Error;

use super::Symbol;

#[derive(Debug, Error, PartialEq)]
pub enum ProductionSyntaxError {
    #[error("expected `->` in production `{0}`")]
    MissingArrow(String),
    #[error("production `{0}` has no left side")]
    MissingLeftSide(String),
}

pub fn parse_production(
    line: &str,
    nonterminals: &[String],
) -> Result<(String, Vec<Symbol>), ProductionSyntaxError> {
    // Both the ASCII and the unicode arrow are accepted
    let (left, right) = line
        .split_once("->")
        .or_else(|| line.split_once('→'))
        .ok_or_else(|| ProductionSyntaxError::MissingArrow(line.to_string()))?;

    let lhs = left.trim();
    if lhs.is_empty() {
        return Err(ProductionSyntaxError::MissingLeftSide(line.to_string()));
    }

    let rhs = right
        .split_whitespace()
        .filter(|name| *name != "ε")
        .map(|name| {
            if nonterminals.iter().any(|n| n == name) {
                Symbol::Nonterminal(name.to_string())
            } else {
                Symbol::Terminal(name.to_string())
            }
        })
        .collect_vec();

    return Ok((lhs.to_string(), rhs));
}
