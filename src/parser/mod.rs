/*
    This module decides membership with the CYK algorithm

    The recognizer fills a triangular table over the input, bottom-up by
    span length, against a grammar in Chomsky normal form. Each cell
    keeps one backpointer per nonterminal; the fill order makes that the
    smallest split point, tie-broken by the smallest production index,
    so the derivation tree extracted afterwards is deterministic.
*/

pub mod tree;

use std::collections::HashMap;

use thiserror::Error;

use crate::normalizer::{CnfGrammar, CnfRhs};
use tree::DerivationTree;

#[derive(Debug, Error, PartialEq)]
#[error("input token `{token}` at position {position} is not a terminal of the grammar")]
pub struct UnknownSymbolError {
    pub token: String,
    pub position: usize,
}

// How a nonterminal came to cover a span
#[derive(Debug, Clone, PartialEq)]
pub enum Backpointer {
    // A single-token span matched through a terminal production
    Leaf { production: usize },
    // The span splits after `split` tokens; the production's two
    // nonterminals cover the halves
    Split { split: usize, production: usize },
}

// Cell (offset, length) maps each nonterminal deriving that input slice
// to its chosen backpointer
pub struct CykTable {
    n: usize,
    cells: Vec<HashMap<String, Backpointer>>,
}

impl CykTable {
    fn new(n: usize) -> Self {
        CykTable { n, cells: vec![HashMap::new(); n * n] }
    }

    fn index(&self, offset: usize, length: usize) -> usize {
        (length - 1) * self.n + offset
    }

    pub fn entry(&self, offset: usize, length: usize, nonterminal: &str) -> Option<&Backpointer> {
        self.cells[self.index(offset, length)].get(nonterminal)
    }

    pub fn contains(&self, offset: usize, length: usize, nonterminal: &str) -> bool {
        self.entry(offset, length, nonterminal).is_some()
    }

    // First insertion wins; later candidates for the same nonterminal
    // are worse under the (split, production index) order
    fn insert_first(&mut self, offset: usize, length: usize, nonterminal: &str, backpointer: Backpointer) {
        let index = self.index(offset, length);
        self.cells[index].entry(nonterminal.to_string()).or_insert(backpointer);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CykResult {
    pub accepted: bool,
    // Present exactly when the input is accepted
    pub tree: Option<DerivationTree>,
}

// Decides whether the token sequence belongs to the grammar's language
// and, when it does, rebuilds one derivation tree shaped like the
// original grammar. Rejection is a normal outcome, not an error.
pub fn parse(cnf: &CnfGrammar, tokens: &[&str]) -> Result<CykResult, UnknownSymbolError> {
    for (position, token) in tokens.iter().enumerate() {
        if !cnf.is_terminal(token) {
            return Err(UnknownSymbolError { token: token.to_string(), position });
        }
    }

    let n = tokens.len();
    if n == 0 {
        let accepted = cnf.accepts_empty();
        let tree = accepted.then(|| DerivationTree::empty(cnf.original_start()));
        return Ok(CykResult { accepted, tree });
    }

    let mut table = CykTable::new(n);

    for (offset, token) in tokens.iter().enumerate() {
        for (index, production) in cnf.productions().iter().enumerate() {
            if let CnfRhs::Terminal(t) = &production.rhs {
                if t == token {
                    table.insert_first(offset, 1, &production.lhs, Backpointer::Leaf { production: index });
                }
            }
        }
    }

    for length in 2..=n {
        for offset in 0..=n - length {
            for split in 1..length {
                for (index, production) in cnf.productions().iter().enumerate() {
                    let CnfRhs::Pair(left, right) = &production.rhs else { continue };
                    if table.contains(offset, split, left)
                        && table.contains(offset + split, length - split, right)
                    {
                        table.insert_first(offset, length, &production.lhs, Backpointer::Split {
                            split,
                            production: index,
                        });
                    }
                }
            }
        }
    }

    let accepted = table.contains(0, n, cnf.start());
    let tree = if accepted {
        tree::reconstruct(cnf, &table, cnf.start(), 0, n)
    } else {
        None
    };

    return Ok(CykResult { accepted, tree });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::{names, pair_grammar};
    use crate::grammar::{Grammar, Symbol};
    use crate::normalizer::normalize;

    pub fn grammar_from(
        nonterminals: &[&str],
        terminals: &[&str],
        productions: &[&str],
        start: &str,
    ) -> Grammar {
        let nonterminal_names = names(nonterminals);
        let parsed = productions
            .iter()
            .map(|line| crate::grammar::text::parse_production(line, &nonterminal_names).unwrap())
            .collect();
        Grammar::new(nonterminal_names, names(terminals), parsed, start.to_string()).unwrap()
    }

    #[test]
    fn accepts_pair_language() {
        let cnf = normalize(&pair_grammar()).unwrap();
        let result = parse(&cnf, &["a", "b"]).unwrap();

        assert!(result.accepted);
        let tree = result.tree.unwrap();
        assert_eq!(tree.symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.span, (0, 2));
        assert_eq!(tree.terminal_yield(), "ab");
    }

    #[test]
    fn rejects_out_of_language_input() {
        let cnf = normalize(&pair_grammar()).unwrap();

        let reversed = parse(&cnf, &["b", "a"]).unwrap();
        assert!(!reversed.accepted);
        assert_eq!(reversed.tree, None);

        let empty = parse(&cnf, &[]).unwrap();
        assert!(!empty.accepted);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let cnf = normalize(&pair_grammar()).unwrap();
        let error = parse(&cnf, &["c"]).unwrap_err();

        assert_eq!(error, UnknownSymbolError { token: "c".to_string(), position: 0 });
    }

    #[test]
    fn empty_input_needs_an_epsilon_derivation() {
        let grammar = grammar_from(&["S"], &[], &["S -> ε"], "S");
        let cnf = normalize(&grammar).unwrap();
        let result = parse(&cnf, &[]).unwrap();

        assert!(result.accepted);
        let tree = result.tree.unwrap();
        assert_eq!(tree.symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.children, vec![]);
        assert_eq!(tree.terminal_yield(), "");
    }

    #[test]
    fn matching_length_preserved_after_normalization() {
        // a^k b^k: every string over {a, b} up to length six agrees with
        // the closed-form description of the language
        let grammar = grammar_from(&["S"], &["a", "b"], &["S -> a S b", "S -> a b"], "S");
        let cnf = normalize(&grammar).unwrap();

        for length in 0..=6usize {
            for mask in 0..1u32 << length {
                let tokens: Vec<&str> = (0..length)
                    .map(|bit| if mask >> bit & 1 == 0 { "a" } else { "b" })
                    .collect();
                let expected = length > 0
                    && length % 2 == 0
                    && tokens[..length / 2].iter().all(|t| *t == "a")
                    && tokens[length / 2..].iter().all(|t| *t == "b");

                let result = parse(&cnf, &tokens).unwrap();
                assert_eq!(result.accepted, expected, "tokens {:?}", tokens);
                assert_eq!(result.tree.is_some(), expected);
                if let Some(tree) = result.tree {
                    assert_eq!(tree.terminal_yield(), tokens.concat());
                }
            }
        }
    }

    #[test]
    fn repeated_parses_build_identical_trees() {
        let grammar = grammar_from(
            &["S", "A"],
            &["a", "b"],
            &["S -> A A", "A -> a b", "A -> a", "A -> b"],
            "S",
        );
        let cnf = normalize(&grammar).unwrap();

        let first = parse(&cnf, &["a", "b", "a"]).unwrap();
        let second = parse(&cnf, &["a", "b", "a"]).unwrap();

        assert!(first.accepted);
        assert_eq!(first, second);
    }
}
