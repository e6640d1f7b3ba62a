/*
    This module stores and validates grammars

    A grammar is the tuple G = (N, T, P, S): nonterminals, terminals,
    productions and the start symbol. Validation happens once, at
    construction; afterwards the grammar is frozen and every other
    component only reads it.
*/

pub mod text;

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use itertools::Itertools;
use thiserror::Error;

// The base unit in a production
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(String),
    Nonterminal(String),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Terminal(name) | Symbol::Nonterminal(name) => name,
        }
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Symbol::Nonterminal(_))
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// A single rewrite rule `A -> X1 X2 ... Xn`. An empty rhs denotes epsilon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: String,
    pub rhs: Vec<Symbol>,
    // Position in declaration order. Ties anywhere in the crate break on
    // this index, which keeps every derived result reproducible.
    pub origin: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidGrammarError {
    #[error("start symbol `{0}` is not a declared nonterminal")]
    UnknownStartSymbol(String),
    #[error("`{0}` is declared both as a nonterminal and a terminal")]
    AlphabetOverlap(String),
    #[error("production left side `{0}` is not a declared nonterminal")]
    UnknownLhs(String),
    #[error("production for `{lhs}` references undeclared symbol `{symbol}`")]
    UndefinedSymbol { lhs: String, symbol: String },
    #[error("nonterminal `{0}` has no productions")]
    MissingProductions(String),
}

#[derive(Debug, Clone)]
pub struct Grammar {
    nonterminals: Vec<String>,
    terminals: Vec<String>,
    start: String,
    productions: Vec<Production>,
    // Production indices per left side, in declaration order
    by_lhs: HashMap<String, Vec<usize>>,
}

impl Grammar {
    // Builds and validates a grammar. Declaration order of the production
    // list is preserved and becomes each production's origin index.
    pub fn new(
        nonterminals: Vec<String>,
        terminals: Vec<String>,
        productions: Vec<(String, Vec<Symbol>)>,
        start: String,
    ) -> Result<Grammar, InvalidGrammarError> {
        let nonterminals = nonterminals.into_iter().unique().collect_vec();
        let terminals = terminals.into_iter().unique().collect_vec();

        let productions = productions
            .into_iter()
            .enumerate()
            .map(|(origin, (lhs, rhs))| Production { lhs, rhs, origin })
            .collect_vec();

        let mut by_lhs: HashMap<String, Vec<usize>> = HashMap::new();
        for production in &productions {
            by_lhs.entry(production.lhs.clone()).or_default().push(production.origin);
        }

        let grammar = Grammar { nonterminals, terminals, start, productions, by_lhs };
        grammar.validate()?;

        return Ok(grammar);
    }

    // Idempotent and side-effect-free; `new` runs it once so a constructed
    // grammar always satisfies every invariant below.
    pub fn validate(&self) -> Result<(), InvalidGrammarError> {
        let nonterminal_set: HashSet<&str> =
            self.nonterminals.iter().map(String::as_str).collect();
        let terminal_set: HashSet<&str> =
            self.terminals.iter().map(String::as_str).collect();

        if let Some(name) = self.nonterminals.iter().find(|n| terminal_set.contains(n.as_str())) {
            return Err(InvalidGrammarError::AlphabetOverlap(name.clone()));
        }

        if !nonterminal_set.contains(self.start.as_str()) {
            return Err(InvalidGrammarError::UnknownStartSymbol(self.start.clone()));
        }

        for production in &self.productions {
            if !nonterminal_set.contains(production.lhs.as_str()) {
                return Err(InvalidGrammarError::UnknownLhs(production.lhs.clone()));
            }
            for symbol in &production.rhs {
                let defined = match symbol {
                    Symbol::Nonterminal(name) => nonterminal_set.contains(name.as_str()),
                    Symbol::Terminal(name) => terminal_set.contains(name.as_str()),
                };
                if !defined {
                    return Err(InvalidGrammarError::UndefinedSymbol {
                        lhs: production.lhs.clone(),
                        symbol: symbol.name().to_string(),
                    });
                }
            }
        }

        // Unreachable nonterminals are legal, unproductive ones are not
        if let Some(name) = self.nonterminals.iter().find(|n| !self.by_lhs.contains_key(*n)) {
            return Err(InvalidGrammarError::MissingProductions(name.clone()));
        }

        return Ok(());
    }

    pub fn nonterminals(&self) -> &[String] {
        &self.nonterminals
    }

    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    // Productions of one nonterminal, in declaration order
    pub fn productions_for<'a>(&'a self, lhs: &str) -> impl Iterator<Item = &'a Production> {
        self.by_lhs
            .get(lhs)
            .into_iter()
            .flatten()
            .map(|&index| &self.productions[index])
    }
}

pub fn render_rhs(rhs: &[Symbol]) -> String {
    if rhs.is_empty() {
        "ε".to_string()
    } else {
        rhs.iter().map(Symbol::name).join(" ")
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "N = {{{}}}", self.nonterminals.iter().sorted().join(", "))?;
        writeln!(f, "T = {{{}}}", self.terminals.iter().sorted().join(", "))?;
        writeln!(f, "S = {}", self.start)?;
        writeln!(f, "P:")?;
        for production in &self.productions {
            writeln!(f, "  {} -> {}", production.lhs, render_rhs(&production.rhs))?;
        }
        Ok(())
    }
}
