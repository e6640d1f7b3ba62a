/*
    This module generates sentences

    Two flavors: a bounded breadth-first enumeration of the shortest
    distinct strings of the language, and a random single-sentence
    derivation. Both read the original grammar directly; neither needs
    the normal form.
*/

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use log::debug;
use rand::prelude::*;
use thiserror::Error;

use crate::grammar::{Grammar, Symbol};

// Exploration bounds; both exist to guarantee termination on infinite
// or highly branching languages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorLimits {
    // Longest derivation (number of rewrites) a sentential form may use
    pub max_depth: usize,
    // Most sentential forms kept queued at once
    pub max_frontier: usize,
}

impl Default for GeneratorLimits {
    fn default() -> Self {
        GeneratorLimits { max_depth: 128, max_frontier: 65_536 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    // Sorted by length, then lexicographically; no duplicates
    pub strings: Vec<String>,
    // False when a bound cut the search short of both the requested
    // count and the full language
    pub complete: bool,
}

// A sentential form queued for expansion, ordered by its terminal
// count (a lower bound on the length of anything it can still become),
// then by the form itself
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    terminals: usize,
    form: Vec<Symbol>,
    depth: usize,
}

impl FrontierEntry {
    fn new(form: Vec<Symbol>, depth: usize) -> Self {
        let terminals = form.iter().filter(|sym| !sym.is_nonterminal()).count();
        FrontierEntry { terminals, form, depth }
    }
}

// Collects up to `limit` distinct shortest strings of the language.
// Stops early when the frontier is exhausted or a bound is hit; that
// is reported through the completeness flag, never as an error.
pub fn generate_shortest(grammar: &Grammar, limit: usize, limits: &GeneratorLimits) -> Generated {
    let mut frontier: BinaryHeap<Reverse<FrontierEntry>> = BinaryHeap::new();
    let mut seen: HashSet<Vec<Symbol>> = HashSet::new();
    let mut collected: HashSet<String> = HashSet::new();
    let mut strings: Vec<String> = Vec::new();
    let mut truncated = false;

    let start = vec![Symbol::Nonterminal(grammar.start().to_string())];
    seen.insert(start.clone());
    frontier.push(Reverse(FrontierEntry::new(start, 0)));

    while let Some(Reverse(entry)) = frontier.pop() {
        if strings.len() >= limit {
            break;
        }

        // A form without nonterminals is a finished string
        let Some(position) = entry.form.iter().position(Symbol::is_nonterminal) else {
            let string: String = entry.form.iter().map(Symbol::name).collect();
            if collected.insert(string.clone()) {
                strings.push(string);
            }
            continue;
        };

        if entry.depth >= limits.max_depth {
            truncated = true;
            continue;
        }

        let nonterminal = entry.form[position].name().to_string();
        for production in grammar.productions_for(&nonterminal) {
            let mut form = Vec::with_capacity(entry.form.len() + production.rhs.len());
            form.extend_from_slice(&entry.form[..position]);
            form.extend(production.rhs.iter().cloned());
            form.extend_from_slice(&entry.form[position + 1..]);

            if !seen.insert(form.clone()) {
                continue;
            }
            if frontier.len() >= limits.max_frontier {
                truncated = true;
                continue;
            }
            frontier.push(Reverse(FrontierEntry::new(form, entry.depth + 1)));
        }
    }

    if truncated && strings.len() < limit {
        debug!("generation stopped at a bound with {} strings", strings.len());
    }

    let complete = strings.len() >= limit || !truncated;
    strings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    strings.truncate(limit);

    return Generated { strings, complete };
}

#[derive(Debug, Error, PartialEq)]
pub enum GenerateError {
    // Recursive grammars need not terminate; the budget caps the walk
    #[error("no sentence finished within {0} rewrites")]
    BudgetExhausted(usize),
}

pub type GenResult = Result<String, GenerateError>;

// Derives one sentence by rewriting the leftmost nonterminal with a
// uniformly chosen production until only terminals remain
pub fn random_sentence(grammar: &Grammar, budget: usize) -> GenResult {
    let mut form = vec![Symbol::Nonterminal(grammar.start().to_string())];
    let mut remaining = budget;
    let mut rng = thread_rng();

    while let Some(position) = form.iter().position(Symbol::is_nonterminal) {
        if remaining == 0 {
            return Err(GenerateError::BudgetExhausted(budget));
        }
        remaining -= 1;

        let nonterminal = form[position].name().to_string();
        let choices: Vec<_> = grammar.productions_for(&nonterminal).collect();
        let production = choices
            .choose(&mut rng)
            .ok_or(GenerateError::BudgetExhausted(budget))?;

        form.splice(position..=position, production.rhs.iter().cloned());
    }

    return Ok(form.iter().map(Symbol::name).collect());
}
