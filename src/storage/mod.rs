/*
    This module loads and saves grammars as JSON

    The document shape is {"N": [...], "T": [...], "S": name,
    "P": [...]} where each production is either {"lhs": name,
    "rhs": [names]} or the classic `A -> B C` line; an empty rhs denotes
    epsilon. Older files that call the start key "S0" load unchanged.
    N and T are sets and serialize sorted; P keeps declaration order so
    a reloaded grammar assigns the same origin indices.
*/

use std::fmt::Display;
use std::fs;
use std::path::PathBuf;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error_handling::{Error, ErrorType, Location};
use crate::grammar::text::{parse_production, ProductionSyntaxError};
use crate::grammar::{Grammar, InvalidGrammarError, Symbol};

#[derive(Debug)]
pub enum StorageErrorType {
    // There was an issue reading or writing a file
    File(std::io::Error),
    // The file is not valid JSON or not a grammar document
    Json(serde_json::Error),
    // A production line could not be parsed
    Production(ProductionSyntaxError),
    // The document describes an invalid grammar
    Grammar(InvalidGrammarError),
}

impl ErrorType for StorageErrorType {}

impl PartialEq for StorageErrorType {
    fn eq(&self, other: &Self) -> bool {
        if let StorageErrorType::File(a) = self {
            if let StorageErrorType::File(b) = other {
                return a.kind() == b.kind();
            }
        }
        return std::mem::discriminant(self) == std::mem::discriminant(other);
    }
}

impl Display for StorageErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageErrorType::File(e) => write!(f, "File error: {}", e),
            StorageErrorType::Json(e) => write!(f, "Invalid grammar document: {}", e),
            StorageErrorType::Production(e) => write!(f, "{}", e),
            StorageErrorType::Grammar(e) => write!(f, "{}", e),
        }
    }
}

pub type StorageError = Error<StorageErrorType>;
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Serialize, Deserialize)]
struct GrammarDoc {
    #[serde(rename = "N")]
    nonterminals: Vec<String>,
    #[serde(rename = "T")]
    terminals: Vec<String>,
    #[serde(rename = "S", alias = "S0")]
    start: String,
    #[serde(rename = "P")]
    productions: Vec<ProductionDoc>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProductionDoc {
    Structured { lhs: String, rhs: Vec<String> },
    Line(String),
}

fn resolve(name: String, nonterminals: &[String]) -> Symbol {
    if nonterminals.iter().any(|n| *n == name) {
        Symbol::Nonterminal(name)
    } else {
        // Anything undeclared is taken as a terminal; validation
        // reports it if it is not one
        Symbol::Terminal(name)
    }
}

fn doc_to_grammar(doc: GrammarDoc) -> Result<Grammar, StorageErrorType> {
    let GrammarDoc { nonterminals, terminals, start, productions } = doc;

    let mut parsed = Vec::with_capacity(productions.len());
    for entry in productions {
        let production = match entry {
            ProductionDoc::Structured { lhs, rhs } => {
                let rhs = rhs.into_iter().map(|name| resolve(name, &nonterminals)).collect();
                (lhs, rhs)
            }
            ProductionDoc::Line(line) => {
                parse_production(&line, &nonterminals).map_err(StorageErrorType::Production)?
            }
        };
        parsed.push(production);
    }

    return Grammar::new(nonterminals, terminals, parsed, start)
        .map_err(StorageErrorType::Grammar);
}

pub fn grammar_from_json(text: &str) -> Result<Grammar, StorageErrorType> {
    let doc: GrammarDoc = serde_json::from_str(text).map_err(StorageErrorType::Json)?;
    return doc_to_grammar(doc);
}

pub fn grammar_to_json(grammar: &Grammar) -> Result<String, serde_json::Error> {
    let doc = GrammarDoc {
        nonterminals: grammar.nonterminals().iter().cloned().sorted().collect(),
        terminals: grammar.terminals().iter().cloned().sorted().collect(),
        start: grammar.start().to_string(),
        productions: grammar
            .productions()
            .iter()
            .map(|p| ProductionDoc::Structured {
                lhs: p.lhs.clone(),
                rhs: p.rhs.iter().map(|sym| sym.name().to_string()).collect(),
            })
            .collect(),
    };
    return serde_json::to_string_pretty(&doc);
}

pub fn load_grammar(path: &PathBuf) -> StorageResult<Grammar> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::in_file(path.clone(), StorageErrorType::File(e)))?;

    let doc: GrammarDoc = serde_json::from_str(&text).map_err(|e| Error {
        location: Location { file: path.clone(), line: e.line() },
        error: StorageErrorType::Json(e),
    })?;

    return doc_to_grammar(doc).map_err(|error| Error::in_file(path.clone(), error));
}

pub fn save_grammar(grammar: &Grammar, path: &PathBuf) -> StorageResult<()> {
    let text = grammar_to_json(grammar)
        .map_err(|e| Error::in_file(path.clone(), StorageErrorType::Json(e)))?;
    return fs::write(path, text)
        .map_err(|e| Error::in_file(path.clone(), StorageErrorType::File(e)));
}
