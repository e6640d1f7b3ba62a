/*
    This module rebuilds derivation trees in the original grammar's shape

    The CYK table speaks the normal form's language: binary productions,
    helper nonterminals, collapsed unit chains. Walking the backpointers
    alone would therefore produce a tree full of normalization
    artifacts. Instead, every step consults the provenance map:
    binarization helpers and terminal proxies are spliced out, deleted
    nullable symbols come back as childless nodes at their original
    positions, and collapsed unit chains are re-expanded into nested
    unary nodes. The result's internal nodes all correspond to
    productions of the grammar the caller actually wrote.
*/

use crate::grammar::{Production, Symbol};
use crate::normalizer::{BaseStep, CnfGrammar, CnfOrigin, CnfRhs, HelperRole, UnitStep};

use super::{Backpointer, CykTable};

// (offset, length) over the parsed input
pub type Span = (usize, usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationTree {
    pub symbol: Symbol,
    pub span: Span,
    pub children: Vec<DerivationTree>,
}

impl DerivationTree {
    fn leaf(terminal: &str, position: usize) -> Self {
        DerivationTree {
            symbol: Symbol::Terminal(terminal.to_string()),
            span: (position, 1),
            children: Vec::new(),
        }
    }

    // A nonterminal that derives the empty string: no children, no yield
    fn epsilon(symbol: Symbol, position: usize) -> Self {
        DerivationTree { symbol, span: (position, 0), children: Vec::new() }
    }

    pub(crate) fn empty(start: &str) -> Self {
        Self::epsilon(Symbol::Nonterminal(start.to_string()), 0)
    }

    // Concatenated terminals of the leaves, left to right; equals the
    // parsed input for any tree built from an accepted parse
    pub fn terminal_yield(&self) -> String {
        match &self.symbol {
            Symbol::Terminal(terminal) => terminal.clone(),
            Symbol::Nonterminal(_) => {
                self.children.iter().map(DerivationTree::terminal_yield).collect()
            }
        }
    }
}

// Rebuilds the derivation of `nonterminal` over the given span. Returns
// None only if the table lacks a backpointer the origin data promises,
// which cannot happen for a span the recognizer accepted.
pub fn reconstruct(
    cnf: &CnfGrammar,
    table: &CykTable,
    nonterminal: &str,
    offset: usize,
    length: usize,
) -> Option<DerivationTree> {
    build_node(cnf, table, nonterminal, offset, length)
}

fn build_node(
    cnf: &CnfGrammar,
    table: &CykTable,
    nonterminal: &str,
    offset: usize,
    length: usize,
) -> Option<DerivationTree> {
    let backpointer = table.entry(offset, length, nonterminal)?;
    let production = match backpointer {
        Backpointer::Leaf { production } | Backpointer::Split { production, .. } => *production,
    };
    let flat = flatten(cnf, table, backpointer, offset, length)?;
    apply_origin(cnf, &cnf.productions()[production].origin, flat, offset, length)
}

// The subtrees a backpointer yields at the granularity of the grammar
// before binarization: helper links are flattened through and terminal
// proxies become their terminal leaf
fn flatten(
    cnf: &CnfGrammar,
    table: &CykTable,
    backpointer: &Backpointer,
    offset: usize,
    length: usize,
) -> Option<Vec<DerivationTree>> {
    match backpointer {
        Backpointer::Leaf { production } => {
            let CnfRhs::Terminal(terminal) = &cnf.productions()[*production].rhs else {
                return None;
            };
            Some(vec![DerivationTree::leaf(terminal, offset)])
        }
        Backpointer::Split { split, production } => {
            let CnfRhs::Pair(left, right) = &cnf.productions()[*production].rhs else {
                return None;
            };
            let mut children = child_nodes(cnf, table, left, offset, *split)?;
            children.extend(child_nodes(cnf, table, right, offset + split, length - split)?);
            Some(children)
        }
    }
}

fn child_nodes(
    cnf: &CnfGrammar,
    table: &CykTable,
    symbol: &str,
    offset: usize,
    length: usize,
) -> Option<Vec<DerivationTree>> {
    match cnf.provenance().helper_role(symbol) {
        // A binarization helper covers a tail segment of its production's
        // rhs; its expansion is spliced into the parent
        Some(HelperRole::Binarize) => {
            let backpointer = table.entry(offset, length, symbol)?;
            flatten(cnf, table, backpointer, offset, length)
        }
        Some(HelperRole::TerminalProxy(terminal)) => {
            Some(vec![DerivationTree::leaf(terminal, offset)])
        }
        // The fresh start never occurs on a right side
        Some(HelperRole::Start) | None => {
            build_node(cnf, table, symbol, offset, length).map(|node| vec![node])
        }
    }
}

// Wraps flattened children into the original grammar's node shape
fn apply_origin(
    cnf: &CnfGrammar,
    origin: &CnfOrigin,
    flat: Vec<DerivationTree>,
    offset: usize,
    length: usize,
) -> Option<DerivationTree> {
    let mut node = match &origin.base {
        BaseStep::Production { index, deleted } => {
            assemble(cnf.provenance().original(*index), deleted, flat, offset, length)?
        }
        // Start and helper bases are collapsed or spliced away before
        // origins are applied
        BaseStep::Start | BaseStep::Helper => return None,
    };

    // Re-expand the collapsed unit chain, innermost production first
    for step in origin.chain.iter().rev() {
        node = match step {
            UnitStep::Start => node,
            UnitStep::Production { index, deleted } => {
                assemble(cnf.provenance().original(*index), deleted, vec![node], offset, length)?
            }
        };
    }

    Some(node)
}

// Builds the node for one original production from the surviving
// subtrees, re-inserting a childless node at every deleted position
fn assemble(
    production: &Production,
    deleted: &[usize],
    flat: Vec<DerivationTree>,
    offset: usize,
    length: usize,
) -> Option<DerivationTree> {
    let mut survivors = flat.into_iter();
    let mut children = Vec::with_capacity(production.rhs.len());
    let mut cursor = offset;

    for (position, symbol) in production.rhs.iter().enumerate() {
        if deleted.contains(&position) {
            children.push(DerivationTree::epsilon(symbol.clone(), cursor));
        } else {
            let child = survivors.next()?;
            cursor = child.span.0 + child.span.1;
            children.push(child);
        }
    }

    Some(DerivationTree {
        symbol: Symbol::Nonterminal(production.lhs.clone()),
        span: (offset, length),
        children,
    })
}

// Indented textual rendering; a node whose only child is a terminal
// prints on one line
pub fn render_tree(tree: &DerivationTree) -> String {
    let mut out = String::new();
    render_into(tree, 0, &mut out);
    return out;
}

fn render_into(node: &DerivationTree, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);

    if let [child] = &node.children[..] {
        if let Symbol::Terminal(terminal) = &child.symbol {
            out.push_str(&format!("{}{} -> {}\n", pad, node.symbol, terminal));
            return;
        }
    }

    match &node.symbol {
        Symbol::Terminal(terminal) => out.push_str(&format!("{}'{}'\n", pad, terminal)),
        Symbol::Nonterminal(name) => {
            out.push_str(&format!("{}{}\n", pad, name));
            for child in &node.children {
                render_into(child, indent + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::pair_grammar;
    use crate::grammar::Grammar;
    use crate::normalizer::normalize;
    use crate::parser::parse;
    use crate::parser::tests::grammar_from;

    fn parse_tree(grammar: &Grammar, tokens: &[&str]) -> DerivationTree {
        let cnf = normalize(grammar).unwrap();
        let result = parse(&cnf, tokens).unwrap();
        assert!(result.accepted, "tokens {:?} should be accepted", tokens);
        result.tree.unwrap()
    }

    // Every internal node with children must spell out a production of
    // the original grammar; childless nonterminal nodes stand for
    // epsilon derivations
    fn assert_sound(grammar: &Grammar, node: &DerivationTree) {
        let Symbol::Nonterminal(name) = &node.symbol else { return };
        if node.children.is_empty() {
            return;
        }
        let shape: Vec<Symbol> = node.children.iter().map(|c| c.symbol.clone()).collect();
        assert!(
            grammar.productions_for(name).any(|p| p.rhs == shape),
            "node {} has children {:?} matching no production",
            name,
            shape
        );
        for child in &node.children {
            assert_sound(grammar, child);
        }
    }

    #[test]
    fn pair_tree_has_original_shape() {
        let grammar = pair_grammar();
        let tree = parse_tree(&grammar, &["a", "b"]);

        assert_eq!(tree, DerivationTree {
            symbol: Symbol::Nonterminal("S".to_string()),
            span: (0, 2),
            children: vec![
                DerivationTree {
                    symbol: Symbol::Nonterminal("A".to_string()),
                    span: (0, 1),
                    children: vec![DerivationTree::leaf("a", 0)],
                },
                DerivationTree {
                    symbol: Symbol::Nonterminal("B".to_string()),
                    span: (1, 1),
                    children: vec![DerivationTree::leaf("b", 1)],
                },
            ],
        });
        assert_sound(&grammar, &tree);
    }

    #[test]
    fn long_production_survives_binarization() {
        // The three-symbol rhs is split and proxied in the normal form
        // but must come back as one node with three children
        let grammar = grammar_from(&["S"], &["a", "b", "c"], &["S -> a S b", "S -> c"], "S");
        let tree = parse_tree(&grammar, &["a", "c", "b"]);

        assert_eq!(tree.symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.children[0], DerivationTree::leaf("a", 0));
        assert_eq!(tree.children[2], DerivationTree::leaf("b", 2));
        assert_eq!(tree.children[1].symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.children[1].span, (1, 1));
        assert_eq!(tree.terminal_yield(), "acb");
        assert_sound(&grammar, &tree);
    }

    #[test]
    fn deleted_nullable_comes_back_as_childless_node() {
        let grammar = grammar_from(
            &["S", "A", "B"],
            &["a", "b"],
            &["S -> A B", "A -> a", "A -> ε", "B -> b"],
            "S",
        );
        let tree = parse_tree(&grammar, &["b"]);

        assert_eq!(tree.children.len(), 2);
        let a_node = &tree.children[0];
        assert_eq!(a_node.symbol, Symbol::Nonterminal("A".to_string()));
        assert_eq!(a_node.span, (0, 0));
        assert_eq!(a_node.children, vec![]);
        assert_eq!(tree.children[1].terminal_yield(), "b");
        assert_eq!(tree.terminal_yield(), "b");
        assert_sound(&grammar, &tree);
    }

    #[test]
    fn collapsed_unit_chain_is_reexpanded() {
        let grammar = grammar_from(&["S", "A"], &["a"], &["S -> A", "A -> a"], "S");
        let tree = parse_tree(&grammar, &["a"]);

        assert_eq!(tree.symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.children.len(), 1);
        let inner = &tree.children[0];
        assert_eq!(inner.symbol, Symbol::Nonterminal("A".to_string()));
        assert_eq!(inner.children, vec![DerivationTree::leaf("a", 0)]);
        assert_sound(&grammar, &tree);
    }

    #[test]
    fn promoted_start_is_elided_from_the_tree() {
        let grammar = grammar_from(&["S"], &["a"], &["S -> a S", "S -> a"], "S");
        let tree = parse_tree(&grammar, &["a", "a", "a"]);

        assert_eq!(tree.symbol, Symbol::Nonterminal("S".to_string()));
        assert_eq!(tree.terminal_yield(), "aaa");
        assert_sound(&grammar, &tree);
    }

    #[test]
    fn yields_match_inputs_across_grammars() {
        let grammar = grammar_from(
            &["S", "A"],
            &["a", "b", "c"],
            &["S -> A S A", "S -> c", "A -> a", "A -> b"],
            "S",
        );

        for tokens in [
            vec!["c"],
            vec!["a", "c", "b"],
            vec!["b", "a", "c", "a", "b"],
        ] {
            let tree = parse_tree(&grammar, &tokens);
            assert_eq!(tree.terminal_yield(), tokens.concat());
            assert_sound(&grammar, &tree);
        }
    }

    #[test]
    fn render_indents_by_depth() {
        let tree = parse_tree(&pair_grammar(), &["a", "b"]);

        assert_eq!(render_tree(&tree), "\
S
  A -> a
  B -> b
");
    }
}
