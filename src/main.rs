mod cli;
mod error_handling;
mod generator;
mod grammar;
mod normalizer;
mod parser;
mod storage;

use std::path::PathBuf;

use clap::Parser;

use cli::{Cli, Command};
use generator::GeneratorLimits;
use grammar::Grammar;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(message) = run(cli.command) {
        eprintln!("{}", message);
        std::process::exit(1);
    }
}

fn load(file: &PathBuf) -> Result<Grammar, String> {
    storage::load_grammar(file).map_err(|e| e.to_string())
}

fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Show { file } => {
            print!("{}", load(&file)?);
        }

        Command::Normalize { file } => {
            let cnf = normalizer::normalize(&load(&file)?).map_err(|e| e.to_string())?;
            print!("{}", cnf);
        }

        Command::Parse { file, input, tree } => {
            let cnf = normalizer::normalize(&load(&file)?).map_err(|e| e.to_string())?;
            let owned = tokenize(&input);
            let tokens: Vec<&str> = owned.iter().map(String::as_str).collect();

            let result = parser::parse(&cnf, &tokens).map_err(|e| e.to_string())?;
            if result.accepted {
                println!("accepted");
                if tree {
                    if let Some(derivation) = &result.tree {
                        print!("{}", parser::tree::render_tree(derivation));
                    }
                }
            } else {
                println!("rejected");
            }
        }

        Command::Generate { file, count, max_depth, max_frontier } => {
            let mut limits = GeneratorLimits::default();
            if let Some(depth) = max_depth {
                limits.max_depth = depth;
            }
            if let Some(size) = max_frontier {
                limits.max_frontier = size;
            }

            let generated = generator::generate_shortest(&load(&file)?, count, &limits);
            for (index, string) in generated.strings.iter().enumerate() {
                println!("{}. '{}'", index + 1, string);
            }
            if !generated.complete {
                println!("(search bounds reached before {} strings)", count);
            }
        }

        Command::Convert { file, output } => {
            let grammar = load(&file)?;
            storage::save_grammar(&grammar, &output).map_err(|e| e.to_string())?;
            println!("saved {}", output.display());
        }

        Command::Babble { file, budget } => {
            let sentence = generator::random_sentence(&load(&file)?, budget)
                .map_err(|e| e.to_string())?;
            println!("{}", sentence);
        }
    }

    return Ok(());
}

// Whitespace separates tokens when present; otherwise every character
// is its own token, which suits single-letter alphabets
fn tokenize(input: &str) -> Vec<String> {
    if input.chars().any(char::is_whitespace) {
        input.split_whitespace().map(str::to_string).collect()
    } else {
        input.chars().map(String::from).collect()
    }
}
