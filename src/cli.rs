use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a grammar
    Show {
        /// File containing the grammar (JSON)
        file: PathBuf,
    },

    /// Convert a grammar to Chomsky normal form and print it
    Normalize {
        /// File containing the grammar (JSON)
        file: PathBuf,
    },

    /// Test whether a string belongs to the grammar's language
    Parse {
        /// File containing the grammar (JSON)
        file: PathBuf,

        /// Candidate string; tokens separated by whitespace, or single
        /// characters when there is none
        input: String,

        /// Print the derivation tree
        #[arg(short, long)]
        tree: bool,
    },

    /// List the shortest strings of the language
    Generate {
        /// File containing the grammar (JSON)
        file: PathBuf,

        /// Amount to generate (default: 10)
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Longest derivation to explore
        #[arg(long, value_name = "DEPTH")]
        max_depth: Option<usize>,

        /// Largest queued frontier to keep
        #[arg(long, value_name = "SIZE")]
        max_frontier: Option<usize>,
    },

    /// Rewrite a grammar file in the canonical document format
    Convert {
        /// File containing the grammar (JSON)
        file: PathBuf,

        /// Destination path
        output: PathBuf,
    },

    /// Produce one random sentence
    Babble {
        /// File containing the grammar (JSON)
        file: PathBuf,

        /// Rewrites to attempt before giving up (default: 512)
        #[arg(short, long, default_value_t = 512)]
        budget: usize,
    },
}
