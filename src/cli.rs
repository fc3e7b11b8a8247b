use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "searchbridge",
    about = "Compile search predicates into OpenSearch queries and reconcile the hits"
)]
pub struct Cli {
    /// Path to the JSON config file (overrides SEARCHBRIDGE_CONFIG and XDG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the request body a predicate file compiles to
    Compile(CompileArgs),
    /// Run a search
    Search(SearchArgs),
    /// List the distinct values of a field among matching documents
    Distinct(DistinctArgs),
    /// Create or delete indices
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Bulk-index records from a JSON-lines file
    Import(ImportArgs),
    /// Bulk-delete documents by identifier
    Remove(RemoveArgs),
    /// Delete every document in a collection
    Flush {
        /// Index to empty
        collection: String,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

impl Command {
    /// Whether the command talks to the engine.
    pub fn needs_engine(&self) -> bool {
        !matches!(self, Command::Compile(_) | Command::Completions(_))
    }
}

// -- Compile --

#[derive(Debug, Parser)]
pub struct CompileArgs {
    /// Predicate set as a JSON file
    pub predicates: PathBuf,

    /// Compile the request for this page (1-based) instead of a plain search
    #[arg(long)]
    pub page: Option<usize>,

    /// Hits per page when --page is given
    #[arg(long, default_value = "10", requires = "page")]
    pub per_page: usize,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Predicate set as a JSON file
    pub predicates: PathBuf,

    /// Print the raw hits as JSON
    #[arg(long)]
    pub json: bool,

    /// Print only the total hit count
    #[arg(long, conflicts_with_all = ["json", "records"])]
    pub count: bool,

    /// Reconcile hits against records in this JSON-lines file
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Identifier field of the records file
    #[arg(long, default_value = "id")]
    pub key: String,
}

// -- Distinct --

#[derive(Debug, Parser)]
pub struct DistinctArgs {
    /// Predicate set as a JSON file
    pub predicates: PathBuf,

    /// Field whose distinct values are listed
    pub field: String,
}

// -- Index --

#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// Create an index with the configured settings
    Create {
        /// Index name
        name: String,
    },
    /// Delete an index
    Delete {
        /// Index name
        name: String,
    },
}

// -- Import / Remove --

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// Target index
    pub collection: String,

    /// JSON-lines file, one record object per line
    pub records: PathBuf,

    /// Identifier field of each record
    #[arg(long, default_value = "id")]
    pub key: String,

    /// Field marking a record as soft-deleted when present and not null
    #[arg(long)]
    pub soft_delete_field: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RemoveArgs {
    /// Target index
    pub collection: String,

    /// Document identifiers to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "searchbridge",
            &mut std::io::stdout(),
        );
    }
}
