use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, the data files and cached models.
    ///
    /// *Defaults to $DEMO_RETRIEVER_BASE_PATH or ~/.local/share/demo-retriever*
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP service
    Serve {
        /// Bind address, overrides `listen_addr` from config
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Retrieve the demonstrations most similar to a query
    Similarity {
        /// Free-text query
        query: String,

        /// Rank by embedding of the raw query instead of masked token overlap
        #[clap(long, default_value = "false")]
        partial: bool,

        /// Number of demonstrations, overrides `retrieval.top_k` from config
        #[clap(short)]
        k: Option<usize>,
    },

    /// Print the masked form of a text
    Mask {
        text: String,

        /// Also print every n-gram that was tagged, with its score
        #[clap(long, default_value = "false")]
        explain: bool,
    },
}
