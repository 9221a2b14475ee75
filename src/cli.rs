use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pinforge")]
#[command(author, version, about = "Upload media collections and their metadata to IPFS")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the media, metadata and staging folders
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the media folder, then one metadata record per media file
    Upload {
        /// Collection name used to label both uploads
        #[arg(required = true)]
        collection: String,
    },

    /// Write metadata records for an already uploaded media folder
    Stage {
        /// Content address of the media upload
        #[arg(required = true)]
        cid: String,
    },

    /// Show the pin status of a content address
    Status {
        /// Content address to look up
        #[arg(required = true)]
        cid: String,
    },

    /// Remove a pin from the backend
    Unpin {
        /// Content address to unpin
        #[arg(required = true)]
        cid: String,
    },

    /// Validate configuration file
    Validate,

    /// Display version information
    Version,
}
