use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Inspect and edit ecsfs disk images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create and format a new disk image
    Mkfs {
        disk: PathBuf,

        /// Number of data blocks, defaults to 8 MiB worth of blocks
        #[arg(long, short)]
        data_blocks: Option<u16>,
    },

    /// Print the volume geometry and free ratios
    Info { disk: PathBuf },

    /// List files in the root directory
    Ls { disk: PathBuf },

    /// Copy a host file into the volume
    Add {
        disk: PathBuf,

        host_file: PathBuf,

        /// Name inside the volume, defaults to the host file name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Delete a file
    Rm { disk: PathBuf, name: String },

    /// Print a file's contents
    Cat { disk: PathBuf, name: String },

    /// Print a file's size
    Stat { disk: PathBuf, name: String },
}
