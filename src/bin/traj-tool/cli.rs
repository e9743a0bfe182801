use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect trajectory files written for the gimbal firmware
#[derive(Parser)]
#[command(author, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the header, sample rate and the first samples
    Info {
        filename: PathBuf,

        /// Axis to read from multi-axis files
        #[clap(short, long, default_value_t = 0)]
        axis: usize,

        /// Samples to print
        #[clap(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Export `time_s,angle_deg` rows
    Csv {
        filename: PathBuf,

        /// Output file, stdout if not given
        #[clap(short, long)]
        output: Option<PathBuf>,

        #[clap(short, long, default_value_t = 0)]
        axis: usize,
    },
}
