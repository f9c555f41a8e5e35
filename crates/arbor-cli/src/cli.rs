use std::path::PathBuf;

use arbor_backend::ManyMapping;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbor", about = "Arbor: persistence for large object graphs", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import an XMI document into a file backend
    Import(ImportArgs),
    /// Export a file backend as an XMI document
    Export(ExportArgs),
    /// Copy a file backend into a new directory
    Copy(CopyArgs),
    /// Show what a backend directory holds
    Info(InfoArgs),
}

#[derive(Args)]
pub struct ImportArgs {
    /// XMI document, plain or zstd-compressed
    pub input: PathBuf,
    /// Backend directory to create or extend
    pub dir: PathBuf,
    /// Schema definition (JSON); repeat for several
    #[arg(short, long, required = true)]
    pub schema: Vec<PathBuf>,
    /// Multi-valued feature layout: indices, lists or arrays
    #[arg(short, long, default_value_t = ManyMapping::Indices)]
    pub mapping: ManyMapping,
    /// Log progress through the document
    #[arg(long)]
    pub progress: bool,
    /// Threads writing to the backend; 0 writes inline
    #[arg(short, long, default_value_t = 0)]
    pub workers: usize,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Backend directory
    pub dir: PathBuf,
    /// XMI document to write
    pub output: PathBuf,
    /// Schema definition (JSON); repeat for several
    #[arg(short, long, required = true)]
    pub schema: Vec<PathBuf>,
    /// Compress the document with zstd
    #[arg(short, long)]
    pub compress: bool,
}

#[derive(Args)]
pub struct CopyArgs {
    /// Source backend directory
    pub from: PathBuf,
    /// Target backend directory
    pub to: PathBuf,
    /// Layout of the copy; defaults to the source's
    #[arg(short, long)]
    pub mapping: Option<ManyMapping>,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Backend directory
    pub dir: PathBuf,
}
