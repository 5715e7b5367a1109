// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: One command: deploy an image tag to the configured service.

use clap::Parser;
use rollsafe::types::ImageTag;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollsafe")]
#[command(about = "Deploy a new revision to a container service, rolling back on failure")]
#[command(version)]
pub struct Cli {
    /// Image tag to deploy [default: the latest built tag]
    #[arg(value_name = "IMAGE_TAG")]
    pub tag: Option<ImageTag>,

    /// Config file (defaults to rollsafe.yml discovery in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Break an existing deploy lock
    #[arg(long)]
    pub force: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output
    #[arg(long)]
    pub json: bool,
}
