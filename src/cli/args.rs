use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow definition file (.json, .yaml or .yml)
    #[arg(long, value_name = "FILE")]
    pub workflow: PathBuf,

    /// JSON object used as the execution context (default: empty)
    #[arg(long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Engine config file (default: <workspace>/.hephestos/config/engine.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace holding .hephestos config and logs (default: current directory)
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Workflow definition file to lint
    #[arg(long, value_name = "FILE")]
    pub workflow: PathBuf,

    /// Print diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Directory laid out as <dir>/<shop>/*.json|*.yaml
    #[arg(long, value_name = "DIR")]
    pub definitions: PathBuf,

    /// Shop whose definitions receive the event
    #[arg(long)]
    pub shop: String,

    /// JSON object used as the execution context of every run
    #[arg(long, value_name = "FILE")]
    pub event: PathBuf,

    /// Engine config file (default: <workspace>/.hephestos/config/engine.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Workspace holding .hephestos config and logs (default: current directory)
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,
}
