pub mod args;
pub mod commands;

pub use args::{ProcessArgs, RunArgs, ValidateArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
WORKFLOW COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "hephestos")]
#[command(version = crate::VERSION)]
#[command(about = "Workflow execution engine for storefront webhook automations")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a definition, run it against a sample context, then process real events per shop."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Execute one workflow definition",
        long_about = "Run evaluates the trigger, walks the graph and prints the execution result as JSON. Exits 1 unless the result is completed.",
        after_help = "Example:\n    hephestos run --workflow order_paid.json --context order.json"
    )]
    Run(RunArgs),
    #[command(
        about = "Lint a workflow definition",
        long_about = "Validate reports invalid properties, unknown successors, unregistered task types, unreachable tasks and cycles. Exits 1 when any error is found.",
        after_help = "Example:\n    hephestos validate --workflow order_paid.yaml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Run every definition of a shop against one event",
        long_about = "Process loads <definitions>/<shop>/*, runs all of them concurrently against the event context and prints one result per definition.",
        after_help = "Example:\n    hephestos process --definitions ./workflows --shop acme --event order.json"
    )]
    Process(ProcessArgs),
}

/// Dispatch a parsed command; the returned code becomes the process exit status.
pub async fn run(args: Args) -> crate::Result<i32> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Validate(validate_args) => commands::validate(validate_args).await,
        Command::Process(process_args) => commands::process(process_args).await,
    }
}
