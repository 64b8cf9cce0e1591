use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author = "Gokul <@bahdotsh>",
    version = env!("CARGO_PKG_VERSION"),
    about = "keysnip - A system-wide text expander",
    long_about = "keysnip watches what you type anywhere and replaces trigger commands with snippet content."
)]
pub struct Keysnip {
    #[clap(long, short, global = true, help = "Log debug output")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the expansion engine in the foreground until Ctrl-C
    Start {
        #[clap(long, short, help = "Snippet file (defaults to ~/.keysnip/snippets.json)")]
        snippets: Option<PathBuf>,

        #[clap(long, short, help = "Engine config (defaults to ~/.keysnip/config.json)")]
        config: Option<PathBuf>,
    },
    /// Check whether keystroke observation is permitted
    Check {
        #[clap(long, short, help = "Open the system settings where it is granted")]
        request: bool,
    },
    /// List configured snippets
    List {
        #[clap(long, short, help = "Snippet file (defaults to ~/.keysnip/snippets.json)")]
        snippets: Option<PathBuf>,
    },
    /// Preview how snippet content resolves
    Resolve {
        #[clap(help = "Snippet content, e.g. \"Hi {{name:there}}, today is {date}{cursor}\"")]
        text: String,
    },
    /// Show how the focused application is classified
    Classify,
}
