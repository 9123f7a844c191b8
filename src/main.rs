// ABOUTME: Main entry point for the revelation program.
// ABOUTME: Provides the CLI and dispatches commands to the library.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use revelation::presentation::StaticOutput;
use revelation::{Presentation, PresentationServer, Settings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Install or upgrade the reveal.js dependency
    Installreveal {
        /// Reveal.js download url
        #[arg(short, long, default_value = revelation::REVEAL_URL)]
        url: String,
    },

    /// Create a new revelation presentation
    Mkpresentation {
        /// Folder to create the presentation in
        presentation: PathBuf,
    },

    /// Make static presentation
    Mkstatic(MkstaticArgs),

    /// Start the revelation server
    Start(StartArgs),
}

#[derive(Args)]
struct PresentationArgs {
    /// Path to the slides file
    presentation: PathBuf,

    /// Custom config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Custom media folder
    #[arg(short, long)]
    media: Option<PathBuf>,

    /// Custom theme folder
    #[arg(short, long)]
    theme: Option<PathBuf>,

    /// Custom css file to override reveal.js styles
    #[arg(short = 's', long = "style-override-file")]
    style: Option<PathBuf>,
}

impl PresentationArgs {
    fn load(self) -> revelation::Result<Presentation> {
        Presentation::new(
            &self.presentation,
            self.config,
            self.media,
            self.theme,
            self.style,
        )
    }
}

#[derive(Args)]
struct MkstaticArgs {
    #[command(flatten)]
    presentation: PresentationArgs,

    /// Folder where the static presentation will be generated
    #[arg(short, long, default_value = "output")]
    output_folder: PathBuf,

    /// File name of the static presentation
    #[arg(short = 'f', long, default_value = "index.html")]
    output_file: String,

    /// Overwrite the output folder if exists
    #[arg(short = 'r', long)]
    force: bool,
}

#[derive(Args)]
struct StartArgs {
    #[command(flatten)]
    presentation: PresentationArgs,

    /// Presentation server port
    #[arg(short, long, default_value_t = 4000)]
    port: u16,

    /// Run the revelation server on debug mode, reloading viewers on change
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Installreveal { url } => {
            revelation::install_reveal(&settings, &url).context("Installation failed")?;
        }
        Commands::Mkpresentation { presentation } => {
            println!("Starting a new presentation...");
            revelation::make_presentation(&presentation)?;
        }
        Commands::Mkstatic(args) => {
            revelation::ensure_reveal(&settings)?;

            let presentation = args.presentation.load()?;
            let page = revelation::make_static(
                &presentation,
                &settings,
                &StaticOutput {
                    folder: &args.output_folder,
                    file: &args.output_file,
                    force: args.force,
                },
            )?;

            let folder = page.parent().unwrap_or(&args.output_folder);
            println!("Static presentation generated in {}", folder.display());
        }
        Commands::Start(args) => {
            revelation::ensure_reveal(&settings)?;

            let presentation = args.presentation.load()?;
            println!("Starting revelation server...");
            PresentationServer::new(presentation, settings, args.port, args.debug)?.run()?;
        }
    }

    Ok(())
}
