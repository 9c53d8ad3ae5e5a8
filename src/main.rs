use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use manga_overlay_rust::{Command, Config, Point, Size, parse_point, parse_size};

#[derive(Parser, Debug)]
#[command(
    name = "manga-overlay-rust",
    version,
    about = "Descramble tiled manga pages and lay out translated text overlays"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Rebuild one scrambled page image
    Descramble {
        /// Scrambled image file
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Output PNG file
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Page width from the episode metadata
        #[arg(long = "width")]
        width: u32,

        /// Page height from the episode metadata
        #[arg(long = "height")]
        height: u32,

        /// Grid divisions (default from settings)
        #[arg(short = 'd', long = "divisions")]
        divisions: Option<u32>,
    },
    /// Print overlay boxes for a detection result file as JSON
    Layout {
        /// Detection server response (JSON)
        #[arg(long = "regions")]
        regions: PathBuf,

        /// Pixel size the boxes are expressed in (e.g. 760x1200)
        #[arg(long = "source", value_parser = size_arg)]
        source: Size,

        /// On-screen size of the image element (e.g. 380x600)
        #[arg(long = "display", value_parser = size_arg)]
        display: Size,

        /// Element offset inside its container (e.g. 10,20)
        #[arg(long = "offset", value_parser = point_arg, default_value = "0,0")]
        offset: Point,
    },
    /// Fetch, descramble, detect and annotate every main page of an episode
    Process {
        /// Episode JSON or a saved viewer HTML page
        #[arg(short = 'e', long = "episode")]
        episode: PathBuf,

        /// Directory for page PNGs, region JSON and annotated pages
        #[arg(short = 'o', long = "out-dir", default_value = "pages")]
        out_dir: PathBuf,

        /// Number of pages to process (0 = all)
        #[arg(short = 'n', long = "limit")]
        limit: Option<usize>,

        /// Detection server base URL
        #[arg(short = 's', long = "server")]
        server: Option<String>,

        /// Machine-translate untranslated regions and keep labels on one line
        #[arg(long = "english")]
        english: bool,
    },
    /// Check that the detection server is up
    Health {
        /// Detection server base URL
        #[arg(short = 's', long = "server")]
        server: Option<String>,
    },
}

fn size_arg(value: &str) -> Result<Size, String> {
    parse_size(value).map_err(|err| err.to_string())
}

fn point_arg(value: &str) -> Result<Point, String> {
    parse_point(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    manga_overlay_rust::logging::init(cli.verbose)?;

    let command = match cli.command {
        CliCommand::Descramble {
            input,
            output,
            width,
            height,
            divisions,
        } => Command::Descramble {
            input,
            output,
            width,
            height,
            divisions,
        },
        CliCommand::Layout {
            regions,
            source,
            display,
            offset,
        } => Command::Layout {
            regions,
            source,
            display,
            offset,
        },
        CliCommand::Process {
            episode,
            out_dir,
            limit,
            server,
            english,
        } => Command::Process {
            episode,
            out_dir,
            limit,
            server,
            english,
        },
        CliCommand::Health { server } => Command::Health { server },
    };

    let output = manga_overlay_rust::run(Config {
        settings_path: cli.read_settings,
        command,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
