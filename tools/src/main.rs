use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netpack_tools::{
    decode_frame, encode_frame, format_decode_pretty, format_inspect_pretty, inspect_stream,
    parse_layout, to_hex, FieldValue,
};
use packet::Limits;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "netpack-tools",
    version,
    about = "netpack packet encoding and inspection tools"
)]
struct Cli {
    /// Limits JSON file (defaults to the stream limits).
    #[arg(long, global = true)]
    limits: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode one framed packet from field specs.
    Encode {
        /// Packet type tag.
        #[arg(long = "type")]
        packet_type: u8,
        /// Field as kind:value, e.g. u16:4660 or str:hello. Repeatable.
        #[arg(long = "field")]
        fields: Vec<String>,
        /// Write raw bytes here instead of printing hex.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Split a captured byte stream into frames.
    Inspect {
        /// Path to the captured bytes.
        stream_path: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Decode the fields of the first frame in a file.
    Decode {
        /// Path to the frame bytes.
        packet_file: PathBuf,
        /// Comma-separated field kinds, e.g. u16,str,buf.
        #[arg(long)]
        layout: String,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = match &cli.limits {
        Some(path) => load_limits(path)?,
        None => Limits::default(),
    };

    match cli.command {
        Command::Encode {
            packet_type,
            fields,
            output,
        } => {
            let fields = fields
                .iter()
                .map(|spec| FieldValue::parse_spec(spec))
                .collect::<Result<Vec<_>>>()
                .context("parse fields")?;
            let bytes = encode_frame(packet_type, &fields, &limits)?;
            match output {
                Some(path) => fs::write(&path, &bytes)
                    .with_context(|| format!("write packet {}", path.display()))?,
                None => println!("{}", to_hex(&bytes)),
            }
        }
        Command::Inspect {
            stream_path,
            format,
        } => {
            let bytes = fs::read(&stream_path)
                .with_context(|| format!("read stream {}", stream_path.display()))?;
            let report = inspect_stream(&bytes, &limits);
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&report).context("serialize json")?;
                    println!("{json}");
                }
                OutputFormat::Pretty => print!("{}", format_inspect_pretty(&report)),
            }
        }
        Command::Decode {
            packet_file,
            layout,
            format,
        } => {
            let bytes = fs::read(&packet_file)
                .with_context(|| format!("read packet {}", packet_file.display()))?;
            let layout = parse_layout(&layout).context("parse layout")?;
            let report = decode_frame(&bytes, &layout, &limits)?;
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&report).context("serialize json")?;
                    println!("{json}");
                }
                OutputFormat::Pretty => print!("{}", format_decode_pretty(&report)),
            }
        }
    }
    Ok(())
}

fn load_limits(path: &Path) -> Result<Limits> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read limits {}", path.display()))?;
    serde_json::from_str(&contents).context("parse limits json")
}
