use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use converter_core::{OutputFormat, UnknownFormat};

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|err: UnknownFormat| err.to_string())
}

#[derive(Parser, Debug)]
#[clap(name = "converter", about = "Upload images for conversion and follow their progress")]
pub struct CliArgs {
    /// Path to the RON configuration file. Missing files fall back to defaults.
    #[clap(long, default_value = "converter.ron")]
    pub config: PathBuf,

    /// Log at debug level and mirror the log to the terminal.
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files as one batch and follow every job until it settles.
    Convert(ConvertArgs),
    /// List the jobs the server currently knows about.
    Jobs(ServerArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Origin of the conversion service. Overrides `server_url` from the config.
    #[clap(long)]
    pub server: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[clap(flatten)]
    pub server: ServerArgs,

    /// Target format: jpeg, png, gif or bmp.
    #[clap(short, long, default_value = "jpeg", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Receive status over the shared push channel instead of polling.
    #[clap(long)]
    pub push: bool,

    /// Directory converted files are saved into.
    #[clap(long)]
    pub out: Option<PathBuf>,

    /// Save every converted file as soon as its job completes.
    #[clap(long)]
    pub download: bool,

    /// Image files to convert, uploaded in this order.
    #[clap(required = true)]
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_parses_flags_and_files() {
        let args = CliArgs::parse_from([
            "converter", "convert", "--format", "PNG", "--push", "--download", "a.gif", "b.bmp",
        ]);
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert_eq!(convert.format, OutputFormat::Png);
        assert!(convert.push);
        assert!(convert.download);
        assert_eq!(
            convert.files,
            vec![PathBuf::from("a.gif"), PathBuf::from("b.bmp")]
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = CliArgs::try_parse_from(["converter", "convert", "--format", "tiff", "a.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn convert_needs_files() {
        assert!(CliArgs::try_parse_from(["converter", "convert"]).is_err());
    }
}
