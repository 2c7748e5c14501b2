use crate::commands::{run_convert, run_export, ConvertArgs, ExportArgs};
use clap::{Parser, Subcommand};
use fault_export::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fault-export",
    about = "Export fault source sets from a fault database as XML or GeoJSON",
    version
)]
struct Cli {
    /// Env-style file loaded before reading FAULTS_* variables (defaults to ./.env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export every region of a fault table
    Export(ExportArgs),
    /// Convert a GeoJSON feature collection into an XML source set
    Convert(ConvertArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Export(args) => run_export(cli.config, args),
        Command::Convert(args) => run_convert(cli.config, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_export::export::ExportFormat;
    use fault_export::projection::DatasetEra;

    #[test]
    fn parses_export_with_global_config() {
        let cli = Cli::try_parse_from([
            "fault-export",
            "export",
            "--era",
            "2014",
            "--format",
            "geojson-combined",
            "--config",
            "faults.env",
        ])
        .expect("parses");
        assert_eq!(cli.config, Some(PathBuf::from("faults.env")));
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.era, DatasetEra::Hazfaults2014);
                assert_eq!(args.format, ExportFormat::GeoJsonPerRegion);
                assert!(args.table.is_none());
                assert!(!args.polygon);
            }
            other => panic!("expected export command, got {other:?}"),
        }
    }

    #[test]
    fn export_format_defaults_to_markup() {
        let cli = Cli::try_parse_from(["fault-export", "export", "--era", "generic"])
            .expect("parses");
        match cli.command {
            Command::Export(args) => assert_eq!(args.format, ExportFormat::Markup),
            other => panic!("expected export command, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_era() {
        assert!(Cli::try_parse_from(["fault-export", "export", "--era", "1996"]).is_err());
    }

    #[test]
    fn parses_convert() {
        let cli = Cli::try_parse_from([
            "fault-export",
            "convert",
            "--input",
            "wasatch.geojson",
            "--name",
            "Wasatch Faults",
            "--unchecked",
        ])
        .expect("parses");
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.input, PathBuf::from("wasatch.geojson"));
                assert_eq!(args.name, "Wasatch Faults");
                assert!(args.unchecked);
                assert!(args.output.is_none());
            }
            other => panic!("expected convert command, got {other:?}"),
        }
    }
}
