use clap::{Parser, Subcommand};
use eark_aip::{Algorithm, ChecksumAlgorithm, RandomIds, TransformOptions, Transformer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "eark-aip")]
#[command(author, version, about = "Transform E-ARK submission packages into archival packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the AIP of a SIP directory
    Transform {
        /// SIP directory, named `<prefix>uuid-<uuid>`
        sip_dir: PathBuf,
        /// Directory receiving the AIP, created if missing
        output_dir: PathBuf,
        /// Reuse the SIP name for the AIP instead of allocating a fresh UUID
        #[arg(long, env = "EARK_AIP_SAME_NAME")]
        same_name: bool,
        /// Accept representation names that are not numbered 1, 2, 3, ...
        #[arg(long, env = "EARK_AIP_SKIP_SEQUENCE_CHECK")]
        skip_sequence_check: bool,
    },
    /// Describe the archive that replaced the data of an AIP representation
    UpdateRepresentation {
        /// Representation directory, `<AIP>/representations/<name>`, whose `data/` holds one `.zip`
        rep_dir: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr, stdout only carries the AIP name
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let algorithm = ChecksumAlgorithm::<sha2::Sha256>::new(Algorithm::Sha256);

    match cli.command {
        Commands::Transform {
            sip_dir,
            output_dir,
            same_name,
            skip_sequence_check,
        } => {
            let options = TransformOptions {
                same_name,
                enforce_sequence: !skip_sequence_check,
            };
            let transformer = Transformer::new(&RandomIds, &algorithm, options);

            match transformer.run(&sip_dir, &output_dir).await {
                Ok(report) => {
                    let unresolved = report.root.unresolved.len()
                        + report
                            .representations
                            .iter()
                            .map(|representation| representation.report.unresolved.len())
                            .sum::<usize>();
                    if unresolved > 0 {
                        warn!(unresolved, "Some references were given fresh identifiers");
                    }
                    println!("{}", report.aip_name);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(sip = %sip_dir.display(), "{e}");
                    ExitCode::from(e.exit_code())
                }
            }
        }
        Commands::UpdateRepresentation { rep_dir } => {
            let transformer = Transformer::new(&RandomIds, &algorithm, TransformOptions::default());

            match transformer.update_representation(&rep_dir).await {
                Ok(report) => {
                    let unresolved =
                        report.representation.unresolved.len() + report.root.unresolved.len();
                    if unresolved > 0 {
                        warn!(unresolved, "Some references were given fresh identifiers");
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(representation = %rep_dir.display(), "{e}");
                    ExitCode::from(e.exit_code())
                }
            }
        }
    }
}
