use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use provkit::chain::{ChainOrchestrator, MAX_INTERMEDIATES};
use provkit::error::Result;

/// Generate test PKIs for IoT device provisioning.
#[derive(Debug, Parser)]
#[command(name = "provkit", version, about)]
struct Cli {
    /// Directory the generated files are written to.
    #[arg(short, long, global = true, default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a root CA and a chain of intermediate CAs.
    #[command(name = "createcertchain")]
    CreateCertChain {
        /// Root CA subject; also the base name of the root files.
        #[arg(short, long)]
        subject: String,
        /// Password for every archive written.
        #[arg(short, long)]
        password: String,
        /// Number of intermediate CAs below the root.
        #[arg(short, long, default_value_t = 0,
              value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_INTERMEDIATES)))]
        intermediates: u8,
    },
    /// Create a device certificate signed by a CA archive.
    #[command(name = "createdevicecert")]
    CreateDeviceCert {
        /// Device name, used as subject, SAN and file name.
        #[arg(short, long)]
        subject: String,
        /// Password for the device archive.
        #[arg(short, long)]
        password: String,
        /// Archive holding the signing CA.
        #[arg(short = 'c', long = "ca")]
        ca_file: PathBuf,
        /// Password of the CA archive.
        #[arg(short = 'q', long)]
        ca_password: String,
    },
    /// Create a verification certificate for a portal proof-of-possession code.
    #[command(name = "createverificationcert")]
    CreateVerificationCert {
        /// Verification code from the portal.
        #[arg(short, long)]
        subject: String,
        /// Archive holding the CA being verified.
        #[arg(short = 'c', long = "ca")]
        ca_file: PathBuf,
        /// Password of the CA archive.
        #[arg(short, long)]
        password: String,
    },
}

fn run(out_dir: PathBuf, command: Command) -> Result<()> {
    let mut orchestrator = ChainOrchestrator::default();
    match command {
        Command::CreateCertChain {
            subject,
            password,
            intermediates,
        } => {
            orchestrator.create_cert_chain(&out_dir, &subject, &password, intermediates)?;
        }
        Command::CreateDeviceCert {
            subject,
            password,
            ca_file,
            ca_password,
        } => {
            orchestrator.create_device_cert(&out_dir, &subject, &password, &ca_file, &ca_password)?;
        }
        Command::CreateVerificationCert {
            subject,
            ca_file,
            password,
        } => {
            orchestrator.create_verification_cert(&out_dir, &subject, &ca_file, &password)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { -1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let Some(command) = cli.command else {
        eprintln!(
            "No command passed on the command line. Run with --help to see command line options."
        );
        process::exit(-1);
    };

    if let Err(err) = run(cli.out_dir, command) {
        log::error!("{err}");
        process::exit(err.exit_code());
    }
}
