use std::io::BufRead;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use totp_gate::config::{load_config, read_config, save_config, ConfigProvider, Directory};
use totp_gate::lifecycle::startup;
use totp_gate::observability::init_logging;
use totp_gate::session::Secret;

#[derive(Parser)]
#[command(name = "totp-gate")]
#[command(about = "Authenticating reverse proxy with TOTP and password login", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every configured endpoint
    Serve {
        #[arg(short, long, default_value = "totp-gate.toml")]
        config: PathBuf,

        /// Reload the configuration whenever the file changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Validate the configuration and list endpoints
    Check {
        #[arg(short, long, default_value = "totp-gate.toml")]
        config: PathBuf,
    },
    /// Replace the signing secret, invalidating every session
    ResetSecret {
        #[arg(short, long, default_value = "totp-gate.toml")]
        config: PathBuf,
    },
    /// Read a password from stdin and print its SHA-256 for `password_sha256`
    HashPassword,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config: path, watch } => {
            let config = load_config(&path)?;
            init_logging(&config.observability.log_level);
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                config = %path.display(),
                "totp-gate starting"
            );
            startup::run(config, &path, watch).await?;
            tracing::info!("Shutdown complete");
        }
        Commands::Check { config: path } => {
            let config = load_config(&path)?;
            let directory = Directory::from_config(&config)?;
            for endpoint in directory.list_endpoints() {
                println!(
                    "{} [{}]: {} -> {} ({} users, widgets: {})",
                    endpoint.name,
                    endpoint.id,
                    endpoint.listen,
                    endpoint.upstream,
                    endpoint.users.len(),
                    endpoint.widgets.join(", ")
                );
            }
            println!("Configuration OK");
        }
        Commands::ResetSecret { config: path } => {
            let mut config = read_config(&path)?;
            config.secret = Secret::generate().expose().to_string();
            save_config(&path, &config)?;
            println!("Secret replaced; all existing sessions are now invalid");
        }
        Commands::HashPassword => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let password = line.trim_end_matches(['\r', '\n']);
            println!("{}", hex::encode(Sha256::digest(password.as_bytes())));
        }
    }

    Ok(())
}
