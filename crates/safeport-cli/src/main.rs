//! SafePort CLI - encrypt, decrypt and manage stored files from a terminal
//!
//! Every command acts on behalf of one user (`--user`). Artifacts live in the
//! data directory shared by all users on the machine, scoped by user id.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use safeport_core::{
    default_data_dir, format_size, is_weak_password, Artifact, ArtifactKind, KeySize, SafePort,
};

/// SafePort - password-based file encryption with local storage
#[derive(Parser, Debug)]
#[command(name = "safeport")]
#[command(version)]
#[command(about = "SafePort - encrypt files with a password and keep them in a local store")]
struct Args {
    /// User whose artifacts are read and written
    #[arg(long, global = true, env = "SAFEPORT_USER", default_value = "local")]
    user: String,

    /// Directory holding the database, fallback file and settings
    #[arg(long, global = true, env = "SAFEPORT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a file and store the result
    Encrypt {
        file: PathBuf,

        /// aes-128, aes-192 or aes-256 (defaults to the configured algorithm)
        #[arg(long, short)]
        algorithm: Option<KeySize>,

        #[arg(long, env = "SAFEPORT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Decrypt a stored artifact or an encrypted file and store the result
    Decrypt {
        /// Encrypted file on disk
        #[arg(required_unless_present = "id", conflicts_with = "id")]
        file: Option<PathBuf>,

        /// Id of a stored encrypted artifact
        #[arg(long)]
        id: Option<Uuid>,

        /// Key size the file was encrypted with (files on disk only)
        #[arg(long, short)]
        algorithm: Option<KeySize>,

        /// Also write the plaintext here
        #[arg(long, short)]
        out: Option<PathBuf>,

        #[arg(long, env = "SAFEPORT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// List stored artifacts, newest first
    List {
        #[arg(long, short, default_value = "encrypted")]
        kind: ArtifactKind,

        /// Only show names containing this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Write a stored artifact to disk
    Download {
        id: Uuid,

        /// Output path (defaults to the artifact's name in the current directory)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Delete a stored artifact
    Delete { id: Uuid },

    /// Delete every artifact of one kind
    Clear {
        #[arg(long, short)]
        kind: ArtifactKind,
    },

    /// Show store health
    Status,

    /// Move artifacts saved during an outage back into the database
    Recover,

    /// Show or change settings
    Config {
        /// New default algorithm
        #[arg(long, short)]
        algorithm: Option<KeySize>,

        /// New size cap for the fallback file, in bytes
        #[arg(long)]
        fallback_capacity: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir().context("Failed to locate data directory")?,
    };
    debug!("Using data directory {:?}", data_dir);

    let mut safeport = SafePort::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open SafePort at {}", data_dir.display()))?;

    let result = run(&mut safeport, &args.user, args.command).await;
    safeport.close().await;
    result
}

async fn run(safeport: &mut SafePort, user: &str, command: Command) -> Result<()> {
    match command {
        Command::Encrypt {
            file,
            algorithm,
            password,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let password = resolve_password(password, true)?;
            let algorithm = algorithm.unwrap_or_else(|| safeport.default_algorithm());

            let artifact = safeport
                .encrypt(user, &file_name(&file)?, bytes, &password, algorithm)
                .await?;
            println!("{}  {}", artifact.id, artifact.display_name);
        }

        Command::Decrypt {
            file,
            id,
            algorithm,
            out,
            password,
        } => {
            let artifact = match (file, id) {
                (_, Some(id)) => {
                    let password = resolve_password(password, false)?;
                    safeport.decrypt_by_id(user, id, &password).await?
                }
                (Some(file), None) => {
                    let container = tokio::fs::read(&file)
                        .await
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let password = resolve_password(password, false)?;
                    let algorithm = algorithm.unwrap_or_else(|| safeport.default_algorithm());
                    safeport
                        .decrypt_upload(user, &file_name(&file)?, container, &password, algorithm)
                        .await?
                }
                (None, None) => bail!("Give an encrypted file or --id"),
            };

            if let Some(out) = out {
                write_output(&out, &artifact.bytes()?).await?;
            }
            println!("{}  {}", artifact.id, artifact.display_name);
        }

        Command::List { kind, search } => {
            let artifacts = match search {
                Some(term) => safeport.search(user, kind, &term).await?,
                None => safeport.list(user, kind).await?,
            };
            if artifacts.is_empty() {
                println!("No {} files", kind);
            }
            for artifact in &artifacts {
                println!("{}", describe(artifact));
            }
        }

        Command::Download { id, out } => {
            let download = safeport.download(user, id).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&download.file_name));
            write_output(&out, &download.bytes).await?;
            println!("Saved {} ({})", out.display(), format_size(download.bytes.len() as u64));
        }

        Command::Delete { id } => {
            safeport.delete(user, id).await?;
            println!("Deleted {}", id);
        }

        Command::Clear { kind } => {
            let removed = safeport.clear(user, kind).await?;
            println!("Removed {} {} files", removed, kind);
        }

        Command::Status => {
            let status = safeport.status().await;
            println!("Data directory: {}", safeport.data_dir().display());
            println!(
                "Primary store:  {}",
                status.primary_backend.unwrap_or("unavailable")
            );
            println!("Fallback store: {}", status.fallback_backend);
            println!("Degraded:       {}", if status.degraded { "yes" } else { "no" });
            println!("Algorithm:      {}", safeport.default_algorithm());
        }

        Command::Recover => {
            let migrated = safeport.recover().await?;
            println!("Recovered, {} files moved to the database", migrated);
        }

        Command::Config {
            algorithm,
            fallback_capacity,
        } => {
            if let Some(algorithm) = algorithm {
                safeport.set_default_algorithm(algorithm).await?;
            }
            if let Some(capacity) = fallback_capacity {
                let mut settings = safeport.settings().clone();
                settings.fallback_capacity_bytes = capacity;
                safeport.update_settings(settings).await?;
            }

            let settings = safeport.settings();
            println!("Algorithm:         {}", settings.default_algorithm);
            println!("Database file:     {}", settings.database_file);
            println!("Fallback file:     {}", settings.fallback_file);
            println!(
                "Fallback capacity: {}",
                format_size(settings.fallback_capacity_bytes as u64)
            );
        }
    }

    Ok(())
}

/// Use the given password or prompt for one
fn resolve_password(password: Option<String>, confirm: bool) -> Result<String> {
    let password = match password {
        Some(password) => password,
        None => {
            let password = rpassword::prompt_password("Password: ")?;
            if confirm && rpassword::prompt_password("Confirm password: ")? != password {
                bail!("Passwords do not match");
            }
            password
        }
    };

    if is_weak_password(&password) {
        warn!("Password is shorter than the recommended length");
    }
    Ok(password)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// One line of `list` output
fn describe(artifact: &Artifact) -> String {
    let algorithm = artifact
        .algorithm
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {:<10}  {:<8}  {}  {}",
        artifact.id,
        format_size(artifact.byte_size),
        algorithm,
        artifact.created_at.format("%Y-%m-%d %H:%M"),
        artifact.display_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use safeport_core::NewArtifact;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_decrypt_by_id() {
        let id = Uuid::new_v4();
        let args = Args::try_parse_from([
            "safeport",
            "--user",
            "alice",
            "decrypt",
            "--id",
            &id.to_string(),
        ])
        .unwrap();

        assert_eq!(args.user, "alice");
        assert!(matches!(args.command, Command::Decrypt { id: Some(parsed), file: None, .. } if parsed == id));
    }

    #[test]
    fn test_decrypt_needs_file_or_id() {
        assert!(Args::try_parse_from(["safeport", "decrypt"]).is_err());
    }

    #[test]
    fn test_parse_algorithm() {
        let args =
            Args::try_parse_from(["safeport", "encrypt", "a.txt", "--algorithm", "aes-128"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Encrypt { algorithm: Some(KeySize::Aes128), .. }
        ));

        assert!(Args::try_parse_from(["safeport", "encrypt", "a.txt", "-a", "aes-512"]).is_err());
    }

    #[test]
    fn test_parse_config() {
        let args = Args::try_parse_from([
            "safeport",
            "config",
            "--algorithm",
            "aes-192",
            "--fallback-capacity",
            "1048576",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Config {
                algorithm: Some(KeySize::Aes192),
                fallback_capacity: Some(1048576),
            }
        ));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/report.pdf")).unwrap(), "report.pdf");
        assert!(file_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_describe() {
        let artifact =
            NewArtifact::encrypted("alice", "a.txt", 2048, b"x", KeySize::Aes256).into_artifact();
        let line = describe(&artifact);
        assert!(line.contains("2.00 KB"));
        assert!(line.contains("aes-256"));
        assert!(line.ends_with("a.txt.encrypted"));
    }
}
