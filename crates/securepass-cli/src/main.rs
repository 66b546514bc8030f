//! SecurePass CLI
//!
//! Local secret management: passwords, two-factor backup codes, and
//! AI-service API keys, encrypted at rest with a self-clearing clipboard.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use securepass_core::{
    default_data_dir, load_config, AiCredentialDraft, BackupCodeDraft, ClipboardChannel,
    ClipboardSink, FileBlobStore, PasswordDraft, PasswordImport, PasswordPatch, User, Vault,
    VaultConfig, VaultError, VaultResult,
};

#[derive(Parser)]
#[command(name = "securepass")]
#[command(version)]
#[command(about = "SecurePass - local encrypted credential vault")]
#[command(after_help = "EXAMPLES:
  securepass register alice@example.com    Create an account
  securepass password add Bank -u alice    Add a password (prompts securely)
  securepass password list                 List stored passwords
  securepass password copy <id>            Copy to clipboard (auto-clears)
  securepass audit show                    Inspect the audit trail")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        /// Account email
        email: String,
    },

    /// Log in to an existing account
    Login {
        /// Account email
        email: String,
    },

    /// End the current session
    Logout,

    /// Show the current session
    Status,

    /// Request password recovery for an account
    Recover {
        /// Account email
        email: String,
    },

    /// Manage stored passwords
    Password {
        #[command(subcommand)]
        action: PasswordCommands,
    },

    /// Manage two-factor backup codes
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// Manage AI-service API keys
    Ai {
        #[command(subcommand)]
        action: AiCommands,
    },

    /// Inspect the audit trail
    Audit {
        #[command(subcommand)]
        action: AuditCommands,
    },
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Add a password entry (value is prompted, never echoed)
    Add {
        /// Entry title
        title: String,
        /// Account username
        #[arg(short, long)]
        username: String,
        /// Website
        #[arg(short, long, default_value = "")]
        website: String,
        /// Free-text notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// List password entries (never shows the secret)
    List,

    /// Update fields of a password entry
    Update {
        /// Entry id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Prompt for a new password value
        #[arg(long)]
        password: bool,
    },

    /// Remove a password entry
    Remove {
        /// Entry id
        id: String,
    },

    /// Copy a password to the clipboard; it is erased after a delay
    Copy {
        /// Entry id
        id: String,
    },

    /// Export all password entries as plaintext JSON
    Export {
        /// Destination file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import password entries from a plaintext JSON file
    Import {
        /// Source file
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Add backup codes for a service
    Add {
        /// Service name
        service: String,
        /// One-time codes
        #[arg(short, long, required = true, num_args = 1..)]
        codes: Vec<String>,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List backup-code entries
    List,

    /// Remove a backup-code entry
    Remove {
        /// Entry id
        id: String,
    },

    /// Export all backup-code entries as plaintext JSON
    Export {
        /// Destination file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Add an AI-service credential (key is prompted, never echoed)
    Add {
        /// Service name
        service: String,
        /// Custom endpoint URL
        #[arg(short, long)]
        endpoint: Option<String>,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List AI credentials (never shows the key)
    List,

    /// Remove an AI credential
    Remove {
        /// Entry id
        id: String,
    },

    /// Copy an API key to the clipboard; it is erased after a delay
    Copy {
        /// Entry id
        id: String,
    },

    /// Export all AI credentials as plaintext JSON
    Export {
        /// Destination file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Show audit entries, most recent last
    Show {
        /// Maximum entries to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Remove the audit ledger entirely
    Clear,
}

/// Initialize logging to stderr
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false).compact())
        .with(filter)
        .init();
}

fn data_dir() -> PathBuf {
    std::env::var("SECUREPASS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_data_dir())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();

    let dir = data_dir();
    let config = load_config(&dir).await?;
    let store = Arc::new(FileBlobStore::open(&dir).await?);
    let vault = Vault::new(store, &config);

    match cli.command {
        Commands::Register { email } => handle_register(&vault, &email).await?,
        Commands::Login { email } => handle_login(&vault, &email).await?,
        Commands::Logout => handle_logout(&vault).await?,
        Commands::Status => handle_status(&vault).await?,
        Commands::Recover { email } => handle_recover(&vault, &email).await?,
        Commands::Password { action } => handle_password(&vault, &config, action).await?,
        Commands::Backup { action } => handle_backup(&vault, action).await?,
        Commands::Ai { action } => handle_ai(&vault, &config, action).await?,
        Commands::Audit { action } => handle_audit(&vault, action).await?,
    }

    Ok(())
}

// === Command Handlers ===

async fn handle_register(vault: &Vault, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let password = prompt_password("Choose a master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;

    if password != confirm {
        return Err("Passwords do not match".into());
    }

    if password.len() < 8 {
        return Err("Password must be at least 8 characters".into());
    }

    let user = vault.auth.register(email, &password).await?;
    println!("Account created for {}", user.email);
    Ok(())
}

async fn handle_login(vault: &Vault, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let password = prompt_password("Enter master password: ")?;
    let user = vault.auth.login(email, &password).await?;
    println!("Logged in as {}", user.email);
    Ok(())
}

async fn handle_logout(vault: &Vault) -> Result<(), Box<dyn std::error::Error>> {
    vault.auth.logout().await?;
    println!("Logged out");
    Ok(())
}

async fn handle_status(vault: &Vault) -> Result<(), Box<dyn std::error::Error>> {
    match vault.auth.current_user().await {
        Some(user) => println!("Logged in as {} (since {})", user.email, user.created_at),
        None => println!("Not logged in"),
    }
    Ok(())
}

async fn handle_recover(vault: &Vault, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    vault.auth.recover_password(email).await?;
    println!("If the account exists, recovery instructions will be sent to {email}");
    Ok(())
}

async fn handle_password(
    vault: &Vault,
    config: &VaultConfig,
    action: PasswordCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    require_login(vault).await?;

    match action {
        PasswordCommands::Add {
            title,
            username,
            website,
            notes,
        } => {
            let password = prompt_password(&format!("Enter password for '{title}': "))?;
            let record = vault
                .passwords
                .add(PasswordDraft {
                    title,
                    username,
                    password,
                    website,
                    notes,
                })
                .await?;
            println!("Added '{}' ({})", record.title, record.id);
        }

        PasswordCommands::List => {
            let records = vault.passwords.load().await;
            if records.is_empty() {
                println!("No password entries");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  user={}  site={}  updated={}",
                    record.id, record.title, record.username, record.website, record.updated_at
                );
            }
        }

        PasswordCommands::Update {
            id,
            title,
            username,
            website,
            notes,
            password,
        } => {
            let id = parse_id(&id)?;
            let password = if password {
                Some(prompt_password("Enter new password: ")?)
            } else {
                None
            };
            vault
                .passwords
                .update(
                    id,
                    PasswordPatch {
                        title,
                        username,
                        password,
                        website,
                        notes,
                    },
                )
                .await?;
            println!("Updated {id}");
        }

        PasswordCommands::Remove { id } => {
            let id = parse_id(&id)?;
            vault.passwords.remove(id).await?;
            println!("Removed {id}");
        }

        PasswordCommands::Copy { id } => {
            let id = parse_id(&id)?;
            let records = vault.passwords.load().await;
            let record = records
                .iter()
                .find(|r| r.id == id)
                .ok_or("No password entry with that id")?;
            copy_secret(vault, config, &record.password, "password").await?;
        }

        PasswordCommands::Export { output } => {
            let records = vault.passwords.export_all().await;
            write_export(&records, output).await?;
        }

        PasswordCommands::Import { path } => {
            let bytes = tokio::fs::read(&path).await?;
            let candidates: Vec<PasswordImport> = serde_json::from_slice(&bytes)?;
            let count = vault.passwords.import_many(candidates).await?;
            println!("Imported {count} password entries");
        }
    }

    Ok(())
}

async fn handle_backup(
    vault: &Vault,
    action: BackupCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    require_login(vault).await?;

    match action {
        BackupCommands::Add {
            service,
            codes,
            description,
        } => {
            let record = vault
                .backup_codes
                .add(BackupCodeDraft {
                    service,
                    codes,
                    description,
                })
                .await?;
            println!(
                "Added {} codes for '{}' ({})",
                record.codes.len(),
                record.service,
                record.id
            );
        }

        BackupCommands::List => {
            let records = vault.backup_codes.load().await;
            if records.is_empty() {
                println!("No backup-code entries");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  {} codes  updated={}",
                    record.id,
                    record.service,
                    record.codes.len(),
                    record.updated_at
                );
            }
        }

        BackupCommands::Remove { id } => {
            let id = parse_id(&id)?;
            vault.backup_codes.remove(id).await?;
            println!("Removed {id}");
        }

        BackupCommands::Export { output } => {
            let records = vault.backup_codes.export_all().await;
            write_export(&records, output).await?;
        }
    }

    Ok(())
}

async fn handle_ai(
    vault: &Vault,
    config: &VaultConfig,
    action: AiCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    require_login(vault).await?;

    match action {
        AiCommands::Add {
            service,
            endpoint,
            description,
        } => {
            let api_key = prompt_password(&format!("Enter API key for '{service}': "))?;
            let record = vault
                .ai_credentials
                .add(AiCredentialDraft {
                    service,
                    api_key,
                    endpoint,
                    description,
                })
                .await?;
            println!("Added '{}' ({})", record.service, record.id);
        }

        AiCommands::List => {
            let records = vault.ai_credentials.load().await;
            if records.is_empty() {
                println!("No AI credentials");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  endpoint={}  updated={}",
                    record.id,
                    record.service,
                    record.endpoint.as_deref().unwrap_or("-"),
                    record.updated_at
                );
            }
        }

        AiCommands::Remove { id } => {
            let id = parse_id(&id)?;
            vault.ai_credentials.remove(id).await?;
            println!("Removed {id}");
        }

        AiCommands::Copy { id } => {
            let id = parse_id(&id)?;
            let records = vault.ai_credentials.load().await;
            let record = records
                .iter()
                .find(|r| r.id == id)
                .ok_or("No AI credential with that id")?;
            copy_secret(vault, config, &record.api_key, "API key").await?;
        }

        AiCommands::Export { output } => {
            let records = vault.ai_credentials.export_all().await;
            write_export(&records, output).await?;
        }
    }

    Ok(())
}

async fn handle_audit(
    vault: &Vault,
    action: AuditCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuditCommands::Show { limit } => {
            let entries = vault.audit.load().await;
            let start = limit
                .map(|n| entries.len().saturating_sub(n))
                .unwrap_or(0);
            if entries.is_empty() {
                println!("Audit trail is empty");
                return Ok(());
            }
            for entry in &entries[start..] {
                match &entry.detail {
                    Some(detail) => {
                        println!("{}  {}  ({})", entry.timestamp, entry.action, detail)
                    }
                    None => println!("{}  {}", entry.timestamp, entry.action),
                }
            }
        }

        AuditCommands::Clear => {
            vault.audit.clear().await?;
            println!("Audit trail cleared");
        }
    }

    Ok(())
}

// === Helpers ===

/// Clipboard sink over the OSC 52 terminal escape sequence
struct TerminalClipboard;

impl ClipboardSink for TerminalClipboard {
    fn set_text(&self, text: &str) -> VaultResult<()> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "\x1b]52;c;{}\x07", BASE64.encode(text))
            .and_then(|_| stdout.flush())
            .map_err(|e| VaultError::ClipboardFailure(e.to_string()))
    }
}

/// Copy a secret to the clipboard and stay alive until it is erased
async fn copy_secret(
    vault: &Vault,
    config: &VaultConfig,
    secret: &str,
    label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let clear_after = Duration::from_secs(config.clipboard_clear_seconds);

    let clipboard = ClipboardChannel::new(Arc::new(TerminalClipboard));
    clipboard.copy(secret, label, clear_after)?;
    if let Err(e) = vault
        .audit
        .append(&format!("Copied {label} to clipboard"), None)
        .await
    {
        tracing::warn!("audit entry not recorded: {e}");
    }

    println!(
        "Copied {label} to clipboard (will clear in {}s)",
        clear_after.as_secs()
    );
    // The erasure timer dies with the process; wait it out
    tokio::time::sleep(clear_after + Duration::from_millis(50)).await;
    println!("Clipboard cleared");
    Ok(())
}

async fn require_login(vault: &Vault) -> Result<User, Box<dyn std::error::Error>> {
    vault
        .auth
        .current_user()
        .await
        .ok_or_else(|| "Not logged in. Run 'securepass login <email>' first.".into())
}

fn parse_id(id: &str) -> Result<Uuid, Box<dyn std::error::Error>> {
    Uuid::parse_str(id).map_err(|_| format!("'{id}' is not a valid entry id").into())
}

async fn write_export<T: serde::Serialize>(
    records: &[T],
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_vec_pretty(records)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, &json).await?;
            println!("Exported {} entries to {}", records.len(), path.display());
        }
        None => {
            io::stdout().write_all(&json)?;
            println!();
        }
    }
    Ok(())
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    Ok(password)
}
