//! CLI entry point for bizconsult

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use bizconsult_core::config::{Config, ConfigLoader};
use bizconsult_core::logging::init_logging;
use bizconsult_core::persona;
use bizconsult_core::session::Role;
use bizconsult_providers::{ConversationProvider, GeminiProvider, ScriptedProvider};
use bizconsult_store::{SendEvent, SessionStore};

#[derive(Parser)]
#[command(name = "bizconsult")]
#[command(about = "AI business growth consultant, in your terminal")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive consulting chat
    Chat {
        /// Run without a Gemini API key, answering with canned replies
        #[arg(long)]
        offline: bool,
    },
    /// Show configuration status
    Status,
    /// Write the initial configuration file
    Init {
        /// Gemini API key to store
        #[arg(short, long)]
        api_key: Option<String>,
        /// Model to use
        #[arg(short, long)]
        model: Option<String>,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    // Logging comes up even when the config file is broken
    let logging_config = config_loader
        .load()
        .map(|config| config.logging)
        .unwrap_or_default();
    let _log_guard = init_logging(&logging_config);

    match cli.command {
        Commands::Chat { offline } => {
            info!("Starting chat session (offline: {})", offline);
            run_chat(&config_loader, offline).await?;
        }
        Commands::Status => {
            run_status(&config_loader).await?;
        }
        Commands::Init {
            api_key,
            model,
            force,
        } => {
            run_init(&config_loader, api_key, model, force).await?;
        }
    }

    Ok(())
}

/// Write the initial configuration file
async fn run_init(
    loader: &ConfigLoader,
    api_key: Option<String>,
    model: Option<String>,
    force: bool,
) -> Result<()> {
    let config_path = loader.config_dir().join("config.json");
    if config_path.exists() && !force {
        anyhow::bail!(
            "La configuración ya existe en {}. Usa --force para sobreescribirla.",
            config_path.display()
        );
    }

    let mut config = Config::default();
    if let Some(key) = api_key {
        config.provider.api_key = key;
    }
    if let Some(model) = model {
        config.provider.model = model;
    }
    loader.save(&config)?;

    println!("{}", style("Configuración guardada.").green().bold());
    println!("Ubicación: {}", config_path.display());
    println!("\nAhora puedes ejecutar:");
    println!(
        "  {} - Iniciar una consultoría",
        style("bizconsult chat").cyan()
    );
    println!("  {} - Ver el estado", style("bizconsult status").cyan());

    Ok(())
}

/// Show configuration status
async fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("BizConsult AI").bold().cyan());
    println!("Version: 0.1.0\n");

    println!("{}", style("Configuración:").bold());
    println!("  Directorio: {}", loader.config_dir().display());
    println!("  Modelo: {}", config.provider.model);
    println!("  Endpoint: {}", config.provider.api_base);
    let key_status = if config.provider.api_key.is_empty() {
        style("no configurada").red()
    } else {
        style("configurada").green()
    };
    println!("  Clave de API: {}", key_status);
    println!();

    println!("{}", style("Registro:").bold());
    println!("  Nivel: {}", config.logging.level);
    println!("  Formato: {}", config.logging.format);
    println!("  Directorio: {}", config.logging.dir);

    Ok(())
}

/// Run the interactive chat loop
async fn run_chat(loader: &ConfigLoader, offline: bool) -> Result<()> {
    let config = loader.load()?;

    let provider: Arc<dyn ConversationProvider> = if offline {
        println!(
            "{}",
            style("Modo sin conexión: las respuestas son de prueba.").yellow()
        );
        Arc::new(ScriptedProvider::new())
    } else {
        Arc::new(GeminiProvider::new(config.provider.clone())?)
    };

    let store = SessionStore::new(provider);
    let session = store.create_session().await;

    println!("{}", style("BizConsult AI").bold().cyan());
    println!("{}\n", style("ESTRATEGA ACTIVO").dim());
    println!("{}\n", session.messages[0].content);
    println!(
        "{}",
        style("Comandos: /new, /list, /select <n>, /delete <n>, /quit").dim()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit"), _) => break,
                (Some("new"), _) => {
                    let session = store.create_session().await;
                    println!("\n{}\n", session.messages[0].content);
                }
                (Some("list"), _) => {
                    print_session_list(&store).await;
                }
                (Some("select"), Some(arg)) => {
                    let selected = match session_id_at(&store, arg).await {
                        Some(id) => store.select_session(&id).await,
                        None => false,
                    };
                    if selected {
                        print_transcript(&store).await;
                    } else {
                        println!("{} Sesión no encontrada", style("✗").red());
                    }
                }
                (Some("delete"), Some(arg)) => {
                    let deleted = match session_id_at(&store, arg).await {
                        Some(id) => store.delete_session(&id).await,
                        None => false,
                    };
                    if deleted {
                        println!("{} Sesión eliminada", style("✓").green().bold());
                    } else {
                        println!("{} Sesión no encontrada", style("✗").red());
                    }
                }
                _ => println!("Comando no reconocido: {}", line),
            }
            continue;
        }

        store.update_draft(line).await;
        stream_current_draft(&store).await?;
    }

    println!("{}", style("Hasta pronto.").dim());
    Ok(())
}

/// Send the draft and print reply fragments as they arrive
async fn stream_current_draft(store: &SessionStore) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let send = tokio::spawn({
        let store = store.clone();
        async move { store.submit_send(Some(&event_tx)).await }
    });

    let mut failed = false;
    while let Some(event) = event_rx.recv().await {
        match event {
            SendEvent::Delta { text, .. } => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            SendEvent::Completed { .. } => println!("\n"),
            SendEvent::Failed { .. } => failed = true,
        }
    }
    if failed {
        warn!("Send failed; connection error shown instead");
        println!("\n{}\n", style(persona::CONNECTION_ERROR_MESSAGE).red());
    }

    let accepted = send.await?;
    if !accepted {
        println!("{}", style("Nada que enviar.").dim());
    }
    Ok(())
}

/// Resolve a 1-based list position to a session id
async fn session_id_at(store: &SessionStore, arg: &str) -> Option<String> {
    let index: usize = arg.parse().ok()?;
    let sessions = store.sessions().await;
    sessions
        .get(index.checked_sub(1)?)
        .map(|session| session.id.clone())
}

/// Print the session list, newest first
async fn print_session_list(store: &SessionStore) {
    let sessions = store.sessions().await;
    let active_id = store.active_session_id().await;

    println!("{}", style("Historial reciente").bold());
    if sessions.is_empty() {
        println!("  {}", style("No hay sesiones previas").dim());
        return;
    }
    for (i, session) in sessions.iter().enumerate() {
        let marker = if active_id.as_deref() == Some(session.id.as_str()) {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!(
            "  {} {} {} ({} mensajes, {})",
            marker,
            style(format!("{}.", i + 1)).bold(),
            session.title,
            session.messages.len(),
            session.created_at.with_timezone(&chrono::Local).format("%H:%M")
        );
    }
}

/// Print the active session's conversation so far
async fn print_transcript(store: &SessionStore) {
    let Some(session) = store.active_session().await else {
        return;
    };

    println!("\n{}", style(session.title.to_uppercase()).bold());
    for message in &session.messages {
        let label = match message.role {
            Role::User => style("tú").cyan().bold(),
            Role::Model => style("AI").green().bold(),
        };
        let local_time = message.timestamp.with_timezone(&chrono::Local);
        println!("\n{} {}", label, style(local_time.format("%H:%M")).dim());
        println!("{}", message.content);
    }
    println!();
}
