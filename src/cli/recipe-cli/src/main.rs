//! Recipe CLI - Command line interface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroizing;

use recipe_config::{ConfigStore, ContextOptions, ContextResolver, ExecutionContext};
use recipe_config_sqlite::{ConfigPaths, SqliteConfigStore};
use recipe_identity::IdentityClient;
use recipe_session::{CurrentUser, SessionManager};
use recipe_store::RecipeLookup;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "recipe")]
#[command(about = "Recipe CLI - Publish, share and install recipes")]
#[command(version)]
struct Cli {
    /// Identity service address
    #[arg(
        long,
        default_value = "http://localhost:8300",
        env = "RECIPE_ENDPOINT",
        global = true
    )]
    endpoint: String,

    /// Timeout of each network call, in seconds
    #[arg(long, default_value = "30", env = "RECIPE_TIMEOUT", global = true)]
    timeout: u64,

    /// Target the global scope
    #[arg(long, global = true)]
    global: bool,

    /// Target the project scope (default)
    #[arg(long, global = true)]
    project: bool,

    /// Target the user scope
    #[arg(long, global = true)]
    user: bool,

    /// Directory of the global configuration
    #[arg(long, env = "RECIPE_GLOBAL_DIR", global = true)]
    global_dir: Option<PathBuf>,

    /// Directory of the project configuration
    #[arg(long, env = "RECIPE_PROJECT_DIR", global = true)]
    project_dir: Option<PathBuf>,

    /// Directory of the user configuration
    #[arg(long, env = "RECIPE_USER_DIR", global = true)]
    user_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Log out of the current scope
    Logout,
    /// Create an account and log in
    Signup {
        /// Username to claim
        #[arg(long)]
        username: String,
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the current user
    Whoami,
    /// Re-validate the current session with the identity service
    Auth,
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show recipe metadata
    Info {
        /// Recipe name
        name: String,
        /// Print the raw metadata record as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// Set a config value (JSON, or a plain string)
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Delete a config value
    Delete {
        /// Config key
        key: String,
    },
}

impl Cli {
    fn context_options(&self) -> ContextOptions {
        ContextOptions {
            global: self.global,
            project: self.project,
            user: self.user,
        }
    }

    /// Resolves scope directories, flags and environment first.
    fn config_paths(&self) -> Result<ConfigPaths> {
        let global = match &self.global_dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .context("Could not determine config directory; set RECIPE_GLOBAL_DIR")?
                .join("recipe"),
        };

        let user = match &self.user_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .context("Could not determine home directory; set RECIPE_USER_DIR")?
                .join(".recipe"),
        };

        let project = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .context("Could not determine working directory")?
                .join(".recipe"),
        };

        Ok(ConfigPaths {
            global,
            project,
            user,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging(verbose: bool) {
    let default = if verbose { "recipe=debug" } else { "recipe=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password() -> Result<Zeroizing<String>> {
    let password = Zeroizing::new(prompt("Password")?);
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

fn email_or_prompt(email: Option<String>) -> Result<String> {
    let email = match email {
        Some(e) => e,
        None => prompt("Email")?,
    };
    if email.is_empty() {
        bail!("Email cannot be empty");
    }
    Ok(email)
}

/// Parses a value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Formats a value for display; strings are printed without quotes.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_name(user: &CurrentUser) -> &str {
    let data = user.user_data();
    if data.username.is_empty() {
        &data.id
    } else {
        &data.username
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cmd_login(
    sessions: &SessionManager,
    context: ExecutionContext,
    email: Option<String>,
) -> Result<()> {
    let email = email_or_prompt(email)?;
    let password = prompt_password()?;

    let user = sessions
        .login(context, &email, &password)
        .await
        .context("Login failed")?;

    println!("Logged in as {} ({})", display_name(&user), context);
    Ok(())
}

async fn cmd_logout(sessions: &SessionManager, context: ExecutionContext) -> Result<()> {
    sessions.logout(context).await.context("Logout failed")?;
    println!("Logged out ({})", context);
    Ok(())
}

async fn cmd_signup(
    sessions: &SessionManager,
    context: ExecutionContext,
    username: &str,
    email: Option<String>,
) -> Result<()> {
    let email = email_or_prompt(email)?;
    let password = prompt_password()?;

    let user = sessions
        .sign_up(context, username, &email, &password)
        .await
        .context("Signup failed")?;

    println!("Signed up as {} ({})", display_name(&user), context);
    Ok(())
}

async fn cmd_whoami(sessions: &SessionManager, context: ExecutionContext) -> Result<()> {
    let user = sessions
        .get_current_user(context)
        .await
        .context("Not logged in")?;

    println!("User:      {}", display_name(&user));
    println!("Id:        {}", user.user_data().id);
    println!("Signed up: {}", user.user_data().signed_up);
    println!("Context:   {}", context);
    Ok(())
}

async fn cmd_auth(sessions: &SessionManager, context: ExecutionContext) -> Result<()> {
    sessions
        .auth(context)
        .await
        .context("Session validation failed")?;

    if let Some(user) = sessions.cached_user(context).await {
        println!("Session for {} is valid", display_name(&user));
    }
    Ok(())
}

async fn cmd_config_get(config: &dyn ConfigStore, key: &str, options: &ContextOptions) -> Result<()> {
    match config.get_config(key, options).await? {
        Some(value) => println!("{}", display_value(&value)),
        None => println!("config: no value found for key:'{}'", key),
    }
    Ok(())
}

async fn cmd_config_set(
    config: &dyn ConfigStore,
    key: &str,
    raw: &str,
    options: &ContextOptions,
) -> Result<()> {
    let value = parse_value(raw);
    config.set_config(key, &value, options).await?;

    for context in options.contexts() {
        println!(
            "config: value set for key:'{}' value:'{}' in context \"{}\"",
            key,
            display_value(&value),
            context
        );
    }
    Ok(())
}

async fn cmd_config_delete(
    config: &dyn ConfigStore,
    key: &str,
    options: &ContextOptions,
) -> Result<()> {
    let results = config
        .delete_config(key, options)
        .await
        .context("Config delete failed")?;

    for result in results {
        if !result.exists {
            println!("config: no config found for context \"{}\"", result.context);
            continue;
        }
        match (&result.value, result.deleted) {
            (Some(value), true) => println!(
                "config: value deleted for key:'{}' value:'{}'",
                result.key,
                display_value(value)
            ),
            _ => println!("config: no value found for key:'{}'", result.key),
        }
    }
    Ok(())
}

async fn cmd_info(recipes: &RecipeLookup, name: &str, json: bool) -> Result<()> {
    let Some(recipe) = recipes.get(name).await.context("Recipe lookup failed")? else {
        bail!("Recipe '{}' not found", name);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe.to_object())?);
        return Ok(());
    }

    println!("Recipe:  {}", recipe.name);
    println!("Type:    {}", recipe.recipe_type);
    println!("Scope:   {}", recipe.scope);
    println!("Version: {}", recipe.last_published_version);
    if !recipe.collaborators.is_empty() {
        println!("Collaborators:");
        for id in recipe.collaborators.keys() {
            println!("  {}", id);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = cli.context_options();
    let context = ContextResolver::new(options).current_context();

    let config = Arc::new(SqliteConfigStore::new(cli.config_paths()?));
    let client = Arc::new(
        IdentityClient::new(&cli.endpoint, Duration::from_secs(cli.timeout))
            .context("Failed to create identity client")?,
    );
    let sessions = SessionManager::new(
        config.clone(),
        client.clone(),
        client.clone(),
        client.clone(),
    );

    tracing::debug!(
        context = %context,
        endpoint = %cli.endpoint,
        config_dir = %config.paths().dir(context).display(),
        "Starting"
    );

    match cli.command {
        Commands::Login { email } => cmd_login(&sessions, context, email).await,
        Commands::Logout => cmd_logout(&sessions, context).await,
        Commands::Signup { username, email } => {
            cmd_signup(&sessions, context, &username, email).await
        },
        Commands::Whoami => cmd_whoami(&sessions, context).await,
        Commands::Auth => cmd_auth(&sessions, context).await,
        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => cmd_config_get(config.as_ref(), &key, &options).await,
            ConfigCommands::Set { key, value } => {
                cmd_config_set(config.as_ref(), &key, &value, &options).await
            },
            ConfigCommands::Delete { key } => {
                cmd_config_delete(config.as_ref(), &key, &options).await
            },
        },
        Commands::Info { name, json } => {
            cmd_info(&RecipeLookup::new(client), &name, json).await
        },
    }
}
