use std::io::Write;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use tokenctl::client::TokenServiceClient;
use tokenctl::config;
use tokenctl::models::token::{ApiToken, RevokeSelector};
use tokenctl::session::TokenSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tokenctl=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load()?;

    let session = TokenSession::new(TokenServiceClient::from_config(&cfg));

    let result = match args.command {
        cli::Commands::List => handle_list(&session).await,
        cli::Commands::Create { id } => handle_create(&session, &id).await,
        cli::Commands::Revoke { id, token, yes } => handle_revoke(&session, id, token, yes).await,
        cli::Commands::Regenerate { id, yes } => handle_regenerate(&session, &id, yes).await,
        cli::Commands::SetRateLimit { id, rate_limit } => {
            handle_set_rate_limit(&session, &id, &rate_limit).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn handle_list(session: &TokenSession) -> anyhow::Result<()> {
    session.refresh().await;
    bail_on_error(session)?;
    print_tokens(&session.tokens());
    Ok(())
}

async fn handle_create(session: &TokenSession, id: &str) -> anyhow::Result<()> {
    if !session.create(id).await {
        return bail_on_error(session);
    }

    // The plaintext must reach the user even if the follow-up list fetch
    // failed; it is shown exactly once.
    print_pending(session);
    if let Some(msg) = session.last_error() {
        eprintln!("Warning: token created but the list refresh failed: {}", msg);
    }
    Ok(())
}

async fn handle_revoke(
    session: &TokenSession,
    id: Option<String>,
    token: Option<String>,
    yes: bool,
) -> anyhow::Result<()> {
    let selector = match (id, token) {
        (Some(id), _) => RevokeSelector::by_id(id),
        (None, Some(token)) => RevokeSelector::by_token(token),
        (None, None) => anyhow::bail!("pass --id or --token to pick the token to revoke"),
    };

    let prompt = format!("Revoke '{}'? This cannot be undone.", selector.value());
    if !confirm(&prompt, yes)? {
        println!("Aborted.");
        return Ok(());
    }

    if !session.revoke(&selector).await {
        return bail_on_error(session);
    }
    println!("Token revoked.");
    if let Some(msg) = session.last_error() {
        eprintln!("Warning: token revoked but the list refresh failed: {}", msg);
    }
    Ok(())
}

async fn handle_regenerate(session: &TokenSession, id: &str, yes: bool) -> anyhow::Result<()> {
    // Regenerate preserves the current rate limit, so the token has to be
    // in the local list first.
    session.refresh().await;
    bail_on_error(session)?;

    let prompt = format!(
        "Regenerate '{}'? The current secret stops working immediately.",
        id
    );
    if !confirm(&prompt, yes)? {
        println!("Aborted.");
        return Ok(());
    }

    if !session.regenerate(id).await {
        return bail_on_error(session);
    }

    print_pending(session);
    if let Some(msg) = session.last_error() {
        eprintln!("Warning: token regenerated but the list refresh failed: {}", msg);
    }
    Ok(())
}

async fn handle_set_rate_limit(
    session: &TokenSession,
    id: &str,
    rate_limit: &str,
) -> anyhow::Result<()> {
    session.refresh().await;
    bail_on_error(session)?;

    let current = session
        .tokens()
        .iter()
        .find(|t| t.id == id)
        .map(|t| t.rate_limit)
        .ok_or_else(|| anyhow::anyhow!("Token not found: {}", id))?;

    session.begin_edit(id, current);
    session.update_draft(rate_limit);
    if !session.save_edit().await {
        return bail_on_error(session);
    }

    println!("Rate limit for '{}' set to {}.", id, rate_limit.trim());
    if let Some(msg) = session.last_error() {
        eprintln!("Warning: rate limit saved but the list refresh failed: {}", msg);
    }
    Ok(())
}

/// Turn the session's error channel into a CLI failure.
fn bail_on_error(session: &TokenSession) -> anyhow::Result<()> {
    if let Some(msg) = session.last_error() {
        anyhow::bail!(msg);
    }
    Ok(())
}

fn print_tokens(tokens: &[ApiToken]) {
    if tokens.is_empty() {
        println!("No tokens found.");
        return;
    }
    println!(
        "{:<20} {:<44} {:<12} {}",
        "ID", "TOKEN (HASHED)", "RATE LIMIT", "CREATED"
    );
    for t in tokens {
        let created = t
            .date_created
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!("{:<20} {:<44} {:<12} {}", t.id, t.token, t.rate_limit, created);
    }
}

fn print_pending(session: &TokenSession) {
    if let Some(plaintext) = session.pending_new_token() {
        println!(
            "New token minted:\n  Use:   Authorization: {}\n  Store it now; it will not be shown again.",
            plaintext
        );
    }
}

/// Interactive y/N gate in front of destructive commands. `--yes` skips it.
fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
