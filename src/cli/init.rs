//! Init command implementation

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::cli::GlobalOptions;
use crate::client::{ProgressApi, SupabaseClient, decode_access_token};
use crate::config::{BackendConfig, Config, Session};
use crate::error::Result;

/// Run the init command
///
/// Values passed as flags skip their prompt. An empty access token keeps
/// the CLI signed out; worker commands still work without one.
pub async fn run(
    opts: &GlobalOptions,
    url: Option<String>,
    anon_key: Option<String>,
    token: Option<String>,
) -> Result<()> {
    println!("{}", "Welcome to LearnHub!".bold().green());
    println!("Let's connect the CLI to your LearnHub backend.\n");

    let mut config = Config::load_at(opts.config_ref())?;
    let theme = ColorfulTheme::default();

    let url = match url {
        Some(url) => url,
        None => {
            let mut input = Input::<String>::with_theme(&theme).with_prompt("Backend URL");
            if let Some(existing) = &config.backend {
                input = input.default(existing.url.clone());
            }
            input.interact_text()?
        }
    };

    let anon_key = match anon_key {
        Some(key) => key,
        None => Password::with_theme(&theme)
            .with_prompt("Anon key")
            .interact()?,
    };

    let token = match token {
        Some(token) => token,
        None => Password::with_theme(&theme)
            .with_prompt("Access token (leave empty to stay signed out)")
            .allow_empty_password(true)
            .interact()?,
    };

    let session = if token.trim().is_empty() {
        None
    } else {
        let claims = decode_access_token(token.trim())?;
        Some(Session {
            access_token: token.trim().to_string(),
            user_id: claims.user_id,
            email: claims.email,
            expires_at: claims.expires_at,
        })
    };

    config.backend = Some(BackendConfig {
        url: url.trim().trim_end_matches('/').to_string(),
        anon_key: anon_key.trim().to_string(),
    });
    config.session = session;

    if let Some(user) = config.current_user() {
        println!("\n{}", "Verifying session...".cyan());
        let client = SupabaseClient::from_config(&config)?;
        let rows = client.list_progress(&user.id).await?;
        println!(
            "{} Signed in as {} ({} lessons with progress)",
            "✓".green(),
            user.email.as_deref().unwrap_or(&user.id).bold(),
            rows.len()
        );
    } else if config.session.is_some() {
        println!("{}", "⚠ Access token has already expired.".yellow());
    } else {
        println!("{}", "○ Staying signed out.".dimmed());
    }

    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "learnhub status".cyan());
    println!("  {} - Cache the app for offline use", "learnhub worker deploy".cyan());
    println!("  {} - See your lesson progress", "learnhub progress list".cyan());

    Ok(())
}
