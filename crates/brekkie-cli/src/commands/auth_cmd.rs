use std::time::Duration;

use brekkie_core::auth::SignUpOutcome;
use brekkie_core::remote::{probe_tables, PLANNED_MEALS_TABLE, PROFILES_TABLE, RECIPES_TABLE};

use crate::auth::{clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

const PROBE_ATTEMPTS: u32 = 3;
const PROBE_DELAY: Duration = Duration::from_secs(1);

pub async fn run_auth(command: AuthCommands, ctx: &AppContext) -> Result<(), CliError> {
    let profile_name = ctx.profile_name.as_str();

    match command {
        AuthCommands::Signup { email, password } => {
            ensure_remote(ctx)?;
            match ctx.sessions.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!("Signed up profile '{profile_name}' as {email_label}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Check {email} for a confirmation link, then run `brekkie auth login`.");
                }
            }
        }
        AuthCommands::Login { email, password } => {
            ensure_remote(ctx)?;
            let session = ctx.sessions.sign_in(&email, &password).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
        }
        AuthCommands::OauthUrl {
            provider,
            redirect_to,
        } => {
            ensure_remote(ctx)?;
            println!("{}", ctx.sessions.oauth_url(&provider, &redirect_to)?);
        }
        AuthCommands::Callback { url } => {
            ensure_remote(ctx)?;
            let session = ctx.sessions.complete_oauth(url.trim()).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
        }
        AuthCommands::Status => {
            let session = if ctx.sessions.is_remote_enabled() {
                ctx.restore_session().await
            } else {
                load_stored_session(profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
                if let Ok(gateway) = ctx.config.gateway() {
                    let report = probe_tables(
                        &gateway,
                        &session.access_token,
                        &[RECIPES_TABLE, PLANNED_MEALS_TABLE, PROFILES_TABLE],
                        PROBE_ATTEMPTS,
                        PROBE_DELAY,
                    )
                    .await;
                    if report.is_ready() {
                        println!("Remote tables: ready");
                    } else {
                        println!("Remote tables missing: {}", report.missing.join(", "));
                    }
                }
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
        }
        AuthCommands::Logout => {
            if ctx.sessions.is_remote_enabled() {
                ctx.restore_session().await;
                ctx.sessions.sign_out().await?;
            } else {
                clear_stored_session(profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }
            println!("Signed out profile '{profile_name}'");
        }
    }

    Ok(())
}

fn ensure_remote(ctx: &AppContext) -> Result<(), CliError> {
    if ctx.sessions.is_remote_enabled() {
        Ok(())
    } else {
        Err(CliError::RemoteNotConfigured)
    }
}
