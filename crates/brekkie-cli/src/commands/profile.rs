use brekkie_core::models::{UserProfile, DEFAULT_GREETING_NAME};
use brekkie_core::profile::ProfileUpdate;

use crate::cli::ProfileCommands;
use crate::commands::common::AppContext;
use crate::commands::recipes::load_image;
use crate::error::CliError;

pub async fn run_profile(command: ProfileCommands, ctx: &AppContext) -> Result<(), CliError> {
    let session = ctx.require_session().await?;
    let service = ctx.profile_service()?;

    match command {
        ProfileCommands::Show { json } => {
            let profile = service.fetch(&session).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }

            let greeting = profile.as_ref().map_or_else(
                || DEFAULT_GREETING_NAME.to_string(),
                UserProfile::greeting_name,
            );
            println!("Good morning, {greeting}!");
            println!(
                "Email:        {}",
                session.user.email.as_deref().unwrap_or("(no email)")
            );
            if let Some(profile) = profile {
                println!(
                    "Username:     {}",
                    profile.username.as_deref().unwrap_or("-")
                );
                println!(
                    "Display name: {}",
                    profile.display_name.as_deref().unwrap_or("-")
                );
                println!(
                    "Avatar:       {}",
                    profile.avatar_url.as_deref().unwrap_or("-")
                );
            } else {
                println!("No profile row yet.");
            }
        }
        ProfileCommands::Update {
            username,
            display_name,
            avatar,
        } => {
            let avatar = load_image(avatar)?;
            let outcome = service
                .update(
                    &session,
                    ProfileUpdate {
                        username,
                        display_name,
                    },
                    avatar,
                    ctx.sessions.auth_client(),
                )
                .await?;
            if let Some(session) = outcome.session {
                ctx.sessions.set_session(session);
            }
            println!("Profile saved for {}", outcome.profile.greeting_name());
            if outcome.avatar_uploaded {
                if let Some(url) = outcome.profile.avatar_url.as_deref() {
                    println!("Avatar: {url}");
                }
            }
        }
    }

    Ok(())
}
