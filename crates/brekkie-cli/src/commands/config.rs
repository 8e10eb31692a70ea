use std::env;
use std::path::Path;

use brekkie_core::config::{SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};
use brekkie_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{default_config_path, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => {
            let path = default_config_path();
            let profile_name = run_config_init(
                &path,
                profile.as_deref().or(global_profile),
                supabase_url,
                supabase_anon_key,
                no_activate,
            )?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );

            let config = CliProfilesConfig::load_from_path(&path).map_err(CliError::Config)?;
            let missing = config
                .profile(&profile_name)
                .map(missing_fields)
                .unwrap_or_default();
            if missing.is_empty() {
                println!(
                    "Profile '{profile_name}' is ready. Run `brekkie auth login --email <email> --password <password>`."
                );
            } else {
                println!(
                    "Profile '{}' is missing: {} (brekkie keeps working locally until both are set)",
                    profile_name,
                    missing.join(", ")
                );
            }
            Ok(())
        }
    }
}

/// Merge explicit values, then environment, then what the profile already had.
#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    path: &Path,
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<String, CliError> {
    let mut config = CliProfilesConfig::load_from_path(path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged_supabase_url = normalize_text_option(supabase_url)
        .or_else(|| normalize_text_option(env::var(SUPABASE_URL_ENV).ok()))
        .or_else(|| existing_profile.supabase_url());
    let merged_supabase_anon_key = normalize_text_option(supabase_anon_key)
        .or_else(|| normalize_text_option(env::var(SUPABASE_ANON_KEY_ENV).ok()))
        .or_else(|| existing_profile.supabase_anon_key());

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = merged_supabase_url {
        profile.supabase_url = Some(value);
    }
    if let Some(value) = merged_supabase_anon_key {
        profile.supabase_anon_key = Some(value);
    }
    validate_profile(profile)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    config.save_to_path(path).map_err(CliError::Config)?;
    Ok(profile_name)
}

pub fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    profile.client_config().validate()?;
    Ok(())
}
