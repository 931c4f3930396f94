use std::env;

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            storage_bucket,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileInput {
                supabase_url,
                supabase_anon_key,
                storage_bucket,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

/// Values given on the command line for `config init`
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub storage_bucket: Option<String>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(input, &existing, |key| env::var(key).ok());
    validate_profile_urls(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `rentdesk auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    for line in render_profile(&profile_name, profile) {
        println!("{line}");
    }
    Ok(())
}

/// Explicit flags win, then `RENTDESK_*` variables, then what was stored.
pub fn merge_profile(
    input: ProfileInput,
    existing: &CliProfile,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(input.supabase_url)
            .or_else(|| normalize_text_option(lookup("RENTDESK_SUPABASE_URL")))
            .or_else(|| existing.supabase_url())
            .map(|url| url.trim_end_matches('/').to_string()),
        supabase_anon_key: normalize_text_option(input.supabase_anon_key)
            .or_else(|| normalize_text_option(lookup("RENTDESK_SUPABASE_ANON_KEY")))
            .or_else(|| existing.supabase_anon_key()),
        storage_bucket: normalize_text_option(input.storage_bucket)
            .or_else(|| normalize_text_option(lookup("RENTDESK_STORAGE_BUCKET")))
            .or_else(|| existing.storage_bucket()),
    }
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

/// The anon key is public but long; only its tail is printed.
pub fn render_profile(profile_name: &str, profile: &CliProfile) -> Vec<String> {
    let anon_key = profile.supabase_anon_key().map_or_else(
        || "(unset)".to_string(),
        |key| {
            let tail = key
                .chars()
                .rev()
                .take(6)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<String>();
            format!("...{tail}")
        },
    );
    vec![
        format!("profile:         {profile_name}"),
        format!(
            "supabase_url:    {}",
            profile.supabase_url().as_deref().unwrap_or("(unset)")
        ),
        format!("anon_key:        {anon_key}"),
        format!(
            "storage_bucket:  {}",
            profile.storage_bucket().as_deref().unwrap_or("(default)")
        ),
    ]
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
