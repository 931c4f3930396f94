use crate::auth::{clear_stored_session, load_stored_session, SupabaseAuthService};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let (profile_name, auth_service) =
                auth_service_for(profile.as_deref().or(global_profile))?;
            let Some(auth_service) = auth_service else {
                return Err(CliError::Config(format!(
                    "Profile '{profile_name}' missing Supabase config. Run `rentdesk config init --profile {profile_name}` first."
                )));
            };
            let session = auth_service
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let (profile_name, auth_service) =
                auth_service_for(profile.as_deref().or(global_profile))?;
            let session = match auth_service {
                Some(service) => service
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?,
                None => load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let (profile_name, auth_service) =
                auth_service_for(profile.as_deref().or(global_profile))?;
            let stored_session = load_stored_session(&profile_name)
                .map_err(|error| CliError::Auth(error.to_string()))?;

            if let (Some(service), Some(session)) = (auth_service, stored_session) {
                service
                    .sign_out(&session.access_token)
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            } else {
                clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

/// Resolved profile name plus an auth client when the profile has a backend.
fn auth_service_for(
    explicit_profile: Option<&str>,
) -> Result<(String, Option<SupabaseAuthService>), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let backend = match config.profile(&profile_name) {
        Some(profile) => profile.backend_config()?,
        None => None,
    };
    let service = backend
        .map(|backend| SupabaseAuthService::new(&profile_name, &backend))
        .transpose()
        .map_err(|error| CliError::Auth(error.to_string()))?;
    Ok((profile_name, service))
}
