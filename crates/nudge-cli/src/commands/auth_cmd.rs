use nudge_core::auth::SessionPersistence;
use nudge_core::config::FirebaseConfig;

use crate::auth::{auth_client, SessionStore};
use crate::cli::AuthCommands;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands) -> Result<(), CliError> {
    let config = FirebaseConfig::from_env()?.ok_or(CliError::SyncNotConfigured)?;
    let auth = auth_client(&config).map_err(|error| CliError::Auth(error.to_string()))?;

    match command {
        AuthCommands::Login {
            email,
            password,
            sign_up,
        } => {
            let session = if sign_up {
                auth.sign_up(&email, &password).await
            } else {
                auth.sign_in(&email, &password).await
            }
            .map_err(|error| CliError::Auth(error.to_string()))?;

            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!(
                "Signed in to '{}' as {email_label}",
                config.project_id
            );
            Ok(())
        }
        AuthCommands::Status => {
            let session = auth
                .restore_session()
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Signed in to '{}' as {} (user_id={}, expires_at={})",
                    config.project_id, email_label, session.user.id, session.expires_at
                );
            } else {
                println!("Not signed in to '{}'.", config.project_id);
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let had_session = SessionStore::new(&config.project_id)
                .load_session()
                .map_err(|error| CliError::Auth(error.to_string()))?
                .is_some();
            auth.sign_out()
                .map_err(|error| CliError::Auth(error.to_string()))?;

            if had_session {
                println!("Signed out of '{}'.", config.project_id);
            } else {
                println!("No stored session for '{}'.", config.project_id);
            }
            Ok(())
        }
    }
}
