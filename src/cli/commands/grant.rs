use crate::config::Config;
use crate::services::AccountError;
use crate::state::SharedState;

pub async fn cmd_grant(config: Config, email: &str, permission: &str) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    match state
        .account_service
        .grant_permission(email, permission)
        .await
    {
        Ok(0) => println!("{email} already holds {permission}."),
        Ok(_) => println!("✓ Granted {permission} to {email}"),
        Err(AccountError::UserNotFound) => {
            println!("No user registered with email {email}.");
        }
        Err(AccountError::Validation(errors)) => {
            for (field, message) in errors.iter() {
                println!("{field}: {message}");
            }
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
