use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_purge_tokens(config: Config) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;
    let purged = state.account_service.purge_expired_tokens().await?;

    if purged == 0 {
        println!("No expired tokens.");
    } else {
        println!("✓ Purged {purged} expired token(s)");
    }

    Ok(())
}
