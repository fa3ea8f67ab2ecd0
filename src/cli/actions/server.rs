use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::api::purge::PurgeWorkerConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            frontend_url,
        } => {
            let auth_config = AuthConfig::new(frontend_url);
            let purge_config = PurgeWorkerConfig::new();

            api::new(port, dsn, globals, auth_config, purge_config).await?;
        }
    }

    Ok(())
}
