use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::csrf::CsrfSigner;
use crate::entrata::new;
use anyhow::Result;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, auth_api_url } => {
            let auth_api_url = Url::parse(&auth_api_url)?;

            let signer = CsrfSigner::new(&globals.csrf_secret)?;

            new(port, auth_api_url, signer).await?;
        }
    }

    Ok(())
}
