//! Validate one authorization code against Apple and print the user's identity.
//!
//! ```text
//! APPLE_SIGN_IN_TEAM_ID=TEAM123456 \
//! APPLE_SIGN_IN_CLIENT_ID=com.example.app \
//! APPLE_SIGN_IN_KEY_ID=ABC123DEFG \
//! APPLE_SIGN_IN_SECRET_PATH=AuthKey_ABC123DEFG.p8 \
//! RUST_LOG=apple_signin_client=debug \
//! cargo run --example exchange_code -- <authorization code>
//! ```

use apple_signin_client::{ClientConfig, ExchangeError, SigningIdentity, ValidationClient};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(code) = std::env::args().nth(1) else {
        return Err("usage: exchange_code <authorization code>".into());
    };

    let identity = SigningIdentity::from_env()?;
    let config = ClientConfig::from_env()?;
    let client = ValidationClient::new(identity, config)?;

    match client.exchange_app_code(code).await {
        Ok(validated) => {
            info!(
                sub = %validated.claims.subject,
                email = %validated.claims.email,
                email_verified = ?validated.claims.email_verified.as_bool(),
                "code validated"
            );
            println!("{}", serde_json::to_string_pretty(&validated.claims)?);
        }
        Err(ExchangeError::Rejected { code, .. }) => {
            error!(%code, "Apple rejected the authorization code");
            return Err(code.to_string().into());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
