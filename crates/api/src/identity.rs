//! Shared-secret lookup.
//!
//! The signing secret is the host's identity string, known to the gateway and
//! to trusted callers. It is resolved once at startup and never logged.

use std::time::Duration;

use rpcgate_core::signature::SharedSecret;

use crate::config::SecretSource;

/// How long to wait for the identity endpoint.
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Identity lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity endpoint returned an empty value")]
    Empty,
}

/// Resolve the shared secret from its configured source.
pub async fn load_secret(source: &SecretSource) -> Result<SharedSecret, IdentityError> {
    match source {
        SecretSource::Static(secret) if secret.is_empty() => Err(IdentityError::Empty),
        SecretSource::Static(secret) => Ok(secret.clone()),
        SecretSource::IdentityUrl(url) => fetch_identity(url).await,
    }
}

async fn fetch_identity(url: &str) -> Result<SharedSecret, IdentityError> {
    let client = reqwest::Client::builder()
        .timeout(IDENTITY_TIMEOUT)
        .build()?;

    let value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let value = value.trim();
    if value.is_empty() {
        return Err(IdentityError::Empty);
    }

    tracing::info!(url, "Shared secret resolved from identity endpoint");
    Ok(SharedSecret::new(value))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::routing::get;
    use axum::Router;
    use rpcgate_core::signature::Authenticator;

    use super::*;

    async fn serve(body: &'static str) -> String {
        let app = Router::new().route("/latest/meta-data/local-hostname", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/latest/meta-data/local-hostname")
    }

    #[tokio::test]
    async fn static_secret_is_returned_as_is() {
        let source = SecretSource::Static(SharedSecret::new("abc"));
        let secret = load_secret(&source).await.unwrap();
        let expected = Authenticator::new(SharedSecret::new("abc")).sign(b"x");
        assert_eq!(Authenticator::new(secret).sign(b"x"), expected);
    }

    #[tokio::test]
    async fn identity_endpoint_value_is_trimmed() {
        let url = serve("ip-10-1-2-3.ec2.internal\n").await;
        let secret = load_secret(&SecretSource::IdentityUrl(url)).await.unwrap();
        let expected = Authenticator::new(SharedSecret::new("ip-10-1-2-3.ec2.internal")).sign(b"x");
        assert_eq!(Authenticator::new(secret).sign(b"x"), expected);
    }

    #[tokio::test]
    async fn empty_identity_is_rejected() {
        let url = serve("   ").await;
        assert_matches!(
            load_secret(&SecretSource::IdentityUrl(url)).await,
            Err(IdentityError::Empty)
        );
        assert_matches!(
            load_secret(&SecretSource::Static(SharedSecret::new(""))).await,
            Err(IdentityError::Empty)
        );
    }
}
