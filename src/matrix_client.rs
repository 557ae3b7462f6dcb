// ABOUTME: Matrix client initialization and authentication
// ABOUTME: Handles client creation with the configured store and login via password or token

use anyhow::{Context, Result};
use athenais_core::StorageBackend;
use matrix_sdk::{ruma::OwnedUserId, Client};

pub async fn create_client(homeserver: &str, storage: &StorageBackend) -> Result<Client> {
    let builder = Client::builder().homeserver_url(homeserver);
    let builder = match storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory Matrix store; encryption state is lost on exit");
            builder
        }
        StorageBackend::Sqlite { path, passphrase } => {
            std::fs::create_dir_all(path).with_context(|| {
                format!("Failed to create store directory {}", path.display())
            })?;
            builder.sqlite_store(path, passphrase.as_deref())
        }
    };

    let client = builder
        .build()
        .await
        .context("Failed to create Matrix client")?;

    tracing::info!(homeserver = %homeserver, storage = ?storage, "Matrix client created");

    Ok(client)
}

pub async fn login(
    client: &Client,
    user_id: &str,
    password: Option<&str>,
    access_token: Option<&str>,
    device_name: &str,
) -> Result<()> {
    if let Some(token) = access_token {
        tracing::info!("Logging in with access token");
        let user_id: OwnedUserId = user_id
            .parse()
            .with_context(|| format!("Invalid Matrix user ID: {}", user_id))?;
        let session = matrix_sdk::AuthSession::Matrix(matrix_sdk::authentication::matrix::MatrixSession {
            meta: matrix_sdk::SessionMeta {
                user_id,
                device_id: device_name.to_string().into(),
            },
            tokens: matrix_sdk::SessionTokens {
                access_token: token.to_string(),
                refresh_token: None,
            },
        });
        client
            .restore_session(session)
            .await
            .context("Failed to restore session")?;
    } else if let Some(pwd) = password {
        tracing::info!("Logging in with password");
        client
            .matrix_auth()
            .login_username(user_id, pwd)
            .device_id(device_name)
            .initial_device_display_name(device_name)
            .send()
            .await
            .context("Failed to log in")?;
    } else {
        anyhow::bail!("Either MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN is required");
    }

    let logged_in = client
        .user_id()
        .context("Login completed without a user ID")?;
    tracing::info!(user_id = %logged_in, "Logged in successfully");

    Ok(())
}
