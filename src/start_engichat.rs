//! Startup helpers for the EngiChat binaries.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use crate::core::config::{ChatConfig, ResponderMode, StorageKind};
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::ProfileId;
use crate::core::models::Profile;
use crate::manager::{CallPolicy, ConversationManager};
use crate::responder::{HttpResponder, Responder, RuleResponder};
use crate::server::{self, AppState};
use crate::storage::{ChatStore, RestChatStore, SqliteChatStore};

/// Install the global tracing subscriber (`RUST_LOG` over `info`), writing to
/// stderr.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the chat function server (used by the `engichat-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting EngiChat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let responder = match build_responder(&config) {
        Ok(responder) => responder,
        Err(e) => {
            error!("Failed to create responder: {e}");
            return ExitCode::from(1);
        }
    };
    let state = AppState::new(responder, &config.server);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server(state, config.server.port)) {
        error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Responder selected by `responder.mode`.
///
/// # Errors
/// Returns an error if the HTTP responder cannot be configured.
pub fn build_responder(config: &ChatConfig) -> ChatResult<Arc<dyn Responder>> {
    match config.responder.mode {
        ResponderMode::Local => Ok(Arc::new(RuleResponder::new())),
        ResponderMode::Http => {
            let responder = HttpResponder::from_config(&config.backend, &config.responder)?;
            info!("Chat function endpoint: {}", responder.endpoint());
            Ok(Arc::new(responder))
        }
    }
}

/// Open the configured store and resolve the profile the session acts as.
///
/// With the `SQLite` store the profile row is created when missing; an unset
/// profile id reuses the profile registered under `session.email`.
///
/// # Errors
/// Returns an error if the store cannot be opened or no profile can be
/// resolved.
pub async fn open_store(config: &ChatConfig) -> ChatResult<(Arc<dyn ChatStore>, ProfileId)> {
    let configured = config
        .session
        .profile_id
        .as_deref()
        .map(str::parse::<ProfileId>)
        .transpose()
        .map_err(|err| ChatError::InvalidConfig(format!("session.profile_id: {err}")))?;

    match config.storage.kind {
        StorageKind::Sqlite => {
            let store = SqliteChatStore::open(&config.storage.sqlite_path).await?;
            let existing = match configured {
                Some(id) => Some(id),
                None => store
                    .find_profile_by_email(&config.session.email)
                    .await?
                    .map(|profile| profile.id),
            };
            let id = existing.unwrap_or_default();
            store
                .upsert_profile(id, &config.session.email, "")
                .await?;
            resolve_profile(&store, id).await?;
            info!(
                "Using SQLite store at {} as {}",
                config.storage.sqlite_path.display(),
                id
            );
            Ok((Arc::new(store), id))
        }
        StorageKind::Rest => {
            let id = configured.ok_or_else(|| {
                ChatError::InvalidConfig(
                    "session.profile_id is required with the rest store".to_string(),
                )
            })?;
            let store: Arc<dyn ChatStore> = Arc::new(RestChatStore::new(&config.backend)?);
            resolve_profile(store.as_ref(), id).await?;
            info!("Using REST store at {}", config.backend.base_url()?);
            Ok((store, id))
        }
    }
}

/// Check that `id` names an existing profile in `store`.
///
/// # Errors
/// Returns an error if the profile is unknown or the store cannot be read.
pub async fn resolve_profile(store: &dyn ChatStore, id: ProfileId) -> ChatResult<Profile> {
    let profile = store
        .get_profile(id)
        .await?
        .ok_or_else(|| ChatError::InvalidConfig(format!("profile {id} not found")))?;
    info!("Signed in as {} ({})", profile.email, profile.id);
    Ok(profile)
}

/// Build a conversation manager from configuration.
///
/// # Errors
/// Returns an error if the store or responder cannot be created.
pub async fn open_session(config: &ChatConfig) -> ChatResult<ConversationManager> {
    let (store, owner) = open_store(config).await?;
    let responder = build_responder(config)?;
    Ok(ConversationManager::new(owner, store, responder)
        .with_policy(CallPolicy::from(&config.responder)))
}
