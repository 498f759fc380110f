//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use libris_core::access::Permission;
use libris_core::config::Config;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::auth::{AuthState, Gate, Rule, enforce, handlers, setup::auto_setup_from_env};

/// Gateway server.
#[derive(Debug)]
pub struct Gateway {
    config: Config,
    auth: Arc<AuthState>,
}

impl Gateway {
    /// Create a gateway, opening the account store and running first-run
    /// admin setup.
    ///
    /// # Errors
    ///
    /// Returns error if auth initialization fails.
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        let auth = AuthState::initialize(&config)
            .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?;

        if let Some(admin) = auto_setup_from_env(&auth.users)
            .map_err(|e| GatewayError::Config(format!("Admin setup failed: {e}")))?
        {
            tracing::info!(username = %admin.username, "Initial admin account ready");
        } else if auth.users.is_empty() {
            tracing::warn!(
                "No accounts exist. Create an admin with `libris admin create` \
                 or set LIBRIS_ADMIN_USERNAME and LIBRIS_ADMIN_PASSWORD."
            );
        }

        Ok(Self::with_auth_state(config, Arc::new(auth)))
    }

    /// Create a gateway around an existing auth state.
    #[must_use]
    pub const fn with_auth_state(config: Config, auth: Arc<AuthState>) -> Self {
        Self { config, auth }
    }

    /// Shared auth state.
    #[must_use]
    pub const fn auth(&self) -> &Arc<AuthState> {
        &self.auth
    }

    /// The HTTP application.
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.auth), self.config.server.cors)
    }

    /// Run the gateway server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the server fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.bind, self.config.server.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Build the HTTP application.
pub fn router(auth: Arc<AuthState>, cors: bool) -> Router {
    let state = Arc::clone(&auth);
    let gate = |rule: Rule| from_fn_with_state(Gate::new(Arc::clone(&auth), rule), enforce);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route("/auth/permissions", get(handlers::permissions))
        .route(
            "/admin/users",
            get(handlers::list_users).route_layer(gate(Rule::Permission(Permission::ReadUsers))),
        )
        .route(
            "/admin/users/{id}",
            delete(handlers::delete_user)
                .route_layer(gate(Rule::Permission(Permission::DeleteUsers))),
        )
        .route(
            "/admin/users/{id}/role",
            patch(handlers::set_role).route_layer(gate(Rule::Permission(Permission::ManageRoles))),
        )
        .route(
            "/admin/users/{id}/status",
            patch(handlers::set_status).route_layer(gate(Rule::Permission(Permission::EditUsers))),
        )
        .route(
            "/users/{id}",
            get(handlers::get_user).patch(handlers::update_profile),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
