use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::State,
    http::{self, HeaderMap, HeaderName, HeaderValue, Method},
    response::{Html, IntoResponse},
    routing::get,
};
use platform_authn::{CREDENTIAL_HEADER, TokenCodec, TokenResolver};
use platform_authz::{Gatekeeper, Principal};
use platform_db::{self, DbPool, UserDirectory};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    graphql::{self, GraphqlData, RequestPrincipal, SchemaType, operations},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub schema: SchemaType,
    pub gatekeeper: Gatekeeper,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the token codec, principal resolver, gatekeeper and schema
    /// around one pool.
    pub fn new(pool: DbPool, config: Arc<AppConfig>) -> Self {
        let tokens = TokenCodec::new(config.jwt_secret.as_bytes(), config.token_ttl);
        let resolver = TokenResolver::new(tokens.clone(), UserDirectory::new(pool.clone()))
            .with_timeout(config.lookup_timeout);
        let gatekeeper = Gatekeeper::new(operations::role_registry(), resolver);
        let schema = graphql::build_schema(GraphqlData {
            pool: pool.clone(),
            gatekeeper: gatekeeper.clone(),
            tokens,
        });
        Self {
            pool,
            schema,
            gatekeeper,
            config,
        }
    }

    pub async fn principal(&self, headers: &HeaderMap) -> Option<Principal> {
        let credential = headers
            .get(CREDENTIAL_HEADER)
            .and_then(|value| value.to_str().ok());
        self.gatekeeper.resolve(credential).await
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "eats server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_headers([
            http::header::CONTENT_TYPE,
            HeaderName::from_static(CREDENTIAL_HEADER),
        ])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin(origins))
}

/// `*` anywhere in the list, or no usable origin at all, means any origin.
fn allow_origin(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|origin| origin == "*") {
        return AllowOrigin::any();
    }
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    }
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/graphql", get(graphiql_handler).post(graphql_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// The credential is resolved once here; resolvers only see the outcome.
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let principal = state.principal(&headers).await;
    let request = request.into_inner().data(RequestPrincipal(principal));
    state.schema.execute(request).await.into()
}

async fn graphiql_handler() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = platform_db::ping(&state.pool).await;
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use platform_authz::Role;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::Fixture;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn graphql_post(query: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/graphql")
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(CREDENTIAL_HEADER, token);
        }
        builder
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_database() {
        let fx = Fixture::new().await;
        let response = build_router(fx.state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["db_ok"], json!(true));
    }

    #[tokio::test]
    async fn credential_header_identifies_the_caller() {
        let fx = Fixture::new().await;
        let owner = fx.user("owner@eats.test", Role::Owner).await;
        let token = fx.tokens().issue(owner.id).unwrap();

        let response = build_router(fx.state())
            .oneshot(graphql_post("{ me { email role } }", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["data"],
            json!({ "me": { "email": "owner@eats.test", "role": "OWNER" } })
        );
    }

    #[tokio::test]
    async fn bad_credentials_read_as_anonymous() {
        let fx = Fixture::new().await;
        for token in [Some("not-a-token"), Some("   "), None] {
            let response = build_router(fx.state())
                .oneshot(graphql_post("{ me { email } }", token))
                .await
                .unwrap();
            let body = body_json(response).await;
            assert_eq!(body["errors"][0]["extensions"]["code"], json!("FORBIDDEN"));
            assert_eq!(body["errors"][0]["message"], json!("forbidden resource"));
        }
    }

    #[tokio::test]
    async fn graphiql_is_served_on_get() {
        let fx = Fixture::new().await;
        let response = build_router(fx.state())
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&html).contains("graphiql"));
    }

    fn with_origins(state: AppState, origins: &[&str]) -> AppState {
        let config = AppConfig {
            cors_allowed_origins: origins.iter().map(|origin| origin.to_string()).collect(),
            ..(*state.config).clone()
        };
        AppState {
            config: Arc::new(config),
            ..state
        }
    }

    async fn allowed_origin_for(state: AppState, origin: &str) -> Option<String> {
        let request = Request::get("/health")
            .header(http::header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(request).await.unwrap();
        response
            .headers()
            .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn wildcard_origin_allows_everyone() {
        let fx = Fixture::new().await;
        let state = with_origins(fx.state(), &["https://app.eats.test", "*"]);
        assert_eq!(
            allowed_origin_for(state, "https://elsewhere.test").await,
            Some("*".to_string())
        );
    }

    #[tokio::test]
    async fn listed_origins_are_echoed_and_others_left_out() {
        let fx = Fixture::new().await;
        let state = with_origins(fx.state(), &["https://app.eats.test"]);
        assert_eq!(
            allowed_origin_for(state.clone(), "https://app.eats.test").await,
            Some("https://app.eats.test".to_string())
        );
        assert_eq!(allowed_origin_for(state, "https://elsewhere.test").await, None);
    }
}
