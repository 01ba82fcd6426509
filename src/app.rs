use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers::{protected, public};
use crate::middleware::{rate_limit, require_role, tenant_gate, RateLimit, RoleGate};
use crate::realtime::socket_handler;
use crate::state::AppState;
use crate::types::Role;

/// Full HTTP surface: public routes, the gated `/api` tree and `/ws`.
///
/// The per-IP rate limit keys on `ConnectInfo<SocketAddr>`; serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/ws", get(socket_handler))
        // Tenant-scoped API
        .nest("/api", api_routes(state.clone()))
        .fallback(public::not_found)
        .with_state(state);

    if let Some(limit) = RateLimit::from_config(&config.api) {
        router = router.layer(from_fn_with_state(limit, rate_limit));
    }

    let router = router
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(config))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{boards, cards, lists, me};

    let writers = RoleGate::new([Role::MEMBER, Role::ADMIN]);
    let admins = RoleGate::new([Role::ADMIN]);
    let writer = || from_fn_with_state(writers.clone(), require_role);
    let admin = || from_fn_with_state(admins.clone(), require_role);

    Router::new()
        .route("/me", get(me::whoami))
        .route("/boards", get(boards::list).post(boards::create.layer(writer())))
        .route(
            "/boards/:id",
            get(boards::show)
                .patch(boards::update.layer(writer()))
                .delete(boards::delete.layer(admin())),
        )
        .route("/boards/:id/lists", get(lists::list).post(lists::create.layer(writer())))
        .route("/lists/:id/cards", get(cards::list).post(cards::create.layer(writer())))
        .route("/cards/:id/move", patch(cards::move_card.layer(writer())))
        // Wraps every route above; unknown /api paths fall through ungated to 404
        .route_layer(from_fn_with_state(state, tenant_gate))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
