//! Storefront routes.
//!
//! - `GET  /`                  homepage
//! - `GET  /melons`            every melon in the catalog
//! - `GET  /melon/{id}`        melon detail, 404 for unknown ids
//! - `GET  /cart`              cart summary
//! - `GET  /add_to_cart/{id}`  add a melon, then redirect to `/cart`
//! - `GET  /login`             login form
//! - `POST /login`             placeholder response
//! - `GET  /checkout`          flashes a warning, then redirects to `/melons`
//! - `GET  /static/*`          stylesheet and other assets

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use ubermelon_core::{
    domain::melon::MelonId,
    errors::{InterfaceError, ShopError},
    session::{FlashLevel, SessionState},
    shop::{
        cart::{self, CartLine, CartSummary},
        catalog::{Catalog, CatalogError},
    },
};

use crate::session::{session_layer, Session, SessionLayerState};

pub const LOGIN_PLACEHOLDER: &str = "Oops! This needs to be implemented";
pub const CHECKOUT_WARNING: &str = "Sorry! Checkout will be implemented in a future version.";

#[derive(Clone)]
pub struct ShopState {
    catalog: Arc<Catalog>,
    templates: Arc<Tera>,
}

impl ShopState {
    pub fn new(catalog: Arc<Catalog>, templates: Arc<Tera>) -> Self {
        Self { catalog, templates }
    }
}

pub fn router(state: ShopState, sessions: SessionLayerState, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/melons", get(list_melons))
        .route("/melon/{id}", get(show_melon))
        .route("/cart", get(shopping_cart))
        .route("/add_to_cart/{id}", get(add_to_cart))
        .route("/login", get(show_login).post(process_login))
        .route("/checkout", get(checkout))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(middleware::from_fn_with_state(sessions, session_layer))
}

// ---------------------------------------------------------------------------
// View models
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CartView {
    lines: Vec<CartLine>,
    order_total: Decimal,
    item_count: u32,
}

impl From<CartSummary> for CartView {
    fn from(summary: CartSummary) -> Self {
        let item_count = summary.item_count();
        Self {
            lines: summary.lines.into_values().collect(),
            order_total: summary.order_total,
            item_count,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorView<'a> {
    title: &'static str,
    message: &'static str,
    correlation_id: &'a str,
}

/// Rendered error page carrying the HTTP status that matches the failure.
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    body: Html<String>,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(
    State(state): State<ShopState>,
    session: Session,
) -> Result<Html<String>, PageError> {
    let mut session_state = session.lock().await;
    let context = page_context(&mut session_state);
    render(&state.templates, "homepage.html", &context, &session)
}

async fn list_melons(
    State(state): State<ShopState>,
    session: Session,
) -> Result<Html<String>, PageError> {
    let mut session_state = session.lock().await;
    let mut context = page_context(&mut session_state);
    context.insert("melon_list", state.catalog.list_all());
    render(&state.templates, "all_melons.html", &context, &session)
}

async fn show_melon(
    Path(raw_id): Path<String>,
    State(state): State<ShopState>,
    session: Session,
) -> Result<Html<String>, PageError> {
    let mut session_state = session.lock().await;
    let lookup = parse_melon_id(&raw_id).and_then(|id| state.catalog.get_by_id(id));

    let melon = match lookup {
        Ok(melon) => melon,
        Err(lookup_error) => {
            warn!(
                event_name = "shop.melon.not_found",
                correlation_id = %session.id(),
                requested_id = %raw_id,
                "melon detail requested for unknown id"
            );
            return Err(error_page(&state.templates, &mut session_state, &session, lookup_error.into()));
        }
    };

    let mut context = page_context(&mut session_state);
    context.insert("display_melon", melon);
    render(&state.templates, "melon_details.html", &context, &session)
}

async fn shopping_cart(
    State(state): State<ShopState>,
    session: Session,
) -> Result<Html<String>, PageError> {
    let mut session_state = session.lock().await;

    let summary = match cart::summarize(&session_state, &state.catalog) {
        Ok(summary) => summary,
        Err(cart_error) => {
            error!(
                event_name = "shop.cart.summary_failed",
                correlation_id = %session.id(),
                error = %cart_error,
                "cart could not be summarized"
            );
            return Err(error_page(&state.templates, &mut session_state, &session, cart_error.into()));
        }
    };

    let mut context = page_context(&mut session_state);
    context.insert("cart", &CartView::from(summary));
    render(&state.templates, "cart.html", &context, &session)
}

async fn add_to_cart(
    Path(raw_id): Path<String>,
    State(state): State<ShopState>,
    session: Session,
) -> Result<Redirect, PageError> {
    let mut session_state = session.lock().await;

    let id = match parse_melon_id(&raw_id) {
        Ok(id) => id,
        Err(lookup_error) => {
            return Err(error_page(&state.templates, &mut session_state, &session, lookup_error.into()));
        }
    };

    match cart::add(&mut session_state, &state.catalog, id) {
        Ok(melon) => {
            session_state.flash(FlashLevel::Info, format!("{} was added to cart", melon.common_name));
            info!(
                event_name = "shop.cart.item_added",
                correlation_id = %session.id(),
                melon_id = %id,
                cart_size = session_state.cart_len(),
                "melon added to cart"
            );
            Ok(Redirect::to("/cart"))
        }
        Err(cart_error) => {
            warn!(
                event_name = "shop.cart.invalid_item",
                correlation_id = %session.id(),
                melon_id = %id,
                "add to cart rejected for unknown melon"
            );
            Err(error_page(&state.templates, &mut session_state, &session, cart_error.into()))
        }
    }
}

async fn show_login(
    State(state): State<ShopState>,
    session: Session,
) -> Result<Html<String>, PageError> {
    let mut session_state = session.lock().await;
    let context = page_context(&mut session_state);
    render(&state.templates, "login.html", &context, &session)
}

async fn process_login() -> &'static str {
    LOGIN_PLACEHOLDER
}

async fn checkout(session: Session) -> Redirect {
    session.lock().await.flash(FlashLevel::Warning, CHECKOUT_WARNING);
    info!(
        event_name = "shop.checkout.unavailable",
        correlation_id = %session.id(),
        "checkout requested but not implemented"
    );
    Redirect::to("/melons")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Non-numeric ids are treated like ids that are not in the catalog.
fn parse_melon_id(raw: &str) -> Result<MelonId, CatalogError> {
    raw.parse::<MelonId>().map_err(|_| CatalogError::NotFound(MelonId(0)))
}

/// Context shared by every page: drains pending flashes and reports the cart
/// size for the navigation bar.
fn page_context(session_state: &mut SessionState) -> Context {
    let mut context = Context::new();
    context.insert("cart_count", &session_state.cart_len());
    context.insert("flashes", &session_state.take_flashes());
    context
}

fn render(
    templates: &Tera,
    name: &str,
    context: &Context,
    session: &Session,
) -> Result<Html<String>, PageError> {
    templates.render(name, context).map(Html).map_err(|render_error| {
        error!(
            event_name = "shop.render.failed",
            correlation_id = %session.id(),
            template = name,
            error = %render_error,
            "template rendering failed"
        );
        let interface =
            ShopError::Render(render_error.to_string()).into_interface(session.id().to_string());
        PageError { status: StatusCode::INTERNAL_SERVER_ERROR, body: fallback_error_body(&interface) }
    })
}

fn error_page(
    templates: &Tera,
    session_state: &mut SessionState,
    session: &Session,
    shop_error: ShopError,
) -> PageError {
    let interface = shop_error.into_interface(session.id().to_string());
    let (status, title) = match &interface {
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "Melon not found"),
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "Not added to cart"),
        InterfaceError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        }
    };
    info!(
        event_name = "shop.error_page.rendered",
        correlation_id = %interface.correlation_id(),
        status = status.as_u16(),
        detail = interface.message(),
        "rendering error page"
    );

    let mut context = page_context(session_state);
    context.insert(
        "error",
        &ErrorView {
            title,
            message: interface.user_message(),
            correlation_id: interface.correlation_id(),
        },
    );

    let body = match templates.render("error.html", &context) {
        Ok(html) => Html(html),
        Err(render_error) => {
            error!(
                event_name = "shop.render.failed",
                correlation_id = %session.id(),
                template = "error.html",
                error = %render_error,
                "error page rendering failed"
            );
            fallback_error_body(&interface)
        }
    };

    PageError { status, body }
}

fn fallback_error_body(interface: &InterfaceError) -> Html<String> {
    Html(format!(
        "<h1>Error</h1><p>{}</p><p>Reference: {}</p>",
        interface.user_message(),
        interface.correlation_id()
    ))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response, StatusCode},
        Router,
    };
    use rust_decimal::Decimal;
    use tower::ServiceExt;
    use ubermelon_core::{
        domain::melon::{Melon, MelonId},
        shop::catalog::Catalog,
    };

    use super::{router, ShopState, CHECKOUT_WARNING, LOGIN_PLACEHOLDER};
    use crate::session::{CookieSigner, InMemorySessionStore, SessionLayerState};
    use crate::templates::embedded_templates;

    const COOKIE_NAME: &str = "ubermelon_session";

    fn melon(id: u32, name: &str, price: Decimal) -> Melon {
        Melon {
            id: MelonId(id),
            melon_type: name.to_ascii_lowercase(),
            common_name: name.to_string(),
            scientific_name: format!("Cucumis melo '{name}'"),
            price,
            image_url: format!("https://images.ubermelon.example/{id}.jpg"),
            color: "green".to_string(),
            seedless: false,
            inventory_count: 5,
        }
    }

    fn app() -> Router {
        let catalog = Catalog::new(vec![
            melon(1, "Crenshaw", Decimal::new(500, 2)),
            melon(2, "Casaba", Decimal::new(350, 2)),
        ])
        .expect("catalog");
        let templates = embedded_templates().expect("templates");
        let sessions = SessionLayerState::new(
            Arc::new(InMemorySessionStore::new(3600)),
            CookieSigner::new(b"test-signing-key-0123456789").expect("signer"),
            COOKIE_NAME,
        );
        router(
            ShopState::new(Arc::new(catalog), Arc::new(templates)),
            sessions,
            Path::new("/nonexistent/static"),
        )
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        app.clone().oneshot(builder.body(Body::empty()).expect("request")).await.expect("response")
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    fn session_cookie(response: &Response<Body>) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(ToString::to_string)
    }

    fn location(response: &Response<Body>) -> Option<&str> {
        response.headers().get(header::LOCATION).and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn homepage_renders_without_issuing_a_session() {
        let app = app();

        let response = get(&app, "/", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none(), "no state, no cookie");
        assert!(body_text(response).await.contains("Ubermelon"));
    }

    #[tokio::test]
    async fn melon_listing_shows_every_melon_with_price() {
        let app = app();

        let body = body_text(get(&app, "/melons", None).await).await;

        assert!(body.contains("Crenshaw"));
        assert!(body.contains("Casaba"));
        assert!(body.contains("$3.50"));
        assert!(body.contains("/melon/2"));
    }

    #[tokio::test]
    async fn melon_detail_renders_known_melon() {
        let app = app();

        let response = get(&app, "/melon/1", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Crenshaw"));
        assert!(body.contains("/add_to_cart/1"));
    }

    #[tokio::test]
    async fn unknown_or_malformed_melon_id_is_not_found() {
        let app = app();

        let unknown = get(&app, "/melon/999", None).await;
        let malformed = get(&app, "/melon/watermelon", None).await;

        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(malformed.status(), StatusCode::NOT_FOUND);
        assert!(body_text(unknown).await.contains("Melon not found"));
    }

    #[tokio::test]
    async fn empty_cart_renders_empty_state() {
        let app = app();

        let response = get(&app, "/cart", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Your cart is empty"));
    }

    #[tokio::test]
    async fn add_to_cart_redirects_and_flashes_confirmation_once() {
        let app = app();

        let added = get(&app, "/add_to_cart/1", None).await;
        assert_eq!(added.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&added), Some("/cart"));
        let cookie = session_cookie(&added).expect("session cookie issued");
        assert!(cookie.starts_with(COOKIE_NAME));

        let cart = body_text(get(&app, "/cart", Some(&cookie)).await).await;
        assert!(cart.contains("Crenshaw was added to cart"));
        assert!(cart.contains("$5.00"));

        let again = body_text(get(&app, "/cart", Some(&cookie)).await).await;
        assert!(!again.contains("was added to cart"), "flash must be shown only once");
        assert!(again.contains("Crenshaw"));
    }

    #[tokio::test]
    async fn cart_groups_repeated_adds_and_totals_order() {
        let app = app();

        let first = get(&app, "/add_to_cart/1", None).await;
        let cookie = session_cookie(&first).expect("cookie");
        get(&app, "/add_to_cart/1", Some(&cookie)).await;
        let last = get(&app, "/add_to_cart/2", Some(&cookie)).await;
        assert!(session_cookie(&last).is_none(), "existing session keeps its cookie");

        let body = body_text(get(&app, "/cart", Some(&cookie)).await).await;

        assert!(body.contains("$10.00"), "two Crenshaws at 5.00");
        assert!(body.contains("$13.50"), "order total");
        assert!(body.contains("Cart (3)"));
    }

    #[tokio::test]
    async fn unknown_melon_is_rejected_without_touching_cart() {
        let app = app();

        let first = get(&app, "/add_to_cart/2", None).await;
        let cookie = session_cookie(&first).expect("cookie");

        let rejected = get(&app, "/add_to_cart/404", Some(&cookie)).await;
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(rejected).await.contains("nothing was added to your cart"));

        let malformed = get(&app, "/add_to_cart/abc", Some(&cookie)).await;
        assert_eq!(malformed.status(), StatusCode::NOT_FOUND);

        let body = body_text(get(&app, "/cart", Some(&cookie)).await).await;
        assert!(body.contains("Cart (1)"));
        assert!(body.contains("$3.50"));
    }

    #[tokio::test]
    async fn tampered_cookie_starts_a_fresh_session() {
        let app = app();

        let first = get(&app, "/add_to_cart/1", None).await;
        let cookie = session_cookie(&first).expect("cookie");
        let tampered = format!("{cookie}00");

        let response = get(&app, "/cart", Some(&tampered)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Your cart is empty"));
    }

    #[tokio::test]
    async fn checkout_flashes_warning_and_redirects_to_listing() {
        let app = app();

        let response = get(&app, "/checkout", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/melons"));
        let cookie = session_cookie(&response).expect("flash needs a session");

        let listing = body_text(get(&app, "/melons", Some(&cookie)).await).await;
        assert!(listing.contains(CHECKOUT_WARNING));
    }

    #[tokio::test]
    async fn login_form_and_placeholder_post() {
        let app = app();

        let form = get(&app, "/login", None).await;
        assert_eq!(form.status(), StatusCode::OK);
        assert!(body_text(form).await.contains("<form"));

        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=a%40b.c&password=melon"))
            .expect("request");
        let posted = app.clone().oneshot(request).await.expect("response");

        assert_eq!(posted.status(), StatusCode::OK);
        assert_eq!(body_text(posted).await, LOGIN_PLACEHOLDER);
    }
}
