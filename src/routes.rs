use crate::auth::TokenAuthority;
use crate::config::{Config, TokenTransport};
use crate::error::ApiError;
use crate::model::{CreateLinkRequest, Credentials, DeleteLinkRequest, EditLinkRequest, ShortUrl};
use crate::pages::Pages;
use crate::store::LinkStore;
use crate::utils::{
    check_short_key, expired_token_cookie, normalize_path, parse_url, token_cookie,
};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::FormRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LinkStore>,
    pub authority: Arc<TokenAuthority>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn LinkStore>) -> Result<Self, tera::Error> {
        let authority = TokenAuthority::new(
            &config.authentication.signing_key,
            config.authentication.token_ttl_secs,
        );
        let endpoints = &config.reserved_management_endpoints;
        let pages = Pages::new(&config.website.name, &endpoints.login, &endpoints.logout)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            authority: Arc::new(authority),
            pages: Arc::new(pages),
        })
    }

    pub fn transport(&self) -> TokenTransport {
        self.config.authentication.token_transport
    }

    fn check_short_key(&self, key: &str) -> Result<(), ApiError> {
        check_short_key(key, &self.config.reserved_management_endpoints)
    }

    fn dashboard_path(&self) -> &str {
        &self.config.reserved_management_endpoints.dashboard
    }

    /// JSON for API clients, back to the dashboard for browsers.
    fn link_response(&self, short_url: String) -> Response {
        match self.transport() {
            TokenTransport::Body => Json(ShortUrl { short_url }).into_response(),
            TokenTransport::Cookie => Redirect::to(self.dashboard_path()).into_response(),
        }
    }
}

/// Request payload decoded the way the deployment's clients send it:
/// JSON with the body transport, an urlencoded form with the cookie transport.
/// JSON bodies are parsed whatever their `Content-Type`, as the access gate does.
pub struct Payload<T>(pub T);

#[async_trait]
impl<T> FromRequest<AppState> for Payload<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.transport() {
            TokenTransport::Body => {
                let bytes = Bytes::from_request(request, state)
                    .await
                    .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
                Json::<T>::from_bytes(&bytes)
                    .map(|Json(payload)| Payload(payload))
                    .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
            }
            TokenTransport::Cookie => Form::<T>::from_request(request, state)
                .await
                .map(|Form(payload)| Payload(payload))
                .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text())),
        }
    }
}

pub async fn create_link(
    State(state): State<AppState>,
    Payload(link): Payload<CreateLinkRequest>,
) -> Result<Response, ApiError> {
    if link.destination_url.is_empty() {
        return Err(ApiError::InvalidRequest(
            "URL not found in request payload".into(),
        ));
    }
    parse_url(&link.destination_url)?;
    if !link.short_url.is_empty() {
        state.check_short_key(&link.short_url)?;
    }
    let short_url = state
        .store
        .add_link(&link.short_url, &link.destination_url)
        .await?;
    tracing::info!("Created short link {} -> {}", short_url, link.destination_url);
    Ok(state.link_response(short_url))
}

pub async fn edit_link(
    State(state): State<AppState>,
    Payload(edit): Payload<EditLinkRequest>,
) -> Result<Response, ApiError> {
    if !edit.new_shortlink.is_empty() {
        state.check_short_key(&edit.new_shortlink)?;
    }
    if !edit.new_destination_url.is_empty() {
        parse_url(&edit.new_destination_url)?;
    }
    let current_destination = state.store.get_link(&edit.shortlink).await?;
    let short_url = state
        .store
        .edit_link(
            &edit.shortlink,
            &current_destination,
            &edit.new_shortlink,
            &edit.new_destination_url,
        )
        .await?;
    tracing::info!("Edited short link {} (now {})", edit.shortlink, short_url);
    Ok(state.link_response(short_url))
}

pub async fn delete_link(
    State(state): State<AppState>,
    Payload(delete): Payload<DeleteLinkRequest>,
) -> Result<Redirect, ApiError> {
    state.store.remove_link(&delete.shortlink).await?;
    tracing::info!("Deleted short link {}", delete.shortlink);
    Ok(match state.transport() {
        TokenTransport::Body => Redirect::to("/"),
        TokenTransport::Cookie => Redirect::to(state.dashboard_path()),
    })
}

/// Public surface: every path that is not a management route resolves to a stored link.
pub async fn redirect(State(state): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    let key = normalize_path(uri.path());
    let destination = state.store.get_link(key).await.map_err(|err| {
        tracing::debug!("No redirect for {}: {}", uri.path(), err);
        ApiError::from(err)
    })?;
    tracing::debug!("Redirecting /{} to {}", key, destination);
    Ok((StatusCode::FOUND, [(header::LOCATION, destination)]).into_response())
}

pub async fn login_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    Ok(Html(state.pages.login()?))
}

pub async fn login(
    State(state): State<AppState>,
    credentials: Result<Form<Credentials>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(credentials) =
        credentials.map_err(|_| ApiError::InvalidRequest("Invalid request payload".into()))?;
    let allowed = state
        .config
        .authentication
        .allowed_users
        .iter()
        .any(|user| user.matches(&credentials.username, &credentials.password));
    if !allowed {
        tracing::warn!("Rejected login for {:?}", credentials.username);
        return Err(ApiError::Forbidden("Access denied".into()));
    }

    let token = state.authority.issue_token()?;
    tracing::info!("{} logged in", credentials.username);
    Ok(match state.transport() {
        TokenTransport::Body => [("token", token)].into_response(),
        TokenTransport::Cookie => (
            [(
                header::SET_COOKIE,
                token_cookie(&token, state.authority.ttl_secs()),
            )],
            Redirect::to(state.dashboard_path()),
        )
            .into_response(),
    })
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_token_cookie())],
        Redirect::to(&state.config.reserved_management_endpoints.login),
    )
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let links = state.store.list_links().await?;
    Ok(Html(state.pages.dashboard(&links)?))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Invalid request method".into())
}
