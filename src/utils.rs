use crate::config::{ReservedManagementEndpoints, RESERVED_LINK_ROUTES};
use crate::error::ApiError;
use axum::http::{header, HeaderMap};
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use std::env;
use url::Url;

const TOKEN_COOKIE: &str = "token";

pub fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Maps a request path to a store key by stripping one leading and one trailing slash.
pub fn normalize_path(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Rejects caller-chosen keys the redirect could never resolve: anything outside the
/// unreserved characters plus `/` (paths are matched undecoded), and management routes.
pub fn check_short_key(
    key: &str,
    endpoints: &ReservedManagementEndpoints,
) -> Result<(), ApiError> {
    let path_safe = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '/'));
    if !path_safe {
        return Err(ApiError::InvalidRequest(format!(
            "Short link {key:?} may only contain letters, digits, '-', '.', '_', '~' and '/'"
        )));
    }
    let path = format!("/{key}");
    let reserved = [&endpoints.login, &endpoints.logout, &endpoints.dashboard];
    let shadowed = RESERVED_LINK_ROUTES.contains(&path.as_str())
        || reserved.iter().any(|route| **route == path);
    if shadowed {
        return Err(ApiError::InvalidRequest(format!(
            "Short link {key:?} is a reserved path"
        )));
    }
    Ok(())
}

/// Checks that `text` is an absolute URL. The caller keeps the original string.
pub fn parse_url(text: &str) -> Result<(), ApiError> {
    Url::parse(text)
        .map(|_| ())
        .map_err(|_| ApiError::InvalidRequest("Malformed url".into()))
}

/// 128 random bits, URL-safe base64 without padding (22 characters).
pub fn generate_id() -> String {
    let random_bytes: [u8; 16] = rand::thread_rng().gen();
    BASE64_URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Looks up the `token` cookie.
///
/// `Ok(None)` means no such cookie was sent, `Err` means the `Cookie` header could not be read.
pub fn get_token_cookie(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let mut found = None;
    for value in headers.get_all(header::COOKIE) {
        let cookies = value
            .to_str()
            .map_err(|_| ApiError::InvalidRequest("Unreadable cookie header".into()))?;
        found = cookies
            .split(';')
            .map(str::trim)
            .filter_map(|cookie| cookie.split_once('='))
            .find(|(name, _)| *name == TOKEN_COOKIE)
            .map(|(_, value)| value.to_string());
        if found.is_some() {
            break;
        }
    }
    Ok(found)
}

pub fn token_cookie(token: &str, max_age_secs: Option<u64>) -> String {
    match max_age_secs {
        Some(max_age) => format!(
            "{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}"
        ),
        None => format!("{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax"),
    }
}

pub fn expired_token_cookie() -> String {
    format!("{TOKEN_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn normalize_path_strips_single_slashes() {
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path("/abc"), "abc");
        assert_eq!(normalize_path("/abc/"), "abc");
        assert_eq!(normalize_path("/a/b/"), "a/b");
        assert_eq!(normalize_path("//abc//"), "/abc/");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn generated_ids_are_url_safe_and_distinct() {
        let first = generate_id();
        let second = generate_id();
        assert_eq!(first.len(), 22);
        assert_ne!(first, second);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn parse_url_rejects_relative_urls() {
        assert!(parse_url("https://example.com").is_ok());
        assert!(matches!(
            parse_url("example.com"),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn short_keys_must_be_path_safe() {
        let endpoints = ReservedManagementEndpoints::default();
        for key in ["docs", "a/b", "v1.2_x-y~z", "AbC09"] {
            assert!(check_short_key(key, &endpoints).is_ok(), "{key}");
        }
        for key in ["a b", "x?y", "caf\u{e9}", "50%", "a#b"] {
            assert!(
                matches!(
                    check_short_key(key, &endpoints),
                    Err(ApiError::InvalidRequest(_))
                ),
                "{key}"
            );
        }
    }

    #[test]
    fn short_keys_must_not_shadow_routes() {
        let endpoints = ReservedManagementEndpoints {
            login: "/admin/login".into(),
            ..ReservedManagementEndpoints::default()
        };
        for key in ["create", "edit", "delete", "admin/login", "logout", "dashboard"] {
            assert!(check_short_key(key, &endpoints).is_err(), "{key}");
        }
        assert!(check_short_key("login", &endpoints).is_ok());
        assert!(check_short_key("create/more", &endpoints).is_ok());
    }

    #[test]
    fn token_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; lang=en"),
        );
        assert_eq!(
            get_token_cookie(&headers).unwrap(),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn missing_token_cookie_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("tokens=nope"));
        assert_eq!(get_token_cookie(&headers).unwrap(), None);
        assert_eq!(get_token_cookie(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn unreadable_cookie_header_is_invalid_request() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_bytes(b"token=\xff\xfe").unwrap(),
        );
        assert!(matches!(
            get_token_cookie(&headers),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
