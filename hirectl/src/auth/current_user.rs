use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    config::AuthConfig,
    errors::{Error, Result},
};

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

/// Read the proxy-asserted identity. A missing user header is unauthenticated; a present but
/// malformed one is rejected with a message.
pub(crate) fn from_proxy_headers(parts: &Parts, auth: &AuthConfig) -> Result<CurrentUser> {
    let Some(raw_id) = header_str(parts, &auth.user_header) else {
        trace!("No {} header present", auth.user_header);
        return Err(Error::Unauthenticated { message: None });
    };

    let id = Uuid::parse_str(raw_id.trim()).map_err(|_| Error::Unauthenticated {
        message: Some(format!("Header {} must be a UUID", auth.user_header)),
    })?;

    let is_admin = header_str(parts, &auth.admin_header).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

    Ok(CurrentUser { id, is_admin })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        from_proxy_headers(parts, &state.config.auth)
    }
}

/// Pass the user through if they are an administrator.
pub fn require_admin(user: CurrentUser) -> Result<CurrentUser> {
    if user.is_admin {
        Ok(user)
    } else {
        Err(Error::Forbidden {
            message: "Administrator access required".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_user_header_is_required() {
        let err = from_proxy_headers(&parts(&[]), &AuthConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { message: None }));
    }

    #[test]
    fn test_malformed_user_id_is_rejected() {
        let err = from_proxy_headers(&parts(&[("x-hirectl-user", "alice")]), &AuthConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { message: Some(_) }));
    }

    #[test]
    fn test_admin_flag() {
        let id = Uuid::new_v4().to_string();

        let user = from_proxy_headers(&parts(&[("x-hirectl-user", id.as_str())]), &AuthConfig::default()).unwrap();
        assert!(!user.is_admin);
        assert!(require_admin(user).is_err());

        let user = from_proxy_headers(&parts(&[("x-hirectl-user", id.as_str()), ("x-hirectl-admin", "TRUE")]), &AuthConfig::default()).unwrap();
        assert!(user.is_admin);
        assert_eq!(user.id.to_string(), id);
        assert!(require_admin(user).is_ok());
    }

    #[test]
    fn test_custom_header_names() {
        let auth = AuthConfig {
            user_header: "x-forwarded-user".to_string(),
            admin_header: "x-forwarded-admin".to_string(),
        };
        let id = Uuid::new_v4();
        let user = from_proxy_headers(&parts(&[("x-forwarded-user", id.to_string().as_str())]), &auth).unwrap();
        assert_eq!(user.id, id);
    }
}
