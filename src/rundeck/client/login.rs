use log::{debug, info};
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use url::Url;

use crate::error::{Result, RundeckError};

use super::core::{ClientSettings, SESSION_COOKIE, USER_AGENT};

/// Where Rundeck sends a browser whose form login was rejected.
const LOGIN_FAILURE_PATHS: [&str; 2] = ["/user/error", "/user/login"];

/// Performs the form login and returns the `JSESSIONID` session id.
///
/// A successful login answers with a redirect into the application and sets
/// the session cookie. Anything else (no redirect, a redirect back to the
/// login or error page, or a redirect without the cookie) is treated as wrong
/// credentials.
pub(super) async fn authenticate(
    base_url: &Url,
    username: &str,
    password: &str,
    settings: &ClientSettings,
) -> Result<String> {
    let login_url = base_url
        .join("j_security_check")
        .map_err(|e| RundeckError::Config(format!("Invalid login URL: {e}")))?;

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::none())
        .timeout(settings.login_timeout)
        .danger_accept_invalid_certs(settings.insecure)
        .build()
        .map_err(|e| RundeckError::Config(format!("Failed to create HTTP client: {e}")))?;

    info!("Logging in to {base_url} as {username}");

    let response = client
        .post(login_url)
        .form(&[("j_username", username), ("j_password", password)])
        .send()
        .await?;

    let rejected = || RundeckError::Authentication {
        url: base_url.to_string(),
    };

    if !response.status().is_redirection() {
        debug!("Login answered {} without redirect", response.status());
        return Err(rejected());
    }

    if redirects_to_login_failure(&response) {
        debug!("Login redirected back to the login pages");
        return Err(rejected());
    }

    session_cookie(&response).ok_or_else(rejected)
}

fn redirects_to_login_failure(response: &Response) -> bool {
    let Some(location) = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    // Location may be absolute or relative; only the path matters.
    let path = Url::parse(location)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| location.split('?').next().unwrap_or_default().to_string());

    LOGIN_FAILURE_PATHS
        .iter()
        .any(|failure| path.ends_with(failure))
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}
