use async_trait::async_trait;
use reqwest::StatusCode;
use retrofit_application::{AuthBackend, AuthGrant, SessionRenewal};
use retrofit_core::{AppError, AppResult};
use retrofit_domain::{AccountRecord, LoginCredentials, VerificationPurpose};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

/// Which rejection kind a non-success status maps to.
#[derive(Debug, Clone, Copy)]
enum Rejection {
    Authentication,
    VerificationCode,
}

impl Rejection {
    fn into_error(self, message: String) -> AppError {
        match self {
            Self::Authentication => AppError::AuthenticationFailure(message),
            Self::VerificationCode => AppError::VerificationCodeFailure(message),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DelegatedLoginRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationCodeRequest<'a> {
    phone_number: &'a str,
    purpose: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantResponse {
    user: AccountRecord,
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

impl From<GrantResponse> for AuthGrant {
    fn from(response: GrantResponse) -> Self {
        Self {
            account: response.user,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in_seconds: response.expires_in,
        }
    }
}

/// HTTP implementation of the authentication backend.
pub struct HttpAuthBackend {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthBackend {
    /// Creates a backend calling endpoints below `base_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http_client,
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url.join(path).map_err(|error| {
            AppError::Internal(format!("invalid auth backend endpoint '{path}': {error}"))
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B, rejection: Rejection) -> AppResult<Option<R>>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.endpoint(path)?;
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("auth backend transport error on '{path}': {error}"))
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if status.is_success() {
            return response.json::<R>().await.map(Some).map_err(|error| {
                AppError::Internal(format!(
                    "auth backend returned an unreadable body on '{path}': {error}"
                ))
            });
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("auth backend responded with status {status}"));

        if status.is_client_error() {
            Err(rejection.into_error(message))
        } else {
            Err(AppError::Internal(format!(
                "auth backend failed on '{path}' with status {status}: {message}"
            )))
        }
    }

    async fn post_expecting<B, R>(&self, path: &str, body: &B, rejection: Rejection) -> AppResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        self.post(path, body, rejection).await?.ok_or_else(|| {
            AppError::Internal(format!("auth backend returned no body on '{path}'"))
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn authenticate(&self, credentials: &LoginCredentials) -> AppResult<AuthGrant> {
        self.post_expecting::<_, GrantResponse>("auth/login", credentials, Rejection::Authentication)
            .await
            .map(AuthGrant::from)
    }

    async fn exchange_delegated_code(&self, code: &str) -> AppResult<AuthGrant> {
        self.post_expecting::<_, GrantResponse>(
            "auth/delegated",
            &DelegatedLoginRequest { code },
            Rejection::Authentication,
        )
        .await
        .map(AuthGrant::from)
    }

    async fn dispatch_verification_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        self.post::<_, serde_json::Value>(
            "auth/verification-codes",
            &VerificationCodeRequest {
                phone_number,
                purpose: purpose.as_str(),
            },
            Rejection::VerificationCode,
        )
        .await
        .map(|_| ())
    }

    async fn renew_session(&self, refresh_token: &str) -> AppResult<SessionRenewal> {
        let response = self
            .post_expecting::<_, RenewalResponse>(
                "auth/refresh",
                &RefreshRequest { refresh_token },
                Rejection::Authentication,
            )
            .await?;

        Ok(SessionRenewal {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|token| !token.is_empty()),
            expires_in_seconds: response.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{GrantResponse, HttpAuthBackend};

    #[test]
    fn endpoints_resolve_below_base_path() {
        let Ok(base) = Url::parse("https://auth.example.com/api") else {
            panic!("valid url");
        };
        let backend = HttpAuthBackend::new(reqwest::Client::new(), base);

        let endpoint = backend.endpoint("auth/login").map(|url| url.to_string());
        assert_eq!(
            endpoint.ok().as_deref(),
            Some("https://auth.example.com/api/auth/login")
        );
    }

    #[test]
    fn grant_response_reads_camel_case_account() {
        let body = r#"{
            "user": {"id": "u_1", "phoneNumber": "13800001111", "role": "company"},
            "accessToken": "a",
            "refreshToken": "r",
            "expiresIn": 3600
        }"#;

        let parsed = serde_json::from_str::<GrantResponse>(body);
        assert!(parsed.is_ok_and(|grant| grant.user.id == "u_1" && grant.expires_in == 3600));
    }
}
