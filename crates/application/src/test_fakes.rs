use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use retrofit_core::{AppError, AppResult};
use retrofit_domain::{AccountRecord, LoginCredentials, VerificationPurpose};

use crate::identity_store::lock_unpoisoned;
use crate::{AuthBackend, AuthGrant, KeyValueStore, SessionRenewal};

pub(crate) const VALID_CODE: &str = "123456";
pub(crate) const DELEGATED_CODE: &str = "delegated-ok";

#[derive(Default)]
pub(crate) struct FakeKeyValueStore {
    values: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

impl FakeKeyValueStore {
    pub(crate) fn failing_writes() -> Self {
        Self {
            values: Mutex::default(),
            fail_writes: true,
        }
    }

    pub(crate) fn value(&self, key: &str) -> Option<String> {
        lock_unpoisoned(&self.values).get(key).cloned()
    }

    pub(crate) fn insert(&self, key: &str, value: &str) {
        lock_unpoisoned(&self.values).insert(key.to_owned(), value.to_owned());
    }

    pub(crate) fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.values).is_empty()
    }
}

impl KeyValueStore for FakeKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        if self.fail_writes {
            return Err(AppError::Internal("storage is read-only".to_owned()));
        }
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        lock_unpoisoned(&self.values).remove(key);
        Ok(())
    }
}

/// Pauses a backend call until released, after signalling that it started.
pub(crate) struct CallGate {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

impl CallGate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

pub(crate) struct FakeAuthBackend {
    login_lifetime_seconds: i64,
    renew_lifetime_seconds: i64,
    rotated_refresh_token: Option<String>,
    fail_renew: bool,
    rotate_on_renew: bool,
    live_refresh_token: Mutex<String>,
    login_gate: Option<Arc<CallGate>>,
    renew_gate: Mutex<Option<Arc<CallGate>>>,
    calls: Mutex<BackendCalls>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct BackendCalls {
    pub(crate) authenticate: u32,
    pub(crate) renew: u32,
    pub(crate) dispatched: Vec<(String, VerificationPurpose)>,
}

impl Default for FakeAuthBackend {
    fn default() -> Self {
        Self {
            login_lifetime_seconds: 7200,
            renew_lifetime_seconds: 7200,
            rotated_refresh_token: None,
            fail_renew: false,
            rotate_on_renew: false,
            live_refresh_token: Mutex::new("refresh-1".to_owned()),
            login_gate: None,
            renew_gate: Mutex::default(),
            calls: Mutex::default(),
        }
    }
}

impl FakeAuthBackend {
    pub(crate) fn with_login_lifetime(mut self, seconds: i64) -> Self {
        self.login_lifetime_seconds = seconds;
        self
    }

    pub(crate) fn with_renew_lifetime(mut self, seconds: i64) -> Self {
        self.renew_lifetime_seconds = seconds;
        self
    }

    pub(crate) fn with_rotated_refresh_token(mut self, token: &str) -> Self {
        self.rotated_refresh_token = Some(token.to_owned());
        self
    }

    pub(crate) fn failing_renewals(mut self) -> Self {
        self.fail_renew = true;
        self
    }

    /// Issues a new refresh token on every renewal and rejects any token
    /// that is no longer the live one.
    pub(crate) fn rotating_refresh_tokens(mut self) -> Self {
        self.rotate_on_renew = true;
        self
    }

    pub(crate) fn with_login_gate(mut self) -> (Self, Arc<CallGate>) {
        let gate = CallGate::new();
        self.login_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Pauses the first `renew_session` call only.
    pub(crate) fn with_renew_gate(self) -> (Self, Arc<CallGate>) {
        let gate = CallGate::new();
        *lock_unpoisoned(&self.renew_gate) = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) fn calls(&self) -> BackendCalls {
        lock_unpoisoned(&self.calls).clone()
    }

    fn grant(&self, account: AccountRecord) -> AuthGrant {
        AuthGrant {
            account,
            access_token: "access-1".to_owned(),
            refresh_token: "refresh-1".to_owned(),
            expires_in_seconds: self.login_lifetime_seconds,
        }
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn authenticate(&self, credentials: &LoginCredentials) -> AppResult<AuthGrant> {
        lock_unpoisoned(&self.calls).authenticate += 1;

        if let Some(gate) = &self.login_gate {
            gate.pass().await;
        }

        if credentials.verification_code != VALID_CODE {
            return Err(AppError::AuthenticationFailure(
                "verification code mismatch".to_owned(),
            ));
        }

        let suffix: String = credentials
            .phone_number
            .chars()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Ok(self.grant(AccountRecord::new(
            format!("user_{suffix}"),
            credentials.phone_number.clone(),
        )))
    }

    async fn exchange_delegated_code(&self, code: &str) -> AppResult<AuthGrant> {
        lock_unpoisoned(&self.calls).authenticate += 1;

        if code != DELEGATED_CODE {
            return Err(AppError::Validation("unknown authorization code".to_owned()));
        }
        Ok(self.grant(AccountRecord::new("user_delegated", "13900002222")))
    }

    async fn dispatch_verification_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        if phone_number.len() != 11 {
            return Err(AppError::Validation("phone number is malformed".to_owned()));
        }
        lock_unpoisoned(&self.calls)
            .dispatched
            .push((phone_number.to_owned(), purpose));
        Ok(())
    }

    async fn renew_session(&self, refresh_token: &str) -> AppResult<SessionRenewal> {
        let renew_count = {
            let mut calls = lock_unpoisoned(&self.calls);
            calls.renew += 1;
            calls.renew
        };

        let gate = lock_unpoisoned(&self.renew_gate).take();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.fail_renew || refresh_token.is_empty() {
            return Err(AppError::AuthenticationFailure(
                "refresh token revoked".to_owned(),
            ));
        }

        let refresh_token = if self.rotate_on_renew {
            let mut live = lock_unpoisoned(&self.live_refresh_token);
            if *live != refresh_token {
                return Err(AppError::AuthenticationFailure(
                    "refresh token reused".to_owned(),
                ));
            }
            *live = format!("refresh-{}", renew_count + 1);
            Some(live.clone())
        } else {
            self.rotated_refresh_token.clone()
        };

        Ok(SessionRenewal {
            access_token: format!("access-{}", renew_count + 1),
            refresh_token,
            expires_in_seconds: self.renew_lifetime_seconds,
        })
    }
}
