//! Device code authentication against the Microsoft identity platform.
//!
//! The OAuth flow itself is handled by `yup-oauth2`; this module points it at
//! the Microsoft endpoints, forwards the device code challenge to a caller
//! supplied handler and persists tokens between runs.

use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use yup_oauth2::authenticator_delegate::{DeviceAuthResponse, DeviceFlowDelegate};
use yup_oauth2::{ApplicationSecret, DeviceFlowAuthenticator};

use crate::config::GraphSettings;
use crate::error::GraphError;

const AUTHORITY: &str = "https://login.microsoftonline.com";
const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// The device code challenge shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub verification_uri: String,
    pub message: String,
}

impl DeviceCodeInfo {
    pub fn new(user_code: impl Into<String>, verification_uri: impl Into<String>) -> Self {
        let user_code = user_code.into();
        let verification_uri = verification_uri.into();
        let message = format!(
            "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
            verification_uri, user_code
        );
        Self {
            user_code,
            verification_uri,
            message,
        }
    }
}

/// Handler invoked once per device code challenge. Its return value is ignored.
pub type DeviceCodePrompt = Arc<dyn Fn(&DeviceCodeInfo) + Send + Sync>;

/// Source of bearer tokens for Graph requests
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn access_token(&self) -> Result<String, GraphError>;
}

/// Identity platform endpoints for a tenant (`common`, `organizations` or a tenant id)
pub fn endpoints(tenant_id: &str) -> (String, String, String) {
    let base = format!("{}/{}/oauth2/v2.0", AUTHORITY, tenant_id);
    (
        format!("{}/authorize", base),
        format!("{}/token", base),
        format!("{}/devicecode", base),
    )
}

struct PromptDelegate {
    prompt: DeviceCodePrompt,
}

impl DeviceFlowDelegate for PromptDelegate {
    fn present_user_code<'a>(
        &'a self,
        device_auth_resp: &'a DeviceAuthResponse,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        let info = DeviceCodeInfo::new(
            device_auth_resp.user_code.clone(),
            device_auth_resp.verification_uri.clone(),
        );
        (self.prompt)(&info);
        Box::pin(async {})
    }
}

type TokenFuture = Pin<Box<dyn Future<Output = Result<String, GraphError>> + Send>>;

/// Device code credential with an on-disk token cache.
///
/// The interactive challenge only happens when no cached or refreshable token
/// exists for the requested scopes.
pub struct DeviceCodeCredential {
    fetch: Box<dyn Fn() -> TokenFuture + Send + Sync>,
}

impl DeviceCodeCredential {
    pub async fn new(settings: &GraphSettings, prompt: DeviceCodePrompt) -> Result<Self, GraphError> {
        let (auth_uri, token_uri, device_code_uri) = endpoints(&settings.tenant_id);
        let secret = ApplicationSecret {
            client_id: settings.client_id.clone(),
            auth_uri,
            token_uri,
            ..Default::default()
        };

        let cache_path = PathBuf::from(&settings.token_cache_path);
        let authenticator = DeviceFlowAuthenticator::builder(secret)
            .device_code_url(device_code_uri)
            .grant_type(DEVICE_CODE_GRANT_TYPE)
            .flow_delegate(Box::new(PromptDelegate { prompt }))
            .persist_tokens_to_disk(cache_path)
            .build()
            .await
            .map_err(GraphError::AuthSetup)?;

        tracing::debug!(
            "Device code credential ready (tenant: {}, token cache: {})",
            settings.tenant_id,
            settings.token_cache_path
        );

        let authenticator = Arc::new(authenticator);
        let scopes = Arc::new(settings.scopes.clone());
        let fetch = move || -> TokenFuture {
            let authenticator = authenticator.clone();
            let scopes = scopes.clone();
            Box::pin(async move {
                let token = authenticator.token(scopes.as_slice()).await?;
                token
                    .token()
                    .map(str::to_string)
                    .ok_or(GraphError::MissingToken)
            })
        };

        Ok(Self {
            fetch: Box::new(fetch),
        })
    }
}

#[async_trait]
impl TokenCredential for DeviceCodeCredential {
    async fn access_token(&self) -> Result<String, GraphError> {
        (self.fetch)().await
    }
}

/// A fixed bearer token, e.g. one issued by another tool
pub struct StaticTokenCredential(String);

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        StaticTokenCredential(token.into())
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn access_token(&self) -> Result<String, GraphError> {
        Ok(self.0.clone())
    }
}
