//! HTTP + websocket bridge to the messaging account.
//!
//! Login exchanges the cookie records for a session token. Every later call
//! carries that token; the bridge answers 401/410 once the underlying account
//! session is gone, which surfaces as [`TransportError::Disconnected`].
//!
//! [`TransportError::Disconnected`]: crate::error::TransportError::Disconnected

pub mod events;
pub mod http_client;
pub mod types;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use url::Url;

pub use http_client::BridgeHttpClient;

use crate::session::Credentials;
use crate::transport::{MessagingSession, SessionConnector, SessionEvent, ThreadSnapshot};

pub struct BridgeConnector {
    http: BridgeHttpClient,
}

impl BridgeConnector {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: BridgeHttpClient::new(base_url),
        }
    }
}

impl SessionConnector for BridgeConnector {
    fn name(&self) -> &str {
        "bridge"
    }

    fn login<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn MessagingSession>>> + Send + 'a>> {
        Box::pin(async move {
            let login = self.http.login(credentials).await?;
            tracing::info!(user_id = %login.user_id, "bridge login accepted");
            let session: Arc<dyn MessagingSession> = Arc::new(BridgeSession {
                http: self.http.clone(),
                user_id: login.user_id,
                token: login.session_token,
            });
            Ok(session)
        })
    }
}

pub struct BridgeSession {
    http: BridgeHttpClient,
    user_id: String,
    token: String,
}

impl MessagingSession for BridgeSession {
    fn own_user_id(&self) -> &str {
        &self.user_id
    }

    fn thread_snapshot<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ThreadSnapshot>> + Send + 'a>> {
        Box::pin(async move {
            let info = self.http.thread(&self.token, thread_id).await?;
            Ok(info.into())
        })
    }

    fn set_title<'a>(
        &'a self,
        thread_id: &'a str,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.http.set_title(&self.token, thread_id, title))
    }

    fn set_nickname<'a>(
        &'a self,
        thread_id: &'a str,
        member_id: &'a str,
        nickname: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(
            self.http
                .set_nickname(&self.token, thread_id, member_id, nickname),
        )
    }

    fn send_presence<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.http.send_typing(&self.token, thread_id))
    }

    fn export_credentials<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials>> + Send + 'a>> {
        Box::pin(self.http.credentials(&self.token))
    }

    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<SessionEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let url = events::build_events_url(self.http.base_url(), &self.token)?;
            events::stream_events(&url, &tx).await
        })
    }
}
