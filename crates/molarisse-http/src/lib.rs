// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST transport for the Molarisse clinic server.
//!
//! This crate implements [`MessagingTransport`] over reqwest. JSON calls
//! carry the bearer token as a header; media URLs (built elsewhere) carry it
//! as a query parameter.

pub mod client;
pub mod types;

use async_trait::async_trait;
use molarisse_config::MolarisseConfig;
use molarisse_core::error::MolarisseError;
use molarisse_core::traits::{MessagingTransport, PluginAdapter};
use molarisse_core::types::{HealthStatus, MediaUpload, MessageId, PartnerId};
use molarisse_core::wire::{
    RawTimestamp, WireConversation, WireMessage, WirePartnerInfo, WireUserInfo,
};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::client::ClinicClient;
use crate::types::{BatchReadBody, EditMessageBody, MessageDateResponse, SendMessageBody};

/// Clinic REST API transport implementing [`MessagingTransport`].
pub struct HttpTransport {
    client: ClinicClient,
}

impl HttpTransport {
    pub fn new(config: &MolarisseConfig) -> Result<Self, MolarisseError> {
        let client = ClinicClient::from_config(config)?;
        info!(
            origin = client.origin(),
            authenticated = config.api.auth_token.is_some(),
            "HTTP transport initialized"
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl PluginAdapter for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn health_check(&self) -> Result<HealthStatus, MolarisseError> {
        match self.unread_count().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(MolarisseError::Status { status, message }) if status == 401 || status == 403 => {
                Ok(HealthStatus::Degraded(format!("not authorized: {message}")))
            }
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MolarisseError> {
        debug!(origin = self.client.origin(), "HTTP transport shut down");
        Ok(())
    }
}

#[async_trait]
impl MessagingTransport for HttpTransport {
    async fn list_conversations(&self) -> Result<Vec<WireConversation>, MolarisseError> {
        self.client
            .send_json(self.client.request(Method::GET, "/messages/conversations"))
            .await
    }

    async fn list_messages(&self, partner: PartnerId) -> Result<Vec<WireMessage>, MolarisseError> {
        self.client
            .send_json(
                self.client
                    .request(Method::GET, &format!("/messages/conversations/{partner}")),
            )
            .await
    }

    async fn message_original_date(
        &self,
        id: MessageId,
    ) -> Result<Option<RawTimestamp>, MolarisseError> {
        let response: MessageDateResponse = self
            .client
            .send_json(self.client.request(Method::GET, &format!("/messages/{id}/date")))
            .await?;
        Ok(response.into_timestamp())
    }

    async fn send_message(
        &self,
        recipient: PartnerId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError> {
        let body = SendMessageBody {
            recipient_id: recipient.0,
            content,
        };
        self.client
            .send_json(self.client.request(Method::POST, "/messages").json(&body))
            .await
    }

    async fn send_media_message(&self, upload: MediaUpload) -> Result<WireMessage, MolarisseError> {
        debug!(
            recipient = %upload.recipient,
            kind = %upload.kind,
            bytes = upload.bytes.len(),
            "uploading media message"
        );
        let media = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| MolarisseError::Transport {
                message: format!("invalid media type {:?}: {e}", upload.mime_type),
                source: Some(Box::new(e)),
            })?;
        let form = Form::new()
            .text("recipientId", upload.recipient.to_string())
            .text("content", upload.content)
            .text("mediaType", upload.kind.to_string())
            .part("media", media);
        self.client
            .send_json(
                self.client
                    .request(Method::POST, "/messages/with-media")
                    .multipart(form),
            )
            .await
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), MolarisseError> {
        let request = match ids {
            [] => return Ok(()),
            [id] => self.client.request(Method::PUT, &format!("/messages/{id}/read")),
            many => self
                .client
                .request(Method::PUT, "/messages/batch/read")
                .json(&BatchReadBody {
                    message_ids: many.iter().map(|id| id.0).collect(),
                }),
        };
        self.client.send_empty(request).await
    }

    async fn mark_conversation_read(&self, partner: PartnerId) -> Result<(), MolarisseError> {
        self.client
            .send_empty(
                self.client
                    .request(Method::PUT, &format!("/messages/conversations/{partner}/read")),
            )
            .await
    }

    async fn unread_count(&self) -> Result<u64, MolarisseError> {
        let count: i64 = self
            .client
            .send_json(self.client.request(Method::GET, "/messages/unread/count"))
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<WireMessage, MolarisseError> {
        self.client
            .send_json(
                self.client
                    .request(Method::PUT, &format!("/messages/{id}"))
                    .json(&EditMessageBody { content }),
            )
            .await
    }

    async fn delete_message(&self, id: MessageId) -> Result<(), MolarisseError> {
        self.client
            .send_empty(self.client.request(Method::DELETE, &format!("/messages/{id}")))
            .await
    }

    async fn partner_info(&self, partner: PartnerId) -> Result<WirePartnerInfo, MolarisseError> {
        self.client
            .send_json(
                self.client
                    .request(Method::GET, &format!("/users/{partner}/profile")),
            )
            .await
    }

    async fn user_info(&self, user: PartnerId) -> Result<WireUserInfo, MolarisseError> {
        self.client
            .send_json(self.client.request(Method::GET, &format!("/users/{user}")))
            .await
    }
}
