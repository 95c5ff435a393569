// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Submissions awaiting server acknowledgement.
//!
//! Every send becomes an entry that moves `Pending -> Confirmed | Failed`.
//! A failed entry keeps its draft so the user can take it back and retry;
//! nothing is appended to the thread until the server confirms.

use chrono::{DateTime, Utc};
use molarisse_core::{MediaKind, MediaUpload, MessageId, MolarisseError, PartnerId};
use uuid::Uuid;

/// What the user asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    Text {
        content: String,
    },
    Image {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
        caption: String,
    },
    Voice {
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        Draft::Text {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Draft::Text { .. } => MediaKind::None,
            Draft::Image { .. } => MediaKind::Image,
            Draft::Voice { .. } => MediaKind::Voice,
        }
    }

    /// Text body, or the caption of an image.
    pub fn content(&self) -> &str {
        match self {
            Draft::Text { content } => content,
            Draft::Image { caption, .. } => caption,
            Draft::Voice { .. } => "",
        }
    }

    /// Reject empty submissions before anything touches the network.
    pub fn validate(&self) -> Result<(), MolarisseError> {
        match self {
            Draft::Text { content } if content.trim().is_empty() => Err(
                MolarisseError::Precondition("message has no content".to_string()),
            ),
            Draft::Image { bytes, .. } | Draft::Voice { bytes, .. } if bytes.is_empty() => Err(
                MolarisseError::Precondition("media attachment is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// The multipart form for a media draft; `None` for text.
    pub fn to_upload(&self, recipient: PartnerId) -> Option<MediaUpload> {
        match self {
            Draft::Text { .. } => None,
            Draft::Image {
                file_name,
                mime_type,
                bytes,
                caption,
            } => Some(MediaUpload {
                recipient,
                content: caption.trim().to_string(),
                kind: MediaKind::Image,
                file_name: if file_name.trim().is_empty() {
                    "image".to_string()
                } else {
                    file_name.clone()
                },
                mime_type: mime_type.clone(),
                bytes: bytes.clone(),
            }),
            Draft::Voice { mime_type, bytes } => Some(MediaUpload {
                recipient,
                content: String::new(),
                kind: MediaKind::Voice,
                file_name: voice_file_name(mime_type).to_string(),
                mime_type: mime_type.clone(),
                bytes: bytes.clone(),
            }),
        }
    }
}

/// Recorder blobs are webm unless the browser produced mp3.
pub fn voice_file_name(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("mp3") || mime.contains("mpeg") {
        "voice-message.mp3"
    } else {
        "voice-message.webm"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxState {
    Pending,
    /// The server id, when the acknowledgement carried one.
    Confirmed(Option<MessageId>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub local_id: Uuid,
    pub partner: PartnerId,
    pub draft: Draft,
    pub state: OutboxState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
}

impl Outbox {
    pub fn enqueue(&mut self, partner: PartnerId, draft: Draft) -> Uuid {
        let local_id = Uuid::new_v4();
        self.entries.push(OutboxEntry {
            local_id,
            partner,
            draft,
            state: OutboxState::Pending,
            created_at: Utc::now(),
        });
        local_id
    }

    pub fn confirm(&mut self, local_id: Uuid, id: Option<MessageId>) -> bool {
        self.settle(local_id, OutboxState::Confirmed(id))
    }

    pub fn fail(&mut self, local_id: Uuid, reason: impl Into<String>) -> bool {
        self.settle(local_id, OutboxState::Failed(reason.into()))
    }

    fn settle(&mut self, local_id: Uuid, state: OutboxState) -> bool {
        match self.entries.iter_mut().find(|e| e.local_id == local_id) {
            Some(entry) if entry.state == OutboxState::Pending => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, local_id: Uuid) -> Option<&OutboxEntry> {
        self.entries.iter().find(|e| e.local_id == local_id)
    }

    /// Remove a failed entry and hand its draft back.
    pub fn take_failed(&mut self, local_id: Uuid) -> Option<Draft> {
        let pos = self.entries.iter().position(|e| {
            e.local_id == local_id && matches!(e.state, OutboxState::Failed(_))
        })?;
        Some(self.entries.remove(pos).draft)
    }

    pub fn pending(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == OutboxState::Pending)
    }

    pub fn failed(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, OutboxState::Failed(_)))
    }

    pub fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    /// Confirmed entries carry nothing the thread does not.
    pub fn prune_confirmed(&mut self) {
        self.entries
            .retain(|e| !matches!(e.state, OutboxState::Confirmed(_)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_and_empty_media_are_rejected() {
        assert!(matches!(
            Draft::text("   ").validate(),
            Err(MolarisseError::Precondition(_))
        ));
        let empty_voice = Draft::Voice {
            mime_type: "audio/webm".into(),
            bytes: Vec::new(),
        };
        assert!(empty_voice.validate().is_err());
        assert!(Draft::text("bonjour").validate().is_ok());
    }

    #[test]
    fn voice_names_follow_mime() {
        assert_eq!(voice_file_name("audio/webm;codecs=opus"), "voice-message.webm");
        assert_eq!(voice_file_name("audio/mpeg"), "voice-message.mp3");
        assert_eq!(voice_file_name("audio/mp3"), "voice-message.mp3");
    }

    #[test]
    fn uploads_carry_kind_and_caption() {
        let draft = Draft::Image {
            file_name: String::new(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
            caption: "  radio  ".into(),
        };
        let upload = draft.to_upload(PartnerId(4)).expect("image upload");
        assert_eq!(upload.kind, MediaKind::Image);
        assert_eq!(upload.file_name, "image");
        assert_eq!(upload.content, "radio");
        assert!(Draft::text("x").to_upload(PartnerId(4)).is_none());
    }

    #[test]
    fn lifecycle_settles_once() {
        let mut outbox = Outbox::default();
        let id = outbox.enqueue(PartnerId(1), Draft::text("hello"));
        assert_eq!(outbox.pending().count(), 1);

        assert!(outbox.fail(id, "offline"));
        assert!(!outbox.confirm(id, Some(MessageId(9))), "failed entries stay failed");
        assert_eq!(outbox.failed().count(), 1);

        assert_eq!(outbox.take_failed(id), Some(Draft::text("hello")));
        assert!(outbox.get(id).is_none());
        assert_eq!(outbox.take_failed(id), None);
    }

    #[test]
    fn confirmed_entries_are_pruned() {
        let mut outbox = Outbox::default();
        let a = outbox.enqueue(PartnerId(1), Draft::text("a"));
        let b = outbox.enqueue(PartnerId(1), Draft::text("b"));
        outbox.confirm(a, Some(MessageId(1)));
        outbox.fail(b, "500");
        outbox.prune_confirmed();
        assert_eq!(outbox.entries().len(), 1);
        assert_eq!(outbox.entries()[0].local_id, b);
    }
}
