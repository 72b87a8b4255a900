//! Request intake: query validation, sentinel handling and attachment
//! persistence.

use crate::services::storage::{Upload, UploadDir};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Literal the web client sends for a file input it left empty on purpose.
pub const NO_ATTACHMENT_SENTINEL: &str = "no_image_data";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No query provided")]
    MissingQuery,

    #[error("Failed to save {role} attachment to {}: {source}", .path.display())]
    SaveFailed {
        role: AttachmentRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validated, non-empty symptom query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: Option<String>) -> Result<Self, IngestError> {
        match raw {
            Some(q) if !q.is_empty() => Ok(Self(q)),
            _ => Err(IngestError::MissingQuery),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentRole {
    Pdf,
    Xray,
    EyeImage,
}

impl AttachmentRole {
    pub const ALL: [AttachmentRole; 3] = [
        AttachmentRole::Pdf,
        AttachmentRole::Xray,
        AttachmentRole::EyeImage,
    ];

    /// Multipart form field carrying this attachment.
    pub fn field_name(self) -> &'static str {
        match self {
            AttachmentRole::Pdf => "pdf",
            AttachmentRole::Xray => "xray",
            AttachmentRole::EyeImage => "eyeImage",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.field_name() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentRole::Pdf => "pdf",
            AttachmentRole::Xray => "xray",
            AttachmentRole::EyeImage => "eye_image",
        }
    }
}

impl fmt::Display for AttachmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A form field as it arrived, before presence is decided.
pub enum RawField {
    Text(String),
    File(Box<dyn Upload>),
}

/// Whether an attachment slot holds a real upload.
pub enum Presence {
    /// The field was not sent, or sent empty.
    NotProvided,
    /// The field carried the "no attachment" sentinel.
    ExplicitlyAbsent,
    Provided(Box<dyn Upload>),
}

impl Presence {
    /// Decide presence for one raw field. Non-sentinel text in a file slot
    /// carries no file and counts as not provided.
    pub fn from_raw(field: Option<RawField>) -> Self {
        match field {
            None => Presence::NotProvided,
            Some(RawField::Text(text)) if text == NO_ATTACHMENT_SENTINEL => {
                Presence::ExplicitlyAbsent
            }
            Some(RawField::Text(_)) => Presence::NotProvided,
            Some(RawField::File(upload)) => {
                if upload.filename().is_empty() && upload.bytes() == NO_ATTACHMENT_SENTINEL.as_bytes()
                {
                    Presence::ExplicitlyAbsent
                } else if upload.filename().is_empty() && upload.bytes().is_empty() {
                    Presence::NotProvided
                } else {
                    Presence::Provided(upload)
                }
            }
        }
    }
}

/// Attachment written to the upload directory.
#[derive(Debug, Clone)]
pub struct SavedAttachment {
    pub role: AttachmentRole,
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Everything the rest of the pipeline needs from one request.
#[derive(Debug)]
pub struct IngestedRequest {
    pub query: Query,
    pub attachments: Vec<SavedAttachment>,
}

impl IngestedRequest {
    pub fn attachment(&self, role: AttachmentRole) -> Option<&SavedAttachment> {
        self.attachments.iter().find(|a| a.role == role)
    }
}

/// Raw form contents handed over by the HTTP layer.
#[derive(Default)]
pub struct RawSubmission {
    pub query: Option<String>,
    pub fields: Vec<(AttachmentRole, RawField)>,
}

impl RawSubmission {
    pub fn query_only(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, role: AttachmentRole, field: RawField) -> Self {
        self.fields.push((role, field));
        self
    }

    /// Split into the query and one presence decision per role. A role sent
    /// more than once keeps its last value.
    fn into_parts(self) -> (Option<String>, Vec<(AttachmentRole, Presence)>) {
        let mut slots: Vec<(AttachmentRole, Option<RawField>)> =
            AttachmentRole::ALL.into_iter().map(|r| (r, None)).collect();

        for (role, field) in self.fields {
            if let Some(slot) = slots.iter_mut().find(|(r, _)| *r == role) {
                slot.1 = Some(field);
            }
        }

        let presences = slots
            .into_iter()
            .map(|(role, field)| (role, Presence::from_raw(field)))
            .collect();

        (self.query, presences)
    }
}

/// Validates the query and persists provided attachments.
#[derive(Debug, Clone)]
pub struct AttachmentIngestor {
    uploads: UploadDir,
}

impl AttachmentIngestor {
    pub fn new(uploads: UploadDir) -> Self {
        Self { uploads }
    }

    /// Nothing is written unless the query is valid.
    pub async fn ingest(&self, submission: RawSubmission) -> Result<IngestedRequest, IngestError> {
        let (raw_query, presences) = submission.into_parts();
        let query = Query::parse(raw_query)?;

        tracing::info!(query_len = query.as_str().len(), "Query accepted");

        let mut attachments = Vec::new();
        for (role, presence) in presences {
            let upload = match presence {
                Presence::Provided(upload) => upload,
                Presence::ExplicitlyAbsent => {
                    tracing::debug!(role = %role, "Attachment explicitly absent");
                    continue;
                }
                Presence::NotProvided => continue,
            };

            let path = self.uploads.path_for(upload.filename(), role.as_str());
            upload.save(&path).await.map_err(|source| {
                tracing::error!(role = %role, path = %path.display(), error = %source, "Failed to save attachment");
                IngestError::SaveFailed {
                    role,
                    path: path.clone(),
                    source,
                }
            })?;

            tracing::info!(
                role = %role,
                path = %path.display(),
                size = upload.bytes().len(),
                "Attachment saved"
            );

            attachments.push(SavedAttachment {
                role,
                filename: upload.filename().to_string(),
                path,
                bytes: upload.bytes().to_vec(),
            });
        }

        Ok(IngestedRequest { query, attachments })
    }
}
