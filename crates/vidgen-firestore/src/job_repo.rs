//! Repository for video job documents under `users/{uid}/videos`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::info;

use vidgen_models::{Job, JobId, VideoVariant};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Final media written onto a job when its render succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalMedia {
    pub video_url: String,
    pub storage_key: String,
    pub file_size: u64,
    pub duration: f64,
}

/// Repository for one user's video jobs.
pub struct JobRepository {
    client: FirestoreClient,
    user_id: String,
}

impl JobRepository {
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    fn collection(&self) -> String {
        format!("users/{}/videos", self.user_id)
    }

    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self
            .client
            .get_document(&self.collection(), job_id.as_str())
            .await?;

        doc.map(|d| document_to_job(&d, job_id, &self.user_id))
            .transpose()
    }

    /// Persist a placeholder record.
    pub async fn create_placeholder(&self, job: &Job) -> FirestoreResult<()> {
        let collection = self.collection();
        self.client
            .with_retry("create_job", || {
                self.client
                    .create_document(&collection, job.id.as_str(), job_to_fields(job))
            })
            .await?;

        counter!("vidgen_job_records_created_total", "variant" => job.variant.as_str())
            .increment(1);
        info!(job_id = %job.id, user_id = %self.user_id, "Created placeholder job record");
        Ok(())
    }

    /// Fill in the final media of a placeholder. This is the only update a
    /// job record ever receives.
    pub async fn finalize(&self, job_id: &JobId, media: &FinalMedia) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("video_url".to_string(), media.video_url.to_firestore_value());
        fields.insert(
            "storage_key".to_string(),
            media.storage_key.to_firestore_value(),
        );
        fields.insert("file_size".to_string(), media.file_size.to_firestore_value());
        fields.insert("duration".to_string(), media.duration.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        let mask: Vec<String> = fields.keys().cloned().collect();

        let collection = self.collection();
        self.client
            .with_retry("finalize_job", || {
                self.client.update_document(
                    &collection,
                    job_id.as_str(),
                    fields.clone(),
                    Some(mask.clone()),
                    None,
                )
            })
            .await?;

        info!(job_id = %job_id, size = media.file_size, "Finalized job record");
        Ok(())
    }

    /// Remove a job record. Idempotent.
    pub async fn delete(&self, job_id: &JobId) -> FirestoreResult<()> {
        let collection = self.collection();
        self.client
            .with_retry("delete_job", || {
                self.client.delete_document(&collection, job_id.as_str())
            })
            .await?;
        info!(job_id = %job_id, "Deleted job record");
        Ok(())
    }
}

fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("video_id".to_string(), job.id.as_str().to_firestore_value());
    fields.insert("user_id".to_string(), job.user_id.to_firestore_value());
    fields.insert("variant".to_string(), job.variant.as_str().to_firestore_value());
    fields.insert("title".to_string(), job.title.to_firestore_value());
    fields.insert("description".to_string(), job.description.to_firestore_value());
    fields.insert("metadata".to_string(), job.metadata.to_firestore_value());
    fields.insert("video_url".to_string(), job.video_url.to_firestore_value());
    fields.insert("storage_key".to_string(), job.storage_key.to_firestore_value());
    fields.insert("file_size".to_string(), job.file_size.to_firestore_value());
    fields.insert("duration".to_string(), job.duration.to_firestore_value());
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields
}

fn document_to_job(doc: &Document, job_id: &JobId, user_id: &str) -> FirestoreResult<Job> {
    let variant = match doc.field::<String>("variant").as_deref() {
        Some("narration") => VideoVariant::Narration,
        Some("quiz") => VideoVariant::Quiz,
        other => {
            return Err(FirestoreError::invalid_document(format!(
                "job {job_id} has unknown variant {other:?}"
            )))
        }
    };

    Ok(Job {
        id: job_id.clone(),
        user_id: doc.field("user_id").unwrap_or_else(|| user_id.to_string()),
        variant,
        title: doc.field("title").unwrap_or_default(),
        description: doc.field("description"),
        metadata: doc
            .field::<serde_json::Value>("metadata")
            .unwrap_or(serde_json::Value::Null),
        video_url: doc.field("video_url"),
        storage_key: doc.field("storage_key"),
        file_size: doc.field("file_size").unwrap_or(0),
        duration: doc.field("duration").unwrap_or(0.0),
        created_at: doc
            .field::<DateTime<Utc>>("created_at")
            .unwrap_or_else(Utc::now),
    })
}
