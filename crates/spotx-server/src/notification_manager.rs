use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spotx_common::types::{PushMessage, User};
use spotx_common::Error as DomainError;
use spotx_db::queries::{NotificationQueries, UserQueries};
use spotx_db::{Database, NewNotification};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PushConfig;
use crate::error::{Result, ServiceError};

/// Expo accepts at most this many messages per request
const MAX_BATCH: usize = 100;

/// Admin push request: one user when `user_id` is set, else everyone with a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub struct NotificationManager {
    db: Arc<Database>,
    sender: mpsc::UnboundedSender<Vec<PushMessage>>,
}

impl NotificationManager {
    pub fn new(db: Arc<Database>, config: PushConfig) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<PushMessage>>();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Push(e.to_string()))?;

        // Delivery runs off the request path
        tokio::spawn(async move {
            while let Some(messages) = receiver.recv().await {
                if !config.enabled {
                    debug!("Push disabled, dropping {} messages", messages.len());
                    continue;
                }
                for chunk in messages.chunks(MAX_BATCH) {
                    if let Err(e) = Self::deliver(&client, &config.endpoint, chunk).await {
                        warn!("Failed to deliver push batch: {}", e);
                    }
                }
            }
        });

        Ok(Self { db, sender })
    }

    async fn deliver(
        client: &reqwest::Client,
        endpoint: &str,
        messages: &[PushMessage],
    ) -> Result<()> {
        client
            .post(endpoint)
            .json(messages)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ServiceError::Push(e.to_string()))?;

        info!("Delivered {} push messages", messages.len());
        Ok(())
    }

    /// Log and queue a push for each user holding a token. Returns how many were queued.
    pub async fn notify_users(
        &self,
        users: &[User],
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> Result<usize> {
        let mut messages = Vec::new();

        for user in users {
            let Some(token) = user.push_token.as_deref() else {
                debug!("User {} has no push token, skipping", user.id);
                continue;
            };

            NotificationQueries::log(
                &self.db,
                NewNotification {
                    user_id: Some(user.id.to_string()),
                    title: title.to_string(),
                    body: body.to_string(),
                    data: Some(data.to_string()),
                },
            )
            .await?;

            messages.push(PushMessage {
                to: token.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                data: data.clone(),
            });
        }

        let queued = messages.len();
        if queued > 0 {
            self.sender
                .send(messages)
                .map_err(|e| ServiceError::Push(format!("Failed to queue notification: {}", e)))?;
        }
        Ok(queued)
    }

    pub async fn dispatch(&self, request: PushRequest) -> Result<usize> {
        if request.title.trim().is_empty() || request.body.trim().is_empty() {
            return Err(DomainError::Validation("Title and body are required".to_string()).into());
        }

        let recipients = match request.user_id {
            Some(id) => vec![UserQueries::get_by_id(&self.db, &id.to_string())
                .await
                .map_err(|e| ServiceError::from(e).normalize())?],
            None => UserQueries::list_with_push_tokens(&self.db).await?,
        };

        let queued =
            self.notify_users(&recipients, &request.title, &request.body, request.data).await?;
        info!("Admin push '{}' queued for {} recipients", request.title, queued);
        Ok(queued)
    }
}
