use std::collections::BTreeSet;
use std::sync::Arc;

use spotx_common::slot_calendar::slot_by_id;
use spotx_common::types::{NewUserRequest, User};
use spotx_db::queries::UserQueries;
use spotx_db::{Database, NewUser};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServiceError};

pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn register(&self, request: NewUserRequest) -> Result<User> {
        request.validate()?;
        let user = UserQueries::create(&self.db, NewUser::from_request(request)).await?;
        info!("User {} registered", user.id);
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        UserQueries::get_by_id(&self.db, &id.to_string())
            .await
            .map_err(|e| ServiceError::from(e).normalize())
    }

    /// Store the slots a user wants reminders for. Duplicates collapse, order is by slot id.
    pub async fn set_preferred_slots(&self, id: Uuid, slots: &[u8]) -> Result<User> {
        let unique: BTreeSet<u8> = slots.iter().copied().collect();
        for slot_id in &unique {
            slot_by_id(*slot_id)?;
        }
        let slots: Vec<u8> = unique.into_iter().collect();

        UserQueries::update_preferred_slots(&self.db, &id.to_string(), &slots)
            .await
            .map_err(|e| ServiceError::from(e).normalize())?;
        debug!("User {} prefers slots {:?}", id, slots);
        self.get(id).await
    }

    pub async fn set_push_token(&self, id: Uuid, token: Option<&str>) -> Result<User> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        UserQueries::update_push_token(&self.db, &id.to_string(), token)
            .await
            .map_err(|e| ServiceError::from(e).normalize())?;
        self.get(id).await
    }
}
