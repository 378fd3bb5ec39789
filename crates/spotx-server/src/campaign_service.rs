use std::sync::Arc;

use chrono::NaiveDate;
use spotx_common::types::{
    Campaign, CampaignInput, CampaignStats, CampaignStatus, Merchant, MerchantStatus,
    NewMerchantRequest,
};
use spotx_common::Error as DomainError;
use spotx_db::queries::{CampaignQueries, CampaignStatsQueries, MerchantQueries};
use spotx_db::{Database, NewCampaign, NewMerchant};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ServiceError};

/// Merchant registration and campaign lifecycle
pub struct CampaignService {
    db: Arc<Database>,
}

impl CampaignService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn register_merchant(&self, request: NewMerchantRequest) -> Result<Merchant> {
        request.validate()?;
        let merchant = MerchantQueries::create(&self.db, NewMerchant::from_request(request)).await?;
        info!("Merchant {} registered, awaiting approval", merchant.id);
        Ok(merchant)
    }

    pub async fn merchant(&self, id: Uuid) -> Result<Merchant> {
        MerchantQueries::get_by_id(&self.db, &id.to_string())
            .await
            .map_err(|e| ServiceError::from(e).normalize())
    }

    pub async fn set_merchant_status(&self, id: Uuid, status: MerchantStatus) -> Result<Merchant> {
        MerchantQueries::update_status(&self.db, &id.to_string(), status)
            .await
            .map_err(|e| ServiceError::from(e).normalize())?;
        info!("Merchant {} is now {}", id, status.as_str());
        self.merchant(id).await
    }

    pub async fn campaign(&self, id: Uuid) -> Result<Campaign> {
        CampaignQueries::get_by_id(&self.db, &id.to_string())
            .await
            .map_err(|e| ServiceError::from(e).normalize())
    }

    pub async fn list_campaigns(&self, merchant_id: Option<Uuid>) -> Result<Vec<Campaign>> {
        let campaigns = match merchant_id {
            Some(id) => CampaignQueries::list_by_merchant(&self.db, &id.to_string()).await?,
            None => CampaignQueries::list_all(&self.db).await?,
        };
        Ok(campaigns)
    }

    /// New campaigns start as drafts. Only approved merchants may create them.
    pub async fn create_campaign(
        &self,
        merchant_id: Uuid,
        input: CampaignInput,
    ) -> Result<Campaign> {
        input.validate()?;

        let merchant = self.merchant(merchant_id).await?;
        if merchant.status != MerchantStatus::Approved {
            return Err(ServiceError::Forbidden(format!(
                "Merchant {} is {} and cannot create campaigns",
                merchant.id,
                merchant.status.as_str()
            )));
        }

        let campaign =
            CampaignQueries::create(&self.db, NewCampaign::new(merchant_id, input)).await?;
        info!("Campaign {} created for merchant {}", campaign.id, merchant_id);
        Ok(campaign)
    }

    pub async fn update_campaign(&self, id: Uuid, input: CampaignInput) -> Result<Campaign> {
        input.validate()?;

        let current = self.campaign(id).await?;
        if current.status.is_terminal() {
            return Err(DomainError::InvalidState(format!(
                "Campaign {} is {} and can no longer be edited",
                id, current.status
            ))
            .into());
        }
        if input.budget_cents < current.spent_cents {
            return Err(DomainError::Validation(format!(
                "Budget {} is below the {} already spent",
                input.budget_cents, current.spent_cents
            ))
            .into());
        }

        Ok(CampaignQueries::update_details(&self.db, &id.to_string(), &input).await?)
    }

    pub async fn set_campaign_status(&self, id: Uuid, next: CampaignStatus) -> Result<Campaign> {
        let current = self.campaign(id).await?;
        let status = current.status.transition(next)?;

        CampaignQueries::update_status(&self.db, &id.to_string(), status).await?;
        info!("Campaign {} moved from {} to {}", id, current.status, status);
        self.campaign(id).await
    }

    pub async fn delete_campaign(&self, id: Uuid) -> Result<()> {
        let current = self.campaign(id).await?;
        if current.status != CampaignStatus::Draft {
            return Err(DomainError::InvalidState(format!(
                "Campaign {} is {} and cannot be deleted",
                id, current.status
            ))
            .into());
        }

        CampaignQueries::delete_draft(&self.db, &id.to_string()).await?;
        info!("Draft campaign {} deleted", id);
        Ok(())
    }

    /// Daily stats rows between two dates, inclusive, newest first
    pub async fn stats(
        &self,
        id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CampaignStats>> {
        self.campaign(id).await?;
        Ok(CampaignStatsQueries::list_for_campaign(&self.db, &id.to_string(), from, to).await?)
    }
}
