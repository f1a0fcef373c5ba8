use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::types::Uuid;

use aula_common::get_current_timestamp;

use crate::campaign::Campaign;
use crate::earnings::InstructorEarnings;
use crate::enrollment::Enrollment;
use crate::instructor::{InstructorFiscalProfile, InstructorPaymentConfig};
use crate::notification::{NotificationSink, UserNotification};
use crate::refund::{Refund, RefundStatus};
use crate::sale::{ProductRef, Sale};
use crate::store::{SettlementStore, WalletCredit};
use crate::wallet::{Wallet, WalletTransaction};

#[derive(Default)]
struct MemInner {
    sales: HashMap<Uuid, Sale>,
    refunds: HashMap<Uuid, Refund>,
    earnings: HashMap<Uuid, InstructorEarnings>,
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<WalletTransaction>,
    enrollments: Vec<Enrollment>,
    campaigns: Vec<Campaign>,
    fiscal_profiles: HashMap<Uuid, InstructorFiscalProfile>,
    payment_configs: HashMap<Uuid, InstructorPaymentConfig>,
}

/// Single-mutex store. One lock per operation gives every trait method the
/// same atomicity the Postgres backend gets from its statements, which is
/// exactly what the refund flow's race guards are exercised against in tests.
#[derive(Default)]
pub struct MemorySettlementStore {
    inner: Mutex<MemInner>,
    wallet_credits_unavailable: AtomicBool,
}

impl MemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent wallet credit fail, to exercise abort paths.
    pub fn fail_wallet_credits(&self, unavailable: bool) {
        self.wallet_credits_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn insert_sale(&self, sale: Sale) {
        self.inner.lock().unwrap().sales.insert(sale.id, sale);
    }

    pub fn insert_refund(&self, refund: Refund) {
        self.inner.lock().unwrap().refunds.insert(refund.id, refund);
    }

    pub fn insert_earnings(&self, earnings: InstructorEarnings) {
        self.inner.lock().unwrap().earnings.insert(earnings.id, earnings);
    }

    pub fn insert_wallet(&self, wallet: Wallet) {
        self.inner.lock().unwrap().wallets.insert(wallet.user_id, wallet);
    }

    pub fn insert_enrollment_record(&self, enrollment: Enrollment) {
        self.inner.lock().unwrap().enrollments.push(enrollment);
    }

    pub fn insert_fiscal_profile(&self, profile: InstructorFiscalProfile) {
        self.inner.lock().unwrap().fiscal_profiles.insert(profile.user_id, profile);
    }

    pub fn insert_payment_config(&self, config: InstructorPaymentConfig) {
        self.inner.lock().unwrap().payment_configs.insert(config.instructor_id, config);
    }

    pub fn refund(&self, refund_id: Uuid) -> Option<Refund> {
        self.inner.lock().unwrap().refunds.get(&refund_id).cloned()
    }

    pub fn wallet(&self, user_id: Uuid) -> Option<Wallet> {
        self.inner.lock().unwrap().wallets.get(&user_id).cloned()
    }

    pub fn transactions(&self) -> Vec<WalletTransaction> {
        self.inner.lock().unwrap().transactions.clone()
    }

    pub fn earnings_for(&self, sale_id: Uuid, product_id: Uuid) -> Option<InstructorEarnings> {
        self.inner
            .lock()
            .unwrap()
            .earnings
            .values()
            .find(|earnings| {
                earnings.sale_id == sale_id && earnings.product.product_id == product_id
            })
            .cloned()
    }

    pub fn enrollments(&self, user_id: Uuid, course_id: Uuid) -> Vec<Enrollment> {
        self.inner
            .lock()
            .unwrap()
            .enrollments
            .iter()
            .filter(|enrollment| {
                enrollment.user_id == user_id && enrollment.course_id == course_id
            })
            .cloned()
            .collect()
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.inner.lock().unwrap().campaigns.clone()
    }
}

#[async_trait]
impl SettlementStore for MemorySettlementStore {
    async fn sale_by_id(&self, sale_id: Uuid) -> Result<Option<Sale>> {
        Ok(self.inner.lock().unwrap().sales.get(&sale_id).cloned())
    }

    async fn has_active_refund(&self, sale_id: Uuid, product: &ProductRef) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.refunds.values().any(|refund| {
            refund.sale_id == sale_id
                && refund.item.product == *product
                && refund.status.is_active()
        }))
    }

    async fn insert_refund_if_absent(&self, refund: Refund) -> Result<Option<Refund>> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.refunds.values().any(|existing| {
            existing.sale_id == refund.sale_id
                && existing.item.product == refund.item.product
                && existing.status.is_active()
        });
        if duplicate {
            return Ok(None);
        }
        inner.refunds.insert(refund.id, refund.clone());
        Ok(Some(refund))
    }

    async fn refund_by_id(&self, refund_id: Uuid) -> Result<Option<Refund>> {
        Ok(self.inner.lock().unwrap().refunds.get(&refund_id).cloned())
    }

    async fn update_refund(&self, refund: &Refund) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.refunds.get_mut(&refund.id) {
            Some(stored) => {
                *stored = refund.clone();
                Ok(())
            }
            None => bail!("[MemorySettlementStore::update_refund] refund {} not found", refund.id),
        }
    }

    async fn completed_refund_count(&self, user_id: Uuid, product: &ProductRef) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refunds
            .values()
            .filter(|refund| {
                refund.user_id == user_id
                    && refund.item.product == *product
                    && refund.status == RefundStatus::Completed
            })
            .count() as i64)
    }

    async fn earnings_for_sale_item(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<InstructorEarnings>> {
        Ok(self.earnings_for(sale_id, product_id))
    }

    async fn update_earnings(&self, earnings: &InstructorEarnings) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.earnings.get_mut(&earnings.id) {
            Some(stored) => {
                *stored = earnings.clone();
                Ok(())
            }
            None => bail!(
                "[MemorySettlementStore::update_earnings] earnings {} not found",
                earnings.id
            ),
        }
    }

    async fn credit_wallet(
        &self,
        user_id: Uuid,
        credit: WalletCredit,
    ) -> Result<WalletTransaction> {
        if self.wallet_credits_unavailable.load(Ordering::SeqCst) {
            bail!("[MemorySettlementStore::credit_wallet] wallet service unavailable");
        }

        let now = get_current_timestamp();
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner.wallets.entry(user_id).or_insert_with(|| Wallet::new(user_id));
        wallet.credit(credit.amount, now);

        let transaction = credit.into_transaction(wallet, now);
        inner.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn revoke_latest_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let latest = inner
            .enrollments
            .iter()
            .enumerate()
            .filter(|(_, enrollment)| {
                enrollment.user_id == user_id && enrollment.course_id == course_id
            })
            .max_by_key(|(_, enrollment)| (enrollment.created_at, enrollment.id));

        match latest.map(|(index, _)| index) {
            Some(index) => {
                inner.enrollments.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn create_campaign(&self, campaign: Campaign) -> Result<Option<Campaign>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.campaigns.iter().any(|existing| existing.overlaps(&campaign)) {
            return Ok(None);
        }
        inner.campaigns.push(campaign.clone());
        Ok(Some(campaign))
    }

    async fn instructor_fiscal_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<InstructorFiscalProfile>> {
        Ok(self.inner.lock().unwrap().fiscal_profiles.get(&user_id).cloned())
    }

    async fn instructor_payment_config(
        &self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorPaymentConfig>> {
        Ok(self.inner.lock().unwrap().payment_configs.get(&instructor_id).cloned())
    }
}

/// Collects dispatched notifications; can be told to fail to exercise the
/// best-effort paths.
#[derive(Default)]
pub struct MemoryNotificationSink {
    dispatched: Mutex<Vec<UserNotification>>,
    failing: AtomicBool,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn dispatched(&self) -> Vec<UserNotification> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn dispatch(&self, notification: UserNotification) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("[MemoryNotificationSink::dispatch] sink offline");
        }
        self.dispatched.lock().unwrap().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{CampaignSegment, CampaignType, DiscountValue};

    fn campaign(starts_at: i64, ends_at: i64, segment: CampaignSegment) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            name: "summer".to_string(),
            campaign_type: CampaignType::Seasonal,
            segment,
            discount: DiscountValue::Percent(10.0),
            starts_at,
            ends_at,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn overlapping_campaign_creation_is_rejected() {
        let store = MemorySettlementStore::new();
        let course = Uuid::new_v4();

        let first = campaign(100, 200, CampaignSegment::Course(course));
        assert!(store.create_campaign(first).await.unwrap().is_some());

        let overlapping = campaign(150, 250, CampaignSegment::Course(course));
        assert!(store.create_campaign(overlapping).await.unwrap().is_none());

        let later = campaign(201, 300, CampaignSegment::Course(course));
        assert!(store.create_campaign(later).await.unwrap().is_some());

        let other_segment = campaign(150, 250, CampaignSegment::Course(Uuid::new_v4()));
        assert!(store.create_campaign(other_segment).await.unwrap().is_some());

        assert_eq!(store.campaigns().len(), 3);
    }

    #[tokio::test]
    async fn revoke_deletes_only_the_newest_enrollment() {
        let store = MemorySettlementStore::new();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();

        let mut first = Enrollment::new(user, course, Uuid::new_v4());
        first.created_at = 100;
        let mut second = Enrollment::new(user, course, Uuid::new_v4());
        second.created_at = 200;
        store.insert_enrollment_record(first.clone());
        store.insert_enrollment_record(second);

        assert_eq!(store.revoke_latest_enrollment(user, course).await.unwrap(), 1);
        let remaining = store.enrollments(user, course);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);

        assert_eq!(store.revoke_latest_enrollment(user, course).await.unwrap(), 1);
        assert_eq!(store.revoke_latest_enrollment(user, course).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_active_refund_insert_returns_none() {
        use crate::sale::{ProductKind, SaleItem};

        let store = MemorySettlementStore::new();
        let sale_id = Uuid::new_v4();
        let product =
            ProductRef { product_type: ProductKind::Course, product_id: Uuid::new_v4() };
        let item = SaleItem { product, title: "Course".to_string(), price_unit: 50.0 };

        let first = Refund::requested(Uuid::new_v4(), sale_id, item.clone(), "dup".to_string());
        assert!(store.insert_refund_if_absent(first).await.unwrap().is_some());

        let second = Refund::requested(Uuid::new_v4(), sale_id, item, "dup".to_string());
        assert!(store.insert_refund_if_absent(second).await.unwrap().is_none());
    }
}
