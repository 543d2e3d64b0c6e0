//! Referral Engine: a bounded iterative walk up the `referrer_id` chain
//! (a recursive query would do the same walk, but the fixed depth makes
//! the iterative form a simpler contract) and a flat per-level reward
//! fan-out.

use chrono::{DateTime, Utc};
use core_notify::NotificationSink;
use core_store::ReferralRepository;
use core_types::{
    constants, Amount, CoreError, Referral, ReferralEarning, ReferralEarningId,
    ReferralSourceType, TxHash, UserId, ValidationKind,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Ties the chain walk, edge bookkeeping, and reward fan-out together.
/// A thin read-through-a-repository wrapper; all state lives behind
/// [`ReferralRepository`].
pub struct ReferralEngine {
    store: Arc<dyn ReferralRepository>,
    rates: HashMap<u8, Decimal>,
    notify: Arc<dyn NotificationSink>,
}

impl ReferralEngine {
    pub fn new(store: Arc<dyn ReferralRepository>, notify: Arc<dyn NotificationSink>) -> Self {
        let default_rate: Decimal = constants::DEFAULT_REFERRAL_RATE.parse().expect("valid constant");
        let rates = (1..=constants::REFERRAL_DEPTH).map(|level| (level, default_rate)).collect();
        Self { store, rates, notify }
    }

    pub fn with_rates(store: Arc<dyn ReferralRepository>, notify: Arc<dyn NotificationSink>, rates: HashMap<u8, Decimal>) -> Self {
        Self { store, rates, notify }
    }

    /// Walks `user_id`'s referrer chain up to `depth` levels. Level 1 is
    /// `user_id`'s direct referrer. A `HashSet` of visited IDs guards
    /// against a cycle reaching back to an already-visited node (§4.7.1
    /// step 3 / §8 property 6).
    pub async fn ancestors_of(&self, user_id: UserId, depth: u8) -> Result<Vec<(u8, UserId)>, CoreError> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(user_id);
        let mut current = user_id;

        for level in 1..=depth {
            match self.store.level1_parent_of(current).await? {
                Some(parent) if !visited.contains(&parent) => {
                    out.push((level, parent));
                    visited.insert(parent);
                    current = parent;
                }
                _ => break,
            }
        }
        Ok(out)
    }

    /// Creates one `Referral` edge per level for `new_user_id`, rejecting
    /// self-referral and any chain that would loop back to `new_user_id`
    /// itself (§4.7.2).
    pub async fn register_referral(&self, new_user_id: UserId, referrer_id: UserId) -> Result<Vec<Referral>, CoreError> {
        if new_user_id == referrer_id {
            return Err(CoreError::validation(ValidationKind::SelfReferral));
        }

        let mut chain: Vec<(u8, UserId)> = vec![(1, referrer_id)];
        let rest = self.ancestors_of(referrer_id, constants::REFERRAL_DEPTH.saturating_sub(1)).await?;
        for (i, (_, ancestor)) in rest.into_iter().enumerate() {
            chain.push((i as u8 + 2, ancestor));
        }
        chain.truncate(constants::REFERRAL_DEPTH as usize);

        if chain.iter().any(|(_, id)| *id == new_user_id) {
            return Err(CoreError::validation(ValidationKind::ReferralCycle));
        }

        let mut created = Vec::new();
        for (level, ancestor) in chain {
            if self.store.get_edge(ancestor, new_user_id).await?.is_some() {
                continue;
            }
            let edge = Referral { referrer_id: ancestor, referral_id: new_user_id, level, total_earned: Amount::ZERO };
            self.store.put_edge(edge.clone()).await?;
            created.push(edge);
        }
        Ok(created)
    }

    /// Fans a reward out across `source_user_id`'s referral chain.
    /// Idempotent on `source_event_id`: a replayed call with the same key
    /// hits `put_earning_if_absent`'s `Conflict` per ancestor and is
    /// treated as success-with-zero-new-earnings (§4.7.3, §8 round-trip
    /// law), so callers may retry freely after a crash of unknown outcome.
    pub async fn distribute_reward(
        &self,
        source_user_id: UserId,
        amount: Amount,
        source_type: ReferralSourceType,
        source_event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReferralEarning>, CoreError> {
        let ancestors = self.ancestors_of(source_user_id, constants::REFERRAL_DEPTH).await?;
        let notify_floor = Amount::try_from_str(constants::REFERRAL_NOTIFY_FLOOR)
            .expect("valid constant");

        let mut created = Vec::new();
        for (level, referrer_id) in ancestors {
            let rate = match self.rates.get(&level) {
                Some(rate) => *rate,
                None => continue,
            };
            let reward = Amount::from_decimal(amount.as_decimal() * rate);
            if reward.is_zero() {
                continue;
            }

            let id = self.store.next_earning_id().await?;
            let earning = ReferralEarning {
                id,
                referrer_id,
                referral_id: source_user_id,
                level,
                amount: reward,
                source_type,
                source_user_id,
                source_event_id: source_event_id.to_string(),
                paid: false,
                tx_hash: None,
                created_at: now,
            };

            match self.store.put_earning_if_absent(earning.clone()).await {
                Ok(()) => {
                    self.store.add_earned(referrer_id, source_user_id, reward).await?;
                    // §4.7.3 "filter-small-amount policy": the floor only
                    // suppresses ROI-earning notifications. A small
                    // Deposit-type bonus always notifies.
                    let suppressed = source_type == ReferralSourceType::Roi && reward < notify_floor;
                    if !suppressed {
                        self.notify
                            .notify_user(
                                referrer_id.0,
                                &format!("You earned {reward} from a level {level} referral"),
                                false,
                            )
                            .await;
                    }
                    created.push(earning);
                }
                Err(CoreError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// The single `paid: false -> true` transition. Re-invoking on an
    /// already-paid earning is rejected outright (§8 property 7) rather
    /// than silently treated as a no-op, so a caller retrying after an
    /// ambiguous failure learns the truth instead of assuming success.
    pub async fn mark_earning_as_paid(&self, earning_id: ReferralEarningId, tx_hash: TxHash) -> Result<(), CoreError> {
        let mut earning = self
            .store
            .get_earning(earning_id)
            .await?
            .ok_or_else(|| CoreError::Internal(format!("unknown referral earning {earning_id}")))?;

        if earning.paid {
            return Err(CoreError::validation(ValidationKind::AlreadyPaid));
        }

        earning.paid = true;
        earning.tx_hash = Some(tx_hash);
        self.store.update_earning(earning).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_notify::{NotificationSink, NullNotificationSink, Priority};
    use core_store::InMemoryStore;
    use std::sync::Mutex as StdMutex;

    fn engine(store: Arc<InMemoryStore>) -> ReferralEngine {
        ReferralEngine::new(store, Arc::new(NullNotificationSink))
    }

    async fn link(store: &InMemoryStore, referral: UserId, referrer: UserId) {
        store.put_edge(Referral { referrer_id: referrer, referral_id: referral, level: 1, total_earned: Amount::ZERO }).await.unwrap();
    }

    #[derive(Default)]
    struct RecordingSink {
        user_notifications: StdMutex<Vec<i64>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify_user(&self, external_id: i64, _message: &str, _critical: bool) {
            self.user_notifications.lock().unwrap().push(external_id);
        }
        async fn notify_admins(&self, _category: &str, _priority: Priority, _title: &str, _details: &str) {}
    }

    #[tokio::test]
    async fn self_referral_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store);
        let result = engine.register_referral(UserId(1), UserId(1)).await;
        assert!(matches!(result, Err(CoreError::Validation(ValidationKind::SelfReferral))));
    }

    #[tokio::test]
    async fn cycle_back_to_new_user_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        // user 1 is already user 2's level-1 ancestor (referrer chain: 2 -> 1).
        link(&store, UserId(2), UserId(1)).await;
        let engine = engine(store);
        // Now try to register user 1 with referrer 2, which would loop back.
        let result = engine.register_referral(UserId(1), UserId(2)).await;
        assert!(matches!(result, Err(CoreError::Validation(ValidationKind::ReferralCycle))));
    }

    #[tokio::test]
    async fn distribute_reward_is_idempotent_on_source_event_id() {
        let store = Arc::new(InMemoryStore::new());
        link(&store, UserId(10), UserId(1)).await;
        let engine = engine(store.clone());

        let now = Utc::now();
        let first = engine
            .distribute_reward(UserId(10), Amount::try_from_str("100").unwrap(), ReferralSourceType::Deposit, "dep-1", now)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = engine
            .distribute_reward(UserId(10), Amount::try_from_str("100").unwrap(), ReferralSourceType::Deposit, "dep-1", now)
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn mark_earning_as_paid_rejects_second_call() {
        let store = Arc::new(InMemoryStore::new());
        link(&store, UserId(10), UserId(1)).await;
        let engine = engine(store.clone());

        let earnings = engine
            .distribute_reward(UserId(10), Amount::try_from_str("100").unwrap(), ReferralSourceType::Deposit, "dep-2", Utc::now())
            .await
            .unwrap();
        let id = earnings[0].id;

        engine.mark_earning_as_paid(id, TxHash::from_bytes([9u8; 32])).await.unwrap();
        let second = engine.mark_earning_as_paid(id, TxHash::from_bytes([9u8; 32])).await;
        assert!(matches!(second, Err(CoreError::Validation(ValidationKind::AlreadyPaid))));
    }

    #[tokio::test]
    async fn notify_floor_only_suppresses_roi_not_deposit() {
        let store = Arc::new(InMemoryStore::new());
        link(&store, UserId(10), UserId(1)).await;
        let sink = Arc::new(RecordingSink::default());
        let engine = ReferralEngine::new(store, sink.clone());

        // A reward tiny enough to fall below REFERRAL_NOTIFY_FLOOR at 5%.
        let tiny_amount = Amount::try_from_str("0.01").unwrap();

        engine
            .distribute_reward(UserId(10), tiny_amount, ReferralSourceType::Roi, "roi-1", Utc::now())
            .await
            .unwrap();
        assert!(sink.user_notifications.lock().unwrap().is_empty(), "tiny ROI reward must be suppressed");

        engine
            .distribute_reward(UserId(10), tiny_amount, ReferralSourceType::Deposit, "dep-3", Utc::now())
            .await
            .unwrap();
        assert_eq!(sink.user_notifications.lock().unwrap().len(), 1, "deposit reward must always notify");
    }
}
