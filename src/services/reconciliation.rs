use crate::error::Error;
use crate::models::{DelegationRecord, Epoch, EpochTotal, FixedPoint, RewardEvent};
use async_trait::async_trait;
use log::debug;

/// Supplies every delegator reward paid out in one epoch, for any delegator.
#[async_trait]
pub trait RewardSource {
    async fn epoch_rewards(&self, epoch: &Epoch) -> Result<Vec<RewardEvent>, Error>;
}

/// Fetches an epoch's rewards and keeps the amounts owed to `delegations`.
pub async fn get_epoch_rewards<R>(
    source: &R,
    epoch: &Epoch,
    delegations: &[DelegationRecord],
) -> Result<Vec<FixedPoint>, Error>
where
    R: RewardSource + Sync + ?Sized,
{
    let events = source.epoch_rewards(epoch).await?;
    Ok(matched_amounts(&events, delegations))
}

/// Multiset join on (node id, delegator id): an event is counted once per
/// matching delegation record, so duplicated records multiply its amount.
pub fn matched_amounts(events: &[RewardEvent], delegations: &[DelegationRecord]) -> Vec<FixedPoint> {
    let mut amounts = Vec::new();
    for event in events {
        for record in delegations {
            if record.matches(&event.node_id, event.delegator_id) {
                amounts.push(event.amount);
            }
        }
    }
    amounts
}

pub fn sum(amounts: &[FixedPoint]) -> FixedPoint {
    amounts
        .iter()
        .fold(FixedPoint::ZERO, |acc, a| acc.wrapping_add(*a))
}

/// Running totals across epochs, fed one epoch at a time in chronological order.
#[derive(Debug, Default)]
pub struct Reconciler {
    grand_total: FixedPoint,
    epochs: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_epoch(&mut self, epoch: &Epoch, amounts: Vec<FixedPoint>) -> EpochTotal {
        let total = sum(&amounts);
        self.grand_total = self.grand_total.wrapping_add(total);
        self.epochs += 1;
        debug!(
            "Epoch {} ({}): {} matched rewards, total {}",
            self.epochs,
            epoch.transaction_id,
            amounts.len(),
            total
        );
        EpochTotal {
            epoch: epoch.clone(),
            amounts,
            total,
        }
    }

    pub fn grand_total(&self) -> FixedPoint {
        self.grand_total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub epochs: Vec<EpochTotal>,
    pub grand_total: FixedPoint,
}

/// Pure form of the pipeline: per-epoch totals plus the grand total.
pub fn reconcile(
    rewards_by_epoch: &[(Epoch, Vec<RewardEvent>)],
    delegations: &[DelegationRecord],
) -> Reconciliation {
    let mut reconciler = Reconciler::new();
    let epochs = rewards_by_epoch
        .iter()
        .map(|(epoch, events)| reconciler.record_epoch(epoch, matched_amounts(events, delegations)))
        .collect();
    Reconciliation {
        epochs,
        grand_total: reconciler.grand_total(),
    }
}
