use crate::error::Error;
use crate::models::{filter_epochs, DateRange, Epoch, FlowAddress};
use crate::report::ReportWriter;
use crate::services::flowscan::{list_delegations, DelegationDirectory};
use crate::services::reconciliation::{get_epoch_rewards, Reconciler, Reconciliation, RewardSource};
use log::info;
use std::io::Write;

/// Runs one report for `address` over the epochs inside `range`, writing each
/// epoch's row as soon as its rewards are known. Any error aborts the run.
pub async fn run_report<D, R, W>(
    directory: &D,
    rewards: &R,
    epochs: &[Epoch],
    address: &FlowAddress,
    range: &DateRange,
    out: W,
) -> Result<Reconciliation, Error>
where
    D: DelegationDirectory + Sync + ?Sized,
    R: RewardSource + Sync + ?Sized,
    W: Write,
{
    let mut report = ReportWriter::new(out);

    info!("Fetching delegation records for {}", address);
    let delegations = list_delegations(directory, address).await?;
    report.write_delegations(&delegations)?;

    let selected = filter_epochs(epochs, range);
    info!(
        "Processing {} of {} epochs between {} and {}",
        selected.len(),
        epochs.len(),
        range.start,
        range.end
    );

    let mut reconciler = Reconciler::new();
    let mut totals = Vec::with_capacity(selected.len());
    for (index, epoch) in selected.into_iter().enumerate() {
        info!(
            "Processing epoch {}: {} ({})",
            index + 1,
            epoch.timestamp,
            epoch.transaction_id
        );
        let amounts = get_epoch_rewards(rewards, epoch, &delegations).await?;
        let total = reconciler.record_epoch(epoch, amounts);
        report.write_epoch(&total)?;
        totals.push(total);
    }

    let grand_total = reconciler.grand_total();
    report.write_grand_total(grand_total)?;
    info!("Grand total: {} FLOW over {} epochs", grand_total, totals.len());

    Ok(Reconciliation {
        epochs: totals,
        grand_total,
    })
}
