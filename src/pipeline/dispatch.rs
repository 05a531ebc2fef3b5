use crate::delivery::{Delivery, DeliveryError, MeasurementRecord};

/// Totals for one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub records: usize,
    pub batches: usize,
}

/// Groups records into batches of `batch_size` and submits them in order,
/// one at a time. The trailing partial batch is always flushed.
///
/// Stops at the first delivery error; nothing is retried here.
pub async fn dispatch<I>(
    records: I,
    delivery: &dyn Delivery,
    batch_size: usize,
) -> Result<DispatchSummary, DeliveryError>
where
    I: IntoIterator<Item = MeasurementRecord>,
{
    let batch_size = batch_size.max(1);
    let mut summary = DispatchSummary::default();
    let mut batch = Vec::with_capacity(batch_size);

    for record in records {
        batch.push(record);
        if batch.len() == batch_size {
            send(&mut batch, delivery, &mut summary).await?;
        }
    }

    if !batch.is_empty() {
        send(&mut batch, delivery, &mut summary).await?;
    }

    Ok(summary)
}

async fn send(
    batch: &mut Vec<MeasurementRecord>,
    delivery: &dyn Delivery,
    summary: &mut DispatchSummary,
) -> Result<(), DeliveryError> {
    tracing::debug!(batch = summary.batches + 1, count = batch.len(), "Sending measurements");
    delivery.submit_batch(batch).await?;
    summary.batches += 1;
    summary.records += batch.len();
    batch.clear();
    Ok(())
}
