use bharatmart_job_queue::{EnqueueResult, JobQueueError};
use serde_json::{json, Value};

/// Describe an enqueue attempt for the response body. The resource has
/// already been written, so a queue failure degrades background processing
/// instead of failing the request.
pub fn enqueue_outcome(result: Result<EnqueueResult, JobQueueError>, resource_id: &str) -> Value {
    match result {
        Ok(enqueued) => json!({
            "status": "queued",
            "queue": enqueued.queue.as_str(),
            "jobId": enqueued.job_id,
        }),
        Err(e) if e.is_unavailable() => {
            tracing::warn!(error = %e, resource_id, "job queue unavailable; background processing degraded");
            json!({ "status": "degraded", "jobId": null })
        }
        Err(e) => {
            tracing::error!(error = %e, resource_id, "failed to enqueue background job");
            json!({ "status": "degraded", "jobId": null })
        }
    }
}
