use crate::models::{DeploymentStatus, Provider};

/// Map a provider's raw status vocabulary to the canonical enum.
///
/// Unmapped values fail closed to `Building`: swallowing an unknown terminal
/// state would be worse than leaving the deployment visibly in progress.
pub fn normalize_status(provider: Provider, raw: &str) -> DeploymentStatus {
    match provider {
        Provider::Vercel => match raw {
            "QUEUED" => DeploymentStatus::Queued,
            "INITIALIZING" | "BUILDING" | "DEPLOYING" => DeploymentStatus::Building,
            "READY" => DeploymentStatus::Success,
            "ERROR" | "CANCELED" => DeploymentStatus::Failed,
            _ => DeploymentStatus::Building,
        },
        // GitHub commit-status vocabulary. The commit polling path records
        // rows as `Unknown` instead of consulting this table (raw history
        // carries no build outcome), but the mapping stays defined for
        // status-bearing payloads.
        Provider::Github => match raw {
            "pending" | "queued" => DeploymentStatus::Queued,
            "in_progress" => DeploymentStatus::Building,
            "success" => DeploymentStatus::Success,
            "failure" | "error" => DeploymentStatus::Failed,
            _ => DeploymentStatus::Building,
        },
    }
}

/// Map a webhook event type to the canonical status it implies.
/// Returns `None` for event types the pipeline ignores (acknowledged 200).
pub fn normalize_webhook_event(event_type: &str) -> Option<DeploymentStatus> {
    match event_type {
        "deployment.created" => Some(DeploymentStatus::Queued),
        "deployment.ready" => Some(DeploymentStatus::Success),
        "deployment.error" => Some(DeploymentStatus::Failed),
        _ => None,
    }
}
