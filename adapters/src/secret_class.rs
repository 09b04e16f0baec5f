//! Cross-tool secret classes.
//!
//! Secret scanners overlap heavily: a leaked AWS key is reported by
//! gitleaks as `aws-access-token` and by trufflehog as detector `AWS`.
//! This table maps each tool's rule vocabulary onto a shared class so the
//! deduplicator can merge the detections into one finding with multi-tool
//! consensus. Unlisted rules keep per-tool identity.

/// Map a gitleaks rule id onto a secret class.
pub(crate) fn class_for_gitleaks_rule(rule_id: &str) -> Option<String> {
    let class = match rule_id {
        "aws-access-token" | "aws-secret-key" => "aws",
        "gcp-api-key" | "gcp-service-account" => "gcp",
        "github-pat" | "github-oauth" | "github-app-token" | "github-fine-grained-pat" => {
            "github"
        }
        "gitlab-pat" | "gitlab-runner-registration-token" => "gitlab",
        "slack-bot-token" | "slack-user-token" | "slack-webhook-url" => "slack",
        "stripe-access-token" => "stripe",
        "twilio-api-key" => "twilio",
        "private-key" => "private-key",
        _ => return None,
    };
    Some(format!("secret:{class}"))
}

/// Map a trufflehog detector name onto a secret class.
pub(crate) fn class_for_trufflehog_detector(detector: &str) -> Option<String> {
    let class = match detector.to_ascii_lowercase().as_str() {
        "aws" => "aws",
        "gcp" => "gcp",
        "github" => "github",
        "gitlab" => "gitlab",
        "slack" | "slackwebhook" => "slack",
        "stripe" => "stripe",
        "twilio" => "twilio",
        "privatekey" => "private-key",
        _ => return None,
    };
    Some(format!("secret:{class}"))
}
