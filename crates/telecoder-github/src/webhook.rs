// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub webhook parsing for PR-comment events.
//!
//! Three event types produce a [`WebhookEvent`]: `issue_comment` (on a PR),
//! `pull_request_review_comment`, and `pull_request_review`. Everything
//! else parses to `None`.

use ring::hmac;
use serde::Deserialize;
use telecoder_core::traits::git::WebhookEvent;
use telecoder_core::{Result, TelecoderError};

/// Parses a GitHub webhook delivery into a [`WebhookEvent`].
///
/// `event_type` is the `X-GitHub-Event` header value and `signature` the
/// `X-Hub-Signature-256` header. When `secret` is set the signature is
/// verified before any parsing. Returns `Ok(None)` for deliveries that are
/// not PR comments we care about.
pub fn parse_webhook(
    event_type: &str,
    signature: Option<&str>,
    body: &[u8],
    secret: Option<&str>,
) -> Result<Option<WebhookEvent>> {
    if let Some(secret) = secret {
        let signature = signature
            .ok_or_else(|| TelecoderError::Validation("missing webhook signature".into()))?;
        if !verify_signature(body, signature, secret) {
            return Err(TelecoderError::Validation("invalid webhook signature".into()));
        }
    }

    match event_type {
        "issue_comment" => parse_issue_comment(body),
        "pull_request_review_comment" => parse_review_comment(body),
        "pull_request_review" => parse_review(body),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    body: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(default)]
    full_name: String,
}

fn parse_issue_comment(body: &[u8]) -> Result<Option<WebhookEvent>> {
    #[derive(Debug, Deserialize)]
    struct Issue {
        #[serde(default)]
        number: i64,
        pull_request: Option<serde_json::Value>,
    }
    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default)]
        action: String,
        issue: Issue,
        comment: Comment,
        repository: Repository,
    }

    let payload: Payload = decode(body, "issue_comment")?;
    // Issue comments on non-PR issues are not ours.
    if payload.issue.pull_request.is_none() || payload.action != "created" {
        return Ok(None);
    }

    Ok(Some(WebhookEvent {
        action: payload.action,
        repo: payload.repository.full_name,
        pr_number: payload.issue.number,
        comment_body: payload.comment.body,
        comment_user: payload.comment.user.login,
        comment_id: payload.comment.id,
    }))
}

fn parse_review_comment(body: &[u8]) -> Result<Option<WebhookEvent>> {
    #[derive(Debug, Deserialize)]
    struct PullRequest {
        #[serde(default)]
        number: i64,
    }
    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default)]
        action: String,
        pull_request: PullRequest,
        comment: Comment,
        repository: Repository,
    }

    let payload: Payload = decode(body, "pull_request_review_comment")?;
    if payload.action != "created" {
        return Ok(None);
    }

    Ok(Some(WebhookEvent {
        action: payload.action,
        repo: payload.repository.full_name,
        pr_number: payload.pull_request.number,
        comment_body: payload.comment.body,
        comment_user: payload.comment.user.login,
        comment_id: payload.comment.id,
    }))
}

fn parse_review(body: &[u8]) -> Result<Option<WebhookEvent>> {
    #[derive(Debug, Deserialize)]
    struct Review {
        #[serde(default)]
        id: i64,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        state: String,
        user: User,
    }
    #[derive(Debug, Deserialize)]
    struct PullRequest {
        #[serde(default)]
        number: i64,
    }
    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default)]
        action: String,
        review: Review,
        pull_request: PullRequest,
        repository: Repository,
    }

    let payload: Payload = decode(body, "pull_request_review")?;
    if payload.action != "submitted" {
        return Ok(None);
    }

    let review_body = payload.review.body.unwrap_or_default();
    match payload.review.state.as_str() {
        "changes_requested" => {}
        // A bare "commented" review with no text carries nothing to act on.
        "commented" if review_body.trim().is_empty() => return Ok(None),
        "commented" => {}
        _ => return Ok(None),
    }

    Ok(Some(WebhookEvent {
        action: payload.action,
        repo: payload.repository.full_name,
        pr_number: payload.pull_request.number,
        comment_body: review_body,
        comment_user: payload.review.user.login,
        comment_id: payload.review.id,
    }))
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8], kind: &str) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TelecoderError::Validation(format!(
        "parsing {kind} payload: {e}"
    )))
}

fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(sig) = hex::decode(sig_hex) else {
        return false;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, payload, &sig).is_ok()
}
