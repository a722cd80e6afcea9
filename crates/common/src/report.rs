//! Exchange reports and their validation.
//!
//! An exchange report is one party's claim about the outcome of a single
//! shard transfer. Reports arrive from untrusted callers, so the body is
//! deserialized leniently and validated explicitly: a report whose
//! timestamps are not numeric, whose outcome kind is unknown, or whose
//! result code is unrecognized is rejected by [`validate_exchange_report`],
//! never by a serde error.

use serde::{Deserialize, Deserializer, Serialize};

/// Result code family reported for successful exchanges.
pub const RESULT_CODE_SUCCESS: i64 = 1000;

/// Result code family reported for failed exchanges.
pub const RESULT_CODE_FAILURE: i64 = 1100;

/// The closed set of recognized result codes.
///
/// The code and the outcome kind are validated independently; no
/// cross-field polarity rule is enforced. Tightening that is a product
/// decision, not a validation fix.
pub const RECOGNIZED_RESULT_CODES: [i64; 2] = [RESULT_CODE_SUCCESS, RESULT_CODE_FAILURE];

/// Closed enumeration of exchange outcome kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeOutcome {
    ShardDownloaded,
    ShardUploaded,
    DownloadError,
    TransferFailed,
    FailedIntegrity,
    MirrorSuccess,
    MirrorFailed,
}

impl ExchangeOutcome {
    /// Wire name of this outcome kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShardDownloaded => "SHARD_DOWNLOADED",
            Self::ShardUploaded => "SHARD_UPLOADED",
            Self::DownloadError => "DOWNLOAD_ERROR",
            Self::TransferFailed => "TRANSFER_FAILED",
            Self::FailedIntegrity => "FAILED_INTEGRITY",
            Self::MirrorSuccess => "MIRROR_SUCCESS",
            Self::MirrorFailed => "MIRROR_FAILED",
        }
    }

    /// Parses a wire name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SHARD_DOWNLOADED" => Some(Self::ShardDownloaded),
            "SHARD_UPLOADED" => Some(Self::ShardUploaded),
            "DOWNLOAD_ERROR" => Some(Self::DownloadError),
            "TRANSFER_FAILED" => Some(Self::TransferFailed),
            "FAILED_INTEGRITY" => Some(Self::FailedIntegrity),
            "MIRROR_SUCCESS" => Some(Self::MirrorSuccess),
            "MIRROR_FAILED" => Some(Self::MirrorFailed),
            _ => None,
        }
    }

    /// Whether this outcome warrants mirror-establishment action.
    ///
    /// These are the kinds indicating either that a new copy exists which
    /// can be fanned out, or that an existing copy was lost and must be
    /// replaced. Every other kind is reconciled and scored but triggers no
    /// replication.
    #[must_use]
    pub fn triggers_mirroring(&self) -> bool {
        matches!(
            self,
            Self::ShardUploaded | Self::MirrorSuccess | Self::MirrorFailed | Self::DownloadError
        )
    }
}

impl std::fmt::Display for ExchangeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One party's claim about one shard transfer.
///
/// Immutable once accepted; a transfer record holds at most one report per
/// party. `exchange_start <= exchange_end` is not enforced, both merely
/// have to be numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeReport {
    /// Opaque id correlating this report to a transfer record.
    pub token: String,

    /// Unix timestamp (ms) when the exchange began.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub exchange_start: Option<i64>,

    /// Unix timestamp (ms) when the exchange ended.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub exchange_end: Option<i64>,

    /// Result code; recognized values are listed in
    /// [`RECOGNIZED_RESULT_CODES`].
    pub exchange_result_code: i64,

    /// Outcome kind wire name; recognized values parse via
    /// [`ExchangeOutcome::parse`].
    pub exchange_result_message: String,
}

impl ExchangeReport {
    /// The parsed outcome kind, if the wire name is recognized.
    #[must_use]
    pub fn outcome(&self) -> Option<ExchangeOutcome> {
        ExchangeOutcome::parse(&self.exchange_result_message)
    }
}

/// Deserializes a timestamp leniently: any non-numeric JSON value becomes
/// `None` so the validator, not serde, rejects the report.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

/// Structural and semantic validation of an inbound exchange report.
///
/// A report is valid iff the outcome kind is a member of
/// [`ExchangeOutcome`], the result code is recognized, and both timestamps
/// are numeric. Pure; no side effects.
#[must_use]
pub fn validate_exchange_report(report: &ExchangeReport) -> bool {
    report.outcome().is_some()
        && RECOGNIZED_RESULT_CODES.contains(&report.exchange_result_code)
        && report.exchange_start.is_some()
        && report.exchange_end.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(code: i64, message: &str) -> ExchangeReport {
        ExchangeReport {
            token: "91e1fc2fd3a4c5244945e49c6f68ca1bd444d14c".to_string(),
            exchange_start: Some(1_509_156_812_066),
            exchange_end: Some(1_509_156_822_420),
            exchange_result_code: code,
            exchange_result_message: message.to_string(),
        }
    }

    #[test]
    fn validates_recognized_reports() {
        // Code and message polarity are deliberately independent.
        let valid = [
            (1100, "FAILED_INTEGRITY"),
            (1000, "SHARD_DOWNLOADED"),
            (1100, "SHARD_UPLOADED"),
            (1000, "DOWNLOAD_ERROR"),
            (1100, "TRANSFER_FAILED"),
            (1100, "MIRROR_SUCCESS"),
            (1000, "MIRROR_FAILED"),
        ];
        for (code, message) in valid {
            assert!(
                validate_exchange_report(&report(code, message)),
                "{code} {message}"
            );
        }
    }

    #[test]
    fn rejects_unknown_message() {
        assert!(!validate_exchange_report(&report(
            1100,
            "NOT_A_VALID_MESSAGE"
        )));
    }

    #[test]
    fn rejects_unrecognized_code() {
        assert!(!validate_exchange_report(&report(
            1_234_567_890,
            "SHARD_UPLOADED"
        )));
    }

    #[test]
    fn rejects_missing_timestamps() {
        let mut r = report(1000, "SHARD_DOWNLOADED");
        r.exchange_start = None;
        assert!(!validate_exchange_report(&r));

        let mut r = report(1000, "SHARD_DOWNLOADED");
        r.exchange_end = None;
        assert!(!validate_exchange_report(&r));
    }

    #[test]
    fn non_numeric_timestamps_deserialize_to_none() {
        let body = serde_json::json!({
            "token": "fe081d837b4c6bbb0e416b8acd7b04ed29203f08",
            "exchangeStart": "tuesday",
            "exchangeEnd": 1_509_156_822_421_i64,
            "exchangeResultCode": 1000,
            "exchangeResultMessage": "SHARD_DOWNLOADED"
        });
        let parsed: ExchangeReport = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.exchange_start, None);
        assert_eq!(parsed.exchange_end, Some(1_509_156_822_421));
        assert!(!validate_exchange_report(&parsed));
    }

    #[test]
    fn outcome_names_round_trip() {
        let all = [
            ExchangeOutcome::ShardDownloaded,
            ExchangeOutcome::ShardUploaded,
            ExchangeOutcome::DownloadError,
            ExchangeOutcome::TransferFailed,
            ExchangeOutcome::FailedIntegrity,
            ExchangeOutcome::MirrorSuccess,
            ExchangeOutcome::MirrorFailed,
        ];
        for outcome in all {
            assert_eq!(ExchangeOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(ExchangeOutcome::parse("SHARD_TELEPORTED"), None);
    }

    #[test]
    fn mirroring_gate_covers_exactly_four_kinds() {
        assert!(ExchangeOutcome::ShardUploaded.triggers_mirroring());
        assert!(ExchangeOutcome::MirrorSuccess.triggers_mirroring());
        assert!(ExchangeOutcome::MirrorFailed.triggers_mirroring());
        assert!(ExchangeOutcome::DownloadError.triggers_mirroring());

        assert!(!ExchangeOutcome::ShardDownloaded.triggers_mirroring());
        assert!(!ExchangeOutcome::TransferFailed.triggers_mirroring());
        assert!(!ExchangeOutcome::FailedIntegrity.triggers_mirroring());
    }
}
