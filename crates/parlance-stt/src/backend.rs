use crate::error::{SttError, SttResult};
use crate::types::{BackendKind, RecognitionEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Environment variable holding the cloud recognition credential. Its
/// presence is what `BackendKind::Auto` keys off.
pub const CLOUD_CREDENTIAL_ENV: &str = "PARLANCE_SPEECH_KEY";

/// A recognition backend drives capture however it likes and emits
/// normalized events until cancelled. Downstream logic never learns which
/// backend is running.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Runs until `cancel` fires or the event receiver goes away.
    /// Transient backend errors are handled internally; an `Err` return is
    /// reserved for unrecoverable setup failures.
    async fn run(
        &self,
        event_tx: mpsc::Sender<RecognitionEvent>,
        cancel: CancellationToken,
    ) -> SttResult<()>;
}

/// Resolve the configured preference against credential availability.
/// Explicit config wins; an explicit Cloud request without a credential is
/// a startup configuration error, not a silent fallback.
pub fn resolve_kind(
    requested: BackendKind,
    cloud_credential_present: bool,
) -> SttResult<BackendKind> {
    match requested {
        BackendKind::Cloud => {
            if cloud_credential_present {
                Ok(BackendKind::Cloud)
            } else {
                Err(SttError::Configuration(format!(
                    "cloud backend requested but {} is not set",
                    CLOUD_CREDENTIAL_ENV
                )))
            }
        }
        BackendKind::LocalOffline => Ok(BackendKind::LocalOffline),
        BackendKind::Auto => Ok(if cloud_credential_present {
            BackendKind::Cloud
        } else {
            BackendKind::LocalOffline
        }),
    }
}

pub fn cloud_credential() -> Option<String> {
    std::env::var(CLOUD_CREDENTIAL_ENV)
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_cloud_with_credential() {
        assert_eq!(
            resolve_kind(BackendKind::Auto, true).unwrap(),
            BackendKind::Cloud
        );
    }

    #[test]
    fn auto_falls_back_to_local_without_credential() {
        assert_eq!(
            resolve_kind(BackendKind::Auto, false).unwrap(),
            BackendKind::LocalOffline
        );
    }

    #[test]
    fn explicit_local_ignores_credential() {
        assert_eq!(
            resolve_kind(BackendKind::LocalOffline, true).unwrap(),
            BackendKind::LocalOffline
        );
    }

    #[test]
    fn explicit_cloud_without_credential_is_config_error() {
        let err = resolve_kind(BackendKind::Cloud, false).unwrap_err();
        assert!(matches!(err, SttError::Configuration(_)));
    }
}
