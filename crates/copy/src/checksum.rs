//! Source and destination checksum validation.

use tpcopy_checksum::checksums_match;
use tpcopy_config::ChecksumConfig;
use tpcopy_protocol::{ErrorKind, ErrorRecord, EventStage, Side, TransferParams};

use crate::backend::ControlPlane;
use crate::events::EventEmitter;

/// Checksum settings in effect for one copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumPolicy {
    pub enabled: bool,
    pub allow_empty_source: bool,
    /// Request algorithm if named, else the configured default.
    pub algorithm: Option<String>,
    pub user_value: Option<String>,
}

impl ChecksumPolicy {
    pub fn resolve(params: &TransferParams, config: &ChecksumConfig) -> Self {
        let user = params.user_checksum.as_ref();
        let algorithm = user
            .map(|u| u.algorithm.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .or_else(|| config.default_algorithm.clone())
            .filter(|a| !a.is_empty());
        let user_value = user
            .map(|u| u.value.trim().to_string())
            .filter(|v| !v.is_empty());
        Self {
            enabled: params.checksum_check,
            allow_empty_source: config.allow_empty_source_checksum,
            algorithm,
            user_value,
        }
    }

    /// The algorithm to verify with, if verification should run at all.
    pub fn active_algorithm(&self) -> Option<&str> {
        if self.enabled {
            self.algorithm.as_deref()
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_algorithm().is_some()
    }
}

/// Fetches checksums through the control plane and compares them.
pub struct ChecksumReconciler<'a> {
    control: &'a dyn ControlPlane,
    events: &'a EventEmitter,
}

impl<'a> ChecksumReconciler<'a> {
    pub fn new(control: &'a dyn ControlPlane, events: &'a EventEmitter) -> Self {
        Self { control, events }
    }

    /// Fetches the source checksum and checks it against the user value.
    ///
    /// Returns `Ok(None)` when the source has no usable checksum and
    /// `allow_empty` tolerates that.
    pub async fn validate_source(
        &self,
        source: &str,
        algorithm: &str,
        user_value: Option<&str>,
        allow_empty: bool,
    ) -> Result<Option<String>, ErrorRecord> {
        self.events
            .emit(Side::Source, EventStage::ChecksumEnter, algorithm);
        let result = self.source_inner(source, algorithm, user_value, allow_empty).await;
        self.events
            .emit(Side::Source, EventStage::ChecksumExit, algorithm);
        result
    }

    async fn source_inner(
        &self,
        source: &str,
        algorithm: &str,
        user_value: Option<&str>,
        allow_empty: bool,
    ) -> Result<Option<String>, ErrorRecord> {
        let value = match self.control.checksum(source, algorithm).await {
            Ok(v) => v,
            Err(e) if allow_empty => {
                tracing::info!(source, algorithm, error = %e, "ignoring source checksum error");
                return Ok(None);
            }
            Err(e) => {
                return Err(ErrorRecord::new(
                    Side::Source,
                    ErrorKind::ChecksumUnavailable,
                    format!("failed to get {algorithm} checksum of {source}: {e}"),
                ));
            }
        };

        if value.trim().is_empty() {
            if allow_empty {
                tracing::info!(source, algorithm, "ignoring empty source checksum");
                return Ok(None);
            }
            return Err(ErrorRecord::new(
                Side::Source,
                ErrorKind::EmptyChecksum,
                format!("source {source} has no {algorithm} checksum"),
            ));
        }

        if let Some(user) = user_value
            && !checksums_match(user, &value)
        {
            return Err(ErrorRecord::new(
                Side::Source,
                ErrorKind::ChecksumMismatch,
                format!("user defined checksum {user} does not match source {algorithm} {value}"),
            ));
        }

        tracing::debug!(source, algorithm, checksum = %value, "source checksum");
        Ok(Some(value))
    }

    /// Fetches the destination checksum and checks it against the source
    /// and user values.
    pub async fn validate_destination(
        &self,
        destination: &str,
        algorithm: &str,
        user_value: Option<&str>,
        source_value: Option<&str>,
    ) -> Result<String, ErrorRecord> {
        self.events
            .emit(Side::Destination, EventStage::ChecksumEnter, algorithm);
        let result = self
            .destination_inner(destination, algorithm, user_value, source_value)
            .await;
        self.events
            .emit(Side::Destination, EventStage::ChecksumExit, algorithm);
        result
    }

    async fn destination_inner(
        &self,
        destination: &str,
        algorithm: &str,
        user_value: Option<&str>,
        source_value: Option<&str>,
    ) -> Result<String, ErrorRecord> {
        let value = self
            .control
            .checksum(destination, algorithm)
            .await
            .map_err(|e| {
                ErrorRecord::new(
                    Side::Destination,
                    ErrorKind::ChecksumUnavailable,
                    format!("failed to get {algorithm} checksum of {destination}: {e}"),
                )
            })?;

        if value.trim().is_empty() {
            return Err(ErrorRecord::new(
                Side::Destination,
                ErrorKind::EmptyChecksum,
                format!("destination {destination} has no {algorithm} checksum"),
            ));
        }

        if let Some(source) = source_value
            && !checksums_match(source, &value)
        {
            return Err(ErrorRecord::new(
                Side::Transfer,
                ErrorKind::ChecksumMismatch,
                format!("source and destination {algorithm} do not match ({source} != {value})"),
            ));
        }

        if let Some(user) = user_value
            && !checksums_match(user, &value)
        {
            return Err(ErrorRecord::new(
                Side::Destination,
                ErrorKind::ChecksumMismatch,
                format!("user defined checksum {user} does not match destination {algorithm} {value}"),
            ));
        }

        tracing::debug!(destination, algorithm, checksum = %value, "destination checksum");
        Ok(value)
    }
}
