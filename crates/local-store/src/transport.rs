use std::path::Path;

use tpcopy_checksum::{ChecksumAlgorithm, calculate_file_checksum, checksums_match};
use tpcopy_copy::{BackendFuture, Transport};
use tpcopy_protocol::{BackendError, BackendErrorCode, TransportOptions};

use crate::path::{STAGE_SCHEME, io_error, to_path};

/// Copies between two local transfer URLs.
///
/// `stage://` URLs are not transferable; they must be negotiated first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    async fn copy_file(
        source: &str,
        destination: &str,
        options: &TransportOptions,
    ) -> Result<(), BackendError> {
        for url in [source, destination] {
            if url.starts_with(STAGE_SCHEME) {
                return Err(BackendError::new(
                    BackendErrorCode::Unsupported,
                    format!("{url} must be negotiated before transfer"),
                ));
            }
        }
        let src = to_path(source)?;
        let dst = to_path(destination)?;

        if !options.replace_existing
            && tokio::fs::try_exists(&dst)
                .await
                .map_err(|e| io_error(&dst, e))?
        {
            return Err(BackendError::new(
                BackendErrorCode::AlreadyExists,
                format!("{} already exists", dst.display()),
            ));
        }

        // Strict mode skips every convenience step around the copy itself.
        if !options.strict_copy_mode
            && options.create_parent_dir
            && let Some(parent) = dst.parent()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let bytes = tokio::fs::copy(&src, &dst)
            .await
            .map_err(|e| io_error(&src, e))?;
        tracing::debug!(
            source = %src.display(),
            destination = %dst.display(),
            bytes,
            "file copied"
        );

        if options.checksum_check && !options.strict_copy_mode {
            verify_copy(&src, &dst).await?;
        }
        Ok(())
    }
}

async fn verify_copy(src: &Path, dst: &Path) -> Result<(), BackendError> {
    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || {
        let a = calculate_file_checksum(&src, ChecksumAlgorithm::Sha256);
        let b = calculate_file_checksum(&dst, ChecksumAlgorithm::Sha256);
        match (a, b) {
            (Ok(a), Ok(b)) if checksums_match(&a, &b) => Ok(()),
            (Ok(a), Ok(b)) => Err(BackendError::new(
                BackendErrorCode::Io,
                format!("copy verification failed: {a} != {b}"),
            )),
            (Err(e), _) | (_, Err(e)) => Err(BackendError::new(
                BackendErrorCode::Io,
                format!("copy verification failed: {e}"),
            )),
        }
    })
    .await
    .map_err(|e| BackendError::new(BackendErrorCode::Other, e.to_string()))?
}

impl Transport for LocalTransport {
    fn transfer(
        &self,
        source: &str,
        destination: &str,
        options: &TransportOptions,
    ) -> BackendFuture<'_, ()> {
        let source = source.to_string();
        let destination = destination.to_string();
        let options = options.clone();
        Box::pin(async move { Self::copy_file(&source, &destination, &options).await })
    }
}
