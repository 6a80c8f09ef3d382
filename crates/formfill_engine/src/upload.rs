use std::path::Path;

use bytes::Bytes;
use formfill_core::{has_pdf_signature, validate_upload, UploadCandidate, UploadLimits};
use formfill_logging::ff_debug;
use tokio::io::AsyncReadExt;

use crate::{ClientError, PersistError, UploadFile};

/// Validates a file on disk and reads it for submission.
///
/// Size and type are checked from metadata before the content is read, so an
/// oversized file is rejected without loading it.
pub async fn read_upload(path: &Path, limits: &UploadLimits) -> Result<UploadFile, ClientError> {
    let metadata = tokio::fs::metadata(path).await.map_err(PersistError::Io)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let candidate = UploadCandidate {
        file_name: file_name.clone(),
        size: metadata.len(),
        // Local files carry no MIME type; the extension decides.
        mime_type: None,
    };
    validate_upload(Some(&candidate), limits)?;

    let bytes = tokio::fs::read(path).await.map_err(PersistError::Io)?;
    ff_debug!("Read {} bytes from {:?}", bytes.len(), path);
    Ok(UploadFile {
        file_name,
        bytes: Bytes::from(bytes),
    })
}

/// Advisory check that the file starts with `%PDF`. Read failures count as a mismatch.
pub async fn sniff_pdf_signature(path: &Path) -> bool {
    let mut header = [0u8; 4];
    let read = async {
        let mut file = tokio::fs::File::open(path).await?;
        file.read_exact(&mut header).await?;
        Ok::<_, std::io::Error>(())
    };
    match read.await {
        Ok(()) => has_pdf_signature(&header),
        Err(_) => false,
    }
}
