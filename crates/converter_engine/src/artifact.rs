use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};

use crate::api::ConversionApi;
use crate::filename::sanitize_file_name;
use crate::persist::AtomicFileWriter;
use crate::ClientError;

/// Fetches a converted artifact and saves it as `{output_dir}/{file_name}`.
///
/// Any failure is reported as a single error; the caller keeps the job's
/// recorded status untouched.
pub async fn download_artifact(
    api: &dyn ConversionApi,
    location: &str,
    output_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, ClientError> {
    let content = api.fetch_artifact(location).await.map_err(|err| {
        engine_warn!("Download of {} failed: {}", location, err);
        err
    })?;

    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let name = sanitize_file_name(file_name);
    let saved = tokio::task::spawn_blocking(move || writer.write(&name, &content))
        .await
        .map_err(|err| ClientError::Persist(err.to_string()))?
        .map_err(|err| ClientError::Persist(err.to_string()))?;

    engine_info!("Saved {} to {:?}", location, saved);
    Ok(saved)
}
