use std::path::Path;

use tokio::fs;

use app_error::Result;

/// Write data to a temporary sibling file and move it over the destination
///
/// The move is a rename within the same directory, so readers never observe
/// a partially written destination
pub(crate) async fn temp_and_move(data: &[u8], dest: &Path) -> Result<()> {
    let tmp = dest.with_extension("tmp");

    fs::write(&tmp, data).await?;
    fs::rename(&tmp, dest).await?;

    Ok(())
}
