//! Mirror commands: watch continuously, or synchronize once.

use anyhow::bail;

use crate::config::Settings;
use crate::mirror::Mirror;

fn build(settings: &Settings) -> anyhow::Result<Mirror> {
    let mirror = Mirror::builder()
        .mappings(settings.mappings.iter().cloned())
        .debounce_ms(settings.debounce_ms)
        .build()?;
    Ok(mirror)
}

/// Mirror every mapping until Ctrl-C.
pub async fn run_watch(settings: &Settings) -> anyhow::Result<()> {
    let mirror = build(settings)?;
    mirror.run_until_shutdown().await?;
    Ok(())
}

/// Copy every existing entry once. Fails if any entry could not be mirrored.
pub async fn run_once(settings: &Settings) -> anyhow::Result<()> {
    let mirror = build(settings)?;
    let report = mirror.sync_once().await;
    if report.failed > 0 {
        bail!(
            "{} of {} entries could not be mirrored",
            report.failed,
            report.failed + report.succeeded
        );
    }
    Ok(())
}
