use emsurvey_common::types::CreateRegionRequest;
use emsurvey_storage::SurveyStore;

/// Seed built-in preset regions on startup. Only runs against an empty
/// region table, so presets an admin deleted are not brought back.
pub async fn init_default_regions(store: &SurveyStore) -> anyhow::Result<usize> {
    let inserted = store.seed_preset_regions_if_empty().await?;
    if inserted > 0 {
        tracing::info!(inserted, "Preset regions initialized");
    }
    Ok(inserted)
}

/// Insert every preset region that is missing, including deleted ones.
pub async fn sync_preset_regions(store: &SurveyStore) -> anyhow::Result<usize> {
    let inserted = store.ensure_preset_regions().await?;
    tracing::info!(inserted, "Preset regions synced");
    Ok(inserted)
}

/// Initialize custom regions from a JSON seed file.
///
/// Entries are inserted in file order, so parents must precede their
/// children. Existing codes are skipped; entries whose parent is unknown
/// are skipped with a warning.
pub async fn init_from_seed_file(store: &SurveyStore, seed_path: &str) -> anyhow::Result<usize> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: crate::config::RegionsSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let total = seed.regions.len();
    let mut inserted = 0usize;
    for r in seed.regions {
        if store.get_region(&r.code).await?.is_some() {
            continue;
        }
        if let Some(ref parent) = r.parent_code {
            if store.get_region(parent).await?.is_none() {
                tracing::warn!(code = %r.code, parent = %parent, "Skipping region with unknown parent");
                continue;
            }
        }
        store
            .create_region(&CreateRegionRequest {
                code: r.code,
                name: r.name,
                parent_code: r.parent_code,
                sort_order: r.sort_order,
            })
            .await?;
        inserted += 1;
    }
    tracing::info!(total, inserted, skipped = total - inserted, "init-regions completed");
    Ok(inserted)
}
