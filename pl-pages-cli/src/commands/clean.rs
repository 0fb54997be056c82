//! `pl-pages clean`: remove the checkout cache.

use anyhow::{Context, Result};

use pl_pages_core::cache;

pub fn run() -> Result<()> {
    let cache_home = dirs::cache_dir().context("could not determine cache directory")?;
    cache::clean_at(&cache_home).context("failed to clean cache")?;
    println!("removed {}", cache::cache_root_at(&cache_home).display());
    Ok(())
}
