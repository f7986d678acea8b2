use std::path::Path;

use roboseg_worker::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();

    println!(
        "worker-selfcheck: starting with storage_dir={}",
        config.storage_dir.display()
    );
    ensure_storage_writable(&config.storage_dir).await?;
    ensure_env_present(&["GEMINI_API_KEY", "REDIS_URL"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_storage_writable<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(format!(".selfcheck-{}", std::process::id()));
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("storage dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => {}
            _ => return Err(anyhow::anyhow!("missing required env var {}", var)),
        }
    }
    Ok(())
}
