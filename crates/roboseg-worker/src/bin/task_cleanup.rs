use roboseg_models::TaskId;
use roboseg_worker::{cleanup_task_files, PipelineConfig};

/// Remove the stored video files of the given tasks from the upload directory.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();

    let task_ids: Vec<String> = std::env::args().skip(1).collect();
    if task_ids.is_empty() {
        anyhow::bail!("usage: task-cleanup <task_id>...");
    }

    for raw in task_ids {
        let task_id = TaskId::from_string(raw);
        let removed = cleanup_task_files(&config.storage_dir, &task_id)
            .await
            .map_err(|e| anyhow::anyhow!("cleanup of task {} failed: {}", task_id, e))?;
        println!("task-cleanup: {} removed {} file(s)", task_id, removed);
    }

    Ok(())
}
