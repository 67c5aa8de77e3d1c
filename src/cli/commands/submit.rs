//! Submit command - post a job to a running server.

use crate::cli::Output;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct JobResponse {
    job_id: String,
}

/// Submit a discovery job over HTTP and print the job id.
pub async fn run_submit(
    input: &str,
    server: &str,
    max_videos: Option<usize>,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/jobs", server.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({
            "input": input,
            "max_videos": max_videos,
        }))
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to reach server at {}: {}", server, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Server rejected job ({}): {}", status, body);
    }

    let job: JobResponse = response.json().await?;
    Output::success(&format!("Job submitted: {}", job.job_id));
    Output::info(&format!(
        "Track progress with: oppsum status --job {}",
        job.job_id
    ));

    Ok(())
}
