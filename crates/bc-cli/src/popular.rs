use std::time::Duration;

pub const POPULAR_API: &str = "https://api.bilibili.com/x/web-interface/popular?ps=20&pn=1";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Fetch an API body the way the popular page would.
pub fn fetch(url: &str) -> Result<String, String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(fetch_async(url))
}

async fn fetch_async(url: &str) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    log::debug!("GET {url}");
    let response = client
        .get(url)
        .header(reqwest::header::REFERER, "https://www.bilibili.com/v/popular/all")
        .send()
        .await
        .map_err(|e| format!("Request to '{}' failed: {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("Request to '{}' returned {}", url, status));
    }

    response
        .text()
        .await
        .map_err(|e| format!("Failed to read response body: {}", e))
}
