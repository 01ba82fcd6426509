mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    let status = res.status();

    // OK with a database, SERVICE_UNAVAILABLE without one
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );

    let body: Value = res.json().await?;
    let expected = if status == StatusCode::OK { "OK" } else { "degraded" };
    assert_eq!(body["data"]["status"], expected);
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("x-content-type-options").and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Kanban API");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/definitely/not/here")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}
