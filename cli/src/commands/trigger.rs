use incidentops_core::api::CliError;

use crate::commands::cli::TriggerArgs;
use crate::http::client::DispatchClient;

pub async fn handle_trigger(args: TriggerArgs) -> Result<i32, CliError> {
    let client = DispatchClient::new(&args.url)?;
    let reachable = client.health_check().await.unwrap_or_else(|e| {
        tracing::debug!("dispatch health check failed: {}", e);
        false
    });
    if !reachable {
        return Err(CliError::Command(format!(
            "dispatch service not reachable at {}",
            args.url
        )));
    }
    let ack = client.start(&args.scenario).await?;
    let json = serde_json::to_string_pretty(&ack)
        .map_err(|e| CliError::Command(format!("encode response: {e}")))?;
    println!("{json}");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_dispatch_is_reported() {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);

        let err = handle_trigger(TriggerArgs {
            scenario: "db_latency".into(),
            url: url.clone(),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not reachable"));
        assert!(err.to_string().contains(&url));
    }
}
