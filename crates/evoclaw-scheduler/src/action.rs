//! Firing one `Action`.

use evoclaw_core::{Error, Result};
use evoclaw_security::SandboxPolicy;
use tokio::process::Command;

use crate::executor::ActionExecutor;
use crate::job::Action;

pub async fn fire(action: &Action, executor: &dyn ActionExecutor, http_client: &reqwest::Client, sandbox: &SandboxPolicy) -> Result<String> {
    match action {
        Action::Shell { command } => fire_shell(command, sandbox).await,
        Action::Agent { agent_id, message } => executor.execute_agent(agent_id.as_str(), message).await,
        Action::Mqtt { topic, payload } => {
            executor.publish_mqtt(topic, payload).await?;
            Ok(String::new())
        }
        Action::Http { url, headers, json, .. } => fire_http(http_client, action.http_method(), url, headers, json.as_ref()).await,
    }
}

async fn fire_shell(command: &str, sandbox: &SandboxPolicy) -> Result<String> {
    sandbox.validate_command(command)?;

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| Error::internal(format!("failed to spawn shell: {e}")))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        Err(Error::internal(format!("shell command exited with {}: {combined}", output.status)))
    }
}

async fn fire_http(
    client: &reqwest::Client,
    method: &str,
    url: &str,
    headers: &std::collections::HashMap<String, String>,
    json: Option<&serde_json::Value>,
) -> Result<String> {
    let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| Error::invalid_argument(format!("invalid http method: {method}")))?;
    let mut req = client.request(method, url);
    for (k, v) in headers {
        req = req.header(k, v);
    }
    if let Some(body) = json {
        req = req.json(body);
    }

    let resp = req.send().await.map_err(|e| Error::internal(format!("http action request failed: {e}")))?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if status.as_u16() >= 400 {
        Err(Error::internal(format!("http action returned status {status}: {body}")))
    } else {
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::UnconfiguredExecutor;
    use evoclaw_security::AutonomyLevel;

    fn sandbox() -> SandboxPolicy {
        SandboxPolicy::new(AutonomyLevel::Full, vec!["echo".into(), "exit".into()], std::env::temp_dir())
    }

    #[tokio::test]
    async fn shell_action_succeeds_on_zero_exit() {
        let action = Action::Shell { command: "echo hello".to_string() };
        let out = fire(&action, &UnconfiguredExecutor, &reqwest::Client::new(), &sandbox()).await.unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn shell_action_fails_on_nonzero_exit() {
        let action = Action::Shell { command: "exit 7".to_string() };
        assert!(fire(&action, &UnconfiguredExecutor, &reqwest::Client::new(), &sandbox()).await.is_err());
    }

    #[tokio::test]
    async fn shell_action_rejected_when_binary_not_allow_listed() {
        let action = Action::Shell { command: "rm -rf /".to_string() };
        let err = fire(&action, &UnconfiguredExecutor, &reqwest::Client::new(), &sandbox()).await.unwrap_err();
        assert_eq!(err.kind, evoclaw_core::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn agent_action_without_executor_is_unavailable() {
        let action = Action::Agent { agent_id: evoclaw_core::AgentId::from("a1"), message: "hi".into() };
        let err = fire(&action, &UnconfiguredExecutor, &reqwest::Client::new(), &sandbox()).await.unwrap_err();
        assert_eq!(err.kind, evoclaw_core::ErrorKind::Unavailable);
    }
}
