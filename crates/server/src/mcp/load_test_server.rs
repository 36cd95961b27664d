use executors::{K6Runner, LoadProfile, RunError};
use rmcp::{
    Error as RmcpError, ServerHandler,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool,
};
use serde::Deserialize;

fn default_duration() -> String {
    "30s".to_string()
}

fn default_vus() -> u32 {
    10
}

fn default_ramp_up() -> String {
    "10s".to_string()
}

fn default_sustain() -> String {
    "30s".to_string()
}

fn default_ramp_down() -> String {
    "10s".to_string()
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExecuteTestRequest {
    #[schemars(description = "Path to the k6 test script (.js)")]
    pub script_file: String,
    #[schemars(description = "Duration of the test (e.g., \"30s\", \"1m\", \"5m\")")]
    #[serde(default = "default_duration")]
    pub duration: String,
    #[schemars(description = "Number of virtual users to simulate")]
    #[serde(default = "default_vus")]
    pub vus: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExecuteTestWithOptionsRequest {
    #[schemars(description = "Path to the k6 test script (.js)")]
    pub script_file: String,
    #[schemars(description = "Duration of the test (e.g., \"30s\", \"1m\", \"5m\")")]
    pub duration: String,
    #[schemars(description = "Number of virtual users to simulate")]
    pub vus: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExecuteRampingTestRequest {
    #[schemars(description = "Path to the k6 test script (.js)")]
    pub script_file: String,
    #[schemars(description = "Maximum number of virtual users to ramp up to")]
    pub max_vus: u32,
    #[schemars(description = "Duration to ramp up to max VUs (e.g., \"10s\", \"30s\", \"1m\")")]
    #[serde(default = "default_ramp_up")]
    pub ramp_up_duration: String,
    #[schemars(description = "Duration to sustain max VUs (e.g., \"30s\", \"1m\", \"2m\")")]
    #[serde(default = "default_sustain")]
    pub sustain_duration: String,
    #[schemars(description = "Duration to ramp down to 0 VUs (e.g., \"10s\", \"30s\")")]
    #[serde(default = "default_ramp_down")]
    pub ramp_down_duration: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExecuteSharedIterationsTestRequest {
    #[schemars(description = "Path to the k6 test script (.js)")]
    pub script_file: String,
    #[schemars(description = "Total number of iterations to be shared across all VUs")]
    pub total_iterations: u64,
    #[schemars(description = "Number of virtual users to share the iterations")]
    pub vus: u32,
}

#[derive(Debug, Clone)]
pub struct LoadTestServer {
    runner: K6Runner,
}

impl LoadTestServer {
    pub fn new(runner: K6Runner) -> Self {
        Self { runner }
    }

    async fn execute(&self, script_file: &str, profile: LoadProfile) -> CallToolResult {
        match self.runner.try_run(script_file, &profile).await {
            Ok(stdout) => CallToolResult::success(vec![Content::text(stdout)]),
            Err(e) => tool_error(e),
        }
    }
}

fn tool_error(e: RunError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(e.to_string())])
}

#[tool(tool_box)]
impl LoadTestServer {
    #[tool(description = "Execute a k6 load test.")]
    async fn execute_k6_test(
        &self,
        #[tool(aggr)] ExecuteTestRequest {
            script_file,
            duration,
            vus,
        }: ExecuteTestRequest,
    ) -> Result<CallToolResult, RmcpError> {
        Ok(self
            .execute(&script_file, LoadProfile::fixed(duration, vus))
            .await)
    }

    #[tool(description = "Execute a k6 load test with custom duration and VUs.")]
    async fn execute_k6_test_with_options(
        &self,
        #[tool(aggr)] ExecuteTestWithOptionsRequest {
            script_file,
            duration,
            vus,
        }: ExecuteTestWithOptionsRequest,
    ) -> Result<CallToolResult, RmcpError> {
        Ok(self
            .execute(&script_file, LoadProfile::fixed(duration, vus))
            .await)
    }

    #[tool(
        description = "Execute a k6 load test with ramping virtual users (ramp up, sustain, ramp down)."
    )]
    async fn execute_k6_ramping_test(
        &self,
        #[tool(aggr)] ExecuteRampingTestRequest {
            script_file,
            max_vus,
            ramp_up_duration,
            sustain_duration,
            ramp_down_duration,
        }: ExecuteRampingTestRequest,
    ) -> Result<CallToolResult, RmcpError> {
        let profile = LoadProfile::ramping(
            ramp_up_duration,
            sustain_duration,
            ramp_down_duration,
            max_vus,
        );
        Ok(self.execute(&script_file, profile).await)
    }

    #[tool(description = "Execute a k6 load test with shared iterations across all VUs.")]
    async fn execute_k6_shared_iterations_test(
        &self,
        #[tool(aggr)] ExecuteSharedIterationsTestRequest {
            script_file,
            total_iterations,
            vus,
        }: ExecuteSharedIterationsTestRequest,
    ) -> Result<CallToolResult, RmcpError> {
        Ok(self
            .execute(
                &script_file,
                LoadProfile::shared_iterations(total_iterations, vus),
            )
            .await)
    }
}

#[tool(tool_box)]
impl ServerHandler for LoadTestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "k6".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some("Runs k6 load tests against local .js scripts and returns k6's text output. Use 'execute_k6_test' for a fixed duration and VU count, 'execute_k6_ramping_test' to ramp up, sustain and ramp down, and 'execute_k6_shared_iterations_test' to split a fixed number of iterations across the VUs. Runs block until k6 exits.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use executors::RunnerConfig;

    use super::*;

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text())
            .map(|t| t.text.clone())
            .collect()
    }

    fn server() -> LoadTestServer {
        LoadTestServer::new(K6Runner::new(RunnerConfig::default()))
    }

    #[test]
    fn defaults_fill_in_missing_parameters() {
        let req: ExecuteTestRequest =
            serde_json::from_value(serde_json::json!({ "script_file": "ok.js" })).unwrap();
        assert_eq!(req.duration, "30s");
        assert_eq!(req.vus, 10);

        let req: ExecuteRampingTestRequest =
            serde_json::from_value(serde_json::json!({ "script_file": "ok.js", "max_vus": 50 }))
                .unwrap();
        assert_eq!(req.ramp_up_duration, "10s");
        assert_eq!(req.sustain_duration, "30s");
        assert_eq!(req.ramp_down_duration, "10s");
    }

    #[test]
    fn explicit_variants_require_every_parameter() {
        let missing = serde_json::from_value::<ExecuteTestWithOptionsRequest>(
            serde_json::json!({ "script_file": "ok.js", "vus": 5 }),
        );
        assert!(missing.is_err());

        let missing = serde_json::from_value::<ExecuteSharedIterationsTestRequest>(
            serde_json::json!({ "script_file": "ok.js", "vus": 5 }),
        );
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn missing_script_is_reported_as_tool_error() {
        let result = server()
            .execute_k6_test(ExecuteTestRequest {
                script_file: "missing.js".to_string(),
                duration: default_duration(),
                vus: default_vus(),
            })
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "Error: Script file not found: missing.js");
    }

    #[tokio::test]
    async fn every_tool_validates_before_running() {
        let server = server();
        let script = "no/such/dir/load.js".to_string();
        let expected = format!("Error: Script file not found: {script}");

        let results = [
            server
                .execute_k6_test_with_options(ExecuteTestWithOptionsRequest {
                    script_file: script.clone(),
                    duration: "1m".to_string(),
                    vus: 3,
                })
                .await
                .unwrap(),
            server
                .execute_k6_ramping_test(ExecuteRampingTestRequest {
                    script_file: script.clone(),
                    max_vus: 50,
                    ramp_up_duration: default_ramp_up(),
                    sustain_duration: default_sustain(),
                    ramp_down_duration: default_ramp_down(),
                })
                .await
                .unwrap(),
            server
                .execute_k6_shared_iterations_test(ExecuteSharedIterationsTestRequest {
                    script_file: script.clone(),
                    total_iterations: 1000,
                    vus: 20,
                })
                .await
                .unwrap(),
        ];

        for result in results {
            assert_eq!(text_of(&result), expected);
        }
    }

    #[test]
    fn advertises_tools() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "k6");
        assert!(info.capabilities.tools.is_some());
    }
}

/// Tool calls against a stand-in `k6` on the runner's PATH.
#[cfg(all(test, unix))]
mod process_tests {
    use std::{os::unix::fs::PermissionsExt, path::Path};

    use executors::RunnerConfig;

    use super::*;

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text())
            .map(|t| t.text.clone())
            .collect()
    }

    fn server_with_fake_k6(bin_dir: &Path, body: &str) -> LoadTestServer {
        let k6 = bin_dir.join("k6");
        std::fs::write(&k6, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&k6, std::fs::Permissions::from_mode(0o755)).unwrap();
        LoadTestServer::new(K6Runner::new(RunnerConfig {
            env: vec![("PATH".into(), format!("{}:/bin:/usr/bin", bin_dir.display()))],
        }))
    }

    fn script_in(dir: &Path) -> String {
        let script = dir.join("ok.js");
        std::fs::write(&script, "export default function () {}\n").unwrap();
        script.display().to_string()
    }

    #[tokio::test]
    async fn successful_run_returns_stdout_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with_fake_k6(dir.path(), r#"printf 'summary for %s\n' "$3""#);

        let result = server
            .execute_k6_ramping_test(ExecuteRampingTestRequest {
                script_file: script_in(dir.path()),
                max_vus: 50,
                ramp_up_duration: default_ramp_up(),
                sustain_duration: default_sustain(),
                ramp_down_duration: default_ramp_down(),
            })
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "summary for 10s:50\n");
    }

    #[tokio::test]
    async fn failed_run_is_flagged_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_with_fake_k6(dir.path(), "echo 'threshold p(95) crossed' >&2\nexit 99");

        let result = server
            .execute_k6_shared_iterations_test(ExecuteSharedIterationsTestRequest {
                script_file: script_in(dir.path()),
                total_iterations: 1000,
                vus: 20,
            })
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            text_of(&result),
            "Error executing k6 shared iterations test:\nthreshold p(95) crossed\n"
        );
    }
}
