use crate::cli::BackendArgs;
use crate::commands::backend_settings;
use crate::commands::output;
use crate::services::captioner::capability::Captioner;
use crate::services::captioner::ollama::OllamaCaptioner;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub model: String,
    pub model_ready: bool,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

pub async fn handle_status(json: bool, args: BackendArgs) -> anyhow::Result<()> {
    let captioner = OllamaCaptioner::new(&backend_settings(&args))?;
    let models = captioner.list_models().await?;
    let problem = captioner.check_available().await.err().map(|e| e.to_string());

    let status = BackendStatus {
        url: captioner.base_url().to_string(),
        model: captioner.model().to_string(),
        model_ready: problem.is_none(),
        models,
        problem,
    };

    output::print_one(json, status, |s| {
        let mut lines = vec![
            format!("backend: {}", s.url),
            format!("model: {} ({})", s.model, if s.model_ready { "ready" } else { "missing" }),
        ];
        if s.models.is_empty() {
            lines.push("installed: none".to_string());
        } else {
            lines.push(format!("installed: {}", s.models.join(", ")));
        }
        lines.join("\n")
    })
}
