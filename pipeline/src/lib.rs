use devboard_engine::{BatchReport, Engine, TextGenerator};
use tracing::{info, instrument};

pub mod config;
pub mod history;
pub mod llm;
pub mod metrics;
pub mod notify;
pub mod storage;

use config::Env;
use history::HistoryDir;
use llm::ChatCompletions;
use storage::OutputLayout;

fn generator(env: &Env) -> anyhow::Result<Option<ChatCompletions>> {
    match env.llm_api_key.as_deref().filter(|key| !key.is_empty()) {
        Some(key) => Ok(Some(ChatCompletions::new(
            env.llm_endpoint.clone(),
            env.llm_model.clone(),
            key.to_string(),
            std::time::Duration::from_secs(env.llm_timeout_secs),
        )?)),
        None => {
            info!("LLM_API_KEY is not set, summaries keep their previous text");
            Ok(None)
        }
    }
}

/// One batch: read the history, score it, write the output tree. Nothing is
/// written until every stage has finished.
#[instrument(skip_all, fields(history = %env.history_dir.display(), output = %env.output_dir.display()))]
pub async fn run(env: &Env) -> anyhow::Result<BatchReport> {
    let engine = Engine::new(env.load_engine_config()?)?;
    let source = HistoryDir::new(&env.history_dir);
    let generator = generator(env)?;

    let report = engine
        .run(
            &source,
            &env.batch_request(),
            generator.as_ref().map(|g| g as &dyn TextGenerator),
        )
        .await?;

    let artifacts = storage::plan(&OutputLayout::new(&env.output_dir), &report)?;
    storage::persist(artifacts, env.force)?;
    Ok(report)
}
