use anyhow::{bail, Context};
use research_loop::cli::output::Output;
use research_loop::cli::review::TerminalReviewChannel;
use research_loop::cli::{Cli, Commands};
use research_loop::db::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use research_loop::db::evidence::EvidenceStore;
use research_loop::utils::toml_config::LoggingConfig;
use research_loop::{
    ResearchConfig, ResearchServices, ReviewDecision, RunOutcome, Stage, WorkflowEngine,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let mut config = ResearchConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Run {
            question,
            max_iterations,
            fresh,
            detach,
        } => {
            if let Some(max) = max_iterations {
                config.workflow.max_iterations = max;
            }
            if fresh {
                config.workflow.clear_store_on_start = true;
            }
            config.validate()?;

            let engine = connect(config).await?;
            output.banner();
            output.info(&format!("Researching: {}", question));

            let mut outcome = engine.start(&question).await?;
            if !detach {
                let mut channel = TerminalReviewChannel::stdio(!cli.no_color);
                outcome = engine.drive(outcome, &mut channel).await?;
            }
            report_outcome(&output, &outcome)
        }

        Commands::Resume {
            session_id,
            approve,
            reject,
            changes,
            abort,
        } => {
            let decision = match (approve, reject, abort) {
                (true, _, _) => Some(ReviewDecision::Approve),
                (_, Some(feedback), _) => Some(ReviewDecision::Reject {
                    feedback,
                    change_requests: changes,
                }),
                (_, _, true) => Some(ReviewDecision::Abort),
                _ => None,
            };

            let engine = connect(config).await?;
            let outcome = match decision {
                Some(decision) => engine.resume(&session_id, decision).await?,
                None => {
                    let pending = engine.status(&session_id).await?;
                    let mut channel = TerminalReviewChannel::stdio(!cli.no_color);
                    engine.drive(pending, &mut channel).await?
                }
            };
            report_outcome(&output, &outcome)
        }

        Commands::Show { session_id } => {
            let checkpoints = SqliteCheckpointStore::open(&config.workflow.checkpoint_path).await?;
            let Some(state) = checkpoints.load(&session_id).await? else {
                bail!("no session {}", session_id);
            };

            output.header(&state.question);
            output.kv("Session", &state.session_id);
            output.kv("Stage", state.stage.name());
            output.kv("Iteration", &state.iteration.to_string());
            output.kv("Sources", &state.scraped_pages.len().to_string());
            for error in &state.errors {
                output.list_item(error);
            }
            match (&state.final_report, state.best_draft()) {
                (Some(report), _) => output.report(report),
                (None, Some(draft)) if state.stage == Stage::Review => {
                    output.report(draft);
                    output.hint("This draft is awaiting review:");
                    output.command(&format!("research-loop resume {}", state.session_id));
                }
                _ => {}
            }
            Ok(())
        }

        Commands::Sessions => {
            let checkpoints = SqliteCheckpointStore::open(&config.workflow.checkpoint_path).await?;
            let sessions = checkpoints.list().await?;
            if sessions.is_empty() {
                output.info("No sessions");
                return Ok(());
            }

            output.table_header(&["Session", "Stage", "Iteration", "Updated", "Question"]);
            for session in &sessions {
                let short_id: String = session.session_id.chars().take(13).collect();
                let iteration = session.iteration.to_string();
                let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();
                output.table_row(&[
                    short_id.as_str(),
                    session.stage.name(),
                    iteration.as_str(),
                    updated.as_str(),
                    session.question.as_str(),
                ]);
            }
            Ok(())
        }

        Commands::ClearStore { yes } => {
            if !yes && !output.confirm("Delete every indexed chunk from the evidence store?") {
                output.info("Nothing deleted");
                return Ok(());
            }
            let store = ResearchServices::evidence_store(&config).await?;
            store.clear().await?;
            output.success("Evidence store cleared");
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect(config: ResearchConfig) -> anyhow::Result<WorkflowEngine> {
    let services = ResearchServices::from_config(&config)
        .await
        .context("connecting research services")?;
    Ok(WorkflowEngine::new(services, config))
}

fn report_outcome(output: &Output, outcome: &RunOutcome) -> anyhow::Result<()> {
    match outcome {
        RunOutcome::AwaitingReview { session_id, draft } => {
            output.success(&format!("Draft ready for review: {}", draft.title));
            output.kv("Session", session_id);
            output.hint("Review it with:");
            output.command(&format!("research-loop resume {}", session_id));
            Ok(())
        }
        RunOutcome::Completed {
            session_id,
            report,
            forced,
            report_path,
        } => {
            output.report(report);
            if *forced {
                output.warning(
                    "Iteration limit reached; the report may not address the latest feedback",
                );
            }
            output.kv("Session", session_id);
            if let Some(path) = report_path {
                output.kv("Report", &path.display().to_string());
            }
            output.complete("Research complete");
            Ok(())
        }
        RunOutcome::Aborted { session_id } => {
            output.warning(&format!("Session {} aborted; no report produced", session_id));
            Ok(())
        }
        RunOutcome::Failed {
            session_id,
            errors,
            best_draft,
        } => {
            for error in errors {
                output.error(error);
            }
            if let Some(draft) = best_draft {
                output.warning("Best available draft:");
                output.report(draft);
            }
            bail!("session {} failed", session_id)
        }
    }
}
