use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mixdeck_core::{
    EngineConfig, MixRequest, MixService, config_schema, diagnostics::init_tracing,
    fixtures::write_demo_stems,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "mixdeck-cli")]
#[command(about = "Headless tools for Mixdeck mix jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mix the given stems and print the final job status.
    Mix {
        #[arg(long)]
        session: String,

        /// `name=path`, repeatable.
        #[arg(long = "stem", value_parser = parse_stem, required = true)]
        stems: Vec<(String, PathBuf)>,

        #[arg(long)]
        recipe: Option<String>,

        #[arg(long, default_value = "data/mixes")]
        output_dir: PathBuf,
    },
    /// Print role presets and recipes as JSON.
    Schema,
    /// Write synthetic stems and mix them.
    Demo {
        #[arg(long, default_value = "data/demo")]
        output_dir: PathBuf,

        #[arg(long, default_value_t = 4.0)]
        seconds: f32,

        #[arg(long)]
        recipe: Option<String>,
    },
}

fn parse_stem(value: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=path, got {value}"))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected name=path, got {value}"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

async fn run_mix(request: MixRequest, output_dir: PathBuf) -> anyhow::Result<()> {
    let service = MixService::new(EngineConfig::default().with_output_dir(output_dir));
    let job_id = service.submit(request)?;
    let status = service
        .wait_for_terminal(job_id, POLL_INTERVAL)
        .await
        .context("job disappeared from the registry")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if let Some(error) = status.error {
        anyhow::bail!("mix failed: {error}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_tracing(&cli.log_dir)?;

    match cli.command {
        Commands::Mix {
            session,
            stems,
            recipe,
            output_dir,
        } => {
            let mut request = MixRequest::new(session);
            for (name, path) in stems {
                request = request.with_stem(name, path);
            }
            if let Some(recipe) = recipe {
                request = request.with_recipe(recipe);
            }
            run_mix(request, output_dir).await?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&config_schema())?);
        }
        Commands::Demo {
            output_dir,
            seconds,
            recipe,
        } => {
            let stems = write_demo_stems(&output_dir.join("stems"), 44_100, seconds)?;
            let mut request = MixRequest::new("demo");
            for (name, path) in stems {
                request = request.with_stem(name, path);
            }
            if let Some(recipe) = recipe {
                request = request.with_recipe(recipe);
            }
            run_mix(request, output_dir).await?;
            tracing::info!("demo mix finished");
        }
    }

    Ok(())
}
