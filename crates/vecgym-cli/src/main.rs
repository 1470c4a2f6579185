//! vecgym CLI
//!
//! Lists the built-in environments, runs a worker that hosts remote
//! replicas, and rolls out random policies through `ParallelEnv`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use vecgym::remote::WorkerServer;
use vecgym::utils::{abbreviate, format_duration};
use vecgym::vector::{ParallelEnv, ParallelEnvConfig};

#[derive(Parser)]
#[command(name = "vecgym")]
#[command(version, about = "vecgym - vectorized RL environments, local or remote", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available environments
    List,

    /// Host remote replicas until interrupted
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8010")]
        addr: String,
    },

    /// Roll out a random policy across parallel replicas
    Run {
        /// Environment id
        #[arg(default_value = "Pendulum-v1")]
        env: String,

        /// Number of replicas (overrides the config file)
        #[arg(long)]
        num_envs: Option<usize>,

        /// Batched steps to take
        #[arg(long, default_value = "1000")]
        steps: usize,

        /// Base seed; replica i uses seed + i
        #[arg(long)]
        seed: Option<u64>,

        /// Worker address; replicas run remotely when set
        #[arg(long)]
        worker_addr: Option<String>,

        /// JSON file with a ParallelEnvConfig
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => list_envs(),
        Commands::Serve { addr } => serve(&addr)?,
        Commands::Run {
            env,
            num_envs,
            steps,
            seed,
            worker_addr,
            config,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => ParallelEnvConfig::new(4),
            };
            if let Some(n) = num_envs {
                config.env_num = n;
            }
            if worker_addr.is_some() {
                config.worker_addr = worker_addr;
            }
            run(&env, steps, seed, &config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ParallelEnvConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn serve(addr: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = WorkerServer::bind(addr, vecgym_envs::registry()).await?;
        server
            .serve_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    })?;
    Ok(())
}

fn run(env_id: &str, steps: usize, seed: Option<u64>, config: &ParallelEnvConfig) -> Result<()> {
    let registry = vecgym_envs::registry();
    let mut envs = ParallelEnv::new(env_id, seed, config, &registry)?;
    let n = envs.num_envs();
    let action_space = envs.action_space().clone();
    let action_len: usize = action_space.shape().iter().product();

    tracing::info!(
        env = env_id,
        num_envs = n,
        steps,
        remote = envs.is_remote(),
        obs_shape = ?envs.observation_space().shape(),
        "Starting rollout"
    );

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let start = Instant::now();
    envs.reset()?;

    let mut episodes = 0usize;
    let mut return_sum = 0.0f32;
    for _ in 0..steps {
        let mut actions = Array2::zeros((n, action_len));
        for mut row in actions.rows_mut() {
            let sample = action_space.sample(&mut rng);
            row.iter_mut().zip(sample.iter()).for_each(|(a, s)| *a = *s);
        }

        let step = envs.step(&actions)?;
        for (i, info) in step.infos.iter().enumerate() {
            if let (Some(ret), Some(len)) = (info.episode_return, info.episode_length) {
                episodes += 1;
                return_sum += ret;
                tracing::info!(env = i, episode_return = ret, episode_length = len, "Episode");
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    let total = envs.total_steps();
    envs.close()?;

    let sps = if elapsed > 0.0 { (total as f64 / elapsed) as u64 } else { 0 };
    let mean_return = if episodes > 0 { return_sum / episodes as f32 } else { 0.0 };
    println!(
        "Finished {} steps in {} ({} steps/s), {} episodes, mean return {:.3}",
        abbreviate(total),
        format_duration(elapsed),
        abbreviate(sps),
        episodes,
        mean_return
    );

    Ok(())
}

fn list_envs() {
    let registry = vecgym_envs::registry();
    println!("Available environments:");
    println!();
    for id in registry.ids() {
        let max_steps = registry
            .spec(id)
            .map(|spec| spec.max_episode_steps)
            .unwrap_or_default();
        println!("  {:<14} max {} steps", id, max_steps);
    }
}
