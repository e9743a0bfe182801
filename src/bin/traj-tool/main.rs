mod cli;

use std::io::Write;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gimbal_trajectory::Trajectory;

use cli::{Cli, Command};

fn print_info(trajectory: &Trajectory, count: usize, mut out: impl Write) -> std::io::Result<()> {
    let header = &trajectory.header;
    writeln!(out, "Header:")?;
    write!(out, "{}", header)?;
    writeln!(
        out,
        "Rate: {:.3} Hz, duration {:.6} s",
        header.rate_hz(),
        header.total_samples.saturating_sub(1) as f64 * header.sample_dt_us as f64 / 1e6
    )?;

    writeln!(out, "First {} samples:", count.min(trajectory.samples.len()))?;
    for (i, (t, a)) in trajectory
        .times()
        .zip(trajectory.samples.iter())
        .take(count)
        .enumerate()
    {
        writeln!(out, "  [{:>3}] t={:.6} s  angle={:.6} deg", i, t, a)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traj_tool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();

    match args.command {
        Command::Info {
            filename,
            axis,
            count,
        } => {
            let trajectory = Trajectory::load(&filename, axis)?;
            tracing::debug!("{:?}: {} samples", filename, trajectory.samples.len());
            print_info(&trajectory, count, std::io::stdout().lock())?;
        }
        Command::Csv {
            filename,
            output,
            axis,
        } => {
            let trajectory = Trajectory::load(&filename, axis)?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    trajectory.write_csv(std::io::BufWriter::new(file))?;
                    tracing::info!("{} samples written to {:?}", trajectory.samples.len(), path);
                }
                None => trajectory.write_csv(std::io::stdout().lock())?,
            }
        }
    }

    Ok(())
}
