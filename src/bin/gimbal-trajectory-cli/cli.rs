use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;

use gimbal_trajectory::{
    api::{Axis, DiscretizeRequest, PlotRequest, ProfileRequest, ResolutionFields},
    client::TrajectoryClient,
    controller::{format_segments, Debouncer, Workspace},
    render, StepResolution,
};

#[derive(PartialEq, Debug, Clone)]
pub enum CliCommand {
    None,
    SelectAxis(Axis),
    AddRow,
    SetRow {
        row: usize,
        function: String,
        domain: String,
    },
    RemoveRow(usize),
    Show,
    StepAngle(f64),
    Microsteps(u32),
    Plot,
    Discretize,
    DiscretizeAll,
}

#[derive(Debug)]
pub enum CliError {
    Parse(String),
    Exit,
}

/// Editing commands
#[derive(Parser)]
struct Commands {
    #[command(subcommand)]
    command: Com,
}

#[derive(Subcommand)]
enum Com {
    /// Exit from the program
    #[clap(alias = "quit")]
    Exit,

    /// Switch to axis X, Y or Z
    #[clap(alias = "a")]
    Axis { axis: Axis },

    /// Append an empty row
    Add,

    /// Fill in a row: set <row> <function> <domain>
    Set {
        /// Row number, from 1
        #[clap(value_parser = clap::value_parser!(u32).range(1..))]
        row: u32,

        /// e.g. "10*sin(x)"
        function: String,

        /// start,end
        domain: String,
    },

    /// Remove a row, the last one is cleared instead
    #[clap(alias = "remove")]
    Rm {
        #[clap(value_parser = clap::value_parser!(u32).range(1..))]
        row: u32,
    },

    /// Print rows of the current axis
    #[clap(alias = "ls")]
    Show,

    /// Full step angle, degrees
    StepAngle { degrees: f64 },

    /// Microsteps per full step
    Microsteps {
        #[clap(value_parser = clap::value_parser!(u32).range(1..))]
        n: u32,
    },

    /// Refresh plot.png and profile.png now
    Plot,

    /// Discretize the current axis and print the samples
    Discretize,

    /// Write trajectory files for all axes
    All,
}

pub fn parse_cli_command(line: &str) -> Result<CliCommand, CliError> {
    let Ok(mut r) = shellwords::split(line) else {
        return Err(CliError::Parse("Mismatched quotes".to_owned()));
    };

    if r.is_empty() {
        return Ok(CliCommand::None);
    }

    r.insert(0, "CLI".to_string());

    match Commands::try_parse_from(r) {
        Ok(cmd) => Ok(match cmd.command {
            Com::Exit => return Err(CliError::Exit),
            Com::Axis { axis } => CliCommand::SelectAxis(axis),
            Com::Add => CliCommand::AddRow,
            Com::Set {
                row,
                function,
                domain,
            } => CliCommand::SetRow {
                row: row as usize - 1,
                function,
                domain,
            },
            Com::Rm { row } => CliCommand::RemoveRow(row as usize - 1),
            Com::Show => CliCommand::Show,
            Com::StepAngle { degrees } => CliCommand::StepAngle(degrees),
            Com::Microsteps { n } => CliCommand::Microsteps(n),
            Com::Plot => CliCommand::Plot,
            Com::Discretize => CliCommand::Discretize,
            Com::All => CliCommand::DiscretizeAll,
        }),
        Err(e) => Err(CliError::Parse(format!("{}", e))),
    }
}

/// Rows and resolution being edited
pub struct Session {
    pub workspace: Workspace,
    pub resolution: StepResolution,
}

pub struct Context {
    pub session: Arc<Mutex<Session>>,
    pub client: TrajectoryClient,
    pub preview: Debouncer,
}

/// Fetch both images for the current rows and store them in `out_dir`
pub async fn refresh_preview(
    session: Arc<Mutex<Session>>,
    client: TrajectoryClient,
    out_dir: PathBuf,
) {
    let (functions, resolution) = {
        let mut guard = session.lock().await;
        guard.workspace.save_current();
        (guard.workspace.current_rows(), guard.resolution)
    };

    let plot_request = PlotRequest {
        functions: functions.clone(),
    };
    let profile_request = ProfileRequest {
        functions,
        resolution: ResolutionFields::from(resolution),
    };
    let plot = client.plot(&plot_request);
    let profile = client.profile(&profile_request);

    let (plot, profile) = tokio::join!(plot, profile);
    for (name, result) in [("plot.png", plot), ("profile.png", profile)] {
        let written = match result {
            Ok(image) => match render::from_base64(&image.img) {
                Ok(png) => tokio::fs::write(out_dir.join(name), png)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };
        match written {
            Ok(()) => tracing::debug!("{:?} updated", out_dir.join(name)),
            Err(e) => tracing::error!("{}: {}", name, e),
        }
    }
}

fn print_rows(session: &Session) {
    let ws = &session.workspace;
    println!(
        "Axis {} | step angle {} deg, {} microsteps",
        ws.axis(),
        session.resolution.step_angle,
        session.resolution.microsteps
    );
    for (i, row) in ws.rows().iter().enumerate() {
        println!("  {:>2}: {:<30} [{}]", i + 1, row.function, row.domain);
    }
    for axis in Axis::ALL {
        if axis != ws.axis() {
            println!("  {}: {} saved rows", axis, ws.saved(axis).len());
        }
    }
    if let Some(msg) = ws.discretize_readiness().message() {
        println!("{}", msg);
    }
}

pub async fn process_cli_command(ctx: &mut Context, cmd: CliCommand) {
    let edited = {
        let mut session = ctx.session.lock().await;
        let result = match &cmd {
            CliCommand::SelectAxis(axis) => {
                session.workspace.select_axis(*axis);
                Ok(true)
            }
            CliCommand::AddRow => {
                session.workspace.add_row();
                Ok(true)
            }
            CliCommand::SetRow {
                row,
                function,
                domain,
            } => session
                .workspace
                .edit_row(*row, function.as_str(), domain.as_str())
                .map(|_| true),
            CliCommand::RemoveRow(row) => session.workspace.remove_row(*row).map(|_| true),
            CliCommand::StepAngle(degrees) => {
                session.resolution.step_angle = *degrees;
                Ok(true)
            }
            CliCommand::Microsteps(n) => {
                session.resolution.microsteps = *n;
                Ok(true)
            }
            CliCommand::Show => {
                print_rows(&session);
                Ok(false)
            }
            _ => Ok(false),
        };

        match result {
            Ok(edited) => {
                if edited {
                    print_rows(&session);
                }
                edited
            }
            Err(e) => {
                println!("{}", e);
                false
            }
        }
    };

    if edited {
        ctx.preview.trigger();
        return;
    }

    match cmd {
        CliCommand::Plot => ctx.preview.flush().await,
        CliCommand::Discretize => discretize_current(ctx).await,
        CliCommand::DiscretizeAll => discretize_all(ctx).await,
        _ => {}
    }
}

async fn discretize_current(ctx: &Context) {
    let request = {
        let mut session = ctx.session.lock().await;
        session.workspace.save_current();
        DiscretizeRequest {
            functions: session.workspace.current_rows(),
            resolution: session.resolution.into(),
        }
    };

    match ctx.client.discretize(&request).await {
        Ok(res) => println!("{}", format_segments(&res.segments)),
        Err(e) => println!("❌ {}", e),
    }
}

async fn discretize_all(ctx: &Context) {
    let request = {
        let mut session = ctx.session.lock().await;
        session.workspace.save_current();
        if let Some(msg) = session.workspace.discretize_readiness().message() {
            println!("{}", msg);
            return;
        }
        session
            .workspace
            .discretize_all_request(session.resolution.into())
    };

    println!("Discretising… please wait");
    match ctx.client.discretize_all(&request).await {
        Ok(res) => {
            println!("🎉 Functions successfully discretised for X, Y, and Z.");
            for a in res.axes {
                println!("  {}: {} samples, {} us -> {}", a.axis, a.samples, a.dt_us, a.file);
            }
        }
        Err(e) => println!("❌ {}", e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_cli_command("").unwrap(), CliCommand::None);
        assert_eq!(
            parse_cli_command("axis y").unwrap(),
            CliCommand::SelectAxis(Axis::Y)
        );
        assert_eq!(
            parse_cli_command(r#"set 2 "10 * sin(x)" 0,6.28"#).unwrap(),
            CliCommand::SetRow {
                row: 1,
                function: "10 * sin(x)".to_owned(),
                domain: "0,6.28".to_owned()
            }
        );
        assert_eq!(parse_cli_command("rm 1").unwrap(), CliCommand::RemoveRow(0));
        assert_eq!(
            parse_cli_command("step-angle 0.9").unwrap(),
            CliCommand::StepAngle(0.9)
        );
        assert_eq!(
            parse_cli_command("microsteps 32").unwrap(),
            CliCommand::Microsteps(32)
        );
        assert_eq!(parse_cli_command("all").unwrap(), CliCommand::DiscretizeAll);
        assert!(matches!(parse_cli_command("quit"), Err(CliError::Exit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_cli_command("rm 0"), Err(CliError::Parse(_))));
        assert!(matches!(parse_cli_command("axis w"), Err(CliError::Parse(_))));
        assert!(matches!(parse_cli_command("microsteps 0"), Err(CliError::Parse(_))));
        assert!(matches!(parse_cli_command(r#"set 1 "x"#), Err(CliError::Parse(_))));
        assert!(matches!(parse_cli_command("fly"), Err(CliError::Parse(_))));
    }
}
