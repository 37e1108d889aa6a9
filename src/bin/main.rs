use nix::{sys::signal, unistd::Pid};
use std::{error::Error, os::unix::io::IntoRawFd};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipemgr::{
    cli::{Cli, Commands, parse_args},
    config::load_config,
    constants::{GLYPH_ERR, GLYPH_IDLE},
    ipc::{self, ControlCommand, ControlError, ControlResponse},
    supervisor::PipelineSupervisor,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    match args.command {
        Commands::Serve { config, daemonize } => {
            if supervisor_running() {
                warn!("pipemgr supervisor already running; aborting duplicate start");
                return Ok(());
            }

            let config = load_config(config.as_deref())?;
            if daemonize {
                daemonize_pipemgr()?;
            }

            info!("Starting pipemgr supervisor");
            let supervisor = PipelineSupervisor::new(config);
            supervisor.run()?;
        }
        Commands::Start { service, env } => {
            forward(ControlCommand::Start {
                service,
                environment: env,
            })?;
        }
        Commands::Trigger => forward(ControlCommand::Trigger)?,
        Commands::Stop => forward(ControlCommand::Stop)?,
        Commands::Run { service, env } => {
            forward(ControlCommand::Run {
                service,
                environment: env,
            })?;
        }
        Commands::Status { json } => match ipc::send_command(&ControlCommand::Status {
            json,
        }) {
            Ok(ControlResponse::Message(message)) => println!("{message}"),
            Ok(_) => {}
            Err(ControlError::NotAvailable) => {
                let _ = ipc::cleanup_runtime();
                println!("{GLYPH_IDLE} No supervisor running. Start it with `pmg serve`");
            }
            Err(err) => return Err(err.into()),
        },
        Commands::Shutdown => forward(ControlCommand::Shutdown)?,
    }

    Ok(())
}

/// Sends one operation to the resident supervisor and prints its report.
fn forward(command: ControlCommand) -> Result<(), Box<dyn Error>> {
    match ipc::send_command(&command) {
        Ok(ControlResponse::Message(message)) => {
            println!("{message}");
            Ok(())
        }
        Ok(ControlResponse::Ok) => Ok(()),
        Ok(ControlResponse::Error(message)) => Err(ControlError::Server(message).into()),
        Err(ControlError::NotAvailable) => {
            let _ = ipc::cleanup_runtime();
            println!("{GLYPH_ERR} No supervisor running. Start it with `pmg serve`");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn supervisor_running() -> bool {
    match ipc::read_supervisor_pid() {
        Ok(Some(pid)) => {
            let target = Pid::from_raw(pid);
            match signal::kill(target, None) {
                Ok(_) => true,
                Err(err) => {
                    if err == nix::errno::Errno::ESRCH {
                        let _ = ipc::cleanup_runtime();
                        false
                    } else {
                        warn!("Failed to query supervisor pid {pid}: {err}");
                        false
                    }
                }
            }
        }
        Ok(None) | Err(_) => false,
    }
}

fn daemonize_pipemgr() -> std::io::Result<()> {
    if unsafe { libc::fork() } > 0 {
        std::process::exit(0);
    }

    unsafe {
        libc::setsid();
    }

    if unsafe { libc::fork() } > 0 {
        std::process::exit(0);
    }

    unsafe {
        libc::setpgid(0, 0);
    }

    let devnull = std::fs::File::open("/dev/null")?;
    let fd = devnull.into_raw_fd();
    unsafe {
        let _ = libc::dup2(fd, libc::STDIN_FILENO);
        let _ = libc::dup2(fd, libc::STDOUT_FILENO);
        let _ = libc::dup2(fd, libc::STDERR_FILENO);
        libc::close(fd);
    }

    Ok(())
}
