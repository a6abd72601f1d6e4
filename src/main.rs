use clap::Parser;
use snapsync::cli::Cli;
use snapsync::logging::{self, SessionSink};
use snapsync::{dispatch, sysexits};
use std::process;
use tokio::runtime::Builder;

/// Entry point for the snapsync CLI application.
/// Parses command-line arguments, runs the command and maps the outcome to an exit status.
fn main() {
    let cli = Cli::parse();
    let Some(command) = cli.command.clone() else {
        eprintln!("snapsync requires a command to execute. See 'snapsync --help' for usage.");
        process::exit(sysexits::EX_KEYWORD);
    };

    let sink = SessionSink::new();
    logging::init(cli.verbosity(), &sink);
    let overrides = cli.overrides();

    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            process::exit(sysexits::EX_OSERR);
        }
    };

    // Handlers are installed before the lock is taken.
    let shutdown = {
        let _guard = runtime.enter();
        shutdown_signal()
    };
    let code = match runtime.block_on(dispatch::run(command, &overrides, &sink, shutdown)) {
        Ok(()) => sysexits::EX_OK,
        Err(e) => e.exit_code(),
    };
    // Do not wait for a pending confirmation prompt.
    runtime.shutdown_background();
    process::exit(code);
}

/// Registers SIGINT and SIGTERM handlers and resolves with the name of the
/// first signal received. A handler that cannot be installed never fires.
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = &'static str> {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    async fn recv(signal: std::io::Result<Signal>, name: &'static str) -> &'static str {
        match signal {
            Ok(mut signal) => {
                signal.recv().await;
                name
            }
            Err(_) => std::future::pending().await,
        }
    }

    let interrupt = recv(signal(SignalKind::interrupt()), "SIGINT");
    let terminate = recv(signal(SignalKind::terminate()), "SIGTERM");
    async move {
        tokio::select! {
            name = interrupt => name,
            name = terminate => name,
        }
    }
}

#[cfg(windows)]
fn shutdown_signal() -> impl Future<Output = &'static str> {
    let ctrl_c = tokio::signal::windows::ctrl_c();
    async move {
        match ctrl_c {
            Ok(mut ctrl_c) => {
                ctrl_c.recv().await;
                "Ctrl-C"
            }
            Err(_) => std::future::pending().await,
        }
    }
}
