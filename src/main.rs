//! edithist CLI - replay, dependency graphs and slicing over edit logs
//!
//! Usage: edithist <command> [arguments]

mod check_cmd;
mod cli;
mod common;
mod graph_cmd;
mod restore_cmd;
mod slice_cmd;

use std::process::ExitCode;

use cli::{parse_args, print_usage, Command, GlobalArgs, Invocation};
use common::report_error;

fn run(command: Command, global: GlobalArgs) -> anyhow::Result<u8> {
    let GlobalArgs {
        output_format,
        config,
    } = global;

    match command {
        Command::Restore {
            logs,
            path,
            branch,
            target,
        } => {
            restore_cmd::run_restore(logs, path, branch, target, output_format)?;
            Ok(0)
        }
        Command::Check { logs } => check_cmd::run_check(logs, output_format),
        Command::Graph {
            logs,
            constructs,
            format,
            project,
        } => {
            graph_cmd::run_graph(logs, constructs, format, project, config, output_format)?;
            Ok(0)
        }
        Command::Slice {
            logs,
            constructs,
            criterion,
            direction,
        } => {
            slice_cmd::run_slice(logs, constructs, criterion, direction, config, output_format)?;
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    let (command, global) = match parse_args() {
        Ok(Invocation::Run(command, global)) => (command, global),
        Ok(Invocation::Help) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            println!("{}", edit_history::version::version());
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::from(1);
        }
    };

    let output_format = global.output_format;
    match run(command, global) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report_error(&e, output_format);
            ExitCode::from(1)
        }
    }
}
