//! CLI argument parsing for edithist
//!
//! Defines the Command enum and parse_args_from() for all commands.

use anyhow::{anyhow, Result};
use edit_history::{CodeRegion, ExportFormat, OutputFormat, SliceDirection};
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("edithist - Replay, dependency graphs and slicing over edit logs");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  edithist <command> [arguments]");
    eprintln!("  edithist --help");
    eprintln!("  edithist --version");
    eprintln!();
    eprintln!("  edithist restore --log <FILE> [--path <PATH>] [--branch <NAME>] (--index <N> | --time <T>)");
    eprintln!("  edithist check --log <FILE>...");
    eprintln!("  edithist graph --log <FILE>... [--constructs <FILE>] [--format dot|json] [--project <NAME>]");
    eprintln!("  edithist slice --log <FILE>... [--constructs <FILE>] (--node <KEY> | --region <PATH>:<START>:<LEN>@<TIME> [--branch <NAME>]) [--direction backward|forward]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  restore   Print the text of a file right after one logged operation");
    eprintln!("  check     Replay logs and report consistency violations");
    eprintln!("  graph     Build the dependency graph and export it");
    eprintln!("  slice     Operations affecting (or affected by) a node or code region");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --output <FORMAT>   Output format: human (default), json (compact), or pretty (formatted)");
    eprintln!("  --config <FILE>     Build configuration (JSON)");
    eprintln!();
    eprintln!("Input arguments:");
    eprintln!("  --log <FILE>        JSON array of operations; repeat for several files");
    eprintln!("  --constructs <FILE> JSON table path -> snapshot time -> named code elements");
    eprintln!("  --branch <NAME>     Branch of the restored file or sliced region (default: none)");
    eprintln!();
    eprintln!("Restore arguments:");
    eprintln!("  --path <PATH>       File to restore when the log holds several (default: the only one)");
    eprintln!("  --index <N>         Log index to restore");
    eprintln!("  --time <T>          Restore right after the newest operation at or before T");
    eprintln!();
    eprintln!("Graph arguments:");
    eprintln!("  --format <FORMAT>   Export format: dot (default) or json");
    eprintln!("  --project <NAME>    Project name in the export (default: project)");
    eprintln!();
    eprintln!("Slice arguments:");
    eprintln!("  --node <KEY>        Node key, e.g. op:src/a.rs@1700 or Foo.bar()@1600");
    eprintln!("  --region <REGION>   Characters [START, START+LEN) of PATH right after time TIME");
    eprintln!("  --direction <DIR>   Slice direction: backward (default) or forward");
}

/// What a slice starts from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceCriterion {
    Node(String),
    Region(CodeRegion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreTarget {
    Index(usize),
    Time(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Restore {
        logs: Vec<PathBuf>,
        path: Option<String>,
        branch: String,
        target: RestoreTarget,
    },
    Check {
        logs: Vec<PathBuf>,
    },
    Graph {
        logs: Vec<PathBuf>,
        constructs: Option<PathBuf>,
        format: ExportFormat,
        project: String,
    },
    Slice {
        logs: Vec<PathBuf>,
        constructs: Option<PathBuf>,
        criterion: SliceCriterion,
        direction: SliceDirection,
    },
}

/// Flags accepted by every command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    pub output_format: OutputFormat,
    pub config: Option<PathBuf>,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        GlobalArgs {
            output_format: OutputFormat::Human,
            config: None,
        }
    }
}

/// Result of parsing the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Command, GlobalArgs),
    Help,
    Version,
}

/// Value following the flag at `i`
fn value<'a>(args: &'a [String], i: usize) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires an argument", args[i]))
}

/// Parse `args` (program name first) into an invocation
pub fn parse_args_from(args: &[String]) -> Result<Invocation> {
    let Some(command) = args.get(1) else {
        return Err(anyhow!("Missing command"));
    };

    match command.as_str() {
        "--version" | "-V" => return Ok(Invocation::Version),
        "--help" | "-h" => return Ok(Invocation::Help),
        _ => {}
    }

    let mut global = GlobalArgs::default();
    let mut logs: Vec<PathBuf> = Vec::new();
    let mut constructs: Option<PathBuf> = None;
    let mut path: Option<String> = None;
    let mut branch: Option<String> = None;
    let mut index: Option<usize> = None;
    let mut time: Option<i64> = None;
    let mut format = ExportFormat::Dot;
    let mut project = "project".to_string();
    let mut node: Option<String> = None;
    let mut region: Option<CodeRegion> = None;
    let mut direction = SliceDirection::Backward;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                let raw = value(args, i)?;
                global.output_format = OutputFormat::from_str(raw).ok_or_else(|| {
                    anyhow!("Invalid output format: {}. Must be human, json, or pretty", raw)
                })?;
                i += 2;
            }
            "--config" => {
                global.config = Some(PathBuf::from(value(args, i)?));
                i += 2;
            }
            "--log" => {
                logs.push(PathBuf::from(value(args, i)?));
                i += 2;
            }
            "--constructs" => {
                constructs = Some(PathBuf::from(value(args, i)?));
                i += 2;
            }
            "--path" => {
                path = Some(value(args, i)?.to_string());
                i += 2;
            }
            "--branch" => {
                branch = Some(value(args, i)?.to_string());
                i += 2;
            }
            "--index" => {
                index = Some(value(args, i)?.parse()?);
                i += 2;
            }
            "--time" => {
                time = Some(value(args, i)?.parse()?);
                i += 2;
            }
            "--format" => {
                let raw = value(args, i)?;
                format = ExportFormat::from_str(raw)
                    .ok_or_else(|| anyhow!("Invalid format: {}. Must be dot or json", raw))?;
                i += 2;
            }
            "--project" => {
                project = value(args, i)?.to_string();
                i += 2;
            }
            "--node" => {
                node = Some(value(args, i)?.to_string());
                i += 2;
            }
            "--region" => {
                let raw = value(args, i)?;
                region = Some(CodeRegion::parse(raw).ok_or_else(|| {
                    anyhow!("Invalid region: {}. Expected PATH:START:LEN@TIME", raw)
                })?);
                i += 2;
            }
            "--direction" => {
                let raw = value(args, i)?;
                direction = SliceDirection::from_str(raw).ok_or_else(|| {
                    anyhow!("Invalid direction: {}. Must be backward or forward", raw)
                })?;
                i += 2;
            }
            other => return Err(anyhow!("Unknown argument: {}", other)),
        }
    }

    if logs.is_empty() {
        return Err(anyhow!("--log is required"));
    }

    let command = match command.as_str() {
        "restore" => {
            let target = match (index, time) {
                (Some(index), None) => RestoreTarget::Index(index),
                (None, Some(time)) => RestoreTarget::Time(time),
                (None, None) => return Err(anyhow!("--index or --time is required")),
                (Some(_), Some(_)) => return Err(anyhow!("--index and --time are mutually exclusive")),
            };
            Command::Restore {
                logs,
                path,
                branch: branch.unwrap_or_default(),
                target,
            }
        }
        "check" => Command::Check { logs },
        "graph" => Command::Graph {
            logs,
            constructs,
            format,
            project,
        },
        "slice" => {
            let criterion = match (node, region) {
                (Some(key), None) => SliceCriterion::Node(key),
                (None, Some(region)) => {
                    SliceCriterion::Region(region.with_branch(branch.as_deref().unwrap_or_default()))
                }
                (None, None) => return Err(anyhow!("--node or --region is required")),
                (Some(_), Some(_)) => return Err(anyhow!("--node and --region are mutually exclusive")),
            };
            if branch.is_some() && matches!(criterion, SliceCriterion::Node(_)) {
                return Err(anyhow!("--branch applies to --region; node keys already name their branch"));
            }
            Command::Slice {
                logs,
                constructs,
                criterion,
                direction,
            }
        }
        other => return Err(anyhow!("Unknown command: {}", other)),
    };

    Ok(Invocation::Run(command, global))
}

/// Parse the process arguments
pub fn parse_args() -> Result<Invocation> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("edithist")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_restore_by_index() {
        let parsed = parse_args_from(&args(&["restore", "--log", "ops.json", "--index", "3"])).unwrap();
        assert_eq!(
            parsed,
            Invocation::Run(
                Command::Restore {
                    logs: vec![PathBuf::from("ops.json")],
                    path: None,
                    branch: String::new(),
                    target: RestoreTarget::Index(3),
                },
                GlobalArgs::default()
            )
        );
    }

    #[test]
    fn test_parse_global_flags_anywhere() {
        let parsed = parse_args_from(&args(&[
            "check", "--output", "pretty", "--log", "a.json", "--log", "b.json", "--config", "c.json",
        ]))
        .unwrap();
        let Invocation::Run(Command::Check { logs }, global) = parsed else {
            panic!("expected check");
        };
        assert_eq!(logs.len(), 2);
        assert_eq!(global.output_format, OutputFormat::Pretty);
        assert_eq!(global.config, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn test_parse_slice_region() {
        let parsed = parse_args_from(&args(&[
            "slice", "--log", "a.json", "--region", "src/a.rs:4:2@17", "--direction", "forward",
        ]))
        .unwrap();
        let Invocation::Run(Command::Slice { criterion, direction, .. }, _) = parsed else {
            panic!("expected slice");
        };
        assert_eq!(criterion, SliceCriterion::Region(CodeRegion::new("src/a.rs", 4, 2, 17)));
        assert_eq!(direction, SliceDirection::Forward);
    }

    #[test]
    fn test_parse_branch() {
        let parsed = parse_args_from(&args(&[
            "restore", "--log", "a.json", "--path", "a.rs", "--branch", "dev", "--time", "4",
        ]))
        .unwrap();
        let Invocation::Run(Command::Restore { path, branch, .. }, _) = parsed else {
            panic!("expected restore");
        };
        assert_eq!((path.as_deref(), branch.as_str()), (Some("a.rs"), "dev"));

        let parsed = parse_args_from(&args(&[
            "slice", "--log", "a.json", "--branch", "dev", "--region", "a.rs:0:1@2",
        ]))
        .unwrap();
        let Invocation::Run(Command::Slice { criterion, .. }, _) = parsed else {
            panic!("expected slice");
        };
        assert_eq!(
            criterion,
            SliceCriterion::Region(CodeRegion::new("a.rs", 0, 1, 2).with_branch("dev"))
        );
        assert!(parse_args_from(&args(&["slice", "--log", "a.json", "--branch", "dev", "--node", "k@1"])).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args_from(&args(&[])).is_err());
        assert!(parse_args_from(&args(&["restore", "--log", "a.json"])).is_err());
        assert!(parse_args_from(&args(&["restore", "--index", "1"])).is_err());
        assert!(parse_args_from(&args(&["slice", "--log", "a.json"])).is_err());
        assert!(parse_args_from(&args(&["graph", "--log", "a.json", "--format", "csv"])).is_err());
        assert!(parse_args_from(&args(&["bogus", "--log", "a.json"])).is_err());
        assert!(parse_args_from(&args(&["check", "--log"])).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args_from(&args(&["--help"])).unwrap(), Invocation::Help);
        assert_eq!(parse_args_from(&args(&["-V"])).unwrap(), Invocation::Version);
    }
}
