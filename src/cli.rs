// File: ./src/cli.rs
//! Shared command-line interface logic: argument parsing and help text.
use crate::model::RepeatPolicy;
use anyhow::{Result, bail};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show what the extractor makes of a sentence.
    Parse { text: String },
    /// Create an alarm from a sentence.
    Add { text: String, repeat: RepeatPolicy },
    List,
    Toggle { id: String },
    Remove { id: String },
    /// Run the matcher in the foreground until interrupted.
    Watch,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub root: Option<PathBuf>,
    pub command: Command,
}

/// Parses `args` (without the binary name). Free text after `parse`/`add` is
/// joined with single spaces so unquoted sentences work too.
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut root = None;
    let mut repeat = None;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-h" | "--help" => {
                return Ok(Invocation {
                    root,
                    command: Command::Help,
                });
            }
            "-r" | "--root" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--root needs a path");
                };
                root = Some(PathBuf::from(path));
                i += 1;
            }
            "--repeat" => {
                let Some(value) = args.get(i + 1) else {
                    bail!("--repeat needs one of: none, daily, weekdays, weekly");
                };
                let Ok(policy) = RepeatPolicy::from_str(value) else {
                    bail!("Unknown repeat policy '{}'", value);
                };
                repeat = Some(policy);
                i += 1;
            }
            _ => positional.push(arg),
        }
        i += 1;
    }

    let Some((&verb, rest)) = positional.split_first() else {
        return Ok(Invocation {
            root,
            command: Command::Help,
        });
    };

    let text = rest.join(" ");
    let single = |name: &str| -> Result<String> {
        match rest {
            [id] => Ok(id.to_string()),
            _ => bail!("'{}' takes exactly one alarm id", name),
        }
    };

    if repeat.is_some() && verb != "add" {
        bail!("--repeat only applies to 'add'");
    }

    let command = match verb {
        "help" => Command::Help,
        "parse" | "add" if text.trim().is_empty() => bail!("'{}' needs some text", verb),
        "parse" => Command::Parse { text },
        "add" => Command::Add {
            text,
            repeat: repeat.unwrap_or_default(),
        },
        "list" | "ls" => Command::List,
        "toggle" => Command::Toggle {
            id: single("toggle")?,
        },
        "remove" | "rm" => Command::Remove {
            id: single("remove")?,
        },
        "watch" => Command::Watch,
        other => bail!("Unknown command '{}'. Try --help.", other),
    };

    Ok(Invocation { root, command })
}

pub fn print_help(binary_name: &str) {
    println!(
        "Remindful v{} - Chinese natural-language alarms",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] <command>", binary_name);
    println!();
    println!("COMMANDS:");
    println!("    parse <text>                   Show the date, time and title found in <text>");
    println!("    add <text> [--repeat <rule>]   Create an alarm from <text>");
    println!("    list                           List alarms");
    println!("    toggle <id>                    Enable or disable an alarm (id prefix accepted)");
    println!("    remove <id>                    Delete an alarm");
    println!("    watch                          Ring alarms until Ctrl-C");
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    --repeat <rule>       none (default), daily, weekdays, weekly");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("RECOGNIZED EXPRESSIONS:");
    println!("    2024年3月5日 / 3月5号        Absolute dates (past month-day rolls to next year)");
    println!("    今天 明天 后天 大后天         Relative days");
    println!("    周三 星期五 本周日            This week (already passed: next week)");
    println!("    下周一 下个星期天             Next calendar week");
    println!("    早上8点 下午3点半 晚上9:15    Times with a part of day");
    println!("    14:30 / 10点20分 / 7点        Plain times");
    println!();
    println!("EXAMPLES:");
    println!("    {} add 明天早上9点开会", binary_name);
    println!("    {} add 工作日早上7点半起床 --repeat weekdays", binary_name);
    println!("    {} parse 提醒我下周六下午3点去超市", binary_name);
    println!();
    println!("MORE INFO:");
    println!("    License:    GPL-3.0");
}
