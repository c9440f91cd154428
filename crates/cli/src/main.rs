// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foreman: command-line companion to the control plane.
//!
//! `foreman run` executes a task through the local task runner and
//! reports the execution to the server after the fact; the remaining
//! subcommands are read-only queries over the HTTP API.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "foreman", about = "Task execution control plane CLI")]
struct Cli {
    /// Server URL
    #[arg(
        long,
        global = true,
        default_value = "http://localhost:8080",
        env = "FOREMAN_SERVER_URL"
    )]
    server: String,

    /// Bearer token
    #[arg(long, global = true, env = "FOREMAN_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a task locally and report the execution to the server
    Run {
        task: String,
        /// key=value pairs exported to the task environment
        #[arg(value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,
        /// Skip the post-hoc report
        #[arg(long)]
        no_report: bool,
    },
    /// List recent job executions
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List fleet nodes
    Nodes,
    /// List recent plan runs
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = commands::Client::new(cli.server, cli.token);
    match cli.command {
        Command::Run {
            task,
            vars,
            no_report,
        } => {
            let exit_code = commands::run(&client, &task, vars, no_report).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
        Command::Jobs { limit } => commands::list_executions(&client, "task", limit).await,
        Command::Nodes => commands::list_nodes(&client).await,
        Command::Runs { limit } => commands::list_executions(&client, "plan", limit).await,
    }
}
