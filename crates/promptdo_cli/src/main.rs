//! PromptDo command-line front end.
//!
//! # Responsibility
//! - Parse commands and drive `promptdo_core` services.
//! - Surface every failure as a blocking notice on stderr with exit code 1.

mod render;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::warn;
use promptdo_core::db::open_db;
use promptdo_core::{
    default_log_level, init_logging, AppConfig, AssistService, EditOutcome, GeminiClient,
    SqliteTodoRepository, TodoFilter, TodoService,
};
use std::path::PathBuf;

fn cli() -> Command {
    let id_arg = || {
        Arg::new("id")
            .required(true)
            .help("Todo id or a unique prefix of it")
    };

    Command::new("promptdo")
        .version(promptdo_core::core_version())
        .about("To-do list with AI task breakdown, research and read-aloud")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the database, config.json and logs"),
        )
        .subcommand(
            Command::new("add")
                .about("Add a todo at the top of the list")
                .arg(
                    Arg::new("text")
                        .required(true)
                        .num_args(1..)
                        .help("Todo text"),
                )
                .arg(
                    Arg::new("due")
                        .long("due")
                        .value_parser(parse_date)
                        .help("Due date as YYYY-MM-DD"),
                ),
        )
        .subcommand(
            Command::new("list").about("Show todos").arg(
                Arg::new("filter")
                    .long("filter")
                    .short('f')
                    .default_value("all")
                    .value_parser(["all", "active", "completed"])
                    .help("Which todos to show"),
            ),
        )
        .subcommand(
            Command::new("toggle")
                .about("Mark a todo done or not done")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("edit")
                .about("Replace a todo's text; empty text deletes it")
                .arg(id_arg())
                .arg(Arg::new("text").required(true).num_args(1..).allow_hyphen_values(true)),
        )
        .subcommand(Command::new("delete").about("Delete a todo").arg(id_arg()))
        .subcommand(
            Command::new("breakdown")
                .about("Break a todo into sub-tasks (fetched once, then cached)")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("subtask-toggle")
                .about("Mark a sub-task done or not done")
                .arg(id_arg())
                .arg(
                    Arg::new("subtask")
                        .required(true)
                        .help("Sub-task id or a unique prefix of it"),
                ),
        )
        .subcommand(
            Command::new("research")
                .about("Research a todo's topic with cited sources (cached)")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("research-clear")
                .about("Drop cached research so it can be fetched again")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("read-aloud")
                .about("Synthesize speech for all active todos into a WAV file")
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .default_value("promptdo-readout.wav")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output WAV path"),
                ),
        )
        .subcommand(
            Command::new("alerts")
                .about("Show todos that are due soon or overdue")
                .arg(
                    Arg::new("dismiss")
                        .long("dismiss")
                        .action(ArgAction::SetTrue)
                        .help("Hide the banner until the alert set changes"),
                ),
        )
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn main() {
    let matches = cli().get_matches();
    if let Err(err) = run(&matches) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let data_dir = matches.get_one::<PathBuf>("data-dir").cloned();
    let config = AppConfig::load(data_dir).context("failed to load configuration")?;

    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = std::path::absolute(config.log_dir()).unwrap_or_else(|_| config.log_dir());
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(config.db_path())
        .with_context(|| format!("failed to open `{}`", config.db_path().display()))?;
    let repo = SqliteTodoRepository::try_new(&conn)?;
    let todos = TodoService::new(repo);
    let today = Local::now().date_naive();

    let Some((name, args)) = matches.subcommand() else {
        bail!("missing command; see --help");
    };

    match name {
        "add" => {
            let text = joined(args, "text");
            let due = args.get_one::<NaiveDate>("due").copied();
            let todo = todos.add_todo(&text, due)?;
            println!("{}", render::todo_line(&todo, today, false));
        }
        "list" => {
            let filter: TodoFilter = args
                .get_one::<String>("filter")
                .map(String::as_str)
                .unwrap_or("all")
                .parse()?;
            let snapshot = todos.alert_snapshot(today)?;
            if let Some(banner) = &snapshot.banner {
                println!("{banner}\n");
            }
            let items = todos.list_todos(filter)?;
            if items.is_empty() {
                println!("Your to-do list is empty. Add a task to get started!");
            }
            for todo in &items {
                let alerting = snapshot.alerts.iter().any(|alert| alert.id == todo.id);
                println!("{}", render::todo_line(todo, today, alerting));
            }
        }
        "toggle" => {
            let id = todos.resolve_id(id_of(args))?;
            let completed = todos.toggle_todo(id)?;
            let state = if completed { "done" } else { "not done" };
            println!("{} marked {state}", render::short_id(&id));
        }
        "edit" => {
            let id = todos.resolve_id(id_of(args))?;
            match todos.edit_todo(id, &joined(args, "text"))? {
                EditOutcome::Updated(todo) => println!("{}", render::todo_line(&todo, today, false)),
                EditOutcome::Deleted(id) => println!("{} deleted (empty text)", render::short_id(&id)),
            }
        }
        "delete" => {
            let id = todos.resolve_id(id_of(args))?;
            todos.delete_todo(id)?;
            println!("{} deleted", render::short_id(&id));
        }
        "subtask-toggle" => {
            let id = todos.resolve_id(id_of(args))?;
            let input = args
                .get_one::<String>("subtask")
                .map(String::as_str)
                .unwrap_or_default();
            let subtask_id = todos.resolve_subtask_id(id, input)?;
            let todo = todos.toggle_subtask(id, subtask_id)?;
            print_subtasks(&todo, today);
        }
        "alerts" => {
            if args.get_flag("dismiss") {
                todos.dismiss_alert_banner(today)?;
                println!("Alert banner dismissed.");
                return Ok(());
            }
            let snapshot = todos.alert_snapshot(today)?;
            if snapshot.alerts.is_empty() {
                println!("Nothing is due soon.");
            }
            if let Some(banner) = &snapshot.banner {
                println!("{banner}");
            }
            for todo in &snapshot.alerts {
                println!("{}", render::todo_line(todo, today, true));
            }
        }
        "research-clear" => {
            let id = todos.resolve_id(id_of(args))?;
            todos.clear_research(id)?;
            println!("Research cleared for {}", render::short_id(&id));
        }
        "breakdown" | "research" | "read-aloud" => {
            run_assist(repo, &config, &todos, name, args, today)?;
        }
        other => bail!("unknown command `{other}`"),
    }

    Ok(())
}

fn run_assist(
    repo: SqliteTodoRepository<'_>,
    config: &AppConfig,
    todos: &TodoService<SqliteTodoRepository<'_>>,
    name: &str,
    args: &ArgMatches,
    today: NaiveDate,
) -> Result<()> {
    let client = GeminiClient::new(config.gemini.clone())?;
    let assist = AssistService::new(repo, client);

    match name {
        "breakdown" => {
            let id = todos.resolve_id(id_of(args))?;
            let assisted = assist.break_down(id)?;
            if !assisted.fetched {
                println!("(cached)");
            }
            print_subtasks(&assisted.todo, today);
        }
        "research" => {
            let id = todos.resolve_id(id_of(args))?;
            let assisted = assist.research(id)?;
            println!("{}", render::todo_line(&assisted.todo, today, false));
            if !assisted.fetched {
                println!("(cached)");
            }
            if let Some(research) = &assisted.todo.research {
                println!();
                for line in render::research_lines(research) {
                    println!("{line}");
                }
            }
        }
        "read-aloud" => {
            let out = args
                .get_one::<PathBuf>("out")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("promptdo-readout.wav"));
            let audio = assist.read_aloud()?;
            if audio.is_empty() {
                warn!("event=read_aloud module=cli status=empty");
                println!("No audio was returned.");
                return Ok(());
            }
            std::fs::write(&out, audio.to_wav())
                .with_context(|| format!("failed to write `{}`", out.display()))?;
            match audio.duration_ms() {
                Some(ms) => println!("Wrote {} ({:.1}s)", out.display(), ms as f64 / 1000.0),
                None => println!("Wrote {}", out.display()),
            }
        }
        other => bail!("unknown command `{other}`"),
    }
    Ok(())
}

fn print_subtasks(todo: &promptdo_core::Todo, today: NaiveDate) {
    println!("{}", render::todo_line(todo, today, false));
    for line in render::subtask_lines(todo) {
        println!("{line}");
    }
}

fn id_of(args: &ArgMatches) -> &str {
    args.get_one::<String>("id")
        .map(String::as_str)
        .unwrap_or_default()
}

fn joined(args: &ArgMatches, name: &str) -> String {
    args.get_many::<String>(name)
        .map(|values| values.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
