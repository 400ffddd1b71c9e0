use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::PanelError;
use crate::request::QueryOutcome;
use crate::session::PanelSession;

const HELP: &str = "\
commands:
  click <control>          press an action control
  set <input> [value]      type into an input
  check|uncheck <input>    toggle a checkbox
  threshold <n>            submit the detection threshold
  lights on|off|<level>    drive the lights form
  snap                     start a snapshot burst
  start | stop             live readout polling
  lookup <code>            resolve a code to an ILC and load saved data
  clear <element>          empty an output element
  show                     print the panel and session status
  actions                  list action controls
  save <path>              write the configuration to a file
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click(String),
    Set { input: String, value: String },
    Check { input: String, checked: bool },
    Threshold(String),
    Lights { enabled: Option<bool>, value: Option<String> },
    Snap,
    Start,
    Stop,
    Lookup(String),
    Clear(String),
    Show,
    Actions,
    Save(PathBuf),
    Help,
    Quit,
}

/// Parse one console line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let required = |what: &str| -> Result<String> {
        if rest.is_empty() {
            bail!("{} needs {}", word, what);
        }
        Ok(rest.to_string())
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "click" => Command::Click(required("a control id")?),
        "set" => {
            let (input, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if input.is_empty() {
                bail!("set needs an input id");
            }
            Command::Set { input: input.to_string(), value: value.trim().to_string() }
        }
        "check" => Command::Check { input: required("an input id")?, checked: true },
        "uncheck" => Command::Check { input: required("an input id")?, checked: false },
        "threshold" => Command::Threshold(required("a value")?),
        "lights" => match required("on, off or a level")?.as_str() {
            "on" => Command::Lights { enabled: Some(true), value: None },
            "off" => Command::Lights { enabled: Some(false), value: None },
            level => Command::Lights { enabled: None, value: Some(level.to_string()) },
        },
        "snap" => Command::Snap,
        "start" => Command::Start,
        "stop" => Command::Stop,
        "lookup" => Command::Lookup(required("a code")?),
        "clear" => Command::Clear(required("an element id")?),
        "show" => Command::Show,
        "actions" => Command::Actions,
        "save" => Command::Save(PathBuf::from(required("a file path")?)),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command {:?}, try help", other),
    };
    Ok(Some(command))
}

/// Apply a command to the session; returns false once the user quits.
///
/// Commands that wait on the station are spawned onto `tasks`, so a slow
/// reply only holds up its own action.
pub async fn execute(session: &Arc<PanelSession>, tasks: &mut JoinSet<()>, command: Command) -> Result<bool> {
    match command {
        Command::Click(trigger) => {
            let session = session.clone();
            detach(tasks, format!("click {}", trigger), async move {
                if session.click(&trigger).await? == QueryOutcome::Aborted {
                    info!("{} aborted", trigger);
                }
                Ok(())
            });
        }
        Command::Set { input, value } => session.set_input(&input, &value),
        Command::Check { input, checked } => session.set_checked(&input, checked),
        Command::Threshold(value) => {
            let session = session.clone();
            detach(tasks, format!("threshold {}", value), async move {
                session.submit_threshold(&value).await?;
                Ok(())
            });
        }
        Command::Lights { enabled, value } => {
            let session = session.clone();
            detach(tasks, "lights".to_string(), async move {
                session.set_lights(enabled, value.as_deref()).await?;
                Ok(())
            });
        }
        Command::Snap => {
            // runs for minutes; the panel picks up each reply
            drop(session.snapshot_burst());
        }
        Command::Start => {
            if !session.start_polling().await {
                println!("polling already running");
            }
        }
        Command::Stop => {
            session.stop_polling().await;
        }
        Command::Lookup(code) => {
            let session = session.clone();
            detach(tasks, format!("lookup {}", code), async move {
                let ilc = session.lookup(&code).await?;
                println!("ILC: {}", ilc);
                Ok(())
            });
        }
        Command::Clear(id) => session.clear(&id),
        Command::Show => {
            print!("{}", session.render());
            println!(
                "polling: {}, lights level: {}, actions in flight: {}",
                if session.polling_active().await { "on" } else { "off" },
                session.lights_level().await,
                tasks.len()
            );
        }
        Command::Actions => {
            let dispatcher = session.dispatcher();
            for trigger in dispatcher.triggers() {
                println!("{:<16} {}", trigger, dispatcher.action_name(trigger).unwrap_or_default());
            }
        }
        Command::Save(path) => {
            session.save_config(&path)?;
            println!("saved {}", path.display());
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn detach<F>(tasks: &mut JoinSet<()>, label: String, work: F)
where
    F: Future<Output = Result<(), PanelError>> + Send + 'static,
{
    tasks.spawn(async move {
        if let Err(e) = work.await {
            error!("❌ {}: {}", label, e);
        }
    });
}

fn reap(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!("❌ action task failed: {}", e);
    }
}

fn print_alerts(session: &PanelSession) {
    for alert in session.take_alerts() {
        println!("! {}", alert);
    }
}

/// Read commands line by line until quit, end of input or ctrl-c.
///
/// Actions still in flight are awaited after quit or end of input, and
/// abandoned on ctrl-c.
pub async fn run<R: AsyncRead + Unpin>(session: &Arc<PanelSession>, input: R) -> Result<()> {
    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("🛑 Interrupted");
                tasks.abort_all();
                return Ok(());
            }
            Some(finished) = tasks.join_next(), if !tasks.is_empty() => reap(finished),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going = match parse_command(&line) {
                    Ok(Some(command)) => execute(session, &mut tasks, command).await.unwrap_or_else(|e| {
                        error!("❌ {}", e);
                        true
                    }),
                    Ok(None) => true,
                    Err(e) => {
                        println!("{}", e);
                        true
                    }
                };
                if !keep_going {
                    break;
                }
            }
        }
        print_alerts(session);
    }

    if !tasks.is_empty() {
        info!("⏳ Waiting for {} actions in flight", tasks.len());
    }
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("🛑 Interrupted");
                tasks.abort_all();
                break;
            }
            finished = tasks.join_next() => match finished {
                Some(finished) => reap(finished),
                None => break,
            },
        }
    }
    print_alerts(session);
    Ok(())
}
