mod actions;
mod app;
mod buffer;
mod cli;
mod colorer;
mod config;
mod delta;
mod filter;
mod k8s;
mod model;
mod reconcile;
mod refresh;
mod sorter;
mod stack;
mod table;
mod ui;
mod view;

use anyhow::{Context, Result, bail};
use app::{App, AppCommand, TaskEvent};
use buffer::PromptHandle;
use clap::Parser;
use cli::CliArgs;
use config::RuntimeConfig;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use k8s::{Accessor, KubeGateway};
use model::{Flash, ResourceKind, Scope};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use refresh::{RefreshConfig, RefreshUpdate};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use view::ViewContext;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const TICK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let config = RuntimeConfig::load(&args)?;
    if let Some(source) = config.source.as_deref() {
        info!(path = %source.display(), "loaded config");
    }

    let Some(kind) = ResourceKind::from_token(&args.command) else {
        bail!("unknown resource alias {:?}", args.command);
    };

    let gateway = KubeGateway::new().await?;
    let selection = resolve_selection(&args, &gateway);
    if args.all_namespaces && args.namespace.is_some() {
        warn!("both --all-namespaces and --namespace were provided, using all namespaces");
    }

    let cluster = gateway.cluster().to_string();
    let context = gateway.context().to_string();
    let accessor: Arc<dyn Accessor> = Arc::new(gateway);
    let (refresh_tx, refresh_rx) = mpsc::unbounded_channel::<RefreshUpdate>();

    let ctx = Rc::new(ViewContext {
        refresh: RefreshConfig {
            accessor: accessor.clone(),
            tx: refresh_tx,
            interval: config.refresh,
        },
        styles: config.styles,
        prompt: PromptHandle::new(),
        favorite_namespaces: config.favorite_namespaces,
        dump_dir: config.dump_dir,
        context,
        read_only: config.read_only,
    });

    let mut app = App::new(ctx, cluster, selection);
    app.open(kind);

    run(&mut app, accessor, refresh_rx).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    // stdout belongs to the terminal UI; logs go to a file or nowhere
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

fn resolve_selection(args: &CliArgs, gateway: &KubeGateway) -> Scope {
    if args.all_namespaces {
        Scope::AllNamespaces
    } else if let Some(namespace) = &args.namespace {
        Scope::Namespace(namespace.clone())
    } else {
        Scope::Namespace(gateway.default_namespace().to_string())
    }
}

async fn run(
    app: &mut App,
    accessor: Arc<dyn Accessor>,
    refresh_rx: mpsc::UnboundedReceiver<RefreshUpdate>,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, accessor, refresh_rx).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    accessor: Arc<dyn Accessor>,
    mut refresh_rx: mpsc::UnboundedReceiver<RefreshUpdate>,
) -> Result<()> {
    let mut reader = EventStream::new();
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<TaskEvent>();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let command = app.handle_key(key);
                        execute_app_command(&accessor, command, &task_tx);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_flash(Flash::error(format!("terminal event error: {error}")));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_update = refresh_rx.recv() => {
                if let Some(update) = maybe_update {
                    app.apply_refresh(update);
                }
            }
            maybe_event = task_rx.recv() => {
                if let Some(event) = maybe_event {
                    app.apply_task_event(event);
                }
            }
            _ = ticker.tick() => {
                app.on_tick(Instant::now());
            }
        }
    }

    Ok(())
}

/// Starts the cluster call an app command asks for. Results come back
/// through `task_tx` so the UI never blocks on the API server.
fn execute_app_command(
    accessor: &Arc<dyn Accessor>,
    command: AppCommand,
    task_tx: &mpsc::UnboundedSender<TaskEvent>,
) {
    match command {
        AppCommand::None => {}
        AppCommand::Quit => debug!("quit requested"),
        AppCommand::Describe { view_id, kind, key } => {
            let accessor = accessor.clone();
            let task_tx = task_tx.clone();
            tokio::spawn(async move {
                let result = accessor
                    .describe(kind, &key)
                    .await
                    .map_err(|error| compact_error(&error));
                let _ = task_tx.send(TaskEvent::Described {
                    view_id,
                    kind,
                    key,
                    result,
                });
            });
        }
        AppCommand::Delete {
            view_id,
            kind,
            keys,
        } => {
            info!(count = keys.len(), kind = kind.title(), "deleting resources");
            let accessor = accessor.clone();
            let task_tx = task_tx.clone();
            tokio::spawn(async move {
                let mut results = Vec::with_capacity(keys.len());
                for key in keys {
                    let result = accessor
                        .delete(kind, &key)
                        .await
                        .map_err(|error| compact_error(&error));
                    if let Err(error) = &result {
                        warn!(%key, "delete failed: {error}");
                    }
                    results.push((key, result));
                }
                let _ = task_tx.send(TaskEvent::Deleted {
                    view_id,
                    kind,
                    results,
                });
            });
        }
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}
