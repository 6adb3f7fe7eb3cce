use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::actions::{Action, Dispatch, Hint, KeyAction, KeyActions, KeyBinding, dispatch};
use crate::buffer::{BufferKind, CommandBuffer, PromptState};
use crate::model::{ALL_NAMESPACES_LABEL, Flash, FlashLevel, ResourceKind, Scope};
use crate::refresh::RefreshUpdate;
use crate::stack::{MenuHints, PageStack, StackLogger, StackPage};
use crate::view::{DetailView, Page, ResourceView, ViewCommand, ViewContext};

/// How long non-error flashes stay in the footer.
pub const FLASH_TTL: Duration = Duration::from_secs(5);
const MAX_STATUS_LEN: usize = 180;

/// Work the run loop performs outside the UI task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Quit,
    Describe {
        view_id: u64,
        kind: ResourceKind,
        key: String,
    },
    Delete {
        view_id: u64,
        kind: ResourceKind,
        keys: Vec<String>,
    },
}

/// Completion of a background describe or delete.
#[derive(Debug)]
pub enum TaskEvent {
    Described {
        view_id: u64,
        kind: ResourceKind,
        key: String,
        result: Result<String, String>,
    },
    Deleted {
        view_id: u64,
        kind: ResourceKind,
        results: Vec<(String, Result<(), String>)>,
    },
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

pub struct App {
    ctx: Rc<ViewContext>,
    cluster: String,
    stack: PageStack<Page>,
    menu: MenuHints,
    command: CommandBuffer,
    global_actions: KeyActions,
    command_actions: KeyActions,
    confirm_actions: KeyActions,
    selection: Scope,
    next_view_id: u64,
    status: Option<Flash>,
    pending: Option<PendingConfirmation>,
    show_help: bool,
    running: bool,
    page_size: usize,
}

impl App {
    pub fn new(ctx: Rc<ViewContext>, cluster: impl Into<String>, selection: Scope) -> Self {
        let menu = MenuHints::new();
        let mut stack = PageStack::new();
        stack.add_listener(Box::new(menu.clone()));
        stack.add_listener(Box::new(StackLogger));

        let mut command = CommandBuffer::new(':', BufferKind::Command);
        command.add_listener(ctx.prompt.listener());

        let mut global_actions = KeyActions::new();
        global_actions.add(KeyBinding::char(':'), KeyAction::new("Command", Action::ActivateCommand));
        global_actions.add(KeyBinding::char('?'), KeyAction::new("Help", Action::ToggleHelp));
        global_actions.add(KeyBinding::ctrl('c'), KeyAction::new("Quit", Action::Quit));

        let mut command_actions = KeyActions::new();
        command_actions.add(KeyBinding::key(KeyCode::Enter), KeyAction::new("Run", Action::SubmitCommand));
        command_actions.add(KeyBinding::key(KeyCode::Esc), KeyAction::new("Cancel", Action::ResetCommand));
        command_actions.add(KeyBinding::key(KeyCode::Backspace), KeyAction::hidden("Erase", Action::EraseCommand));
        command_actions.add(KeyBinding::key(KeyCode::Delete), KeyAction::hidden("Erase", Action::EraseCommand));
        command_actions.add(KeyBinding::ctrl('c'), KeyAction::hidden("Quit", Action::Quit));

        let mut confirm_actions = KeyActions::new();
        confirm_actions.add(KeyBinding::char('y'), KeyAction::new("Yes", Action::ConfirmYes));
        confirm_actions.add(KeyBinding::char('n'), KeyAction::new("No", Action::ConfirmNo));
        confirm_actions.add(KeyBinding::key(KeyCode::Esc), KeyAction::hidden("No", Action::ConfirmNo));

        Self {
            ctx,
            cluster: cluster.into(),
            stack,
            menu,
            command,
            global_actions,
            command_actions,
            confirm_actions,
            selection,
            next_view_id: 1,
            status: None,
            pending: None,
            show_help: false,
            running: true,
            page_size: 20,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.ctx.context
    }

    pub fn read_only(&self) -> bool {
        self.ctx.read_only
    }

    pub fn selection(&self) -> &Scope {
        &self.selection
    }

    pub fn stack(&self) -> &PageStack<Page> {
        &self.stack
    }

    pub fn top(&self) -> Option<&Page> {
        self.stack.top()
    }

    pub fn breadcrumbs(&self) -> Vec<String> {
        self.stack.flatten()
    }

    /// Hints of the visible page.
    pub fn hints(&self) -> Vec<Hint> {
        self.menu.hints()
    }

    pub fn global_hints(&self) -> Vec<Hint> {
        self.global_actions.hints()
    }

    pub fn prompt(&self) -> PromptState {
        self.ctx.prompt.snapshot()
    }

    pub fn status(&self) -> Option<&Flash> {
        self.status.as_ref()
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.prompt.as_str())
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn set_flash(&mut self, flash: Flash) {
        match flash.level {
            FlashLevel::Error => warn!("{}", flash.message),
            FlashLevel::Warn | FlashLevel::Info => debug!("{}", flash.message),
        }
        self.status = Some(Flash {
            message: normalize_status_text(&flash.message),
            ..flash
        });
    }

    /// Drops a non-error flash once it has been shown long enough.
    pub fn on_tick(&mut self, now: Instant) {
        let expired = self.status.as_ref().is_some_and(|flash| {
            flash.level != FlashLevel::Error && now.duration_since(flash.at) >= FLASH_TTL
        });
        if expired {
            self.status = None;
        }
    }

    pub fn set_page_size(&mut self, rows: usize) {
        if rows == self.page_size {
            return;
        }
        self.page_size = rows;
        for page in self.stack.iter_mut() {
            if let Some(view) = page.as_resource_mut() {
                view.table_mut().set_page_size(rows);
            }
        }
    }

    /// Pushes the table view for `kind` in the current namespace selection.
    pub fn open(&mut self, kind: ResourceKind) {
        let selection = self.selection.clone();
        self.push_view(kind, &selection);
    }

    fn push_view(&mut self, kind: ResourceKind, selection: &Scope) {
        let id = self.next_view_id;
        self.next_view_id += 1;
        let mut view = ResourceView::new(id, kind, selection, self.ctx.clone());
        view.table_mut().set_page_size(self.page_size);
        info!(view = id, kind = kind.title(), scope = %view.scope(), "opening view");
        self.stack.push(Page::Resource(view));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppCommand {
        if key.kind != KeyEventKind::Press {
            return AppCommand::None;
        }
        let command = self.route_key(key);
        self.sync_menu();
        command
    }

    /// Reinstalls the menu when the visible page's bindings have changed,
    /// e.g. the namespace sort key appearing with an all-namespaces scope.
    fn sync_menu(&self) {
        let Some(top) = self.stack.top() else {
            return;
        };
        let hints = top.hints();
        if hints != self.menu.hints() {
            self.menu.set(hints);
        }
    }

    fn route_key(&mut self, key: KeyEvent) -> AppCommand {
        if self.pending.is_some() {
            return self.handle_confirmation(key);
        }
        if self.command.is_active() {
            return self.handle_command_key(key);
        }
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return AppCommand::None;
        }

        let outcome = match self.stack.top_mut() {
            Some(page) => page.handle_key(key),
            None => ViewCommand::Pass(key),
        };
        self.apply_view_command(outcome)
    }

    fn apply_view_command(&mut self, command: ViewCommand) -> AppCommand {
        match command {
            ViewCommand::None => AppCommand::None,
            ViewCommand::Flash(flash) => {
                self.set_flash(flash);
                AppCommand::None
            }
            ViewCommand::Back => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
                AppCommand::None
            }
            ViewCommand::Describe { kind, key } => {
                let Some(view_id) = self.top_resource().map(ResourceView::id) else {
                    return AppCommand::None;
                };
                self.set_flash(Flash::info(format!("describing {key}")));
                AppCommand::Describe { view_id, kind, key }
            }
            ViewCommand::Push { kind, scope } => {
                self.selection = scope.clone();
                self.push_view(kind, &scope);
                AppCommand::None
            }
            ViewCommand::ConfirmDelete { kind, keys } => {
                let Some(view_id) = self.top_resource().map(ResourceView::id) else {
                    return AppCommand::None;
                };
                let prompt = match keys.as_slice() {
                    [key] => format!("Delete {} {key}", kind.title()),
                    keys => format!("Delete {} {}", keys.len(), kind.title()),
                };
                self.set_flash(Flash::warn(format!("{prompt}? [y/n]")));
                self.pending = Some(PendingConfirmation {
                    prompt,
                    command: AppCommand::Delete {
                        view_id,
                        kind,
                        keys,
                    },
                });
                AppCommand::None
            }
            ViewCommand::ScopeChanged(scope) => {
                self.set_flash(Flash::info(format!("namespace {scope}")));
                self.selection = scope;
                AppCommand::None
            }
            ViewCommand::Pass(key) => self.handle_global_key(key),
        }
    }

    fn top_resource(&self) -> Option<&ResourceView> {
        self.stack.top().and_then(Page::as_resource)
    }

    fn handle_global_key(&mut self, key: KeyEvent) -> AppCommand {
        match dispatch(&self.global_actions, false, key) {
            Dispatch::Action(Action::ActivateCommand) => {
                self.command.clear();
                self.command.set_active(true);
                AppCommand::None
            }
            Dispatch::Action(Action::ToggleHelp) => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Dispatch::Action(Action::Quit) => self.quit(),
            _ => AppCommand::None,
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) -> AppCommand {
        match dispatch(&self.command_actions, true, key) {
            Dispatch::Buffered(ch) => {
                self.command.add(ch);
                AppCommand::None
            }
            Dispatch::Action(Action::SubmitCommand) => {
                let line = self.command.text();
                self.command.reset();
                self.execute_command_line(line.trim())
            }
            Dispatch::Action(Action::ResetCommand) => {
                self.command.reset();
                AppCommand::None
            }
            Dispatch::Action(Action::EraseCommand) => {
                self.command.delete();
                AppCommand::None
            }
            Dispatch::Action(Action::Quit) => self.quit(),
            Dispatch::Action(_) | Dispatch::Unhandled(_) => AppCommand::None,
        }
    }

    fn handle_confirmation(&mut self, key: KeyEvent) -> AppCommand {
        let action = match dispatch(&self.confirm_actions, false, key) {
            Dispatch::Action(action) => action,
            Dispatch::Buffered(_) | Dispatch::Unhandled(_) => return AppCommand::None,
        };
        let Some(pending) = self.pending.take() else {
            return AppCommand::None;
        };
        if action != Action::ConfirmYes {
            self.set_flash(Flash::info(format!("{} cancelled", pending.prompt)));
            return AppCommand::None;
        }

        if let AppCommand::Delete { view_id, keys, .. } = &pending.command
            && let Some(view) = self.resource_view_mut(*view_id)
        {
            view.mark_deleting(keys);
        }
        self.set_flash(Flash::info(format!("{}...", pending.prompt)));
        pending.command
    }

    /// Runs a `:` command line: `q`, `help`, or `<alias> [namespace|all]`.
    fn execute_command_line(&mut self, line: &str) -> AppCommand {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return AppCommand::None;
        };
        match head {
            "q" | "q!" | "quit" => return self.quit(),
            "help" | "?" => {
                self.show_help = true;
                return AppCommand::None;
            }
            _ => {}
        }

        let Some(kind) = ResourceKind::from_token(head) else {
            self.set_flash(Flash::error(format!("unknown command {head:?}")));
            return AppCommand::None;
        };
        if let Some(namespace) = parts.next() {
            self.selection = match namespace {
                ALL_NAMESPACES_LABEL | "-A" => Scope::AllNamespaces,
                namespace => Scope::Namespace(namespace.to_string()),
            };
        }
        self.open(kind);
        AppCommand::None
    }

    fn quit(&mut self) -> AppCommand {
        self.running = false;
        self.stack.clear();
        AppCommand::Quit
    }

    fn resource_view_mut(&mut self, id: u64) -> Option<&mut ResourceView> {
        self.stack
            .iter_mut()
            .filter_map(Page::as_resource_mut)
            .find(|view| view.id() == id)
    }

    /// Routes a refresh result to the view that owns it. Results for views
    /// that were popped, replaced or stopped are dropped.
    pub fn apply_refresh(&mut self, update: RefreshUpdate) {
        let view_id = update.view_id;
        let Some(view) = self.resource_view_mut(view_id) else {
            debug!(view = view_id, "dropping refresh for a closed view");
            return;
        };
        if let Some(flash) = view.apply_update(update) {
            self.set_flash(flash);
        }
        self.sync_menu();
    }

    pub fn apply_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Described {
                view_id,
                kind,
                key,
                result,
            } => match result {
                _ if self.top_resource().map(ResourceView::id) != Some(view_id) => {
                    debug!(view = view_id, %key, "dropping describe for a page no longer on top");
                }
                Ok(text) => {
                    let page = DetailView::new(
                        format!("describe:{key}"),
                        format!("Describe {} {key}", kind.title()),
                        text,
                    );
                    self.stack.push(Page::Detail(page));
                    self.status = None;
                }
                Err(message) => self.set_flash(Flash::error(message)),
            },
            TaskEvent::Deleted {
                view_id,
                kind,
                results,
            } => {
                let failed = results
                    .iter()
                    .filter(|(_, result)| result.is_err())
                    .map(|(key, _)| key.clone())
                    .collect::<Vec<_>>();
                if let Some(view) = self.resource_view_mut(view_id) {
                    view.table_mut().clear_deleting(&failed);
                }
                let first_error = results.iter().find_map(|(key, result)| {
                    result.as_ref().err().map(|error| format!("{key}: {error}"))
                });
                match first_error {
                    Some(error) => self.set_flash(Flash::error(format!(
                        "failed to delete {} of {} {}: {error}",
                        failed.len(),
                        results.len(),
                        kind.title()
                    ))),
                    None => self.set_flash(Flash::info(format!(
                        "deleted {} {}",
                        results.len(),
                        kind.title()
                    ))),
                }
            }
        }
    }
}

fn normalize_status_text(status: &str) -> String {
    let status = status.split_whitespace().collect::<Vec<_>>().join(" ");
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}
