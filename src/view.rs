use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::PoisonError;
use tracing::{debug, info};

use crate::actions::{Action, Dispatch, Hint, KeyAction, KeyActions, KeyBinding, dispatch};
use crate::buffer::PromptHandle;
use crate::colorer::colorer_for;
use crate::config::Styles;
use crate::filter::label_selector;
use crate::k8s::ListRequest;
use crate::model::{ALL_NAMESPACES_LABEL, Flash, Header, ResourceKind, Scope, TableData};
use crate::refresh::{RefreshConfig, RefreshTask, RefreshUpdate, SharedReconciler};
use crate::stack::StackPage;
use crate::table::{KeyOutcome, TableView};

const DETAIL_PAGE_STEP: u16 = 20;

/// Collaborators shared by every page, built once at startup.
pub struct ViewContext {
    pub refresh: RefreshConfig,
    pub styles: Styles,
    pub prompt: PromptHandle,
    pub favorite_namespaces: Vec<String>,
    pub dump_dir: PathBuf,
    pub context: String,
    pub read_only: bool,
}

/// What a page asks its owner to do after handling a key.
#[derive(Debug, Clone)]
pub enum ViewCommand {
    None,
    Flash(Flash),
    Back,
    Describe { kind: ResourceKind, key: String },
    Push { kind: ResourceKind, scope: Scope },
    ConfirmDelete { kind: ResourceKind, keys: Vec<String> },
    ScopeChanged(Scope),
    Pass(KeyEvent),
}

/// A live table of one resource kind, refreshed by its own background task
/// while it is the visible page.
pub struct ResourceView {
    id: u64,
    name: String,
    kind: ResourceKind,
    scope: Scope,
    labels: Option<String>,
    table: TableView,
    ctx: Rc<ViewContext>,
    task: Option<RefreshTask>,
    reconciler: SharedReconciler,
}

impl ResourceView {
    pub fn new(id: u64, kind: ResourceKind, selection: &Scope, ctx: Rc<ViewContext>) -> Self {
        let scope = Scope::for_kind(kind, selection);
        let mut table = TableView::new(kind.title(), scope.clone(), ctx.styles, colorer_for(kind));
        table.add_filter_listener(ctx.prompt.listener());
        let mut view = Self {
            id,
            name: kind.short_token().to_string(),
            kind,
            scope,
            labels: None,
            table,
            ctx,
            task: None,
            reconciler: SharedReconciler::default(),
        };
        view.bind_keys();
        view
    }

    fn bind_keys(&mut self) {
        let read_only = self.ctx.read_only;
        let kind = self.kind;
        let favorites = self.ctx.favorite_namespaces.clone();
        let actions = self.table.actions_mut();

        actions.add(KeyBinding::char('d'), KeyAction::new("Describe", Action::Describe));
        if !read_only {
            actions.add(KeyBinding::ctrl('d'), KeyAction::new("Delete", Action::Delete));
        }
        let enter = if kind == ResourceKind::Namespaces { "View" } else { "Describe" };
        actions.add(KeyBinding::key(KeyCode::Enter), KeyAction::new(enter, Action::SubmitFilter));
        if kind.namespaced() {
            actions.add(
                KeyBinding::char('0'),
                KeyAction::new(ALL_NAMESPACES_LABEL, Action::SwitchNamespace(0)),
            );
            for (index, namespace) in favorites.iter().take(9).enumerate() {
                let slot = index as u8 + 1;
                actions.add(
                    KeyBinding::char(char::from(b'0' + slot)),
                    KeyAction::new(namespace.clone(), Action::SwitchNamespace(slot)),
                );
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn labels(&self) -> Option<&str> {
        self.labels.as_deref()
    }

    pub fn table(&self) -> &TableView {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableView {
        &mut self.table
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    fn request(&self) -> ListRequest {
        ListRequest {
            kind: self.kind,
            scope: self.scope.clone(),
            labels: self.labels.clone(),
        }
    }

    /// Starts over with a new request; rows from the old one are not diffed
    /// against.
    fn restart(&mut self) {
        let running = self.task.is_some();
        self.stop();
        self.reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        if running {
            self.start();
        }
    }

    /// Applies a refresh result unless it came from a task this view no
    /// longer owns.
    pub fn apply_update(&mut self, update: RefreshUpdate) -> Option<Flash> {
        let current = self
            .task
            .as_ref()
            .is_some_and(|task| task.token().same_as(&update.token));
        if !current || update.token.is_cancelled() {
            debug!(view = self.id, "discarding stale refresh");
            return None;
        }
        match update.result {
            Ok(data) => self.table.update(data),
            Err(message) => Some(Flash::error(message)),
        }
    }

    /// Rescopes a namespaced view and restarts its refresh task.
    pub fn switch_scope(&mut self, selection: &Scope) -> bool {
        let scope = Scope::for_kind(self.kind, selection);
        if scope == self.scope {
            return false;
        }
        info!(view = %self.name, scope = %scope, "switching scope");
        self.scope = scope.clone();
        self.table.update(TableData::new(Header::default(), scope));
        self.restart();
        true
    }

    pub fn set_labels(&mut self, labels: Option<String>) {
        if labels == self.labels {
            return;
        }
        debug!(view = %self.name, labels = ?labels, "label selector changed");
        self.labels = labels;
        self.restart();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ViewCommand {
        match self.table.handle_key(key) {
            KeyOutcome::Consumed => ViewCommand::None,
            KeyOutcome::Flash(flash) => ViewCommand::Flash(flash),
            KeyOutcome::FilterSubmitted(text) => {
                self.set_labels(label_selector(&text));
                ViewCommand::None
            }
            KeyOutcome::Action(action) => self.apply(action),
            KeyOutcome::Pass(key) => ViewCommand::Pass(key),
        }
    }

    fn apply(&mut self, action: Action) -> ViewCommand {
        match action {
            Action::Back => ViewCommand::Back,
            Action::Enter if self.kind == ResourceKind::Namespaces => {
                let key = self.table.selected_key();
                if key.is_empty() {
                    return ViewCommand::None;
                }
                let scope = if key == ALL_NAMESPACES_LABEL {
                    Scope::AllNamespaces
                } else {
                    Scope::Namespace(key)
                };
                ViewCommand::Push {
                    kind: ResourceKind::Pods,
                    scope,
                }
            }
            Action::Enter | Action::Describe => {
                let key = self.table.selected_key();
                if key.is_empty() || self.is_synthetic(&key) {
                    return ViewCommand::None;
                }
                ViewCommand::Describe {
                    kind: self.kind,
                    key,
                }
            }
            Action::Delete => {
                if self.ctx.read_only {
                    return ViewCommand::Flash(Flash::warn("read-only mode"));
                }
                let keys = self
                    .table
                    .selected_keys()
                    .into_iter()
                    .filter(|key| !self.is_synthetic(key))
                    .collect::<Vec<_>>();
                if keys.is_empty() {
                    return ViewCommand::Flash(Flash::warn("nothing selected"));
                }
                ViewCommand::ConfirmDelete {
                    kind: self.kind,
                    keys,
                }
            }
            Action::SaveCsv => match self.table.save_csv(&self.ctx.dump_dir, &self.ctx.context) {
                Ok(path) => ViewCommand::Flash(Flash::info(format!("saved {}", path.display()))),
                Err(error) => ViewCommand::Flash(Flash::error(crate::compact_error(&error))),
            },
            Action::SwitchNamespace(slot) => {
                let selection = match slot {
                    0 => Scope::AllNamespaces,
                    slot => match self.ctx.favorite_namespaces.get(usize::from(slot) - 1) {
                        Some(namespace) => Scope::Namespace(namespace.clone()),
                        None => return ViewCommand::None,
                    },
                };
                if self.switch_scope(&selection) {
                    ViewCommand::ScopeChanged(selection)
                } else {
                    ViewCommand::None
                }
            }
            _ => ViewCommand::None,
        }
    }

    fn is_synthetic(&self, key: &str) -> bool {
        self.kind == ResourceKind::Namespaces && key == ALL_NAMESPACES_LABEL
    }

    /// Dims rows queued for deletion.
    pub fn mark_deleting(&mut self, keys: &[String]) {
        self.table.set_deleting(keys.iter().cloned());
    }
}

impl StackPage for ResourceView {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        self.task = Some(RefreshTask::spawn(
            self.id,
            self.request(),
            self.reconciler.clone(),
            self.ctx.refresh.clone(),
        ));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
            debug!(view = self.id, "refresh task cancelled");
        }
    }

    fn hints(&self) -> Vec<Hint> {
        self.table.hints()
    }
}

/// Read-only scrollable text, such as a describe result.
pub struct DetailView {
    name: String,
    title: String,
    text: String,
    scroll: u16,
    actions: KeyActions,
}

impl DetailView {
    pub fn new(name: impl Into<String>, title: impl Into<String>, text: String) -> Self {
        let mut actions = KeyActions::new();
        actions.add(KeyBinding::key(KeyCode::Esc), KeyAction::new("Back", Action::Back));
        actions.add(KeyBinding::char('q'), KeyAction::hidden("Back", Action::Back));
        let scrolling = [
            (KeyBinding::key(KeyCode::Up), Action::Up),
            (KeyBinding::char('k'), Action::Up),
            (KeyBinding::key(KeyCode::Down), Action::Down),
            (KeyBinding::char('j'), Action::Down),
            (KeyBinding::key(KeyCode::PageUp), Action::PageUp),
            (KeyBinding::key(KeyCode::PageDown), Action::PageDown),
            (KeyBinding::key(KeyCode::Home), Action::Top),
            (KeyBinding::char('g'), Action::Top),
            (KeyBinding::key(KeyCode::End), Action::Bottom),
            (KeyBinding::char('G'), Action::Bottom),
        ];
        for (binding, action) in scrolling {
            actions.add(binding, KeyAction::hidden("Scroll", action));
        }
        Self {
            name: name.into(),
            title: title.into(),
            text,
            scroll: 0,
            actions,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    fn max_scroll(&self) -> u16 {
        u16::try_from(self.text.lines().count().saturating_sub(1)).unwrap_or(u16::MAX)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ViewCommand {
        let action = match dispatch(&self.actions, false, key) {
            Dispatch::Action(action) => action,
            Dispatch::Buffered(_) | Dispatch::Unhandled(_) => return ViewCommand::Pass(key),
        };
        let max = self.max_scroll();
        self.scroll = match action {
            Action::Back => return ViewCommand::Back,
            Action::Up => self.scroll.saturating_sub(1),
            Action::Down => self.scroll.saturating_add(1).min(max),
            Action::PageUp => self.scroll.saturating_sub(DETAIL_PAGE_STEP),
            Action::PageDown => self.scroll.saturating_add(DETAIL_PAGE_STEP).min(max),
            Action::Top => 0,
            Action::Bottom => max,
            _ => self.scroll,
        };
        ViewCommand::None
    }
}

impl StackPage for DetailView {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) {
        debug!(page = %self.name, "detail page shown");
    }

    fn stop(&mut self) {}

    fn hints(&self) -> Vec<Hint> {
        self.actions.hints()
    }
}

pub enum Page {
    Resource(ResourceView),
    Detail(DetailView),
}

impl Page {
    pub fn handle_key(&mut self, key: KeyEvent) -> ViewCommand {
        match self {
            Self::Resource(view) => view.handle_key(key),
            Self::Detail(view) => view.handle_key(key),
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceView> {
        match self {
            Self::Resource(view) => Some(view),
            Self::Detail(_) => None,
        }
    }

    pub fn as_resource_mut(&mut self) -> Option<&mut ResourceView> {
        match self {
            Self::Resource(view) => Some(view),
            Self::Detail(_) => None,
        }
    }

    /// True while the page is capturing text input.
    pub fn is_editing(&self) -> bool {
        self.as_resource()
            .is_some_and(|view| view.table().filter_active())
    }
}

impl StackPage for Page {
    fn name(&self) -> &str {
        match self {
            Self::Resource(view) => view.name(),
            Self::Detail(view) => view.name(),
        }
    }

    fn start(&mut self) {
        match self {
            Self::Resource(view) => view.start(),
            Self::Detail(view) => view.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            Self::Resource(view) => view.stop(),
            Self::Detail(view) => view.stop(),
        }
    }

    fn hints(&self) -> Vec<Hint> {
        match self {
            Self::Resource(view) => view.hints(),
            Self::Detail(view) => view.hints(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DetailView, ResourceView, ViewCommand, ViewContext};
    use crate::buffer::PromptHandle;
    use crate::config::Styles;
    use crate::k8s::fake::{FakeAccessor, snapshot};
    use crate::model::{ResourceKind, RowAction, Scope};
    use crate::refresh::{CancelToken, RefreshConfig, RefreshUpdate};
    use crate::stack::StackPage;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn context(
        accessor: Arc<FakeAccessor>,
        read_only: bool,
    ) -> (Rc<ViewContext>, mpsc::UnboundedReceiver<RefreshUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = ViewContext {
            refresh: RefreshConfig {
                accessor,
                tx,
                interval: Duration::from_secs(2),
            },
            styles: Styles::default(),
            prompt: PromptHandle::new(),
            favorite_namespaces: vec!["kube-system".to_string()],
            dump_dir: std::env::temp_dir(),
            context: "test".to_string(),
            read_only,
        };
        (Rc::new(ctx), rx)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test(start_paused = true)]
    async fn started_view_applies_its_own_updates_only() {
        let accessor = Arc::new(FakeAccessor::with_rows(
            &["NAME", "STATUS"],
            &[("default/web", &["web", "Running"])],
        ));
        let (ctx, mut rx) = context(accessor, false);
        let mut view = ResourceView::new(1, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();
        assert!(view.is_running());

        let update = rx.recv().await.unwrap();
        assert!(view.apply_update(update).is_none());
        assert_eq!(view.table().row_count(), 1);
        assert_eq!(view.table().selected_key(), "default/web");

        let stale = RefreshUpdate {
            view_id: 1,
            token: CancelToken::new(),
            result: Err("boom".to_string()),
        };
        assert!(view.apply_update(stale).is_none());

        view.stop();
        view.stop();
        assert!(!view.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn resumed_view_keeps_diffing_against_its_last_rows() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("default/web", &["web"])]));
        let (ctx, mut rx) = context(accessor, false);
        let mut view = ResourceView::new(1, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();
        let update = rx.recv().await.unwrap();
        view.apply_update(update);
        assert_eq!(view.table().data().rows["default/web"].action, RowAction::Added);

        view.stop();
        view.start();
        let update = rx.recv().await.unwrap();
        view.apply_update(update);
        assert_eq!(view.table().data().rows["default/web"].action, RowAction::Unchanged);

        view.switch_scope(&Scope::AllNamespaces);
        let update = rx.recv().await.unwrap();
        view.apply_update(update);
        assert_eq!(view.table().data().rows["default/web"].action, RowAction::Added);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_flash_and_keep_rows() {
        let accessor = Arc::new(FakeAccessor::new());
        accessor.queue(snapshot(&["NAME"], &[("default/a", &["a"])]));
        accessor.queue_error("forbidden");
        let (ctx, mut rx) = context(accessor, false);
        let mut view = ResourceView::new(1, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();

        let first = rx.recv().await.unwrap();
        view.apply_update(first);
        let second = rx.recv().await.unwrap();
        let flash = view.apply_update(second).unwrap();
        assert!(flash.message.contains("forbidden"));
        assert_eq!(view.table().row_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn label_filter_restarts_the_task_with_a_selector() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("default/a", &["a"])]));
        let (ctx, mut rx) = context(accessor.clone(), false);
        let mut view = ResourceView::new(1, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();
        let update = rx.recv().await.unwrap();
        view.apply_update(update);

        view.handle_key(key(KeyCode::Char('/')));
        for ch in "-l app=web".chars() {
            view.handle_key(key(KeyCode::Char(ch)));
        }
        view.handle_key(key(KeyCode::Enter));
        assert_eq!(view.labels(), Some("app=web"));

        let update = rx.recv().await.unwrap();
        assert!(view.apply_update(update).is_none());
        let requests = accessor.requests.lock().unwrap();
        assert_eq!(requests.last().unwrap().labels.as_deref(), Some("app=web"));
    }

    #[tokio::test(start_paused = true)]
    async fn namespace_enter_pushes_scoped_pods() {
        let accessor = Arc::new(FakeAccessor::with_rows(
            &["NAME", "STATUS"],
            &[("kube-system", &["kube-system", "Active"])],
        ));
        let (ctx, mut rx) = context(accessor, false);
        let mut view = ResourceView::new(2, ResourceKind::Namespaces, &Scope::AllNamespaces, ctx);
        assert_eq!(view.scope(), &Scope::NotNamespaced);
        view.start();
        let update = rx.recv().await.unwrap();
        view.apply_update(update);

        // Row 1 is the synthetic "all" row.
        assert!(matches!(
            view.handle_key(key(KeyCode::Enter)),
            ViewCommand::Push { kind: ResourceKind::Pods, scope: Scope::AllNamespaces }
        ));
        assert!(matches!(
            view.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            ViewCommand::Flash(_)
        ));
        view.handle_key(key(KeyCode::Down));
        match view.handle_key(key(KeyCode::Enter)) {
            ViewCommand::Push { scope, .. } => {
                assert_eq!(scope, Scope::Namespace("kube-system".into()))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn numeric_keys_switch_namespaces() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("default/a", &["a"])]));
        let (ctx, _rx) = context(accessor.clone(), false);
        let mut view = ResourceView::new(3, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();

        match view.handle_key(key(KeyCode::Char('1'))) {
            ViewCommand::ScopeChanged(scope) => {
                assert_eq!(scope, Scope::Namespace("kube-system".into()))
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(view.table().title(), "Pods(kube-system)[0]");
        assert!(matches!(
            view.handle_key(key(KeyCode::Char('0'))),
            ViewCommand::ScopeChanged(Scope::AllNamespaces)
        ));
        assert!(matches!(view.handle_key(key(KeyCode::Char('0'))), ViewCommand::None));
        assert!(matches!(view.handle_key(key(KeyCode::Char('9'))), ViewCommand::Pass(_)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let requests = accessor.requests.lock().unwrap();
        assert_eq!(requests.last().unwrap().scope, Scope::AllNamespaces);
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_views_have_no_delete_binding() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("default/a", &["a"])]));
        let (ctx, mut rx) = context(accessor, true);
        let mut view = ResourceView::new(4, ResourceKind::Pods, &Scope::Namespace("default".into()), ctx);
        view.start();
        let update = rx.recv().await.unwrap();
        view.apply_update(update);
        assert!(matches!(
            view.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            ViewCommand::Pass(_)
        ));
        match view.handle_key(key(KeyCode::Char('d'))) {
            ViewCommand::Describe { kind, key } => {
                assert_eq!(kind, ResourceKind::Pods);
                assert_eq!(key, "default/a");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn detail_view_scrolls_within_text() {
        let text = (0..30).map(|line| format!("line {line}")).collect::<Vec<_>>().join("\n");
        let mut view = DetailView::new("describe:a", "Describe a", text);
        view.handle_key(key(KeyCode::Up));
        assert_eq!(view.scroll(), 0);
        view.handle_key(key(KeyCode::PageDown));
        assert_eq!(view.scroll(), 20);
        view.handle_key(key(KeyCode::Char('G')));
        assert_eq!(view.scroll(), 29);
        view.handle_key(key(KeyCode::Down));
        assert_eq!(view.scroll(), 29);
        assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewCommand::Back));
        assert!(matches!(view.handle_key(key(KeyCode::Char('x'))), ViewCommand::Pass(_)));
    }
}
