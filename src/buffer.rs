use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BufferKind {
    Command,
    Filter,
}

impl BufferKind {
    pub fn prompt(self) -> char {
        match self {
            Self::Command => ':',
            Self::Filter => '/',
        }
    }
}

/// Observer of a [`CommandBuffer`]. Called synchronously, in registration
/// order, after every mutation.
pub trait BufferListener {
    fn buffer_changed(&mut self, text: &str);
    fn buffer_active(&mut self, active: bool, kind: BufferKind);
}

pub struct CommandBuffer {
    content: Vec<char>,
    active: bool,
    hot_key: char,
    kind: BufferKind,
    listeners: Vec<Box<dyn BufferListener>>,
}

impl Debug for CommandBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("content", &self.text())
            .field("active", &self.active)
            .field("kind", &self.kind)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CommandBuffer {
    pub fn new(hot_key: char, kind: BufferKind) -> Self {
        Self {
            content: Vec::new(),
            active: false,
            hot_key,
            kind,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn BufferListener>) {
        self.listeners.push(listener);
    }

    pub fn hot_key(&self) -> char {
        self.hot_key
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> String {
        self.content.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn add(&mut self, ch: char) {
        self.content.push(ch);
        self.fire_changed();
    }

    pub fn delete(&mut self) {
        if self.content.pop().is_some() {
            self.fire_changed();
        }
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.fire_changed();
    }

    pub fn reset(&mut self) {
        self.clear();
        self.set_active(false);
    }

    /// Activation also replays the current text so observers pick up a buffer
    /// that was edited while another one had focus.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        let kind = self.kind;
        for listener in &mut self.listeners {
            listener.buffer_active(active, kind);
        }
        if active {
            self.fire_changed();
        }
    }

    fn fire_changed(&mut self) {
        let text = self.text();
        for listener in &mut self.listeners {
            listener.buffer_changed(&text);
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PromptState {
    pub kind: Option<BufferKind>,
    pub text: String,
    pub active: bool,
}

/// Shared view of whichever buffer is capturing input, read by the footer.
#[derive(Debug, Clone, Default)]
pub struct PromptHandle(Rc<RefCell<PromptState>>);

impl PromptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PromptState {
        self.0.borrow().clone()
    }

    pub fn listener(&self) -> Box<dyn BufferListener> {
        Box::new(self.clone())
    }
}

impl BufferListener for PromptHandle {
    fn buffer_changed(&mut self, text: &str) {
        self.0.borrow_mut().text = text.to_string();
    }

    fn buffer_active(&mut self, active: bool, kind: BufferKind) {
        let mut state = self.0.borrow_mut();
        if active {
            state.kind = Some(kind);
            state.active = true;
        } else if state.kind == Some(kind) {
            state.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferKind, BufferListener, CommandBuffer, PromptHandle};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Eq, PartialEq)]
    enum Seen {
        Changed(String),
        Active(bool),
    }

    struct Recorder {
        tag: &'static str,
        log: Rc<RefCell<Vec<(&'static str, Seen)>>>,
    }

    impl BufferListener for Recorder {
        fn buffer_changed(&mut self, text: &str) {
            self.log
                .borrow_mut()
                .push((self.tag, Seen::Changed(text.to_string())));
        }

        fn buffer_active(&mut self, active: bool, _kind: BufferKind) {
            self.log.borrow_mut().push((self.tag, Seen::Active(active)));
        }
    }

    fn recorded() -> (CommandBuffer, Rc<RefCell<Vec<(&'static str, Seen)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut buffer = CommandBuffer::new('/', BufferKind::Filter);
        buffer.add_listener(Box::new(Recorder {
            tag: "first",
            log: log.clone(),
        }));
        buffer.add_listener(Box::new(Recorder {
            tag: "second",
            log: log.clone(),
        }));
        (buffer, log)
    }

    #[test]
    fn edits_notify_in_registration_order() {
        let (mut buffer, log) = recorded();
        buffer.add('a');
        buffer.add('b');
        buffer.delete();
        assert_eq!(buffer.text(), "a");
        assert_eq!(
            log.borrow().clone(),
            vec![
                ("first", Seen::Changed("a".to_string())),
                ("second", Seen::Changed("a".to_string())),
                ("first", Seen::Changed("ab".to_string())),
                ("second", Seen::Changed("ab".to_string())),
                ("first", Seen::Changed("a".to_string())),
                ("second", Seen::Changed("a".to_string())),
            ]
        );
    }

    #[test]
    fn delete_on_empty_is_silent() {
        let (mut buffer, log) = recorded();
        buffer.delete();
        assert!(log.borrow().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn reset_clears_and_deactivates_once() {
        let (mut buffer, log) = recorded();
        buffer.set_active(true);
        buffer.add('x');
        log.borrow_mut().clear();

        buffer.reset();
        assert!(buffer.is_empty());
        assert!(!buffer.is_active());
        let deactivations = log
            .borrow()
            .iter()
            .filter(|(tag, seen)| *tag == "first" && *seen == Seen::Active(false))
            .count();
        assert_eq!(deactivations, 1);
    }

    #[test]
    fn prompt_handle_tracks_the_active_buffer() {
        let prompt = PromptHandle::new();
        let mut command = CommandBuffer::new(':', BufferKind::Command);
        let mut filter = CommandBuffer::new('/', BufferKind::Filter);
        command.add_listener(prompt.listener());
        filter.add_listener(prompt.listener());

        filter.set_active(true);
        filter.add('n');
        let state = prompt.snapshot();
        assert_eq!(state.kind, Some(BufferKind::Filter));
        assert_eq!(state.text, "n");
        assert!(state.active);

        command.set_active(false);
        assert!(prompt.snapshot().active);
        command.add('q');
        filter.set_active(true);
        assert_eq!(prompt.snapshot().text, "n");
        filter.set_active(false);
        filter.set_active(false);
        assert!(!prompt.snapshot().active);
    }
}
