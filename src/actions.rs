use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // table
    SaveCsv,
    ActivateFilter,
    ResetFilter,
    SubmitFilter,
    EraseFilter,
    SortInvert,
    SortName,
    SortAge,
    SortNamespace,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    ToggleMark,
    SpanMark,
    ClearMarks,
    // view
    Describe,
    Enter,
    Delete,
    Back,
    SwitchNamespace(u8),
    // app
    Quit,
    ToggleHelp,
    ActivateCommand,
    SubmitCommand,
    ResetCommand,
    EraseCommand,
    ConfirmYes,
    ConfirmNo,
}

/// A key code plus the modifiers that matter for lookup. Uppercase letters
/// already encode shift, so shift is dropped from character keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let modifiers = match code {
            KeyCode::Char(_) => modifiers - KeyModifiers::SHIFT,
            _ => modifiers,
        };
        Self {
            code,
            modifiers: modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT),
        }
    }

    pub fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub fn char(ch: char) -> Self {
        Self::key(KeyCode::Char(ch))
    }

    pub fn ctrl(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    pub fn from_event(key: KeyEvent) -> Self {
        Self::new(key.code, key.modifiers)
    }

    /// Short human label used in hints, e.g. `ctrl-s`, `shift-i`, `enter`.
    pub fn mnemonic(&self) -> String {
        let key_name = match self.code {
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char(c) if c.is_ascii_uppercase() => {
                format!("shift-{}", c.to_ascii_lowercase())
            }
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Left => "left".to_string(),
            KeyCode::Right => "right".to_string(),
            KeyCode::Up => "up".to_string(),
            KeyCode::Down => "down".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pgup".to_string(),
            KeyCode::PageDown => "pgdn".to_string(),
            KeyCode::F(n) => format!("f{n}"),
            other => format!("{other:?}").to_ascii_lowercase(),
        };

        let mut parts = Vec::new();
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            parts.push("ctrl".to_string());
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            parts.push("alt".to_string());
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            parts.push("shift".to_string());
        }
        parts.push(key_name);
        parts.join("-")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAction {
    pub description: String,
    pub action: Action,
    pub visible: bool,
}

impl KeyAction {
    pub fn new(description: impl Into<String>, action: Action) -> Self {
        Self {
            description: description.into(),
            action,
            visible: true,
        }
    }

    pub fn hidden(description: impl Into<String>, action: Action) -> Self {
        Self {
            visible: false,
            ..Self::new(description, action)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub mnemonic: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct KeyActions {
    entries: HashMap<KeyBinding, KeyAction>,
}

impl KeyActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, binding: KeyBinding, action: KeyAction) {
        self.entries.insert(binding, action);
    }

    /// Copies every entry of `other`, overriding existing bindings.
    pub fn merge(&mut self, other: &KeyActions) {
        for (binding, action) in &other.entries {
            self.entries.insert(*binding, action.clone());
        }
    }

    pub fn delete(&mut self, binding: KeyBinding) -> Option<KeyAction> {
        self.entries.remove(&binding)
    }

    pub fn get(&self, binding: KeyBinding) -> Option<&KeyAction> {
        self.entries.get(&binding)
    }

    pub fn contains(&self, binding: KeyBinding) -> bool {
        self.entries.contains_key(&binding)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visible entries, numeric mnemonics first in numeric order, then the
    /// rest lexically.
    pub fn hints(&self) -> Vec<Hint> {
        let mut hints = self
            .entries
            .iter()
            .filter(|(_, action)| action.visible)
            .map(|(binding, action)| Hint {
                mnemonic: binding.mnemonic(),
                description: action.description.clone(),
            })
            .collect::<Vec<_>>();

        hints.sort_by(|left, right| {
            match (
                left.mnemonic.parse::<u32>(),
                right.mnemonic.parse::<u32>(),
            ) {
                (Ok(left_num), Ok(right_num)) => left_num.cmp(&right_num),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => left
                    .mnemonic
                    .cmp(&right.mnemonic)
                    .then_with(|| left.description.cmp(&right.description)),
            }
        });
        hints
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Buffered(char),
    Action(Action),
    Unhandled(KeyEvent),
}

/// Routes one key event: plain characters feed an active buffer, anything
/// else is looked up in `actions`, and misses are handed back to the caller.
pub fn dispatch(actions: &KeyActions, buffer_active: bool, key: KeyEvent) -> Dispatch {
    if buffer_active
        && let KeyCode::Char(ch) = key.code
        && (key.modifiers - KeyModifiers::SHIFT).is_empty()
    {
        return Dispatch::Buffered(ch);
    }

    match actions.get(KeyBinding::from_event(key)) {
        Some(action) => Dispatch::Action(action.action),
        None => Dispatch::Unhandled(key),
    }
}
