use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::actions::Hint;

/// A page that can live on a [`PageStack`].
pub trait StackPage {
    fn name(&self) -> &str;
    /// Called when the page becomes the visible one.
    fn start(&mut self);
    /// Called when the page is covered or removed. May be called on a page
    /// that is already stopped.
    fn stop(&mut self);
    fn hints(&self) -> Vec<Hint> {
        Vec::new()
    }
}

pub trait StackListener<P> {
    fn stack_pushed(&mut self, page: &P);
    fn stack_popped(&mut self, old: &P, top: Option<&P>);
    fn stack_top(&mut self, top: &P);
}

/// LIFO of uniquely named pages. Only the top page is started.
pub struct PageStack<P> {
    pages: Vec<P>,
    listeners: Vec<Box<dyn StackListener<P>>>,
}

impl<P: StackPage> Default for PageStack<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: StackPage> PageStack<P> {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. A non-empty stack reports its top right away.
    pub fn add_listener(&mut self, mut listener: Box<dyn StackListener<P>>) {
        if let Some(top) = self.pages.last() {
            listener.stack_top(top);
        }
        self.listeners.push(listener);
    }

    /// Pushes `page`, replacing an existing page of the same name in place.
    ///
    /// On replacement every page above the old entry is popped first and the
    /// old entry is stopped before the new page starts.
    pub fn push(&mut self, mut page: P) {
        if let Some(index) = self.position(page.name()) {
            while self.pages.len() > index + 1 {
                self.pop_silently();
            }
            let mut old = std::mem::replace(&mut self.pages[index], page);
            old.stop();
            debug!(page = old.name(), "replacing page in place");
            if let Some(current) = self.pages.last_mut() {
                current.start();
            }
            self.fire_pushed();
            return;
        }

        if let Some(current) = self.pages.last_mut() {
            current.stop();
        }
        page.start();
        self.pages.push(page);
        self.fire_pushed();
    }

    /// Removes the top page. The page below, if any, is restarted and
    /// reported as the new top.
    pub fn pop(&mut self) -> Option<P> {
        let mut old = self.pages.pop()?;
        old.stop();
        if let Some(top) = self.pages.last_mut() {
            top.start();
        }
        let top = self.pages.last();
        for listener in &mut self.listeners {
            listener.stack_popped(&old, top);
        }
        if let Some(top) = top {
            for listener in &mut self.listeners {
                listener.stack_top(top);
            }
        }
        Some(old)
    }

    /// Stops and removes every page, firing a pop for each.
    pub fn clear(&mut self) {
        while !self.pages.is_empty() {
            self.pop_silently();
        }
    }

    pub fn top(&self) -> Option<&P> {
        self.pages.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut P> {
        self.pages.last_mut()
    }

    pub fn previous(&self) -> Option<&P> {
        let len = self.pages.len();
        if len < 2 {
            return None;
        }
        self.pages.get(len - 2)
    }

    pub fn is_last(&self) -> bool {
        self.pages.len() == 1
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Page names from bottom to top.
    pub fn flatten(&self) -> Vec<String> {
        self.pages.iter().map(|page| page.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.pages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.pages.iter_mut()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.name() == name)
    }

    /// Pops without restarting the page underneath.
    fn pop_silently(&mut self) {
        let Some(mut old) = self.pages.pop() else {
            return;
        };
        old.stop();
        let top = self.pages.last();
        for listener in &mut self.listeners {
            listener.stack_popped(&old, top);
        }
    }

    fn fire_pushed(&mut self) {
        let Some(top) = self.pages.last() else {
            return;
        };
        for listener in &mut self.listeners {
            listener.stack_pushed(top);
        }
    }
}

/// Keeps the hint menu in step with the visible page.
#[derive(Debug, Clone, Default)]
pub struct MenuHints(Rc<RefCell<Vec<Hint>>>);

impl MenuHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hints(&self) -> Vec<Hint> {
        self.0.borrow().clone()
    }

    pub fn set(&self, hints: Vec<Hint>) {
        *self.0.borrow_mut() = hints;
    }
}

impl<P: StackPage> StackListener<P> for MenuHints {
    fn stack_pushed(&mut self, page: &P) {
        self.set(page.hints());
    }

    fn stack_popped(&mut self, _old: &P, top: Option<&P>) {
        if top.is_none() {
            self.set(Vec::new());
        }
    }

    fn stack_top(&mut self, top: &P) {
        self.set(top.hints());
    }
}

/// Traces page transitions.
#[derive(Debug, Default)]
pub struct StackLogger;

impl<P: StackPage> StackListener<P> for StackLogger {
    fn stack_pushed(&mut self, page: &P) {
        debug!(page = page.name(), "page pushed");
    }

    fn stack_popped(&mut self, old: &P, top: Option<&P>) {
        debug!(
            page = old.name(),
            top = top.map(|page| page.name()).unwrap_or("-"),
            "page popped"
        );
    }

    fn stack_top(&mut self, top: &P) {
        debug!(page = top.name(), "page became current");
    }
}
