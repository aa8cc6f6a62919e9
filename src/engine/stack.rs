//! LIFO stacks used by the dispatcher.
//!
//! Index 0 is always the top. Pops and peeks on an empty [`Stack`] return
//! `None`; [`NamedStacks::pop`] alone reports emptiness as an error.

use crate::bean::Value;
use crate::error::EmptyStackError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Stack { items: Vec::new() }
    }
}

impl<T> Stack<T> {
    pub fn new() -> Self {
        Stack::default()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// `n` levels below the top.
    pub fn peek_at(&self, n: usize) -> Option<&T> {
        self.items.len().checked_sub(n + 1).and_then(|idx| self.items.get(idx))
    }

    pub fn peek_at_mut(&mut self, n: usize) -> Option<&mut T> {
        let idx = self.items.len().checked_sub(n + 1)?;
        self.items.get_mut(idx)
    }

    /// The first item pushed.
    pub fn bottom(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items from top to bottom.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }
}

/// Independently named value stacks, created on first push.
#[derive(Debug, Default)]
pub struct NamedStacks {
    stacks: HashMap<String, Stack<Value>>,
}

impl NamedStacks {
    pub fn push(&mut self, name: &str, value: Value) {
        self.stacks.entry(name.to_string()).or_default().push(value);
    }

    pub fn pop(&mut self, name: &str) -> Result<Value, EmptyStackError> {
        self.stacks
            .get_mut(name)
            .and_then(Stack::pop)
            .ok_or_else(|| EmptyStackError { name: name.to_string() })
    }

    pub fn peek(&self, name: &str, n: usize) -> Option<&Value> {
        self.stacks.get(name)?.peek_at(n)
    }

    pub fn peek_mut(&mut self, name: &str, n: usize) -> Option<&mut Value> {
        self.stacks.get_mut(name)?.peek_at_mut(n)
    }

    /// A stack never pushed to counts as empty.
    pub fn is_empty(&self, name: &str) -> bool {
        self.stacks.get(name).is_none_or(Stack::is_empty)
    }

    pub fn len(&self, name: &str) -> usize {
        self.stacks.get(name).map_or(0, Stack::len)
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}
