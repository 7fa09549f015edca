// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Cell types for sharing state between a driver and its interrupt paths.
//!
//! Everything in this tree runs on one thread of control, so interior
//! mutability through `Cell` is enough. `TakeCell` lends a mutable buffer to
//! exactly one holder at a time, `OptionalCell` holds a `Copy` value that may
//! be absent (client references, allocated slot numbers).

use core::cell::Cell;

/// A shared reference to a mutable reference.
///
/// Holders either move the reference out with [`TakeCell::take`] and put it
/// back later, or borrow it for the duration of a closure with
/// [`TakeCell::map`]. While the reference is out, every other access sees an
/// empty cell.
pub struct TakeCell<'a, T: 'a + ?Sized> {
    val: Cell<Option<&'a mut T>>,
}

impl<'a, T: ?Sized> TakeCell<'a, T> {
    pub const fn empty() -> TakeCell<'a, T> {
        TakeCell {
            val: Cell::new(None),
        }
    }

    /// Creates a new `TakeCell` containing `value`
    pub const fn new(value: &'a mut T) -> TakeCell<'a, T> {
        TakeCell {
            val: Cell::new(Some(value)),
        }
    }

    pub fn is_none(&self) -> bool {
        let inner = self.take();
        let none = inner.is_none();
        self.val.set(inner);
        none
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Takes the mutable reference out of the cell, leaving it empty.
    pub fn take(&self) -> Option<&'a mut T> {
        self.val.replace(None)
    }

    /// Stores `val`, dropping whatever reference was held before.
    pub fn put(&self, val: Option<&'a mut T>) {
        self.val.set(val);
    }

    /// Stores `val` and returns the previous reference, if any.
    pub fn replace(&self, val: &'a mut T) -> Option<&'a mut T> {
        self.val.replace(Some(val))
    }

    /// Runs `closure` on the held reference.
    ///
    /// The cell is empty while the closure runs and is refilled afterwards, so
    /// a re-entrant `map` on the same cell returns `None`.
    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let maybe_val = self.take();
        maybe_val.map(|val| {
            let res = closure(val);
            self.replace(val);
            res
        })
    }

    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.map(closure).unwrap_or(default)
    }
}

/// An `Option` in a `Cell`, for `Copy` values.
pub struct OptionalCell<T: Copy> {
    value: Cell<Option<T>>,
}

impl<T: Copy> OptionalCell<T> {
    pub const fn new(val: T) -> OptionalCell<T> {
        OptionalCell {
            value: Cell::new(Some(val)),
        }
    }

    pub const fn empty() -> OptionalCell<T> {
        OptionalCell {
            value: Cell::new(None),
        }
    }

    pub fn set(&self, val: T) {
        self.value.set(Some(val));
    }

    pub fn insert(&self, opt: Option<T>) {
        self.value.set(opt);
    }

    pub fn clear(&self) {
        self.value.set(None);
    }

    pub fn is_some(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn is_none(&self) -> bool {
        self.value.get().is_none()
    }

    pub fn get(&self) -> Option<T> {
        self.value.get()
    }

    pub fn take(&self) -> Option<T> {
        self.value.take()
    }

    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(T) -> R,
    {
        self.value.get().map(closure)
    }

    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(T) -> R,
    {
        self.value.get().map_or(default, closure)
    }

    pub fn unwrap_or(&self, default: T) -> T {
        self.value.get().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::{OptionalCell, TakeCell};

    #[test]
    fn take_cell_lends_once() {
        let mut storage = [1u8, 2, 3];
        let cell = TakeCell::new(&mut storage[..]);

        let buf = cell.take().unwrap();
        assert!(cell.is_none());
        assert!(cell.take().is_none());
        buf[0] = 9;
        cell.replace(buf);

        assert_eq!(cell.map(|b| b[0]), Some(9));
        assert!(cell.is_some());
    }

    #[test]
    fn take_cell_map_is_not_reentrant() {
        let mut storage = [0u8; 4];
        let cell = TakeCell::new(&mut storage[..]);
        let inner = cell.map(|_| cell.map(|_| ()));
        assert_eq!(inner, Some(None));
        assert!(cell.is_some());
    }

    #[test]
    fn optional_cell_basics() {
        let cell: OptionalCell<usize> = OptionalCell::empty();
        assert!(cell.is_none());
        assert_eq!(cell.map_or(7, |v| v + 1), 7);
        cell.set(4);
        assert_eq!(cell.get(), Some(4));
        assert_eq!(cell.take(), Some(4));
        assert_eq!(cell.unwrap_or(11), 11);
    }
}
