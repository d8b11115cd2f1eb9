//! One-shot, single-threaded promises.
//!
//! Registering work with the [crate::Manager] hands out a [Future]. The manager
//! keeps the matching [Promise] and settles it when the work reaches a terminal
//! state; a listener attached to the future runs synchronously at that point.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

enum State<T> {
    Pending(Option<Box<dyn FnOnce(T)>>),
    Ready(T),
    Consumed,
}

pub struct Promise<T> {
    state: Rc<RefCell<State<T>>>,
}

pub struct Future<T> {
    state: Rc<RefCell<State<T>>>,
}

pub fn channel<T>() -> (Promise<T>, Future<T>) {
    let state = Rc::new(RefCell::new(State::Pending(None)));
    (Promise { state: state.clone() }, Future { state })
}

impl<T> Promise<T> {
    pub fn set_value(self, value: T) {
        let listener = match mem::replace(&mut *self.state.borrow_mut(), State::Consumed) {
            State::Pending(listener) => listener,
            State::Ready(_) | State::Consumed => unreachable!("a promise is settled at most once"),
        };
        match listener {
            Some(listener) => listener(value),
            None => *self.state.borrow_mut() = State::Ready(value),
        }
    }
}

impl<T> Future<T> {
    /// Whether a value is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), State::Ready(_))
    }

    pub fn take(&self) -> Option<T> {
        let mut state = self.state.borrow_mut();
        match mem::replace(&mut *state, State::Consumed) {
            State::Ready(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Runs `f` on the value, immediately if the future is already settled.
    pub fn listen(self, f: impl FnOnce(T) + 'static) {
        let ready = {
            let mut state = self.state.borrow_mut();
            match mem::replace(&mut *state, State::Consumed) {
                State::Ready(value) => Some(value),
                State::Pending(_) => {
                    *state = State::Pending(Some(Box::new(f)));
                    return;
                }
                State::Consumed => None,
            }
        };
        if let Some(value) = ready {
            f(value)
        }
    }

    pub fn then<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Future<U> {
        let (promise, future) = channel();
        self.listen(move |value| promise.set_value(f(value)));
        future
    }
}
