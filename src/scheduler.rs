//! Trait boundary toward the out-of-scope collaborators (spec.md §1 "Out of
//! scope", SPEC_FULL.md "External Collaborator Interfaces").
//!
//! Nothing in this module implements a real scheduler or event loop: the
//! coroutine context-switcher and the epoll/kqueue driver are consumed
//! through these traits exactly as spec.md describes
//! (`current_task()/suspend()/resume(task)`,
//! `current_thread_poller()/wake_task_on_event`). This mirrors the
//! teacher's `event::Source`/`Evented` seam, where `Poll` never knows the
//! concrete I/O type it's registering, only the trait.

use std::fmt;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::interest::Interest;
use crate::readiness::Readiness;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskId(pub u64);

/// A unit of cooperative execution managed by the external scheduler
/// (spec.md GLOSSARY "Task").
pub trait Task: fmt::Debug + Send + Sync {
    fn id(&self) -> TaskId;
    fn hook_enabled(&self) -> bool;
    fn set_hook_enabled(&self, enabled: bool);
}

/// Consumed via `current_task()` (spec.md §1).
pub trait Scheduler: Send + Sync {
    fn current_task(&self) -> Option<Arc<dyn Task>>;
}

/// Consumed via `current_thread_poller()` and `event_poll` (spec.md §4.F).
///
/// A real implementation binds the current task as the fd's sole waiter,
/// suspends it, and is woken by the epoll/kqueue driver when the requested
/// events (or a fatal `ERR`/`HUP`) arrive, or when the per-fd timeout
/// elapses. Implementations of this trait suspend; callers must not hold
/// locks across the call.
pub trait Poller: Send + Sync {
    fn event_poll(
        &self,
        fd: RawFd,
        events: Interest,
        timeout: Option<Duration>,
    ) -> std::io::Result<Readiness>;
}

thread_local! {
    static SCHEDULER: std::cell::RefCell<Option<Arc<dyn Scheduler>>> = const { std::cell::RefCell::new(None) };
    static POLLER: std::cell::RefCell<Option<Arc<dyn Poller>>> = const { std::cell::RefCell::new(None) };
}

/// Installs the scheduler/poller for the calling OS thread. A runtime calls
/// this once when it starts running coroutines on a thread; interposed
/// calls on that thread can then reach the collaborators.
pub fn bind_thread(scheduler: Arc<dyn Scheduler>, poller: Arc<dyn Poller>) {
    SCHEDULER.with(|s| *s.borrow_mut() = Some(scheduler));
    POLLER.with(|p| *p.borrow_mut() = Some(poller));
}

pub fn unbind_thread() {
    SCHEDULER.with(|s| *s.borrow_mut() = None);
    POLLER.with(|p| *p.borrow_mut() = None);
}

pub fn current_task() -> Option<Arc<dyn Task>> {
    SCHEDULER.with(|s| s.borrow().as_ref().and_then(|s| s.current_task()))
}

pub fn current_thread_poller() -> Option<Arc<dyn Poller>> {
    POLLER.with(|p| p.borrow().clone())
}

/// A task control block usable by tests and by a minimal host embedding
/// that doesn't yet have its own `Task` type.
#[derive(Debug)]
pub struct SimpleTask {
    id: TaskId,
    hook: Mutex<bool>,
}

impl SimpleTask {
    pub fn new(id: TaskId) -> Arc<SimpleTask> {
        Arc::new(SimpleTask {
            id,
            hook: Mutex::new(false),
        })
    }
}

impl Task for SimpleTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn hook_enabled(&self) -> bool {
        *self.hook.lock().unwrap()
    }

    fn set_hook_enabled(&self, enabled: bool) {
        *self.hook.lock().unwrap() = enabled;
    }
}

/// A scheduler stand-in that always reports the same single current task,
/// since this crate does not implement context switching itself.
#[derive(Debug)]
pub struct SingleTaskScheduler {
    task: Arc<dyn Task>,
}

impl SingleTaskScheduler {
    pub fn new(task: Arc<dyn Task>) -> Arc<SingleTaskScheduler> {
        Arc::new(SingleTaskScheduler { task })
    }
}

impl Scheduler for SingleTaskScheduler {
    fn current_task(&self) -> Option<Arc<dyn Task>> {
        Some(self.task.clone())
    }
}
