//! Discrete-event scheduler on the virtual cycle clock.
//!
//! Peripherals register tasks once and then arm, re-arm or cancel them as
//! their state changes. The host advances the clock with
//! [`Scheduler::polltime`]; every task whose due cycle has been reached fires
//! in due-time order, and tasks due on the same cycle fire in the order they
//! were (re)scheduled.
//!
//! A task is removed from the pending set before its callback runs, so a
//! callback may re-arm itself. While it runs, [`Scheduler::epoch`] reads the
//! task's own due cycle, which keeps self-renewing polls on an exact cadence
//! however coarsely the host steps the clock.
//!
//! Ordering is fully deterministic: the pending set is a `BTreeSet` keyed by
//! `(due, sequence)`, never a hash.

use std::collections::BTreeSet;

use crate::{Observable, Ticks, Value};

/// Reported by [`Scheduler::headroom`] when nothing is pending.
pub const MAX_HEADROOM: Ticks = Ticks::new(0xFFFF_FFFF);

/// Opaque handle to a task owned by a [`Scheduler`].
///
/// Handles are only meaningful to the scheduler that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

/// The body of a scheduled task.
///
/// `ctx` is whatever the scheduler's owner hands to
/// [`Scheduler::polltime_with`]; for a plain [`Scheduler`] it is `()`.
pub trait TaskCallback<C> {
    fn invoke(&mut self, ctx: &mut C, scheduler: &mut Scheduler<C>, task: TaskId);
}

impl<C, F> TaskCallback<C> for F
where
    F: FnMut(&mut C, &mut Scheduler<C>, TaskId),
{
    fn invoke(&mut self, ctx: &mut C, scheduler: &mut Scheduler<C>, task: TaskId) {
        self(ctx, scheduler, task);
    }
}

struct Slot<C> {
    /// Taken out for the duration of the callback.
    callback: Option<Box<dyn TaskCallback<C>>>,
    /// Due cycle and tie-break sequence number, while pending.
    due: Option<(Ticks, u64)>,
}

/// An ordered set of pending callbacks keyed by absolute due cycle.
///
/// `C` is the context type passed to callbacks. A component that owns its
/// own scheduler uses its state struct as `C`, so task bodies can mutate it
/// without shared ownership.
pub struct Scheduler<C = ()> {
    epoch: Ticks,
    sequence: u64,
    slots: Vec<Slot<C>>,
    pending: BTreeSet<(Ticks, u64, TaskId)>,
}

impl<C> Scheduler<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Ticks::ZERO,
            sequence: 0,
            slots: Vec::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Create an inactive task. Nothing happens until it is scheduled.
    pub fn new_task<F>(&mut self, callback: F) -> TaskId
    where
        F: FnMut(&mut C, &mut Scheduler<C>, TaskId) + 'static,
    {
        self.new_task_with(Box::new(callback))
    }

    /// Create an inactive task from an already-boxed callback object.
    pub fn new_task_with(&mut self, callback: Box<dyn TaskCallback<C>>) -> TaskId {
        let id = TaskId(self.slots.len());
        self.slots.push(Slot {
            callback: Some(callback),
            due: None,
        });
        id
    }

    /// Arm `task` to fire `delta` cycles from now.
    ///
    /// An already-pending task is moved: it takes the new due cycle and
    /// fires after any other task due on that cycle that was scheduled
    /// earlier.
    ///
    /// # Panics
    ///
    /// `delta` must be positive. A zero delay means the caller's timing model
    /// is broken, so it is treated as a contract violation.
    pub fn schedule(&mut self, task: TaskId, delta: Ticks) {
        assert!(
            !delta.is_zero(),
            "task {task:?} scheduled with a zero delay"
        );
        self.cancel(task);
        let due = self.epoch + delta;
        let sequence = self.sequence;
        self.sequence += 1;
        self.slot_mut(task).due = Some((due, sequence));
        self.pending.insert((due, sequence, task));
    }

    /// Cancel any pending occurrence and schedule afresh.
    pub fn reschedule(&mut self, task: TaskId, delta: Ticks) {
        self.cancel(task);
        self.schedule(task, delta);
    }

    /// Idempotent enable/disable for conditional periodic work.
    ///
    /// When `should_run` is set and the task is idle it is scheduled
    /// `delta` ahead; a pending task keeps its existing due cycle. When
    /// `should_run` is clear the task is cancelled.
    pub fn ensure_scheduled(&mut self, task: TaskId, should_run: bool, delta: Ticks) {
        if !should_run {
            self.cancel(task);
        } else if !self.is_scheduled(task) {
            self.schedule(task, delta);
        }
    }

    /// Remove `task` from the pending set. Harmless if it isn't pending.
    pub fn cancel(&mut self, task: TaskId) {
        if let Some((due, sequence)) = self.slot_mut(task).due.take() {
            self.pending.remove(&(due, sequence, task));
        }
    }

    #[must_use]
    pub fn is_scheduled(&self, task: TaskId) -> bool {
        self.slot(task).due.is_some()
    }

    /// Cycles until `task` fires, or `None` if it isn't pending.
    #[must_use]
    pub fn remaining(&self, task: TaskId) -> Option<Ticks> {
        self.slot(task).due.map(|(due, _)| due - self.epoch)
    }

    /// Current position of the virtual clock.
    #[must_use]
    pub fn epoch(&self) -> Ticks {
        self.epoch
    }

    /// Cycles that can elapse before the next task is due.
    #[must_use]
    pub fn headroom(&self) -> Ticks {
        self.pending
            .first()
            .map_or(MAX_HEADROOM, |&(due, _, _)| due - self.epoch)
    }

    /// Number of tasks currently pending.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Advance the clock by `cycles`, firing everything that falls due.
    ///
    /// Must not be called from inside a task callback.
    pub fn polltime_with(&mut self, cycles: Ticks, ctx: &mut C) {
        let target = self.epoch + cycles;
        while let Some(&(due, _, task)) = self.pending.first() {
            if due > target {
                break;
            }
            self.pending.pop_first();
            let slot = &mut self.slots[task.0];
            slot.due = None;
            let mut callback = slot
                .callback
                .take()
                .expect("scheduler polled from inside a task callback");
            self.epoch = due;
            callback.invoke(ctx, self, task);
            self.slots[task.0].callback = Some(callback);
        }
        self.epoch = target;
    }

    fn slot(&self, task: TaskId) -> &Slot<C> {
        self.slots
            .get(task.0)
            .expect("task handle from a different scheduler")
    }

    fn slot_mut(&mut self, task: TaskId) -> &mut Slot<C> {
        self.slots
            .get_mut(task.0)
            .expect("task handle from a different scheduler")
    }
}

impl Scheduler {
    /// Advance the clock by `cycles` for a scheduler with no callback context.
    pub fn polltime(&mut self, cycles: Ticks) {
        self.polltime_with(cycles, &mut ());
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Observable for Scheduler<C> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "epoch" => Some(self.epoch.into()),
            "pending" => Some((self.pending.len() as u64).into()),
            "headroom" => Some(self.headroom().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["epoch", "pending", "headroom"]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    fn t(n: u64) -> Ticks {
        Ticks::new(n)
    }

    /// A task that appends `name` to a shared log when it fires.
    fn logging_task(s: &mut Scheduler, log: &Rc<RefCell<String>>, name: char) -> TaskId {
        let log = Rc::clone(log);
        s.new_task(move |_, _, _| log.borrow_mut().push(name))
    }

    #[test]
    fn fires_once_when_due() {
        let mut s: Scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let task = s.new_task(move |_, _, _| c.set(c.get() + 1));
        s.schedule(task, t(2));

        s.polltime(t(1));
        assert_eq!(count.get(), 0);
        s.polltime(t(1));
        assert_eq!(count.get(), 1);
        s.polltime(t(1));
        assert_eq!(count.get(), 1);
        assert!(!s.is_scheduled(task));
    }

    #[test]
    fn big_step_past_due_time_fires_once() {
        let mut s: Scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let task = s.new_task(move |_, _, _| c.set(c.get() + 1));
        s.schedule(task, t(2));

        s.polltime(t(3));
        assert_eq!(count.get(), 1);
        s.polltime(t(3));
        assert_eq!(count.get(), 1);
        assert_eq!(s.epoch(), t(6));
    }

    #[test]
    fn same_cycle_fires_in_schedule_order() {
        for step in [1, 2] {
            let mut s: Scheduler = Scheduler::new();
            let log = Rc::new(RefCell::new(String::new()));
            for name in ['a', 'b', 'c'] {
                let task = logging_task(&mut s, &log, name);
                s.schedule(task, t(2));
            }
            for _ in 0..(2 / step) {
                s.polltime(t(step));
            }
            assert_eq!(*log.borrow(), "abc", "step {step}");
        }
    }

    #[test]
    fn rescheduling_moves_task_behind_its_peers() {
        let mut s: Scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(String::new()));
        let a = logging_task(&mut s, &log, 'a');
        let b = logging_task(&mut s, &log, 'b');
        s.schedule(a, t(2));
        s.schedule(b, t(2));
        s.schedule(a, t(2));
        s.polltime(t(2));
        assert_eq!(*log.borrow(), "ba");
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        for victim in 0..3 {
            let mut s: Scheduler = Scheduler::new();
            let log = Rc::new(RefCell::new(String::new()));
            let tasks: Vec<_> = ['a', 'b', 'c']
                .into_iter()
                .map(|name| logging_task(&mut s, &log, name))
                .collect();
            for &task in &tasks {
                s.schedule(task, t(2));
            }
            s.cancel(tasks[victim]);
            s.cancel(tasks[victim]);
            s.polltime(t(10));

            let expected: String = ['a', 'b', 'c']
                .into_iter()
                .enumerate()
                .filter(|&(i, _)| i != victim)
                .map(|(_, c)| c)
                .collect();
            assert_eq!(*log.borrow(), expected);
        }
    }

    #[test]
    fn distinct_due_times_fire_in_ascending_order() {
        let mut s: Scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(String::new()));
        let a = logging_task(&mut s, &log, 'a');
        let b = logging_task(&mut s, &log, 'b');
        let c = logging_task(&mut s, &log, 'c');
        s.schedule(a, t(4));
        s.schedule(b, t(3));
        s.schedule(c, t(2));
        s.polltime(t(10));
        assert_eq!(*log.borrow(), "cba");

        log.borrow_mut().clear();
        s.schedule(a, t(3));
        s.schedule(b, t(4));
        s.schedule(c, t(2));
        s.polltime(t(10));
        assert_eq!(*log.borrow(), "cab");
    }

    #[test]
    fn callback_sees_its_own_due_cycle() {
        let mut s: Scheduler = Scheduler::new();
        s.polltime(t(12346));
        let seen = Rc::new(Cell::new(Ticks::ZERO));
        let seen_in_task = Rc::clone(&seen);
        let task = s.new_task(move |_, sched: &mut Scheduler, _| seen_in_task.set(sched.epoch()));
        s.schedule(task, t(4));
        s.polltime(t(9974));
        assert_eq!(seen.get(), t(12350));
        assert_eq!(s.epoch(), t(12346 + 9974));
    }

    #[test]
    fn callback_can_reschedule_itself() {
        let mut s: Scheduler = Scheduler::new();
        s.polltime(t(12346));
        let fired = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&fired);
        let mut delays = VecDeque::from([1000, 1000, 100_000, 1000]);
        let task = s.new_task(move |_, sched: &mut Scheduler, me| {
            log.borrow_mut().push(sched.epoch().get());
            if let Some(next) = delays.pop_front() {
                sched.schedule(me, Ticks::new(next));
            }
        });
        s.schedule(task, t(10));
        for _ in 0..500_000 {
            s.polltime(t(3));
        }
        assert_eq!(*fired.borrow(), [12356, 13356, 14356, 114_356, 115_356]);
    }

    #[test]
    fn ensure_scheduled_keeps_existing_due_time() {
        let mut s: Scheduler = Scheduler::new();
        let task = s.new_task(|_, _, _| {});
        s.ensure_scheduled(task, true, t(100));
        s.polltime(t(40));
        s.ensure_scheduled(task, true, t(100));
        assert_eq!(s.remaining(task), Some(t(60)));

        s.ensure_scheduled(task, false, t(100));
        assert!(!s.is_scheduled(task));
        assert_eq!(s.remaining(task), None);
    }

    #[test]
    fn reschedule_replaces_due_time() {
        let mut s: Scheduler = Scheduler::new();
        let task = s.new_task(|_, _, _| {});
        s.schedule(task, t(100));
        s.polltime(t(40));
        s.reschedule(task, t(100));
        assert_eq!(s.remaining(task), Some(t(100)));
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn headroom_tracks_earliest_task() {
        let mut s: Scheduler = Scheduler::new();
        assert_eq!(s.headroom(), MAX_HEADROOM);
        let a = s.new_task(|_, _, _| {});
        let b = s.new_task(|_, _, _| {});
        s.schedule(a, t(50));
        s.schedule(b, t(20));
        assert_eq!(s.headroom(), t(20));
        s.polltime(t(5));
        assert_eq!(s.headroom(), t(15));
        assert_eq!(s.query("pending"), Some(Value::U64(2)));
    }

    #[test]
    fn callbacks_receive_the_context() {
        let mut s: Scheduler<Vec<u64>> = Scheduler::new();
        let task = s.new_task(|ctx: &mut Vec<u64>, sched: &mut Scheduler<Vec<u64>>, _| {
            ctx.push(sched.epoch().get());
        });
        s.schedule(task, t(7));
        let mut seen = Vec::new();
        s.polltime_with(t(10), &mut seen);
        assert_eq!(seen, [7]);
    }

    struct Counter(Rc<Cell<u32>>);

    impl TaskCallback<()> for Counter {
        fn invoke(&mut self, _: &mut (), _: &mut Scheduler, _: TaskId) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn boxed_callback_objects_fire() {
        let mut s: Scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let task = s.new_task_with(Box::new(Counter(Rc::clone(&count))));
        s.schedule(task, t(1));
        s.polltime(t(1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn huge_delay_does_not_overtake_earlier_tasks() {
        let mut s: Scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(String::new()));
        let far = logging_task(&mut s, &log, 'f');
        let near = logging_task(&mut s, &log, 'n');
        s.polltime(t(5));
        s.schedule(far, t(u64::MAX));
        s.schedule(near, t(10));
        assert_eq!(s.remaining(far), Some(t(u64::MAX - 5)));

        s.polltime(t(1_000_000));
        assert_eq!(*log.borrow(), "n");
        assert!(s.is_scheduled(far));
    }

    #[test]
    #[should_panic(expected = "zero delay")]
    fn zero_delay_is_a_contract_violation() {
        let mut s: Scheduler = Scheduler::new();
        let task = s.new_task(|_, _, _| {});
        s.schedule(task, Ticks::ZERO);
    }
}
