//! Producer/consumer seam between request handlers and the simulation
//! worker.
//!
//! The queue holds at most one active job: a bounded "simulate N steps"
//! counter or the unlimited flag. Further pushes coalesce by replacement.
//! Handlers mutate the queue under its mutex and signal the worker; the
//! worker pops one step at a time and performs it outside the queue lock.

use parking_lot::{Condvar, Mutex};

/// What the worker should do next.
#[derive(Debug, PartialEq, Eq)]
pub enum Job {
    /// Perform one simulation step; `emit_frame` reflects the frame-sending
    /// flag at pop time.
    Step { emit_frame: bool },
    /// Leave the worker loop.
    Exit,
}

#[derive(Default)]
struct QueueState {
    steps_remaining: u32,
    unlimited: bool,
    simulating: bool,
    send_frames: bool,
    stop_worker: bool,
}

/// Shared simulation job state.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current job: simulate `steps` steps, or without limit
    /// when `steps` is zero.
    pub fn push_steps(&self, steps: u32) {
        let mut state = self.state.lock();
        if steps == 0 {
            state.unlimited = true;
            state.steps_remaining = 0;
        } else {
            state.unlimited = false;
            state.steps_remaining = steps;
        }
        state.simulating = true;
        drop(state);
        self.signal.notify_one();
    }

    /// Clears the current job. The worker finishes the step it is on and
    /// then goes idle; it is not torn down.
    pub fn stop_simulation(&self) {
        let mut state = self.state.lock();
        state.unlimited = false;
        state.steps_remaining = 0;
        drop(state);
        self.signal.notify_one();
    }

    /// Tells the worker to leave its loop after the current step.
    pub fn stop_worker(&self) {
        let mut state = self.state.lock();
        state.stop_worker = true;
        drop(state);
        self.signal.notify_one();
    }

    /// Whether a job is active. Stays true while the final step of a job is
    /// still being performed.
    #[must_use]
    pub fn is_simulating(&self) -> bool {
        self.state.lock().simulating
    }

    /// Toggles regular frame emission.
    pub fn set_frame_sending(&self, send_frames: bool) {
        self.state.lock().send_frames = send_frames;
    }

    /// Whether regular frame emission is on.
    #[must_use]
    pub fn frame_sending(&self) -> bool {
        self.state.lock().send_frames
    }

    /// Blocks until work or a stop signal arrives. Called by the worker
    /// only.
    pub(crate) fn next_job(&self) -> Job {
        let mut state = self.state.lock();
        loop {
            if state.stop_worker {
                return Job::Exit;
            }
            if state.unlimited {
                return Job::Step {
                    emit_frame: state.send_frames,
                };
            }
            if state.steps_remaining > 0 {
                state.steps_remaining -= 1;
                return Job::Step {
                    emit_frame: state.send_frames,
                };
            }
            state.simulating = false;
            self.signal.wait(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_coalesce_by_replacement() {
        let queue = WorkQueue::new();
        queue.push_steps(5);
        queue.push_steps(2);
        assert_eq!(queue.next_job(), Job::Step { emit_frame: false });
        assert_eq!(queue.next_job(), Job::Step { emit_frame: false });
        assert!(queue.is_simulating());
    }

    #[test]
    fn stop_worker_wins_over_pending_work() {
        let queue = WorkQueue::new();
        queue.push_steps(10);
        queue.stop_worker();
        assert_eq!(queue.next_job(), Job::Exit);
    }

    #[test]
    fn frame_flag_is_sampled_at_pop_time() {
        let queue = WorkQueue::new();
        queue.set_frame_sending(true);
        queue.push_steps(1);
        assert_eq!(queue.next_job(), Job::Step { emit_frame: true });
    }
}
