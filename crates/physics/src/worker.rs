//! Dedicated simulation worker thread.
//!
//! The worker loops on [`WorkQueue::next_job`]: it takes the engine lock
//! for exactly one step, releases it, and repeats. Handlers therefore block
//! on the engine lock for at most one step's duration. When frame sending
//! is on and the outbound ring has space, the step is followed by a frame
//! serialization and a notification on the outbound channel.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::frame::FrameBuffer;
use crate::queue::{Job, WorkQueue};
use crate::simulation::SphereSim;
use crate::types::Scalar;

/// Shared simulation context handle.
pub type SharedSim = Arc<Mutex<SphereSim>>;
/// Shared outbound frame ring handle.
pub type SharedFrameRing = Arc<Mutex<FrameBuffer<Scalar>>>;

/// Where the worker publishes frames.
pub struct FrameSink {
    /// Outbound frame ring, drained by the transport.
    pub ring: SharedFrameRing,
    /// Signalled after every published frame; the transport blocks on the
    /// receiving end.
    pub notify: Sender<()>,
}

/// Owning handle of a running worker thread.
///
/// Dropping the handle requests a stop and joins the thread; the in-flight
/// step always completes first.
pub struct WorkerHandle {
    queue: Arc<WorkQueue>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Stops the worker and waits for its thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.queue.stop_worker();
            if thread.join().is_err() {
                tracing::error!("simulation worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns the simulation worker for a context.
pub fn spawn(sim: SharedSim, queue: Arc<WorkQueue>, sink: Option<FrameSink>) -> WorkerHandle {
    let worker_queue = Arc::clone(&queue);
    let thread = std::thread::Builder::new()
        .name("simulation-worker".into())
        .spawn(move || run(&sim, &worker_queue, sink.as_ref()))
        .expect("failed to spawn simulation worker");
    WorkerHandle {
        queue,
        thread: Some(thread),
    }
}

fn run(sim: &SharedSim, queue: &WorkQueue, sink: Option<&FrameSink>) {
    tracing::debug!("simulation worker started");
    loop {
        match queue.next_job() {
            Job::Exit => break,
            Job::Step { emit_frame } => {
                let mut sim = sim.lock();
                sim.do_step();
                if emit_frame {
                    if let Some(sink) = sink {
                        let mut ring = sink.ring.lock();
                        if ring.has_space() {
                            sim.write_frame(&mut ring);
                            drop(ring);
                            // The transport may have gone away; frames are
                            // droppable by contract.
                            let _ = sink.notify.try_send(());
                        }
                    }
                }
            }
        }
    }
    tracing::debug!("simulation worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sphere, Vec3};
    use std::time::Duration;

    fn single_sphere_sim() -> SharedSim {
        let mut sim = SphereSim::new();
        sim.add_sphere();
        sim.update_sphere(0, Sphere::new(Vec3::new(0.5, 0.5, 0.5), 1.0, 0.1));
        sim.set_time_step(0.001);
        Arc::new(Mutex::new(sim))
    }

    #[test]
    fn bounded_jobs_run_to_completion() {
        let sim = single_sphere_sim();
        let queue = Arc::new(WorkQueue::new());
        let handle = spawn(Arc::clone(&sim), Arc::clone(&queue), None);

        queue.push_steps(5);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.is_simulating() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.stop();
        assert_eq!(sim.lock().pop_step_counter(), 5);
    }

    #[test]
    fn frames_arrive_through_the_sink() {
        let sim = single_sphere_sim();
        let queue = Arc::new(WorkQueue::new());
        let ring: SharedFrameRing = Arc::new(Mutex::new(FrameBuffer::new(60)));
        let (notify, frames) = crossbeam_channel::unbounded();
        queue.set_frame_sending(true);
        let handle = spawn(
            Arc::clone(&sim),
            Arc::clone(&queue),
            Some(FrameSink {
                ring: Arc::clone(&ring),
                notify,
            }),
        );

        queue.push_steps(3);
        frames
            .recv_timeout(Duration::from_secs(5))
            .expect("no frame notification");
        handle.stop();

        let mut ring = ring.lock();
        assert!(ring.used() >= 1);
        assert_eq!(ring.elements_per_frame(), 4);
        let index = ring.pop_element();
        assert!(index.abs() < 1e-12);
    }
}
