//! Worker pair: a forked consumer fed by the parent over one message queue.
//!
//! Parent: `SENDING -> STOPPING -> REAPING -> DONE`. Child: `RECEIVING -> EXITED`.
//! The parent alone decides how long the run lasts; the child leaves on the
//! sentinel or on a receive error, and is killed regardless once the parent
//! is done sending.

use nix::errno::Errno;
use nix::sched::sched_yield;
use nix::sys::signal::{ kill, Signal };
use nix::sys::wait::{ waitpid, WaitStatus };
use nix::unistd::{ fork, getpgrp, setpgid, ForkResult, Pid };
use tracing::{ debug, error, warn };

use crate::args::StressArgs;
use crate::constants::{ MSG_STATS_MASK, MSG_YIELD_MASK };
use crate::error::{ Result, StressError };
use crate::msg::{ ConsumerTally, Message, MsgQueue, Payload, SharedTally };

/// Why the parent left `SENDING`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendLoopExit {
    /// Stop predicate fired
    Stopped,
    /// `msgsnd` was interrupted; an orderly stop
    Interrupted,
    /// Queue statistics could not be read
    StatsFailed,
    /// `msgsnd` failed for any other reason
    SendFailed(Errno),
}

/// Result of one worker pair run
#[derive(Debug, Clone, Copy)]
pub struct PairOutcome {
    /// Identifier of the queue, removed by the time this is returned
    pub msgq_id: libc::c_int,
    pub sent: u64,
    pub exit: SendLoopExit,
    pub sentinel_sent: bool,
    /// Messages the consumer got before it stopped or was killed
    pub received: u64,
    pub mismatches: u64,
    pub sentinel_seen: bool,
    pub child_status: Option<WaitStatus>,
}

/// Run one producer/consumer pair to completion.
///
/// The queue is created before the fork and removed after the child has
/// been reaped, on every path.
pub fn run_pair(args: &StressArgs) -> Result<PairOutcome> {
    let queue = MsgQueue::create()?;
    let tally = SharedTally::new()?;
    let pgrp = getpgrp();

    let child = spawn_consumer(args, &queue, &tally, pgrp)?;

    let (sent, exit) = produce(args, &queue);

    let sentinel_sent = match queue.send(&Message::stop()) {
        Ok(()) => true,
        Err(errno) => {
            warn!(msgq_id = queue.id(), %errno, "termination msgsnd failed");
            false
        }
    };

    let child_status = reap(child);

    let msgq_id = queue.id();
    if let Err(err) = queue.remove() {
        warn!(%err, "message queue removal failed");
    }

    args.record_failures(tally.mismatches());
    if let Some((expected, received)) = tally.first_mismatch() {
        error!(
            stressor = args.name(),
            instance = args.instance(),
            mismatches = tally.mismatches(),
            "msgrcv: expected msg containing {:#x} but received {:#x} instead",
            expected,
            received
        );
    }

    let outcome = PairOutcome {
        msgq_id,
        sent,
        exit,
        sentinel_sent,
        received: tally.received(),
        mismatches: tally.mismatches(),
        sentinel_seen: tally.stopped(),
        child_status,
    };
    debug!(?outcome, "worker pair finished");

    outcome.into_result()
}

impl PairOutcome {
    /// A send failure other than `EINTR` is fatal once cleanup has run.
    pub fn into_result(self) -> Result<Self> {
        match self.exit {
            SendLoopExit::SendFailed(errno) => Err(StressError::syscall("msgsnd", errno)),
            _ => Ok(self),
        }
    }
}

/// Fork the consumer, retrying while process creation is transiently refused.
fn spawn_consumer(
    args: &StressArgs,
    queue: &MsgQueue,
    tally: &ConsumerTally,
    pgrp: Pid
) -> Result<Pid> {
    loop {
        // Safety: the child only issues syscalls on the inherited queue and
        // shared tally before leaving through _exit.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                let _ = setpgid(child, pgrp);
                return Ok(child);
            }
            Ok(ForkResult::Child) => {
                let _ = setpgid(Pid::from_raw(0), pgrp);
                die_with_parent();
                consume(args, queue, tally);
                unsafe { libc::_exit(libc::EXIT_SUCCESS) }
            }
            Err(Errno::EAGAIN | Errno::ENOMEM) if args.control().should_continue() => {
                continue;
            }
            Err(errno) => {
                error!(%errno, "fork failed");
                return Err(StressError::syscall("fork", errno));
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn die_with_parent() {
    let _ = nix::sys::prctl::set_pdeathsig(Signal::SIGKILL);
}

#[cfg(not(target_os = "linux"))]
fn die_with_parent() {}

/// Producer loop (`SENDING`). Returns messages sent and why it stopped.
pub fn produce(args: &StressArgs, queue: &MsgQueue) -> (u64, SendLoopExit) {
    let mut seq: u64 = 0;

    loop {
        if let Err(errno) = queue.send(&Message::sequence(seq)) {
            if errno == Errno::EINTR {
                return (seq, SendLoopExit::Interrupted);
            }
            error!(msgq_id = queue.id(), seq, %errno, "msgsnd failed");
            return (seq, SendLoopExit::SendFailed(errno));
        }

        let sent = seq;
        seq += 1;
        args.inc_counter();

        if sent & MSG_STATS_MASK == 0 {
            if let Err(err) = queue.stats() {
                args.report_failure(format_args!("msgq {}: {}", queue.id(), err));
                return (seq, SendLoopExit::StatsFailed);
            }
        }

        // Some kernels queue a deep backlog before msgsnd blocks; yield so
        // the consumer keeps up.
        if sent & MSG_YIELD_MASK == 0 {
            let _ = sched_yield();
        }

        if !args.keep_stressing() {
            return (seq, SendLoopExit::Stopped);
        }
    }
}

/// Consumer loop (`RECEIVING`). Returns when the sentinel arrives or a
/// receive fails.
///
/// Runs in a child forked from a possibly multithreaded parent, so it only
/// issues syscalls and writes to the tally; the parent does the logging.
pub fn consume(args: &StressArgs, queue: &MsgQueue, tally: &ConsumerTally) {
    let mut expected: u64 = 0;

    loop {
        let msg = match queue.receive() {
            Ok(msg) => msg,
            Err(_) => return,
        };

        let value = match msg.decode() {
            Payload::Stop => {
                tally.record_stop();
                return;
            }
            Payload::Sequence(value) => value,
        };
        tally.record_receive();

        if args.verify() && value != expected {
            tally.record_mismatch(expected, value);
        }
        expected += 1;
    }
}

/// Kill the consumer unconditionally and wait for it.
fn reap(child: Pid) -> Option<WaitStatus> {
    let _ = kill(child, Signal::SIGKILL);
    loop {
        match waitpid(child, None) {
            Ok(status) => return Some(status),
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                warn!(pid = %child, %errno, "waitpid failed");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::RunControl;
    use std::thread;

    #[test]
    fn test_consumer_sees_ordered_sequence_then_stops() {
        let args = StressArgs::new("msg", RunControl::new()).with_verify(true);
        let queue = MsgQueue::create().unwrap();
        let tally = ConsumerTally::default();

        thread::scope(|s| {
            s.spawn(|| consume(&args, &queue, &tally));
            for i in 0..1_000u64 {
                queue.send(&Message::sequence(i)).unwrap();
            }
            queue.send(&Message::stop()).unwrap();
        });

        assert_eq!(tally.received(), 1_000);
        assert_eq!(tally.mismatches(), 0);
        assert!(tally.stopped());
        queue.remove().unwrap();
    }

    #[test]
    fn test_consumer_reports_gaps_and_keeps_going() {
        let args = StressArgs::new("msg", RunControl::new()).with_verify(true);
        let queue = MsgQueue::create().unwrap();
        let tally = ConsumerTally::default();

        for i in [0u64, 1, 5, 2] {
            queue.send(&Message::sequence(i)).unwrap();
        }
        queue.send(&Message::stop()).unwrap();
        consume(&args, &queue, &tally);

        assert_eq!(tally.received(), 4);
        assert_eq!(tally.mismatches(), 2);
        assert_eq!(tally.first_mismatch(), Some((2, 5)));
        assert!(tally.stopped());
        queue.remove().unwrap();
    }

    #[test]
    fn test_consumer_ignores_order_without_verify() {
        let args = StressArgs::new("msg", RunControl::new());
        let queue = MsgQueue::create().unwrap();
        let tally = ConsumerTally::default();

        queue.send(&Message::sequence(9)).unwrap();
        queue.send(&Message::stop()).unwrap();
        consume(&args, &queue, &tally);

        assert_eq!(tally.mismatches(), 0);
        assert_eq!(tally.first_mismatch(), None);
        assert_eq!(tally.received(), 1);
        queue.remove().unwrap();
    }

    #[test]
    fn test_consumer_exits_when_queue_is_removed() {
        let args = StressArgs::new("msg", RunControl::new());
        let queue = MsgQueue::create().unwrap();
        let id = queue.id();
        let tally = ConsumerTally::default();

        thread::scope(|s| {
            let consumer = s.spawn(|| consume(&args, &queue, &tally));
            thread::sleep(std::time::Duration::from_millis(50));
            unsafe {
                libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut());
            }
            consumer.join().unwrap();
        });

        assert!(!tally.stopped());
        assert!(!MsgQueue::exists(id));
        // already removed above; a second IPC_RMID could hit a reused id
        std::mem::forget(queue);
    }

    #[test]
    fn test_producer_honours_max_ops() {
        let args = StressArgs::new("msg", RunControl::new()).with_max_ops(100);
        let queue = MsgQueue::create().unwrap();

        let (sent, exit) = produce(&args, &queue);
        assert_eq!(sent, 100);
        assert_eq!(exit, SendLoopExit::Stopped);
        assert_eq!(args.counter(), 100);
        assert_eq!(queue.stats().unwrap().messages, 100);
        queue.remove().unwrap();
    }

    #[test]
    fn test_producer_reports_send_failure_on_removed_queue() {
        let args = StressArgs::new("msg", RunControl::new()).with_max_ops(100);
        let queue = MsgQueue::create().unwrap();
        unsafe {
            libc::msgctl(queue.id(), libc::IPC_RMID, std::ptr::null_mut());
        }

        let (sent, exit) = produce(&args, &queue);
        assert_eq!(sent, 0);
        assert!(matches!(exit, SendLoopExit::SendFailed(Errno::EINVAL | Errno::EIDRM)));
        assert_eq!(args.counter(), 0);
        std::mem::forget(queue);
    }

    #[test]
    fn test_send_failure_maps_to_msgsnd_error() {
        let outcome = PairOutcome {
            msgq_id: 0,
            sent: 0,
            exit: SendLoopExit::SendFailed(Errno::EIDRM),
            sentinel_sent: false,
            received: 0,
            mismatches: 0,
            sentinel_seen: false,
            child_status: None,
        };
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, StressError::Syscall { op: "msgsnd", errno: Errno::EIDRM }));

        for exit in [SendLoopExit::Stopped, SendLoopExit::Interrupted, SendLoopExit::StatsFailed] {
            assert!(PairOutcome { exit, ..outcome }.into_result().is_ok());
        }
    }

    #[test]
    fn test_run_pair_cleans_up() {
        let args = StressArgs::new("msg", RunControl::new()).with_max_ops(500).with_verify(true);

        let outcome = run_pair(&args).unwrap();
        assert_eq!(outcome.sent, 500);
        assert_eq!(outcome.exit, SendLoopExit::Stopped);
        assert!(outcome.sentinel_sent);
        assert!(outcome.received <= outcome.sent);
        assert_eq!(outcome.mismatches, 0);
        assert!(matches!(
            outcome.child_status,
            Some(WaitStatus::Signaled(_, Signal::SIGKILL, _)) | Some(WaitStatus::Exited(_, 0))
        ));
        assert_eq!(args.snapshot().failures, 0);
        assert!(!MsgQueue::exists(outcome.msgq_id));
    }
}
