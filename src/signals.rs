//! Signal handling across the launcher's lifetime.
//!
//! One dispatcher task receives every signal the launcher has registered and acts on it
//! according to the current [`Phase`]:
//!
//! * `SettingUp`: an interrupt-like signal cancels setup; anything else is ignored.
//! * `Starting`: the signal is held until the child's pid is known, then forwarded.
//! * `Running`: the signal is forwarded unchanged to the child.
//! * `Done`: the signal is ignored while the launcher shuts down.

use crate::error::{LauncherError, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SettingUp,
    Starting,
    Running { pid: u32 },
    Done,
}

pub struct SignalRelay {
    phase: watch::Sender<Phase>,
    interrupted: watch::Receiver<Option<i32>>,
    sender: mpsc::UnboundedSender<i32>,
    #[cfg(unix)]
    registered: Vec<i32>,
}

impl SignalRelay {
    /// Register the setup-phase interrupt signals and start the dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Result<Self> {
        let (phase, phase_rx) = watch::channel(Phase::SettingUp);
        let (interrupted_tx, interrupted) = watch::channel(None);
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(dispatch(receiver, phase_rx, interrupted_tx));

        let mut relay = Self {
            phase,
            interrupted,
            sender,
            #[cfg(unix)]
            registered: Vec::new(),
        };
        relay.listen_for_interrupts()?;
        Ok(relay)
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Signal number that cancelled setup, if any
    pub fn interruption(&self) -> Option<i32> {
        *self.interrupted.borrow()
    }

    /// Resolves once an interrupt arrives during setup.
    pub async fn interrupted(&self) -> i32 {
        let mut interrupted = self.interrupted.clone();
        loop {
            if let Some(signal) = *interrupted.borrow_and_update() {
                return signal;
            }
            if interrupted.changed().await.is_err() {
                // dispatcher is gone, no interrupt can arrive anymore
                std::future::pending::<()>().await;
            }
        }
    }

    /// Leave setup and register every relayable signal so that it reaches the dispatcher.
    ///
    /// Signals arriving from here on are held until [`SignalRelay::running`] supplies the
    /// child's pid, then forwarded in arrival order.
    pub fn arm(&mut self) {
        self.phase.send_replace(Phase::Starting);

        #[cfg(unix)]
        for signal in unix::relayed_signals() {
            let signal = signal as i32;
            if self.registered.contains(&signal) {
                continue;
            }
            match unix::listen(signal, self.sender.clone()) {
                Ok(()) => self.registered.push(signal),
                Err(e) => debug!("Not relaying signal {}: {}", signal, e),
            }
        }
    }

    pub fn running(&self, pid: u32) {
        self.phase.send_replace(Phase::Running { pid });
    }

    pub fn done(&self) {
        self.phase.send_replace(Phase::Done);
    }

    #[cfg(unix)]
    fn listen_for_interrupts(&mut self) -> Result<()> {
        for signal in unix::SETUP_INTERRUPTS {
            let signal = *signal as i32;
            unix::listen(signal, self.sender.clone()).map_err(LauncherError::SignalSetup)?;
            self.registered.push(signal);
        }
        Ok(())
    }

    #[cfg(windows)]
    fn listen_for_interrupts(&mut self) -> Result<()> {
        windows::listen(self.sender.clone()).map_err(LauncherError::SignalSetup)
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<i32>,
    mut phase: watch::Receiver<Phase>,
    interrupted: watch::Sender<Option<i32>>,
) {
    let mut pending: Vec<i32> = Vec::new();

    loop {
        tokio::select! {
            // A phase change is applied before any signal that raced with it.
            biased;

            changed = phase.changed() => {
                if changed.is_err() {
                    // the relay is gone
                    break;
                }
                let current = *phase.borrow_and_update();
                match current {
                    Phase::Running { pid } => {
                        for signal in pending.drain(..) {
                            relay_to(pid, signal);
                        }
                    }
                    Phase::Done if !pending.is_empty() => {
                        debug!("Dropping {} signal(s), no child was started", pending.len());
                        pending.clear();
                    }
                    _ => {}
                }
            }
            received = receiver.recv() => {
                let Some(signal) = received else { break };
                let current = *phase.borrow();
                match current {
                    Phase::SettingUp => {
                        if is_setup_interrupt(signal) {
                            debug!("Received signal {} during setup", signal);
                            interrupted.send_replace(Some(signal));
                        } else {
                            trace!("Ignoring signal {} during setup", signal);
                        }
                    }
                    Phase::Starting => {
                        trace!("Holding signal {} until the child starts", signal);
                        pending.push(signal);
                    }
                    Phase::Running { pid } => {
                        // held signals go first even if the phase change is not seen yet
                        for held in pending.drain(..) {
                            relay_to(pid, held);
                        }
                        relay_to(pid, signal);
                    }
                    Phase::Done => trace!("Ignoring signal {} after child exit", signal),
                }
            }
        }
    }
}

fn relay_to(pid: u32, signal: i32) {
    match forward(pid, signal) {
        Ok(()) => trace!("Forwarded signal {} to {}", signal, pid),
        Err(e) => warn!("{}", e),
    }
}

#[cfg(unix)]
fn is_setup_interrupt(signal: i32) -> bool {
    unix::SETUP_INTERRUPTS
        .iter()
        .any(|interrupt| *interrupt as i32 == signal)
}

#[cfg(windows)]
fn is_setup_interrupt(_signal: i32) -> bool {
    true
}

/// Deliver `signal` to `pid`. A child that has already exited is not an error.
#[cfg(unix)]
pub fn forward(pid: u32, signal: i32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let forward_error = |errno: Errno| LauncherError::SignalForward {
        signal,
        pid,
        source: errno.into(),
    };

    let signal_kind = Signal::try_from(signal).map_err(forward_error)?;
    match kill(Pid::from_raw(pid as i32), signal_kind) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!("Process {} already exited, dropping signal {}", pid, signal);
            Ok(())
        }
        Err(errno) => Err(forward_error(errno)),
    }
}

/// Console control events reach every process attached to the console, the child included.
#[cfg(windows)]
pub fn forward(pid: u32, signal: i32) -> Result<()> {
    trace!("Console delivers signal {} to {} directly", signal, pid);
    Ok(())
}

#[cfg(unix)]
mod unix {
    use nix::sys::signal::Signal;
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::sync::mpsc;

    /// Signals that cancel setup before a child exists
    pub const SETUP_INTERRUPTS: &[Signal] = &[
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGHUP,
        Signal::SIGQUIT,
    ];

    /// Uncatchable signals, synchronous faults of the launcher itself, and
    /// signals about the launcher's own child and pipes.
    const NOT_RELAYED: &[Signal] = &[
        Signal::SIGKILL,
        Signal::SIGSTOP,
        Signal::SIGILL,
        Signal::SIGFPE,
        Signal::SIGSEGV,
        Signal::SIGBUS,
        Signal::SIGTRAP,
        Signal::SIGSYS,
        Signal::SIGCHLD,
        Signal::SIGPIPE,
    ];

    /// Every signal forwarded to a running child, numbered for the host platform
    pub fn relayed_signals() -> Vec<Signal> {
        Signal::iterator()
            .filter(|signal| !NOT_RELAYED.contains(signal))
            .collect()
    }

    /// Spawn a task feeding every delivery of `signo` into `sender`.
    pub fn listen(signo: i32, sender: mpsc::UnboundedSender<i32>) -> std::io::Result<()> {
        let mut stream = signal(SignalKind::from_raw(signo))?;
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if sender.send(signo).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }
}

#[cfg(windows)]
mod windows {
    use tokio::signal::windows::{ctrl_break, ctrl_c};
    use tokio::sync::mpsc;

    const CTRL_C: i32 = 2;
    const CTRL_BREAK: i32 = 21;

    pub fn listen(sender: mpsc::UnboundedSender<i32>) -> std::io::Result<()> {
        let mut interrupt = ctrl_c()?;
        let mut brk = ctrl_break()?;
        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    Some(()) = interrupt.recv() => CTRL_C,
                    Some(()) = brk.recv() => CTRL_BREAK,
                    else => break,
                };
                if sender.send(signal).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }
}
