use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::proto::EXTERNAL_CALL_TIMEOUT;
use crate::result::Error;

/// How the external authority is invoked at handshake completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Block the handshake on the authority verdict; a rejection aborts the
    /// TLS connection.
    Synchronous,
    /// Dispatch without blocking. A negative verdict is only logged; the
    /// handshake completes regardless. For transports that cannot tolerate
    /// an external round-trip inside the handshake.
    Asynchronous,
}

/// Binding report handed to the external authority.
#[derive(Debug, Clone, Copy)]
pub struct BindingReport<'a> {
    /// Hex binding key, proving possession of the TLS session.
    pub binding_key: &'a str,
    /// Hex binding id, the non-secret lookup handle.
    pub binding_id: &'a str,
    pub authority: &'a str,
    pub group: Option<&'a str>,
    pub role: Option<&'a str>,
}

/// Trait to implement to integrate the binding engine into an application.
///
/// Templating the engine on this trait keeps it independent of how the
/// external authority is actually reached (process spawn, RPC, test double).
pub trait AuthorityLayer {
    /// Server-side pre-registration, keyed by binding id and key alone.
    /// A failure here is logged but does not reject the binding.
    fn pre_register(&mut self, report: &BindingReport<'_>) -> Result<(), Error>;

    /// Server-side confirmation, additionally carrying the session id the
    /// binding is published under. In `Asynchronous` mode implementations
    /// must dispatch without blocking and return `Ok`.
    fn confirm(
        &mut self,
        mode: HandshakeMode,
        session_id: &str,
        report: &BindingReport<'_>,
    ) -> Result<(), Error>;

    /// Client-side registration; dispatched without blocking the handshake.
    fn register(&mut self, report: &BindingReport<'_>) -> Result<(), Error>;

    /// Receives a stream of events that occur while a binding is driven.
    /// Provided for debugging, logging or metrics purposes only.
    #[cfg(feature = "logging")]
    #[allow(unused)]
    fn event_log(&mut self, event: crate::LogEvent<'_>) {}
}

/// Detached children still need a wait, or they linger as zombies for the
/// life of the hosting server.
fn reap_detached(mut child: Child) {
    thread::spawn(move || {
        let _ = child.wait();
    });
}

/// `AuthorityLayer` backed by an external handler executable, speaking the
/// aaa protocol handler argument contract (`-pri`/`-pr4`/`-prx`).
pub struct HandlerCommand {
    handler: String,
    deadline: Duration,
}

impl HandlerCommand {
    pub fn new(handler: impl Into<String>) -> Self {
        Self { handler: handler.into(), deadline: EXTERNAL_CALL_TIMEOUT }
    }

    pub fn with_deadline(handler: impl Into<String>, deadline: Duration) -> Self {
        Self { handler: handler.into(), deadline }
    }

    fn command(&self, op: &str, session_id: Option<&str>, report: &BindingReport<'_>) -> Command {
        let mut cmd = Command::new(&self.handler);
        cmd.arg(op);
        if let Some(sid) = session_id {
            cmd.arg(format!("-s{}", sid));
        }
        cmd.arg(format!("-a{}", report.authority));
        cmd.arg(format!("-i{}", report.binding_id));
        cmd.arg(format!("-k{}", report.binding_key));
        if let (Some(group), Some(role)) = (report.group, report.role) {
            cmd.arg(format!("-g{}", group));
            cmd.arg(format!("-r{}", role));
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }

    /// Wait for the child within the deadline; a timeout kills it and fails
    /// closed, a non-zero exit is an authority rejection.
    fn wait_bounded(&self, mut child: Child) -> Result<(), Error> {
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return if status.success() {
                    Ok(())
                } else {
                    Err(Error::AuthorityRejected)
                };
            }
            if start.elapsed() >= self.deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl AuthorityLayer for HandlerCommand {
    fn pre_register(&mut self, report: &BindingReport<'_>) -> Result<(), Error> {
        let child = self.command("-pri", None, report).spawn()?;
        self.wait_bounded(child)
    }

    fn confirm(
        &mut self,
        mode: HandshakeMode,
        session_id: &str,
        report: &BindingReport<'_>,
    ) -> Result<(), Error> {
        let mut cmd = self.command("-pr4", Some(session_id), report);
        match mode {
            HandshakeMode::Synchronous => {
                let child = cmd.spawn()?;
                self.wait_bounded(child)
            }
            HandshakeMode::Asynchronous => {
                // fire and forget; the verdict is never observed
                reap_detached(cmd.spawn()?);
                Ok(())
            }
        }
    }

    fn register(&mut self, report: &BindingReport<'_>) -> Result<(), Error> {
        reap_detached(self.command("-prx", None, report).spawn()?);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn report<'a>() -> BindingReport<'a> {
        BindingReport {
            binding_key: "00ff00ff00ff00ff00ff00ff00ff00ff",
            binding_id: "60ef1710d7cc28f856bd",
            authority: "aaa.example.net",
            group: None,
            role: None,
        }
    }

    #[test]
    #[cfg(unix)]
    fn accepting_handler_passes() {
        let mut handler = HandlerCommand::new("/bin/true");
        assert_eq!(handler.pre_register(&report()), Ok(()));
        assert_eq!(
            handler.confirm(HandshakeMode::Synchronous, "aabb", &report()),
            Ok(())
        );
    }

    #[test]
    #[cfg(unix)]
    fn rejecting_handler_fails_synchronously_only() {
        let mut handler = HandlerCommand::new("/bin/false");
        assert_eq!(
            handler.confirm(HandshakeMode::Synchronous, "aabb", &report()),
            Err(Error::AuthorityRejected)
        );
        // asynchronous dispatch never observes the exit status
        assert_eq!(
            handler.confirm(HandshakeMode::Asynchronous, "aabb", &report()),
            Ok(())
        );
    }

    /// Children whose parent is this process and whose state is `Z`.
    #[cfg(unix)]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| std::fs::read_to_string(e.path().join("stat")).ok())
            .filter(|stat| {
                // pid (comm) state ppid ...; comm may itself contain ')'
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[test]
    #[cfg(unix)]
    fn detached_handlers_leave_no_zombies() {
        let mut handler = HandlerCommand::new("/bin/true");
        for _ in 0..5 {
            handler.register(&report()).unwrap();
            handler
                .confirm(HandshakeMode::Asynchronous, "aabb", &report())
                .unwrap();
        }

        // the reaper threads race this check; give them time to catch up
        let mut zombies = usize::MAX;
        for _ in 0..40 {
            zombies = zombie_children();
            if zombies == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(zombies, 0);
    }

    #[test]
    #[cfg(unix)]
    fn hung_handler_times_out() {
        let mut handler =
            HandlerCommand::with_deadline("/bin/sleep", Duration::from_millis(50));
        // "-pri" etc. are harmless unknown args to sleep; it exits non-zero
        // immediately, so hang it explicitly instead
        let mut cmd = Command::new("/bin/sleep");
        cmd.arg("10").stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        let child = cmd.spawn().unwrap();
        assert_eq!(handler.wait_bounded(child), Err(Error::Timeout));
    }
}
