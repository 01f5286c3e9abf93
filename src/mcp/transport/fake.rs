//! Scripted in-memory transport for tests.
//!
//! Understands a handful of commands:
//!
//! | Command | Behavior |
//! |---------|----------|
//! | `echo <text>` | `<text>\n` on stdout |
//! | `echo-err <text>` | `<text>\n` on stderr |
//! | `cat` | copies stdin to stdout |
//! | `whoami` | the session user (or `root` under sudo) |
//! | `sleep <secs>` | waits, fractional seconds allowed |
//! | `trickle <text>` | `<text>\n` on stdout, then hangs for an hour |
//! | `burst <tag> <n>` | `n` lines of `<tag>` on both streams, yielding between lines |
//! | `exit <n>` | exits with status `n` |
//! | `die` | kills the whole connection mid-command |
//! | `sudo ... -- sh -c <cmd>` | reads a password line from stdin, then runs `<cmd>` |
//!
//! Anything else exits 127 with a "not found" message on stderr.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::mcp::error::SshError;
use crate::mcp::session::Credentials;

use super::traits::{ChannelEvent, CommandChannel, Connection, Connector};

/// Per-connection counters shared with the test.
#[derive(Debug, Default)]
pub(crate) struct FakeStats {
    pub channels_opened: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

#[derive(Clone)]
struct Behavior {
    user: String,
    sudo_password: String,
    echo_input: bool,
    nopasswd: bool,
}

pub(crate) struct FakeConnector {
    password: String,
    sudo_password: String,
    echo_input: bool,
    nopasswd: bool,
    connects: AtomicUsize,
    stats: Mutex<Vec<Arc<FakeStats>>>,
}

impl FakeConnector {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            sudo_password: password.to_string(),
            echo_input: false,
            nopasswd: false,
            connects: AtomicUsize::new(0),
            stats: Mutex::new(Vec::new()),
        }
    }

    /// Accept a different password at the sudo prompt than at login.
    pub fn with_sudo_password(mut self, sudo_password: &str) -> Self {
        self.sudo_password = sudo_password.to_string();
        self
    }

    /// Echo submitted input back on stdout, like a remote tty would.
    pub fn with_echo(mut self) -> Self {
        self.echo_input = true;
        self
    }

    /// sudo never asks for a password (NOPASSWD sudoers entry).
    pub fn with_nopasswd(mut self) -> Self {
        self.nopasswd = true;
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn stats(&self, index: usize) -> Arc<FakeStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())[index].clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, SshError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if credentials.host.starts_with("unreachable") {
            return Err(SshError::Network(
                "Failed to connect: Connection refused (os error 111)".to_string(),
            ));
        }
        if credentials.secret.expose() != self.password {
            return Err(SshError::Auth(
                "Authentication failed: password authentication rejected".to_string(),
            ));
        }

        let connection = FakeConnection {
            behavior: Behavior {
                user: credentials.username.clone(),
                sudo_password: self.sudo_password.clone(),
                echo_input: self.echo_input,
                nopasswd: self.nopasswd,
            },
            closed: CancellationToken::new(),
            stats: Arc::new(FakeStats::default()),
        };
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(connection.stats.clone());
        Ok(Box::new(connection))
    }
}

pub(crate) struct FakeConnection {
    behavior: Behavior,
    closed: CancellationToken,
    stats: Arc<FakeStats>,
}

impl FakeConnection {
    pub fn new(sudo_password: &str) -> Self {
        Self {
            behavior: Behavior {
                user: "alex".to_string(),
                sudo_password: sudo_password.to_string(),
                echo_input: false,
                nopasswd: false,
            },
            closed: CancellationToken::new(),
            stats: Arc::new(FakeStats::default()),
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn open_channel(&self) -> Result<Box<dyn CommandChannel>, SshError> {
        if self.closed.is_cancelled() {
            return Err(SshError::Channel(
                "Failed to open channel: connection closed".to_string(),
            ));
        }

        self.stats.channels_opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakeChannel {
            behavior: self.behavior.clone(),
            connection_closed: self.closed.clone(),
            stats: self.stats.clone(),
            command: None,
            stdin: Vec::new(),
            script: None,
            released: false,
        }))
    }

    async fn close(&self) {
        self.closed.cancel();
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

enum Step {
    Sleep(Duration),
    Event(ChannelEvent),
    KillConnection,
}

struct FakeChannel {
    behavior: Behavior,
    connection_closed: CancellationToken,
    stats: Arc<FakeStats>,
    command: Option<String>,
    stdin: Vec<u8>,
    script: Option<VecDeque<Step>>,
    released: bool,
}

impl FakeChannel {
    fn ensure_open(&self) -> Result<(), SshError> {
        if self.connection_closed.is_cancelled() {
            Err(SshError::Channel("Broken pipe: connection closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn exec(&mut self, command: &str) -> Result<(), SshError> {
        self.ensure_open()?;
        self.command = Some(command.to_string());
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SshError> {
        self.ensure_open()?;
        self.stdin.extend_from_slice(data);
        Ok(())
    }

    async fn eof(&mut self) -> Result<(), SshError> {
        self.ensure_open()
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.script.is_none() {
            let command = self.command.clone().unwrap_or_default();
            self.script = Some(script_for(&command, &self.stdin, &self.behavior));
        }

        loop {
            if self.connection_closed.is_cancelled() {
                return None;
            }
            match self.script.as_mut()?.pop_front()? {
                Step::Event(event) => {
                    tokio::task::yield_now().await;
                    return Some(event);
                }
                Step::Sleep(duration) => {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {}
                        _ = self.connection_closed.cancelled() => return None,
                    }
                }
                Step::KillConnection => {
                    self.connection_closed.cancel();
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

fn finish(mut steps: Vec<Step>, status: u32) -> VecDeque<Step> {
    steps.push(Step::Event(ChannelEvent::ExitStatus(status)));
    steps.push(Step::Event(ChannelEvent::Eof));
    steps.push(Step::Event(ChannelEvent::Closed));
    steps.into()
}

fn line(text: &str) -> Vec<u8> {
    format!("{}\n", text).into_bytes()
}

fn script_for(command: &str, stdin: &[u8], behavior: &Behavior) -> VecDeque<Step> {
    if command.starts_with("sudo ") {
        return sudo_script(command, stdin, behavior);
    }
    let (steps, status) = run_plain(command, stdin, &behavior.user);
    finish(steps, status)
}

fn run_plain(command: &str, stdin: &[u8], user: &str) -> (Vec<Step>, u32) {
    let (program, args) = command.split_once(' ').unwrap_or((command, ""));
    match program {
        "echo" => (vec![Step::Event(ChannelEvent::Stdout(line(args)))], 0),
        "echo-err" => (vec![Step::Event(ChannelEvent::Stderr(line(args)))], 0),
        "cat" if stdin.is_empty() => (Vec::new(), 0),
        "cat" => (vec![Step::Event(ChannelEvent::Stdout(stdin.to_vec()))], 0),
        "whoami" => (vec![Step::Event(ChannelEvent::Stdout(line(user)))], 0),
        "sleep" => {
            let secs: f64 = args.trim().parse().unwrap_or(0.0);
            (vec![Step::Sleep(Duration::from_secs_f64(secs))], 0)
        }
        "burst" => {
            let (tag, count) = args.split_once(' ').unwrap_or((args, "1"));
            let count: usize = count.trim().parse().unwrap_or(1);
            let mut steps = Vec::with_capacity(count * 3);
            for _ in 0..count {
                steps.push(Step::Event(ChannelEvent::Stdout(line(tag))));
                steps.push(Step::Event(ChannelEvent::Stderr(line(tag))));
                steps.push(Step::Sleep(Duration::from_millis(1)));
            }
            (steps, 0)
        }
        "trickle" => (
            vec![
                Step::Event(ChannelEvent::Stdout(line(args))),
                Step::Sleep(Duration::from_secs(3600)),
            ],
            0,
        ),
        "exit" => (Vec::new(), args.trim().parse().unwrap_or(1)),
        "die" => (vec![Step::KillConnection], 0),
        _ => (
            vec![Step::Event(ChannelEvent::Stderr(line(&format!(
                "sh: 1: {}: not found",
                program
            ))))],
            127,
        ),
    }
}

fn sudo_script(command: &str, stdin: &[u8], behavior: &Behavior) -> VecDeque<Step> {
    let tokens = shlex::split(command).unwrap_or_default();
    let prompt = tokens
        .iter()
        .position(|t| t == "-p")
        .and_then(|i| tokens.get(i + 1).cloned())
        .unwrap_or_else(|| format!("[sudo] password for {}: ", behavior.user));
    let inner = match tokens.iter().position(|t| t == "-c") {
        Some(i) => tokens.get(i + 1).cloned().unwrap_or_default(),
        None => tokens
            .iter()
            .skip_while(|t| *t != "--")
            .skip(1)
            .cloned()
            .collect::<Vec<_>>()
            .join(" "),
    };

    if behavior.nopasswd {
        let (steps, status) = run_plain(&inner, stdin, "root");
        return finish(steps, status);
    }

    let text = String::from_utf8_lossy(stdin).into_owned();
    let (password, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));

    let mut steps = vec![Step::Event(ChannelEvent::Stderr(prompt.into_bytes()))];
    if behavior.echo_input {
        steps.push(Step::Event(ChannelEvent::Stdout(line(password))));
    }

    if password != behavior.sudo_password {
        steps.push(Step::Event(ChannelEvent::Stderr(
            b"\nSorry, try again.\nsudo: 1 incorrect password attempt\n".to_vec(),
        )));
        return finish(steps, 1);
    }

    steps.push(Step::Event(ChannelEvent::Stderr(b"\n".to_vec())));
    let (inner_steps, status) = run_plain(&inner, rest.as_bytes(), "root");
    steps.extend(inner_steps);
    finish(steps, status)
}
