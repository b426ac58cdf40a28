#![allow(dead_code)]

use islandviewer_client::{
    config::Config,
    retry::{CancelToken, Clock},
    transport::{Reply, StreamReply, SubmitFallback, SubmitForm, Transport, TransportError},
    JobClient,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Scripted answers for one kind of call.
pub enum Scripted {
    Reply(Reply),
    Stream(u16, Vec<u8>),
    /// Body that fails after yielding the given prefix.
    Broken(u16, Vec<u8>),
    Timeout,
    Refused,
}

#[derive(Default)]
struct State {
    submits: VecDeque<Scripted>,
    posts: VecDeque<Scripted>,
    gets: VecDeque<Scripted>,
    calls: Vec<String>,
    forms: Vec<SubmitForm>,
}

/// In-memory stand-in for the service. Clones share state so a test can
/// keep a handle after moving one into the client.
#[derive(Clone, Default)]
pub struct FakeTransport(Rc<RefCell<State>>);

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(&self, s: Scripted) -> &Self {
        self.0.borrow_mut().submits.push_back(s);
        self
    }

    pub fn on_post(&self, s: Scripted) -> &Self {
        self.0.borrow_mut().posts.push_back(s);
        self
    }

    pub fn on_get(&self, s: Scripted) -> &Self {
        self.0.borrow_mut().gets.push_back(s);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn forms(&self) -> Vec<SubmitForm> {
        self.0.borrow().forms.clone()
    }

    fn next(queue: &mut VecDeque<Scripted>, path: &str) -> Scripted {
        queue
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer left for {path}"))
    }
}

struct FailingTail {
    head: Cursor<Vec<u8>>,
}

impl Read for FailingTail {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.head.read(buf)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ));
        }
        Ok(n)
    }
}

fn as_reply(s: Scripted, path: &str) -> Result<Reply, TransportError> {
    match s {
        Scripted::Reply(r) => Ok(r),
        Scripted::Stream(status, body) => Ok(Reply::new(status, body)),
        Scripted::Broken(..) => panic!("broken body scripted for buffered call {path}"),
        Scripted::Timeout => Err(TransportError::Timeout {
            path: path.to_string(),
            detail: "operation timed out".into(),
        }),
        Scripted::Refused => Err(TransportError::Request {
            path: path.to_string(),
            detail: "connection refused".into(),
        }),
    }
}

impl Transport for FakeTransport {
    fn submit(&self, form: &SubmitForm) -> Result<Reply, TransportError> {
        let mut st = self.0.borrow_mut();
        st.calls.push("POST /rest/submit/".into());
        st.forms.push(form.clone());
        let s = Self::next(&mut st.submits, "/rest/submit/");
        as_reply(s, "/rest/submit/")
    }

    fn post(&self, path: &str) -> Result<Reply, TransportError> {
        let mut st = self.0.borrow_mut();
        st.calls.push(format!("POST {path}"));
        let s = Self::next(&mut st.posts, path);
        as_reply(s, path)
    }

    fn get_stream(&self, path: &str) -> Result<StreamReply, TransportError> {
        let mut st = self.0.borrow_mut();
        st.calls.push(format!("GET {path}"));
        match Self::next(&mut st.gets, path) {
            Scripted::Stream(status, body) => Ok(StreamReply {
                status,
                body: Box::new(Cursor::new(body)),
            }),
            Scripted::Broken(status, head) => Ok(StreamReply {
                status,
                body: Box::new(FailingTail {
                    head: Cursor::new(head),
                }),
            }),
            Scripted::Reply(r) => Ok(StreamReply {
                status: r.status,
                body: Box::new(Cursor::new(r.body)),
            }),
            other => as_reply(other, path).map(|_| unreachable!()),
        }
    }
}

/// Fallback that answers from a script and counts its uses.
#[derive(Clone, Default)]
pub struct FakeFallback {
    answers: Rc<RefCell<VecDeque<Scripted>>>,
    uses: Rc<RefCell<u32>>,
}

impl FakeFallback {
    pub fn answering(s: Scripted) -> Self {
        let f = Self::default();
        f.answers.borrow_mut().push_back(s);
        f
    }

    pub fn uses(&self) -> u32 {
        *self.uses.borrow()
    }
}

impl SubmitFallback for FakeFallback {
    fn name(&self) -> &str {
        "fake-curl"
    }

    fn submit(&self, _form: &SubmitForm) -> Result<Reply, TransportError> {
        *self.uses.borrow_mut() += 1;
        let s = self
            .answers
            .borrow_mut()
            .pop_front()
            .expect("fallback called more often than scripted");
        as_reply(s, "/rest/submit/")
    }
}

/// Clock that never blocks; sleeping just advances `now`.
#[derive(Clone)]
pub struct FakeClock {
    base: Instant,
    offset: Rc<RefCell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(RefCell::new(Duration::ZERO)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.borrow()
    }

    fn sleep(&self, d: Duration, cancel: &CancelToken) -> bool {
        self.sleeps.borrow_mut().push(d);
        *self.offset.borrow_mut() += d;
        !cancel.is_cancelled()
    }
}

pub fn json(status: u16, body: &str) -> Scripted {
    Scripted::Reply(Reply::new(status, body))
}

pub fn status(s: &str) -> Scripted {
    json(200, &format!(r#"{{"status":"{s}"}}"#))
}

pub fn accepted(token: &str) -> Scripted {
    json(200, &format!(r#"{{"status":200,"token":"{token}"}}"#))
}

pub fn client(cfg: &Config, fake: &FakeTransport, clock: &FakeClock) -> JobClient<FakeTransport> {
    JobClient::new(cfg, fake.clone()).with_clock(Box::new(clock.clone()))
}

pub fn genome_file(dir: &std::path::Path) -> std::path::PathBuf {
    let p = dir.join("s1-genome.gbk");
    std::fs::write(&p, "LOCUS       contig1  12 bp    DNA\nORIGIN\n        1 acgtacgtacgt\n//\n")
        .expect("write genome");
    p
}

pub fn job(token: &str) -> islandviewer_client::Job {
    islandviewer_client::Job {
        token: token.to_string(),
        input: "s1-genome.gbk".into(),
        reference_accession: None,
        submitted_via: "http".into(),
    }
}
