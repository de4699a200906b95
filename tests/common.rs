//! In-process fake key-value server for integration tests.
//!
//! Speaks the same line protocol as the real server: CRLF-terminated
//! commands, `OK`, `OK <value>` or `ERROR: <reason>` replies, and three
//! independent key spaces (plain, `R*` and `H*` verbs). State is shared
//! across connections so namespace isolation can be observed.
//!
//! A [`Fault`] makes the server misbehave in one specific way.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kvprobe::transport::Endpoint;

/// Ways the fake server can misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behave.
    None,
    /// Read commands, never reply.
    Silent,
    /// Write each reply in three pieces with pauses in between.
    SplitReplies,
    /// Prefix every reply with bytes that are not valid UTF-8.
    GarbageBytes,
    /// Close the connection after this many commands.
    CloseAfter(usize),
    /// Answer the command with this (0-based) index with a bogus value.
    WrongReplyAt(usize),
    /// Answer every command with the same text.
    FixedReply(&'static str),
}

#[derive(Default)]
struct Store {
    array: HashMap<String, String>,
    rbtree: HashMap<String, String>,
    hash: HashMap<String, String>,
}

/// Handle to a running fake server. Stops on drop.
pub struct FakeKvServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeKvServer {
    pub fn start() -> Self {
        Self::with_fault(Fault::None)
    }

    pub fn with_fault(fault: Fault) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = Arc::new(AtomicBool::new(false));
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(Mutex::new(Store::default()));

        let handle = {
            let shutdown = shutdown.clone();
            let received = received.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let store = store.clone();
                    let received = received.clone();
                    thread::spawn(move || serve(stream, fault, &store, &received));
                }
            })
        };

        Self {
            addr,
            shutdown,
            received,
            handle: Some(handle),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command received so far, across all connections.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeKvServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(stream: TcpStream, fault: Fault, store: &Mutex<Store>, received: &Mutex<Vec<String>>) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut writer = stream;
    let mut index = 0;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {},
        }
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        received.lock().unwrap().push(command.clone());

        if let Fault::CloseAfter(n) = fault
            && index >= n
        {
            return;
        }

        let reply = match fault {
            Fault::FixedReply(text) => text.to_string(),
            Fault::WrongReplyAt(n) if n == index => "OK bogus".to_string(),
            _ => execute(&command, &mut store.lock().unwrap()),
        };
        index += 1;

        let result = match fault {
            Fault::Silent => Ok(()),
            Fault::SplitReplies => write_split(&mut writer, &reply),
            Fault::GarbageBytes => {
                let mut bytes = vec![0xFF, 0xFE];
                bytes.extend_from_slice(reply.as_bytes());
                bytes.extend_from_slice(b"\r\n");
                writer.write_all(&bytes)
            },
            _ => writer.write_all(format!("{reply}\r\n").as_bytes()),
        };
        if result.is_err() {
            return;
        }
    }
}

fn write_split(writer: &mut TcpStream, reply: &str) -> std::io::Result<()> {
    let framed = format!("{reply}\r\n");
    let bytes = framed.as_bytes();
    // Split inside the terminator on purpose
    let cut_a = bytes.len() / 2;
    let cut_b = bytes.len() - 1;
    for piece in [&bytes[..cut_a], &bytes[cut_a..cut_b], &bytes[cut_b..]] {
        writer.write_all(piece)?;
        writer.flush()?;
        thread::sleep(Duration::from_millis(15));
    }
    Ok(())
}

const OK: &str = "OK";
const EXISTS: &str = "ERROR: Key already exists";
const NOT_FOUND: &str = "ERROR: Key not found";
const INVALID: &str = "ERROR: Invalid parameter";
const UNKNOWN: &str = "ERROR: Unknown command";

fn execute(command: &str, store: &mut Store) -> String {
    let tokens: Vec<&str> = command.split(' ').filter(|t| !t.is_empty()).collect();
    let Some(verb) = tokens.first() else {
        return UNKNOWN.to_string();
    };

    let (space, op) = match *verb {
        v if v.starts_with('R') && v.len() > 1 => (&mut store.rbtree, &v[1..]),
        v if v.starts_with('H') && v.len() > 1 => (&mut store.hash, &v[1..]),
        v => (&mut store.array, v),
    };

    let key = tokens.get(1).copied();
    let value = tokens.get(2).copied();

    match (op, key, value) {
        ("SET", Some(k), Some(v)) => {
            if space.contains_key(k) {
                EXISTS.to_string()
            } else {
                space.insert(k.to_string(), v.to_string());
                OK.to_string()
            }
        },
        ("GET", Some(k), _) => space
            .get(k)
            .map_or_else(|| NOT_FOUND.to_string(), |v| format!("OK {v}")),
        ("MOD", Some(k), Some(v)) => match space.get_mut(k) {
            Some(slot) => {
                *slot = v.to_string();
                OK.to_string()
            },
            None => NOT_FOUND.to_string(),
        },
        ("DEL", Some(k), _) => {
            if space.remove(k).is_some() {
                OK.to_string()
            } else {
                NOT_FOUND.to_string()
            }
        },
        ("EXIST", Some(k), _) => {
            if space.contains_key(k) {
                OK.to_string()
            } else {
                NOT_FOUND.to_string()
            }
        },
        ("SET" | "GET" | "MOD" | "DEL" | "EXIST", _, _) => INVALID.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
