//! End-to-end exercises of the resolver's public surface against loopback UDP/TCP stub servers:
//! no async runtime, the resolver is driven exactly as a synchronous host would drive it, through
//! `submit`/`wait`/`check`.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use resolver::{Config, QueryFlags, Resolver, Status, Type};

fn alloc_port() -> u16 {
    static NEXT: AtomicU16 = AtomicU16::new(28_000);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Surfaces the resolver's own `log` output under `RUST_LOG` when a test run needs it; harmless
/// to call more than once since every caller races the same `try_init`.
fn init_logging() {
    let _ = env_logger::try_init();
}

/// Reads the 12-byte header's id.
fn request_id(req: &[u8]) -> u16 {
    u16::from_be_bytes([req[0], req[1]])
}

/// The question section verbatim (owner labels through qtype/qclass), so a crafted reply always
/// echoes back exactly what was asked regardless of how the query happened to be encoded.
fn question_bytes(req: &[u8]) -> &[u8] {
    let mut i = 12;
    while req[i] != 0 {
        i += 1 + req[i] as usize;
    }
    i += 1 + 4; // the root label, then qtype/qclass
    &req[12..i]
}

fn question_qtype(req: &[u8]) -> u16 {
    let mut i = 12;
    while req[i] != 0 {
        i += 1 + req[i] as usize;
    }
    i += 1;
    u16::from_be_bytes([req[i], req[i + 1]])
}

fn push_name(buf: &mut Vec<u8>, name: &str) {
    for label in name.trim_end_matches('.').split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
}

/// Builds a reply header: fixed `QR=1`/`RD=1`, the given `AA`/`TC` bits folded into the flags byte,
/// and the given rcode/section counts.
fn reply_header(id: u16, tc: bool, rcode: u8, ancount: u16, nscount: u16) -> Vec<u8> {
    let mut h = Vec::new();
    h.extend_from_slice(&id.to_be_bytes());
    h.push(0x80 | if tc { 0x02 } else { 0 } | 0x01); // QR, TC?, RD(echoed)
    h.push(0x80 | rcode); // RA, rcode
    h.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    h.extend_from_slice(&ancount.to_be_bytes());
    h.extend_from_slice(&nscount.to_be_bytes());
    h.extend_from_slice(&0u16.to_be_bytes());
    h
}

fn push_rr(buf: &mut Vec<u8>, name: &str, rtype: u16, ttl: u32, rdata: &[u8]) {
    push_name(buf, name);
    buf.extend_from_slice(&rtype.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&ttl.to_be_bytes());
    buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    buf.extend_from_slice(rdata);
}

const TY_A: u16 = 1;
const TY_CNAME: u16 = 5;
const TY_MX: u16 = 15;
const TY_AAAA: u16 = 28;

/// A loopback UDP stub server driven by a per-request handler, torn down on drop.
struct UdpStub {
    addr: SocketAddrV4,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UdpStub {
    fn start(port: u16, mut handler: impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static) -> Self {
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        let socket = UdpSocket::bind(addr).expect("bind loopback UDP stub");
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let thread = thread::spawn(move || {
            let mut buf = [0u8; 65535];
            while !stop_flag.load(Ordering::Relaxed) {
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if let Some(reply) = handler(&buf[..n]) {
                    let _ = socket.send_to(&reply, from);
                }
            }
        });

        Self { addr, stop, thread: Some(thread) }
    }
}

impl Drop for UdpStub {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// A loopback TCP stub server: accepts exactly one connection and answers each length-prefixed
/// request with the handler's length-prefixed reply.
struct TcpStub {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TcpStub {
    fn start(port: u16, mut handler: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> Self {
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        let listener = TcpListener::bind(addr).expect("bind loopback TCP stub");
        listener.set_nonblocking(true).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let thread = thread::spawn(move || {
            let mut stream = loop {
                if stop_flag.load(Ordering::Relaxed) {
                    return;
                }
                match listener.accept() {
                    Ok((s, _)) => break s,
                    Err(_) => {
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                }
            };
            stream.set_read_timeout(Some(Duration::from_millis(200))).ok();

            let mut pending = Vec::new();
            let mut chunk = [0u8; 4096];
            while !stop_flag.load(Ordering::Relaxed) {
                match stream.read(&mut chunk) {
                    Ok(0) => return,
                    Ok(n) => pending.extend_from_slice(&chunk[..n]),
                    Err(_) => continue,
                }

                while pending.len() >= 2 {
                    let len = u16::from_be_bytes([pending[0], pending[1]]) as usize;
                    if pending.len() < 2 + len {
                        break;
                    }
                    let msg = pending[2..2 + len].to_vec();
                    pending.drain(..2 + len);

                    let reply = handler(&msg);
                    let mut framed = (reply.len() as u16).to_be_bytes().to_vec();
                    framed.extend(reply);
                    let _ = stream.write_all(&framed);
                }
            }
        });

        Self { stop, thread: Some(thread) }
    }
}

impl Drop for TcpStub {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

#[test]
fn basic_a_lookup_returns_address() {
    init_logging();
    let port = alloc_port();
    let _stub = UdpStub::start(port, |req| {
        let id = request_id(req);
        let mut reply = reply_header(id, false, 0, 1, 0);
        reply.extend_from_slice(question_bytes(req));
        push_rr(&mut reply, "example.com.", TY_A, 300, &[93, 184, 216, 34]);
        Some(reply)
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let handle = resolver.submit("example.com.", Type::A, QueryFlags::empty(), ()).unwrap();
    let (_, answer, _) = resolver.wait(Some(handle)).unwrap();

    assert_eq!(answer.status, Status::Ok);
    match &answer.records[..] {
        [resolver::Record::A(addr)] => assert_eq!(*addr, Ipv4Addr::new(93, 184, 216, 34)),
        other => panic!("unexpected records {other:?}"),
    }
}

#[test]
fn cname_and_address_in_one_reply_resolve_without_a_second_round_trip() {
    init_logging();
    let port = alloc_port();
    let _stub = UdpStub::start(port, |req| {
        let id = request_id(req);
        let mut reply = reply_header(id, false, 0, 2, 0);
        reply.extend_from_slice(question_bytes(req));
        let mut cname_target = Vec::new();
        push_name(&mut cname_target, "canonical.example.com.");
        push_rr(&mut reply, "alias.example.com.", TY_CNAME, 300, &cname_target);
        push_rr(&mut reply, "canonical.example.com.", TY_A, 300, &[10, 0, 0, 1]);
        Some(reply)
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let handle = resolver.submit("alias.example.com.", Type::A, QueryFlags::empty(), ()).unwrap();
    let (_, answer, _) = resolver.wait(Some(handle)).unwrap();

    assert_eq!(answer.status, Status::Ok);
    assert_eq!(answer.cname.as_deref(), Some("canonical.example.com."));
    match &answer.records[..] {
        [resolver::Record::A(addr)] => assert_eq!(*addr, Ipv4Addr::new(10, 0, 0, 1)),
        other => panic!("unexpected records {other:?}"),
    }
}

#[test]
fn cname_only_answer_triggers_a_second_query_for_the_target() {
    init_logging();
    let port = alloc_port();
    let _stub = UdpStub::start(port, |req| {
        let id = request_id(req);

        if question_bytes(req).starts_with(&[5, b'a', b'l', b'i', b'a', b's']) {
            let mut reply = reply_header(id, false, 0, 1, 0);
            reply.extend_from_slice(question_bytes(req));
            let mut target = Vec::new();
            push_name(&mut target, "canonical.example.com.");
            push_rr(&mut reply, "alias.example.com.", TY_CNAME, 300, &target);
            return Some(reply);
        }

        let mut reply = reply_header(id, false, 0, 1, 0);
        reply.extend_from_slice(question_bytes(req));
        push_rr(&mut reply, "canonical.example.com.", TY_A, 300, &[10, 0, 0, 2]);
        Some(reply)
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let handle = resolver.submit("alias.example.com.", Type::A, QueryFlags::empty(), ()).unwrap();
    let (_, answer, _) = resolver.wait(Some(handle)).unwrap();

    assert_eq!(answer.status, Status::Ok);
    match &answer.records[..] {
        [resolver::Record::A(addr)] => assert_eq!(*addr, Ipv4Addr::new(10, 0, 0, 2)),
        other => panic!("unexpected records {other:?}"),
    }
}

#[test]
fn mx_cooked_answer_resolves_its_exchange_host_via_child_queries() {
    init_logging();
    let port = alloc_port();
    let _stub = UdpStub::start(port, |req| {
        let id = request_id(req);
        match question_qtype(req) {
            TY_MX => {
                let mut reply = reply_header(id, false, 0, 1, 0);
                reply.extend_from_slice(question_bytes(req));
                let mut rdata = 10u16.to_be_bytes().to_vec();
                push_name(&mut rdata, "mail.example.com.");
                push_rr(&mut reply, "example.com.", TY_MX, 300, &rdata);
                Some(reply)
            }
            TY_A => {
                let mut reply = reply_header(id, false, 0, 1, 0);
                reply.extend_from_slice(question_bytes(req));
                push_rr(&mut reply, "mail.example.com.", TY_A, 300, &[172, 16, 0, 9]);
                Some(reply)
            }
            TY_AAAA => {
                // No AAAA record for the exchange host; NODATA, the parent still completes.
                let mut reply = reply_header(id, false, 0, 0, 0);
                reply.extend_from_slice(question_bytes(req));
                Some(reply)
            }
            _ => None,
        }
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let handle = resolver.submit("example.com.", Type::Mx, QueryFlags::empty(), ()).unwrap();
    let (_, answer, _) = resolver.wait(Some(handle)).unwrap();

    assert_eq!(answer.status, Status::Ok);
    match &answer.records[..] {
        [resolver::Record::MxCooked { priority, host }] => {
            assert_eq!(*priority, 10);
            assert_eq!(host.name, "mail.example.com.");
            assert_eq!(host.addrs, vec![std::net::IpAddr::V4(Ipv4Addr::new(172, 16, 0, 9))]);
        }
        other => panic!("unexpected records {other:?}"),
    }
}

#[test]
fn truncated_udp_reply_falls_back_to_tcp() {
    init_logging();
    let port = alloc_port();

    let _udp = UdpStub::start(port, |req| {
        let id = request_id(req);
        let mut reply = reply_header(id, true, 0, 0, 0);
        reply.extend_from_slice(question_bytes(req));
        Some(reply)
    });

    let _tcp = TcpStub::start(port, |req| {
        let id = request_id(req);
        let mut reply = reply_header(id, false, 0, 1, 0);
        reply.extend_from_slice(question_bytes(req));
        push_rr(&mut reply, "big.example.com.", TY_A, 300, &[198, 51, 100, 7]);
        reply
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let handle = resolver.submit("big.example.com.", Type::A, QueryFlags::empty(), ()).unwrap();
    let (_, answer, _) = resolver.wait(Some(handle)).unwrap();

    assert_eq!(answer.status, Status::Ok);
    match &answer.records[..] {
        [resolver::Record::A(addr)] => assert_eq!(*addr, Ipv4Addr::new(198, 51, 100, 7)),
        other => panic!("unexpected records {other:?}"),
    }
}

#[test]
fn out_of_order_replies_complete_in_the_order_they_actually_finished() {
    init_logging();
    let port = alloc_port();

    // Answers the second query's name first, then the first query's name, simulating replies
    // arriving out of submission order.
    let _stub = UdpStub::start(port, |req| {
        let id = request_id(req);
        let question = question_bytes(req);
        let mut reply = reply_header(id, false, 0, 1, 0);
        reply.extend_from_slice(question);

        if question.starts_with(&[5, b's', b'l', b'o', b'w', b'0']) {
            thread::sleep(Duration::from_millis(60));
            push_rr(&mut reply, "slow0.example.com.", TY_A, 300, &[10, 0, 0, 10]);
        } else {
            push_rr(&mut reply, "fast1.example.com.", TY_A, 300, &[10, 0, 0, 11]);
        }
        Some(reply)
    });

    let config = Config::single_server_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
    let mut resolver = Resolver::<()>::init(config).unwrap();

    let first = resolver.submit("slow0.example.com.", Type::A, QueryFlags::empty(), ()).unwrap();
    let second = resolver.submit("fast1.example.com.", Type::A, QueryFlags::empty(), ()).unwrap();

    let (done_first, _, _) = resolver.wait(None).unwrap();
    let (done_second, _, _) = resolver.wait(None).unwrap();

    assert_eq!(done_first, second, "the faster reply should be collected first");
    assert_eq!(done_second, first);
}
