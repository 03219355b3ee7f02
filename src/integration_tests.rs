//! End-to-end scenarios from spec.md §8 "End-to-end scenarios", run against
//! real sockets and a real (test-only) epoll poller. See
//! `src/test_support.rs` for the thread-per-task stand-in this uses in
//! place of a real coroutine scheduler.

use std::mem;
use std::net::TcpListener as StdTcpListener;
use std::os::unix::io::RawFd;
use std::sync::mpsc;

use crate::interpose::{accept, close, connect, read, socket, write};
use crate::scheduler::Task;
use crate::test_support::bind_hooked_thread;
use crate::{context::Context, hook};

unsafe fn loopback_addr(port: u16) -> (libc::sockaddr_in, libc::socklen_t) {
    let mut addr: libc::sockaddr_in = mem::zeroed();
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = port.to_be();
    addr.sin_addr.s_addr = u32::from_ne_bytes([127, 0, 0, 1]);
    (addr, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
}

unsafe fn local_port(fd: RawFd) -> u16 {
    let mut addr: libc::sockaddr_in = mem::zeroed();
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    let ret = libc::getsockname(fd, &mut addr as *mut _ as *mut libc::sockaddr, &mut len);
    assert_eq!(ret, 0, "getsockname failed: {:?}", std::io::Error::last_os_error());
    u16::from_be(addr.sin_port)
}

/// Scenario 1: echo server. Task A listens, accepts one connection, reads
/// "ping" and echoes it back. Task B connects, sends "ping", reads it
/// back. Both tasks suspend exactly once (A in accept, B in read), and
/// after teardown each thread's registry is empty.
#[test]
fn echo_server_round_trip() {
    let (port_tx, port_rx) = mpsc::channel();

    let acceptor = std::thread::spawn(move || {
        bind_hooked_thread();

        let listen_fd = unsafe { socket::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        assert!(listen_fd >= 0);
        unsafe {
            let (addr, len) = loopback_addr(0);
            let ret = libc::bind(listen_fd, &addr as *const _ as *const libc::sockaddr, len);
            assert_eq!(ret, 0, "bind failed: {:?}", std::io::Error::last_os_error());
        }
        unsafe { assert_eq!(crate::interpose::socket::listen(listen_fd, 16), 0) };

        let port = unsafe { local_port(listen_fd) };
        port_tx.send(port).unwrap();

        let conn_fd = unsafe { accept::accept(listen_fd, std::ptr::null_mut(), std::ptr::null_mut()) };
        assert!(conn_fd >= 0, "accept failed: {:?}", std::io::Error::last_os_error());

        let mut buf = [0u8; 4];
        let n = unsafe { read::read(conn_fd, buf.as_mut_ptr() as *mut libc::c_void, 4) };
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ping");

        let written = unsafe { write::write(conn_fd, buf.as_ptr() as *const libc::c_void, 4) };
        assert_eq!(written, 4);

        unsafe {
            close::close(conn_fd);
            close::close(listen_fd);
        }
        assert!(Context::get().registry.is_empty(), "acceptor thread leaked registry entries");
    });

    let connector = std::thread::spawn(move || {
        bind_hooked_thread();
        let port = port_rx.recv().unwrap();

        let fd = unsafe { socket::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        assert!(fd >= 0);
        let ret = unsafe {
            let (addr, len) = loopback_addr(port);
            connect::connect(fd, &addr as *const _ as *const libc::sockaddr, len)
        };
        assert_eq!(ret, 0, "connect failed: {:?}", std::io::Error::last_os_error());

        let written = unsafe { write::write(fd, b"ping".as_ptr() as *const libc::c_void, 4) };
        assert_eq!(written, 4);

        let mut buf = [0u8; 4];
        let n = unsafe { read::read(fd, buf.as_mut_ptr() as *mut libc::c_void, 4) };
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ping");

        unsafe { close::close(fd) };
        assert!(Context::get().registry.is_empty(), "connector thread leaked registry entries");
    });

    acceptor.join().unwrap();
    connector.join().unwrap();
}

/// Scenario 2: connect refused. Connecting to a port with no listener
/// returns -1/ECONNREFUSED and leaves no task bound.
#[test]
fn connect_refused_reports_econnrefused() {
    bind_hooked_thread();

    // Reserve a port, then drop the listener so nothing is bound there.
    let probe = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let fd = unsafe { socket::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0);
    let ret = unsafe {
        let (addr, len) = loopback_addr(port);
        connect::connect(fd, &addr as *const _ as *const libc::sockaddr, len)
    };
    assert_eq!(ret, -1);
    assert_eq!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(libc::ECONNREFUSED)
    );

    unsafe { close::close(fd) };
}

/// Scenario 6: hook disabled passthrough. With the hook flag cleared,
/// `read` on a non-blocking socket with no data returns -1/EAGAIN without
/// suspending.
#[test]
fn hook_disabled_forwards_to_raw_eagain() {
    let task = bind_hooked_thread();

    let fd = unsafe { socket::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0);
    // UDP-less TCP socket with no connection: reading is meaningless for
    // a bare unconnected TCP socket, so use a connected pair via socketpair
    // to get a realistic "no data yet" EAGAIN.
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(ret, 0);
    unsafe {
        let flags = libc::fcntl(fds[0], libc::F_GETFL);
        libc::fcntl(fds[0], libc::F_SETFL, flags | libc::O_NONBLOCK);
    }

    task.set_hook_enabled(false);
    assert!(!hook::hooked_here());

    let mut buf = [0u8; 4];
    let n = unsafe { read::read(fds[0], buf.as_mut_ptr() as *mut libc::c_void, 4) };
    assert_eq!(n, -1);
    assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EAGAIN));

    unsafe {
        libc::close(fds[0]);
        libc::close(fds[1]);
        close::close(fd);
    }
}
