use miniloop::EventLoop;

use std::cell::Cell;
use std::rc::Rc;

fn pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe() failed");
    (fds[0], fds[1])
}

fn close(fd: i32) {
    unsafe {
        libc::close(fd);
    }
}

#[test]
fn reader_callback_fires_when_the_pipe_has_data() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    event_loop.add_reader(rfd, move || flag.set(true)).unwrap();

    let buf = [1u8; 1];
    let wrote = unsafe { libc::write(wfd, buf.as_ptr() as *const _, 1) };
    assert_eq!(wrote, 1);

    event_loop.run_once().unwrap();
    assert!(fired.get());

    close(rfd);
    close(wfd);
}

#[test]
fn writer_callback_fires_on_a_writable_pipe() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    event_loop.add_writer(wfd, move || flag.set(true)).unwrap();

    event_loop.run_once().unwrap();
    assert!(fired.get());

    close(rfd);
    close(wfd);
}

#[test]
fn readiness_delivery_is_one_shot() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    event_loop
        .add_reader(rfd, move || counter.set(counter.get() + 1))
        .unwrap();

    let buf = [1u8; 1];
    unsafe { libc::write(wfd, buf.as_ptr() as *const _, 1) };

    // The descriptor stays readable (the byte is never drained), but the
    // consumed handle must not re-fire.
    event_loop.run_once().unwrap();
    event_loop.run_once().unwrap();
    assert_eq!(count.get(), 1);

    close(rfd);
    close(wfd);
}

#[test]
fn removed_interest_never_fires() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    event_loop.add_reader(rfd, move || flag.set(true)).unwrap();
    event_loop.remove_reader(rfd);

    let buf = [1u8; 1];
    unsafe { libc::write(wfd, buf.as_ptr() as *const _, 1) };

    // Nothing is registered any more, so the cycle is a no-op.
    event_loop.run_once().unwrap();
    assert!(!fired.get());

    close(rfd);
    close(wfd);
}

#[test]
fn same_direction_registration_overwrites() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let winner = Rc::new(Cell::new(0));
    let first = winner.clone();
    let second = winner.clone();

    event_loop.add_reader(rfd, move || first.set(1)).unwrap();
    event_loop.add_reader(rfd, move || second.set(2)).unwrap();

    let buf = [1u8; 1];
    unsafe { libc::write(wfd, buf.as_ptr() as *const _, 1) };

    event_loop.run_once().unwrap();
    assert_eq!(winner.get(), 2);

    close(rfd);
    close(wfd);
}

#[test]
fn removing_one_direction_drops_the_whole_entry() {
    let event_loop = EventLoop::new().unwrap();
    let (rfd, wfd) = pipe();

    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    event_loop.add_writer(wfd, move || flag.set(true)).unwrap();

    // The poller treats a descriptor's registration as one atomic entry.
    event_loop.remove_reader(wfd);

    event_loop.run_once().unwrap();
    assert!(!fired.get());

    close(rfd);
    close(wfd);
}
