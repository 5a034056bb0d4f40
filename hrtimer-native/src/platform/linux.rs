use {
    super::TimerPrimitive,
    crate::{
        completion::Completion,
        error::{OsErrorClass, Result, TimerError},
        options::TimerOptions,
        spec::TimerSpec,
        symbol::{SymbolLookup, bind_any},
        wait::{Timeout, WaitOutcome},
    },
    std::{
        io,
        os::fd::RawFd,
        ptr,
        sync::Arc,
        time::{Duration, Instant},
    },
    tracing::{debug, trace},
};

const LIBC: &[&str] = &["libc.so.6", "libc.so"];

type TimerfdCreate = unsafe extern "C" fn(libc::c_int, libc::c_int) -> libc::c_int;
type TimerfdSettime = unsafe extern "C" fn(libc::c_int, libc::c_int, *const libc::itimerspec, *mut libc::itimerspec) -> libc::c_int;
type TimerfdGettime = unsafe extern "C" fn(libc::c_int, *mut libc::itimerspec) -> libc::c_int;

pub type Native = TimerFd;

/// Timer backed by a `timerfd` descriptor on `CLOCK_MONOTONIC`.
///
/// Firings are delivered by a blocking read of the descriptor's expiration
/// count. The count keeps accumulating while nobody waits, so a late waiter
/// still learns how many periods went by.
#[derive(Debug, Clone, Copy)]
pub struct TimerFd {
    create: TimerfdCreate,
    settime: TimerfdSettime,
    gettime: TimerfdGettime,
}

impl TimerFd {
    /// Resolve the `timerfd_*` entry points from the C library
    pub fn bind(lookup: &impl SymbolLookup) -> Result<Self> {
        // SAFETY: the aliases above match the glibc/musl prototypes
        unsafe {
            Ok(Self {
                create: bind_any(lookup, LIBC, "timerfd_create")?,
                settime: bind_any(lookup, LIBC, "timerfd_settime")?,
                gettime: bind_any(lookup, LIBC, "timerfd_gettime")?,
            })
        }
    }

    fn settime(&self, fd: RawFd, spec: &TimerSpec) -> Result<()> {
        let new_value = itimerspec(spec)?;
        if unsafe { (self.settime)(fd, 0, &new_value, ptr::null_mut()) } == -1 {
            return Err(TimerError::last_os("timerfd_settime"));
        }
        Ok(())
    }

    /// Read the pending expiration count, `None` if nothing is pending yet
    fn read_expirations(fd: RawFd) -> Result<Option<u64>, io::Error> {
        let mut buffer = [0u8; 8];
        let read = unsafe { libc::read(fd, buffer.as_mut_ptr().cast(), buffer.len()) };

        match read {
            8 => Ok(Some(u64::from_ne_bytes(buffer))),
            -1 => {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EAGAIN) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
            short => Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("short timerfd read of {short} bytes"))),
        }
    }
}

impl TimerPrimitive for TimerFd {
    type Raw = RawFd;

    fn create(&self, options: &TimerOptions) -> Result<RawFd> {
        if !options.clock.is_supported() {
            return Err(TimerError::UnsupportedClock(options.clock.as_raw()));
        }

        let fd = unsafe { (self.create)(libc::CLOCK_MONOTONIC, libc::TFD_CLOEXEC | libc::TFD_NONBLOCK) };
        if fd == -1 {
            return Err(TimerError::last_os("timerfd_create"));
        }

        debug!(fd, "created timerfd");
        Ok(fd)
    }

    fn arm(&self, fd: RawFd, spec: &TimerSpec, _options: &TimerOptions, _completion: &Arc<Completion>) -> Result<()> {
        self.settime(fd, spec)?;
        debug!(fd, ?spec, "armed timerfd");
        Ok(())
    }

    fn wait(&self, fd: RawFd, timeout: Timeout, _alertable: bool, completion: &Completion) -> Result<WaitOutcome> {
        let started = Instant::now();

        loop {
            let remaining = poll_timeout(timeout.remaining_since(started));
            let timeout_ptr = remaining.as_ref().map_or(ptr::null(), |ts| ts as *const libc::timespec);

            let mut pollfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::ppoll(&mut pollfd, 1, timeout_ptr, ptr::null()) };

            if ready == -1 {
                let err = io::Error::last_os_error();
                return match err.raw_os_error() {
                    Some(libc::EINTR) => Ok(WaitOutcome::Interrupted),
                    code => Err(TimerError::WaitFailed { code: code.unwrap_or(-1) }),
                };
            }
            if ready == 0 {
                trace!(fd, "timerfd wait timed out");
                return Ok(WaitOutcome::TimedOut);
            }
            if pollfd.revents & libc::POLLNVAL != 0 {
                return Err(TimerError::WaitFailed { code: libc::EBADF });
            }

            match Self::read_expirations(fd) {
                Ok(Some(expirations)) => {
                    trace!(fd, expirations, "timerfd fired");
                    completion.fire(expirations);
                    return Ok(WaitOutcome::Signaled);
                }
                // Re-armed between poll and read, the pending count was dropped
                Ok(None) => continue,
                Err(err) if err.raw_os_error() == Some(libc::EINTR) => return Ok(WaitOutcome::Interrupted),
                Err(err) => {
                    return Err(match err.raw_os_error() {
                        Some(code) => TimerError::WaitFailed { code },
                        None => TimerError::Os { operation: "read", source: err },
                    });
                }
            }
        }
    }

    fn cancel(&self, fd: RawFd) -> Result<()> {
        self.settime(fd, &TimerSpec::disarmed())?;
        debug!(fd, "canceled timerfd");
        Ok(())
    }

    fn close(&self, fd: RawFd) -> Result<()> {
        if unsafe { libc::close(fd) } == -1 {
            return Err(TimerError::last_os("close"));
        }
        debug!(fd, "closed timerfd");
        Ok(())
    }

    fn query(&self, fd: RawFd) -> Result<Option<TimerSpec>> {
        let mut current = itimerspec(&TimerSpec::disarmed())?;
        if unsafe { (self.gettime)(fd, &mut current) } == -1 {
            return Err(TimerError::last_os("timerfd_gettime"));
        }
        Ok(Some(TimerSpec::new(duration(&current.it_value), duration(&current.it_interval))))
    }
}

pub(crate) fn classify_os(code: i32) -> OsErrorClass {
    match code {
        libc::ENOMEM | libc::EMFILE | libc::ENFILE => OsErrorClass::Exhausted,
        libc::EPERM | libc::EACCES => OsErrorClass::Denied,
        libc::EINVAL => OsErrorClass::Invalid,
        _ => OsErrorClass::Other,
    }
}

fn timespec(duration: Duration) -> Result<libc::timespec> {
    let tv_sec = libc::time_t::try_from(duration.as_secs())
        .map_err(|_| TimerError::invalid(format!("{duration:?} does not fit in a timespec")))?;
    Ok(libc::timespec {
        tv_sec,
        tv_nsec: libc::c_long::from(duration.subsec_nanos() as i32),
    })
}

/// `ppoll` bound for `timeout`; a bound past what a `timespec` holds waits forever
fn poll_timeout(timeout: Timeout) -> Option<libc::timespec> {
    timeout.as_duration().and_then(|duration| timespec(duration).ok())
}

fn itimerspec(spec: &TimerSpec) -> Result<libc::itimerspec> {
    Ok(libc::itimerspec {
        it_interval: timespec(spec.period)?,
        it_value: timespec(spec.initial_delay)?,
    })
}

fn duration(ts: &libc::timespec) -> Duration {
    Duration::new(ts.tv_sec.max(0) as u64, ts.tv_nsec.clamp(0, 999_999_999) as u32)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{options::ClockKind, symbol::SystemLoader},
        std::thread,
    };

    fn timerfd() -> (TimerFd, RawFd) {
        let primitive = TimerFd::bind(&SystemLoader).unwrap();
        let fd = primitive.create(&TimerOptions::default()).unwrap();
        (primitive, fd)
    }

    #[test]
    fn test_unsupported_clock_is_rejected() {
        let primitive = TimerFd::bind(&SystemLoader).unwrap();
        let err = primitive.create(&TimerOptions::default().with_clock(ClockKind::Other(0))).unwrap_err();
        assert!(matches!(err, TimerError::UnsupportedClock(0)));
    }

    #[test]
    fn test_one_shot_fires_once() {
        let (primitive, fd) = timerfd();
        let completion = Completion::new();
        let start = Instant::now();

        primitive.arm(fd, &TimerSpec::one_shot(Duration::from_millis(50)), &TimerOptions::default(), &completion).unwrap();
        let outcome = primitive.wait(fd, Timeout::Infinite, false, &completion).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Signaled);
        assert_eq!(completion.total(), 1);
        assert!(elapsed >= Duration::from_millis(45));
        assert!(elapsed < Duration::from_millis(200));

        // nothing left to read
        let outcome = primitive.wait(fd, Timeout::After(Duration::from_millis(30)), false, &completion).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        primitive.close(fd).unwrap();
    }

    #[test]
    fn test_zero_initial_delay_disarms() {
        let (primitive, fd) = timerfd();
        let completion = Completion::new();

        primitive.arm(fd, &TimerSpec::periodic(Duration::ZERO, Duration::from_millis(10)), &TimerOptions::default(), &completion).unwrap();
        let outcome = primitive.wait(fd, Timeout::After(Duration::from_millis(50)), false, &completion).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);

        let current = primitive.query(fd).unwrap().unwrap();
        assert!(current.is_disarm());
        primitive.close(fd).unwrap();
    }

    #[test]
    fn test_expirations_accumulate_while_not_waiting() {
        let (primitive, fd) = timerfd();
        let completion = Completion::new();

        primitive.arm(fd, &TimerSpec::periodic(Duration::from_millis(5), Duration::from_millis(5)), &TimerOptions::default(), &completion).unwrap();
        thread::sleep(Duration::from_millis(60));

        let outcome = primitive.wait(fd, Timeout::Infinite, false, &completion).unwrap();
        assert_eq!(outcome, WaitOutcome::Signaled);
        assert!(completion.total() >= 5, "only {} expirations", completion.total());
        primitive.close(fd).unwrap();
    }

    #[test]
    fn test_query_reports_setting() {
        let (primitive, fd) = timerfd();
        let completion = Completion::new();

        primitive.arm(fd, &TimerSpec::periodic(Duration::from_secs(1), Duration::from_millis(250)), &TimerOptions::default(), &completion).unwrap();
        let current = primitive.query(fd).unwrap().unwrap();
        assert!(current.initial_delay <= Duration::from_secs(1));
        assert!(current.initial_delay > Duration::from_millis(500));
        assert_eq!(current.period, Duration::from_millis(250));
        primitive.close(fd).unwrap();
    }

    #[test]
    fn test_cancel_drops_pending_expiration() {
        let (primitive, fd) = timerfd();
        let completion = Completion::new();

        primitive.arm(fd, &TimerSpec::one_shot(Duration::from_millis(5)), &TimerOptions::default(), &completion).unwrap();
        thread::sleep(Duration::from_millis(20));
        primitive.cancel(fd).unwrap();
        primitive.cancel(fd).unwrap();

        let outcome = primitive.wait(fd, Timeout::IMMEDIATE, false, &completion).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(completion.total(), 0);
        primitive.close(fd).unwrap();
    }

    #[test]
    fn test_timespec_conversion() {
        let ts = timespec(Duration::new(3, 250_000_000)).unwrap();
        assert_eq!(ts.tv_sec, 3);
        assert_eq!(ts.tv_nsec, 250_000_000);
        assert_eq!(duration(&ts), Duration::new(3, 250_000_000));
        assert!(timespec(Duration::MAX).is_err());
    }

    #[test]
    fn test_oversized_timeout_waits_without_bound() {
        assert!(poll_timeout(Timeout::After(Duration::MAX)).is_none());
        assert!(poll_timeout(Timeout::Infinite).is_none());
        assert_eq!(poll_timeout(Timeout::After(Duration::from_millis(1500))).unwrap().tv_sec, 1);

        let (primitive, fd) = timerfd();
        let completion = Completion::new();
        primitive.arm(fd, &TimerSpec::one_shot(Duration::from_millis(20)), &TimerOptions::default(), &completion).unwrap();

        let outcome = primitive.wait(fd, Timeout::from(Duration::MAX), false, &completion).unwrap();
        assert_eq!(outcome, WaitOutcome::Signaled);
        assert_eq!(completion.total(), 1);
        primitive.close(fd).unwrap();
    }
}
