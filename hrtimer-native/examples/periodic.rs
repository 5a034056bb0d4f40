use {
    hrtimer_native::{ClockKind, Timeout, Timer, WaitOutcome},
    std::time::Instant,
    tracing_subscriber::EnvFilter,
};

fn main() -> hrtimer_native::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut timer = Timer::create(ClockKind::Monotonic)?;
    timer.on_fire(|expirations| println!("callback: {expirations} expiration(s)"));

    println!("Arming timer: first firing after 1.0s, then every 0.5s");
    let start = Instant::now();
    timer.set_time(1.0, 0.5)?;

    for i in 1..=6 {
        let outcome = timer.wait(Timeout::Infinite)?;
        println!("Wait {} -> {:?} at {:.3}s", i, outcome, start.elapsed().as_secs_f64());
    }

    timer.cancel()?;
    let outcome = timer.wait(Timeout::from_secs_f64(0.1)?)?;
    assert_eq!(outcome, WaitOutcome::TimedOut);
    println!("After cancel -> {:?}", outcome);

    timer.close();
    Ok(())
}
