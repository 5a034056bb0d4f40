//! Scripted primitive for exercising timer logic without the OS

use {
    super::TimerPrimitive,
    crate::{
        completion::Completion,
        error::{Result, TimerError},
        options::TimerOptions,
        spec::TimerSpec,
        wait::{Timeout, WaitOutcome},
    },
    std::{
        collections::VecDeque,
        sync::{Arc, Mutex, MutexGuard},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create(u32),
    Arm(u32, TimerSpec),
    Wait(u32, Timeout, bool),
    RunPending,
    Cancel(u32),
    Close(u32),
}

/// What the next `wait` does
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Return(WaitOutcome),
    /// Fire the completion `n` times, as a descriptor read or an APC would
    Fire(u64, WaitOutcome),
    /// Leave `n` firings queued until pending completions are run
    Queue(u64, WaitOutcome),
    Fail(u32),
}

#[derive(Debug, Default)]
struct State {
    next: u32,
    calls: Vec<Call>,
    steps: VecDeque<Step>,
    query: Option<TimerSpec>,
    queued: u64,
}

#[derive(Debug, Default)]
pub(crate) struct MockPrimitive {
    state: Mutex<State>,
}

impl MockPrimitive {
    pub(crate) fn leaked() -> &'static Self {
        Box::leak(Box::default())
    }

    pub(crate) fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.state().steps.extend(steps);
    }

    pub(crate) fn report(&self, query: TimerSpec) {
        self.state().query = Some(query);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl TimerPrimitive for MockPrimitive {
    type Raw = u32;

    fn create(&self, options: &TimerOptions) -> Result<u32> {
        if !options.clock.is_supported() {
            return Err(TimerError::UnsupportedClock(options.clock.as_raw()));
        }
        let mut state = self.state();
        state.next += 1;
        let raw = state.next;
        state.calls.push(Call::Create(raw));
        Ok(raw)
    }

    fn arm(&self, raw: u32, spec: &TimerSpec, _options: &TimerOptions, _completion: &Arc<Completion>) -> Result<()> {
        self.state().calls.push(Call::Arm(raw, *spec));
        Ok(())
    }

    fn wait(&self, raw: u32, timeout: Timeout, alertable: bool, completion: &Completion) -> Result<WaitOutcome> {
        let step = {
            let mut state = self.state();
            state.calls.push(Call::Wait(raw, timeout, alertable));
            state.steps.pop_front()
        };

        match step.unwrap_or(Step::Return(WaitOutcome::TimedOut)) {
            Step::Return(outcome) => Ok(outcome),
            Step::Queue(expirations, outcome) => {
                self.state().queued += expirations;
                Ok(outcome)
            }
            Step::Fire(expirations, outcome) => {
                completion.fire(expirations);
                Ok(outcome)
            }
            Step::Fail(code) => Err(TimerError::UnexpectedWaitResult(code)),
        }
    }

    fn run_pending_completions(&self, completion: &Completion) -> Result<()> {
        let queued = {
            let mut state = self.state();
            state.calls.push(Call::RunPending);
            std::mem::take(&mut state.queued)
        };
        if queued > 0 {
            completion.fire(queued);
        }
        Ok(())
    }

    fn cancel(&self, raw: u32) -> Result<()> {
        self.state().calls.push(Call::Cancel(raw));
        Ok(())
    }

    fn close(&self, raw: u32) -> Result<()> {
        self.state().calls.push(Call::Close(raw));
        Ok(())
    }

    fn query(&self, _raw: u32) -> Result<Option<TimerSpec>> {
        Ok(self.state().query)
    }
}
