//! Deterministic [`Provider`] for tests.
//!
//! Completions and runs are consumed from FIFO scripts; every call is
//! recorded so tests can assert on what reached the provider and in which
//! order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use docchat_provider::{DeltaStream, Provider, ProviderError, RunEvent, RunEventStream, ThreadId};
use docchat_types::ChatMessage;

/// One scripted step of an upstream stream.
#[derive(Debug, Clone)]
pub enum Step<T> {
    /// Yield an item.
    Emit(T),
    /// Yield a provider error.
    Fail(String),
    /// Wait before the next step.
    Sleep(Duration),
}

impl Step<String> {
    pub fn texts(texts: &[&str]) -> Vec<Step<String>> {
        texts.iter().map(|t| Step::Emit((*t).to_owned())).collect()
    }
}

impl Step<RunEvent> {
    pub fn run_texts(texts: &[&str]) -> Vec<Step<RunEvent>> {
        texts.iter().map(|t| Step::Emit(RunEvent::text(*t))).collect()
    }
}

/// A call observed by [`ScriptedProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Completion(Vec<ChatMessage>),
    CreateThread,
    Append(ThreadId, ChatMessage),
    Run(ThreadId, String),
}

type Script<T> = Result<Vec<Step<T>>, String>;

#[derive(Default)]
struct State {
    completions: VecDeque<Script<String>>,
    runs: VecDeque<Script<RunEvent>>,
    thread_failure: Option<String>,
    append_failure_at: Option<usize>,
    appends: usize,
    threads: usize,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct ScriptedProvider {
    state: Mutex<State>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the stream returned by the next completion call.
    pub fn with_completion(self, steps: Vec<Step<String>>) -> Self {
        self.lock().completions.push_back(Ok(steps));
        self
    }

    /// Make the next completion call fail before streaming.
    pub fn with_failing_completion(self, message: &str) -> Self {
        self.lock().completions.push_back(Err(message.to_owned()));
        self
    }

    /// Queue the stream returned by the next run.
    pub fn with_run(self, steps: Vec<Step<RunEvent>>) -> Self {
        self.lock().runs.push_back(Ok(steps));
        self
    }

    /// Make the next run fail before streaming.
    pub fn with_failing_run(self, message: &str) -> Self {
        self.lock().runs.push_back(Err(message.to_owned()));
        self
    }

    pub fn failing_thread_creation(self, message: &str) -> Self {
        self.lock().thread_failure = Some(message.to_owned());
        self
    }

    /// Fail the append with zero-based index `index`.
    pub fn failing_append_at(self, index: usize) -> Self {
        self.lock().append_failure_at = Some(index);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn completion_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Completion(messages) => Some(messages.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn scripted_stream<T: Send + 'static>(
    steps: Vec<Step<T>>,
) -> stream::BoxStream<'static, Result<T, ProviderError>> {
    stream::unfold(VecDeque::from(steps), |mut steps| async move {
        loop {
            match steps.pop_front()? {
                Step::Emit(item) => return Some((Ok(item), steps)),
                Step::Fail(message) => return Some((Err(ProviderError::Stream(message)), steps)),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<DeltaStream, ProviderError> {
        let script = {
            let mut state = self.lock();
            state.calls.push(Call::Completion(messages.to_vec()));
            state.completions.pop_front()
        };
        match script {
            Some(Ok(steps)) => Ok(scripted_stream(steps)),
            Some(Err(message)) => Err(ProviderError::Api {
                status: 500,
                message,
            }),
            None => Err(ProviderError::Stream("no scripted completion left".into())),
        }
    }

    async fn create_thread(&self) -> Result<ThreadId, ProviderError> {
        let mut state = self.lock();
        state.calls.push(Call::CreateThread);
        if let Some(message) = state.thread_failure.clone() {
            return Err(ProviderError::Api {
                status: 500,
                message,
            });
        }
        state.threads += 1;
        Ok(ThreadId(format!("thread_{}", state.threads)))
    }

    async fn append_message(
        &self,
        thread_id: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::Append(thread_id.clone(), message.clone()));
        let index = state.appends;
        state.appends += 1;
        if state.append_failure_at == Some(index) {
            return Err(ProviderError::Api {
                status: 400,
                message: format!("append {index} rejected"),
            });
        }
        Ok(())
    }

    async fn run_thread_streaming(
        &self,
        thread_id: &ThreadId,
        assistant_id: &str,
    ) -> Result<RunEventStream, ProviderError> {
        let script = {
            let mut state = self.lock();
            state
                .calls
                .push(Call::Run(thread_id.clone(), assistant_id.to_owned()));
            state.runs.pop_front()
        };
        match script {
            Some(Ok(steps)) => Ok(scripted_stream(steps)),
            Some(Err(message)) => Err(ProviderError::Api {
                status: 500,
                message,
            }),
            None => Err(ProviderError::Stream("no scripted run left".into())),
        }
    }
}
