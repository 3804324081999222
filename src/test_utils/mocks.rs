use crate::process::HealthProbe;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Health probe that replays scripted answers, then repeats a fallback
#[derive(Debug)]
pub struct ScriptedProbe {
    answers: StdMutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn always(alive: bool) -> Self {
        Self::sequence(Vec::new(), alive)
    }

    pub fn sequence(answers: Vec<bool>, then: bool) -> Self {
        Self {
            answers: StdMutex::new(answers.into()),
            fallback: then,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn is_alive(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
