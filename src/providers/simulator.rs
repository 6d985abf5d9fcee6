//! Offline response simulator.
//!
//! Third line in the fallback chain: when both remote providers are down the
//! service still answers with a canned Serbian response picked by a rough
//! category match, instead of failing the request.

use super::{ChatProvider, ChatRequest, ProviderKind, ProviderReply};
use crate::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

const GREETING_RESPONSES: &[&str] = &[
    "Zdravo! Kako mogu da ti pomognem danas sa učenjem programiranja?",
    "Pozdrav! Spreman sam da ti pomognem da savladaš Python!",
    "Hej! Drago mi je što si tu. Šta te zanima danas?",
];

const PYTHON_RESPONSES: &[&str] = &[
    "Python je odličan izbor za početnike! Hajde da učimo korak po korak.",
    "Python sintaksa je vrlo čitljiva. Pokazaću ti na primerima.",
    "Divno pitanje o Python-u! Evo objašnjenja...",
];

const DEFAULT_RESPONSES: &[&str] = &[
    "Interesantno pitanje! Hajde da ga istražimo zajedno.",
    "Dobro pitanje! Evo kako bih ja to objasnio...",
    "Hmm, hajde da razmislimo o tome korak po korak.",
];

const GREETING_WORDS: &[&str] = &["zdravo", "pozdrav", "hej", "ćao", "cao"];

#[derive(Default)]
pub struct SimulatorProvider;

impl SimulatorProvider {
    pub fn new() -> Self {
        Self
    }

    fn category_responses(prompt: &str) -> &'static [&'static str] {
        let lower = prompt.to_lowercase();
        if GREETING_WORDS.iter().any(|w| lower.contains(w)) {
            GREETING_RESPONSES
        } else if lower.contains("python") || lower.contains("programir") {
            PYTHON_RESPONSES
        } else {
            DEFAULT_RESPONSES
        }
    }
}

#[async_trait]
impl ChatProvider for SimulatorProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Simulator
    }

    fn model(&self) -> &str {
        "simulacija"
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ProviderReply> {
        let responses = Self::category_responses(request.last_user_content());
        let content = responses
            .choose(&mut rand::thread_rng())
            .expect("response pools are non-empty")
            .to_string();

        Ok(ProviderReply {
            content,
            usage: None,
        })
    }
}
