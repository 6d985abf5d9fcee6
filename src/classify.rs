//! Request classification.
//!
//! Incoming questions are sorted into a [`RequestType`] by keyword scoring so
//! the router can pick a provider and the service can tune generation
//! parameters per type. The keyword lists are Serbian-first with English
//! equivalents, matching the audience the assistant tutors.

use crate::providers::ProviderKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of question the service can handle.
///
/// Declaration order doubles as tie-break priority during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "code")]
    CodeGeneration,
    #[serde(rename = "debug")]
    CodeDebug,
    #[serde(rename = "explain")]
    ConceptExplain,
    #[serde(rename = "review")]
    CodeReview,
    #[serde(rename = "translate")]
    Translation,
    #[serde(rename = "optimize")]
    Optimization,
}

impl RequestType {
    pub const ALL: [RequestType; 7] = [
        RequestType::Chat,
        RequestType::CodeGeneration,
        RequestType::CodeDebug,
        RequestType::ConceptExplain,
        RequestType::CodeReview,
        RequestType::Translation,
        RequestType::Optimization,
    ];

    pub fn parse(s: &str) -> Option<RequestType> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Chat => "chat",
            RequestType::CodeGeneration => "code",
            RequestType::CodeDebug => "debug",
            RequestType::ConceptExplain => "explain",
            RequestType::CodeReview => "review",
            RequestType::Translation => "translate",
            RequestType::Optimization => "optimize",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RequestType::Chat => "Opšta konverzacija i jednostavna pitanja",
            RequestType::CodeGeneration => "Generisanje novog koda prema specifikaciji",
            RequestType::CodeDebug => "Pomoć pri pronalaženju i rešavanju grešaka",
            RequestType::ConceptExplain => "Detaljno objašnjenje programskih koncepata",
            RequestType::CodeReview => "Analiza kvaliteta postojećeg koda",
            RequestType::Translation => "Prevođenje koda između programskih jezika",
            RequestType::Optimization => "Poboljšanje performansi postojećeg koda",
        }
    }

    /// Provider this request type works best on.
    pub fn preferred_provider(&self) -> ProviderKind {
        match self {
            RequestType::Chat | RequestType::ConceptExplain => ProviderKind::Gemini,
            _ => ProviderKind::OpenAi,
        }
    }

    /// Generation parameters tuned per request type.
    pub fn tuned_params(&self) -> TunedParams {
        match self {
            RequestType::CodeGeneration => TunedParams {
                temperature: 0.3,
                max_tokens: 300,
            },
            RequestType::Chat => TunedParams {
                temperature: 0.8,
                max_tokens: 100,
            },
            RequestType::CodeDebug => TunedParams {
                temperature: 0.2,
                max_tokens: 250,
            },
            RequestType::ConceptExplain => TunedParams {
                temperature: 0.6,
                max_tokens: 400,
            },
            _ => TunedParams {
                temperature: 0.7,
                max_tokens: 150,
            },
        }
    }
}

/// Generation parameters applied to a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunedParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// User-supplied overrides merged on top of [`RequestType::tuned_params`].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct TuningOverrides {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl TunedParams {
    pub fn apply(mut self, overrides: &TuningOverrides) -> Self {
        if let Some(t) = overrides.temperature {
            self.temperature = t;
        }
        if let Some(m) = overrides.max_tokens {
            self.max_tokens = m;
        }
        self
    }
}

/// Extra context carried alongside the question.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestContext {
    pub programming_language: Option<String>,
    pub error_message: Option<String>,
    pub code_snippet: Option<String>,
    /// "beginner", "intermediate" (default) or "advanced".
    pub user_level: Option<String>,
}

impl RequestContext {
    pub fn has_code_context(&self) -> bool {
        self.code_snippet.is_some() || self.error_message.is_some()
    }
}

/// A classified request, ready for routing and execution.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub content: String,
    pub request_type: RequestType,
    pub context: RequestContext,
    pub preferences: TuningOverrides,
}

impl StructuredRequest {
    pub fn new(content: impl Into<String>, request_type: RequestType) -> Self {
        Self {
            content: content.into(),
            request_type,
            context: RequestContext::default(),
            preferences: TuningOverrides::default(),
        }
    }

    /// Final generation parameters: tuned defaults overlaid with preferences.
    pub fn effective_params(&self) -> TunedParams {
        self.request_type.tuned_params().apply(&self.preferences)
    }

    /// Prompt enriched with the extracted context.
    pub fn enhanced_prompt(&self) -> String {
        let mut prompt = self.content.clone();

        if let Some(ref lang) = self.context.programming_language {
            prompt = format!("[Jezik: {}] {}", lang, prompt);
        }
        if let Some(ref err) = self.context.error_message {
            prompt.push_str(&format!("\n\nGreška: {}", err));
        }
        if let Some(ref code) = self.context.code_snippet {
            prompt.push_str(&format!("\n\nKod:\n```\n{}\n```", code));
        }
        if self.context.user_level.as_deref() == Some("beginner") {
            prompt.push_str("\n\n(Napomena: Korisnik je početnik, koristi jednostavne termine)");
        }

        prompt
    }
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[\w]*\n(.*?)```").expect("valid code fence pattern"));

static ERROR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^.*?((?:\w+)?(?:Error|Exception|Traceback)[:\s].*)$")
        .expect("valid error line pattern")
});

const KNOWN_LANGUAGES: &[&str] = &["python", "javascript", "java", "c++", "c#", "go", "rust"];

fn keywords_for(request_type: RequestType) -> &'static [&'static str] {
    match request_type {
        RequestType::Chat => &[],
        RequestType::CodeGeneration => &[
            "napiši",
            "generiši",
            "kreiraj",
            "kod za",
            "funkcij",
            "implementiraj",
            "primer koda",
            "write",
            "create",
            "generate",
        ],
        RequestType::CodeDebug => &[
            "greška", "error", "ne radi", "problem", "bug", "debug", "zašto", "exception",
            "popravi", "fix",
        ],
        RequestType::ConceptExplain => &[
            "objasni",
            "šta je",
            "kako funkcioniše",
            "razumem",
            "koncept",
            "teorija",
            "explain",
            "what is",
            "how does",
        ],
        RequestType::CodeReview => &[
            "pregled",
            "review",
            "da li je dobro",
            "proveri",
            "analiza",
            "kvalitet",
            "najbolja praksa",
            "check",
        ],
        RequestType::Translation => &[
            "prevedi",
            "konvertuj",
            "iz python u",
            "translate",
            "convert",
            "prebaci",
        ],
        RequestType::Optimization => &[
            "optimizuj",
            "brže",
            "performanse",
            "optimize",
            "faster",
            "performance",
            "poboljšaj",
            "improve",
        ],
    }
}

/// Analyzes raw question text: determines the request type and extracts
/// whatever context (language, code, error line) the text carries.
pub struct RequestAnalyzer;

impl RequestAnalyzer {
    /// Score every type by keyword hits; highest wins, first declared wins
    /// ties, no signal at all means plain chat.
    pub fn analyze(raw_content: &str) -> RequestType {
        let lower = raw_content.to_lowercase();

        let mut scores = [0u32; RequestType::ALL.len()];
        for (i, request_type) in RequestType::ALL.iter().enumerate() {
            for keyword in keywords_for(*request_type) {
                if lower.contains(keyword) {
                    scores[i] += 1;
                }
            }
        }

        // Raw code in the question is a strong debug/review signal.
        if raw_content.contains("```")
            || raw_content.contains("def ")
            || raw_content.contains("class ")
        {
            scores[2] += 2; // CodeDebug
            scores[4] += 1; // CodeReview
        }

        // Question-shaped concept prompts.
        if raw_content.contains('?')
            && ["šta", "kako", "zašto"].iter().any(|w| lower.contains(w))
        {
            scores[3] += 1; // ConceptExplain
        }

        let max = scores.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return RequestType::Chat;
        }
        RequestType::ALL[scores.iter().position(|&s| s == max).unwrap()]
    }

    /// Pull programming language, fenced code and error lines out of the text.
    pub fn extract_context(raw_content: &str) -> RequestContext {
        let lower = raw_content.to_lowercase();
        let mut context = RequestContext::default();

        context.programming_language = KNOWN_LANGUAGES
            .iter()
            .find(|lang| lower.contains(*lang))
            .map(|lang| lang.to_string());

        if let Some(captures) = CODE_FENCE.captures(raw_content) {
            context.code_snippet = Some(captures[1].trim().to_string());
        }

        if let Some(captures) = ERROR_LINE.captures(raw_content) {
            context.error_message = Some(captures[1].trim().to_string());
        }

        context
    }

    /// Full pipeline: type + context, with optional forced type and extra
    /// context merged over the extracted one.
    pub fn structured_request(
        raw_content: &str,
        force_type: Option<RequestType>,
        additional_context: Option<&RequestContext>,
    ) -> StructuredRequest {
        let request_type = force_type.unwrap_or_else(|| Self::analyze(raw_content));
        let mut context = Self::extract_context(raw_content);

        if let Some(extra) = additional_context {
            if extra.user_level.is_some() {
                context.user_level = extra.user_level.clone();
            }
            if extra.programming_language.is_some() {
                context.programming_language = extra.programming_language.clone();
            }
        }

        StructuredRequest {
            content: raw_content.to_string(),
            request_type,
            context,
            preferences: TuningOverrides::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_representative_prompts() {
        assert_eq!(
            RequestAnalyzer::analyze("Napiši funkciju koja računa fibonacci"),
            RequestType::CodeGeneration
        );
        assert_eq!(
            RequestAnalyzer::analyze("Zašto mi ovaj kod baca IndexError?"),
            RequestType::CodeDebug
        );
        assert_eq!(
            RequestAnalyzer::analyze("Objasni mi šta su closure u JavaScript-u"),
            RequestType::ConceptExplain
        );
        assert_eq!(
            RequestAnalyzer::analyze("Pregledaj ovaj kod i reci da li je dobar"),
            RequestType::CodeReview
        );
        assert_eq!(
            RequestAnalyzer::analyze("Optimizuj ovu petlju da radi brže"),
            RequestType::Optimization
        );
        assert_eq!(
            RequestAnalyzer::analyze("Zdravo, dobar dan"),
            RequestType::Chat
        );
    }

    #[test]
    fn test_question_shape_leans_explain() {
        // "kako" plus a question mark reads as a concept question even when
        // another type also scores.
        assert_eq!(
            RequestAnalyzer::analyze("Kako da optimizujem ovu petlju?"),
            RequestType::ConceptExplain
        );
    }

    #[test]
    fn test_code_fence_boosts_debug() {
        let prompt = "Ovo ne izgleda dobro:\n```python\nprint(x)\n```";
        assert_eq!(RequestAnalyzer::analyze(prompt), RequestType::CodeDebug);
    }

    #[test]
    fn test_extract_language_and_code() {
        let prompt = "Imam problem sa ovim Python kodom:\n```python\ndef f():\n    return 1\n```";
        let ctx = RequestAnalyzer::extract_context(prompt);
        assert_eq!(ctx.programming_language.as_deref(), Some("python"));
        assert_eq!(ctx.code_snippet.as_deref(), Some("def f():\n    return 1"));
    }

    #[test]
    fn test_extract_error_line() {
        let prompt = "Dobijam ovo:\nZeroDivisionError: division by zero\nKako da popravim?";
        let ctx = RequestAnalyzer::extract_context(prompt);
        assert_eq!(
            ctx.error_message.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_tuned_params_table() {
        assert_eq!(
            RequestType::CodeGeneration.tuned_params(),
            TunedParams {
                temperature: 0.3,
                max_tokens: 300
            }
        );
        assert_eq!(
            RequestType::Chat.tuned_params(),
            TunedParams {
                temperature: 0.8,
                max_tokens: 100
            }
        );
        assert_eq!(
            RequestType::Translation.tuned_params(),
            TunedParams {
                temperature: 0.7,
                max_tokens: 150
            }
        );
    }

    #[test]
    fn test_preferences_override_tuned_params() {
        let mut request = StructuredRequest::new("Napiši kod", RequestType::CodeGeneration);
        request.preferences = TuningOverrides {
            temperature: Some(0.5),
            max_tokens: None,
        };
        let params = request.effective_params();
        assert_eq!(params.temperature, 0.5);
        assert_eq!(params.max_tokens, 300);
    }

    #[test]
    fn test_enhanced_prompt_composition() {
        let mut request = StructuredRequest::new("Popravi ovo", RequestType::CodeDebug);
        request.context = RequestContext {
            programming_language: Some("python".to_string()),
            error_message: Some("NameError: name 'x' is not defined".to_string()),
            code_snippet: Some("print(x)".to_string()),
            user_level: Some("beginner".to_string()),
        };

        let prompt = request.enhanced_prompt();
        assert!(prompt.starts_with("[Jezik: python]"));
        assert!(prompt.contains("Greška: NameError"));
        assert!(prompt.contains("```\nprint(x)\n```"));
        assert!(prompt.contains("početnik"));
    }

    #[test]
    fn test_preferred_provider_split() {
        assert_eq!(RequestType::Chat.preferred_provider(), ProviderKind::Gemini);
        assert_eq!(
            RequestType::CodeGeneration.preferred_provider(),
            ProviderKind::OpenAi
        );
    }
}
