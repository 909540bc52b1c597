use crate::onboard::error::OnboardError;
use crate::onboard::options::{supplied, CredentialFlag, OnboardOptions};
use std::fmt;
use std::str::FromStr;

/// Which credential path a run configures. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthChoice {
    Skip,
    ApiKey,
    ClaudeCli,
    Token,
    SetupToken,
    OAuth,
    OpenAiApiKey,
    OpenRouterApiKey,
    AiGatewayApiKey,
    CloudflareAiGatewayApiKey,
    MoonshotApiKey,
    MoonshotApiKeyCn,
    KimiCodeApiKey,
    GeminiApiKey,
    ZaiApiKey,
    XiaomiApiKey,
    Minimax,
    MinimaxApi,
    MinimaxApiLightning,
    SyntheticApiKey,
    VeniceApiKey,
    OpencodeZen,
    XaiApiKey,
    QianfanApiKey,
}

impl AuthChoice {
    pub const ALL: &'static [AuthChoice] = &[
        Self::Skip,
        Self::ApiKey,
        Self::ClaudeCli,
        Self::Token,
        Self::SetupToken,
        Self::OAuth,
        Self::OpenAiApiKey,
        Self::OpenRouterApiKey,
        Self::AiGatewayApiKey,
        Self::CloudflareAiGatewayApiKey,
        Self::MoonshotApiKey,
        Self::MoonshotApiKeyCn,
        Self::KimiCodeApiKey,
        Self::GeminiApiKey,
        Self::ZaiApiKey,
        Self::XiaomiApiKey,
        Self::Minimax,
        Self::MinimaxApi,
        Self::MinimaxApiLightning,
        Self::SyntheticApiKey,
        Self::VeniceApiKey,
        Self::OpencodeZen,
        Self::XaiApiKey,
        Self::QianfanApiKey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::ApiKey => "apiKey",
            Self::ClaudeCli => "claude-cli",
            Self::Token => "token",
            Self::SetupToken => "setup-token",
            Self::OAuth => "oauth",
            Self::OpenAiApiKey => "openai-api-key",
            Self::OpenRouterApiKey => "openrouter-api-key",
            Self::AiGatewayApiKey => "ai-gateway-api-key",
            Self::CloudflareAiGatewayApiKey => "cloudflare-ai-gateway-api-key",
            Self::MoonshotApiKey => "moonshot-api-key",
            Self::MoonshotApiKeyCn => "moonshot-api-key-cn",
            Self::KimiCodeApiKey => "kimi-code-api-key",
            Self::GeminiApiKey => "gemini-api-key",
            Self::ZaiApiKey => "zai-api-key",
            Self::XiaomiApiKey => "xiaomi-api-key",
            Self::Minimax => "minimax",
            Self::MinimaxApi => "minimax-api",
            Self::MinimaxApiLightning => "minimax-api-lightning",
            Self::SyntheticApiKey => "synthetic-api-key",
            Self::VeniceApiKey => "venice-api-key",
            Self::OpencodeZen => "opencode-zen",
            Self::XaiApiKey => "xai-api-key",
            Self::QianfanApiKey => "qianfan-api-key",
        }
    }
}

impl fmt::Display for AuthChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthChoice {
    type Err = OnboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.as_str() == wanted)
            .ok_or_else(|| OnboardError::UnsupportedChoice(wanted.to_string()))
    }
}

/// One credential flag that pointed at a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceMatch {
    pub choice: AuthChoice,
    pub label: &'static str,
}

/// Outcome of scanning the credential flags. `choice` is set only when
/// exactly one rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChoiceInference {
    pub choice: Option<AuthChoice>,
    pub matches: Vec<InferenceMatch>,
}

impl AuthChoiceInference {
    pub fn is_ambiguous(&self) -> bool {
        self.matches.len() > 1
    }
}

/// Choice implied by each credential flag, in scan order.
const FLAG_RULES: &[(CredentialFlag, AuthChoice)] = &[
    (CredentialFlag::AnthropicApiKey, AuthChoice::ClaudeCli),
    (CredentialFlag::OpenAiApiKey, AuthChoice::OpenAiApiKey),
    (CredentialFlag::OpenRouterApiKey, AuthChoice::OpenRouterApiKey),
    (CredentialFlag::AiGatewayApiKey, AuthChoice::AiGatewayApiKey),
    (
        CredentialFlag::CloudflareAiGatewayApiKey,
        AuthChoice::CloudflareAiGatewayApiKey,
    ),
    (CredentialFlag::MoonshotApiKey, AuthChoice::MoonshotApiKey),
    (CredentialFlag::KimiCodeApiKey, AuthChoice::KimiCodeApiKey),
    (CredentialFlag::GeminiApiKey, AuthChoice::GeminiApiKey),
    (CredentialFlag::ZaiApiKey, AuthChoice::ZaiApiKey),
    (CredentialFlag::XiaomiApiKey, AuthChoice::XiaomiApiKey),
    (CredentialFlag::MinimaxApiKey, AuthChoice::MinimaxApi),
    (CredentialFlag::SyntheticApiKey, AuthChoice::SyntheticApiKey),
    (CredentialFlag::VeniceApiKey, AuthChoice::VeniceApiKey),
    (CredentialFlag::OpencodeZenApiKey, AuthChoice::OpencodeZen),
    (CredentialFlag::XaiApiKey, AuthChoice::XaiApiKey),
    (CredentialFlag::QianfanApiKey, AuthChoice::QianfanApiKey),
];

const TOKEN_RULE_LABEL: &str = "--token + --token-provider";

/// Scan the credential flags and report every match.
pub fn infer_auth_choice(opts: &OnboardOptions) -> AuthChoiceInference {
    let mut matches: Vec<InferenceMatch> = FLAG_RULES
        .iter()
        .filter(|(flag, _)| supplied(opts.credential(*flag)).is_some())
        .map(|&(flag, choice)| InferenceMatch {
            choice,
            label: flag.flag(),
        })
        .collect();

    if supplied(opts.token.as_deref()).is_some() && supplied(opts.token_provider.as_deref()).is_some()
    {
        matches.push(InferenceMatch {
            choice: AuthChoice::Token,
            label: TOKEN_RULE_LABEL,
        });
    }

    let choice = match matches.as_slice() {
        [only] => Some(only.choice),
        _ => None,
    };
    AuthChoiceInference { choice, matches }
}

/// Run-level choice: `--auth-choice` wins, then a unique inference. Several
/// matching flags are an error; none means `skip`.
pub fn resolve_auth_choice(opts: &OnboardOptions) -> Result<AuthChoice, OnboardError> {
    if let Some(explicit) = supplied(opts.auth_choice.as_deref()) {
        return explicit.parse();
    }

    let inference = infer_auth_choice(opts);
    if inference.is_ambiguous() {
        return Err(OnboardError::AmbiguousAuthChoice(
            inference
                .matches
                .iter()
                .map(|m| m.label.to_string())
                .collect(),
        ));
    }
    Ok(inference.choice.unwrap_or(AuthChoice::Skip))
}
