//! Provider table for API-key onboarding.
//!
//! Each [`ProviderSpec`] records what the dispatcher needs to wire one
//! provider into the configuration:
//!
//! - the credential flag it reads
//! - the auth-profile namespace it writes
//! - an optional env var
//! - the default model reference
//! - the endpoint to register under `models.providers`
//!
//! Adding a provider means adding one table entry; no dispatch code changes.
//!
//! The appliers here are pure: they take a configuration and return the
//! updated copy, leaving persistence to the caller.

use crate::config::schema::{
    AgentModelConfig, AgentModelEntry, Config, ModelApi, ModelDefinition, ModelProviderConfig,
    ModelsConfig,
};
use crate::onboard::auth_choice::AuthChoice;
use crate::onboard::options::CredentialFlag;

pub const OPENAI_DEFAULT_MODEL_REF: &str = "openai/gpt-5.1-codex";
pub const GOOGLE_GEMINI_DEFAULT_MODEL: &str = "google/gemini-3-pro-preview";

const MOONSHOT_BASE_URL: &str = "https://api.moonshot.ai/v1";
const MOONSHOT_CN_BASE_URL: &str = "https://api.moonshot.cn/v1";
const CLOUDFLARE_AI_GATEWAY_BASE: &str = "https://gateway.ai.cloudflare.com/v1";

/// Where a provider's models are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSpec {
    /// The runtime already knows the endpoint; nothing goes under `models.providers`.
    BuiltIn,
    Fixed {
        base_url: &'static str,
        api: ModelApi,
    },
    /// Built from the operator's Cloudflare account and gateway ids.
    CloudflareGateway,
}

/// How the default model is applied once the credential is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDefaultStrategy {
    /// Register the provider and set `agents.defaults.model.primary`.
    Generic,
    /// Only touch the primary model when it differs from the Gemini default.
    GoogleGemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Namespace used for the auth profile (`<provider>:default`) and model refs.
    pub provider: &'static str,
    /// Display name, used as the model alias.
    pub label: &'static str,
    pub flag: CredentialFlag,
    /// Shared env var that also receives the key, if any.
    pub env_var: Option<&'static str>,
    pub default_model_ref: &'static str,
    pub endpoint: EndpointSpec,
    pub model_default: ModelDefaultStrategy,
}

/// Endpoint with every placeholder filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    pub api: ModelApi,
}

impl ResolvedEndpoint {
    pub fn cloudflare_gateway(account_id: &str, gateway_id: &str) -> Self {
        Self {
            base_url: format!(
                "{CLOUDFLARE_AI_GATEWAY_BASE}/{}/{}/anthropic",
                account_id.trim(),
                gateway_id.trim()
            ),
            api: ModelApi::AnthropicMessages,
        }
    }
}

const fn generic(
    provider: &'static str,
    label: &'static str,
    flag: CredentialFlag,
    default_model_ref: &'static str,
    endpoint: EndpointSpec,
) -> ProviderSpec {
    ProviderSpec {
        provider,
        label,
        flag,
        env_var: None,
        default_model_ref,
        endpoint,
        model_default: ModelDefaultStrategy::Generic,
    }
}

const OPENAI: ProviderSpec = ProviderSpec {
    env_var: Some("OPENAI_API_KEY"),
    ..generic(
        "openai",
        "OpenAI",
        CredentialFlag::OpenAiApiKey,
        OPENAI_DEFAULT_MODEL_REF,
        EndpointSpec::BuiltIn,
    )
};

const OPENROUTER: ProviderSpec = generic(
    "openrouter",
    "OpenRouter",
    CredentialFlag::OpenRouterApiKey,
    "openrouter/auto",
    EndpointSpec::BuiltIn,
);

const VERCEL_AI_GATEWAY: ProviderSpec = generic(
    "vercel-ai-gateway",
    "Vercel AI Gateway",
    CredentialFlag::AiGatewayApiKey,
    "vercel-ai-gateway/anthropic/claude-opus-4.5",
    EndpointSpec::BuiltIn,
);

const CLOUDFLARE_AI_GATEWAY: ProviderSpec = generic(
    "cloudflare-ai-gateway",
    "Cloudflare AI Gateway",
    CredentialFlag::CloudflareAiGatewayApiKey,
    "cloudflare-ai-gateway/claude-sonnet-4-5",
    EndpointSpec::CloudflareGateway,
);

const MOONSHOT: ProviderSpec = generic(
    "moonshot",
    "Kimi",
    CredentialFlag::MoonshotApiKey,
    "moonshot/kimi-k2.5",
    EndpointSpec::Fixed {
        base_url: MOONSHOT_BASE_URL,
        api: ModelApi::OpenaiCompletions,
    },
);

const MOONSHOT_CN: ProviderSpec = ProviderSpec {
    endpoint: EndpointSpec::Fixed {
        base_url: MOONSHOT_CN_BASE_URL,
        api: ModelApi::OpenaiCompletions,
    },
    ..MOONSHOT
};

const KIMI_CODING: ProviderSpec = generic(
    "kimi-coding",
    "Kimi for Coding",
    CredentialFlag::KimiCodeApiKey,
    "kimi-coding/k2p5",
    EndpointSpec::Fixed {
        base_url: "https://api.kimi.com/coding/",
        api: ModelApi::AnthropicMessages,
    },
);

const GOOGLE: ProviderSpec = ProviderSpec {
    model_default: ModelDefaultStrategy::GoogleGemini,
    ..generic(
        "google",
        "Gemini",
        CredentialFlag::GeminiApiKey,
        GOOGLE_GEMINI_DEFAULT_MODEL,
        EndpointSpec::BuiltIn,
    )
};

const ZAI: ProviderSpec = generic(
    "zai",
    "GLM",
    CredentialFlag::ZaiApiKey,
    "zai/glm-4.7",
    EndpointSpec::BuiltIn,
);

const XIAOMI: ProviderSpec = generic(
    "xiaomi",
    "Xiaomi MiMo",
    CredentialFlag::XiaomiApiKey,
    "xiaomi/mimo-v2-flash",
    EndpointSpec::Fixed {
        base_url: "https://api.xiaomimimo.com/anthropic",
        api: ModelApi::AnthropicMessages,
    },
);

const MINIMAX: ProviderSpec = generic(
    "minimax",
    "MiniMax",
    CredentialFlag::MinimaxApiKey,
    "minimax/MiniMax-M2.1",
    EndpointSpec::Fixed {
        base_url: "https://api.minimax.io/anthropic",
        api: ModelApi::AnthropicMessages,
    },
);

const SYNTHETIC: ProviderSpec = generic(
    "synthetic",
    "Synthetic",
    CredentialFlag::SyntheticApiKey,
    "synthetic/hf:MiniMaxAI/MiniMax-M2.1",
    EndpointSpec::Fixed {
        base_url: "https://api.synthetic.new/anthropic",
        api: ModelApi::AnthropicMessages,
    },
);

const VENICE: ProviderSpec = generic(
    "venice",
    "Venice",
    CredentialFlag::VeniceApiKey,
    "venice/llama-3.3-70b",
    EndpointSpec::Fixed {
        base_url: "https://api.venice.ai/api/v1",
        api: ModelApi::OpenaiCompletions,
    },
);

const OPENCODE_ZEN: ProviderSpec = generic(
    "opencode-zen",
    "OpenCode Zen",
    CredentialFlag::OpencodeZenApiKey,
    "opencode-zen/qwen-3-235b-max",
    EndpointSpec::Fixed {
        base_url: "https://opencode.ai/zen/v1",
        api: ModelApi::OpenaiCompletions,
    },
);

const XAI: ProviderSpec = generic(
    "xai",
    "Grok",
    CredentialFlag::XaiApiKey,
    "xai/grok-4",
    EndpointSpec::Fixed {
        base_url: "https://api.x.ai/v1",
        api: ModelApi::OpenaiCompletions,
    },
);

const QIANFAN: ProviderSpec = generic(
    "qianfan",
    "Qianfan",
    CredentialFlag::QianfanApiKey,
    "qianfan/deepseek-v3.2",
    EndpointSpec::Fixed {
        base_url: "https://qianfan.baidubce.com/v2",
        api: ModelApi::OpenaiCompletions,
    },
);

/// Table entry for an API-key choice. Choices handled elsewhere (skip,
/// Anthropic, pre-issued tokens) have none.
pub fn provider_spec(choice: AuthChoice) -> Option<&'static ProviderSpec> {
    let spec = match choice {
        AuthChoice::OpenAiApiKey => &OPENAI,
        AuthChoice::OpenRouterApiKey => &OPENROUTER,
        AuthChoice::AiGatewayApiKey => &VERCEL_AI_GATEWAY,
        AuthChoice::CloudflareAiGatewayApiKey => &CLOUDFLARE_AI_GATEWAY,
        AuthChoice::MoonshotApiKey => &MOONSHOT,
        AuthChoice::MoonshotApiKeyCn => &MOONSHOT_CN,
        AuthChoice::KimiCodeApiKey => &KIMI_CODING,
        AuthChoice::GeminiApiKey => &GOOGLE,
        AuthChoice::ZaiApiKey => &ZAI,
        AuthChoice::XiaomiApiKey => &XIAOMI,
        AuthChoice::Minimax | AuthChoice::MinimaxApi | AuthChoice::MinimaxApiLightning => &MINIMAX,
        AuthChoice::SyntheticApiKey => &SYNTHETIC,
        AuthChoice::VeniceApiKey => &VENICE,
        AuthChoice::OpencodeZen => &OPENCODE_ZEN,
        AuthChoice::XaiApiKey => &XAI,
        AuthChoice::QianfanApiKey => &QIANFAN,
        AuthChoice::Skip
        | AuthChoice::ApiKey
        | AuthChoice::ClaudeCli
        | AuthChoice::Token
        | AuthChoice::SetupToken
        | AuthChoice::OAuth => return None,
    };
    Some(spec)
}

/// `moonshot/kimi-k2.5` -> `kimi-k2.5`. Only the first `/` separates the
/// namespace, so `synthetic/hf:MiniMaxAI/MiniMax-M2.1` keeps its inner slash.
pub fn model_id(model_ref: &str) -> &str {
    model_ref
        .split_once('/')
        .map_or(model_ref, |(_, id)| id)
}

/// Register the provider endpoint (when one is given) and a model alias,
/// without changing the primary model.
pub fn apply_provider_config(
    config: &Config,
    spec: &ProviderSpec,
    endpoint: Option<&ResolvedEndpoint>,
) -> Config {
    let mut next = config.clone();

    if let Some(endpoint) = endpoint {
        let providers = next
            .models
            .get_or_insert_with(ModelsConfig::default)
            .providers
            .get_or_insert_with(Default::default);
        let entry = providers
            .entry(spec.provider.to_string())
            .or_insert_with(ModelProviderConfig::default);
        entry.base_url = Some(endpoint.base_url.clone());
        entry.api = Some(endpoint.api);

        let id = model_id(spec.default_model_ref);
        if !entry.models.iter().any(|m| m.id == id) {
            entry.models.push(ModelDefinition {
                id: id.to_string(),
                name: None,
            });
        }
    }

    let aliases = next
        .agent_defaults_mut()
        .models
        .get_or_insert_with(Default::default);
    let alias = aliases
        .entry(spec.default_model_ref.to_string())
        .or_insert_with(AgentModelEntry::default);
    if alias.alias.is_none() {
        alias.alias = Some(spec.label.to_string());
    }

    next
}

/// [`apply_provider_config`] plus making the provider's model the primary.
pub fn apply_default_model(
    config: &Config,
    spec: &ProviderSpec,
    endpoint: Option<&ResolvedEndpoint>,
) -> Config {
    let mut next = apply_provider_config(config, spec, endpoint);
    set_primary_model(&mut next, spec.default_model_ref);
    next
}

/// Point the primary model at Gemini. Returns the updated configuration and
/// whether anything changed.
pub fn apply_gemini_model_default(config: &Config) -> (Config, bool) {
    if config.primary_model() == Some(GOOGLE_GEMINI_DEFAULT_MODEL) {
        return (config.clone(), false);
    }
    let mut next = config.clone();
    set_primary_model(&mut next, GOOGLE_GEMINI_DEFAULT_MODEL);
    (next, true)
}

fn set_primary_model(config: &mut Config, model_ref: &str) {
    config
        .agent_defaults_mut()
        .model
        .get_or_insert_with(AgentModelConfig::default)
        .primary = Some(model_ref.to_string());
}
