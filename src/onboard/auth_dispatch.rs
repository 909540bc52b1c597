//! Auth provider dispatch: turn the resolved [`AuthChoice`] plus the raw
//! flags into a configuration update and the credential effects the caller
//! must perform. Nothing here touches disk or the process environment.

use crate::auth::{profile_id, AuthProfile};
use crate::config::schema::{AuthConfig, AuthProfileMode, AuthProfileRef, Config};
use crate::onboard::auth_choice::AuthChoice;
use crate::onboard::error::OnboardError;
use crate::onboard::options::{supplied, CredentialFlag, OnboardOptions};
use crate::providers::{
    apply_default_model, apply_gemini_model_default, provider_spec, EndpointSpec,
    ModelDefaultStrategy, ProviderSpec, ResolvedEndpoint,
};
use crate::security::normalize_api_key_input;
use chrono::{Duration, Utc};

const ANTHROPIC_PROVIDER: &str = "anthropic";
const DEFAULT_PROFILE_NAME: &str = "default";

/// A variable to export to the shared env file and the live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    pub key: String,
    pub value: String,
}

/// Result of dispatching one auth choice.
#[derive(Debug, Clone)]
pub struct AuthPlan {
    pub config: Config,
    /// Profiles to upsert into the credential store, in order.
    pub profiles: Vec<AuthProfile>,
    pub env: Vec<EnvAssignment>,
}

impl AuthPlan {
    fn unchanged(config: &Config) -> Self {
        Self {
            config: config.clone(),
            profiles: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn has_effects(&self) -> bool {
        !self.profiles.is_empty() || !self.env.is_empty()
    }
}

/// Dispatch `choice` against `config`. `skip` returns the configuration
/// unchanged with no effects.
pub fn apply_auth_choice(
    config: &Config,
    choice: AuthChoice,
    opts: &OnboardOptions,
) -> Result<AuthPlan, OnboardError> {
    match choice {
        AuthChoice::Skip => Ok(AuthPlan::unchanged(config)),
        AuthChoice::ClaudeCli | AuthChoice::ApiKey => apply_anthropic_key(config, choice, opts),
        AuthChoice::Token | AuthChoice::SetupToken | AuthChoice::OAuth => {
            apply_token(config, choice, opts)
        }
        other => match provider_spec(other) {
            Some(spec) => apply_provider_key(config, other, spec, opts),
            None => Err(OnboardError::UnsupportedChoice(other.to_string())),
        },
    }
}

fn apply_anthropic_key(
    config: &Config,
    choice: AuthChoice,
    opts: &OnboardOptions,
) -> Result<AuthPlan, OnboardError> {
    let key = required_key(opts, CredentialFlag::AnthropicApiKey, choice)?;
    let id = profile_id(ANTHROPIC_PROVIDER, DEFAULT_PROFILE_NAME);

    Ok(AuthPlan {
        config: apply_auth_profile_config(config, &id, ANTHROPIC_PROVIDER, AuthProfileMode::ApiKey),
        profiles: vec![AuthProfile::new_api_key(&id, ANTHROPIC_PROVIDER, key)],
        env: Vec::new(),
    })
}

fn apply_token(
    config: &Config,
    choice: AuthChoice,
    opts: &OnboardOptions,
) -> Result<AuthPlan, OnboardError> {
    let context = format!("auth-choice={choice}");
    let provider = supplied(opts.token_provider.as_deref())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| OnboardError::missing_for("--token-provider", context.clone()))?;
    let token = supplied(opts.token.as_deref())
        .map(str::to_string)
        .ok_or_else(|| OnboardError::missing_for("--token", context))?;

    let id = supplied(opts.token_profile_id.as_deref())
        .map_or_else(|| profile_id(&provider, DEFAULT_PROFILE_NAME), str::to_string);

    let expires_at = match supplied(opts.token_expires_in.as_deref()) {
        Some(raw) => Some(Utc::now() + parse_expires_in(raw)?),
        None => None,
    };

    Ok(AuthPlan {
        config: apply_auth_profile_config(config, &id, &provider, AuthProfileMode::Token),
        profiles: vec![AuthProfile::new_token(&id, &provider, token, expires_at)],
        env: Vec::new(),
    })
}

fn apply_provider_key(
    config: &Config,
    choice: AuthChoice,
    spec: &ProviderSpec,
    opts: &OnboardOptions,
) -> Result<AuthPlan, OnboardError> {
    let key = required_key(opts, spec.flag, choice)?;
    let id = profile_id(spec.provider, DEFAULT_PROFILE_NAME);
    let mut profile = AuthProfile::new_api_key(&id, spec.provider, key.clone());

    let endpoint = match spec.endpoint {
        EndpointSpec::BuiltIn => None,
        EndpointSpec::Fixed { base_url, api } => Some(ResolvedEndpoint {
            base_url: base_url.to_string(),
            api,
        }),
        EndpointSpec::CloudflareGateway => {
            let context = format!("auth-choice={choice}");
            let account_id = supplied(opts.cloudflare_ai_gateway_account_id.as_deref())
                .ok_or_else(|| {
                    OnboardError::missing_for("--cloudflare-ai-gateway-account-id", context.clone())
                })?;
            let gateway_id = supplied(opts.cloudflare_ai_gateway_gateway_id.as_deref())
                .ok_or_else(|| {
                    OnboardError::missing_for("--cloudflare-ai-gateway-gateway-id", context)
                })?;
            profile
                .metadata
                .insert("account_id".into(), account_id.to_string());
            profile
                .metadata
                .insert("gateway_id".into(), gateway_id.to_string());
            Some(ResolvedEndpoint::cloudflare_gateway(account_id, gateway_id))
        }
    };

    let with_profile = apply_auth_profile_config(config, &id, spec.provider, AuthProfileMode::ApiKey);
    let next = match spec.model_default {
        ModelDefaultStrategy::Generic => apply_default_model(&with_profile, spec, endpoint.as_ref()),
        ModelDefaultStrategy::GoogleGemini => apply_gemini_model_default(&with_profile).0,
    };

    let env = spec
        .env_var
        .map(|var| EnvAssignment {
            key: var.to_string(),
            value: key,
        })
        .into_iter()
        .collect();

    Ok(AuthPlan {
        config: next,
        profiles: vec![profile],
        env,
    })
}

fn required_key(
    opts: &OnboardOptions,
    flag: CredentialFlag,
    choice: AuthChoice,
) -> Result<String, OnboardError> {
    opts.credential(flag)
        .map(normalize_api_key_input)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| OnboardError::missing_for(flag.flag(), format!("auth-choice={choice}")))
}

/// Record a profile reference under `auth.profiles`. When the provider
/// already has an `auth.order` list, the profile moves to its front.
pub fn apply_auth_profile_config(
    config: &Config,
    profile_id: &str,
    provider: &str,
    mode: AuthProfileMode,
) -> Config {
    let mut next = config.clone();
    let auth = next.auth.get_or_insert_with(AuthConfig::default);

    auth.profiles.get_or_insert_with(Default::default).insert(
        profile_id.to_string(),
        AuthProfileRef {
            provider: provider.to_string(),
            mode,
        },
    );

    if let Some(order) = auth.order.as_mut().and_then(|o| o.get_mut(provider)) {
        order.retain(|id| id != profile_id);
        order.insert(0, profile_id.to_string());
    }

    next
}

/// `3600`, `90s`, `45m`, `12h`, `30d`, `2w`. A bare number is seconds.
pub fn parse_expires_in(raw: &str) -> Result<Duration, OnboardError> {
    let invalid = || OnboardError::InvalidValue {
        flag: "--token-expires-in",
        value: raw.to_string(),
        expected: "a positive duration such as 3600, 90m, 12h or 30d",
    };

    let trimmed = raw.trim().to_ascii_lowercase();
    let (digits, unit) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed.as_str(), "s"),
    };
    let amount: i64 = digits.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let duration = match unit.trim() {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthProfileKind;
    use crate::config::schema::ModelApi;

    fn opts_with(flag: CredentialFlag, value: &str) -> OnboardOptions {
        OnboardOptions::default().with_credential(flag, value)
    }

    #[test]
    fn skip_is_identity() {
        let mut config = Config::default();
        config.agent_defaults_mut().workspace = Some("/w".into());
        let plan = apply_auth_choice(&config, AuthChoice::Skip, &OnboardOptions::default()).unwrap();
        assert_eq!(plan.config, config);
        assert!(!plan.has_effects());
    }

    #[test]
    fn claude_cli_requires_anthropic_key() {
        let err = apply_auth_choice(
            &Config::default(),
            AuthChoice::ClaudeCli,
            &OnboardOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing --anthropic-api-key (auth-choice=claude-cli)"
        );
    }

    #[test]
    fn anthropic_key_writes_profile_without_model_default() {
        let opts = opts_with(CredentialFlag::AnthropicApiKey, "  sk-ant-1 ");
        let plan = apply_auth_choice(&Config::default(), AuthChoice::ApiKey, &opts).unwrap();

        assert_eq!(plan.profiles.len(), 1);
        assert_eq!(plan.profiles[0].id, "anthropic:default");
        assert_eq!(plan.profiles[0].secret, "sk-ant-1");
        assert!(plan.env.is_empty());
        assert_eq!(plan.config.primary_model(), None);
        let refs = plan.config.auth.as_ref().unwrap().profiles.as_ref().unwrap();
        assert_eq!(refs["anthropic:default"].mode, AuthProfileMode::ApiKey);
    }

    #[test]
    fn openai_key_exports_env_and_sets_default_model() {
        let opts = opts_with(CredentialFlag::OpenAiApiKey, "sk-test");
        let plan = apply_auth_choice(&Config::default(), AuthChoice::OpenAiApiKey, &opts).unwrap();

        assert_eq!(
            plan.env,
            vec![EnvAssignment {
                key: "OPENAI_API_KEY".into(),
                value: "sk-test".into()
            }]
        );
        assert_eq!(plan.profiles[0].id, "openai:default");
        assert_eq!(plan.config.primary_model(), Some("openai/gpt-5.1-codex"));
    }

    #[test]
    fn quoted_shell_assignment_is_normalized() {
        let opts = opts_with(CredentialFlag::XaiApiKey, "export XAI_API_KEY=\"xai-123\"");
        let plan = apply_auth_choice(&Config::default(), AuthChoice::XaiApiKey, &opts).unwrap();
        assert_eq!(plan.profiles[0].secret, "xai-123");
    }

    #[test]
    fn key_that_normalizes_to_empty_is_missing() {
        let opts = opts_with(CredentialFlag::VeniceApiKey, "\"\"");
        let err = apply_auth_choice(&Config::default(), AuthChoice::VeniceApiKey, &opts).unwrap_err();
        assert!(matches!(
            err,
            OnboardError::MissingCredential { ref flag, .. } if flag == "--venice-api-key"
        ));
    }

    #[test]
    fn moonshot_cn_uses_cn_endpoint() {
        let opts = opts_with(CredentialFlag::MoonshotApiKey, "ms-1");
        let plan =
            apply_auth_choice(&Config::default(), AuthChoice::MoonshotApiKeyCn, &opts).unwrap();
        let provider = &plan.config.models.as_ref().unwrap().providers.as_ref().unwrap()["moonshot"];
        assert_eq!(provider.base_url.as_deref(), Some("https://api.moonshot.cn/v1"));
        assert_eq!(plan.config.primary_model(), Some("moonshot/kimi-k2.5"));
    }

    #[test]
    fn cloudflare_requires_account_and_gateway_ids() {
        let opts = opts_with(CredentialFlag::CloudflareAiGatewayApiKey, "cf-key");
        let err = apply_auth_choice(
            &Config::default(),
            AuthChoice::CloudflareAiGatewayApiKey,
            &opts,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Missing --cloudflare-ai-gateway-account-id"));

        let opts = OnboardOptions {
            cloudflare_ai_gateway_account_id: Some("acct".into()),
            cloudflare_ai_gateway_gateway_id: Some("gw".into()),
            ..opts
        };
        let plan = apply_auth_choice(
            &Config::default(),
            AuthChoice::CloudflareAiGatewayApiKey,
            &opts,
        )
        .unwrap();
        let provider = &plan.config.models.as_ref().unwrap().providers.as_ref().unwrap()
            ["cloudflare-ai-gateway"];
        assert_eq!(
            provider.base_url.as_deref(),
            Some("https://gateway.ai.cloudflare.com/v1/acct/gw/anthropic")
        );
        assert_eq!(provider.api, Some(ModelApi::AnthropicMessages));
        assert_eq!(
            plan.profiles[0].metadata.get("account_id").map(String::as_str),
            Some("acct")
        );
    }

    #[test]
    fn gemini_uses_dedicated_default() {
        let opts = opts_with(CredentialFlag::GeminiApiKey, "g-1");
        let plan = apply_auth_choice(&Config::default(), AuthChoice::GeminiApiKey, &opts).unwrap();
        assert_eq!(plan.profiles[0].id, "google:default");
        assert_eq!(plan.config.primary_model(), Some("google/gemini-3-pro-preview"));
        assert!(plan.config.models.is_none());
    }

    #[test]
    fn token_choice_needs_both_flags() {
        let opts = OnboardOptions {
            token: Some("tok".into()),
            ..OnboardOptions::default()
        };
        let err = apply_auth_choice(&Config::default(), AuthChoice::Token, &opts).unwrap_err();
        assert_eq!(err.to_string(), "Missing --token-provider (auth-choice=token)");

        let opts = OnboardOptions {
            token_provider: Some("anthropic".into()),
            ..OnboardOptions::default()
        };
        let err = apply_auth_choice(&Config::default(), AuthChoice::SetupToken, &opts).unwrap_err();
        assert_eq!(err.to_string(), "Missing --token (auth-choice=setup-token)");
    }

    #[test]
    fn token_profile_uses_normalized_provider_and_expiry() {
        let opts = OnboardOptions {
            token: Some("tok-1".into()),
            token_provider: Some(" Anthropic ".into()),
            token_expires_in: Some("2h".into()),
            ..OnboardOptions::default()
        };
        let before = Utc::now();
        let plan = apply_auth_choice(&Config::default(), AuthChoice::Token, &opts).unwrap();
        let profile = &plan.profiles[0];

        assert_eq!(profile.id, "anthropic:default");
        assert_eq!(profile.provider, "anthropic");
        assert_eq!(profile.kind, AuthProfileKind::Token);
        let expires = profile.expires_at.unwrap();
        assert!(expires >= before + Duration::hours(2));
        assert!(expires <= Utc::now() + Duration::hours(2));

        let refs = plan.config.auth.as_ref().unwrap().profiles.as_ref().unwrap();
        assert_eq!(refs["anthropic:default"].mode, AuthProfileMode::Token);
    }

    #[test]
    fn explicit_token_profile_id_wins() {
        let opts = OnboardOptions {
            token: Some("tok-1".into()),
            token_provider: Some("anthropic".into()),
            token_profile_id: Some("anthropic:work".into()),
            ..OnboardOptions::default()
        };
        let plan = apply_auth_choice(&Config::default(), AuthChoice::Token, &opts).unwrap();
        assert_eq!(plan.profiles[0].id, "anthropic:work");
    }

    #[test]
    fn profile_order_moves_new_id_to_front_once() {
        let mut config = Config::default();
        config
            .auth
            .get_or_insert_with(AuthConfig::default)
            .order
            .get_or_insert_with(Default::default)
            .insert(
                "xai".into(),
                vec!["xai:old".into(), "xai:default".into(), "xai:other".into()],
            );

        let next = apply_auth_profile_config(&config, "xai:default", "xai", AuthProfileMode::ApiKey);
        let order = &next.auth.as_ref().unwrap().order.as_ref().unwrap()["xai"];
        assert_eq!(order, &vec!["xai:default", "xai:old", "xai:other"]);
    }

    #[test]
    fn profile_order_left_absent_when_not_configured() {
        let next = apply_auth_profile_config(
            &Config::default(),
            "xai:default",
            "xai",
            AuthProfileMode::ApiKey,
        );
        assert!(next.auth.as_ref().unwrap().order.is_none());
    }

    #[test]
    fn dispatch_is_idempotent() {
        for &choice in AuthChoice::ALL {
            let Some(spec) = provider_spec(choice) else {
                continue;
            };
            let opts = OnboardOptions {
                cloudflare_ai_gateway_account_id: Some("acct".into()),
                cloudflare_ai_gateway_gateway_id: Some("gw".into()),
                ..opts_with(spec.flag, "key-1")
            };
            let first = apply_auth_choice(&Config::default(), choice, &opts).unwrap();
            let second = apply_auth_choice(&first.config, choice, &opts).unwrap();
            assert_eq!(first.config, second.config, "{choice}");
            assert!(first.profiles[0].same_credential(&second.profiles[0]));
        }
    }

    #[test]
    fn expires_in_units() {
        assert_eq!(parse_expires_in("3600").unwrap(), Duration::seconds(3600));
        assert_eq!(parse_expires_in("90m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_expires_in("30D").unwrap(), Duration::days(30));
        assert_eq!(parse_expires_in("2w").unwrap(), Duration::weeks(2));
        assert!(parse_expires_in("0").is_err());
        assert!(parse_expires_in("soon").is_err());
        assert!(parse_expires_in("5y").is_err());
        assert!(matches!(
            parse_expires_in("-5m").unwrap_err(),
            OnboardError::InvalidValue { flag: "--token-expires-in", .. }
        ));
    }
}
