use clap::Args;
use std::path::PathBuf;

/// Flags accepted by `openclaw onboard`. Every value is untrusted until the
/// resolvers in this module tree have validated it.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardOptions {
    /// Run without prompts (required; the interactive wizard is not bundled)
    #[arg(long)]
    pub non_interactive: bool,

    /// Provider credential path to configure; inferred from the key flags when omitted
    #[arg(long, value_name = "CHOICE")]
    pub auth_choice: Option<String>,

    // ── Provider credentials ─────────────────────────────────────
    /// Anthropic API key
    #[arg(long, value_name = "KEY")]
    pub anthropic_api_key: Option<String>,
    /// OpenAI API key (also exported as OPENAI_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub openai_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub openrouter_api_key: Option<String>,
    /// Vercel AI Gateway API key
    #[arg(long, value_name = "KEY")]
    pub ai_gateway_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub cloudflare_ai_gateway_api_key: Option<String>,
    #[arg(long, value_name = "ID")]
    pub cloudflare_ai_gateway_account_id: Option<String>,
    #[arg(long, value_name = "ID")]
    pub cloudflare_ai_gateway_gateway_id: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub moonshot_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub kimi_code_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub gemini_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub zai_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub xiaomi_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub minimax_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub synthetic_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub venice_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub opencode_zen_api_key: Option<String>,
    #[arg(long, value_name = "KEY")]
    pub xai_api_key: Option<String>,
    /// Baidu Qianfan API key
    #[arg(long, value_name = "KEY")]
    pub qianfan_api_key: Option<String>,

    // ── Pre-issued tokens ────────────────────────────────────────
    /// Bearer/setup token for --token-provider
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
    #[arg(long, value_name = "PROVIDER")]
    pub token_provider: Option<String>,
    /// Profile id to store the token under (default: <provider>:default)
    #[arg(long, value_name = "ID")]
    pub token_profile_id: Option<String>,
    /// Token lifetime such as 3600, 90m, 12h, 30d
    #[arg(long, value_name = "DURATION")]
    pub token_expires_in: Option<String>,

    // ── Gateway exposure ─────────────────────────────────────────
    /// Gateway port (default: persisted value, else 18789)
    #[arg(long, value_name = "PORT")]
    pub gateway_port: Option<String>,
    /// loopback | lan | auto | custom | tailnet
    #[arg(long, value_name = "MODE")]
    pub gateway_bind: Option<String>,
    /// token | password
    #[arg(long, value_name = "MODE")]
    pub gateway_auth: Option<String>,
    /// Gateway bearer token (generated when absent)
    #[arg(long, value_name = "TOKEN")]
    pub gateway_token: Option<String>,
    #[arg(long, value_name = "PASSWORD")]
    pub gateway_password: Option<String>,
    /// off | serve | funnel
    #[arg(long, value_name = "MODE")]
    pub tailscale: Option<String>,
    /// Reset tailscale serve/funnel when the gateway exits
    #[arg(long)]
    pub tailscale_reset_on_exit: bool,

    // ── Workspace, daemon, output ────────────────────────────────
    /// Agent workspace directory (relative paths resolve against the current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
    /// Install the gateway as a user service
    #[arg(long)]
    pub install_daemon: bool,
    /// Service manager for --install-daemon: auto | systemd | launchd
    #[arg(long, value_name = "RUNTIME")]
    pub daemon_runtime: Option<String>,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub skip_skills: bool,
    #[arg(long)]
    pub skip_health: bool,
}

/// Provider credential flags, in inference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialFlag {
    AnthropicApiKey,
    OpenAiApiKey,
    OpenRouterApiKey,
    AiGatewayApiKey,
    CloudflareAiGatewayApiKey,
    MoonshotApiKey,
    KimiCodeApiKey,
    GeminiApiKey,
    ZaiApiKey,
    XiaomiApiKey,
    MinimaxApiKey,
    SyntheticApiKey,
    VeniceApiKey,
    OpencodeZenApiKey,
    XaiApiKey,
    QianfanApiKey,
}

impl CredentialFlag {
    pub const ALL: &'static [CredentialFlag] = &[
        Self::AnthropicApiKey,
        Self::OpenAiApiKey,
        Self::OpenRouterApiKey,
        Self::AiGatewayApiKey,
        Self::CloudflareAiGatewayApiKey,
        Self::MoonshotApiKey,
        Self::KimiCodeApiKey,
        Self::GeminiApiKey,
        Self::ZaiApiKey,
        Self::XiaomiApiKey,
        Self::MinimaxApiKey,
        Self::SyntheticApiKey,
        Self::VeniceApiKey,
        Self::OpencodeZenApiKey,
        Self::XaiApiKey,
        Self::QianfanApiKey,
    ];

    /// Command-line spelling, used in diagnostics.
    pub fn flag(self) -> &'static str {
        match self {
            Self::AnthropicApiKey => "--anthropic-api-key",
            Self::OpenAiApiKey => "--openai-api-key",
            Self::OpenRouterApiKey => "--openrouter-api-key",
            Self::AiGatewayApiKey => "--ai-gateway-api-key",
            Self::CloudflareAiGatewayApiKey => "--cloudflare-ai-gateway-api-key",
            Self::MoonshotApiKey => "--moonshot-api-key",
            Self::KimiCodeApiKey => "--kimi-code-api-key",
            Self::GeminiApiKey => "--gemini-api-key",
            Self::ZaiApiKey => "--zai-api-key",
            Self::XiaomiApiKey => "--xiaomi-api-key",
            Self::MinimaxApiKey => "--minimax-api-key",
            Self::SyntheticApiKey => "--synthetic-api-key",
            Self::VeniceApiKey => "--venice-api-key",
            Self::OpencodeZenApiKey => "--opencode-zen-api-key",
            Self::XaiApiKey => "--xai-api-key",
            Self::QianfanApiKey => "--qianfan-api-key",
        }
    }
}

impl OnboardOptions {
    /// Raw value of a credential flag.
    pub fn credential(&self, flag: CredentialFlag) -> Option<&str> {
        let value = match flag {
            CredentialFlag::AnthropicApiKey => &self.anthropic_api_key,
            CredentialFlag::OpenAiApiKey => &self.openai_api_key,
            CredentialFlag::OpenRouterApiKey => &self.openrouter_api_key,
            CredentialFlag::AiGatewayApiKey => &self.ai_gateway_api_key,
            CredentialFlag::CloudflareAiGatewayApiKey => &self.cloudflare_ai_gateway_api_key,
            CredentialFlag::MoonshotApiKey => &self.moonshot_api_key,
            CredentialFlag::KimiCodeApiKey => &self.kimi_code_api_key,
            CredentialFlag::GeminiApiKey => &self.gemini_api_key,
            CredentialFlag::ZaiApiKey => &self.zai_api_key,
            CredentialFlag::XiaomiApiKey => &self.xiaomi_api_key,
            CredentialFlag::MinimaxApiKey => &self.minimax_api_key,
            CredentialFlag::SyntheticApiKey => &self.synthetic_api_key,
            CredentialFlag::VeniceApiKey => &self.venice_api_key,
            CredentialFlag::OpencodeZenApiKey => &self.opencode_zen_api_key,
            CredentialFlag::XaiApiKey => &self.xai_api_key,
            CredentialFlag::QianfanApiKey => &self.qianfan_api_key,
        };
        value.as_deref()
    }

    /// Test/builder helper: set a credential flag by identity.
    pub fn with_credential(mut self, flag: CredentialFlag, value: impl Into<String>) -> Self {
        let slot = match flag {
            CredentialFlag::AnthropicApiKey => &mut self.anthropic_api_key,
            CredentialFlag::OpenAiApiKey => &mut self.openai_api_key,
            CredentialFlag::OpenRouterApiKey => &mut self.openrouter_api_key,
            CredentialFlag::AiGatewayApiKey => &mut self.ai_gateway_api_key,
            CredentialFlag::CloudflareAiGatewayApiKey => &mut self.cloudflare_ai_gateway_api_key,
            CredentialFlag::MoonshotApiKey => &mut self.moonshot_api_key,
            CredentialFlag::KimiCodeApiKey => &mut self.kimi_code_api_key,
            CredentialFlag::GeminiApiKey => &mut self.gemini_api_key,
            CredentialFlag::ZaiApiKey => &mut self.zai_api_key,
            CredentialFlag::XiaomiApiKey => &mut self.xiaomi_api_key,
            CredentialFlag::MinimaxApiKey => &mut self.minimax_api_key,
            CredentialFlag::SyntheticApiKey => &mut self.synthetic_api_key,
            CredentialFlag::VeniceApiKey => &mut self.venice_api_key,
            CredentialFlag::OpencodeZenApiKey => &mut self.opencode_zen_api_key,
            CredentialFlag::XaiApiKey => &mut self.xai_api_key,
            CredentialFlag::QianfanApiKey => &mut self.qianfan_api_key,
        };
        *slot = Some(value.into());
        self
    }
}

/// A flag counts as supplied only when it carries a non-blank value.
pub(crate) fn supplied(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
