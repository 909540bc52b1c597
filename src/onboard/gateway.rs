//! Gateway exposure: port, bind interface, auth mode and tailnet
//! publication, resolved from flags and the persisted `[gateway]` section.
//!
//! Unsafe combinations are rejected before anything is written, so an
//! accepted resolution is always one the gateway can serve.

use crate::config::schema::{
    Config, GatewayAuthConfig, GatewayAuthMode, GatewayBindMode, GatewayConfig,
    GatewayNodesConfig, GatewayTailscaleConfig, TailscaleMode,
};
use crate::onboard::error::OnboardError;
use crate::onboard::options::{supplied, OnboardOptions};
use crate::security::{generate_gateway_token, normalize_token_input};
use std::str::FromStr;

pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Node commands denied on a first-time setup that carries no node policy.
pub const DEFAULT_DANGEROUS_NODE_DENY_COMMANDS: &[&str] = &[
    "camera.snap",
    "camera.clip",
    "screen.record",
    "calendar.add",
    "contacts.add",
    "reminders.add",
];

const PORT_EXPECTATION: &str = "an integer between 1 and 65535";

#[derive(Debug, Clone)]
pub struct GatewayResolution {
    pub config: Config,
    pub port: u16,
    pub bind: GatewayBindMode,
    pub auth_mode: GatewayAuthMode,
    /// Active bearer token; `None` under password auth.
    pub token: Option<String>,
    pub tailscale_mode: TailscaleMode,
}

/// Resolve the gateway section of `config` against the flags in `opts`.
pub fn resolve_gateway_exposure(
    config: &Config,
    opts: &OnboardOptions,
) -> Result<GatewayResolution, OnboardError> {
    let prev = config.gateway.clone().unwrap_or_default();
    let prev_auth = prev.auth.clone().unwrap_or_default();

    let port = match supplied(opts.gateway_port.as_deref()) {
        Some(raw) => parse_port(raw)?,
        None => match prev.port {
            Some(0) => {
                return Err(OnboardError::InvalidValue {
                    flag: "gateway.port",
                    value: "0".into(),
                    expected: PORT_EXPECTATION,
                })
            }
            Some(port) => port,
            None => DEFAULT_GATEWAY_PORT,
        },
    };

    let bind = parse_flag::<GatewayBindMode>(
        opts.gateway_bind.as_deref(),
        "--gateway-bind",
        GatewayBindMode::VARIANTS,
    )?
    .unwrap_or(GatewayBindMode::Loopback);

    if bind == GatewayBindMode::Custom
        && supplied(prev.custom_bind_host.as_deref()).is_none()
    {
        return Err(OnboardError::missing_for(
            "gateway.custom_bind_host",
            "--gateway-bind=custom needs a host; set gateway.custom_bind_host in config.toml",
        ));
    }

    let tailscale_mode = parse_flag::<TailscaleMode>(
        opts.tailscale.as_deref(),
        "--tailscale",
        TailscaleMode::VARIANTS,
    )?
    .unwrap_or(TailscaleMode::Off);

    if tailscale_mode != TailscaleMode::Off && bind != GatewayBindMode::Loopback {
        return Err(OnboardError::UnsafeCombination(
            "Tailscale serve/funnel requires --gateway-bind=loopback".into(),
        ));
    }

    let auth_mode = parse_flag::<GatewayAuthMode>(
        opts.gateway_auth.as_deref(),
        "--gateway-auth",
        GatewayAuthMode::VARIANTS,
    )?
    .unwrap_or(GatewayAuthMode::Token);

    if tailscale_mode == TailscaleMode::Funnel && auth_mode != GatewayAuthMode::Password {
        return Err(OnboardError::UnsafeCombination(
            "Tailscale funnel requires --gateway-auth=password".into(),
        ));
    }

    let mut auth = GatewayAuthConfig {
        mode: Some(auth_mode),
        ..prev_auth.clone()
    };
    let token = match auth_mode {
        GatewayAuthMode::Token => {
            // A blank flag still means "issue a new token", never "keep the old one".
            let token = match opts.gateway_token.as_deref() {
                Some(raw) => normalize_token_input(raw).unwrap_or_else(generate_gateway_token),
                None => supplied(prev_auth.token.as_deref())
                    .map_or_else(generate_gateway_token, str::to_string),
            };
            auth.token = Some(token.clone());
            Some(token)
        }
        GatewayAuthMode::Password => {
            let password = supplied(opts.gateway_password.as_deref())
                .or_else(|| supplied(prev_auth.password.as_deref()))
                .map(str::to_string)
                .ok_or_else(|| {
                    OnboardError::missing_for(
                        "--gateway-password",
                        "Password auth requires --gateway-password",
                    )
                })?;
            auth.password = Some(password);
            None
        }
    };

    let first_time =
        prev.port.is_none() && prev.bind.is_none() && prev_auth.mode.is_none();
    let nodes = if first_time && !has_node_policy(prev.nodes.as_ref()) {
        let mut nodes = prev.nodes.clone().unwrap_or_default();
        nodes.deny_commands = Some(
            DEFAULT_DANGEROUS_NODE_DENY_COMMANDS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        );
        Some(nodes)
    } else {
        prev.nodes.clone()
    };

    let gateway = GatewayConfig {
        port: Some(port),
        bind: Some(bind),
        auth: Some(auth),
        tailscale: Some(GatewayTailscaleConfig {
            mode: Some(tailscale_mode),
            reset_on_exit: Some(opts.tailscale_reset_on_exit),
        }),
        nodes,
        ..prev
    };
    validate_exposure(&gateway)?;

    tracing::debug!(
        port,
        bind = %bind,
        auth = %auth_mode,
        tailscale = %tailscale_mode,
        "Gateway exposure resolved"
    );

    let mut next = config.clone();
    next.gateway = Some(gateway);
    Ok(GatewayResolution {
        config: next,
        port,
        bind,
        auth_mode,
        token,
        tailscale_mode,
    })
}

/// Check a gateway section for combinations the gateway must never run with.
pub fn validate_exposure(gateway: &GatewayConfig) -> Result<(), OnboardError> {
    let bind = gateway.bind.unwrap_or(GatewayBindMode::Loopback);
    let tailscale = gateway
        .tailscale
        .as_ref()
        .and_then(|t| t.mode)
        .unwrap_or(TailscaleMode::Off);
    let auth = gateway.auth.clone().unwrap_or_default();
    let auth_mode = auth.mode.unwrap_or(GatewayAuthMode::Token);

    if gateway.port == Some(0) {
        return Err(OnboardError::InvalidValue {
            flag: "gateway.port",
            value: "0".into(),
            expected: PORT_EXPECTATION,
        });
    }
    if tailscale != TailscaleMode::Off && bind != GatewayBindMode::Loopback {
        return Err(OnboardError::UnsafeCombination(format!(
            "tailscale={tailscale} with bind={bind}"
        )));
    }
    if tailscale == TailscaleMode::Funnel && auth_mode != GatewayAuthMode::Password {
        return Err(OnboardError::UnsafeCombination(format!(
            "tailscale=funnel with auth={auth_mode}"
        )));
    }
    match auth_mode {
        GatewayAuthMode::Token if supplied(auth.token.as_deref()).is_none() => {
            Err(OnboardError::missing("gateway.auth.token"))
        }
        GatewayAuthMode::Password if supplied(auth.password.as_deref()).is_none() => {
            Err(OnboardError::missing("gateway.auth.password"))
        }
        _ => Ok(()),
    }
}

/// A node policy exists once any of its lists or the browser block is set,
/// even if empty.
fn has_node_policy(nodes: Option<&GatewayNodesConfig>) -> bool {
    nodes.is_some_and(|n| {
        n.deny_commands.is_some() || n.allow_commands.is_some() || n.browser.is_some()
    })
}

fn parse_port(raw: &str) -> Result<u16, OnboardError> {
    let digits_only = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
    match raw.parse::<u16>() {
        Ok(port) if digits_only && port > 0 => Ok(port),
        _ => Err(OnboardError::InvalidValue {
            flag: "--gateway-port",
            value: raw.to_string(),
            expected: PORT_EXPECTATION,
        }),
    }
}

fn parse_flag<T: FromStr>(
    raw: Option<&str>,
    flag: &'static str,
    allowed: &'static [&'static str],
) -> Result<Option<T>, OnboardError> {
    let Some(value) = supplied(raw) else {
        return Ok(None);
    };
    let invalid = || OnboardError::InvalidEnumValue {
        flag,
        value: value.to_string(),
        allowed,
    };
    // Flags take the exact wire spelling; the looser `FromStr` is for hand-edited config.
    if !allowed.contains(&value) {
        return Err(invalid());
    }
    value.parse::<T>().map(Some).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodeBrowserConfig;
    use proptest::prelude::*;

    fn opts() -> OnboardOptions {
        OnboardOptions::default()
    }

    fn deny_list(resolution: &GatewayResolution) -> Option<Vec<String>> {
        resolution
            .config
            .gateway
            .as_ref()
            .and_then(|g| g.nodes.as_ref())
            .and_then(|n| n.deny_commands.clone())
    }

    #[test]
    fn first_run_defaults() {
        let res = resolve_gateway_exposure(&Config::default(), &opts()).unwrap();
        assert_eq!(res.port, DEFAULT_GATEWAY_PORT);
        assert_eq!(res.bind, GatewayBindMode::Loopback);
        assert_eq!(res.auth_mode, GatewayAuthMode::Token);
        assert_eq!(res.tailscale_mode, TailscaleMode::Off);
        assert_eq!(res.token.as_ref().map(String::len), Some(48));
        assert_eq!(
            deny_list(&res).unwrap(),
            DEFAULT_DANGEROUS_NODE_DENY_COMMANDS
        );

        let gateway = res.config.gateway.as_ref().unwrap();
        assert_eq!(gateway.auth.as_ref().unwrap().token, res.token);
        let tailscale = gateway.tailscale.as_ref().unwrap();
        assert_eq!(tailscale.mode, Some(TailscaleMode::Off));
        assert_eq!(tailscale.reset_on_exit, Some(false));
    }

    #[test]
    fn tailnet_bind_with_explicit_token() {
        let o = OnboardOptions {
            gateway_bind: Some("tailnet".into()),
            gateway_auth: Some("token".into()),
            gateway_token: Some("\"abc\"".into()),
            ..opts()
        };
        let res = resolve_gateway_exposure(&Config::default(), &o).unwrap();
        assert_eq!(res.bind, GatewayBindMode::Tailnet);
        assert_eq!(res.token.as_deref(), Some("abc"));
    }

    #[test]
    fn persisted_port_is_reused() {
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            port: Some(19001),
            ..GatewayConfig::default()
        });
        let res = resolve_gateway_exposure(&config, &opts()).unwrap();
        assert_eq!(res.port, 19001);
        assert!(deny_list(&res).is_none());
    }

    #[test]
    fn persisted_token_survives_rerun() {
        let first = resolve_gateway_exposure(&Config::default(), &opts()).unwrap();
        let second = resolve_gateway_exposure(&first.config, &opts()).unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(first.config, second.config);
    }

    #[test]
    fn blank_token_flag_falls_back_to_generated() {
        let o = OnboardOptions {
            gateway_token: Some("  undefined ".into()),
            ..opts()
        };
        let res = resolve_gateway_exposure(&Config::default(), &o).unwrap();
        assert_eq!(res.token.as_ref().map(String::len), Some(48));
    }

    #[test]
    fn blank_token_flag_replaces_persisted_token() {
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            auth: Some(GatewayAuthConfig {
                token: Some("persisted".into()),
                ..GatewayAuthConfig::default()
            }),
            ..GatewayConfig::default()
        });

        let res = resolve_gateway_exposure(&config, &opts()).unwrap();
        assert_eq!(res.token.as_deref(), Some("persisted"));

        for blank in ["", "undefined", "null"] {
            let o = OnboardOptions {
                gateway_token: Some(blank.into()),
                ..opts()
            };
            let res = resolve_gateway_exposure(&config, &o).unwrap();
            let token = res.token.unwrap();
            assert_ne!(token, "persisted");
            assert_eq!(token.len(), 48);
        }
    }

    #[test]
    fn enum_flags_are_case_sensitive() {
        let cases = [
            OnboardOptions {
                gateway_bind: Some("LAN".into()),
                ..opts()
            },
            OnboardOptions {
                tailscale: Some("Funnel".into()),
                ..opts()
            },
            OnboardOptions {
                gateway_auth: Some("PASSWORD".into()),
                ..opts()
            },
        ];
        for o in cases {
            assert!(matches!(
                resolve_gateway_exposure(&Config::default(), &o).unwrap_err(),
                OnboardError::InvalidEnumValue { .. }
            ));
        }
    }

    #[test]
    fn bad_port_values() {
        for raw in ["0", "65536", "http", "-1", "+80"] {
            let o = OnboardOptions {
                gateway_port: Some(raw.into()),
                ..opts()
            };
            assert_eq!(
                resolve_gateway_exposure(&Config::default(), &o).unwrap_err(),
                OnboardError::InvalidValue {
                    flag: "--gateway-port",
                    value: raw.into(),
                    expected: PORT_EXPECTATION,
                }
            );
        }
    }

    #[test]
    fn unknown_enum_values_list_the_allowed_set() {
        let o = OnboardOptions {
            tailscale: Some("public".into()),
            ..opts()
        };
        assert_eq!(
            resolve_gateway_exposure(&Config::default(), &o)
                .unwrap_err()
                .to_string(),
            "Invalid --tailscale \"public\" (use: off, serve, funnel)"
        );

        let o = OnboardOptions {
            gateway_bind: Some("everywhere".into()),
            ..opts()
        };
        assert!(matches!(
            resolve_gateway_exposure(&Config::default(), &o).unwrap_err(),
            OnboardError::InvalidEnumValue { flag: "--gateway-bind", .. }
        ));
    }

    #[test]
    fn custom_bind_needs_persisted_host() {
        let o = OnboardOptions {
            gateway_bind: Some("custom".into()),
            ..opts()
        };
        let err = resolve_gateway_exposure(&Config::default(), &o).unwrap_err();
        assert!(err.to_string().contains("custom_bind_host"));

        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            custom_bind_host: Some("10.0.0.5".into()),
            ..GatewayConfig::default()
        });
        let res = resolve_gateway_exposure(&config, &o).unwrap();
        assert_eq!(res.bind, GatewayBindMode::Custom);
        assert_eq!(
            res.config.gateway.unwrap().custom_bind_host.as_deref(),
            Some("10.0.0.5")
        );
    }

    #[test]
    fn tailscale_requires_loopback() {
        let o = OnboardOptions {
            gateway_bind: Some("lan".into()),
            tailscale: Some("serve".into()),
            ..opts()
        };
        assert_eq!(
            resolve_gateway_exposure(&Config::default(), &o).unwrap_err(),
            OnboardError::UnsafeCombination(
                "Tailscale serve/funnel requires --gateway-bind=loopback".into()
            )
        );
    }

    #[test]
    fn funnel_requires_password_auth() {
        let o = OnboardOptions {
            tailscale: Some("funnel".into()),
            gateway_auth: Some("token".into()),
            ..opts()
        };
        assert_eq!(
            resolve_gateway_exposure(&Config::default(), &o).unwrap_err(),
            OnboardError::UnsafeCombination("Tailscale funnel requires --gateway-auth=password".into())
        );
    }

    #[test]
    fn funnel_with_password() {
        let o = OnboardOptions {
            tailscale: Some("funnel".into()),
            tailscale_reset_on_exit: true,
            gateway_auth: Some("password".into()),
            gateway_password: Some(" hunter2 ".into()),
            ..opts()
        };
        let res = resolve_gateway_exposure(&Config::default(), &o).unwrap();
        assert_eq!(res.token, None);
        let gateway = res.config.gateway.unwrap();
        assert_eq!(gateway.auth.unwrap().password.as_deref(), Some("hunter2"));
        assert_eq!(gateway.tailscale.unwrap().reset_on_exit, Some(true));
    }

    #[test]
    fn password_auth_requires_password() {
        let o = OnboardOptions {
            gateway_auth: Some("password".into()),
            ..opts()
        };
        let err = resolve_gateway_exposure(&Config::default(), &o).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing --gateway-password (Password auth requires --gateway-password)"
        );
    }

    #[test]
    fn persisted_password_is_reused() {
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            auth: Some(GatewayAuthConfig {
                mode: Some(GatewayAuthMode::Password),
                token: None,
                password: Some("stored".into()),
            }),
            ..GatewayConfig::default()
        });
        let o = OnboardOptions {
            gateway_auth: Some("password".into()),
            ..opts()
        };
        let res = resolve_gateway_exposure(&config, &o).unwrap();
        assert_eq!(
            res.config.gateway.unwrap().auth.unwrap().password.as_deref(),
            Some("stored")
        );
    }

    #[test]
    fn empty_deny_list_is_respected() {
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            nodes: Some(GatewayNodesConfig {
                deny_commands: Some(Vec::new()),
                ..GatewayNodesConfig::default()
            }),
            ..GatewayConfig::default()
        });
        let res = resolve_gateway_exposure(&config, &opts()).unwrap();
        assert_eq!(deny_list(&res), Some(Vec::new()));
    }

    #[test]
    fn browser_policy_blocks_default_denylist() {
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            nodes: Some(GatewayNodesConfig {
                browser: Some(NodeBrowserConfig::default()),
                ..GatewayNodesConfig::default()
            }),
            ..GatewayConfig::default()
        });
        let res = resolve_gateway_exposure(&config, &opts()).unwrap();
        assert!(deny_list(&res).is_none());
    }

    #[test]
    fn unrelated_gateway_keys_are_preserved() {
        let mut extra = toml::Table::new();
        extra.insert("trusted_proxies".into(), toml::Value::Array(Vec::new()));
        let mut config = Config::default();
        config.gateway = Some(GatewayConfig {
            extra,
            ..GatewayConfig::default()
        });
        let res = resolve_gateway_exposure(&config, &opts()).unwrap();
        assert!(res
            .config
            .gateway
            .unwrap()
            .extra
            .contains_key("trusted_proxies"));
    }

    fn arb_bind() -> impl Strategy<Value = &'static str> {
        prop::sample::select(GatewayBindMode::VARIANTS)
    }

    fn arb_auth() -> impl Strategy<Value = &'static str> {
        prop::sample::select(GatewayAuthMode::VARIANTS)
    }

    fn arb_tailscale() -> impl Strategy<Value = &'static str> {
        prop::sample::select(TailscaleMode::VARIANTS)
    }

    proptest! {
        #[test]
        fn property_accepted_exposure_is_safe(
            bind in arb_bind(),
            auth in arb_auth(),
            tailscale in arb_tailscale(),
            port in proptest::option::of(0u32..70_000),
            password in proptest::option::of("[a-z]{0,8}"),
            custom_host in proptest::option::of("[a-z0-9.]{0,12}"),
        ) {
            let mut config = Config::default();
            config.gateway = Some(GatewayConfig {
                custom_bind_host: custom_host,
                ..GatewayConfig::default()
            });
            let o = OnboardOptions {
                gateway_bind: Some(bind.into()),
                gateway_auth: Some(auth.into()),
                tailscale: Some(tailscale.into()),
                gateway_port: port.map(|p| p.to_string()),
                gateway_password: password,
                ..OnboardOptions::default()
            };

            if let Ok(res) = resolve_gateway_exposure(&config, &o) {
                let gateway = res.config.gateway.as_ref().unwrap();
                prop_assert!(validate_exposure(gateway).is_ok());
                prop_assert!(res.port >= 1);
                if res.tailscale_mode != TailscaleMode::Off {
                    prop_assert_eq!(res.bind, GatewayBindMode::Loopback);
                }
                if res.tailscale_mode == TailscaleMode::Funnel {
                    prop_assert_eq!(res.auth_mode, GatewayAuthMode::Password);
                }
                if res.bind == GatewayBindMode::Custom {
                    prop_assert!(supplied(gateway.custom_bind_host.as_deref()).is_some());
                }
                match res.auth_mode {
                    GatewayAuthMode::Token => prop_assert!(res.token.is_some()),
                    GatewayAuthMode::Password => prop_assert!(
                        supplied(gateway.auth.as_ref().unwrap().password.as_deref()).is_some()
                    ),
                }
            }
        }

        #[test]
        fn property_funnel_without_password_always_fails(
            bind in arb_bind(),
            password in proptest::option::of("[a-z]{1,8}"),
        ) {
            let o = OnboardOptions {
                gateway_bind: Some(bind.into()),
                gateway_auth: Some("token".into()),
                tailscale: Some("funnel".into()),
                gateway_password: password,
                ..OnboardOptions::default()
            };
            prop_assert!(resolve_gateway_exposure(&Config::default(), &o).is_err());
        }
    }
}
