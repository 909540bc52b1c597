pub mod paths;
pub mod schema;

pub use paths::StatePaths;
pub use schema::{
    AgentDefaultsConfig, AgentModelConfig, AgentModelEntry, AgentsConfig, AuthConfig,
    AuthProfileMode, AuthProfileRef, Config, GatewayAuthConfig, GatewayAuthMode, GatewayBindMode,
    GatewayConfig, GatewayNodesConfig, GatewayTailscaleConfig, MetaConfig, ModelApi,
    ModelDefinition, ModelProviderConfig, ModelsConfig, NodeBrowserConfig, NodeBrowserMode,
    SecretsConfig, TailscaleMode,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();
        assert!(config.gateway.is_none());
        assert!(config.secrets.encrypt);
    }
}
