//! Export container endpoints as environment variables.
//!
//! After a container starts, [`populate_host_port_env`] publishes one
//! `<NAME>_<PORT>_HOST` and one `<NAME>_<PORT>_PORT` variable per port
//! binding so that code under test can find it. Writes go through an
//! [`EnvSetter`], which keeps the callback testable without touching the
//! real process environment.

use std::collections::BTreeMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use tracing::debug;

use crate::context::WaitContext;
use crate::error::{WaitError, WaitResult};
use crate::target::{Port, StrategyTarget};

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("static pattern is valid"));

/// Capability to set environment variables.
pub trait EnvSetter: Send + Sync {
    /// Set `name` to `value`. Returns a reason on failure.
    fn set_var(&self, name: &str, value: &str) -> Result<(), String>;
}

/// Writes to the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSetter for ProcessEnv {
    fn set_var(&self, name: &str, value: &str) -> Result<(), String> {
        if name.is_empty() || name.contains('=') || name.contains('\0') || value.contains('\0') {
            return Err("invalid name or value".to_string());
        }

        std::env::set_var(name, value);
        Ok(())
    }
}

/// Records variables in memory.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: Mutex<BTreeMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// All recorded variables.
    pub fn vars(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EnvSetter for MemoryEnv {
    fn set_var(&self, name: &str, value: &str) -> Result<(), String> {
        self.lock().insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Build an environment variable name from parts.
///
/// Parts are joined with `_`, every run of characters other than ASCII
/// letters and digits becomes a single `_`, and the result is uppercased.
pub fn env_var_name<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("_");

    NON_ALPHANUMERIC.replace_all(&joined, "_").to_uppercase()
}

/// Publish host and port variables for every port binding of a container.
pub async fn populate_host_port_env(
    ctx: &WaitContext,
    container: &dyn StrategyTarget,
    name: &str,
    env: &dyn EnvSetter,
) -> WaitResult<()> {
    let ports = container
        .ports(ctx)
        .await
        .map_err(|err| WaitError::Container {
            name: name.to_string(),
            what: "ports",
            source: Box::new(err),
        })?;

    if ports.is_empty() {
        return Ok(());
    }

    let host = container
        .host(ctx)
        .await
        .map_err(|err| WaitError::Container {
            name: name.to_string(),
            what: "ip",
            source: Box::new(err),
        })?;

    for (port, bindings) in &ports {
        for binding in bindings {
            set_env_var(env, name, port, "HOST", &host)?;
            set_env_var(env, name, port, "PORT", &binding.host_port)?;
        }
    }

    Ok(())
}

fn set_env_var(
    env: &dyn EnvSetter,
    container_name: &str,
    port: &Port,
    suffix: &str,
    value: &str,
) -> WaitResult<()> {
    let port_number = port.number.to_string();
    let name = env_var_name([container_name, port_number.as_str(), suffix]);

    env.set_var(&name, value)
        .map_err(|reason| WaitError::Env {
            name: name.clone(),
            reason,
        })?;

    debug!(var = %name, value = %value, "Exported container endpoint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTarget;
    use crate::target::{PortBinding, PortMap};

    struct FailingEnv;

    impl EnvSetter for FailingEnv {
        fn set_var(&self, _name: &str, _value: &str) -> Result<(), String> {
            Err("read-only environment".to_string())
        }
    }

    fn postgres_ports() -> PortMap {
        let mut ports = PortMap::new();
        ports.insert(
            Port::tcp(5432),
            vec![PortBinding::new("0.0.0.0", "49153")],
        );
        ports
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name(["postgres", "5432", "HOST"]), "POSTGRES_5432_HOST");
        assert_eq!(
            env_var_name(["my-app.db", "8080", "PORT"]),
            "MY_APP_DB_8080_PORT"
        );
        assert_eq!(env_var_name(["a--b__c", "1"]), "A_B_C_1");
    }

    #[tokio::test]
    async fn test_no_ports_sets_nothing() {
        let target = MockTarget::new().on_ports(Ok(PortMap::new()));
        let env = MemoryEnv::new();

        populate_host_port_env(&WaitContext::background(), &target, "postgres", &env)
            .await
            .unwrap();

        assert!(env.vars().is_empty());
        assert_eq!(target.calls("host"), 0);
        target.assert_expectations();
    }

    #[tokio::test]
    async fn test_sets_host_and_port() {
        let mut ports = postgres_ports();
        ports.insert(
            Port::udp(53),
            vec![
                PortBinding::new("0.0.0.0", "49154"),
                PortBinding::new("::", "49155"),
            ],
        );
        let target = MockTarget::new()
            .on_ports(Ok(ports))
            .on_host(Ok("127.0.0.1".to_string()));
        let env = MemoryEnv::new();

        populate_host_port_env(&WaitContext::background(), &target, "my-db", &env)
            .await
            .unwrap();

        assert_eq!(env.get("MY_DB_5432_HOST").as_deref(), Some("127.0.0.1"));
        assert_eq!(env.get("MY_DB_5432_PORT").as_deref(), Some("49153"));
        assert_eq!(env.get("MY_DB_53_HOST").as_deref(), Some("127.0.0.1"));
        // The last binding of a port wins.
        assert_eq!(env.get("MY_DB_53_PORT").as_deref(), Some("49155"));
        assert_eq!(env.vars().len(), 4);
        target.assert_expectations();
    }

    #[tokio::test]
    async fn test_ports_error_is_wrapped() {
        let target = MockTarget::new().on_ports(Err(WaitError::Target("no such container".into())));

        let err = populate_host_port_env(
            &WaitContext::background(),
            &target,
            "postgres",
            &MemoryEnv::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"could not get container "postgres" ports: no such container"#
        );
    }

    #[tokio::test]
    async fn test_host_error_is_wrapped() {
        let target = MockTarget::new()
            .on_ports(Ok(postgres_ports()))
            .on_host(Err(WaitError::Target("network gone".into())));

        let err = populate_host_port_env(
            &WaitContext::background(),
            &target,
            "postgres",
            &MemoryEnv::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"could not get container "postgres" ip: network gone"#
        );
    }

    #[tokio::test]
    async fn test_setter_error_is_wrapped() {
        let target = MockTarget::new()
            .on_ports(Ok(postgres_ports()))
            .on_host(Ok("localhost".to_string()));

        let err = populate_host_port_env(&WaitContext::background(), &target, "postgres", &FailingEnv)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"could not set env var "POSTGRES_5432_HOST": read-only environment"#
        );
    }

    #[test]
    fn test_process_env_rejects_invalid_names() {
        assert!(ProcessEnv.set_var("", "value").is_err());
        assert!(ProcessEnv.set_var("A=B", "value").is_err());
    }
}
