//! UFW control-plane adapter.
//!
//! [`UfwBackend`] abstracts the three operations the reconciler needs:
//! apply a rule, list the rule numbers a container owns, delete a rule by
//! number. [`UfwCli`] is the production backend shelling out to the `ufw`
//! binary; tests use [`MockUfwBackend`] with an in-memory rule table.
//!
//! Every invocation runs under a bounded timeout so a wedged `ufw` (its
//! internal lock is not reentrant) cannot stall event processing forever.

use std::future::Future;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use ufwguard_core::error::ControlPlaneError;
use ufwguard_core::types::{OwnerTag, RuleKind, RuleOp};

/// Firewall control-plane operations used by the reconciler.
pub trait UfwBackend: Send + Sync + 'static {
    /// Applies a single rule. Atomic per op: applied fully or not at all.
    fn apply(&self, op: &RuleOp) -> impl Future<Output = Result<(), ControlPlaneError>> + Send;

    /// Lists the current numbers of all rules owned by `owner`, in table
    /// order. Numbers are only valid until the next mutation.
    fn owned_rule_numbers(
        &self,
        owner: &OwnerTag,
    ) -> impl Future<Output = Result<Vec<u32>, ControlPlaneError>> + Send;

    /// Deletes one rule by its current number.
    fn delete_rule(
        &self,
        number: u32,
    ) -> impl Future<Output = Result<(), ControlPlaneError>> + Send;
}

/// Production backend invoking the `ufw` command line.
#[derive(Debug, Clone)]
pub struct UfwCli {
    use_sudo: bool,
    timeout: Duration,
}

impl UfwCli {
    /// Creates a CLI backend.
    pub fn new(use_sudo: bool, command_timeout_secs: u64) -> Self {
        Self {
            use_sudo,
            timeout: Duration::from_secs(command_timeout_secs),
        }
    }

    async fn run(&self, args: &[String]) -> Result<String, ControlPlaneError> {
        let mut cmd = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("ufw");
            c
        } else {
            Command::new("ufw")
        };
        cmd.args(args);
        cmd.kill_on_drop(true);

        debug!(args = ?args, "invoking ufw");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ControlPlaneError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ControlPlaneError::QueryFailed {
                reason: format!("failed to spawn ufw: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(ControlPlaneError::QueryFailed {
                reason: format!("ufw exited with {}: {stderr}", output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl UfwBackend for UfwCli {
    async fn apply(&self, op: &RuleOp) -> Result<(), ControlPlaneError> {
        let args = command_args(op);
        self.run(&args).await.map_err(|e| match e {
            ControlPlaneError::Timeout { secs } => ControlPlaneError::Timeout { secs },
            other => ControlPlaneError::ApplyFailed {
                rule: op.to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(())
    }

    async fn owned_rule_numbers(
        &self,
        owner: &OwnerTag,
    ) -> Result<Vec<u32>, ControlPlaneError> {
        let output = self
            .run(&["status".to_owned(), "numbered".to_owned()])
            .await?;
        Ok(parse_owned_rule_numbers(&output, owner))
    }

    async fn delete_rule(&self, number: u32) -> Result<(), ControlPlaneError> {
        // --force suppresses the interactive confirmation prompt.
        let args = vec!["--force".to_owned(), "delete".to_owned(), number.to_string()];
        self.run(&args).await.map_err(|e| match e {
            ControlPlaneError::Timeout { secs } => ControlPlaneError::Timeout { secs },
            other => ControlPlaneError::DeleteFailed {
                number,
                reason: other.to_string(),
            },
        })?;
        Ok(())
    }
}

/// Renders a [`RuleOp`] as `ufw` command-line arguments.
///
/// All rules are routed (`route` keyword) because container traffic is
/// forwarded, not addressed to the host. The owner tag rides along as the
/// rule comment so teardown can find the rule later.
pub fn command_args(op: &RuleOp) -> Vec<String> {
    let verb = match op.kind {
        RuleKind::DenyOutAll => "deny",
        _ => "allow",
    };
    let mut args = vec!["route".to_owned(), verb.to_owned()];
    if let Some(proto) = op.proto {
        args.push("proto".to_owned());
        args.push(proto.to_string());
    }
    args.push("from".to_owned());
    args.push(op.from.to_string());
    if let Some(port) = op.from_port {
        args.push("port".to_owned());
        args.push(port.to_string());
    }
    args.push("to".to_owned());
    args.push(op.to.to_string());
    if let Some(port) = op.to_port {
        args.push("port".to_owned());
        args.push(port.to_string());
    }
    args.push("comment".to_owned());
    args.push(op.owner.to_string());
    args
}

/// Extracts from `ufw status numbered` output the numbers of rules whose
/// comment equals the owner tag, in table order.
pub fn parse_owned_rule_numbers(output: &str, owner: &OwnerTag) -> Vec<u32> {
    let tag = owner.to_string();
    let mut numbers = Vec::new();
    for line in output.lines() {
        let Some(rest) = line.trim_start().strip_prefix('[') else {
            continue;
        };
        let Some((number, rest)) = rest.split_once(']') else {
            continue;
        };
        let Ok(number) = number.trim().parse::<u32>() else {
            continue;
        };
        // UFW renders the rule comment after a '#'.
        let Some((_, comment)) = rest.split_once('#') else {
            continue;
        };
        if comment.trim() == tag {
            numbers.push(number);
        }
    }
    numbers
}

/// In-memory backend with a numbered rule table that renumbers on delete,
/// mirroring UFW's live renumbering.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockUfwBackend {
    rules: std::sync::Mutex<Vec<RuleOp>>,
    fail_applies: std::sync::atomic::AtomicBool,
    fail_deletes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockUfwBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `apply` fail.
    pub fn fail_applies(&self, fail: bool) {
        self.fail_applies
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes every subsequent `delete_rule` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Snapshot of the current rule table.
    pub fn rules(&self) -> Vec<RuleOp> {
        self.rules.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl UfwBackend for MockUfwBackend {
    async fn apply(&self, op: &RuleOp) -> Result<(), ControlPlaneError> {
        if self.fail_applies.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ControlPlaneError::ApplyFailed {
                rule: op.to_string(),
                reason: "injected failure".to_owned(),
            });
        }
        self.rules.lock().unwrap().push(op.clone());
        Ok(())
    }

    async fn owned_rule_numbers(
        &self,
        owner: &OwnerTag,
    ) -> Result<Vec<u32>, ControlPlaneError> {
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .iter()
            .enumerate()
            .filter(|(_, op)| &op.owner == owner)
            .map(|(i, _)| (i + 1) as u32)
            .collect())
    }

    async fn delete_rule(&self, number: u32) -> Result<(), ControlPlaneError> {
        if self.fail_deletes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ControlPlaneError::DeleteFailed {
                number,
                reason: "injected failure".to_owned(),
            });
        }
        let mut rules = self.rules.lock().unwrap();
        let index = (number as usize).saturating_sub(1);
        if index >= rules.len() {
            return Err(ControlPlaneError::DeleteFailed {
                number,
                reason: "no such rule".to_owned(),
            });
        }
        rules.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use ufwguard_core::types::{Net, Protocol};

    fn addr() -> IpAddr {
        "172.17.0.2".parse().unwrap()
    }

    fn owner() -> OwnerTag {
        OwnerTag::new("web", "abc123def456")
    }

    #[test]
    fn allow_in_command_line() {
        let op = RuleOp::allow_in(Protocol::Tcp, Net::Any, addr(), 80, owner());
        assert_eq!(
            command_args(&op).join(" "),
            "route allow proto tcp from any to 172.17.0.2 port 80 comment web:abc123def456"
        );
    }

    #[test]
    fn allow_reply_command_line() {
        let op = RuleOp::allow_reply(
            Protocol::Tcp,
            addr(),
            8080,
            Net::Subnet("10.0.0.0/24".parse().unwrap()),
            owner(),
        );
        assert_eq!(
            command_args(&op).join(" "),
            "route allow proto tcp from 172.17.0.2 port 8080 to 10.0.0.0/24 comment web:abc123def456"
        );
    }

    #[test]
    fn allow_out_command_line_full_and_bare() {
        let full = RuleOp::allow_out(
            Some(Protocol::Tcp),
            addr(),
            Net::Subnet("10.5.0.0/16".parse().unwrap()),
            Some(443),
            owner(),
        );
        assert_eq!(
            command_args(&full).join(" "),
            "route allow proto tcp from 172.17.0.2 to 10.5.0.0/16 port 443 comment web:abc123def456"
        );

        let bare = RuleOp::allow_out(
            None,
            addr(),
            Net::Host("192.168.0.1".parse().unwrap()),
            None,
            owner(),
        );
        assert_eq!(
            command_args(&bare).join(" "),
            "route allow from 172.17.0.2 to 192.168.0.1 comment web:abc123def456"
        );
    }

    #[test]
    fn deny_out_all_command_line() {
        let op = RuleOp::deny_out_all(addr(), owner());
        assert_eq!(
            command_args(&op).join(" "),
            "route deny from 172.17.0.2 to any comment web:abc123def456"
        );
    }

    #[test]
    fn parse_status_numbered_matches_exact_comment() {
        let output = "\
Status: active

     To                         Action      From
     --                         ------      ----
[ 1] 172.17.0.2 80/tcp          ALLOW FWD   Anywhere                   # web:abc123def456
[ 2] 172.17.0.3 80/tcp          ALLOW FWD   Anywhere                   # web2:abc123def456
[ 3] Anywhere                   DENY FWD    172.17.0.2                 # web:abc123def456
[ 4] 22/tcp                     ALLOW IN    Anywhere
";
        let numbers = parse_owned_rule_numbers(output, &owner());
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn parse_status_numbered_no_matches() {
        let output = "Status: active\n\n[ 1] 22/tcp  ALLOW IN  Anywhere\n";
        assert!(parse_owned_rule_numbers(output, &owner()).is_empty());
    }

    #[test]
    fn parse_status_numbered_prefix_tag_does_not_match() {
        // "web:abc123def456" must not match "web:abc123def456 extra".
        let output = "[ 1] x ALLOW FWD y # web:abc123def456 extra\n";
        assert!(parse_owned_rule_numbers(output, &owner()).is_empty());
    }

    #[tokio::test]
    async fn mock_backend_renumbers_on_delete() {
        let backend = MockUfwBackend::new();
        let other = OwnerTag::new("db", "fff123def456");
        backend
            .apply(&RuleOp::allow_in(Protocol::Tcp, Net::Any, addr(), 80, owner()))
            .await
            .unwrap();
        backend
            .apply(&RuleOp::allow_in(Protocol::Tcp, Net::Any, addr(), 81, other.clone()))
            .await
            .unwrap();
        backend
            .apply(&RuleOp::deny_out_all(addr(), owner()))
            .await
            .unwrap();

        assert_eq!(backend.owned_rule_numbers(&owner()).await.unwrap(), vec![1, 3]);

        backend.delete_rule(1).await.unwrap();
        // The second owned rule slid from 3 to 2.
        assert_eq!(backend.owned_rule_numbers(&owner()).await.unwrap(), vec![2]);
        assert_eq!(backend.owned_rule_numbers(&other).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn mock_backend_delete_out_of_range_fails() {
        let backend = MockUfwBackend::new();
        let result = backend.delete_rule(5).await;
        assert!(matches!(
            result,
            Err(ControlPlaneError::DeleteFailed { number: 5, .. })
        ));
    }
}
