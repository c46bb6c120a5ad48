//! Service account provisioning.

use nix::unistd::{Group, User};
use tracing::{debug, info};

use crate::error::{AgentError, AgentResult};
use crate::executor::{CommandRunner, CommandSpec};
use crate::services::ServiceAccount;

fn user_exists(name: &str) -> AgentResult<bool> {
    User::from_name(name)
        .map(|user| user.is_some())
        .map_err(|e| AgentError::Config {
            message: format!("Failed to look up user '{}': {}", name, e),
        })
}

fn group_exists(name: &str) -> AgentResult<bool> {
    Group::from_name(name)
        .map(|group| group.is_some())
        .map_err(|e| AgentError::Config {
            message: format!("Failed to look up group '{}': {}", name, e),
        })
}

/// Make sure the system group and user for `account` exist.
///
/// Returns the commands that were run; empty when both already existed.
pub fn ensure_account(
    runner: &dyn CommandRunner,
    account: &ServiceAccount,
) -> AgentResult<Vec<String>> {
    let mut issued = Vec::new();

    if !group_exists(&account.group)? {
        let groupadd = CommandSpec::new("groupadd").args(["--system", account.group.as_str()]);
        runner.run_checked(&groupadd)?;
        info!(group = %account.group, "System group created");
        issued.push(groupadd.display());
    }

    if user_exists(&account.user)? {
        debug!(user = %account.user, "Service user already exists");
        return Ok(issued);
    }

    let useradd = CommandSpec::new("useradd").args([
        "--system",
        "--no-create-home",
        "--shell",
        "/sbin/nologin",
        "--gid",
        account.group.as_str(),
        account.user.as_str(),
    ]);
    runner.run_checked(&useradd)?;
    info!(user = %account.user, group = %account.group, "Service user created");
    issued.push(useradd.display());

    Ok(issued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingRunner;
    use crate::executor::ExecResult;

    #[test]
    fn test_existing_account_runs_nothing() {
        let runner = RecordingRunner::new();
        let account = ServiceAccount {
            user: "root".to_string(),
            group: "root".to_string(),
        };
        assert!(ensure_account(&runner, &account).unwrap().is_empty());
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_missing_account_is_created() {
        let runner = RecordingRunner::new();
        let account = ServiceAccount {
            user: "mpack-missing-user".to_string(),
            group: "mpack-missing-group".to_string(),
        };
        let issued = ensure_account(&runner, &account).unwrap();
        assert_eq!(
            issued,
            vec![
                "groupadd --system mpack-missing-group".to_string(),
                "useradd --system --no-create-home --shell /sbin/nologin \
                 --gid mpack-missing-group mpack-missing-user"
                    .to_string(),
            ]
        );
        assert_eq!(runner.commands(), issued);
    }

    #[test]
    fn test_useradd_failure_is_execution_failure() {
        let runner = RecordingRunner::new().with(
            "useradd --system --no-create-home --shell /sbin/nologin --gid root mpack-missing-user",
            ExecResult::new(9, "", "useradd: user already exists"),
        );
        let account = ServiceAccount {
            user: "mpack-missing-user".to_string(),
            group: "root".to_string(),
        };
        match ensure_account(&runner, &account) {
            Err(AgentError::ExecutionFailed {
                return_code, stderr, ..
            }) => {
                assert_eq!(return_code, 9);
                assert!(stderr.contains("already exists"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
