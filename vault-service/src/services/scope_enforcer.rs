//! Token scope evaluation.
//!
//! A pure decision function over (token, requested access). It never touches
//! the store and never consults the clock; liveness (expiry, revocation) is
//! checked separately by the token authority.

use crate::models::{AccessToken, TokenScope};

/// One requested secret access, already normalized.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub project_id: &'a str,
    pub environment: &'a str,
    pub folder: &'a str,
    pub scope: TokenScope,
}

/// Why a request was denied. Recorded in the audit trail; never returned to
/// the caller, who only sees a uniform 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deny {
    ProjectMismatch,
    EnvironmentMismatch,
    FolderMismatch,
    MissingScope,
}

impl Deny {
    pub fn as_str(&self) -> &'static str {
        match self {
            Deny::ProjectMismatch => "project_mismatch",
            Deny::EnvironmentMismatch => "environment_mismatch",
            Deny::FolderMismatch => "folder_mismatch",
            Deny::MissingScope => "missing_scope",
        }
    }
}

/// Evaluate a token against a requested access. Rules are checked in a fixed
/// order (project, environment, folder, scope) and the first failure wins.
/// An absent environment or folder restriction on the token matches anything
/// within its project.
pub fn check(token: &AccessToken, request: &AccessRequest<'_>) -> Result<(), Deny> {
    if token.project_id != request.project_id {
        return Err(Deny::ProjectMismatch);
    }

    if let Some(environment) = &token.environment {
        if !environment.eq_ignore_ascii_case(request.environment) {
            return Err(Deny::EnvironmentMismatch);
        }
    }

    if let Some(folder) = &token.folder {
        if !folder.eq_ignore_ascii_case(request.folder) {
            return Err(Deny::FolderMismatch);
        }
    }

    if !token.has_scope(request.scope) {
        return Err(Deny::MissingScope);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(
        environment: Option<&str>,
        folder: Option<&str>,
        scopes: Vec<TokenScope>,
    ) -> AccessToken {
        AccessToken::new(
            None,
            "kv_pat_test",
            "proj-1".to_string(),
            environment.map(String::from),
            folder.map(String::from),
            scopes,
            None,
        )
    }

    fn request<'a>(
        project_id: &'a str,
        environment: &'a str,
        folder: &'a str,
        scope: TokenScope,
    ) -> AccessRequest<'a> {
        AccessRequest {
            project_id,
            environment,
            folder,
            scope,
        }
    }

    #[test]
    fn test_fully_scoped_token_allows_matching_request() {
        let t = token(Some("production"), Some("api-keys"), vec![TokenScope::Read]);
        assert!(check(&t, &request("proj-1", "production", "api-keys", TokenScope::Read)).is_ok());
    }

    #[test]
    fn test_project_mismatch_wins_over_everything() {
        let t = token(Some("production"), Some("api-keys"), vec![TokenScope::Read]);
        assert_eq!(
            check(&t, &request("proj-2", "staging", "other", TokenScope::Write)),
            Err(Deny::ProjectMismatch)
        );
    }

    #[test]
    fn test_environment_mismatch() {
        let t = token(Some("production"), None, vec![TokenScope::Read]);
        assert_eq!(
            check(&t, &request("proj-1", "staging", "default", TokenScope::Read)),
            Err(Deny::EnvironmentMismatch)
        );
    }

    #[test]
    fn test_environment_comparison_is_case_insensitive() {
        let t = token(Some("Production"), None, vec![TokenScope::Read]);
        assert!(check(&t, &request("proj-1", "production", "default", TokenScope::Read)).is_ok());
    }

    #[test]
    fn test_folder_mismatch() {
        let t = token(None, Some("api-keys"), vec![TokenScope::Read]);
        assert_eq!(
            check(&t, &request("proj-1", "production", "default", TokenScope::Read)),
            Err(Deny::FolderMismatch)
        );
    }

    #[test]
    fn test_missing_scope_is_checked_last() {
        let t = token(Some("production"), Some("api-keys"), vec![TokenScope::Read]);
        assert_eq!(
            check(
                &t,
                &request("proj-1", "production", "api-keys", TokenScope::Write)
            ),
            Err(Deny::MissingScope)
        );
    }

    #[test]
    fn test_unrestricted_environment_and_folder_match_anything() {
        let t = token(None, None, vec![TokenScope::Read, TokenScope::Write]);
        for (env, folder) in [
            ("production", "default"),
            ("staging", "api-keys"),
            ("development", "certs"),
        ] {
            assert!(check(&t, &request("proj-1", env, folder, TokenScope::Write)).is_ok());
        }
    }

    #[test]
    fn test_write_scope_does_not_imply_read() {
        let t = token(None, None, vec![TokenScope::Write]);
        assert_eq!(
            check(&t, &request("proj-1", "production", "default", TokenScope::Read)),
            Err(Deny::MissingScope)
        );
    }
}
