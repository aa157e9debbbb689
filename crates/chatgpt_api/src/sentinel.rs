//! Sentinel chat-requirements negotiation.
//!
//! The sentinel endpoint issues a short-lived requirements token that the
//! conversation endpoint demands, and may additionally flag a
//! proof-of-work challenge. Both tokens are single-use; nothing is
//! tracked locally beyond one request.

use serde::Deserialize;

use crate::error::ApiError;
use crate::pow;

/// Proof-of-work challenge descriptor embedded in the sentinel response.
/// Consumed exactly once by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChallengeSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub difficulty: String,
}

/// Outcome of a sentinel negotiation.
///
/// `proof_token` stays `None` either when no challenge was required or
/// when the solver exhausted its ceiling; the latter is logged and the
/// request proceeds, since some accounts accept a bare requirements
/// token. A downstream 403 is then the expected rejection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    pub token: String,
    /// Diagnostic only; never attached to requests.
    pub persona: Option<String>,
    pub challenge: Option<ChallengeSpec>,
    pub proof_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequirementsBody {
    token: Option<String>,
    persona: Option<String>,
    #[serde(rename = "proofofwork")]
    proof_of_work: Option<ChallengeSpec>,
}

/// Parse a 200 sentinel body into negotiated requirements (no proof yet).
pub fn requirements_from_body(body: &str) -> Result<Requirements, ApiError> {
    let parsed = serde_json::from_str::<RequirementsBody>(body)?;
    let token = parsed
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or(ApiError::MissingSentinelToken)?;

    Ok(Requirements {
        token,
        persona: parsed.persona,
        challenge: parsed.proof_of_work,
        proof_token: None,
    })
}

/// Solve the challenge when one is required, using the supplied solver.
///
/// The solver runs only for `required` challenges; an unsolved challenge
/// is recorded (proof stays `None`), never fatal.
pub fn attach_proof_with(
    mut requirements: Requirements,
    solver: impl FnOnce(&ChallengeSpec) -> Option<String>,
) -> Requirements {
    let needs_proof = requirements
        .challenge
        .as_ref()
        .is_some_and(|challenge| challenge.required);
    if !needs_proof {
        return requirements;
    }

    let challenge = requirements
        .challenge
        .clone()
        .unwrap_or(ChallengeSpec {
            required: true,
            seed: String::new(),
            difficulty: String::new(),
        });
    requirements.proof_token = solver(&challenge);
    if requirements.proof_token.is_none() {
        log::warn!(
            "pow: challenge unsolved (difficulty {}); proceeding without proof token",
            challenge.difficulty
        );
    }
    requirements
}

/// [`attach_proof_with`] wired to the real SHA3-512 solver.
#[must_use]
pub fn attach_proof(
    requirements: Requirements,
    user_agent: &str,
    max_iterations: u32,
) -> Requirements {
    attach_proof_with(requirements, |challenge| {
        log::debug!(
            "pow: solving challenge (seed {}.., difficulty {})",
            &challenge.seed.chars().take(16).collect::<String>(),
            challenge.difficulty
        );
        pow::solve(
            &challenge.seed,
            &challenge.difficulty,
            user_agent,
            max_iterations,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{attach_proof_with, requirements_from_body, ChallengeSpec, Requirements};
    use crate::error::ApiError;

    fn requirements(challenge: Option<ChallengeSpec>) -> Requirements {
        Requirements {
            token: "req-token".into(),
            persona: Some("chatgpt-paid".into()),
            challenge,
            proof_token: None,
        }
    }

    #[test]
    fn parses_token_persona_and_challenge() {
        let parsed = requirements_from_body(
            r#"{"token":"abc","persona":"chatgpt-freeaccount","proofofwork":{"required":true,"seed":"0.42","difficulty":"073bcd"}}"#,
        )
        .expect("sentinel body should parse");

        assert_eq!(parsed.token, "abc");
        assert_eq!(parsed.persona.as_deref(), Some("chatgpt-freeaccount"));
        let challenge = parsed.challenge.expect("challenge should be present");
        assert!(challenge.required);
        assert_eq!(challenge.seed, "0.42");
        assert_eq!(challenge.difficulty, "073bcd");
        assert_eq!(parsed.proof_token, None);
    }

    #[test]
    fn passthrough_accounts_have_no_challenge() {
        let parsed = requirements_from_body(r#"{"token":"abc","persona":"chatgpt-paid"}"#)
            .expect("sentinel body should parse");
        assert_eq!(parsed.challenge, None);
    }

    #[test]
    fn missing_token_is_a_typed_failure() {
        let error = requirements_from_body(r#"{"persona":"x"}"#).expect_err("must fail");
        assert!(matches!(error, ApiError::MissingSentinelToken));
    }

    #[test]
    fn solver_is_never_invoked_without_a_required_challenge() {
        let unattached = attach_proof_with(requirements(None), |_| {
            panic!("solver must not run when no challenge is present")
        });
        assert_eq!(unattached.proof_token, None);

        let optional = attach_proof_with(
            requirements(Some(ChallengeSpec {
                required: false,
                seed: "s".into(),
                difficulty: "ff".into(),
            })),
            |_| panic!("solver must not run for required=false"),
        );
        assert_eq!(optional.proof_token, None);
    }

    #[test]
    fn solved_challenge_attaches_proof() {
        let attached = attach_proof_with(
            requirements(Some(ChallengeSpec {
                required: true,
                seed: "s".into(),
                difficulty: "ff".into(),
            })),
            |challenge| {
                assert_eq!(challenge.seed, "s");
                Some("gAAAAABproof".into())
            },
        );
        assert_eq!(attached.proof_token.as_deref(), Some("gAAAAABproof"));
    }

    #[test]
    fn unsolved_challenge_keeps_token_without_proof() {
        let attached = attach_proof_with(
            requirements(Some(ChallengeSpec {
                required: true,
                seed: "s".into(),
                difficulty: "00".into(),
            })),
            |_| None,
        );
        assert_eq!(attached.token, "req-token");
        assert_eq!(attached.proof_token, None);
    }
}
