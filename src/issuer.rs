//! Token issuer for minting root and delegated capability tokens.

use std::time::Duration;

use crate::constants::DEFAULT_TOKEN_TTL_SECS;
use crate::error::{DelegationError, TokenError};
use crate::identity::{AgentId, AgentIdentity};
use crate::keys::VerifyingKey;
use crate::token::{CapabilityToken, DelegationPolicy, TokenBuilder, compute_token_hash};
use crate::verification::resource_covers;

/// Mints signed capability tokens.
///
/// The issuer's `AgentID` becomes the `iss` of every token it signs. An
/// institution issues root tokens with [`TokenIssuer::issue`]; an agent
/// holding a delegable token mints narrower children for sub-agents with
/// [`TokenIssuer::delegate`].
///
/// # Example
///
/// ```
/// use acp::{AgentIdentity, CapabilityToken, DelegationPolicy, TokenIssuer};
///
/// let institution = TokenIssuer::new(AgentIdentity::generate());
/// let agent = AgentIdentity::generate();
/// let sub_agent = AgentIdentity::generate();
///
/// let root = institution
///     .issue(
///         CapabilityToken::builder()
///             .subject(agent.agent_id())
///             .add_capability("acp:cap:financial.payment")
///             .resource("org.bank/accounts")
///             .delegation(DelegationPolicy::allowed(2)),
///     )
///     .unwrap();
///
/// let child = TokenIssuer::new(agent)
///     .delegate(
///         &root,
///         CapabilityToken::builder()
///             .subject(sub_agent.agent_id())
///             .resource("org.bank/accounts/ACC-001"),
///     )
///     .unwrap();
///
/// assert_eq!(child.deleg.max_depth, 1);
/// assert!(child.exp <= root.exp);
/// ```
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    identity: AgentIdentity,
    default_ttl: Duration,
}

impl TokenIssuer {
    /// Creates an issuer with a one-hour default TTL.
    #[must_use]
    pub fn new(identity: AgentIdentity) -> Self {
        Self::with_ttl(identity, Duration::from_secs(DEFAULT_TOKEN_TTL_SECS))
    }

    /// Creates an issuer with a custom default TTL.
    #[must_use]
    pub fn with_ttl(identity: AgentIdentity, default_ttl: Duration) -> Self {
        Self {
            identity,
            default_ttl,
        }
    }

    /// Returns the issuer's `AgentID`.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        self.identity.agent_id()
    }

    /// Returns the key verifiers need to accept this issuer's tokens.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.identity.verifying_key()
    }

    /// Returns the default TTL for issued tokens.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// A builder preloaded with this issuer's identity and default TTL.
    #[must_use]
    pub fn builder(&self) -> TokenBuilder {
        CapabilityToken::builder()
            .issuer(self.identity.agent_id())
            .ttl(self.default_ttl)
    }

    /// Signs a root token.
    ///
    /// The builder's issuer is always overwritten with this issuer's
    /// `AgentID`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the builder is incomplete or signing fails.
    pub fn issue(&self, builder: TokenBuilder) -> Result<CapabilityToken, TokenError> {
        let mut token = builder.issuer(self.identity.agent_id()).build()?;
        token.sign_with(self.identity.signing_key())?;
        tracing::debug!(
            iss = %token.iss,
            sub = %token.sub,
            res = %token.res,
            "issued capability token"
        );
        Ok(token)
    }

    /// Signs a child token that narrows `parent`.
    ///
    /// Capabilities and resource default to the parent's when the builder
    /// leaves them unset. The child's `parent_hash`, delegation depth and
    /// expiration ceiling are derived from the parent and override whatever
    /// the builder carries.
    ///
    /// # Errors
    ///
    /// - `DelegationNotAllowed` if the parent forbids re-delegation
    /// - `CapabilityEscalation` if a requested capability is not in the parent
    /// - `ResourceEscalation` if the requested resource is outside the parent
    /// - `Token` if the builder is incomplete or signing fails
    pub fn delegate(
        &self,
        parent: &CapabilityToken,
        builder: TokenBuilder,
    ) -> Result<CapabilityToken, DelegationError> {
        if !parent.deleg.allowed || parent.deleg.max_depth == 0 {
            return Err(DelegationError::DelegationNotAllowed { link: 1 });
        }

        let mut builder = builder;
        if builder.requested_capabilities().is_empty() {
            builder = builder.capabilities(parent.cap.clone());
        }
        if let Some(capability) = builder
            .requested_capabilities()
            .iter()
            .find(|c| !parent.has_capability(c))
        {
            return Err(DelegationError::CapabilityEscalation {
                link: 1,
                capability: capability.clone(),
            });
        }

        let resource = builder
            .requested_resource()
            .unwrap_or(&parent.res)
            .to_string();
        if !resource_covers(&parent.res, &resource) {
            return Err(DelegationError::ResourceEscalation {
                link: 1,
                child: resource,
                parent: parent.res.clone(),
            });
        }

        let depth = parent.deleg.max_depth - 1;
        let policy = DelegationPolicy {
            allowed: depth > 0,
            max_depth: depth,
        };

        let mut child = builder
            .resource(resource)
            .issuer(self.identity.agent_id())
            .delegation(policy)
            .parent_hash(compute_token_hash(parent)?)
            .build()?;
        child.exp = child.exp.min(parent.exp);
        child.sign_with(self.identity.signing_key())?;

        tracing::debug!(
            iss = %child.iss,
            sub = %child.sub,
            depth = child.deleg.max_depth,
            "delegated capability token"
        );
        Ok(child)
    }
}
