//! Delegation chain validation.
//!
//! A chain is an ordered root-to-leaf sequence of tokens in which each
//! child narrows its parent. [`validate`] enforces the relational rules
//! between consecutive tokens only; [`verify_chain`] additionally runs the
//! full per-token verification of every member against its own issuer's
//! key.

use std::ops::Deref;

use crate::constants::{MAX_CHAIN_LENGTH, MAX_DELEGATION_DEPTH};
use crate::error::{DelegationError, TokenError};
use crate::identity::AgentId;
use crate::registry::KeyRegistry;
use crate::token::{CapabilityToken, compute_raw_token_hash, compute_token_hash};
use crate::verification::resource_covers;
use crate::verifier::{VerificationContext, Verifier};

/// A delegation chain that has passed relational validation.
///
/// # Example
///
/// ```
/// use acp::{AgentIdentity, CapabilityToken, DelegationChain, DelegationPolicy, TokenIssuer};
///
/// let bank = TokenIssuer::new(AgentIdentity::generate());
/// let agent = AgentIdentity::generate();
///
/// let root = bank
///     .issue(
///         CapabilityToken::builder()
///             .subject(agent.agent_id())
///             .add_capability("acp:cap:financial.payment")
///             .resource("org.bank/accounts")
///             .delegation(DelegationPolicy::allowed(1)),
///     )
///     .unwrap();
/// let child = TokenIssuer::new(agent.clone())
///     .delegate(&root, CapabilityToken::builder().subject(agent.agent_id()))
///     .unwrap();
///
/// let chain = DelegationChain::new(vec![root, child]).unwrap();
/// assert_eq!(chain.len(), 2);
/// assert_eq!(chain.leaf().deleg.max_depth, 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationChain(Vec<CapabilityToken>);

impl DelegationChain {
    /// Validates `tokens` and wraps them.
    ///
    /// # Errors
    ///
    /// Returns the first relational violation found.
    pub fn new(tokens: Vec<CapabilityToken>) -> Result<Self, DelegationError> {
        validate(&tokens)?;
        Ok(Self(tokens))
    }

    /// The token minted by the institution.
    #[must_use]
    pub fn root(&self) -> &CapabilityToken {
        // Non-empty by construction.
        &self.0[0]
    }

    /// The token presented by the acting agent.
    #[must_use]
    pub fn leaf(&self) -> &CapabilityToken {
        &self.0[self.0.len() - 1]
    }

    /// Number of delegation hops below the root.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    /// Unwraps the validated tokens.
    #[must_use]
    pub fn into_inner(self) -> Vec<CapabilityToken> {
        self.0
    }
}

impl Deref for DelegationChain {
    type Target = [CapabilityToken];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for DelegationChain {
    type Item = CapabilityToken;
    type IntoIter = std::vec::IntoIter<CapabilityToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Validates the relational constraints of a root-to-leaf chain.
///
/// Signatures are not checked here. Parent hashes are recomputed from the
/// typed tokens, which is exact for tokens minted by this crate; chains
/// received as JSON go through [`validate_chain_json`] instead.
///
/// # Errors
///
/// - `EmptyChain` / `ChainTooLong` / `RootHasParentHash` for the chain shape
/// - a link-indexed variant for the first offending parent/child pair
pub fn validate(chain: &[CapabilityToken]) -> Result<(), DelegationError> {
    validate_with(chain, |index| compute_token_hash(&chain[index]))
}

/// Relational checks with the hash of member `index` supplied by the caller.
fn validate_with<F>(chain: &[CapabilityToken], mut member_hash: F) -> Result<(), DelegationError>
where
    F: FnMut(usize) -> Result<String, TokenError>,
{
    let root = chain.first().ok_or(DelegationError::EmptyChain)?;
    if chain.len() > MAX_CHAIN_LENGTH {
        return Err(DelegationError::ChainTooLong {
            len: chain.len(),
            max: MAX_CHAIN_LENGTH,
        });
    }
    if root.parent_hash.is_some() {
        return Err(DelegationError::RootHasParentHash);
    }

    for (index, pair) in chain.windows(2).enumerate() {
        validate_link(&pair[0], &pair[1], index + 1, || member_hash(index))?;
    }
    Ok(())
}

fn validate_link(
    parent: &CapabilityToken,
    child: &CapabilityToken,
    link: usize,
    parent_hash: impl FnOnce() -> Result<String, TokenError>,
) -> Result<(), DelegationError> {
    if !parent.deleg.allowed {
        return Err(DelegationError::DelegationNotAllowed { link });
    }

    if let Some(capability) = child.cap.iter().find(|c| !parent.has_capability(c)) {
        return Err(DelegationError::CapabilityEscalation {
            link,
            capability: capability.clone(),
        });
    }

    if !resource_covers(&parent.res, &child.res) {
        return Err(DelegationError::ResourceEscalation {
            link,
            child: child.res.clone(),
            parent: parent.res.clone(),
        });
    }

    if child.exp > parent.exp {
        return Err(DelegationError::ExpirationExtension {
            link,
            child_exp: child.exp,
            parent_exp: parent.exp,
        });
    }

    let expected = i64::from(parent.deleg.max_depth) - 1;
    if i64::from(child.deleg.max_depth) != expected {
        return Err(DelegationError::DepthViolation {
            link,
            expected,
            actual: child.deleg.max_depth,
        });
    }
    if child.deleg.max_depth > MAX_DELEGATION_DEPTH {
        return Err(DelegationError::AbsoluteDepthExceeded {
            link,
            max_depth: child.deleg.max_depth,
        });
    }

    let claimed = child
        .parent_hash
        .as_deref()
        .ok_or(DelegationError::MissingParentHash { link })?;
    if claimed != parent_hash()? {
        return Err(DelegationError::ParentHashMismatch { link });
    }

    Ok(())
}

/// Parses each raw token and validates the resulting chain.
///
/// Each `parent_hash` is compared against the hash of the parent's bytes
/// as received, so members written by other implementations (explicit
/// `null` members, fields this crate does not model) link correctly.
///
/// # Errors
///
/// Returns `MemberRejected` for a token that does not parse, otherwise as
/// [`validate`].
pub fn validate_chain_json(raws: &[&[u8]]) -> Result<DelegationChain, DelegationError> {
    let tokens = raws
        .iter()
        .enumerate()
        .map(|(link, raw)| {
            CapabilityToken::from_json(raw)
                .map_err(|source| DelegationError::MemberRejected { link, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_with(&tokens, |index| compute_raw_token_hash(raws[index]))?;
    Ok(DelegationChain(tokens))
}

/// Fully verifies a presented chain.
///
/// Every member is verified against the key registered for its own `iss`.
/// The requested capability, requested resource and nonce store in `ctx`
/// apply to the leaf only; revocation applies to every member. Members
/// are checked root first so the leaf nonce is spent only once the rest of
/// the chain is known to be sound.
///
/// # Errors
///
/// Returns `MemberRejected` for the first member failing verification,
/// otherwise as [`validate`].
pub fn verify_chain(
    raws: &[&[u8]],
    keys: &dyn KeyRegistry,
    ctx: &VerificationContext<'_>,
) -> Result<DelegationChain, DelegationError> {
    verify_chain_with(&Verifier::new(), raws, keys, ctx)
}

/// [`verify_chain`] with a caller-configured [`Verifier`].
///
/// # Errors
///
/// As [`verify_chain`].
pub fn verify_chain_with(
    verifier: &Verifier,
    raws: &[&[u8]],
    keys: &dyn KeyRegistry,
    ctx: &VerificationContext<'_>,
) -> Result<DelegationChain, DelegationError> {
    let Some(leaf_index) = raws.len().checked_sub(1) else {
        return Err(DelegationError::EmptyChain);
    };
    if raws.len() > MAX_CHAIN_LENGTH {
        return Err(DelegationError::ChainTooLong {
            len: raws.len(),
            max: MAX_CHAIN_LENGTH,
        });
    }

    // Relational checks first: they are pure and must not spend the nonce.
    let parsed = validate_chain_json(raws)?;
    let member_ctx = ctx.without_request();

    let mut verified = Vec::with_capacity(raws.len());
    for (link, (raw, token)) in raws.iter().zip(parsed.iter()).enumerate() {
        let reject = |source| DelegationError::MemberRejected { link, source };
        let issuer = AgentId::parse(&token.iss).map_err(reject)?;
        let key = keys.lookup_public_key(&issuer).map_err(reject)?;
        let member = if link == leaf_index { ctx } else { &member_ctx };
        verified.push(verifier.verify(raw, &key, member).map_err(reject)?);
    }

    tracing::trace!(hops = leaf_index, "delegation chain verified");
    Ok(DelegationChain(verified))
}
