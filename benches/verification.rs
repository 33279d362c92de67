//! Criterion benchmarks for the token verification hot path.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use acp::{
    AgentIdentity, CapabilityToken, DelegationPolicy, InMemoryNonceStore, TokenIssuer,
    VerificationContext, Verifier, compute_token_hash, delegation, risk,
};

fn issue_root(issuer: &TokenIssuer, subject: &AgentIdentity, depth: u32) -> CapabilityToken {
    issuer
        .issue(
            CapabilityToken::builder()
                .subject(subject.agent_id())
                .add_capability("acp:cap:financial.payment")
                .resource("org.bank/accounts")
                .constraint("max_amount_usd", 5000)
                .delegation(DelegationPolicy::allowed(depth)),
        )
        .unwrap()
}

/// Benchmark: full verification without and with a nonce store
fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");

    let bank = AgentIdentity::generate();
    let agent = AgentIdentity::generate();
    let issuer = TokenIssuer::new(bank.clone());
    let raw = issue_root(&issuer, &agent, 0).to_json().unwrap();
    let key = bank.verifying_key();
    let verifier = Verifier::new();

    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("stateless", |b| {
        let ctx = VerificationContext::new()
            .capability("acp:cap:financial.payment")
            .resource("org.bank/accounts/ACC-001");
        b.iter(|| verifier.verify(black_box(raw.as_bytes()), &key, &ctx));
    });

    // Fresh token per iteration so the nonce store never reports a replay.
    group.bench_function("with_nonce_store", |b| {
        let nonces = InMemoryNonceStore::new();
        let ctx = VerificationContext::new().nonce_store(&nonces);
        b.iter_batched(
            || issue_root(&issuer, &agent, 0).to_json().unwrap(),
            |raw| verifier.verify(raw.as_bytes(), &key, &ctx),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Benchmark: token hashing (JCS + SHA-256)
fn bench_hash(c: &mut Criterion) {
    let bank = AgentIdentity::generate();
    let token = issue_root(&TokenIssuer::new(bank), &AgentIdentity::generate(), 0);

    c.bench_function("compute_token_hash", |b| {
        b.iter(|| compute_token_hash(black_box(&token)));
    });
}

/// Benchmark: relational validation with increasing chain length
fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("delegation_validate");

    for hops in [1usize, 4, 8] {
        let mut holder = AgentIdentity::generate();
        let root = issue_root(
            &TokenIssuer::new(AgentIdentity::generate()),
            &holder,
            u32::try_from(hops).unwrap(),
        );
        let mut chain = vec![root];
        for _ in 0..hops {
            let next = AgentIdentity::generate();
            let child = TokenIssuer::new(holder)
                .delegate(
                    chain.last().unwrap(),
                    CapabilityToken::builder().subject(next.agent_id()),
                )
                .unwrap();
            chain.push(child);
            holder = next;
        }

        group.bench_with_input(BenchmarkId::new("hops", hops), &chain, |b, chain| {
            b.iter(|| delegation::validate(black_box(chain)));
        });
    }

    group.finish();
}

/// Benchmark: risk scoring
fn bench_risk(c: &mut Criterion) {
    c.bench_function("risk_assess", |b| {
        b.iter(|| {
            risk::assess(
                black_box("acp:cap:financial.payment"),
                black_box("org.bank/accounts/ACC-001"),
                black_box(Some(150_000.0)),
            )
        });
    });
}

criterion_group!(benches, bench_verify, bench_hash, bench_chain, bench_risk);
criterion_main!(benches);
