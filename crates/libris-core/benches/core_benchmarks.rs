//! Performance benchmarks for libris-core.
//!
//! Run with: cargo bench -p libris-core

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use libris_core::access::{AccessControl, Permission, Role};
use libris_core::token::{Claims, SigningKey, TokenService};

/// Benchmark token issuing.
fn bench_token_issue(c: &mut Criterion) {
    let service = TokenService::new(
        &SigningKey::from_secret("benchmark-secret-key"),
        Duration::from_secs(1800),
    );

    c.bench_function("token_issue", |b| {
        b.iter(|| {
            let claims = Claims::for_user("bench-user", "reader", Some(7));
            service
                .issue(black_box(claims), Duration::from_secs(1800))
                .unwrap()
        });
    });
}

/// Benchmark token verification, valid and tampered.
fn bench_token_verify(c: &mut Criterion) {
    let service = TokenService::new(
        &SigningKey::from_secret("benchmark-secret-key"),
        Duration::from_secs(1800),
    );
    let token = service
        .issue(
            Claims::for_user("bench-user", "librarian", Some(7)),
            Duration::from_secs(1800),
        )
        .unwrap();
    let mut tampered = token.clone();
    tampered.pop();
    tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

    let mut group = c.benchmark_group("token_verify");
    group.bench_function("valid", |b| {
        b.iter(|| service.verify(black_box(&token)).unwrap());
    });
    group.bench_function("tampered", |b| {
        b.iter(|| service.verify(black_box(&tampered)).unwrap_err());
    });
    group.finish();
}

/// Benchmark permission lookups for each role.
fn bench_permission_checks(c: &mut Criterion) {
    let access = AccessControl::standard();
    let mut group = c.benchmark_group("permission_check");

    for role in Role::ALL {
        group.bench_with_input(BenchmarkId::new("role", role), &role, |b, &role| {
            b.iter(|| {
                Permission::ALL
                    .iter()
                    .filter(|p| access.has_permission(black_box(role), **p))
                    .count()
            });
        });
    }

    group.bench_function("has_all_permissions", |b| {
        let required = [
            Permission::EditBooks,
            Permission::UploadBooks,
            Permission::ModerateReviews,
        ];
        b.iter(|| access.has_all_permissions(black_box(Role::Librarian), &required));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_token_issue,
    bench_token_verify,
    bench_permission_checks
);
criterion_main!(benches);
