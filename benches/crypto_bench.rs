//! Cryptographic operation benchmarks.
//!
//! Key validation runs on every accept and dial, so its cost sits on the
//! connection path alongside the handshake and record sealing.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use ptbridge::config::{generate_config_pair, translate, ConfigVariant, Role};
use ptbridge::crypto::{
    generate_key_pair, validate_private_key, validate_public_key, Aead, AeadKey, Nonce,
    SessionKeys,
};

fn bench_p256_keygen(c: &mut Criterion) {
    c.bench_function("p256_keygen", |b| {
        b.iter(|| black_box(generate_key_pair().unwrap()))
    });
}

fn bench_p256_dh(c: &mut Criterion) {
    let alice = generate_key_pair().unwrap();
    let bob = generate_key_pair().unwrap();

    c.bench_function("p256_dh", |b| {
        b.iter(|| black_box(alice.private().diffie_hellman(bob.public())))
    });
}

fn bench_key_validation(c: &mut Criterion) {
    let pair = generate_key_pair().unwrap();
    let private = pair.private().to_bytes();
    let public = pair.public().to_bytes();

    let mut group = c.benchmark_group("key_validation");

    group.bench_function("private_trial_ecdh", |b| {
        b.iter(|| black_box(validate_private_key(private.as_slice())))
    });

    group.bench_function("public_decompress", |b| {
        b.iter(|| black_box(validate_public_key(&public).is_ok()))
    });

    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let (server, client) = generate_config_pair("127.0.0.1:443", ConfigVariant::Named).unwrap();

    let mut group = c.benchmark_group("translate");

    group.bench_function("server", |b| {
        b.iter(|| black_box(translate((&server).into(), Role::Server, None).unwrap()))
    });

    group.bench_function("client", |b| {
        b.iter(|| black_box(translate((&client).into(), Role::Client, None).unwrap()))
    });

    group.finish();
}

fn bench_record_seal(c: &mut Criterion) {
    let key = AeadKey::from_bytes([0x42u8; 32]);
    let aead = Aead::new(&key);
    let iv = [0x24u8; 12];
    let plaintext = vec![0u8; 16 * 1024];
    let header = [0x17, 0x03, 0x03, 0x40, 0x10];

    let mut group = c.benchmark_group("record_seal");
    group.throughput(Throughput::Bytes(plaintext.len() as u64));

    group.bench_function("16k_record", |b| {
        let mut seq = 0u64;
        b.iter(|| {
            let nonce = Nonce::for_record(&iv, seq);
            seq += 1;
            black_box(aead.encrypt(&nonce, &plaintext, &header).unwrap())
        })
    });

    group.finish();
}

fn bench_handshake_crypto(c: &mut Criterion) {
    let server = generate_key_pair().unwrap();

    c.bench_function("handshake_crypto", |b| {
        b.iter(|| {
            let client_eph = generate_key_pair().unwrap();
            let server_eph = generate_key_pair().unwrap();

            let static_shared = client_eph.private().diffie_hellman(server.public());
            let ephemeral_shared = client_eph.private().diffie_hellman(server_eph.public());

            let keys = SessionKeys::derive(
                &[static_shared.as_bytes(), ephemeral_shared.as_bytes()],
                b"handshake",
            );
            black_box(keys.confirmation(b"transcript"))
        })
    });
}

criterion_group!(
    benches,
    bench_p256_keygen,
    bench_p256_dh,
    bench_key_validation,
    bench_translate,
    bench_record_seal,
    bench_handshake_crypto,
);

criterion_main!(benches);
