//! Criterion benchmarks for keel-node.
//!
//! Covers: validated commit into RocksDB and startup replay.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use keel_core::types::Hash256;
use keel_node_lib::{Blockchain, RocksStore};

const OWNER: Hash256 = Hash256([0xAA; 32]);

fn fresh_chain(dir: &TempDir) -> Blockchain<RocksStore> {
    let store = RocksStore::open(dir.path()).unwrap();
    Blockchain::create_or_open(store, 1, OWNER, 1_000_000).unwrap()
}

fn bench_commit_block(c: &mut Criterion) {
    // Each iteration opens a fresh store and commits one block above genesis.
    c.bench_function("commit_validated", |b| {
        b.iter_with_setup(
            || {
                let dir = TempDir::new().unwrap();
                let chain = fresh_chain(&dir);
                let block = chain.mint(vec![], OWNER, 5, b"bench").unwrap();
                (dir, chain, block)
            },
            |(_dir, chain, block)| {
                chain.commit_validated(black_box(&block)).unwrap();
            },
        )
    });
}

fn bench_replay(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let chain = fresh_chain(&dir);
    for _ in 0..200 {
        let block = chain.mint(vec![], OWNER, 5, b"").unwrap();
        chain.commit_validated(&block).unwrap();
    }

    c.bench_function("replay_200_blocks", |b| b.iter(|| chain.replay().unwrap()));
}

criterion_group!(benches, bench_commit_block, bench_replay);
criterion_main!(benches);
